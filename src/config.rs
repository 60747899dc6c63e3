//! Settings loading and validation.
//!
//! Reads `config/settings.yaml` and resolves environment variables.
//! The file is optional: every field has a default, and the usual
//! environment variables (`CLAUDE_API_KEY`, `OLLAMA_BASE_URL`, …) override
//! whatever the file says.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::inference::ProviderKind;

/// Relative location of the settings file under the project root.
const SETTINGS_RELATIVE_PATH: &str = "config/settings.yaml";

/// Env var pointing directly at a settings file.
const SETTINGS_ENV_VAR: &str = "LOCALTRIAGE_CONFIG";

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not find {SETTINGS_RELATIVE_PATH}")]
    NotFound,

    #[error("failed to read {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("failed to parse settings: {reason}")]
    Parse { reason: String },
}

// ─── Public Types ────────────────────────────────────────────────────────────

/// Which providers the router prefers.
#[derive(Debug, Clone, Deserialize)]
pub struct RoutingSettings {
    /// Target of plain `complete()` calls without an explicit provider.
    #[serde(default = "default_provider")]
    pub default_provider: ProviderKind,
    /// Target of the analysis pass when screening says the content is clean.
    #[serde(default = "default_high_quality_provider")]
    pub high_quality_provider: ProviderKind,
}

fn default_provider() -> ProviderKind {
    ProviderKind::Ollama
}

fn default_high_quality_provider() -> ProviderKind {
    ProviderKind::Claude
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            high_quality_provider: default_high_quality_provider(),
        }
    }
}

/// Local Ollama endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct OllamaSettings {
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,
    #[serde(default = "default_ollama_model")]
    pub model: String,
}

fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "qwen2.5:7b".to_string()
}

impl Default for OllamaSettings {
    fn default() -> Self {
        Self {
            base_url: default_ollama_base_url(),
            model: default_ollama_model(),
        }
    }
}

/// A cloud backend. Enabled only when `api_key` is non-empty.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CloudSettings {
    #[serde(default)]
    pub api_key: String,
    /// Overrides the provider's default model.
    #[serde(default)]
    pub model: Option<String>,
    /// Overrides the provider's public endpoint (proxies, tests).
    #[serde(default)]
    pub base_url: Option<String>,
}

impl CloudSettings {
    pub fn is_enabled(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

/// Top-level settings (mirrors `config/settings.yaml`).
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub routing: RoutingSettings,
    #[serde(default)]
    pub ollama: OllamaSettings,
    #[serde(default)]
    pub claude: CloudSettings,
    #[serde(default)]
    pub gemini: CloudSettings,
    #[serde(default)]
    pub openai: CloudSettings,
    /// SQLite path. Defaults to `triage.db` in the platform data directory.
    #[serde(default)]
    pub database_path: Option<String>,
    /// Maximum messages per review batch.
    #[serde(default = "default_email_batch_size")]
    pub email_batch_size: usize,
    /// Timeout for bookmark page fetches and unsubscribe requests.
    #[serde(default = "default_bookmark_fetch_timeout_secs")]
    pub bookmark_fetch_timeout_secs: u64,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default)]
    pub log_filter: Option<String>,
}

fn default_email_batch_size() -> usize {
    50
}

fn default_bookmark_fetch_timeout_secs() -> u64 {
    30
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            routing: RoutingSettings::default(),
            ollama: OllamaSettings::default(),
            claude: CloudSettings::default(),
            gemini: CloudSettings::default(),
            openai: CloudSettings::default(),
            database_path: None,
            email_batch_size: default_email_batch_size(),
            bookmark_fetch_timeout_secs: default_bookmark_fetch_timeout_secs(),
            log_filter: None,
        }
    }
}

impl Settings {
    /// Load settings from the discovered file (if any), then apply env overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let cwd = std::env::current_dir().unwrap_or_default();
        let mut settings = match find_settings_path(&cwd) {
            Ok(path) => {
                tracing::info!(path = %path.display(), "loading settings file");
                load_settings(&path)?
            }
            Err(ConfigError::NotFound) => {
                tracing::info!("no settings file found, using defaults");
                Settings::default()
            }
            Err(e) => return Err(e),
        };
        settings.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Overlay environment variables onto the loaded settings.
    ///
    /// `lookup` abstracts `std::env::var` so tests do not mutate the process env.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty("OLLAMA_BASE_URL") {
            self.ollama.base_url = v;
        }
        if let Some(v) = non_empty("OLLAMA_MODEL") {
            self.ollama.model = v;
        }
        for (prefix, cloud) in [
            ("CLAUDE", &mut self.claude),
            ("GEMINI", &mut self.gemini),
            ("OPENAI", &mut self.openai),
        ] {
            if let Some(v) = non_empty(&format!("{prefix}_API_KEY")) {
                cloud.api_key = v;
            }
            if let Some(v) = non_empty(&format!("{prefix}_MODEL")) {
                cloud.model = Some(v);
            }
        }
        if let Some(kind) = non_empty("DEFAULT_PROVIDER").and_then(|v| v.parse().ok()) {
            self.routing.default_provider = kind;
        }
        if let Some(kind) = non_empty("HIGH_QUALITY_PROVIDER").and_then(|v| v.parse().ok()) {
            self.routing.high_quality_provider = kind;
        }
        if let Some(v) = non_empty("LOCALTRIAGE_DB_PATH") {
            self.database_path = Some(v);
        }
    }

    /// The cloud settings block for a provider (`None` for the local one).
    pub fn cloud(&self, kind: ProviderKind) -> Option<&CloudSettings> {
        match kind {
            ProviderKind::Ollama => None,
            ProviderKind::Claude => Some(&self.claude),
            ProviderKind::Gemini => Some(&self.gemini),
            ProviderKind::OpenAi => Some(&self.openai),
        }
    }
}

// ─── Loading ─────────────────────────────────────────────────────────────────

/// Resolve the settings path.
///
/// Checks `LOCALTRIAGE_CONFIG` first, then searches upward from `start`
/// for `config/settings.yaml`.
pub fn find_settings_path(start: &Path) -> Result<PathBuf, ConfigError> {
    if let Ok(path) = std::env::var(SETTINGS_ENV_VAR) {
        let candidate = PathBuf::from(expand_tilde(&path));
        if candidate.exists() {
            return Ok(candidate);
        }
        tracing::warn!(path = %candidate.display(), "{SETTINGS_ENV_VAR} points to a missing file");
    }

    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join(SETTINGS_RELATIVE_PATH);
        if candidate.exists() {
            return Ok(candidate);
        }
        if !dir.pop() {
            break;
        }
    }

    Err(ConfigError::NotFound)
}

/// Load and parse a settings file.
///
/// Performs environment-variable interpolation on values matching
/// `${VAR_NAME}` or `${VAR_NAME:-default}`.
pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    parse_settings(&raw)
}

/// Parse settings YAML after env-var interpolation.
pub fn parse_settings(raw: &str) -> Result<Settings, ConfigError> {
    let interpolated = interpolate_env_vars(raw);
    if interpolated.trim().is_empty() {
        return Ok(Settings::default());
    }
    serde_yaml::from_str(&interpolated).map_err(|e| ConfigError::Parse {
        reason: e.to_string(),
    })
}

// ─── Env-var interpolation ───────────────────────────────────────────────────

/// Replace `${VAR}` and `${VAR:-default}` in a string.
fn interpolate_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_expr = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_expr.push(c);
            }
            result.push_str(&resolve_var_expr(&var_expr));
        } else {
            result.push(ch);
        }
    }

    result
}

/// Resolve a variable expression like `VAR` or `VAR:-default`.
fn resolve_var_expr(expr: &str) -> String {
    if let Some((var_name, default)) = expr.split_once(":-") {
        std::env::var(var_name).unwrap_or_else(|_| expand_tilde(default))
    } else {
        std::env::var(expr).unwrap_or_default()
    }
}

/// Expand a leading `~` to the user's home directory.
pub(crate) fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return format!("{}{rest}", home.display());
        }
    }
    path.to_string()
}

// ─── Tests ───────────────────────────────────────────────────────────────────
