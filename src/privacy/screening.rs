//! Screening helpers: prompt interpolation and the sensitivity marker test.

/// The word the screening model answers with for sensitive content.
pub const SENSITIVE_MARKER: &str = "SENSITIVE";

/// The word the screening model answers with for everything else.
pub const CLEAN_MARKER: &str = "CLEAN";

/// Placeholder replaced with the content under analysis.
pub const CONTENT_PLACEHOLDER: &str = "{content}";

/// Temperature for the screening pass. Low so the one-word answer is stable.
pub const SCREENING_TEMPERATURE: f32 = 0.1;

/// Generic screening prompt for arbitrary content.
pub const DEFAULT_SCREENING_TEMPLATE: &str = "Analyze this content for sensitive information. \
Sensitive means: PII (SSN, account numbers, medical info, passwords, financial details), \
or clearly personal/private in nature (health, legal, intimate). \
Respond with ONLY the word SENSITIVE or CLEAN.\n\nContent:\n{content}";

/// Generic analysis prompt used when a caller supplies none.
pub const DEFAULT_ANALYSIS_TEMPLATE: &str =
    "{content}\n\nAnalyze the above content. Provide a structured JSON response.";

/// Substitute the content into a template.
///
/// Only the literal `{content}` token is replaced, in a single pass over the
/// template, so braces inside the content (or JSON examples in the template)
/// are left alone.
pub fn render(template: &str, content: &str) -> String {
    template.replace(CONTENT_PLACEHOLDER, content)
}

/// Whether a screening answer flags the content as sensitive.
///
/// A case-insensitive substring test for the marker word. The model is
/// instructed to answer with exactly one word, so no structured parsing
/// is attempted.
pub fn is_sensitive(screening_text: &str) -> bool {
    screening_text.to_uppercase().contains(SENSITIVE_MARKER)
}
