//! Hand-written fakes for the provider and capability traits (tests only).

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::capabilities::{
    Bookmark, BookmarkSource, CapabilityError, ContentFetcher, EmailMessage, FetchedContent,
    MailCapability, UnsubscribeClient,
};
use crate::inference::{
    CompletionProvider, CompletionRequest, CompletionResponse, ProviderError, ProviderKind,
    TokenUsage,
};

// ─── Providers ──────────────────────────────────────────────────────────────

/// A provider that replays scripted answers and records every prompt.
pub struct FakeProvider {
    kind: ProviderKind,
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    fallback: Option<String>,
    pub prompts: Mutex<Vec<String>>,
    available: bool,
}

impl FakeProvider {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            replies: Mutex::new(VecDeque::new()),
            fallback: None,
            prompts: Mutex::new(Vec::new()),
            available: true,
        }
    }

    /// Queue a successful reply.
    pub fn reply(self, text: &str) -> Self {
        self.replies.lock().unwrap().push_back(Ok(text.to_string()));
        self
    }

    /// Queue a failure.
    pub fn fail(self, err: ProviderError) -> Self {
        self.replies.lock().unwrap().push_back(Err(err));
        self
    }

    /// Answer with `text` once the queue is empty.
    pub fn always(mut self, text: &str) -> Self {
        self.fallback = Some(text.to_string());
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionProvider for FakeProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        request.validate()?;
        self.prompts.lock().unwrap().push(request.prompt.clone());
        let next = self.replies.lock().unwrap().pop_front();
        let text = match next {
            Some(reply) => reply?,
            None => match &self.fallback {
                Some(text) => text.clone(),
                None => {
                    return Err(ProviderError::Unavailable {
                        provider: self.kind,
                        endpoint: "fake".into(),
                        reason: "no scripted reply".into(),
                    })
                }
            },
        };
        Ok(CompletionResponse {
            text,
            model_used: format!("{}-test-model", self.kind),
            provider: self.kind,
            usage: TokenUsage::default(),
        })
    }

    async fn probe(&self) -> bool {
        self.available
    }
}

/// The error a dead local Ollama produces.
pub fn connection_refused() -> ProviderError {
    ProviderError::Unavailable {
        provider: ProviderKind::Ollama,
        endpoint: "http://localhost:11434/api/chat".into(),
        reason: "connection refused".into(),
    }
}

// ─── Mail ───────────────────────────────────────────────────────────────────

/// Records every mailbox call as `"op:message_id"`.
#[derive(Default)]
pub struct FakeMailbox {
    pub calls: Mutex<Vec<String>>,
    failing_ops: Mutex<HashMap<String, String>>,
    pub drafts: Mutex<Vec<(String, String, String, Option<String>)>>,
}

impl FakeMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call of `op` fail with `message`.
    pub fn failing(self, op: &str, message: &str) -> Self {
        self.failing_ops
            .lock()
            .unwrap()
            .insert(op.to_string(), message.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, op: &str, target: &str) -> Result<(), CapabilityError> {
        self.calls.lock().unwrap().push(format!("{op}:{target}"));
        match self.failing_ops.lock().unwrap().get(op) {
            Some(message) => Err(CapabilityError::new(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MailCapability for FakeMailbox {
    async fn fetch_messages(
        &self,
        _query: &str,
        _max_results: usize,
        _page_token: Option<&str>,
    ) -> Result<(Vec<EmailMessage>, Option<String>), CapabilityError> {
        Ok((Vec::new(), None))
    }

    async fn archive(&self, message_id: &str) -> Result<(), CapabilityError> {
        self.record("archive", message_id)
    }

    async fn trash(&self, message_id: &str) -> Result<(), CapabilityError> {
        self.record("trash", message_id)
    }

    async fn mark_read(&self, message_id: &str) -> Result<(), CapabilityError> {
        self.record("mark_read", message_id)
    }

    async fn get_or_create_label(&self, name: &str) -> Result<String, CapabilityError> {
        self.record("get_or_create_label", name)?;
        Ok(format!("Label_{name}"))
    }

    async fn add_label(&self, message_id: &str, label_id: &str) -> Result<(), CapabilityError> {
        self.record("add_label", &format!("{message_id}:{label_id}"))
    }

    async fn create_draft(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        thread_id: Option<&str>,
    ) -> Result<String, CapabilityError> {
        self.record("create_draft", to)?;
        self.drafts.lock().unwrap().push((
            to.to_string(),
            subject.to_string(),
            body.to_string(),
            thread_id.map(String::from),
        ));
        Ok("draft-1".to_string())
    }
}

/// Records hit URLs; optionally fails every request.
#[derive(Default)]
pub struct FakeUnsubscriber {
    pub hits: Mutex<Vec<String>>,
    failure: Option<String>,
}

impl FakeUnsubscriber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(message: &str) -> Self {
        Self {
            hits: Mutex::new(Vec::new()),
            failure: Some(message.to_string()),
        }
    }

    pub fn hits(&self) -> Vec<String> {
        self.hits.lock().unwrap().clone()
    }
}

#[async_trait]
impl UnsubscribeClient for FakeUnsubscriber {
    async fn unsubscribe(&self, url: &str) -> Result<u16, CapabilityError> {
        self.hits.lock().unwrap().push(url.to_string());
        match &self.failure {
            Some(message) => Err(CapabilityError::new(message.clone())),
            None => Ok(200),
        }
    }
}

// ─── Content & Bookmarks ────────────────────────────────────────────────────

/// Serves a fixed page for every URL.
pub struct FakeFetcher {
    pub page: FetchedContent,
}

impl FakeFetcher {
    pub fn with_text(title: &str, text: &str) -> Self {
        Self {
            page: FetchedContent {
                url: String::new(),
                title: title.to_string(),
                text: text.to_string(),
                word_count: text.split_whitespace().count(),
                error: None,
            },
        }
    }
}

#[async_trait]
impl ContentFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> FetchedContent {
        FetchedContent {
            url: url.to_string(),
            ..self.page.clone()
        }
    }
}

pub struct FakeBookmarks(pub Vec<Bookmark>);

#[async_trait]
impl BookmarkSource for FakeBookmarks {
    async fn list_bookmarks(&self) -> Result<Vec<Bookmark>, CapabilityError> {
        Ok(self.0.clone())
    }
}

// ─── Fixtures ───────────────────────────────────────────────────────────────

pub fn email(id: &str, sender: &str, subject: &str, body: &str) -> EmailMessage {
    EmailMessage {
        id: id.to_string(),
        thread_id: format!("thread-{id}"),
        subject: subject.to_string(),
        sender: sender.to_string(),
        to: "me@example.com".to_string(),
        date: "Mon, 12 Oct 2026 09:00:00 +0000".to_string(),
        snippet: body.chars().take(80).collect(),
        body_text: body.to_string(),
        body_html: String::new(),
        labels: vec!["INBOX".to_string()],
        has_attachments: false,
    }
}
