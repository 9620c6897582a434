use super::store::Inbox;
use super::{classify, ContextSource, PageContext};
use crate::messages::{Message, Response, TabId};
use async_trait::async_trait;
use log::debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

pub const PUBLISH_DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("receiving context is not available")]
    Disconnected,
    #[error("message rejected: {0}")]
    Rejected(String),
}

/// Where a page sends its context updates.
#[async_trait]
pub trait ContextSink: Send + Sync {
    async fn send(&self, message: Message) -> Result<Response, SendError>;
}

/// In-process sink that delivers straight to the relay inbox as `tab`.
#[derive(Debug, Clone)]
pub struct InboxPort {
    inbox: Inbox,
    tab: TabId,
}

impl InboxPort {
    pub fn new(inbox: Inbox, tab: TabId) -> Self {
        Self { inbox, tab }
    }
}

#[async_trait]
impl ContextSink for InboxPort {
    async fn send(&self, message: Message) -> Result<Response, SendError> {
        let response = self.inbox.handle(Some(self.tab), message).await;
        if response.ok {
            Ok(response)
        } else {
            Err(SendError::Rejected(response.error.unwrap_or_default()))
        }
    }
}

/// Page signals that may mean the site context changed.
///
/// `Mutation` comes from a coarse observer on the document root and is only a hint;
/// the debounce and dedup checks decide whether anything is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    DocumentReady,
    PushState,
    ReplaceState,
    PopState,
    HashChange,
    Mutation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Published,
    Debounced,
    Unchanged,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PublishKey {
    source: ContextSource,
    host: String,
    path: String,
}

impl PublishKey {
    fn new(source: ContextSource, location: &str) -> Self {
        let (host, path) = match Url::parse(location) {
            Ok(url) => (
                url.host_str().unwrap_or_default().to_lowercase(),
                url.path().to_string(),
            ),
            Err(_) => (location.to_lowercase(), String::new()),
        };
        Self { source, host, path }
    }
}

/// Runs inside one page: classifies the location on each trigger and pushes the
/// result to the relay, best-effort.
pub struct ContextPublisher {
    sink: Arc<dyn ContextSink>,
    location: String,
    last_key: Option<PublishKey>,
    last_publish: Option<Instant>,
    debounce: Duration,
}

impl ContextPublisher {
    pub fn new(sink: Arc<dyn ContextSink>, location: impl Into<String>) -> Self {
        Self {
            sink,
            location: location.into(),
            last_key: None,
            last_publish: None,
            debounce: PUBLISH_DEBOUNCE,
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Synchronous answer to "get current context" queries.
    pub fn current_context(&self) -> PageContext {
        classify(&self.location)
    }

    pub fn respond(&self, message: &Message) -> Option<Response> {
        match message {
            Message::GetCurrentContext => Some(Response::with_context(self.current_context())),
            Message::Ping => Some(Response::ack()),
            Message::ContextUpdate { .. } => None,
        }
    }

    /// Handles a page signal seen while the page is at `location`.
    pub async fn on_trigger(&mut self, trigger: Trigger, location: &str) -> PublishOutcome {
        self.location = location.to_string();

        let now = Instant::now();
        if let Some(last) = self.last_publish {
            if now.duration_since(last) < self.debounce {
                debug!("Context publish debounced ({:?})", trigger);
                return PublishOutcome::Debounced;
            }
        }

        let ctx = classify(&self.location);
        let key = PublishKey::new(ctx.source, &self.location);
        if self.last_key.as_ref() == Some(&key) {
            return PublishOutcome::Unchanged;
        }

        match self.sink.send(Message::ContextUpdate { ctx }).await {
            Ok(_) => {
                debug!(
                    "Published context {} for {} ({:?})",
                    key.source, key.host, trigger
                );
                self.last_key = Some(key);
                self.last_publish = Some(now);
                PublishOutcome::Published
            }
            Err(e) => {
                // the page may be tearing down; propagation is best-effort
                debug!("Context publish dropped: {}", e);
                PublishOutcome::Failed
            }
        }
    }
}
