use super::PageContext;
use crate::messages::{Message, Response, TabId};
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct SessionContexts {
    by_tab: HashMap<TabId, PageContext>,
    last_detected: Option<PageContext>,
}

/// Session-scoped context cache, one entry per tab. Cloning shares the same map.
#[derive(Debug, Clone, Default)]
pub struct ContextStore {
    inner: Arc<RwLock<SessionContexts>>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces whatever was stored for `tab`.
    pub async fn put(&self, tab: TabId, ctx: PageContext) {
        let mut guard = self.inner.write().await;
        guard.last_detected = Some(ctx.clone());
        guard.by_tab.insert(tab, ctx);
    }

    pub async fn get(&self, tab: TabId) -> Option<PageContext> {
        self.inner.read().await.by_tab.get(&tab).cloned()
    }

    pub async fn last_detected(&self) -> Option<PageContext> {
        self.inner.read().await.last_detected.clone()
    }

    pub async fn forget(&self, tab: TabId) {
        self.inner.write().await.by_tab.remove(&tab);
    }

    pub async fn clear(&self) {
        let mut guard = self.inner.write().await;
        guard.by_tab.clear();
        guard.last_detected = None;
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.by_tab.len()
    }
}

/// Background side of the page → relay channel. Only this type writes the store.
#[derive(Debug, Clone, Default)]
pub struct Inbox {
    store: ContextStore,
}

impl Inbox {
    pub fn new(store: ContextStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &ContextStore {
        &self.store
    }

    pub async fn handle(&self, sender: Option<TabId>, message: Message) -> Response {
        match message {
            Message::Ping => Response::ack(),
            Message::ContextUpdate { ctx } => {
                let Some(tab) = sender else {
                    return Response::failed("no_tab_id");
                };
                debug!("Context update from tab {}: {}", tab, ctx.source);
                self.store.put(tab, ctx).await;
                Response::ack()
            }
            Message::GetCurrentContext => match sender {
                Some(tab) => match self.store.get(tab).await {
                    Some(ctx) => Response::with_context(ctx),
                    None => Response::failed("no_context"),
                },
                None => Response::failed("no_tab_id"),
            },
        }
    }
}
