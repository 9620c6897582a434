use crate::context_detection::publisher::{ContextPublisher, InboxPort, PublishOutcome, Trigger};
use crate::context_detection::store::Inbox;
use crate::context_detection::PageContext;
use crate::i18n::Lang;
use crate::messages::{Message, TabId};
use crate::overlay::{OverlayPayload, OverlayRenderer, OverlayView, PageDocument, OVERLAY_ELEMENT_ID};
use crate::platform::{PlatformError, TabHost, TabInfo};
use async_trait::async_trait;
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

struct Page {
    url: String,
    renderer: OverlayRenderer,
    publisher: Option<ContextPublisher>,
}

#[derive(Default)]
struct Tabs {
    pages: HashMap<TabId, Page>,
    active: Option<TabId>,
    opened: Vec<String>,
}

/// Tab host that keeps every page in this process. Pages opened with a content script
/// publish their context to the relay inbox and answer context queries; pages without
/// one (browser-internal pages, stores) stay silent.
pub struct LocalTabs {
    inbox: Inbox,
    lang: Lang,
    tabs: Mutex<Tabs>,
}

impl LocalTabs {
    pub fn new(inbox: Inbox, lang: Lang) -> Self {
        Self {
            inbox,
            lang,
            tabs: Mutex::new(Tabs::default()),
        }
    }

    /// Loads `url` into `tab`, making it the active tab.
    pub async fn open_page(&self, tab: TabId, url: &str, content_script: bool) -> Option<PublishOutcome> {
        let publisher = content_script.then(|| {
            let port = Arc::new(InboxPort::new(self.inbox.clone(), tab));
            ContextPublisher::new(port, url)
        });
        let page = Page {
            url: url.to_string(),
            renderer: OverlayRenderer::new(PageDocument::new(), self.lang),
            publisher,
        };

        let mut tabs = self.tabs.lock().await;
        tabs.pages.insert(tab, page);
        tabs.active = Some(tab);
        let page = tabs.pages.get_mut(&tab)?;
        match page.publisher.as_mut() {
            Some(publisher) => Some(publisher.on_trigger(Trigger::DocumentReady, url).await),
            None => None,
        }
    }

    /// In-page navigation (history API, hash change) to `url`.
    pub async fn navigate(&self, tab: TabId, url: &str, trigger: Trigger) -> Option<PublishOutcome> {
        let mut tabs = self.tabs.lock().await;
        let page = tabs.pages.get_mut(&tab)?;
        page.url = url.to_string();
        let publisher = page.publisher.as_mut()?;
        Some(publisher.on_trigger(trigger, url).await)
    }

    /// DOM mutation observed without a URL change.
    pub async fn mutate(&self, tab: TabId) -> Option<PublishOutcome> {
        let mut tabs = self.tabs.lock().await;
        let page = tabs.pages.get_mut(&tab)?;
        let url = page.url.clone();
        let publisher = page.publisher.as_mut()?;
        Some(publisher.on_trigger(Trigger::Mutation, &url).await)
    }

    pub async fn activate(&self, tab: TabId) {
        let mut tabs = self.tabs.lock().await;
        if tabs.pages.contains_key(&tab) {
            tabs.active = Some(tab);
        }
    }

    pub async fn close_page(&self, tab: TabId) {
        let mut tabs = self.tabs.lock().await;
        tabs.pages.remove(&tab);
        if tabs.active == Some(tab) {
            tabs.active = None;
        }
    }

    pub async fn overlay_view(&self, tab: TabId) -> Option<OverlayView> {
        let tabs = self.tabs.lock().await;
        tabs.pages.get(&tab)?.renderer.view()
    }

    pub async fn overlay_count(&self, tab: TabId) -> usize {
        let tabs = self.tabs.lock().await;
        tabs.pages
            .get(&tab)
            .map(|page| page.renderer.document().count(OVERLAY_ELEMENT_ID))
            .unwrap_or(0)
    }

    pub async fn close_overlay(&self, tab: TabId) {
        let mut tabs = self.tabs.lock().await;
        if let Some(page) = tabs.pages.get_mut(&tab) {
            page.renderer.close();
        }
    }

    pub async fn opened_urls(&self) -> Vec<String> {
        self.tabs.lock().await.opened.clone()
    }
}

#[async_trait]
impl TabHost for LocalTabs {
    async fn show_overlay(&self, tab: TabId, payload: OverlayPayload) -> Result<(), PlatformError> {
        let mut tabs = self.tabs.lock().await;
        let page = tabs.pages.get_mut(&tab).ok_or(PlatformError::Unreachable)?;
        page.renderer.render(&payload);
        Ok(())
    }

    async fn query_context(&self, tab: TabId) -> Option<PageContext> {
        let tabs = self.tabs.lock().await;
        let publisher = tabs.pages.get(&tab)?.publisher.as_ref()?;
        let response = publisher.respond(&Message::GetCurrentContext)?;
        if !response.ok {
            debug!("Tab {} did not return a context", tab);
        }
        response.ctx
    }

    async fn active_tab(&self) -> Option<TabInfo> {
        let tabs = self.tabs.lock().await;
        let id = tabs.active?;
        let page = tabs.pages.get(&id)?;
        Some(TabInfo {
            id,
            url: page.url.clone(),
        })
    }

    async fn open_tab(&self, url: &str) -> Result<(), PlatformError> {
        self.tabs.lock().await.opened.push(url.to_string());
        Ok(())
    }
}
