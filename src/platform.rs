//! Browser surfaces the extension talks to. Each is a trait so the relay and popup
//! can run against a real browser binding or the in-process [`crate::tabs::LocalTabs`].

use crate::context_detection::PageContext;
use crate::messages::TabId;
use crate::overlay::OverlayPayload;
use async_trait::async_trait;
use log::info;
use std::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("target is not reachable")]
    Unreachable,
    #[error("cancelled by the user")]
    Cancelled,
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabInfo {
    pub id: TabId,
    pub url: String,
}

#[async_trait]
pub trait TabHost: Send + Sync {
    /// Delivers an overlay payload into the page shown in `tab`.
    async fn show_overlay(&self, tab: TabId, payload: OverlayPayload) -> Result<(), PlatformError>;

    /// Asks the page in `tab` for its context. `None` when no content script answers.
    async fn query_context(&self, tab: TabId) -> Option<PageContext>;

    async fn active_tab(&self) -> Option<TabInfo>;

    async fn open_tab(&self, url: &str) -> Result<(), PlatformError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuContext {
    Selection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    pub id: String,
    pub title: String,
    pub contexts: Vec<MenuContext>,
}

pub trait ContextMenuRegistry: Send + Sync {
    fn remove_all(&self) -> Result<(), PlatformError>;
    fn create(&self, item: MenuItem) -> Result<(), PlatformError>;
}

/// In-memory menu registry.
#[derive(Debug, Default)]
pub struct MenuRegistry {
    items: Mutex<Vec<MenuItem>>,
}

impl MenuRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> Vec<MenuItem> {
        self.items.lock().map(|items| items.clone()).unwrap_or_default()
    }
}

impl ContextMenuRegistry for MenuRegistry {
    fn remove_all(&self) -> Result<(), PlatformError> {
        let mut items = self
            .items
            .lock()
            .map_err(|e| PlatformError::Other(e.to_string()))?;
        items.clear();
        Ok(())
    }

    fn create(&self, item: MenuItem) -> Result<(), PlatformError> {
        let mut items = self
            .items
            .lock()
            .map_err(|e| PlatformError::Other(e.to_string()))?;
        if items.iter().any(|existing| existing.id == item.id) {
            return Err(PlatformError::Other(format!("duplicate menu id {}", item.id)));
        }
        info!("Registered context menu '{}'", item.id);
        items.push(item);
        Ok(())
    }
}

/// Interactive browser-driven auth (the identity API's web auth flow).
#[async_trait]
pub trait WebAuthFlow: Send + Sync {
    /// Redirect URI the provider must send the user back to.
    fn redirect_uri(&self) -> String;

    /// Opens `url` and resolves with the final redirect URL.
    async fn launch(&self, url: &str) -> Result<String, PlatformError>;
}
