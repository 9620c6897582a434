//! Background relay: owns the context menu, runs selection rewrites and files page
//! context updates into the session store.

use crate::api::{ApiClient, Failure, RewriteRequest};
use crate::context_detection::store::Inbox;
use crate::i18n::Lang;
use crate::messages::{Message, Response, TabId};
use crate::overlay::{format_outputs, OverlayPayload};
use crate::platform::{ContextMenuRegistry, MenuContext, MenuItem, PlatformError, TabHost};
use crate::settings::{SettingsError, SettingsStore, PROD_BASE_URL};
use log::{debug, info, warn};
use reqwest::cookie::Jar;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

pub const SELECTION_MENU_ID: &str = "lexinoa_selection_polish";
pub const SELECTION_MENU_TITLE: &str = "Lexinoa로 문장 순화하기";

/// A click on one of the extension's context-menu entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuClick {
    pub menu_item_id: String,
    pub selection_text: Option<String>,
}

impl MenuClick {
    pub fn selection(text: impl Into<String>) -> Self {
        Self {
            menu_item_id: SELECTION_MENU_ID.to_string(),
            selection_text: Some(text.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionOutcome {
    Refined(Vec<String>),
    Failed(Failure),
    /// A newer selection in the same tab finished first; nothing was rendered.
    Superseded,
}

pub struct Relay {
    settings: SettingsStore,
    inbox: Inbox,
    tabs: Arc<dyn TabHost>,
    menus: Arc<dyn ContextMenuRegistry>,
    jar: Arc<Jar>,
    next_generation: AtomicU64,
    /// Latest in-flight generation per tab. Entries leave once that rewrite finishes.
    in_flight: Mutex<HashMap<TabId, u64>>,
}

impl Relay {
    pub fn new(
        settings: SettingsStore,
        inbox: Inbox,
        tabs: Arc<dyn TabHost>,
        menus: Arc<dyn ContextMenuRegistry>,
    ) -> Self {
        Self {
            settings,
            inbox,
            tabs,
            menus,
            jar: Arc::new(Jar::default()),
            next_generation: AtomicU64::new(0),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Shares a cookie jar with other API callers (the popup).
    pub fn with_cookie_jar(mut self, jar: Arc<Jar>) -> Self {
        self.jar = jar;
        self
    }

    pub fn inbox(&self) -> &Inbox {
        &self.inbox
    }

    /// Install/update hook: seeds the production base URL when none is stored, then
    /// registers the selection menu.
    pub fn on_installed(&self) -> Result<(), SettingsError> {
        let prefs = self.settings.load();
        if prefs.base_url.as_deref().map(str::trim).unwrap_or_default().is_empty() {
            info!("Seeding base URL {}", PROD_BASE_URL);
            self.settings
                .update(|p| p.base_url = Some(PROD_BASE_URL.to_string()))?;
        }
        self.register_menus();
        Ok(())
    }

    pub fn on_startup(&self) {
        self.register_menus();
    }

    fn register_menus(&self) {
        if let Err(e) = self.menus.remove_all() {
            warn!("Failed to clear context menus: {}", e);
        }
        let item = MenuItem {
            id: SELECTION_MENU_ID.to_string(),
            title: SELECTION_MENU_TITLE.to_string(),
            contexts: vec![MenuContext::Selection],
        };
        if let Err(e) = self.menus.create(item) {
            warn!("Failed to register context menu: {}", e);
        }
    }

    pub async fn on_message(&self, sender: Option<TabId>, message: Message) -> Response {
        self.inbox.handle(sender, message).await
    }

    /// Context-menu handler. Clicks on other menus, without a tab, or with a blank
    /// selection are ignored.
    pub async fn on_menu_clicked(
        &self,
        click: MenuClick,
        tab: Option<TabId>,
    ) -> Option<SelectionOutcome> {
        if click.menu_item_id != SELECTION_MENU_ID {
            return None;
        }
        let Some(tab) = tab else {
            debug!("Selection click without a tab");
            return None;
        };
        let text = click.selection_text.unwrap_or_default();
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        Some(self.polish_selection(tab, text).await)
    }

    /// Loading overlay, rewrite call, then a success or error overlay. Only the most
    /// recent selection per tab is allowed to draw its result.
    pub async fn polish_selection(&self, tab: TabId, text: &str) -> SelectionOutcome {
        let generation = self.begin(tab);
        let prefs = self.settings.load();
        let base_url = prefs.base_url();
        let lang = Lang::from_override(prefs.ui_language.as_deref());

        self.show(tab, OverlayPayload::loading(text, &base_url)).await;

        let request = RewriteRequest::from_selection(text, prefs.selection_defaults.as_ref());
        let result = match ApiClient::from_preferences(&prefs, self.jar.clone()) {
            Ok(client) => client.polish(request).await,
            Err(e) => Err(e),
        };

        if !self.finish(tab, generation) {
            debug!("Dropping stale rewrite result for tab {}", tab);
            return SelectionOutcome::Superseded;
        }

        match result {
            Ok(outputs) => {
                let refined = format_outputs(&outputs);
                self.show(tab, OverlayPayload::success(text, refined, &base_url))
                    .await;
                SelectionOutcome::Refined(outputs)
            }
            Err(e) => {
                let failure = e.failure();
                warn!("Selection rewrite failed: {}", e);
                self.show(tab, OverlayPayload::error(text, &failure, lang, &base_url))
                    .await;
                SelectionOutcome::Failed(failure)
            }
        }
    }

    async fn show(&self, tab: TabId, payload: OverlayPayload) {
        match self.tabs.show_overlay(tab, payload).await {
            Ok(()) => {}
            Err(PlatformError::Unreachable) => debug!("Tab {} cannot host an overlay", tab),
            Err(e) => warn!("Failed to show overlay in tab {}: {}", tab, e),
        }
    }

    fn begin(&self, tab: TabId) -> u64 {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        if let Ok(mut map) = self.in_flight.lock() {
            map.insert(tab, generation);
        }
        generation
    }

    /// True when `generation` is still the newest rewrite for `tab`. The tab's entry
    /// is released in that case.
    fn finish(&self, tab: TabId, generation: u64) -> bool {
        let Ok(mut map) = self.in_flight.lock() else {
            return true;
        };
        if map.get(&tab) == Some(&generation) {
            map.remove(&tab);
            true
        } else {
            false
        }
    }

    /// Tabs with a rewrite still in flight.
    pub fn pending_tabs(&self) -> usize {
        self.in_flight.lock().map(|map| map.len()).unwrap_or(0)
    }
}
