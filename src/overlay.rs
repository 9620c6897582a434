//! Floating result panel shown inside a page.
//!
//! The renderer is driven purely by [`OverlayPayload`] messages. How a payload reaches
//! the page (script injection, bridge frame, in-process call) is the tab host's
//! business, not this module's.

use crate::api::{Failure, LimitKind};
use crate::i18n::{Lang, Text};
use crate::settings::trim_base_url;
use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::AbortHandle;

pub const OVERLAY_ELEMENT_ID: &str = "lexinoa-selection-popup";
pub const AUTO_DISMISS: Duration = Duration::from_secs(25);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlayStatus {
    Loading,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayPayload {
    pub status: OverlayStatus,
    pub original_text: String,
    #[serde(default)]
    pub refined_text: String,
    #[serde(default)]
    pub error_message: String,
    #[serde(default)]
    pub need_login: bool,
    #[serde(default)]
    pub limit_kind: Option<LimitKind>,
    #[serde(default)]
    pub base_url: String,
}

impl OverlayPayload {
    pub fn loading(original: &str, base_url: &str) -> Self {
        Self {
            status: OverlayStatus::Loading,
            original_text: original.to_string(),
            refined_text: String::new(),
            error_message: String::new(),
            need_login: false,
            limit_kind: None,
            base_url: base_url.to_string(),
        }
    }

    pub fn success(original: &str, refined: String, base_url: &str) -> Self {
        Self {
            status: OverlayStatus::Success,
            refined_text: refined,
            ..Self::loading(original, base_url)
        }
    }

    pub fn error(original: &str, failure: &Failure, lang: Lang, base_url: &str) -> Self {
        Self {
            status: OverlayStatus::Error,
            error_message: Text::from(failure).render(lang),
            need_login: failure.needs_login(),
            limit_kind: failure.needs_upgrade(),
            ..Self::loading(original, base_url)
        }
    }
}

/// Text for the refined block: a lone output as-is, several outputs numbered.
pub fn format_outputs(outputs: &[String]) -> String {
    match outputs {
        [] => String::new(),
        [only] => only.trim().to_string(),
        many => many
            .iter()
            .enumerate()
            .map(|(idx, text)| format!("{}) {}", idx + 1, text.trim()))
            .collect::<Vec<_>>()
            .join("\n\n"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayAction {
    Login,
    Upgrade,
}

/// What is currently drawn in the panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayView {
    pub status: OverlayStatus,
    pub status_line: String,
    pub original: Option<String>,
    pub refined: Option<String>,
    pub error: Option<String>,
    pub action: Option<OverlayAction>,
}

#[derive(Debug)]
struct Element {
    id: String,
    view: Option<OverlayView>,
    /// Bumped on every write; unique across the document's lifetime.
    revision: u64,
}

/// Minimal model of a page's element tree, enough to host overlay panels.
#[derive(Debug, Clone, Default)]
pub struct PageDocument {
    nodes: Arc<Mutex<Vec<Element>>>,
    revisions: Arc<AtomicU64>,
}

impl PageDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, id: &str) -> usize {
        self.nodes
            .lock()
            .map(|nodes| nodes.iter().filter(|n| n.id == id).count())
            .unwrap_or(0)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.count(id) > 0
    }

    pub fn view(&self, id: &str) -> Option<OverlayView> {
        let nodes = self.nodes.lock().ok()?;
        nodes.iter().find(|n| n.id == id).and_then(|n| n.view.clone())
    }

    pub fn revision(&self, id: &str) -> Option<u64> {
        let nodes = self.nodes.lock().ok()?;
        nodes.iter().find(|n| n.id == id).map(|n| n.revision)
    }

    /// Writes `view` into the element `id`, appending the element only if missing.
    /// Returns the element's new revision.
    fn upsert(&self, id: &str, view: OverlayView) -> u64 {
        let revision = self.revisions.fetch_add(1, Ordering::Relaxed) + 1;
        if let Ok(mut nodes) = self.nodes.lock() {
            match nodes.iter_mut().find(|n| n.id == id) {
                Some(node) => {
                    node.view = Some(view);
                    node.revision = revision;
                }
                None => nodes.push(Element {
                    id: id.to_string(),
                    view: Some(view),
                    revision,
                }),
            }
        }
        revision
    }

    pub fn remove(&self, id: &str) {
        if let Ok(mut nodes) = self.nodes.lock() {
            nodes.retain(|n| n.id != id);
        }
    }

    /// Removes `id` only while it still holds `revision`. Returns whether it did.
    pub fn remove_if_unchanged(&self, id: &str, revision: u64) -> bool {
        let Ok(mut nodes) = self.nodes.lock() else {
            return false;
        };
        let before = nodes.len();
        nodes.retain(|n| !(n.id == id && n.revision == revision));
        nodes.len() != before
    }
}

pub struct OverlayRenderer {
    document: PageDocument,
    lang: Lang,
    base_url: String,
    hide_timer: Option<AbortHandle>,
}

impl OverlayRenderer {
    pub fn new(document: PageDocument, lang: Lang) -> Self {
        Self {
            document,
            lang,
            base_url: String::new(),
            hide_timer: None,
        }
    }

    pub fn document(&self) -> &PageDocument {
        &self.document
    }

    pub fn view(&self) -> Option<OverlayView> {
        self.document.view(OVERLAY_ELEMENT_ID)
    }

    pub fn is_visible(&self) -> bool {
        self.document.contains(OVERLAY_ELEMENT_ID)
    }

    /// Draws `payload`, reusing the panel if one is already in the page. Any pending
    /// auto-dismiss is cancelled; success starts a fresh one.
    pub fn render(&mut self, payload: &OverlayPayload) {
        self.cancel_timer();
        self.base_url = payload.base_url.clone();

        let view = match payload.status {
            OverlayStatus::Loading => OverlayView {
                status: OverlayStatus::Loading,
                status_line: Text::OverlayLoading.render(self.lang),
                original: Some(payload.original_text.clone()),
                refined: None,
                error: None,
                action: None,
            },
            OverlayStatus::Success => OverlayView {
                status: OverlayStatus::Success,
                status_line: Text::OverlaySuccess.render(self.lang),
                original: Some(payload.original_text.clone()),
                refined: Some(payload.refined_text.clone()),
                error: None,
                action: None,
            },
            OverlayStatus::Error => {
                let action = if payload.need_login {
                    Some(OverlayAction::Login)
                } else if payload.limit_kind.is_some() {
                    Some(OverlayAction::Upgrade)
                } else {
                    None
                };
                let message = if payload.error_message.is_empty() {
                    Text::RequestFailed.render(self.lang)
                } else {
                    payload.error_message.clone()
                };
                OverlayView {
                    status: OverlayStatus::Error,
                    status_line: Text::OverlayFailed.render(self.lang),
                    original: None,
                    refined: None,
                    error: Some(message),
                    action,
                }
            }
        };

        let revision = self.document.upsert(OVERLAY_ELEMENT_ID, view);

        if payload.status == OverlayStatus::Success {
            self.start_timer(revision);
        }
    }

    /// Manual close: the panel goes away and nothing is left scheduled.
    pub fn close(&mut self) {
        self.cancel_timer();
        self.document.remove(OVERLAY_ELEMENT_ID);
    }

    /// Text for the copy button. `None` when there is nothing to copy.
    pub fn copy_text(&self) -> Option<String> {
        self.view()
            .and_then(|v| v.refined)
            .filter(|text| !text.is_empty())
    }

    pub fn action_url(&self, action: OverlayAction) -> Option<String> {
        if self.base_url.is_empty() {
            return None;
        }
        let base = trim_base_url(&self.base_url);
        Some(match action {
            OverlayAction::Login => format!("{}/login", base),
            OverlayAction::Upgrade => format!("{}/pricing", base),
        })
    }

    pub fn has_pending_dismiss(&self) -> bool {
        self.hide_timer
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    fn cancel_timer(&mut self) {
        if let Some(handle) = self.hide_timer.take() {
            handle.abort();
        }
    }

    /// A dismiss that has already woken when a newer render lands is not abortable,
    /// so it only removes the panel it was scheduled for.
    fn start_timer(&mut self, revision: u64) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("No runtime for overlay auto-dismiss; panel stays until closed");
            return;
        };
        let document = self.document.clone();
        let task = runtime.spawn(async move {
            tokio::time::sleep(AUTO_DISMISS).await;
            if !document.remove_if_unchanged(OVERLAY_ELEMENT_ID, revision) {
                debug!("Overlay was redrawn; skipping stale auto-dismiss");
            }
        });
        self.hide_timer = Some(task.abort_handle());
    }
}

impl Drop for OverlayRenderer {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}
