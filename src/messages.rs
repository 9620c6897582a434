//! Messages exchanged between page, background relay and popup.

use crate::context_detection::PageContext;
use serde::{Deserialize, Serialize};

pub type TabId = u32;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Message {
    ContextUpdate { ctx: PageContext },
    GetCurrentContext,
    Ping,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Response {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ctx: Option<PageContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn ack() -> Self {
        Self {
            ok: true,
            ..Default::default()
        }
    }

    pub fn with_context(ctx: PageContext) -> Self {
        Self {
            ok: true,
            ctx: Some(ctx),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            ctx: None,
            error: Some(error.into()),
        }
    }
}
