pub mod browser_bridge;
pub mod classifier;
pub mod publisher;
pub mod store;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use classifier::classify;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ContextSource {
    Gmail,
    Slack,
    NaverMail,
    Outlook,
    Teams,
    Kakao,
    Generic,
}

impl ContextSource {
    pub const ALL: [ContextSource; 7] = [
        ContextSource::Gmail,
        ContextSource::Slack,
        ContextSource::NaverMail,
        ContextSource::Outlook,
        ContextSource::Teams,
        ContextSource::Kakao,
        ContextSource::Generic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContextSource::Gmail => "gmail",
            ContextSource::Slack => "slack",
            ContextSource::NaverMail => "naver_mail",
            ContextSource::Outlook => "outlook",
            ContextSource::Teams => "teams",
            ContextSource::Kakao => "kakao",
            ContextSource::Generic => "generic",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        Self::ALL.into_iter().find(|source| source.as_str() == s)
    }

    pub fn display_label(&self) -> &'static str {
        match self {
            ContextSource::Gmail => "Gmail 메일",
            ContextSource::Slack => "Slack 채팅",
            ContextSource::NaverMail => "네이버 메일",
            ContextSource::Outlook => "Outlook 메일",
            ContextSource::Teams => "Microsoft Teams",
            ContextSource::Kakao => "카카오톡/카카오",
            ContextSource::Generic => "일반 사이트",
        }
    }

    /// Suggested `(category, tone)` for text written on this kind of site.
    pub fn suggested_defaults(&self) -> (&'static str, &'static str) {
        match self {
            ContextSource::Gmail | ContextSource::NaverMail | ContextSource::Outlook => {
                ("work", "polite")
            }
            ContextSource::Slack | ContextSource::Teams => ("work", "friendly"),
            ContextSource::Kakao => ("general", "friendly"),
            ContextSource::Generic => ("general", "polite"),
        }
    }
}

impl fmt::Display for ContextSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified site context for one page. Recomputed on every navigation and
/// replaced wholesale wherever it is cached.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PageContext {
    pub source: ContextSource,
    pub label: String,
    pub suggested_category: String,
    pub suggested_tone: String,
}

impl PageContext {
    pub fn for_source(source: ContextSource) -> Self {
        let (category, tone) = source.suggested_defaults();
        Self {
            source,
            label: source.display_label().to_string(),
            suggested_category: category.to_string(),
            suggested_tone: tone.to_string(),
        }
    }
}

impl Default for PageContext {
    fn default() -> Self {
        Self::for_source(ContextSource::Generic)
    }
}
