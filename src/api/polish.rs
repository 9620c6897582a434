use super::{ApiClient, ApiError};
use crate::context_detection::{ContextSource, PageContext};
use crate::settings::SelectionDefaults;
use log::{debug, info};
use serde::Serialize;
use serde_json::Value;

pub const DEFAULT_PROVIDER: &str = "claude";
const POLITE: &str = "polite";
const FRIENDLY: &str = "friendly";

/// One rewrite call. Built fresh per call and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteRequest {
    pub input_text: String,
    pub categories: Vec<String>,
    pub tones: Vec<String>,
    pub honorific: bool,
    pub opener: bool,
    pub emoji: bool,
    pub provider_id: String,
    pub context: Option<PageContext>,
}

impl RewriteRequest {
    pub fn new(input_text: impl Into<String>) -> Self {
        Self {
            input_text: input_text.into(),
            categories: Vec::new(),
            tones: Vec::new(),
            honorific: false,
            opener: false,
            emoji: false,
            provider_id: DEFAULT_PROVIDER.to_string(),
            context: None,
        }
    }

    /// Request for a context-menu rewrite. Without stored defaults nothing is
    /// preselected, whatever the site context suggests.
    pub fn from_selection(input_text: impl Into<String>, defaults: Option<&SelectionDefaults>) -> Self {
        let mut request = Self::new(input_text);
        if let Some(defaults) = defaults {
            request.categories = defaults.categories.clone();
            request.tones = defaults.tones.clone();
            request.honorific = defaults.honorific;
            request.opener = defaults.opener;
            request.emoji = defaults.emoji;
        }
        request
    }

    pub fn with_context(mut self, context: PageContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn into_body(self) -> PolishBody {
        let tones = if self.honorific {
            merge_honorific_tones(self.tones)
        } else {
            self.tones
        };
        let (context_source, context_label) = match self.context {
            Some(ctx) => (Some(ctx.source), Some(ctx.label)),
            None => (None, None),
        };

        PolishBody {
            input_text: self.input_text,
            selected_categories: self.categories,
            selected_tones: tones,
            honorific_checked: self.honorific,
            opener_checked: self.opener,
            emoji_checked: self.emoji,
            provider: self.provider_id,
            context_source,
            context_label,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PolishBody {
    pub input_text: String,
    pub selected_categories: Vec<String>,
    pub selected_tones: Vec<String>,
    pub honorific_checked: bool,
    pub opener_checked: bool,
    pub emoji_checked: bool,
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_source: Option<ContextSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_label: Option<String>,
}

/// Honorific speech must read as polite: `friendly` becomes `polite`, duplicates are
/// dropped, and `polite` is appended when missing.
pub fn merge_honorific_tones(tones: Vec<String>) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(tones.len() + 1);
    for tone in tones {
        let tone = if tone == FRIENDLY { POLITE.to_string() } else { tone };
        if !merged.contains(&tone) {
            merged.push(tone);
        }
    }
    if !merged.iter().any(|t| t == POLITE) {
        merged.push(POLITE.to_string());
    }
    merged
}

/// Accepts `{outputs: [...]}` or `{output_text: "..."}`; anything else is empty.
pub fn normalize_outputs(body: &Value) -> Vec<String> {
    if let Some(outputs) = body.get("outputs").and_then(Value::as_array) {
        return outputs
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
    }
    match body.get("output_text").and_then(Value::as_str) {
        Some(text) if !text.is_empty() => vec![text.to_string()],
        _ => Vec::new(),
    }
}

impl ApiClient {
    pub async fn polish(&self, request: RewriteRequest) -> Result<Vec<String>, ApiError> {
        let body = request.into_body();
        info!(
            "Polish request: chars={}, categories={:?}, tones={:?}",
            body.input_text.chars().count(),
            body.selected_categories,
            body.selected_tones
        );

        let response = self.post_json("/api/polish", &body).await?;
        let outputs = normalize_outputs(&response);
        debug!("Polish returned {} output(s)", outputs.len());
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context_detection::classify;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn honorific_replaces_friendly() {
        assert_eq!(merge_honorific_tones(strings(&["friendly"])), strings(&["polite"]));
    }

    #[test]
    fn honorific_defaults_to_polite() {
        assert_eq!(merge_honorific_tones(Vec::new()), strings(&["polite"]));
    }

    #[test]
    fn honorific_keeps_other_tones_and_dedups() {
        assert_eq!(
            merge_honorific_tones(strings(&["soft", "friendly", "polite", "concise"])),
            strings(&["soft", "polite", "concise"])
        );
        assert_eq!(
            merge_honorific_tones(strings(&["concise"])),
            strings(&["concise", "polite"])
        );
    }

    #[test]
    fn tones_untouched_without_honorific() {
        let mut request = RewriteRequest::new("hi");
        request.tones = strings(&["friendly"]);
        assert_eq!(request.into_body().selected_tones, strings(&["friendly"]));
    }

    #[test]
    fn output_normalization() {
        assert_eq!(normalize_outputs(&json!({ "output_text": "X" })), strings(&["X"]));
        assert_eq!(
            normalize_outputs(&json!({ "outputs": ["A", "B"] })),
            strings(&["A", "B"])
        );
        assert!(normalize_outputs(&json!({})).is_empty());
        assert!(normalize_outputs(&json!({ "output_text": "" })).is_empty());
        assert!(normalize_outputs(&json!({ "outputs": [] , "output_text": "X" })).is_empty());
    }

    #[test]
    fn selection_without_defaults_is_neutral() {
        let body = RewriteRequest::from_selection("text", None).into_body();
        assert!(body.selected_categories.is_empty());
        assert!(body.selected_tones.is_empty());
        assert!(!body.honorific_checked);
        assert_eq!(body.provider, DEFAULT_PROVIDER);
        let value = serde_json::to_value(&body).unwrap();
        assert!(value.get("context_source").is_none());
    }

    #[test]
    fn context_fields_are_serialized_when_present() {
        let body = RewriteRequest::new("t")
            .with_context(classify("https://mail.google.com"))
            .into_body();
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["context_source"], "gmail");
        assert_eq!(value["context_label"], "Gmail 메일");
    }

    #[tokio::test]
    async fn polish_posts_body_and_normalizes() {
        let mock_server = MockServer::start().await;
        let defaults = SelectionDefaults {
            categories: strings(&["work"]),
            tones: strings(&["friendly"]),
            honorific: true,
            opener: true,
            emoji: false,
        };

        Mock::given(method("POST"))
            .and(path("/api/polish"))
            .and(body_json(json!({
                "input_text": "보내 주세요",
                "selected_categories": ["work"],
                "selected_tones": ["polite"],
                "honorific_checked": true,
                "opener_checked": true,
                "emoji_checked": false,
                "provider": "claude"
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "outputs": ["하나", "둘", "셋"] })),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = ApiClient::new(mock_server.uri(), None).unwrap();
        let outputs = client
            .polish(RewriteRequest::from_selection("보내 주세요", Some(&defaults)))
            .await
            .unwrap();
        assert_eq!(outputs, strings(&["하나", "둘", "셋"]));
    }

    #[tokio::test]
    async fn polish_malformed_success_is_empty() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/polish"))
            .respond_with(ResponseTemplate::new(200).set_body_string("oops"))
            .mount(&mock_server)
            .await;

        let client = ApiClient::new(mock_server.uri(), None).unwrap();
        let outputs = client.polish(RewriteRequest::new("x")).await.unwrap();
        assert!(outputs.is_empty());
    }

    #[tokio::test]
    async fn polish_quota_error_carries_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/polish"))
            .respond_with(
                ResponseTemplate::new(429)
                    .set_body_json(json!({ "error": "daily_limit_reached", "limit": 10 })),
            )
            .mount(&mock_server)
            .await;

        let client = ApiClient::new(mock_server.uri(), None).unwrap();
        let err = client.polish(RewriteRequest::new("x")).await.unwrap_err();
        assert_eq!(err.status(), Some(429));
        assert_eq!(
            err.failure().needs_upgrade(),
            Some(super::super::LimitKind::Daily)
        );
    }
}
