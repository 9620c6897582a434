use super::{ApiClient, ApiError};
use log::debug;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Guest,
    Free,
    Pro,
}

impl Tier {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pro" => Tier::Pro,
            "free" => Tier::Free,
            _ => Tier::Guest,
        }
    }

    pub fn is_pro(&self) -> bool {
        matches!(self, Tier::Pro)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Tier::Guest => "Guest",
            Tier::Free => "Free",
            Tier::Pro => "Pro",
        }
    }

    pub fn default_output_count(&self) -> u32 {
        if self.is_pro() {
            3
        } else {
            1
        }
    }
}

impl<'de> Deserialize<'de> for Tier {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.map(|s| Tier::parse(&s)).unwrap_or_default())
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn loose_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Cached view of the server's auth status. Never authoritative.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthState {
    #[serde(default)]
    pub logged_in: bool,
    #[serde(default)]
    pub tier: Tier,
    #[serde(default, deserialize_with = "loose_id")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default, rename = "n_outputs")]
    pub output_count: u32,
}

impl AuthState {
    pub fn guest() -> Self {
        Self {
            logged_in: false,
            tier: Tier::Guest,
            user_id: None,
            email: None,
            email_verified: false,
            output_count: 1,
        }
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::guest()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    #[serde(default)]
    pub used: u64,
    #[serde(default)]
    pub limit: u64,
    #[serde(default = "default_scope", deserialize_with = "scope_or_default")]
    pub scope: String,
}

fn default_scope() -> String {
    "rewrite".to_string()
}

fn scope_or_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(default_scope))
}

impl Default for Usage {
    fn default() -> Self {
        Self {
            used: 0,
            limit: 0,
            scope: default_scope(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Template {
    pub id: u64,
    #[serde(default, deserialize_with = "nullable_string")]
    pub title: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub category: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub tone: String,
    #[serde(default)]
    pub honorific: bool,
    #[serde(default)]
    pub opener: bool,
    #[serde(default)]
    pub emoji: bool,
}

impl Template {
    pub fn display_title(&self) -> String {
        if self.title.is_empty() {
            format!("템플릿 #{}", self.id)
        } else {
            self.title.clone()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct NewTemplate {
    pub title: String,
    pub category: String,
    pub tone: String,
    pub honorific: bool,
    pub opener: bool,
    pub emoji: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryItem {
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "nullable_string")]
    pub input_text: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub output_text: String,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TokenResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Items<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

fn decode<T: serde::de::DeserializeOwned>(body: Value, what: &str) -> Result<T, ApiError> {
    serde_json::from_value(body).map_err(|e| {
        debug!("Failed to decode {}: {}", what, e);
        ApiError::Decode(format!("{}: {}", what, e))
    })
}

impl ApiClient {
    pub async fn auth_status(&self) -> Result<AuthState, ApiError> {
        let body = self.get_json("/api/auth/status").await?;
        let mut state: AuthState = decode(body, "auth status")?;
        if state.output_count == 0 {
            state.output_count = state.tier.default_output_count();
        }
        Ok(state)
    }

    pub async fn usage(&self) -> Result<Usage, ApiError> {
        let body = self.get_json("/api/usage?scope=rewrite").await?;
        decode(body, "usage")
    }

    pub async fn list_templates(&self) -> Result<Vec<Template>, ApiError> {
        let body = self.get_json("/api/user_templates").await?;
        Ok(decode::<Items<Template>>(body, "templates")?.items)
    }

    pub async fn create_template(&self, template: &NewTemplate) -> Result<(), ApiError> {
        self.post_json("/api/user_templates", template).await?;
        Ok(())
    }

    pub async fn delete_template(&self, id: u64) -> Result<(), ApiError> {
        self.delete(&format!("/api/user_templates/{}", id)).await?;
        Ok(())
    }

    pub async fn history(&self, limit: u32) -> Result<Vec<HistoryItem>, ApiError> {
        let body = self.get_json(&format!("/api/history?limit={}", limit)).await?;
        Ok(decode::<Items<HistoryItem>>(body, "history")?.items)
    }

    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse, ApiError> {
        let body = self
            .post_json(
                "/extension/oauth/token",
                &serde_json::json!({
                    "code": code,
                    "code_verifier": code_verifier,
                    "redirect_uri": redirect_uri,
                }),
            )
            .await?;
        decode(body, "token response")
    }
}
