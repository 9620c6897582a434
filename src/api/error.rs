use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("API error ({status}): {body}")]
    Http { status: u16, body: Value },
    #[error("Request timeout - please try again")]
    Timeout,
    #[error("Network error: {0}")]
    Network(String),
    #[error("Failed to parse response: {0}")]
    Decode(String),
    #[error("Failed to create HTTP client: {0}")]
    Client(String),
}

impl ApiError {
    pub(crate) fn from_transport(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::Network(e.to_string())
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn body(&self) -> Option<&Value> {
        match self {
            ApiError::Http { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Structured view for callers that render the failure.
    pub fn failure(&self) -> Failure {
        let kind = match self {
            ApiError::Http { status, body } => {
                let limit = body.get("limit").and_then(Value::as_u64);
                match body.get("error").and_then(Value::as_str) {
                    Some("daily_limit_reached") => FailureKind::DailyLimit { limit },
                    Some("monthly_limit_reached") => FailureKind::MonthlyLimit { limit },
                    _ if *status == 401 => FailureKind::Unauthenticated,
                    _ => FailureKind::Generic,
                }
            }
            ApiError::Timeout => FailureKind::Timeout,
            ApiError::Network(_) | ApiError::Decode(_) | ApiError::Client(_) => FailureKind::Generic,
        };
        Failure { kind }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitKind {
    Daily,
    Monthly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    DailyLimit { limit: Option<u64> },
    MonthlyLimit { limit: Option<u64> },
    Unauthenticated,
    Timeout,
    Generic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Failure {
    pub kind: FailureKind,
}

impl Failure {
    pub fn needs_login(&self) -> bool {
        matches!(self.kind, FailureKind::Unauthenticated)
    }

    pub fn needs_upgrade(&self) -> Option<LimitKind> {
        match self.kind {
            FailureKind::DailyLimit { .. } => Some(LimitKind::Daily),
            FailureKind::MonthlyLimit { .. } => Some(LimitKind::Monthly),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unauthorized_needs_login_only() {
        let err = ApiError::Http {
            status: 401,
            body: json!({}),
        };
        let failure = err.failure();
        assert!(failure.needs_login());
        assert_eq!(failure.needs_upgrade(), None);
    }

    #[test]
    fn daily_limit_needs_upgrade_only() {
        for status in [400, 402, 429, 500] {
            let err = ApiError::Http {
                status,
                body: json!({ "error": "daily_limit_reached", "limit": 10 }),
            };
            let failure = err.failure();
            assert_eq!(failure.kind, FailureKind::DailyLimit { limit: Some(10) });
            assert_eq!(failure.needs_upgrade(), Some(LimitKind::Daily));
            assert!(!failure.needs_login());
        }
    }

    #[test]
    fn quota_body_wins_over_401() {
        let err = ApiError::Http {
            status: 401,
            body: json!({ "error": "monthly_limit_reached", "limit": 300 }),
        };
        assert_eq!(err.failure().needs_upgrade(), Some(LimitKind::Monthly));
        assert!(!err.failure().needs_login());
    }

    #[test]
    fn transport_failures_are_generic_or_timeout() {
        assert_eq!(ApiError::Timeout.failure().kind, FailureKind::Timeout);
        assert_eq!(
            ApiError::Network("reset".into()).failure().kind,
            FailureKind::Generic
        );
        assert_eq!(
            ApiError::Http {
                status: 500,
                body: json!({ "error": "boom" })
            }
            .failure()
            .kind,
            FailureKind::Generic
        );
    }
}
