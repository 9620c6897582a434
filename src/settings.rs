use crate::context_detection::ContextSource;
use log::{debug, warn};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const SETTINGS_STORE_PATH: &str = "lexinoa_settings.json";
pub const PROD_BASE_URL: &str = "https://www.lexinoa.com";
pub const LOCAL_BASE_URL: &str = "http://127.0.0.1:5000";
const LOCALHOST_BASE_URL: &str = "http://localhost:5000";

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

// Custom deserializer to handle both old numeric format (1-5) and new string format ("trace", "debug", etc.)
impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct LogLevelVisitor;

        impl<'de> Visitor<'de> for LogLevelVisitor {
            type Value = LogLevel;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a string or integer representing log level")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<LogLevel, E> {
                match value.to_lowercase().as_str() {
                    "trace" => Ok(LogLevel::Trace),
                    "debug" => Ok(LogLevel::Debug),
                    "info" => Ok(LogLevel::Info),
                    "warn" => Ok(LogLevel::Warn),
                    "error" => Ok(LogLevel::Error),
                    _ => Err(E::unknown_variant(
                        value,
                        &["trace", "debug", "info", "warn", "error"],
                    )),
                }
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<LogLevel, E> {
                match value {
                    1 => Ok(LogLevel::Trace),
                    2 => Ok(LogLevel::Debug),
                    3 => Ok(LogLevel::Info),
                    4 => Ok(LogLevel::Warn),
                    5 => Ok(LogLevel::Error),
                    _ => Err(E::invalid_value(de::Unexpected::Unsigned(value), &"1-5")),
                }
            }
        }

        deserializer.deserialize_any(LogLevelVisitor)
    }
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Prod,
    Local,
}

impl Environment {
    pub fn base_url(&self) -> &'static str {
        match self {
            Environment::Prod => PROD_BASE_URL,
            Environment::Local => LOCAL_BASE_URL,
        }
    }

    pub fn detect(base_url: &str) -> Self {
        let base = trim_base_url(base_url);
        if base == LOCAL_BASE_URL || base == LOCALHOST_BASE_URL {
            Environment::Local
        } else {
            Environment::Prod
        }
    }
}

/// Context selector value: follow the active tab, or pin a fixed source.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContextMode {
    #[default]
    Auto,
    Fixed(ContextSource),
}

impl ContextMode {
    pub fn parse(value: &str) -> Option<Self> {
        if value.trim().eq_ignore_ascii_case("auto") {
            return Some(ContextMode::Auto);
        }
        ContextSource::parse(value).map(ContextMode::Fixed)
    }
}

/// Preferences applied to context-menu rewrites.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectionDefaults {
    #[serde(default, rename = "selected_categories")]
    pub categories: Vec<String>,
    #[serde(default, rename = "selected_tones")]
    pub tones: Vec<String>,
    #[serde(default, rename = "honorific_checked")]
    pub honorific: bool,
    #[serde(default, rename = "opener_checked")]
    pub opener: bool,
    #[serde(default, rename = "emoji_checked")]
    pub emoji: bool,
}

/// PKCE values kept only while a connect flow is in flight.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PendingOAuth {
    pub state: String,
    pub code_verifier: String,
    pub redirect_uri: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Preferences {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub theme: Theme,
    #[serde(default)]
    pub ui_language: Option<String>,
    #[serde(default)]
    pub site_language: Option<String>,
    #[serde(default)]
    pub selection_defaults: Option<SelectionDefaults>,
    #[serde(default)]
    pub selection_template_id: u64,
    #[serde(default)]
    pub selection_template_title: Option<String>,
    #[serde(default)]
    pub context_mode: ContextMode,
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,
    #[serde(default = "default_bridge_port")]
    pub bridge_port: u16,
    #[serde(default)]
    pub pending_oauth: Option<PendingOAuth>,
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

fn default_bridge_port() -> u16 {
    crate::context_detection::browser_bridge::DEFAULT_BRIDGE_PORT
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            base_url: None,
            access_token: None,
            theme: Theme::default(),
            ui_language: None,
            site_language: None,
            selection_defaults: None,
            selection_template_id: 0,
            selection_template_title: None,
            context_mode: ContextMode::default(),
            log_level: default_log_level(),
            bridge_port: default_bridge_port(),
            pending_oauth: None,
        }
    }
}

impl Preferences {
    pub fn base_url(&self) -> String {
        match self.base_url.as_deref() {
            Some(url) if !url.trim().is_empty() => url.to_string(),
            _ => PROD_BASE_URL.to_string(),
        }
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref().filter(|t| !t.is_empty())
    }
}

pub fn trim_base_url(url: &str) -> &str {
    url.trim().trim_end_matches('/')
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("settings io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings encode error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug)]
enum Backing {
    File(PathBuf),
    Memory(Mutex<serde_json::Value>),
}

/// Durable preference storage. File-backed stores keep one JSON object under the
/// `settings` key; memory stores are for tests and headless embedding.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    backing: Arc<Backing>,
}

impl SettingsStore {
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self {
            backing: Arc::new(Backing::File(path.as_ref().to_path_buf())),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            backing: Arc::new(Backing::Memory(Mutex::new(serde_json::Value::Null))),
        }
    }

    fn read_value(&self) -> Option<serde_json::Value> {
        match self.backing.as_ref() {
            Backing::File(path) => {
                let raw = std::fs::read_to_string(path).ok()?;
                match serde_json::from_str::<serde_json::Value>(&raw) {
                    Ok(value) => value.get("settings").cloned(),
                    Err(e) => {
                        warn!("Failed to parse settings file {}: {}", path.display(), e);
                        None
                    }
                }
            }
            Backing::Memory(value) => value
                .lock()
                .ok()
                .map(|guard| guard.clone())
                .filter(|v| !v.is_null()),
        }
    }

    /// Loads preferences, falling back to defaults when nothing usable is stored. A
    /// field that fails to parse falls back on its own; the rest are kept.
    pub fn load(&self) -> Preferences {
        match self.read_value() {
            Some(value) => match serde_json::from_value::<Preferences>(value.clone()) {
                Ok(prefs) => prefs,
                Err(e) => {
                    warn!("Failed to parse settings: {}", e);
                    salvage(value)
                }
            },
            None => {
                debug!("No stored settings, using defaults");
                Preferences::default()
            }
        }
    }

    pub fn save(&self, prefs: &Preferences) -> Result<(), SettingsError> {
        let value = serde_json::to_value(prefs)?;
        match self.backing.as_ref() {
            Backing::File(path) => {
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)?;
                    }
                }
                let body = serde_json::to_string_pretty(&serde_json::json!({ "settings": value }))?;
                std::fs::write(path, body)?;
            }
            Backing::Memory(slot) => {
                if let Ok(mut guard) = slot.lock() {
                    *guard = value;
                }
            }
        }
        Ok(())
    }

    /// Read-modify-write helper.
    pub fn update<F>(&self, f: F) -> Result<Preferences, SettingsError>
    where
        F: FnOnce(&mut Preferences),
    {
        let mut prefs = self.load();
        f(&mut prefs);
        self.save(&prefs)?;
        Ok(prefs)
    }
}

fn salvage(value: serde_json::Value) -> Preferences {
    let serde_json::Value::Object(fields) = value else {
        return Preferences::default();
    };
    let readable: serde_json::Map<String, serde_json::Value> = fields
        .into_iter()
        .filter(|(key, field)| {
            let single = serde_json::json!({ key.as_str(): field });
            match serde_json::from_value::<Preferences>(single) {
                Ok(_) => true,
                Err(e) => {
                    warn!("Dropping unreadable setting '{}': {}", key, e);
                    false
                }
            }
        })
        .collect();
    serde_json::from_value(serde_json::Value::Object(readable)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_accepts_numbers_and_names() {
        let lvl: LogLevel = serde_json::from_str("2").unwrap();
        assert_eq!(lvl, LogLevel::Debug);
        let lvl: LogLevel = serde_json::from_str("\"WARN\"").unwrap();
        assert_eq!(lvl, LogLevel::Warn);
        assert!(serde_json::from_str::<LogLevel>("9").is_err());
    }

    #[test]
    fn defaults_point_at_production() {
        let prefs = Preferences::default();
        assert_eq!(prefs.base_url(), PROD_BASE_URL);
        assert_eq!(prefs.context_mode, ContextMode::Auto);
        assert_eq!(prefs.theme, Theme::Light);
        assert!(prefs.access_token().is_none());
    }

    #[test]
    fn environment_detection_ignores_trailing_slashes() {
        assert_eq!(Environment::detect("http://127.0.0.1:5000/"), Environment::Local);
        assert_eq!(Environment::detect("http://localhost:5000"), Environment::Local);
        assert_eq!(Environment::detect("https://www.lexinoa.com//"), Environment::Prod);
    }

    #[test]
    fn context_mode_parsing() {
        assert_eq!(ContextMode::parse("auto"), Some(ContextMode::Auto));
        assert_eq!(
            ContextMode::parse("slack"),
            Some(ContextMode::Fixed(ContextSource::Slack))
        );
        assert_eq!(ContextMode::parse("nope"), None);
    }

    #[test]
    fn selection_defaults_use_request_field_names() {
        let defaults: SelectionDefaults = serde_json::from_value(serde_json::json!({
            "selected_categories": ["work"],
            "selected_tones": ["friendly"],
            "honorific_checked": true
        }))
        .unwrap();
        assert_eq!(defaults.categories, vec!["work"]);
        assert!(defaults.honorific);
        assert!(!defaults.emoji);
    }

    #[test]
    fn file_store_round_trip_and_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(SETTINGS_STORE_PATH);
        let store = SettingsStore::open(&path);

        assert_eq!(store.load().base_url(), PROD_BASE_URL);

        store
            .update(|p| {
                p.base_url = Some(LOCAL_BASE_URL.to_string());
                p.theme = Theme::Dark;
            })
            .unwrap();
        let loaded = store.load();
        assert_eq!(loaded.base_url(), LOCAL_BASE_URL);
        assert_eq!(loaded.theme, Theme::Dark);

        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(store.load().base_url(), PROD_BASE_URL);
    }

    #[test]
    fn one_bad_field_does_not_wipe_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_STORE_PATH);
        std::fs::write(
            &path,
            serde_json::json!({
                "settings": {
                    "base_url": LOCAL_BASE_URL,
                    "access_token": "tok",
                    "theme": "blue",
                    "selection_defaults": { "selected_tones": ["polite"] }
                }
            })
            .to_string(),
        )
        .unwrap();
        let store = SettingsStore::open(&path);

        let loaded = store.load();
        assert_eq!(loaded.theme, Theme::Light);
        assert_eq!(loaded.base_url(), LOCAL_BASE_URL);
        assert_eq!(loaded.access_token(), Some("tok"));

        store.update(|p| p.ui_language = Some("en".into())).unwrap();
        let saved = store.load();
        assert_eq!(saved.access_token(), Some("tok"));
        assert_eq!(saved.base_url(), LOCAL_BASE_URL);
        assert_eq!(saved.ui_language.as_deref(), Some("en"));
        assert_eq!(saved.selection_defaults.unwrap().tones, vec!["polite"]);
    }

    #[test]
    fn memory_store_keeps_values() {
        let store = SettingsStore::in_memory();
        store
            .update(|p| p.access_token = Some("tok".to_string()))
            .unwrap();
        assert_eq!(store.load().access_token(), Some("tok"));
    }
}
