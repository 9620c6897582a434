pub mod api;
pub mod context_detection;
pub mod i18n;
pub mod messages;
pub mod oauth;
pub mod overlay;
pub mod platform;
pub mod popup;
pub mod relay;
pub mod settings;
pub mod tabs;

pub use context_detection::{classify, ContextSource, PageContext};
pub use relay::Relay;
pub use settings::{LogLevel, Preferences, SettingsStore};

/// Installs the stderr logger. `RUST_LOG` wins over the stored level when set.
pub fn init_logging(level: LogLevel) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level.into());
    builder.filter_module("tungstenite", log::LevelFilter::Warn);
    builder.filter_module("hyper", log::LevelFilter::Warn);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.target(env_logger::Target::Stderr);
    if let Err(e) = builder.try_init() {
        eprintln!("Logger already initialized: {}", e);
    }
}
