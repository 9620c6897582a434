use anyhow::Context;
use lexinoa_lib::context_detection::browser_bridge::BrowserBridge;
use lexinoa_lib::context_detection::store::{ContextStore, Inbox};
use lexinoa_lib::i18n::Lang;
use lexinoa_lib::platform::MenuRegistry;
use lexinoa_lib::settings::SETTINGS_STORE_PATH;
use lexinoa_lib::tabs::LocalTabs;
use lexinoa_lib::{init_logging, Relay, SettingsStore};
use log::info;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| SETTINGS_STORE_PATH.to_string());
    let settings = SettingsStore::open(&path);
    let prefs = settings.load();
    init_logging(prefs.log_level);

    let inbox = Inbox::new(ContextStore::new());
    let lang = Lang::from_override(prefs.ui_language.as_deref());
    let tabs = Arc::new(LocalTabs::new(inbox.clone(), lang));
    let relay = Relay::new(settings, inbox.clone(), tabs, Arc::new(MenuRegistry::new()));
    relay
        .on_installed()
        .with_context(|| format!("failed to initialize settings at {}", path))?;

    let addr = BrowserBridge::new(inbox, prefs.bridge_port)
        .start()
        .await
        .context("failed to start browser bridge")?;
    info!("Relay ready, pages connect to ws://{}", addr);

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    Ok(())
}
