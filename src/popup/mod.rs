pub mod state;

pub use state::{
    format_timestamp, template_description, Action, PopupState, RewriteForm, StatusBar, View,
};

use crate::api::{
    ApiClient, ApiError, AuthState, NewTemplate, RewriteRequest, Usage, REQUEST_TIMEOUT_SECS,
};
use crate::context_detection::store::ContextStore;
use crate::context_detection::PageContext;
use crate::i18n::Text;
use crate::oauth;
use crate::platform::{TabHost, WebAuthFlow};
use crate::settings::{ContextMode, Environment, SelectionDefaults, SettingsStore, Theme};
use log::{debug, warn};
use reqwest::cookie::Jar;
use std::sync::Arc;
use std::time::Duration;

pub const HISTORY_LIMIT: u32 = 20;

/// A rewrite that has been validated and numbered but not yet sent.
pub struct PendingRewrite {
    pub generation: u64,
    client: ApiClient,
    request: RewriteRequest,
}

impl PendingRewrite {
    pub fn request(&self) -> &RewriteRequest {
        &self.request
    }

    pub async fn send(self) -> (u64, Result<Vec<String>, ApiError>) {
        let result = self.client.polish(self.request).await;
        (self.generation, result)
    }
}

/// Drives the popup: loads preferences, talks to the server and the active tab, and
/// feeds every result through [`PopupState::apply`].
pub struct PopupController {
    state: PopupState,
    settings: SettingsStore,
    session: Option<ContextStore>,
    tabs: Arc<dyn TabHost>,
    auth_flow: Arc<dyn WebAuthFlow>,
    jar: Arc<Jar>,
}

impl PopupController {
    /// `session` is `None` where session storage is not available.
    pub fn new(
        settings: SettingsStore,
        session: Option<ContextStore>,
        tabs: Arc<dyn TabHost>,
        auth_flow: Arc<dyn WebAuthFlow>,
    ) -> Self {
        let state = PopupState::from_preferences(&settings.load());
        Self {
            state,
            settings,
            session,
            tabs,
            auth_flow,
            jar: Arc::new(Jar::default()),
        }
    }

    pub fn with_cookie_jar(mut self, jar: Arc<Jar>) -> Self {
        self.jar = jar;
        self
    }

    pub fn state(&self) -> &PopupState {
        &self.state
    }

    pub fn dispatch(&mut self, action: Action) {
        self.state.apply(action);
    }

    fn client_with_token(&self, token: Option<String>) -> Result<ApiClient, ApiError> {
        ApiClient::with_options(
            self.state.base_url.clone(),
            token,
            self.jar.clone(),
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        )
    }

    fn client(&self) -> Result<ApiClient, ApiError> {
        let token = self.settings.load().access_token().map(str::to_string);
        self.client_with_token(token)
    }

    fn notify(&mut self, text: Text) {
        self.state.apply(Action::Notice(text));
    }

    pub async fn open(&mut self) {
        let prefs = self.settings.load();
        self.dispatch(Action::PreferencesLoaded(prefs));
        self.refresh_account().await;

        let last_detected = match &self.session {
            Some(store) => store.last_detected().await,
            None => None,
        };
        if let Some(ctx) = last_detected {
            self.dispatch(Action::ContextDetected(ctx));
        }

        if self.state.is_pro() {
            self.refresh_templates().await;
            if self.state.context_mode == ContextMode::Auto {
                self.detect_context().await;
            }
        }
    }

    /// Auth status and usage. Failures fall back to guest and an empty usage line.
    pub async fn refresh_account(&mut self) {
        let client = match self.client() {
            Ok(client) => client,
            Err(e) => {
                warn!("Cannot build API client: {}", e);
                self.dispatch(Action::AuthLoaded(AuthState::guest()));
                self.dispatch(Action::UsageLoaded(Usage::default()));
                return;
            }
        };

        let auth = client.auth_status().await.unwrap_or_else(|e| {
            debug!("Auth status unavailable, treating as guest: {}", e);
            AuthState::guest()
        });
        self.dispatch(Action::AuthLoaded(auth));
        self.refresh_usage_with(&client).await;
    }

    async fn refresh_usage_with(&mut self, client: &ApiClient) {
        let usage = client.usage().await.unwrap_or_else(|e| {
            debug!("Usage unavailable: {}", e);
            Usage::default()
        });
        self.dispatch(Action::UsageLoaded(usage));
    }

    pub async fn refresh_templates(&mut self) {
        let templates = match self.client() {
            Ok(client) => client.list_templates().await.unwrap_or_else(|e| {
                debug!("Template list unavailable: {}", e);
                Vec::new()
            }),
            Err(_) => Vec::new(),
        };
        self.dispatch(Action::TemplatesLoaded(templates));
    }

    /// Asks the active tab for its context, then the relay's per-tab record. Silent
    /// when neither answers.
    pub async fn detect_context(&mut self) -> Option<PageContext> {
        let tab = self.tabs.active_tab().await?;
        let ctx = match self.tabs.query_context(tab.id).await {
            Some(ctx) => Some(ctx),
            None => match &self.session {
                Some(store) => store.get(tab.id).await,
                None => None,
            },
        }?;
        self.dispatch(Action::ContextDetected(ctx.clone()));
        Some(ctx)
    }

    pub async fn select_context(&mut self, mode: ContextMode) {
        self.dispatch(Action::SelectContext(mode));
        let effective = self.state.context_mode;
        if effective == mode {
            if let Err(e) = self.settings.update(|p| p.context_mode = mode) {
                warn!("Failed to persist context mode: {}", e);
            }
        }
        if effective == ContextMode::Auto {
            self.detect_context().await;
        }
    }

    /// Validates the form and numbers the request. `None` when there is nothing to send.
    pub fn begin_rewrite(&mut self) -> Option<PendingRewrite> {
        if self.state.form.input.trim().is_empty() {
            self.notify(Text::EmptyInput);
            return None;
        }
        let client = match self.client() {
            Ok(client) => client,
            Err(e) => {
                warn!("Cannot build API client: {}", e);
                self.notify(Text::RequestFailed);
                return None;
            }
        };
        let request = self
            .state
            .form
            .to_request(Some(self.state.full_context()));
        self.dispatch(Action::RewriteStarted);
        Some(PendingRewrite {
            generation: self.state.generation(),
            client,
            request,
        })
    }

    pub fn complete_rewrite(&mut self, generation: u64, result: Result<Vec<String>, ApiError>) {
        match result {
            Ok(outputs) => self.dispatch(Action::RewriteSucceeded {
                generation,
                outputs,
            }),
            Err(e) => {
                warn!("Popup rewrite failed: {}", e);
                self.dispatch(Action::RewriteFailed {
                    generation,
                    failure: e.failure(),
                })
            }
        }
    }

    pub async fn rewrite(&mut self) -> bool {
        let Some(pending) = self.begin_rewrite() else {
            return false;
        };
        let (generation, result) = pending.send().await;
        let ok = result.is_ok();
        self.complete_rewrite(generation, result);
        if let Ok(client) = self.client() {
            self.refresh_usage_with(&client).await;
        }
        ok
    }

    /// Saves the current form as a template. A blank title uses the suggested one.
    pub async fn save_template_from_current(&mut self, title: Option<&str>) -> bool {
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.state.default_template_title());
        let form = &self.state.form;
        let template = NewTemplate {
            title,
            category: form.categories.first().cloned().unwrap_or_default(),
            tone: form.tones.first().cloned().unwrap_or_default(),
            honorific: form.honorific,
            opener: form.opener,
            emoji: form.emoji,
        };
        self.create_template(template).await
    }

    pub async fn create_template(&mut self, template: NewTemplate) -> bool {
        if !self.state.is_pro() {
            self.notify(Text::TemplatesProOnly);
            return false;
        }
        if template.title.trim().is_empty() {
            self.notify(Text::TemplateTitleRequired);
            return false;
        }
        let result = match self.client() {
            Ok(client) => client.create_template(&template).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => {
                self.refresh_templates().await;
                self.notify(Text::TemplateSaved);
                true
            }
            Err(e) => {
                warn!("Template save failed: {}", e);
                self.notify(Text::TemplateSaveFailed);
                false
            }
        }
    }

    pub fn apply_template(&mut self, id: u64) {
        self.dispatch(Action::ApplyTemplate(id));
    }

    pub async fn delete_template(&mut self, id: u64) -> bool {
        if !self.state.is_pro() {
            self.notify(Text::TemplatesProOnly);
            return false;
        }
        let result = match self.client() {
            Ok(client) => client.delete_template(id).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!("Template delete failed: {}", e);
            self.notify(Text::TemplateDeleteFailed);
            return false;
        }
        if self.state.selection_template_id == id {
            self.store_selection_defaults(self.state.selection_defaults.clone(), 0, None);
        }
        self.refresh_templates().await;
        true
    }

    /// Local selection-defaults record, not linked to any template.
    pub fn save_selection_defaults(&mut self, defaults: SelectionDefaults) {
        self.store_selection_defaults(defaults, 0, None);
        self.notify(Text::SelectionDefaultsSaved);
    }

    /// Makes a template the source of context-menu rewrite defaults.
    pub fn use_template_as_selection_default(&mut self, id: u64) -> bool {
        if !self.state.is_pro() {
            self.notify(Text::TemplatesProOnly);
            return false;
        }
        let Some(template) = self.state.templates.iter().find(|t| t.id == id).cloned() else {
            return false;
        };
        let defaults = SelectionDefaults {
            categories: [template.category.clone()]
                .into_iter()
                .filter(|c| !c.is_empty())
                .collect(),
            tones: [template.tone.clone()]
                .into_iter()
                .filter(|t| !t.is_empty())
                .collect(),
            honorific: template.honorific,
            opener: template.opener,
            emoji: template.emoji,
        };
        self.store_selection_defaults(defaults, id, Some(template.display_title()));
        self.notify(Text::SelectionDefaultsSaved);
        true
    }

    fn store_selection_defaults(
        &mut self,
        defaults: SelectionDefaults,
        template_id: u64,
        template_title: Option<String>,
    ) {
        let persisted = self.settings.update(|p| {
            p.selection_defaults = Some(defaults.clone());
            p.selection_template_id = template_id;
            p.selection_template_title = template_title.clone();
        });
        if let Err(e) = persisted {
            warn!("Failed to persist selection defaults: {}", e);
        }
        self.dispatch(Action::SelectionDefaultsChanged {
            defaults,
            template_id,
            template_title,
        });
    }

    pub async fn load_history(&mut self) {
        self.dispatch(Action::SwitchView(View::History));
        if !self.state.is_pro() {
            self.dispatch(Action::HistoryLoaded(Vec::new()));
            self.notify(Text::HistoryProOnly);
            return;
        }
        let result = match self.client() {
            Ok(client) => client.history(HISTORY_LIMIT).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(items) => self.dispatch(Action::HistoryLoaded(items)),
            Err(e) => {
                warn!("History load failed: {}", e);
                self.dispatch(Action::HistoryLoaded(Vec::new()));
                self.notify(Text::HistoryLoadFailed);
            }
        }
    }

    pub fn load_history_item(&mut self, index: usize) {
        self.dispatch(Action::LoadHistoryItem(index));
    }

    /// OAuth connect. The exchange goes out without any stored bearer token.
    pub async fn connect(&mut self) -> bool {
        let client = match self.client_with_token(None) {
            Ok(client) => client,
            Err(e) => {
                warn!("Cannot build API client: {}", e);
                self.notify(Text::ConnectFailed);
                return false;
            }
        };
        let flow = self.auth_flow.clone();
        match oauth::connect(&self.settings, &client, flow.as_ref()).await {
            Ok(_) => {
                self.refresh_account().await;
                if self.state.is_pro() {
                    self.refresh_templates().await;
                }
                self.notify(Text::Connected);
                true
            }
            Err(e) => {
                warn!("Account connect failed: {}", e);
                self.notify(Text::ConnectFailed);
                false
            }
        }
    }

    pub async fn disconnect(&mut self) {
        if let Err(e) = oauth::disconnect(&self.settings) {
            warn!("Failed to clear access token: {}", e);
        }
        self.refresh_account().await;
        self.notify(Text::Disconnected);
    }

    pub async fn set_environment(&mut self, env: Environment) {
        let url = env.base_url().to_string();
        if let Err(e) = self.settings.update(|p| p.base_url = Some(url.clone())) {
            warn!("Failed to persist base URL: {}", e);
        }
        self.dispatch(Action::BaseUrlChanged(url));
        self.refresh_account().await;
    }

    pub fn environment(&self) -> Environment {
        Environment::detect(&self.state.base_url)
    }

    pub fn set_theme(&mut self, theme: Theme) {
        if let Err(e) = self.settings.update(|p| p.theme = theme) {
            warn!("Failed to persist theme: {}", e);
        }
        self.dispatch(Action::ThemeChanged(theme));
    }

    pub fn set_ui_language(&mut self, lang: Option<String>) {
        let lang = lang.filter(|l| !l.trim().is_empty());
        if let Err(e) = self.settings.update(|p| p.ui_language = lang.clone()) {
            warn!("Failed to persist UI language: {}", e);
        }
        self.dispatch(Action::LanguageChanged(lang));
    }

    pub fn set_site_language(&mut self, lang: Option<String>) {
        if let Err(e) = self.settings.update(|p| p.site_language = lang) {
            warn!("Failed to persist site language: {}", e);
        }
    }

    pub async fn reset_session(&mut self) {
        match self.session.clone() {
            Some(store) => {
                store.clear().await;
                self.notify(Text::SessionCleared);
            }
            None => self.notify(Text::SessionUnavailable),
        }
    }

    pub async fn open_web(&self) {
        self.open_url(self.state.base_url.clone()).await;
    }

    pub async fn open_login(&self) {
        self.open_url(format!("{}/login", crate::settings::trim_base_url(&self.state.base_url)))
            .await;
    }

    async fn open_url(&self, url: String) {
        if let Err(e) = self.tabs.open_tab(&url).await {
            warn!("Failed to open {}: {}", url, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Tier;
    use crate::context_detection::store::Inbox;
    use crate::context_detection::ContextSource;
    use crate::i18n::Lang;
    use crate::platform::PlatformError;
    use crate::tabs::LocalTabs;
    use async_trait::async_trait;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct NoAuth;

    #[async_trait]
    impl WebAuthFlow for NoAuth {
        fn redirect_uri(&self) -> String {
            "https://ext.example/cb".to_string()
        }

        async fn launch(&self, _url: &str) -> Result<String, PlatformError> {
            Err(PlatformError::Cancelled)
        }
    }

    struct Fixture {
        popup: PopupController,
        tabs: Arc<LocalTabs>,
        settings: SettingsStore,
        store: ContextStore,
    }

    fn fixture(base_url: &str) -> Fixture {
        let settings = SettingsStore::in_memory();
        settings
            .update(|p| p.base_url = Some(base_url.to_string()))
            .unwrap();
        let store = ContextStore::new();
        let tabs = Arc::new(LocalTabs::new(Inbox::new(store.clone()), Lang::Ko));
        let popup = PopupController::new(
            settings.clone(),
            Some(store.clone()),
            tabs.clone(),
            Arc::new(NoAuth),
        );
        Fixture {
            popup,
            tabs,
            settings,
            store,
        }
    }

    async fn mount_account(server: &MockServer, tier: &str) {
        Mock::given(method("GET"))
            .and(path("/api/auth/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "logged_in": tier != "guest", "tier": tier
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/usage"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "used": 1, "limit": 30, "scope": "rewrite" })),
            )
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/user_templates"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{ "id": 9, "title": "보고", "category": "report/approval", "tone": "formally", "honorific": true }]
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn open_falls_back_to_guest_when_server_is_down() {
        let mut f = fixture("http://127.0.0.1:9");
        f.popup.open().await;
        let state = f.popup.state();
        assert_eq!(state.tier(), Tier::Guest);
        assert_eq!(state.auth.output_count, 1);
        assert_eq!(state.usage, Usage::default());
        assert!(state.templates.is_empty());
    }

    #[tokio::test]
    async fn pro_open_detects_active_tab_context() {
        let server = MockServer::start().await;
        mount_account(&server, "pro").await;
        let mut f = fixture(&server.uri());
        f.tabs
            .open_page(5, "https://outlook.office.com/mail/", true)
            .await;

        f.popup.open().await;
        let state = f.popup.state();
        assert!(state.is_pro());
        assert_eq!(state.context_mode, ContextMode::Auto);
        assert_eq!(state.context.source, ContextSource::Outlook);
        assert_eq!(state.templates.len(), 1);
        assert_eq!(state.status_bar().tier_label, "Pro");
    }

    #[tokio::test]
    async fn free_open_does_not_query_tabs() {
        let server = MockServer::start().await;
        mount_account(&server, "free").await;
        let mut f = fixture(&server.uri());
        f.tabs.open_page(5, "https://app.slack.com/", true).await;

        f.popup.open().await;
        let state = f.popup.state();
        assert_eq!(state.context_mode, ContextMode::Fixed(ContextSource::Generic));
        assert_eq!(state.context.source, ContextSource::Generic);
        assert!(state.templates.is_empty());

        f.popup.select_context(ContextMode::Auto).await;
        assert!(f.popup.state().upgrade_prompt);
        assert_eq!(f.settings.load().context_mode, ContextMode::Auto);
        assert_eq!(f.popup.state().context.source, ContextSource::Generic);
    }

    #[tokio::test]
    async fn rewrite_sends_form_and_context() {
        let server = MockServer::start().await;
        mount_account(&server, "pro").await;
        Mock::given(method("POST"))
            .and(path("/api/polish"))
            .and(body_partial_json(json!({
                "input_text": "내일 회의 가능?",
                "selected_categories": ["work"],
                "selected_tones": ["polite"],
                "honorific_checked": true,
                "context_source": "gmail"
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "outputs": ["A", "B", "C"] })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut f = fixture(&server.uri());
        f.tabs.open_page(1, "https://mail.google.com/", true).await;
        f.popup.open().await;
        f.popup.dispatch(Action::SetInput(" 내일 회의 가능? ".into()));
        f.popup.dispatch(Action::SetHonorific(true));

        assert!(f.popup.rewrite().await);
        let state = f.popup.state();
        assert_eq!(state.outputs.len(), 3);
        assert_eq!(state.output_note(), Some(Text::OutputNotePro(3).render(Lang::Ko)));
    }

    #[tokio::test]
    async fn empty_input_is_rejected_locally() {
        let mut f = fixture("http://127.0.0.1:9");
        f.popup.dispatch(Action::SetInput("   ".into()));
        assert!(!f.popup.rewrite().await);
        assert_eq!(f.popup.state().notice, Some(Text::EmptyInput));
        assert_eq!(
            f.popup.state().notice_text().as_deref(),
            Some("입력할 문장을 적어주세요.")
        );
        assert_eq!(f.popup.state().generation(), 0);
    }

    #[tokio::test]
    async fn older_rewrite_cannot_overwrite_newer() {
        let mut f = fixture("http://127.0.0.1:9");
        f.popup.dispatch(Action::SetInput("first".into()));
        let first = f.popup.begin_rewrite().unwrap();
        f.popup.dispatch(Action::SetInput("second".into()));
        let second = f.popup.begin_rewrite().unwrap();
        assert_eq!(second.request().input_text, "second");

        f.popup
            .complete_rewrite(second.generation, Ok(vec!["second result".into()]));
        f.popup
            .complete_rewrite(first.generation, Ok(vec!["first result".into()]));
        assert_eq!(f.popup.state().outputs, vec!["second result"]);
    }

    #[tokio::test]
    async fn templates_are_gated_for_free_users() {
        let server = MockServer::start().await;
        mount_account(&server, "free").await;
        Mock::given(method("POST"))
            .and(path("/api/user_templates"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut f = fixture(&server.uri());
        f.popup.open().await;
        assert!(!f.popup.save_template_from_current(None).await);
        assert_eq!(f.popup.state().notice, Some(Text::TemplatesProOnly));
        assert!(!f.popup.use_template_as_selection_default(9));

        f.popup.save_selection_defaults(SelectionDefaults {
            tones: vec!["soft".into()],
            ..Default::default()
        });
        let prefs = f.settings.load();
        assert_eq!(prefs.selection_defaults.unwrap().tones, vec!["soft"]);
        assert_eq!(prefs.selection_template_id, 0);
    }

    #[tokio::test]
    async fn pro_saves_template_with_default_title() {
        let server = MockServer::start().await;
        mount_account(&server, "pro").await;
        Mock::given(method("POST"))
            .and(path("/api/user_templates"))
            .and(body_partial_json(json!({
                "title": "일반 사이트 · 감사",
                "category": "thanks",
                "tone": "warmly"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
            .expect(1)
            .mount(&server)
            .await;

        let mut f = fixture(&server.uri());
        f.popup.open().await;
        f.popup.dispatch(Action::SelectContext(ContextMode::Fixed(ContextSource::Generic)));
        f.popup.dispatch(Action::RemoveCategory("general".into()));
        f.popup.dispatch(Action::RemoveTone("polite".into()));
        f.popup.dispatch(Action::AddCategory("thanks".into()));
        f.popup.dispatch(Action::AddCategory("work".into()));
        f.popup.dispatch(Action::AddTone("warmly".into()));

        assert!(f.popup.save_template_from_current(Some("  ")).await);
        assert_eq!(f.popup.state().notice, Some(Text::TemplateSaved));
    }

    #[tokio::test]
    async fn template_can_drive_selection_defaults() {
        let server = MockServer::start().await;
        mount_account(&server, "pro").await;
        Mock::given(method("DELETE"))
            .and(path("/api/user_templates/9"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let mut f = fixture(&server.uri());
        f.popup.open().await;
        assert!(f.popup.use_template_as_selection_default(9));
        let prefs = f.settings.load();
        assert_eq!(prefs.selection_template_id, 9);
        assert_eq!(prefs.selection_template_title.as_deref(), Some("보고"));
        let defaults = prefs.selection_defaults.unwrap();
        assert_eq!(defaults.categories, vec!["report/approval"]);
        assert!(defaults.honorific);

        assert!(f.popup.delete_template(9).await);
        assert_eq!(f.settings.load().selection_template_id, 0);
    }

    #[tokio::test]
    async fn history_is_pro_only_and_loads_rows() {
        let server = MockServer::start().await;
        mount_account(&server, "pro").await;
        Mock::given(method("GET"))
            .and(path("/api/history"))
            .and(query_param("limit", "20"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{ "created_at": "2025-03-01T09:30:00Z", "input_text": "원문", "output_text": "순화문" }]
            })))
            .mount(&server)
            .await;

        let mut f = fixture(&server.uri());
        f.popup.load_history().await;
        assert_eq!(f.popup.state().notice, Some(Text::HistoryProOnly));

        f.popup.open().await;
        f.popup.load_history().await;
        assert_eq!(f.popup.state().history.len(), 1);
        assert_eq!(
            format_timestamp(f.popup.state().history[0].created_at.as_deref()),
            "2025-03-01 09:30"
        );
        f.popup.load_history_item(0);
        assert_eq!(f.popup.state().form.input, "원문");
        assert_eq!(f.popup.state().outputs, vec!["순화문"]);
    }

    #[tokio::test]
    async fn settings_switches_persist() {
        let server = MockServer::start().await;
        let mut f = fixture(&server.uri());

        f.popup.set_theme(Theme::Dark);
        f.popup.set_ui_language(Some("en".into()));
        assert_eq!(f.settings.load().theme, Theme::Dark);
        assert_eq!(f.popup.state().lang, Lang::En);

        f.popup.set_environment(Environment::Local).await;
        assert_eq!(f.popup.environment(), Environment::Local);
        assert_eq!(
            f.settings.load().base_url.as_deref(),
            Some("http://127.0.0.1:5000")
        );
    }

    #[tokio::test]
    async fn session_reset_and_disconnect() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/auth/status"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "logged_in": true, "tier": "pro" })))
            .mount(&server)
            .await;

        let mut f = fixture(&server.uri());
        f.settings
            .update(|p| p.access_token = Some("tok".into()))
            .unwrap();
        f.store
            .put(1, PageContext::for_source(ContextSource::Kakao))
            .await;

        f.popup.reset_session().await;
        assert_eq!(f.popup.state().notice, Some(Text::SessionCleared));
        assert_eq!(f.store.len().await, 0);

        f.popup.refresh_account().await;
        assert!(f.popup.state().is_pro());
        f.popup.disconnect().await;
        assert!(f.settings.load().access_token().is_none());
        assert!(!f.popup.state().is_pro());
        assert_eq!(f.popup.state().notice, Some(Text::Disconnected));
    }

    #[tokio::test]
    async fn missing_session_storage_is_reported() {
        let settings = SettingsStore::in_memory();
        let tabs = Arc::new(LocalTabs::new(Inbox::default(), Lang::Ko));
        let mut popup = PopupController::new(settings, None, tabs, Arc::new(NoAuth));
        popup.reset_session().await;
        assert_eq!(popup.state().notice, Some(Text::SessionUnavailable));
    }

    #[tokio::test]
    async fn cancelled_connect_reports_failure() {
        let mut f = fixture("http://127.0.0.1:9");
        assert!(!f.popup.connect().await);
        assert_eq!(f.popup.state().notice, Some(Text::ConnectFailed));
        assert!(f.settings.load().pending_oauth.is_none());
    }

    #[tokio::test]
    async fn open_links_use_base_url() {
        let f = fixture("https://www.lexinoa.com/");
        f.popup.open_web().await;
        f.popup.open_login().await;
        assert_eq!(
            f.tabs.opened_urls().await,
            vec!["https://www.lexinoa.com/", "https://www.lexinoa.com/login"]
        );
    }
}
