//! Popup session state and the reducer that mutates it.
//!
//! Everything the popup shows is derived from [`PopupState`]; the only way to change
//! it is [`PopupState::apply`]. Network and storage work lives in the controller.

use crate::api::{AuthState, Failure, HistoryItem, RewriteRequest, Template, Tier, Usage};
use crate::context_detection::{ContextSource, PageContext};
use crate::i18n::{category_label, tone_label, Lang, Text};
use crate::settings::{ContextMode, Preferences, SelectionDefaults, Theme};
use chrono::{DateTime, NaiveDateTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Rewrite,
    History,
    Templates,
    Settings,
}

/// Rewrite tab inputs. Chips keep insertion order and never repeat.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RewriteForm {
    pub input: String,
    pub categories: Vec<String>,
    pub tones: Vec<String>,
    pub honorific: bool,
    pub opener: bool,
    pub emoji: bool,
}

fn push_unique(list: &mut Vec<String>, code: &str) -> bool {
    let code = code.trim();
    if code.is_empty() || list.iter().any(|c| c == code) {
        return false;
    }
    list.push(code.to_string());
    true
}

impl RewriteForm {
    pub fn add_category(&mut self, code: &str) -> bool {
        push_unique(&mut self.categories, code)
    }

    pub fn add_tone(&mut self, code: &str) -> bool {
        push_unique(&mut self.tones, code)
    }

    pub fn remove_category(&mut self, code: &str) {
        self.categories.retain(|c| c != code);
    }

    pub fn remove_tone(&mut self, code: &str) {
        self.tones.retain(|t| t != code);
    }

    pub fn apply_template(&mut self, template: &Template) {
        self.categories.clear();
        self.tones.clear();
        push_unique(&mut self.categories, &template.category);
        push_unique(&mut self.tones, &template.tone);
        self.honorific = template.honorific;
        self.opener = template.opener;
        self.emoji = template.emoji;
    }

    pub fn to_request(&self, context: Option<PageContext>) -> RewriteRequest {
        let mut request = RewriteRequest::new(self.input.trim());
        request.categories = self.categories.clone();
        request.tones = self.tones.clone();
        request.honorific = self.honorific;
        request.opener = self.opener;
        request.emoji = self.emoji;
        request.context = context;
        request
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusBar {
    pub tier_label: &'static str,
    pub usage_line: String,
    /// Settings auth panel: the account email, or a login hint for guests.
    pub account_line: String,
}

#[derive(Debug, Clone)]
pub enum Action {
    PreferencesLoaded(Preferences),
    AuthLoaded(AuthState),
    UsageLoaded(Usage),
    TemplatesLoaded(Vec<Template>),
    ContextDetected(PageContext),
    SelectContext(ContextMode),
    SetInput(String),
    AddCategory(String),
    RemoveCategory(String),
    AddTone(String),
    RemoveTone(String),
    SetHonorific(bool),
    SetOpener(bool),
    SetEmoji(bool),
    ApplyTemplate(u64),
    RewriteStarted,
    RewriteSucceeded { generation: u64, outputs: Vec<String> },
    RewriteFailed { generation: u64, failure: Failure },
    HistoryLoaded(Vec<HistoryItem>),
    LoadHistoryItem(usize),
    SwitchView(View),
    ThemeChanged(Theme),
    LanguageChanged(Option<String>),
    BaseUrlChanged(String),
    SelectionDefaultsChanged {
        defaults: SelectionDefaults,
        template_id: u64,
        template_title: Option<String>,
    },
    Notice(Text),
    DismissNotice,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PopupState {
    pub base_url: String,
    pub auth: AuthState,
    pub usage: Usage,
    pub templates: Vec<Template>,
    pub context: PageContext,
    pub context_mode: ContextMode,
    pub theme: Theme,
    pub lang: Lang,
    pub selection_defaults: SelectionDefaults,
    pub selection_template_id: u64,
    pub selection_template_title: Option<String>,
    pub form: RewriteForm,
    pub outputs: Vec<String>,
    pub history: Vec<HistoryItem>,
    pub view: View,
    pub notice: Option<Text>,
    pub upgrade_prompt: bool,
    pub busy: bool,
    generation: u64,
}

impl Default for PopupState {
    fn default() -> Self {
        Self::from_preferences(&Preferences::default())
    }
}

impl PopupState {
    pub fn from_preferences(prefs: &Preferences) -> Self {
        Self {
            base_url: prefs.base_url(),
            auth: AuthState::guest(),
            usage: Usage::default(),
            templates: Vec::new(),
            context: PageContext::default(),
            context_mode: prefs.context_mode,
            theme: prefs.theme,
            lang: Lang::from_override(prefs.ui_language.as_deref()),
            selection_defaults: prefs.selection_defaults.clone().unwrap_or_default(),
            selection_template_id: prefs.selection_template_id,
            selection_template_title: prefs.selection_template_title.clone(),
            form: RewriteForm::default(),
            outputs: Vec::new(),
            history: Vec::new(),
            view: View::default(),
            notice: None,
            upgrade_prompt: false,
            busy: false,
            generation: 0,
        }
    }

    pub fn tier(&self) -> Tier {
        self.auth.tier
    }

    pub fn is_pro(&self) -> bool {
        self.auth.tier.is_pro()
    }

    /// Generation of the most recently started rewrite.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Context attached to popup rewrites.
    pub fn full_context(&self) -> PageContext {
        self.context.clone()
    }

    pub fn notice_text(&self) -> Option<String> {
        self.notice.as_ref().map(|n| n.render(self.lang))
    }

    pub fn status_bar(&self) -> StatusBar {
        let usage_line = if self.usage.limit == 0 {
            Text::UsageUnavailable
        } else {
            Text::Usage {
                used: self.usage.used,
                limit: self.usage.limit,
                scope: self.usage.scope.clone(),
            }
        };
        let account_line = match (&self.auth.email, self.auth.logged_in) {
            (Some(email), true) if !email.is_empty() => email.clone(),
            (_, true) => self.auth.tier.label().to_string(),
            (_, false) => Text::NotLoggedIn.render(self.lang),
        };
        StatusBar {
            tier_label: self.auth.tier.label(),
            usage_line: usage_line.render(self.lang),
            account_line,
        }
    }

    pub fn output_note(&self) -> Option<String> {
        if self.outputs.is_empty() {
            return None;
        }
        let note = if self.is_pro() {
            Text::OutputNotePro(self.outputs.len())
        } else {
            Text::OutputNoteUpgrade
        };
        Some(note.render(self.lang))
    }

    /// Title suggested when saving the current form as a template.
    pub fn default_template_title(&self) -> String {
        let category = self
            .form
            .categories
            .first()
            .map(|c| category_label(c))
            .unwrap_or_else(|| "카테고리 없음".to_string());
        format!("{} · {}", self.context.label, category)
    }

    pub fn apply(&mut self, action: Action) {
        match action {
            Action::PreferencesLoaded(prefs) => {
                self.base_url = prefs.base_url();
                self.theme = prefs.theme;
                self.lang = Lang::from_override(prefs.ui_language.as_deref());
                self.context_mode = prefs.context_mode;
                self.selection_defaults = prefs.selection_defaults.unwrap_or_default();
                self.selection_template_id = prefs.selection_template_id;
                self.selection_template_title = prefs.selection_template_title;
            }
            Action::AuthLoaded(auth) => {
                self.auth = auth;
                if !self.is_pro() {
                    self.templates.clear();
                    self.history.clear();
                    if self.context_mode == ContextMode::Auto {
                        self.context_mode = ContextMode::Fixed(ContextSource::Generic);
                        self.context = PageContext::default();
                    }
                }
            }
            Action::UsageLoaded(usage) => self.usage = usage,
            Action::TemplatesLoaded(templates) => self.templates = templates,
            Action::ContextDetected(ctx) => {
                if self.context_mode == ContextMode::Auto {
                    self.set_context(ctx);
                }
            }
            Action::SelectContext(ContextMode::Auto) => {
                if self.is_pro() {
                    self.context_mode = ContextMode::Auto;
                    self.upgrade_prompt = false;
                } else {
                    self.context_mode = ContextMode::Fixed(ContextSource::Generic);
                    self.context = PageContext::default();
                    self.upgrade_prompt = true;
                    self.notice = Some(Text::AutoContextProOnly);
                }
            }
            Action::SelectContext(ContextMode::Fixed(source)) => {
                self.context_mode = ContextMode::Fixed(source);
                self.upgrade_prompt = false;
                self.set_context(PageContext::for_source(source));
            }
            Action::SetInput(text) => self.form.input = text,
            Action::AddCategory(code) => {
                self.form.add_category(&code);
            }
            Action::RemoveCategory(code) => self.form.remove_category(&code),
            Action::AddTone(code) => {
                self.form.add_tone(&code);
            }
            Action::RemoveTone(code) => self.form.remove_tone(&code),
            Action::SetHonorific(on) => self.form.honorific = on,
            Action::SetOpener(on) => self.form.opener = on,
            Action::SetEmoji(on) => self.form.emoji = on,
            Action::ApplyTemplate(id) => {
                if !self.is_pro() {
                    self.notice = Some(Text::TemplatesProOnly);
                    return;
                }
                if let Some(template) = self.templates.iter().find(|t| t.id == id).cloned() {
                    self.form.apply_template(&template);
                    self.view = View::Rewrite;
                    self.notice = Some(Text::TemplateApplied);
                }
            }
            Action::RewriteStarted => {
                self.generation += 1;
                self.busy = true;
                self.notice = None;
                self.upgrade_prompt = false;
            }
            Action::RewriteSucceeded {
                generation,
                outputs,
            } => {
                if generation == self.generation {
                    self.busy = false;
                    self.outputs = outputs;
                }
            }
            Action::RewriteFailed {
                generation,
                failure,
            } => {
                if generation == self.generation {
                    self.busy = false;
                    self.upgrade_prompt = failure.needs_upgrade().is_some();
                    self.notice = Some(Text::from(&failure));
                }
            }
            Action::HistoryLoaded(items) => {
                self.notice = items.is_empty().then_some(Text::HistoryEmpty);
                self.history = items;
            }
            Action::LoadHistoryItem(idx) => {
                if let Some(item) = self.history.get(idx).cloned() {
                    self.form.input = item.input_text;
                    self.outputs = vec![item.output_text];
                    self.view = View::Rewrite;
                }
            }
            Action::SwitchView(view) => self.view = view,
            Action::ThemeChanged(theme) => self.theme = theme,
            Action::LanguageChanged(lang) => self.lang = Lang::from_override(lang.as_deref()),
            Action::BaseUrlChanged(url) => self.base_url = url,
            Action::SelectionDefaultsChanged {
                defaults,
                template_id,
                template_title,
            } => {
                self.selection_defaults = defaults;
                self.selection_template_id = template_id;
                self.selection_template_title = template_title;
            }
            Action::Notice(text) => self.notice = Some(text),
            Action::DismissNotice => self.notice = None,
        }
    }

    /// Adopts `ctx`, seeding the chips with its suggestions while the form is blank.
    fn set_context(&mut self, ctx: PageContext) {
        if self.form.categories.is_empty() && self.form.tones.is_empty() {
            self.form.add_category(&ctx.suggested_category);
            self.form.add_tone(&ctx.suggested_tone);
        }
        self.context = ctx;
    }
}

/// `"{category} · {tone} · {options}"` line shown under a template title.
pub fn template_description(template: &Template) -> String {
    let category = if template.category.is_empty() {
        "카테고리 없음".to_string()
    } else {
        category_label(&template.category)
    };
    let tone = if template.tone.is_empty() {
        "톤 없음".to_string()
    } else {
        tone_label(&template.tone)
    };
    let options: Vec<&str> = [
        (template.honorific, "존댓말"),
        (template.opener, "인사말"),
        (template.emoji, "이모지"),
    ]
    .into_iter()
    .filter_map(|(on, label)| on.then_some(label))
    .collect();
    let options = if options.is_empty() {
        "추가 옵션 없음".to_string()
    } else {
        options.join(", ")
    };
    format!("{} · {} · {}", category, tone, options)
}

/// `YYYY-MM-DD HH:MM`; strings that do not parse are shown unchanged.
pub fn format_timestamp(raw: Option<&str>) -> String {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return String::new();
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.format("%Y-%m-%d %H:%M").to_string();
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%a, %d %b %Y %H:%M:%S GMT"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, pattern) {
            return dt.format("%Y-%m-%d %H:%M").to_string();
        }
    }
    raw.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::FailureKind;

    fn pro() -> AuthState {
        AuthState {
            logged_in: true,
            tier: Tier::Pro,
            output_count: 3,
            ..AuthState::guest()
        }
    }

    fn template(id: u64) -> Template {
        Template {
            id,
            title: "Mail".into(),
            category: "work".into(),
            tone: "polite".into(),
            honorific: true,
            opener: false,
            emoji: true,
        }
    }

    #[test]
    fn auto_context_is_reverted_for_free_users() {
        let mut state = PopupState::default();
        state.apply(Action::AuthLoaded(AuthState {
            logged_in: true,
            tier: Tier::Free,
            ..AuthState::guest()
        }));
        assert_eq!(state.context_mode, ContextMode::Fixed(ContextSource::Generic));

        state.apply(Action::SelectContext(ContextMode::Auto));
        assert_eq!(state.context_mode, ContextMode::Fixed(ContextSource::Generic));
        assert_eq!(state.context.source, ContextSource::Generic);
        assert!(state.upgrade_prompt);
        assert_eq!(state.notice, Some(Text::AutoContextProOnly));
    }

    #[test]
    fn pro_users_keep_auto_and_receive_detections() {
        let mut state = PopupState::default();
        state.apply(Action::AuthLoaded(pro()));
        state.apply(Action::SelectContext(ContextMode::Auto));
        assert_eq!(state.context_mode, ContextMode::Auto);

        state.apply(Action::ContextDetected(PageContext::for_source(ContextSource::Slack)));
        assert_eq!(state.full_context().source, ContextSource::Slack);
        assert_eq!(state.form.categories, vec!["work"]);
        assert_eq!(state.form.tones, vec!["friendly"]);
    }

    #[test]
    fn manual_context_ignores_detections() {
        let mut state = PopupState::default();
        state.apply(Action::SelectContext(ContextMode::Fixed(ContextSource::Outlook)));
        state.apply(Action::ContextDetected(PageContext::for_source(ContextSource::Slack)));
        assert_eq!(state.context.source, ContextSource::Outlook);
        assert!(!state.upgrade_prompt);
    }

    #[test]
    fn chips_are_deduplicated() {
        let mut state = PopupState::default();
        state.apply(Action::AddCategory("work".into()));
        state.apply(Action::AddCategory("work".into()));
        state.apply(Action::AddCategory("thanks".into()));
        state.apply(Action::AddTone(" ".into()));
        assert_eq!(state.form.categories, vec!["work", "thanks"]);
        assert!(state.form.tones.is_empty());
        state.apply(Action::RemoveCategory("work".into()));
        assert_eq!(state.form.categories, vec!["thanks"]);
    }

    #[test]
    fn stale_rewrite_results_are_ignored() {
        let mut state = PopupState::default();
        state.apply(Action::RewriteStarted);
        let first = state.generation();
        state.apply(Action::RewriteStarted);
        let second = state.generation();

        state.apply(Action::RewriteSucceeded {
            generation: second,
            outputs: vec!["new".into()],
        });
        state.apply(Action::RewriteSucceeded {
            generation: first,
            outputs: vec!["old".into()],
        });
        state.apply(Action::RewriteFailed {
            generation: first,
            failure: Failure {
                kind: FailureKind::Generic,
            },
        });
        assert_eq!(state.outputs, vec!["new"]);
        assert!(state.notice.is_none());
        assert!(!state.busy);
    }

    #[test]
    fn quota_failure_prompts_upgrade() {
        let mut state = PopupState::default();
        state.apply(Action::RewriteStarted);
        state.apply(Action::RewriteFailed {
            generation: state.generation(),
            failure: Failure {
                kind: FailureKind::DailyLimit { limit: Some(5) },
            },
        });
        assert!(state.upgrade_prompt);
        assert_eq!(state.notice, Some(Text::DailyLimit(Some(5))));
    }

    #[test]
    fn templates_apply_only_for_pro() {
        let mut state = PopupState::default();
        state.apply(Action::TemplatesLoaded(vec![template(7)]));
        state.apply(Action::ApplyTemplate(7));
        assert_eq!(state.notice, Some(Text::TemplatesProOnly));
        assert!(state.form.categories.is_empty());

        state.apply(Action::AuthLoaded(pro()));
        state.apply(Action::TemplatesLoaded(vec![template(7)]));
        state.apply(Action::ApplyTemplate(7));
        assert_eq!(state.form.categories, vec!["work"]);
        assert!(state.form.honorific && state.form.emoji);
        assert_eq!(state.notice, Some(Text::TemplateApplied));
    }

    #[test]
    fn history_item_loads_into_input_and_output() {
        let mut state = PopupState::default();
        state.apply(Action::SwitchView(View::History));
        state.apply(Action::HistoryLoaded(vec![HistoryItem {
            created_at: None,
            input_text: "원문".into(),
            output_text: "결과".into(),
            model: None,
        }]));
        state.apply(Action::LoadHistoryItem(0));
        assert_eq!(state.form.input, "원문");
        assert_eq!(state.outputs, vec!["결과"]);
        assert_eq!(state.view, View::Rewrite);

        state.apply(Action::HistoryLoaded(Vec::new()));
        assert_eq!(state.notice, Some(Text::HistoryEmpty));
    }

    #[test]
    fn status_bar_and_output_note() {
        let mut state = PopupState::default();
        assert_eq!(state.status_bar().tier_label, "Guest");
        assert_eq!(
            state.status_bar().account_line,
            Text::NotLoggedIn.render(Lang::Ko)
        );
        assert_eq!(
            state.status_bar().usage_line,
            Text::UsageUnavailable.render(Lang::Ko)
        );
        assert!(state.output_note().is_none());

        state.apply(Action::UsageLoaded(Usage {
            used: 2,
            limit: 10,
            scope: "rewrite".into(),
        }));
        assert!(state.status_bar().usage_line.contains("2 / 10"));

        state.outputs = vec!["a".into()];
        assert_eq!(state.output_note(), Some(Text::OutputNoteUpgrade.render(Lang::Ko)));
        state.apply(Action::AuthLoaded(pro()));
        state.outputs = vec!["a".into(), "b".into()];
        assert_eq!(state.output_note(), Some(Text::OutputNotePro(2).render(Lang::Ko)));
        assert_eq!(state.status_bar().account_line, "Pro");

        state.apply(Action::AuthLoaded(AuthState {
            email: Some("me@lexinoa.com".into()),
            ..pro()
        }));
        assert_eq!(state.status_bar().account_line, "me@lexinoa.com");
    }

    #[test]
    fn template_titles_and_descriptions() {
        let mut state = PopupState::default();
        assert_eq!(state.default_template_title(), "일반 사이트 · 카테고리 없음");
        state.apply(Action::AddCategory("support".into()));
        assert_eq!(state.default_template_title(), "일반 사이트 · 고객응대");

        assert_eq!(
            template_description(&template(1)),
            "업무 · 정중하게 · 존댓말, 이모지"
        );
        let bare = Template {
            category: String::new(),
            tone: String::new(),
            honorific: false,
            emoji: false,
            ..template(2)
        };
        assert_eq!(
            template_description(&bare),
            "카테고리 없음 · 톤 없음 · 추가 옵션 없음"
        );
    }

    #[test]
    fn timestamps_are_shortened() {
        assert_eq!(
            format_timestamp(Some("2025-01-02T03:04:05Z")),
            "2025-01-02 03:04"
        );
        assert_eq!(
            format_timestamp(Some("2025-01-02T03:04:05.123456")),
            "2025-01-02 03:04"
        );
        assert_eq!(format_timestamp(Some("yesterday")), "yesterday");
        assert_eq!(format_timestamp(None), "");
    }
}
