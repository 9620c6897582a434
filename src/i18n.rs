//! User-facing strings. Korean is the default; `ui_language = "en"` switches to English.

use crate::api::{Failure, FailureKind};
use once_cell::sync::Lazy;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lang {
    #[default]
    Ko,
    En,
}

impl Lang {
    pub fn from_override(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_lowercase()) {
            Some(v) if v.starts_with("en") => Lang::En,
            _ => Lang::Ko,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Text {
    OverlayLoading,
    OverlaySuccess,
    OverlayFailed,
    RequestFailed,
    Timeout,
    DailyLimit(Option<u64>),
    MonthlyLimit(Option<u64>),
    LoginRequired,
    EmptyInput,
    AutoContextProOnly,
    TemplatesProOnly,
    TemplateTitleRequired,
    TemplateSaved,
    TemplateSaveFailed,
    TemplateDeleteFailed,
    TemplateApplied,
    SelectionDefaultsSaved,
    HistoryProOnly,
    HistoryEmpty,
    HistoryLoadFailed,
    UsageUnavailable,
    Usage { used: u64, limit: u64, scope: String },
    OutputNotePro(usize),
    OutputNoteUpgrade,
    SessionCleared,
    SessionUnavailable,
    NotLoggedIn,
    Connected,
    Disconnected,
    ConnectFailed,
}

impl Text {
    pub fn render(&self, lang: Lang) -> String {
        match lang {
            Lang::Ko => self.ko(),
            Lang::En => self.en(),
        }
    }

    fn ko(&self) -> String {
        match self {
            Text::OverlayLoading => "선택한 문장을 순화하는 중입니다...".into(),
            Text::OverlaySuccess => "문장 순화가 완료되었습니다.".into(),
            Text::OverlayFailed => "문장 순화에 실패했습니다.".into(),
            Text::RequestFailed => "요청 중 오류가 발생했습니다.".into(),
            Text::Timeout => "서버 응답이 지연되고 있습니다. 잠시 후 다시 시도해 주세요.".into(),
            Text::DailyLimit(Some(limit)) => format!("일일 사용 한도({})를 초과했습니다.", limit),
            Text::DailyLimit(None) => "오늘 사용 한도를 초과했습니다.".into(),
            Text::MonthlyLimit(Some(limit)) => format!("월간 사용 한도({})를 초과했습니다.", limit),
            Text::MonthlyLimit(None) => "이번 달 사용 한도를 초과했습니다.".into(),
            Text::LoginRequired => {
                "로그인이 필요합니다. Lexinoa 웹에서 로그인 후 다시 시도해 주세요.".into()
            }
            Text::EmptyInput => "입력할 문장을 적어주세요.".into(),
            Text::AutoContextProOnly => "상황 자동 감지는 Pro 구독 시 사용 가능합니다.".into(),
            Text::TemplatesProOnly => "템플릿 저장은 Pro에서만 가능합니다.".into(),
            Text::TemplateTitleRequired => "템플릿 이름을 입력해 주세요.".into(),
            Text::TemplateSaved => "템플릿이 저장되었습니다.".into(),
            Text::TemplateSaveFailed => "템플릿 저장 중 오류가 발생했습니다.".into(),
            Text::TemplateDeleteFailed => "삭제 중 오류가 발생했습니다.".into(),
            Text::TemplateApplied => "현재 입력창에 템플릿이 적용되었습니다.".into(),
            Text::SelectionDefaultsSaved => "드래그 순화 기본값이 저장되었습니다.".into(),
            Text::HistoryProOnly => "Pro 구독 시 최근 순화 기록을 확인할 수 있습니다.".into(),
            Text::HistoryEmpty => "히스토리가 없습니다.".into(),
            Text::HistoryLoadFailed => "히스토리를 불러오는 중 오류가 발생했습니다.".into(),
            Text::UsageUnavailable => "이용량 정보를 불러올 수 없습니다.".into(),
            Text::Usage { used, limit, scope } => {
                format!("이용량: {} / {} ({})", used, limit, scope)
            }
            Text::OutputNotePro(n) => format!("{}개 문장을 비교해 보세요.", n),
            Text::OutputNoteUpgrade => "Pro에서는 최대 3개 문장을 비교할 수 있습니다.".into(),
            Text::SessionCleared => "컨텍스트 및 세션 데이터가 초기화되었습니다.".into(),
            Text::SessionUnavailable => "세션 스토리지를 사용할 수 없습니다.".into(),
            Text::NotLoggedIn => {
                "로그인되지 않은 상태입니다. 웹에서 로그인하면 Free / Pro 플랜으로 이용할 수 있습니다."
                    .into()
            }
            Text::Connected => "계정이 연결되었습니다.".into(),
            Text::Disconnected => "계정 연결이 해제되었습니다.".into(),
            Text::ConnectFailed => "계정 연결에 실패했습니다.".into(),
        }
    }

    fn en(&self) -> String {
        match self {
            Text::OverlayLoading => "Rewriting the selected text...".into(),
            Text::OverlaySuccess => "Rewrite complete.".into(),
            Text::OverlayFailed => "Rewrite failed.".into(),
            Text::RequestFailed => "The request failed.".into(),
            Text::Timeout => "The server took too long to answer. Please try again.".into(),
            Text::DailyLimit(Some(limit)) => format!("Daily limit ({}) reached.", limit),
            Text::DailyLimit(None) => "Daily limit reached.".into(),
            Text::MonthlyLimit(Some(limit)) => format!("Monthly limit ({}) reached.", limit),
            Text::MonthlyLimit(None) => "Monthly limit reached.".into(),
            Text::LoginRequired => "Please log in on the Lexinoa website and try again.".into(),
            Text::EmptyInput => "Enter a sentence to rewrite.".into(),
            Text::AutoContextProOnly => "Automatic context detection requires Pro.".into(),
            Text::TemplatesProOnly => "Templates require Pro.".into(),
            Text::TemplateTitleRequired => "Enter a template name.".into(),
            Text::TemplateSaved => "Template saved.".into(),
            Text::TemplateSaveFailed => "Could not save the template.".into(),
            Text::TemplateDeleteFailed => "Could not delete the template.".into(),
            Text::TemplateApplied => "Template applied to the input.".into(),
            Text::SelectionDefaultsSaved => "Selection defaults saved.".into(),
            Text::HistoryProOnly => "History is available with Pro.".into(),
            Text::HistoryEmpty => "No history yet.".into(),
            Text::HistoryLoadFailed => "Could not load history.".into(),
            Text::UsageUnavailable => "Usage information is unavailable.".into(),
            Text::Usage { used, limit, scope } => {
                format!("Usage: {} / {} ({})", used, limit, scope)
            }
            Text::OutputNotePro(n) => format!("Compare {} sentences.", n),
            Text::OutputNoteUpgrade => "Pro compares up to 3 sentences.".into(),
            Text::SessionCleared => "Context and session data cleared.".into(),
            Text::SessionUnavailable => "Session storage is unavailable.".into(),
            Text::NotLoggedIn => "Not logged in. Log in on the website to use Free / Pro.".into(),
            Text::Connected => "Account connected.".into(),
            Text::Disconnected => "Account disconnected.".into(),
            Text::ConnectFailed => "Could not connect the account.".into(),
        }
    }
}

impl From<&Failure> for Text {
    fn from(failure: &Failure) -> Self {
        match failure.kind {
            FailureKind::DailyLimit { limit } => Text::DailyLimit(limit),
            FailureKind::MonthlyLimit { limit } => Text::MonthlyLimit(limit),
            FailureKind::Unauthenticated => Text::LoginRequired,
            FailureKind::Timeout => Text::Timeout,
            FailureKind::Generic => Text::RequestFailed,
        }
    }
}

static CATEGORY_LABELS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("general", "일반"),
        ("work", "업무"),
        ("support", "고객응대"),
        ("apology", "사과"),
        ("inquiry", "문의"),
        ("thanks", "감사"),
        ("request", "요청"),
        ("guidance", "안내"),
        ("report/approval", "보고/결재"),
        ("feedback", "피드백"),
    ])
});

static TONE_LABELS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("soft", "부드럽게"),
        ("polite", "정중하게"),
        ("concise", "간결하게"),
        ("report", "보고서체"),
        ("friendly", "친근하게"),
        ("warmly", "따뜻하게"),
        ("calmly", "차분하게"),
        ("formally", "격식 있게"),
        ("clearly", "명확하게"),
        ("without_emotion", "감정 없이"),
    ])
});

/// Display label for a category code; unknown codes are shown as-is.
pub fn category_label(code: &str) -> String {
    CATEGORY_LABELS.get(code).copied().unwrap_or(code).to_string()
}

pub fn tone_label(code: &str) -> String {
    TONE_LABELS.get(code).copied().unwrap_or(code).to_string()
}
