use super::{ContextSource, PageContext};

/// Ordered match rules. Every needle is tested as a case-insensitive substring of the
/// whole URL, so subdomains (`foo.slack.com`) and bare hostnames both match.
/// The first rule that matches wins.
const RULES: &[(ContextSource, &[&str])] = &[
    (ContextSource::Gmail, &["mail.google.com"]),
    (ContextSource::Slack, &["slack.com"]),
    (ContextSource::NaverMail, &["mail.naver.com"]),
    (ContextSource::Outlook, &["outlook.live.com", "outlook.office.com"]),
    (ContextSource::Teams, &["teams.microsoft.com"]),
    (ContextSource::Kakao, &["kakao.com", "kakaotalk"]),
];

pub fn classify(url: &str) -> PageContext {
    PageContext::for_source(identify_source(url))
}

pub fn identify_source(url: &str) -> ContextSource {
    let lower = url.trim().to_lowercase();
    if lower.is_empty() {
        return ContextSource::Generic;
    }

    for (source, needles) in RULES {
        if needles.iter().any(|needle| lower.contains(needle)) {
            return *source;
        }
        // naver.com also hosts mail under a /mail path on the portal domain
        if *source == ContextSource::NaverMail
            && lower.contains("naver.com")
            && lower.contains("/mail")
        {
            return ContextSource::NaverMail;
        }
    }

    ContextSource::Generic
}
