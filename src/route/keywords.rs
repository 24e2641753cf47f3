//! Bilingual keyword tables and matchers for routing.
//!
//! English keywords match on word boundaries (so "pto" never fires
//! inside "laptop"); Arabic keywords match by substring, since `\b` is
//! unreliable for Arabic script. The Arabic→English map translates
//! retrieval queries against the English corpus.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::Department;

/// English keywords per department.
const HR_KEYWORDS: &[&str] = &[
    "benefits",
    "benefit",
    "insurance",
    "health",
    "401k",
    "pto",
    "vacation",
    "leave",
    "sick leave",
    "parental leave",
    "maternity",
    "paternity",
    "probation",
    "performance review",
    "working hours",
    "remote work",
    "dress code",
    "handbook",
    "hr policy",
    "harassment",
    "hiring",
    "termination",
];

const IT_KEYWORDS: &[&str] = &[
    "laptop",
    "computer",
    "email",
    "slack",
    "vpn",
    "password",
    "mfa",
    "two-factor",
    "software",
    "install",
    "github",
    "jira",
    "account",
    "wifi",
    "help desk",
    "it support",
    "okta",
    "equipment",
    "monitor",
    "device",
    "keyboard",
    "mouse",
    "headset",
    "printer",
];

const SECURITY_KEYWORDS: &[&str] = &[
    "security training",
    "security",
    "nda",
    "confidential",
    "data classification",
    "phishing",
    "incident",
    "badge",
    "access control",
    "compliance",
    "soc 2",
    "gdpr",
    "clean desk",
    "privileged access",
];

const FINANCE_KEYWORDS: &[&str] = &[
    "payroll",
    "pay schedule",
    "salary",
    "expense",
    "expenses",
    "reimbursement",
    "corporate card",
    "travel",
    "booking",
    "per diem",
    "w-4",
    "w-2",
    "direct deposit",
    "expensify",
    "concur",
    "purchase order",
    "tax",
    "budget",
];

/// Arabic keywords per department, matched by substring.
const HR_KEYWORDS_AR: &[&str] = &[
    "تأمين",
    "تامين",
    "صحي",
    "إجازة",
    "اجازة",
    "مزايا",
    "موارد بشرية",
    "عقد",
];

const IT_KEYWORDS_AR: &[&str] = &[
    "كمبيوتر",
    "حاسوب",
    "لابتوب",
    "بريد",
    "إيميل",
    "ايميل",
    "كلمة مرور",
    "كلمة السر",
    "برنامج",
];

const SECURITY_KEYWORDS_AR: &[&str] = &["أمن", "امن", "تدريب", "بطاقة", "سرية"];

const FINANCE_KEYWORDS_AR: &[&str] = &[
    "راتب",
    "رواتب",
    "مصاريف",
    "نفقات",
    "ضريبة",
    "ميزانية",
    "سفر",
];

/// Phrases that force routing to the Progress handler.
pub const PROGRESS_INTENT_PHRASES: &[&str] =
    &["my task", "my progress", "completed", "finished", "mark"];

/// Arabic term → English retrieval keywords, longest terms first so a
/// phrase match wins over its fragments.
const ARABIC_QUERY_MAP: &[(&str, &str)] = &[
    ("إجازة مرضية", "sick leave"),
    ("إجازة سنوية", "annual leave vacation"),
    ("تأمين صحي", "health insurance benefits"),
    ("تامين صحي", "health insurance benefits"),
    ("موارد بشرية", "human resources HR"),
    ("كلمة مرور", "password reset"),
    ("كلمة السر", "password reset"),
    ("إجازة", "leave vacation time off"),
    ("اجازة", "leave vacation time off"),
    ("سنوية", "annual"),
    ("تأمين", "insurance benefits"),
    ("تامين", "insurance benefits"),
    ("صحي", "health medical"),
    ("راتب", "salary pay compensation"),
    ("رواتب", "salary pay compensation payroll"),
    ("مزايا", "benefits perks"),
    ("عقد", "contract employment agreement"),
    ("استقالة", "resignation termination"),
    ("تقاعد", "retirement pension"),
    ("سياسة", "policy policies"),
    ("أمومة", "maternity parental leave"),
    ("أبوة", "paternity parental leave"),
    ("بريد", "email"),
    ("إيميل", "email"),
    ("ايميل", "email"),
    ("لابتوب", "laptop computer"),
    ("كمبيوتر", "computer laptop"),
    ("حاسوب", "computer laptop"),
    ("برنامج", "software install"),
    ("تدريب", "training"),
    ("بطاقة", "badge access card"),
    ("سرية", "confidentiality nda"),
    ("أمن", "security"),
    ("امن", "security"),
    ("مصاريف", "expenses reimbursement"),
    ("نفقات", "expenses"),
    ("ضريبة", "tax"),
    ("ميزانية", "budget"),
    ("سفر", "travel booking"),
];

struct DepartmentTable {
    department: Department,
    english: Regex,
    arabic: &'static [&'static str],
}

#[allow(clippy::unwrap_used)]
fn keyword_regex(keywords: &[&str]) -> Regex {
    let alternation = keywords
        .iter()
        .map(|kw| regex::escape(kw))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{alternation})\b")).unwrap()
}

static TABLES: LazyLock<Vec<DepartmentTable>> = LazyLock::new(|| {
    vec![
        DepartmentTable {
            department: Department::Hr,
            english: keyword_regex(HR_KEYWORDS),
            arabic: HR_KEYWORDS_AR,
        },
        DepartmentTable {
            department: Department::It,
            english: keyword_regex(IT_KEYWORDS),
            arabic: IT_KEYWORDS_AR,
        },
        DepartmentTable {
            department: Department::Security,
            english: keyword_regex(SECURITY_KEYWORDS),
            arabic: SECURITY_KEYWORDS_AR,
        },
        DepartmentTable {
            department: Department::Finance,
            english: keyword_regex(FINANCE_KEYWORDS),
            arabic: FINANCE_KEYWORDS_AR,
        },
    ]
});

#[allow(clippy::unwrap_used)]
static GREETING_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)^(hi|hello|hey|good morning|good afternoon)\b",
        r"(?i)^(thanks|thank you)",
        r"(?i)^(what should i do|where do i start|help me)",
    ]
    .iter()
    .map(|pattern| {
        Regex::new(pattern).unwrap()
    })
    .collect()
});

/// Keyword matches for one department.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordMatch {
    /// The department whose table fired.
    pub department: Department,
    /// The distinct keywords that matched, in table order.
    pub keywords: Vec<String>,
}

/// Matches the query against every department table.
///
/// Returns departments in fixed table order (HR, IT, Security, Finance)
/// with their matched keywords; departments with no match are omitted.
#[must_use]
pub fn match_departments(text: &str) -> Vec<KeywordMatch> {
    let lower = text.to_lowercase();
    TABLES
        .iter()
        .filter_map(|table| {
            let mut keywords: Vec<String> = table
                .english
                .find_iter(&lower)
                .map(|m| m.as_str().to_string())
                .collect();
            for arabic in table.arabic {
                if text.contains(arabic) || lower.contains(arabic) {
                    keywords.push((*arabic).to_string());
                }
            }
            keywords.dedup();
            (!keywords.is_empty()).then_some(KeywordMatch {
                department: table.department,
                keywords,
            })
        })
        .collect()
}

/// Checks the forced-progress intent phrases (rule C).
#[must_use]
pub fn matches_progress_intent(text: &str) -> bool {
    let lower = text.to_lowercase();
    PROGRESS_INTENT_PHRASES
        .iter()
        .any(|phrase| lower.contains(phrase))
}

/// Checks the greeting/thanks/general-help patterns (rule D).
#[must_use]
pub fn is_greeting(text: &str) -> bool {
    let trimmed = text.trim();
    GREETING_RES.iter().any(|re| re.is_match(trimmed))
}

/// Translates an Arabic query into English retrieval keywords.
///
/// Returns `None` when no mapped term occurs; the caller then retrieves
/// with the original text.
#[must_use]
pub fn translate_arabic_query(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    let terms: Vec<&str> = ARABIC_QUERY_MAP
        .iter()
        .filter(|(arabic, _)| text.contains(arabic) || lower.contains(arabic))
        .map(|(_, english)| *english)
        .collect();
    (!terms.is_empty()).then(|| terms.join(" "))
}
