//! Markdown section extraction and text cleanup.
//!
//! Policy documents use ATX headers (`#` through `####`). Each section
//! carries its title and body; files without headers collapse into one
//! synthetic root section.

use std::sync::LazyLock;

use regex::Regex;

/// Title given to the synthetic section of a headerless file.
pub const ROOT_SECTION: &str = "root";

#[allow(clippy::unwrap_used)]
static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(#{1,4})\s+(.+)$").unwrap()
});

#[allow(clippy::unwrap_used)]
static EXCESS_NEWLINES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\n{3,}").unwrap()
});

#[allow(clippy::unwrap_used)]
static EXCESS_SPACES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r" {2,}").unwrap()
});

#[allow(clippy::unwrap_used)]
static TABLE_RULE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\|[-:]+\|").unwrap()
});

/// A markdown section: header title plus body content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Header title, or [`ROOT_SECTION`] for headerless files.
    pub title: String,
    /// Section content, starting with a rendered `# Title` line.
    pub content: String,
    /// Header level (1–4), 0 for the synthetic root section.
    pub level: usize,
}

/// Splits markdown content into header-delimited sections.
///
/// Body lines before the first header belong to the synthetic root
/// section. Sections whose content is blank are dropped.
#[must_use]
pub fn extract_sections(content: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut current = Section {
        title: ROOT_SECTION.to_string(),
        content: String::new(),
        level: 0,
    };

    for line in content.lines() {
        if let Some(captures) = HEADER_RE.captures(line) {
            if !current.content.trim().is_empty() {
                sections.push(current);
            }
            let level = captures.get(1).map_or(1, |m| m.as_str().len());
            let title = captures.get(2).map_or("", |m| m.as_str()).trim().to_string();
            current = Section {
                content: format!("# {title}\n\n"),
                title,
                level,
            };
        } else {
            current.content.push_str(line);
            current.content.push('\n');
        }
    }

    if !current.content.trim().is_empty() {
        sections.push(current);
    }

    sections
}

/// Normalizes whitespace and strips table-rule artifacts.
///
/// Collapses three or more newlines to two, runs of spaces to one.
#[must_use]
pub fn clean_text(text: &str) -> String {
    let text = EXCESS_NEWLINES_RE.replace_all(text, "\n\n");
    let text = EXCESS_SPACES_RE.replace_all(&text, " ");
    let text = TABLE_RULE_RE.replace_all(&text, "");
    text.trim().to_string()
}
