//! Contact signal extraction from free-text channel descriptions.

use once_cell::sync::Lazy;
use regex_lite::Regex;

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}").unwrap());

static LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r#"https?://[^\s<>"')\]]+"#).unwrap());

static HANDLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[\s(\[])(@[A-Za-z0-9_][A-Za-z0-9_.\-]{2,})").unwrap());

/// Finds usable contact references in a channel description.
pub trait ContactExtractor: Send + Sync {
    /// Contact strings in order of appearance, without duplicates.
    fn extract(&self, description: &str) -> Vec<String>;
}

/// Default extractor: e-mail addresses, web links and `@handle` mentions.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexContactExtractor;

impl RegexContactExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl ContactExtractor for RegexContactExtractor {
    fn extract(&self, description: &str) -> Vec<String> {
        let mut found: Vec<(usize, String)> = Vec::new();

        for m in EMAIL.find_iter(description) {
            found.push((m.start(), m.as_str().to_string()));
        }
        for m in LINK.find_iter(description) {
            let link = m.as_str().trim_end_matches(['.', ',', ';', ':']);
            found.push((m.start(), link.to_string()));
        }
        for caps in HANDLE.captures_iter(description) {
            if let Some(m) = caps.get(1) {
                let handle = m.as_str().trim_end_matches(['.', '-']);
                found.push((m.start(), handle.to_string()));
            }
        }

        found.sort_by_key(|(pos, _)| *pos);

        let mut contacts: Vec<String> = Vec::new();
        for (_, value) in found {
            if !contacts.contains(&value) {
                contacts.push(value);
            }
        }
        contacts
    }
}
