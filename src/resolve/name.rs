//! Decomposition of free-text person names
//!
//! Spreadsheet assignee cells commonly look like `"Jane Doe (Acme)"` or
//! `"Jane Doe"`. The parenthetical qualifier is stripped before matching; the
//! remainder splits on its last whitespace boundary into first/last. A
//! single-token input degenerates to the whole string serving as both.

use regex::Regex;
use std::sync::OnceLock;

/// A decomposed assignee name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    pub first: String,
    pub last: String,
    pub qualifier: Option<String>,
    /// `"first last"`, or the whole input for single-token names
    pub full: String,
    /// The original input, trimmed
    pub display: String,
}

fn qualifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(?<name>.*?)\s*\((?<qualifier>[^)]+)\)\s*$").unwrap())
}

impl ParsedName {
    pub fn parse(input: &str) -> ParsedName {
        let display = input.trim().to_string();

        let (name_part, qualifier) = match qualifier_pattern().captures(&display) {
            Some(caps) => (
                caps["name"].trim().to_string(),
                Some(caps["qualifier"].trim().to_string()),
            ),
            None => (display.clone(), None),
        };

        match name_part.rfind(char::is_whitespace) {
            Some(split) => {
                let first = name_part[..split].trim_end().to_string();
                let last = name_part[split + 1..].to_string();
                let full = format!("{} {}", first, last);
                ParsedName {
                    first,
                    last,
                    qualifier,
                    full,
                    display,
                }
            }
            None => ParsedName {
                first: name_part.clone(),
                last: name_part.clone(),
                qualifier,
                full: name_part,
                display,
            },
        }
    }

    /// Candidate search terms in resolution priority order, deduplicated:
    /// full name, original string, first name, last name.
    pub fn candidate_terms(&self) -> Vec<&str> {
        let mut terms: Vec<&str> = Vec::new();
        for term in [
            self.full.as_str(),
            self.display.as_str(),
            self.first.as_str(),
            self.last.as_str(),
        ] {
            if !term.is_empty() && !terms.contains(&term) {
                terms.push(term);
            }
        }
        terms
    }
}
