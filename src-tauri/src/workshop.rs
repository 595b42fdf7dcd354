use regex::Regex;
use std::sync::OnceLock;

fn url_id_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)[?&]id=(\d{6,12})").expect("valid URL id pattern"))
}

fn line_has_url_id(line: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)[?&]id=\d+").expect("valid URL id probe pattern"))
        .is_match(line)
}

fn standalone_id_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{8,12})\b").expect("valid standalone id pattern"))
}

fn strict_line_id_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\d{8,10}\b").expect("valid line id pattern"))
}

/// Extracts workshop item IDs from free-form multi-line input.
///
/// Two passes: URL `id=` query parameters are collected first across the
/// whole input, then each line that carried no `id=` parameter is scanned
/// for standalone 8-12 digit tokens. The line-scoped second pass keeps
/// digit runs inside a URL (timestamps, cache busters) from being counted
/// as a second item once the URL's real ID was captured.
///
/// IDs are deduplicated, first occurrence wins.
pub fn extract_workshop_ids(input: &str) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();

    for caps in url_id_pattern().captures_iter(input) {
        if let Some(m) = caps.get(1) {
            if !ids.iter().any(|id| id == m.as_str()) {
                ids.push(m.as_str().to_string());
            }
        }
    }

    for line in input.lines() {
        if line_has_url_id(line) {
            continue;
        }
        for caps in standalone_id_pattern().captures_iter(line) {
            if let Some(m) = caps.get(1) {
                if !ids.iter().any(|id| id == m.as_str()) {
                    ids.push(m.as_str().to_string());
                }
            }
        }
    }

    ids
}

/// Matches a single directly downloadable ID on one input line.
///
/// Stricter than [`extract_workshop_ids`]: 8-10 digits, first match only,
/// no URL awareness. 11-12 digit IDs are preview-only.
pub fn match_line_id(line: &str) -> Option<&str> {
    strict_line_id_pattern().find(line).map(|m| m.as_str())
}
