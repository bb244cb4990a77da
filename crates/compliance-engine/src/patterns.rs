//! Pattern compilation, matching and snippet extraction

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};
use shared_types::Pattern;

/// Bytes of context kept on each side of a match in snippets
pub const SNIPPET_CONTEXT: usize = 50;

/// Compiled regex size cap; template authors are not trusted with unbounded automata
const REGEX_SIZE_LIMIT: usize = 1 << 20;

lazy_static! {
    static ref NUMERIC_DATE: Regex =
        Regex::new(r"\b(\d{1,2})[./-](\d{1,2})[./-](\d{4})\b").unwrap();
    static ref ISO_DATE: Regex = Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").unwrap();
    static ref NAMED_DATE: Regex = Regex::new(
        r"(?i)\b(\d{1,2})(?:st|nd|rd|th)?\.?\s+(january|february|march|april|may|june|july|august|september|october|november|december)\s+(\d{4})\b"
    )
    .unwrap();
    static ref NAMED_DATE_MONTH_FIRST: Regex = Regex::new(
        r"(?i)\b(january|february|march|april|may|june|july|august|september|october|november|december)\s+(\d{1,2}),?\s+(\d{4})\b"
    )
    .unwrap();
}

/// One compiled detection pattern
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    source: Pattern,
    regex: Regex,
}

/// Every occurrence of one pattern in a text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternMatch {
    pub count: usize,
    /// Byte span of the first occurrence
    pub start: usize,
    pub end: usize,
}

impl CompiledPattern {
    /// Compile case-insensitively. Literals are escaped and anchored on word
    /// boundaries wherever they start or end with a word character.
    pub fn compile(pattern: &Pattern) -> Result<Self, String> {
        let expr = match pattern {
            Pattern::Literal(text) => {
                if text.trim().is_empty() {
                    return Err("literal pattern is empty".to_string());
                }
                literal_expr(text)
            }
            Pattern::Regex(expr) => {
                if expr.is_empty() {
                    return Err("regex pattern is empty".to_string());
                }
                expr.clone()
            }
        };

        let regex = RegexBuilder::new(&expr)
            .case_insensitive(true)
            .size_limit(REGEX_SIZE_LIMIT)
            .build()
            .map_err(|e| e.to_string())?;

        if regex.is_match("") {
            return Err("pattern matches the empty string".to_string());
        }

        Ok(Self {
            source: pattern.clone(),
            regex,
        })
    }

    pub fn source(&self) -> &Pattern {
        &self.source
    }

    pub fn is_literal(&self) -> bool {
        matches!(self.source, Pattern::Literal(_))
    }

    pub fn find(&self, text: &str) -> Option<PatternMatch> {
        let mut matches = self.regex.find_iter(text);
        let first = matches.next()?;
        Some(PatternMatch {
            count: 1 + matches.count(),
            start: first.start(),
            end: first.end(),
        })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// Heuristic strength of a match: literals are exact, regex hits grow
    /// with repetition up to 1.0 at two occurrences
    pub fn confidence(&self, count: usize) -> f64 {
        if count == 0 {
            return 0.0;
        }
        if self.is_literal() {
            1.0
        } else {
            (count as f64 / 2.0).min(1.0)
        }
    }
}

fn literal_expr(text: &str) -> String {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let mut expr = String::new();
    if text.chars().next().is_some_and(is_word) {
        expr.push_str(r"\b");
    }
    expr.push_str(&regex::escape(text));
    if text.chars().last().is_some_and(is_word) {
        expr.push_str(r"\b");
    }
    expr
}

fn floor_boundary(text: &str, index: usize) -> usize {
    let mut i = index.min(text.len());
    while !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn ceil_boundary(text: &str, index: usize) -> usize {
    let mut i = index.min(text.len());
    while !text.is_char_boundary(i) {
        i += 1;
    }
    i
}

/// Slice of `text` around a byte span, widened by `before`/`after` bytes and
/// snapped to char boundaries
pub fn window(text: &str, start: usize, end: usize, before: usize, after: usize) -> &str {
    let from = floor_boundary(text, start.saturating_sub(before));
    let to = ceil_boundary(text, end.saturating_add(after));
    &text[from..to.max(from)]
}

/// Snippet around a match for highlighting, with ellipses where text was cut
pub fn extract_snippet(text: &str, start: usize, end: usize) -> String {
    let from = floor_boundary(text, start.saturating_sub(SNIPPET_CONTEXT));
    let to = ceil_boundary(text, end.saturating_add(SNIPPET_CONTEXT)).max(from);
    let body = text[from..to].trim();
    format!(
        "{}{}{}",
        if from > 0 { "..." } else { "" },
        body,
        if to < text.len() { "..." } else { "" }
    )
}

fn month_number(name: &str) -> Option<u32> {
    let month = match name.to_lowercase().as_str() {
        "january" => 1,
        "february" => 2,
        "march" => 3,
        "april" => 4,
        "may" => 5,
        "june" => 6,
        "july" => 7,
        "august" => 8,
        "september" => 9,
        "october" => 10,
        "november" => 11,
        "december" => 12,
        _ => return None,
    };
    Some(month)
}

fn num(s: &str) -> Option<u32> {
    s.parse().ok()
}

fn year(s: &str) -> Option<i32> {
    s.parse().ok()
}

/// Calendar dates written out in the text.
///
/// Numeric dates are read day-first (`15.03.2024`, `15/03/2024`) and fall
/// back to month-first when that is the only valid reading. Only four-digit
/// years are recognised.
pub fn find_dates(text: &str) -> Vec<(NaiveDate, &str)> {
    let mut dates = Vec::new();

    for caps in NUMERIC_DATE.captures_iter(text) {
        let (Some(a), Some(b), Some(y)) = (num(&caps[1]), num(&caps[2]), year(&caps[3])) else {
            continue;
        };
        let date = NaiveDate::from_ymd_opt(y, b, a).or_else(|| NaiveDate::from_ymd_opt(y, a, b));
        if let (Some(date), Some(m)) = (date, caps.get(0)) {
            dates.push((date, m.as_str()));
        }
    }

    for caps in ISO_DATE.captures_iter(text) {
        let (Some(y), Some(m), Some(d)) = (year(&caps[1]), num(&caps[2]), num(&caps[3])) else {
            continue;
        };
        if let (Some(date), Some(whole)) = (NaiveDate::from_ymd_opt(y, m, d), caps.get(0)) {
            dates.push((date, whole.as_str()));
        }
    }

    for caps in NAMED_DATE.captures_iter(text) {
        let (Some(d), Some(m), Some(y)) = (num(&caps[1]), month_number(&caps[2]), year(&caps[3]))
        else {
            continue;
        };
        if let (Some(date), Some(whole)) = (NaiveDate::from_ymd_opt(y, m, d), caps.get(0)) {
            dates.push((date, whole.as_str()));
        }
    }

    for caps in NAMED_DATE_MONTH_FIRST.captures_iter(text) {
        let (Some(m), Some(d), Some(y)) = (month_number(&caps[1]), num(&caps[2]), year(&caps[3]))
        else {
            continue;
        };
        if let (Some(date), Some(whole)) = (NaiveDate::from_ymd_opt(y, m, d), caps.get(0)) {
            dates.push((date, whole.as_str()));
        }
    }

    dates
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn compile(pattern: Pattern) -> CompiledPattern {
        CompiledPattern::compile(&pattern).unwrap()
    }

    #[test]
    fn test_literal_is_case_insensitive() {
        let p = compile(Pattern::literal("CE"));
        assert!(p.is_match("the ce marking"));
        assert!(p.is_match("CE"));
    }

    #[test]
    fn test_literal_respects_word_boundaries() {
        let p = compile(Pattern::literal("CE"));
        assert!(!p.is_match("compliance"));
        assert!(!p.is_match("device"));
        assert!(p.is_match("CE-marked"));
    }

    #[test]
    fn test_literal_escapes_metacharacters() {
        let p = compile(Pattern::literal("S.A."));
        assert!(p.is_match("Acme S.A. Lisbon"));
        assert!(!p.is_match("Acme SxAx Lisbon"));
    }

    #[test]
    fn test_find_counts_all_occurrences() {
        let p = compile(Pattern::regex(r"notified\s+body"));
        let m = p.find("Notified Body 0123 ... notified  body again").unwrap();
        assert_eq!(m.count, 2);
        assert_eq!((m.start, m.end), (0, 13));
        assert!(p.find("no match here").is_none());
    }

    #[test]
    fn test_confidence() {
        let literal = compile(Pattern::literal("CE"));
        let regex = compile(Pattern::regex(r"iso\s+\d+"));
        assert_eq!(literal.confidence(1), 1.0);
        assert_eq!(regex.confidence(1), 0.5);
        assert_eq!(regex.confidence(2), 1.0);
        assert_eq!(regex.confidence(7), 1.0);
        assert_eq!(regex.confidence(0), 0.0);
    }

    #[test]
    fn test_compile_rejects_bad_patterns() {
        assert!(CompiledPattern::compile(&Pattern::regex("(unclosed")).is_err());
        assert!(CompiledPattern::compile(&Pattern::literal("  ")).is_err());
        assert!(CompiledPattern::compile(&Pattern::regex("a*")).is_err());
    }

    #[test]
    fn test_extract_snippet_short_text() {
        let text = "Manufacturer: Acme GmbH";
        assert_eq!(extract_snippet(text, 0, 12), "Manufacturer: Acme GmbH");
    }

    #[test]
    fn test_extract_snippet_marks_truncation() {
        let text = format!("{}CE marking{}", "x".repeat(80), "y".repeat(80));
        let snippet = extract_snippet(&text, 80, 90);
        assert!(snippet.starts_with("..."));
        assert!(snippet.ends_with("..."));
        assert!(snippet.contains("CE marking"));
    }

    #[test]
    fn test_extract_snippet_multibyte() {
        let text = format!("{}TÜV SÜD{}", "ä".repeat(40), "ö".repeat(40));
        let start = text.find("TÜV").unwrap();
        let snippet = extract_snippet(&text, start, start + "TÜV SÜD".len());
        assert!(snippet.contains("TÜV SÜD"));
    }

    #[test]
    fn test_find_dates_formats() {
        let text = "Issued 15.03.2024, revised 2024-04-01, signed 3 May 2024 and June 7, 2024.";
        let dates: Vec<NaiveDate> = find_dates(text).into_iter().map(|(d, _)| d).collect();
        assert!(dates.contains(&NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()));
        assert!(dates.contains(&NaiveDate::from_ymd_opt(2024, 4, 1).unwrap()));
        assert!(dates.contains(&NaiveDate::from_ymd_opt(2024, 5, 3).unwrap()));
        assert!(dates.contains(&NaiveDate::from_ymd_opt(2024, 6, 7).unwrap()));
        assert_eq!(dates.len(), 4);
    }

    #[test]
    fn test_find_dates_month_first_fallback() {
        let dates = find_dates("Date: 03/25/2024");
        assert_eq!(dates[0].0, NaiveDate::from_ymd_opt(2024, 3, 25).unwrap());
    }

    #[test]
    fn test_find_dates_ignores_standard_numbers() {
        assert!(find_dates("EN ISO 14971:2019 and EN ISO 10993-1:2018").is_empty());
    }
}
