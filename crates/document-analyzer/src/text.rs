//! Text cleanup, counting and language detection

const ENGLISH_MARKERS: &[&str] = &[
    "the", "and", "of", "to", "is", "it", "that", "with", "for", "this",
];
const GERMAN_MARKERS: &[&str] = &[
    "der", "die", "und", "den", "von", "zu", "das", "mit", "sich", "ist",
];

/// Strip control characters and optionally collapse all whitespace runs.
///
/// Without collapsing, line structure survives: trailing spaces are trimmed
/// and runs of blank lines are reduced to one.
pub fn normalize(text: &str, collapse_whitespace: bool) -> String {
    let cleaned: String = text
        .chars()
        .filter_map(|c| match c {
            '\0' => None,
            '\x0C' => Some('\n'),
            '\r' => None,
            '\n' | '\t' => Some(c),
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect();

    if collapse_whitespace {
        return cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    }

    let mut out = String::with_capacity(cleaned.len());
    let mut blank_run = 0;
    for line in cleaned.lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim().to_string()
}

pub fn non_whitespace_len(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

/// Characters that indicate a broken font encoding
pub fn garbage_len(text: &str) -> usize {
    text.chars()
        .filter(|c| matches!(c, '\u{FFFD}' | '\u{E000}'..='\u{F8FF}'))
        .count()
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Guess "en", "de" or "unknown" from common function words
pub fn detect_language(text: &str) -> &'static str {
    let mut english = 0usize;
    let mut german = 0usize;

    for word in text
        .split(|c: char| !c.is_alphabetic())
        .filter(|w| !w.is_empty())
        .take(5000)
    {
        let word = word.to_lowercase();
        if ENGLISH_MARKERS.contains(&word.as_str()) {
            english += 1;
        }
        if GERMAN_MARKERS.contains(&word.as_str()) {
            german += 1;
        }
    }

    if english == 0 && german == 0 {
        "unknown"
    } else if english >= german {
        "en"
    } else {
        "de"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalize_collapses_whitespace() {
        let raw = "  EU  Declaration\x00\n\n of\tConformity\x0C page 2 ";
        assert_eq!(normalize(raw, true), "EU Declaration of Conformity page 2");
    }

    #[test]
    fn test_normalize_keeps_lines() {
        let raw = "Title   \n\n\n\nBody line\r\nNext\x07";
        assert_eq!(normalize(raw, false), "Title\n\nBody line\nNext");
    }

    #[test]
    fn test_counts() {
        assert_eq!(non_whitespace_len(" a b\n c "), 3);
        assert_eq!(garbage_len("ok\u{FFFD}\u{E001}"), 2);
        assert_eq!(word_count("one two  three"), 3);
    }

    #[test]
    fn test_detect_language() {
        let english = "This declaration is issued under the sole responsibility of the manufacturer";
        let german = "Der Hersteller erklärt, dass das Produkt mit den Anforderungen übereinstimmt";
        assert_eq!(detect_language(english), "en");
        assert_eq!(detect_language(german), "de");
        assert_eq!(detect_language("12345 ---"), "unknown");
    }

    mod proptests {
        use super::super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn normalize_is_idempotent(s in "\\PC*") {
                let once = normalize(&s, true);
                prop_assert_eq!(normalize(&once, true), once.clone());
            }

            #[test]
            fn normalize_preserves_visible_chars(s in "[a-zA-Z0-9 \\n\\t]{0,200}") {
                prop_assert_eq!(non_whitespace_len(&normalize(&s, true)), non_whitespace_len(&s));
                prop_assert_eq!(non_whitespace_len(&normalize(&s, false)), non_whitespace_len(&s));
            }
        }
    }
}
