//! Plausibility checks on matched requirements

use chrono::NaiveDate;
use shared_types::{ContentCheck, Pattern};

use crate::patterns::{find_dates, window, CompiledPattern};

/// Bytes after the first match searched by `mentions_any`
const MENTION_WINDOW_AFTER: usize = 200;
const MENTION_WINDOW_BEFORE: usize = 20;

#[derive(Debug, Clone)]
pub enum CompiledCheck {
    MentionsAny {
        terms: Vec<CompiledPattern>,
        message: String,
    },
    NoFutureDates {
        message: String,
    },
}

impl CompiledCheck {
    pub fn compile(check: &ContentCheck) -> Result<Self, String> {
        match check {
            ContentCheck::MentionsAny { terms, message } => {
                if terms.is_empty() {
                    return Err("mentions_any check has no terms".to_string());
                }
                let terms = terms
                    .iter()
                    .map(|t| CompiledPattern::compile(&Pattern::literal(t.as_str())))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Self::MentionsAny {
                    terms,
                    message: message.clone(),
                })
            }
            ContentCheck::NoFutureDates { message } => Ok(Self::NoFutureDates {
                message: message.clone(),
            }),
        }
    }

    /// Run the check; `Some(note)` when it fails.
    ///
    /// `span` is the byte span of the requirement's first match in `text`.
    pub fn evaluate(&self, text: &str, span: (usize, usize), today: NaiveDate) -> Option<String> {
        match self {
            Self::MentionsAny { terms, message } => {
                let around =
                    window(text, span.0, span.1, MENTION_WINDOW_BEFORE, MENTION_WINDOW_AFTER);
                if terms.iter().any(|t| t.is_match(around)) {
                    None
                } else {
                    Some(message.clone())
                }
            }
            Self::NoFutureDates { message } => {
                let future: Vec<&str> = find_dates(text)
                    .into_iter()
                    .filter(|(date, _)| *date > today)
                    .map(|(_, raw)| raw)
                    .collect();
                if future.is_empty() {
                    None
                } else {
                    Some(format!("{}: {}", message, future.join(", ")))
                }
            }
        }
    }
}
