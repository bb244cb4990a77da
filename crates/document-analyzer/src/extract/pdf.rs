//! PDF extraction with two independent backends
//!
//! `pdf-extract` handles most font encodings well but occasionally fails or
//! panics on unusual files; `lopdf` extracts page by page and survives some
//! of those. Both are run and the one yielding more usable text wins.

use std::panic::{self, AssertUnwindSafe};

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use lopdf::{Dictionary, Object};
use shared_types::{DocumentMetadata, StructuralRole};
use tracing::{debug, warn};

use super::{Extracted, ExtractionAttempt};
use crate::error::AnalyzerError;
use crate::structure;
use crate::text;

pub(crate) const PDF_EXTRACT_BACKEND: &str = "pdf-extract";
pub(crate) const LOPDF_BACKEND: &str = "lopdf";

/// Output of one backend
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Candidate {
    pub backend: &'static str,
    pub pages: Vec<String>,
}

impl Candidate {
    /// Non-whitespace characters minus replacement and private-use glyphs
    pub fn usable_chars(&self) -> usize {
        self.pages
            .iter()
            .map(|p| text::non_whitespace_len(p).saturating_sub(text::garbage_len(p)))
            .sum()
    }
}

/// Pick the candidate with the most usable text; earlier candidates win ties
pub(crate) fn select_best(candidates: Vec<Candidate>) -> Option<Candidate> {
    candidates
        .into_iter()
        .reduce(|best, next| if next.usable_chars() > best.usable_chars() { next } else { best })
}

/// Cheap header check; some producers put junk bytes before `%PDF-`
pub(crate) fn looks_like_pdf(data: &[u8]) -> bool {
    data.windows(5).take(1024).any(|w| w == b"%PDF-")
}

pub(crate) fn extract(filename: &str, data: &[u8]) -> Result<Extracted, AnalyzerError> {
    if !looks_like_pdf(data) {
        return Err(AnalyzerError::corrupt(filename, "missing %PDF header"));
    }

    let mut attempts = Vec::new();
    let mut candidates = Vec::new();
    let mut encrypted = false;

    match run_pdf_extract(data) {
        Ok(pages) => candidates.push(Candidate {
            backend: PDF_EXTRACT_BACKEND,
            pages,
        }),
        Err(e) => {
            warn!(filename, backend = PDF_EXTRACT_BACKEND, error = %e, "PDF backend failed");
            let lower = e.to_lowercase();
            encrypted |= lower.contains("encrypt") || lower.contains("password");
            attempts.push(ExtractionAttempt::failed(PDF_EXTRACT_BACKEND, e));
        }
    }

    let parsed = lopdf::Document::load_mem(data);
    let mut metadata = DocumentMetadata::default();
    match &parsed {
        Ok(doc) => {
            encrypted |= doc.is_encrypted();
            metadata = read_metadata(doc);
            match run_lopdf(doc) {
                Ok(pages) => candidates.push(Candidate {
                    backend: LOPDF_BACKEND,
                    pages,
                }),
                Err(e) => {
                    warn!(filename, backend = LOPDF_BACKEND, error = %e, "PDF backend failed");
                    attempts.push(ExtractionAttempt::failed(LOPDF_BACKEND, e));
                }
            }
        }
        Err(e) => {
            warn!(filename, backend = LOPDF_BACKEND, error = %e, "PDF could not be parsed");
            attempts.push(ExtractionAttempt::failed(LOPDF_BACKEND, e.to_string()));
        }
    }

    for candidate in &candidates {
        attempts.push(ExtractionAttempt {
            backend: candidate.backend.to_string(),
            characters: candidate.usable_chars(),
            error: None,
        });
    }

    let Some(best) = select_best(candidates) else {
        if encrypted {
            return Err(AnalyzerError::PasswordProtected {
                filename: filename.to_string(),
            });
        }
        let reasons: Vec<String> = attempts
            .iter()
            .filter_map(|a| a.error.as_ref().map(|e| format!("{}: {}", a.backend, e)))
            .collect();
        return Err(AnalyzerError::corrupt(filename, reasons.join("; ")));
    };

    if best.usable_chars() == 0 {
        return Err(if encrypted {
            AnalyzerError::PasswordProtected {
                filename: filename.to_string(),
            }
        } else {
            AnalyzerError::NoTextContent {
                filename: filename.to_string(),
            }
        });
    }

    debug!(filename, backend = best.backend, chars = best.usable_chars(), "Selected PDF backend");

    if metadata.page_count == 0 {
        metadata.page_count = best.pages.len() as u32;
    }

    let mut position = 0;
    let elements = best
        .pages
        .iter()
        .enumerate()
        .flat_map(|(i, page)| {
            structure::classify_page(page, Some(i as u32 + 1), StructuralRole::Body, &mut position)
        })
        .collect();

    Ok(Extracted {
        pages: best.pages,
        elements,
        metadata,
        method: best.backend,
        attempts,
    })
}

fn run_pdf_extract(data: &[u8]) -> Result<Vec<String>, String> {
    let text = panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(data)))
        .map_err(|_| "pdf-extract panicked while decoding".to_string())?
        .map_err(|e| e.to_string())?;

    // pdf-extract separates pages with form feeds
    let mut pages: Vec<String> = text.split('\x0C').map(str::to_string).collect();
    if pages.len() > 1 && pages.last().is_some_and(|p| p.trim().is_empty()) {
        pages.pop();
    }
    Ok(pages)
}

fn run_lopdf(doc: &lopdf::Document) -> Result<Vec<String>, String> {
    let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
    if page_numbers.is_empty() {
        return Err("document has no pages".to_string());
    }

    page_numbers
        .iter()
        .map(|&number| {
            panic::catch_unwind(AssertUnwindSafe(|| doc.extract_text(&[number])))
                .map_err(|_| format!("lopdf panicked on page {}", number))?
                .map_err(|e| format!("page {}: {}", number, e))
        })
        .collect()
}

fn read_metadata(doc: &lopdf::Document) -> DocumentMetadata {
    let mut metadata = DocumentMetadata {
        page_count: doc.get_pages().len() as u32,
        ..Default::default()
    };

    let info = match doc.trailer.get(b"Info") {
        Ok(Object::Reference(id)) => doc.get_object(*id).and_then(Object::as_dict).ok(),
        Ok(Object::Dictionary(dict)) => Some(dict),
        _ => None,
    };

    if let Some(info) = info {
        metadata.title = info_string(info, b"Title");
        metadata.author = info_string(info, b"Author");
        metadata.subject = info_string(info, b"Subject");
        metadata.creator = info_string(info, b"Creator");
        metadata.created = info_string(info, b"CreationDate").and_then(|d| parse_pdf_date(&d));
        metadata.modified = info_string(info, b"ModDate").and_then(|d| parse_pdf_date(&d));
    }
    metadata
}

fn info_string(dict: &Dictionary, key: &[u8]) -> Option<String> {
    match dict.get(key).ok()? {
        Object::String(bytes, _) => Some(decode_pdf_string(bytes)),
        _ => None,
    }
    .map(|s| s.trim().to_string())
    .filter(|s| !s.is_empty())
}

/// Decode a PDF text string: UTF-16BE with BOM, otherwise byte-per-char
pub(crate) fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|&b| b as char).collect()
}

/// Parse `D:YYYYMMDDHHmmSSOHH'mm'`; every field after the year is optional
pub(crate) fn parse_pdf_date(raw: &str) -> Option<DateTime<Utc>> {
    let value = raw.trim();
    let value = value.strip_prefix("D:").unwrap_or(value);
    let digits: String = value.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.len() < 4 {
        return None;
    }

    let field = |start: usize, default: u32| -> Option<u32> {
        match digits.get(start..start + 2) {
            Some(s) => s.parse().ok(),
            None => Some(default),
        }
    };

    let year: i32 = digits[..4].parse().ok()?;
    let naive = NaiveDate::from_ymd_opt(year, field(4, 1)?, field(6, 1)?)?
        .and_hms_opt(field(8, 0)?, field(10, 0)?, field(12, 0)?)?;

    let zone = &value[digits.len()..];
    let offset_secs = match zone.chars().next() {
        Some(sign @ ('+' | '-')) => {
            let tz_digits: String = zone.chars().filter(|c| c.is_ascii_digit()).collect();
            let hours: i32 = tz_digits.get(..2).and_then(|h| h.parse().ok()).unwrap_or(0);
            let minutes: i32 = tz_digits.get(2..4).and_then(|m| m.parse().ok()).unwrap_or(0);
            let secs = hours * 3600 + minutes * 60;
            if sign == '-' { -secs } else { secs }
        }
        _ => 0,
    };

    FixedOffset::east_opt(offset_secs)?
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}
