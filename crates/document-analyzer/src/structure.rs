//! Line-based structure heuristics
//!
//! PDF text carries no semantic markup, so headings, list items and table
//! rows are recognised from the shape of each line. Word paragraphs without
//! an explicit style fall back to the same classifier.

use once_cell::sync::Lazy;
use regex::Regex;
use shared_types::{ElementKind, StructuralElement, StructuralRole, StructureSummary};

static LIST_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:[-•*▪◦]|\(?\d{1,3}[.)]|\(?[a-z][.)])\s+\S").unwrap());

static NUMBERED_SECTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,2}(?:\.\d{1,2})*\.?\s+\p{Lu}").unwrap());

static COLUMN_GAPS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\S {3,}\S.* {3,}\S").unwrap());

static KEY_PHRASES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"declaration\s+of\s+conformity",
        r"ce\s+marking",
        r"medical\s+device",
        r"regulation\s+\(eu\)",
        r"harmonised\s+standards?",
        r"conformity\s+assessment",
        r"authori[sz]ed\s+representative",
        r"notified\s+body",
    ]
    .iter()
    .map(|p| Regex::new(&format!("(?i){}", p)).unwrap())
    .collect()
});

const HEADING_KEYWORDS: &[&str] = &["declaration", "conformity", "section", "chapter", "annex"];

/// Maximum characters for a line to be considered a heading
const MAX_HEADING_LEN: usize = 100;

/// Classify one non-empty line
pub fn classify_line(line: &str) -> ElementKind {
    let trimmed = line.trim();

    if is_section_heading(trimmed) {
        return ElementKind::Heading;
    }
    if LIST_ITEM.is_match(line) {
        return ElementKind::ListItem;
    }
    if is_table_row(line) {
        return ElementKind::Table;
    }
    if is_heading(trimmed) {
        return ElementKind::Heading;
    }
    ElementKind::Paragraph
}

pub fn is_table_row(line: &str) -> bool {
    line.contains('|') || line.trim().contains('\t') || COLUMN_GAPS.is_match(line)
}

/// Numbered section titles such as "3. Applicable Regulations"
fn is_section_heading(line: &str) -> bool {
    line.chars().count() < 80
        && !line.ends_with(&['.', ';', ','][..])
        && NUMBERED_SECTION.is_match(line)
}

fn is_heading(line: &str) -> bool {
    let len = line.chars().count();
    if len == 0 || len >= MAX_HEADING_LEN {
        return false;
    }

    let has_letters = line.chars().any(char::is_alphabetic);
    let all_caps = has_letters && !line.chars().any(char::is_lowercase);
    if all_caps {
        return true;
    }

    let lower = line.to_lowercase();
    let short = len < 60 && !line.ends_with('.');
    short && HEADING_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Split raw page text into structural elements.
///
/// Consecutive table rows are merged into a single table element.
pub fn classify_page(
    text: &str,
    page: Option<u32>,
    role: StructuralRole,
    position: &mut usize,
) -> Vec<StructuralElement> {
    let mut elements = Vec::new();
    let mut table_rows: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            flush_table(&mut table_rows, &mut elements, position, page, role);
            continue;
        }

        let kind = classify_line(line);
        if kind == ElementKind::Table {
            table_rows.push(line.trim());
            continue;
        }

        flush_table(&mut table_rows, &mut elements, position, page, role);
        elements.push(StructuralElement {
            kind,
            role,
            text: line.trim().to_string(),
            position: *position,
            page,
        });
        *position += 1;
    }
    flush_table(&mut table_rows, &mut elements, position, page, role);

    elements
}

fn flush_table(
    rows: &mut Vec<&str>,
    elements: &mut Vec<StructuralElement>,
    position: &mut usize,
    page: Option<u32>,
    role: StructuralRole,
) {
    if rows.is_empty() {
        return;
    }
    elements.push(StructuralElement {
        kind: ElementKind::Table,
        role,
        text: rows.join("\n"),
        position: *position,
        page,
    });
    *position += 1;
    rows.clear();
}

/// Regulatory phrases present in `text`, lowercased, in pattern order
pub fn key_phrases(text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for pattern in KEY_PHRASES.iter() {
        for m in pattern.find_iter(text) {
            let phrase = m
                .as_str()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .to_lowercase();
            if !found.contains(&phrase) {
                found.push(phrase);
            }
        }
    }
    found
}

/// Summarize line statistics of the raw (un-normalized) text together
/// with the classified elements
pub fn summarize(raw_text: &str, elements: &[StructuralElement]) -> StructureSummary {
    let lines: Vec<&str> = raw_text.lines().collect();
    let count = |kind: ElementKind| elements.iter().filter(|e| e.kind == kind).count();
    let tables = count(ElementKind::Table);

    StructureSummary {
        total_lines: lines.len(),
        non_empty_lines: lines.iter().filter(|l| !l.trim().is_empty()).count(),
        headings: count(ElementKind::Heading),
        list_items: count(ElementKind::ListItem),
        tables,
        has_tables: tables > 0 || lines.iter().any(|l| l.contains('|') || l.contains('\t')),
        key_phrases: key_phrases(raw_text),
    }
}
