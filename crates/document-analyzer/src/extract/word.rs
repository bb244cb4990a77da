//! WordprocessingML (.docx) extraction
//!
//! Reads the package with `zip` and walks `word/document.xml` plus the
//! header and footer parts. Paragraphs keep their reading order; tables are
//! flattened row-major with cells separated by " | ".

use std::io::{Cursor, Read};

use chrono::{DateTime, Utc};
use shared_types::{DocumentMetadata, ElementKind, StructuralElement, StructuralRole};
use tracing::debug;
use zip::ZipArchive;

use super::xml::{self, XmlError, XmlEvent};
use super::{Extracted, ExtractionAttempt};
use crate::error::AnalyzerError;
use crate::structure;

const DOCUMENT_PART: &str = "word/document.xml";
const CORE_PROPS_PART: &str = "docProps/core.xml";
const APP_PROPS_PART: &str = "docProps/app.xml";

/// OLE2 compound file signature used by legacy binary .doc files
const OLE_SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

pub(crate) fn is_ole_compound(data: &[u8]) -> bool {
    data.starts_with(&OLE_SIGNATURE)
}

pub(crate) fn is_zip_package(data: &[u8]) -> bool {
    data.starts_with(b"PK\x03\x04")
}

/// A paragraph or table recovered from a part, before position assignment
#[derive(Debug, Clone, PartialEq)]
struct Block {
    kind: ElementKind,
    text: String,
}

pub(crate) fn extract(filename: &str, data: &[u8]) -> Result<Extracted, AnalyzerError> {
    let mut archive = ZipArchive::new(Cursor::new(data))
        .map_err(|e| AnalyzerError::corrupt(filename, format!("not a valid Word package: {}", e)))?;

    let document_xml = read_part(&mut archive, DOCUMENT_PART)
        .map_err(|e| AnalyzerError::corrupt(filename, e))?
        .ok_or_else(|| AnalyzerError::corrupt(filename, format!("missing {}", DOCUMENT_PART)))?;

    let mut part_names: Vec<String> = archive.file_names().map(str::to_string).collect();
    part_names.sort();

    let mut elements = Vec::new();
    let mut position = 0;
    let mut body_text = Vec::new();

    let blocks = parse_blocks(&document_xml)
        .map_err(|e| AnalyzerError::corrupt(filename, format!("{}: {}", DOCUMENT_PART, e)))?;
    for block in blocks {
        body_text.push(block.text.clone());
        elements.push(StructuralElement {
            kind: block.kind,
            role: StructuralRole::Body,
            text: block.text,
            position,
            page: None,
        });
        position += 1;
    }

    for (prefix, role) in [
        ("word/header", StructuralRole::Header),
        ("word/footer", StructuralRole::Footer),
    ] {
        for name in part_names.iter().filter(|n| is_numbered_part(n, prefix)) {
            let Some(part) =
                read_part(&mut archive, name).map_err(|e| AnalyzerError::corrupt(filename, e))?
            else {
                continue;
            };
            let blocks = parse_blocks(&part)
                .map_err(|e| AnalyzerError::corrupt(filename, format!("{}: {}", name, e)))?;
            debug!(part = %name, blocks = blocks.len(), "Read header/footer part");
            for block in blocks {
                body_text.push(block.text.clone());
                elements.push(StructuralElement {
                    kind: block.kind,
                    role,
                    text: block.text,
                    position,
                    page: None,
                });
                position += 1;
            }
        }
    }

    let mut metadata = DocumentMetadata::default();
    if let Ok(Some(core)) = read_part(&mut archive, CORE_PROPS_PART) {
        apply_core_properties(&core, &mut metadata);
    }
    metadata.page_count = read_part(&mut archive, APP_PROPS_PART)
        .ok()
        .flatten()
        .and_then(|app| xml::element_text(&app, "Pages"))
        .and_then(|pages| pages.parse().ok())
        .unwrap_or(1);

    let text = body_text.join("\n");
    let characters = crate::text::non_whitespace_len(&text);

    Ok(Extracted {
        pages: vec![text],
        elements,
        metadata,
        method: "ooxml",
        attempts: vec![ExtractionAttempt {
            backend: "ooxml".to_string(),
            characters,
            error: None,
        }],
    })
}

/// `word/header1.xml`, `word/footer2.xml`, ... but not `word/footnotes.xml`
fn is_numbered_part(name: &str, prefix: &str) -> bool {
    name.strip_prefix(prefix)
        .and_then(|rest| rest.strip_suffix(".xml"))
        .is_some_and(|n| n.chars().all(|c| c.is_ascii_digit()))
}

fn read_part<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<String>, String> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(format!("cannot open {}: {}", name, e)),
    };
    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| format!("cannot read {}: {}", name, e))?;
    Ok(Some(content))
}

fn apply_core_properties(core: &str, metadata: &mut DocumentMetadata) {
    metadata.title = xml::element_text(core, "dc:title");
    metadata.subject = xml::element_text(core, "dc:subject");
    metadata.author = xml::element_text(core, "dc:creator");
    metadata.creator = xml::element_text(core, "cp:lastModifiedBy");
    metadata.created =
        xml::element_text(core, "dcterms:created").and_then(|s| parse_w3c_date(&s));
    metadata.modified =
        xml::element_text(core, "dcterms:modified").and_then(|s| parse_w3c_date(&s));
}

fn parse_w3c_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[derive(Default)]
struct ParagraphState {
    text: String,
    style: Option<String>,
    numbered: bool,
}

#[derive(Default)]
struct TableState {
    depth: usize,
    rows: Vec<Vec<String>>,
    row: Vec<String>,
    cell: Vec<String>,
}

/// Walk one part and return its paragraphs and tables in reading order
fn parse_blocks(xml_source: &str) -> Result<Vec<Block>, XmlError> {
    let mut blocks = Vec::new();
    let mut paragraph: Option<ParagraphState> = None;
    let mut table = TableState::default();
    let mut in_text = false;

    for event in xml::events(xml_source)? {
        match event {
            XmlEvent::Start { name, attrs } => match name.as_str() {
                "w:tbl" => table.depth += 1,
                "w:tr" if table.depth == 1 => table.row.clear(),
                "w:tc" if table.depth == 1 => table.cell.clear(),
                "w:p" => paragraph = Some(ParagraphState::default()),
                "w:pStyle" => {
                    if let Some(p) = paragraph.as_mut() {
                        p.style = xml::attribute(&attrs, "w:val").map(str::to_string);
                    }
                }
                "w:numPr" => {
                    if let Some(p) = paragraph.as_mut() {
                        p.numbered = true;
                    }
                }
                "w:t" => in_text = true,
                "w:tab" => push_text(&mut paragraph, "\t"),
                "w:br" | "w:cr" => push_text(&mut paragraph, "\n"),
                _ => {}
            },
            XmlEvent::End { name } => match name.as_str() {
                "w:tbl" => {
                    table.depth = table.depth.saturating_sub(1);
                    if table.depth == 0 {
                        if let Some(block) = table_block(std::mem::take(&mut table.rows)) {
                            blocks.push(block);
                        }
                    }
                }
                "w:tr" if table.depth == 1 => {
                    let row = std::mem::take(&mut table.row);
                    table.rows.push(row);
                }
                "w:tc" if table.depth == 1 => {
                    let cell = std::mem::take(&mut table.cell).join(" ");
                    table.row.push(cell.trim().to_string());
                }
                "w:p" => {
                    let Some(done) = paragraph.take() else {
                        continue;
                    };
                    let text = done.text.trim().to_string();
                    if table.depth > 0 {
                        if !text.is_empty() {
                            table.cell.push(text);
                        }
                    } else if !text.is_empty() {
                        let kind = paragraph_kind(&done, &text);
                        blocks.push(Block { kind, text });
                    }
                }
                "w:t" => in_text = false,
                _ => {}
            },
            XmlEvent::Text(text) if in_text => push_text(&mut paragraph, &text),
            XmlEvent::Text(_) => {}
        }
    }

    Ok(blocks)
}

fn table_block(rows: Vec<Vec<String>>) -> Option<Block> {
    let text = rows
        .iter()
        .map(|row| row.join(" | "))
        .filter(|row| !row.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    (!text.is_empty()).then_some(Block {
        kind: ElementKind::Table,
        text,
    })
}

fn push_text(paragraph: &mut Option<ParagraphState>, text: &str) {
    if let Some(p) = paragraph.as_mut() {
        p.text.push_str(text);
    }
}

fn paragraph_kind(paragraph: &ParagraphState, text: &str) -> ElementKind {
    if let Some(style) = paragraph.style.as_deref() {
        let style = style.to_lowercase();
        if style.starts_with("heading") || style == "title" || style == "subtitle" {
            return ElementKind::Heading;
        }
        if style.contains("list") {
            return ElementKind::ListItem;
        }
    }
    if paragraph.numbered {
        return ElementKind::ListItem;
    }

    // Tabs inside a body paragraph are layout, not a table
    match structure::classify_line(&text.replace('\t', " ")) {
        ElementKind::Table => ElementKind::Paragraph,
        kind => kind,
    }
}
