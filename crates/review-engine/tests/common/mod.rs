//! Shared fixtures for engine and workflow tests
#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use compliance_engine::{TemplateProcessor, TemplateStore};
use document_analyzer::{AnalysisResult, AnalyzerError, ExtractionInfo, UploadedFile};
use review_engine::{DocumentAnalysis, EngineSettings, RequestState, ReviewEngine};
use shared_types::{
    Document, DocumentFormat, Pattern, Requirement, Severity, StructureSummary, Template,
};

pub const COMPLETE_DECLARATION: &[&str] = &[
    "EU DECLARATION OF CONFORMITY",
    "Manufacturer: Acme Medical Devices GmbH, Example Street 12, 10115 Berlin, Germany",
    "Product: Sterile Surgical Scalpel Model: SC-2024-01",
    "We hereby declare that the product above is in conformity with Regulation (EU) 2017/745 (MDR).",
    "Harmonised standards applied: EN ISO 14971:2019, EN ISO 13485:2016.",
    "Notified Body: TUV SUD Product Service GmbH (NB 0123), certificate number G1 12345.",
    "The CE marking has been affixed to the product.",
    "Authorised Representative: EU MedTech Services B.V., Amsterdam.",
    "Place and date of issue: Berlin, Date: 15.03.2024",
    "Signature: Dr. A. Director",
];

fn paragraph(text: &str) -> String {
    format!("<w:p><w:r><w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>", text)
}

pub fn create_test_docx(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs.iter().map(|p| paragraph(p)).collect();
    let document = format!("<w:document><w:body>{}</w:body></w:document>", body);

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::FileOptions::default();
    let parts = [
        ("[Content_Types].xml", "<Types/>".to_string()),
        ("word/document.xml", document),
    ];
    for (name, content) in parts {
        writer.start_file(name, options).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

pub fn declaration_upload() -> UploadedFile {
    UploadedFile::new("declaration.docx", create_test_docx(COMPLETE_DECLARATION))
}

/// Treats the upload bytes as the document text
pub struct TextAnalyzer {
    pub delay: Duration,
    pub gate: Option<Arc<Mutex<()>>>,
}

impl TextAnalyzer {
    pub fn instant() -> Self {
        Self {
            delay: Duration::ZERO,
            gate: None,
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self { delay, gate: None }
    }

    /// Blocks while the test holds the gate's lock
    pub fn gated(gate: Arc<Mutex<()>>) -> Self {
        Self {
            delay: Duration::ZERO,
            gate: Some(gate),
        }
    }
}

impl DocumentAnalysis for TextAnalyzer {
    fn analyze(&self, file: &UploadedFile) -> Result<AnalysisResult, AnalyzerError> {
        if let Some(gate) = &self.gate {
            let _open = gate.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        std::thread::sleep(self.delay);

        let text = String::from_utf8(file.bytes.clone()).map_err(|_| AnalyzerError::CorruptFile {
            filename: file.filename.clone(),
            reason: "not UTF-8".into(),
        })?;
        Ok(AnalysisResult {
            document: Document::new(&file.filename, DocumentFormat::Pdf, text),
            structure: StructureSummary::default(),
            extraction: ExtractionInfo {
                method: "text".into(),
                attempts: vec![],
            },
            processing_ms: 0,
        })
    }
}

/// Panics on uploads whose name starts with "boom"
pub struct ExplodingAnalyzer;

impl DocumentAnalysis for ExplodingAnalyzer {
    fn analyze(&self, file: &UploadedFile) -> Result<AnalysisResult, AnalyzerError> {
        if file.filename.starts_with("boom") {
            panic!("analyzer exploded on {}", file.filename);
        }
        TextAnalyzer::instant().analyze(file)
    }
}

pub fn text_upload(name: &str, text: &str) -> UploadedFile {
    UploadedFile::new(name, text.as_bytes().to_vec())
}

/// Built-in templates plus `ce_nb`: CE (high, weight 5) and Notified Body (medium, weight 3)
pub fn processor() -> Arc<TemplateProcessor> {
    let mut store = TemplateStore::with_builtin().unwrap();
    store
        .register_template(
            Template::new("ce_nb", "CE and NB", "1.0")
                .with_requirement(
                    Requirement::new("ce", "CE Marking", Severity::High)
                        .with_pattern(Pattern::literal("CE"))
                        .with_weight(5.0),
                )
                .with_requirement(
                    Requirement::new("nb", "Notified Body", Severity::Medium)
                        .with_pattern(Pattern::literal("Notified Body"))
                        .with_weight(3.0),
                ),
        )
        .unwrap();
    Arc::new(TemplateProcessor::new(Arc::new(store)))
}

pub fn settings(workers: usize, capacity: usize) -> EngineSettings {
    EngineSettings {
        worker_count: workers,
        queue_capacity: capacity,
        ..Default::default()
    }
}

pub fn engine(settings: EngineSettings, analyzer: impl DocumentAnalysis) -> ReviewEngine {
    ReviewEngine::new(settings, Arc::new(analyzer), processor())
}

pub async fn wait_for_state(engine: &ReviewEngine, request_id: &str, state: RequestState) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if engine.status(request_id).await.unwrap().state == state {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("request {request_id} never reached {state}"));
}

/// Bytes that are not valid UTF-8, rejected by `TextAnalyzer`
pub fn binary_upload(name: &str) -> UploadedFile {
    UploadedFile::new(name, vec![0xff, 0xfe, 0x00, 0x9f])
}
