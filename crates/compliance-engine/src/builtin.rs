//! Templates compiled into the binary

use shared_types::Template;

use crate::error::ComplianceError;
use crate::loader::TemplateFile;

pub const EU_DOC_TEMPLATE_ID: &str = "eu_doc";

const EU_DOC_TOML: &str = include_str!("../templates/eu_doc.toml");

pub fn builtin_templates() -> Result<Vec<Template>, ComplianceError> {
    TemplateFile::from_str(EU_DOC_TOML)
        .map(|file| file.templates)
        .map_err(|e| ComplianceError::invalid(EU_DOC_TEMPLATE_ID, format!("{e:#}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::{TemplateProcessor, ValidationOptions};
    use crate::store::TemplateStore;
    use chrono::NaiveDate;
    use shared_types::{ComplianceStatus, Document, DocumentFormat, Severity};
    use std::sync::Arc;

    const COMPLETE_DECLARATION: &str = "EU DECLARATION OF CONFORMITY \
        Manufacturer: Acme Medical Devices GmbH, Example Street 12, 10115 Berlin, Germany \
        Product: Sterile Surgical Scalpel Model: SC-2024-01 \
        We hereby declare that the product above is in conformity with \
        Regulation (EU) 2017/745 (MDR). \
        Harmonised standards applied: EN ISO 14971:2019, EN ISO 13485:2016. \
        Notified Body: TUV SUD Product Service GmbH (NB 0123), certificate number G1 12345. \
        The CE marking has been affixed to the product. \
        Authorised Representative: EU MedTech Services B.V., Amsterdam. \
        Place and date of issue: Berlin, Date: 15.03.2024 Signature: Dr. A. Director";

    fn processor() -> TemplateProcessor {
        TemplateProcessor::new(Arc::new(TemplateStore::with_builtin().unwrap()))
    }

    fn options() -> ValidationOptions {
        ValidationOptions {
            reference_date: NaiveDate::from_ymd_opt(2024, 6, 1),
            ..Default::default()
        }
    }

    #[test]
    fn test_eu_doc_shape() {
        let templates = builtin_templates().unwrap();
        let eu = &templates[0];
        assert_eq!(eu.id, EU_DOC_TEMPLATE_ID);
        assert_eq!(eu.requirements.len(), 9);
        let critical = eu
            .requirements
            .iter()
            .filter(|r| r.severity == Severity::Critical)
            .count();
        assert_eq!(critical, 3);
        assert!(!eu.requirement("notified_body").unwrap().required);
    }

    #[test]
    fn test_complete_declaration_passes() {
        let document = Document::new("doc.pdf", DocumentFormat::Pdf, COMPLETE_DECLARATION);
        let result = processor()
            .validate(&document, EU_DOC_TEMPLATE_ID, &options())
            .unwrap();
        let unmatched: Vec<&str> = result
            .findings
            .iter()
            .filter(|f| !f.matched)
            .map(|f| f.requirement_id.as_str())
            .collect();
        assert!(unmatched.is_empty(), "unmatched: {unmatched:?}");
        assert_eq!(result.compliance_score, 100.0);
        assert_eq!(result.status, ComplianceStatus::Passed);
        assert!(result.findings.iter().all(|f| f.notes.is_empty()), "{:?}", result.findings);
    }

    #[test]
    fn test_bare_letter_fails() {
        let document = Document::new(
            "letter.pdf",
            DocumentFormat::Pdf,
            "Dear customer, thank you for your order.",
        );
        let result = processor()
            .validate(&document, EU_DOC_TEMPLATE_ID, &options())
            .unwrap();
        assert_eq!(result.compliance_score, 0.0);
        assert_eq!(result.status, ComplianceStatus::Failed);
        assert_eq!(result.summary.unmatched_critical, 3);
    }

    #[test]
    fn test_manufacturer_without_company_form_gets_note() {
        let text =
            COMPLETE_DECLARATION.replace("Acme Medical Devices GmbH", "Acme Medical Devices");
        let document = Document::new("doc.pdf", DocumentFormat::Pdf, text);
        let result = processor()
            .validate(&document, EU_DOC_TEMPLATE_ID, &options())
            .unwrap();
        let manufacturer = result.finding("manufacturer_info").unwrap();
        assert!(manufacturer.matched);
        assert_eq!(manufacturer.notes.len(), 1);
    }
}
