//! Review-level advice derived from findings

use shared_types::{Finding, Severity};

pub const SIGNIFICANT_GAPS_BELOW: f64 = 70.0;
pub const MINOR_GAPS_BELOW: f64 = 85.0;

pub fn build(findings: &[Finding], score: f64) -> Vec<String> {
    let mut recommendations = Vec::new();

    let missing: Vec<&str> = findings
        .iter()
        .filter(|f| f.required && !f.matched)
        .map(|f| f.title.as_str())
        .collect();
    if !missing.is_empty() {
        recommendations.push(format!("Add the missing required sections: {}", missing.join(", ")));
    }

    let critical = findings
        .iter()
        .filter(|f| f.required && !f.matched && f.severity == Severity::Critical)
        .count();
    if critical > 0 {
        recommendations.push(format!(
            "Resolve {} critical requirement{} before submitting the document",
            critical,
            if critical == 1 { "" } else { "s" }
        ));
    }

    let noted = findings.iter().filter(|f| !f.notes.is_empty()).count();
    if noted > 0 {
        recommendations.push(format!("Review the content notes on {} matched section(s)", noted));
    }

    if score < SIGNIFICANT_GAPS_BELOW {
        recommendations.push("Document needs significant work to meet the template".to_string());
    } else if score < MINOR_GAPS_BELOW {
        recommendations.push("Document is largely complete; close the remaining gaps".to_string());
    }

    recommendations
}
