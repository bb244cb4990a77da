//! Plain-text reporter

use std::fmt::Write;

use anyhow::Result;
use shared_types::{Finding, ReviewResult};

pub struct TextReporter;

impl TextReporter {
    pub fn format(result: &ReviewResult) -> Result<String> {
        let mut output = String::new();
        let rule = "=".repeat(60);

        writeln!(output, "{}", rule)?;
        writeln!(output, "REVIEW REPORT")?;
        writeln!(output, "{}", rule)?;
        writeln!(output, "Document:  {}", result.filename)?;
        writeln!(
            output,
            "Template:  {} ({} v{})",
            result.template_name, result.template_id, result.template_version
        )?;
        writeln!(output, "Request:   {}", result.request_id)?;
        writeln!(output, "Generated: {}", result.generated_at.to_rfc3339())?;
        writeln!(output)?;
        writeln!(output, "Status:    {}", result.status.as_str().to_uppercase())?;
        writeln!(output, "Score:     {:.1}%", result.compliance_score)?;
        writeln!(
            output,
            "Matched:   {} of {} requirements",
            result.summary.matched, result.summary.total_requirements
        )?;
        writeln!(output)?;

        writeln!(output, "{}", "-".repeat(60))?;
        writeln!(output, "Findings")?;
        writeln!(output, "{}", "-".repeat(60))?;
        for finding in &result.findings {
            Self::format_finding(&mut output, finding)?;
        }

        if !result.recommendations.is_empty() {
            writeln!(output)?;
            writeln!(output, "Recommendations:")?;
            for recommendation in &result.recommendations {
                writeln!(output, "  - {}", recommendation)?;
            }
        }
        writeln!(output, "{}", rule)?;
        Ok(output)
    }

    fn format_finding(output: &mut String, finding: &Finding) -> Result<()> {
        let mark = if finding.matched { "[x]" } else { "[ ]" };
        let optional = if finding.required { "" } else { ", optional" };
        writeln!(
            output,
            "{} {} ({}{})",
            mark, finding.title, finding.severity, optional
        )?;
        if finding.matched {
            writeln!(
                output,
                "    confidence {:.2}, {} match(es)",
                finding.confidence, finding.match_count
            )?;
            if let Some(location) = &finding.location {
                match location.page {
                    Some(page) => writeln!(output, "    page {}: {}", page, location.snippet)?,
                    None => writeln!(output, "    {}", location.snippet)?,
                }
            }
        } else if let Some(recommendation) = &finding.recommendation {
            writeln!(output, "    -> {}", recommendation)?;
        }
        for note in &finding.notes {
            writeln!(output, "    note: {}", note)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::fixtures::sample_result;

    #[test]
    fn test_text_report_contents() {
        let output = TextReporter::format(&sample_result()).unwrap();
        assert!(output.contains("Status:    PASSED"));
        assert!(output.contains("Score:     62.5%"));
        assert!(output.contains("[x] CE Marking Declaration (high)"));
        assert!(output.contains("[ ] Notified Body Information (medium, optional)"));
        assert!(output.contains("-> Name the notified body"));
        assert!(output.contains("page 1: The CE marking"));
    }
}
