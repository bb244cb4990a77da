//! Self-contained HTML reporter

use std::fmt::Write;

use anyhow::Result;
use shared_types::{ComplianceStatus, ReviewResult};

pub struct HtmlReporter;

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn status_color(status: ComplianceStatus) -> &'static str {
    match status {
        ComplianceStatus::Passed => "#1e7e34",
        ComplianceStatus::Warning => "#b36b00",
        ComplianceStatus::Failed => "#b00020",
    }
}

impl HtmlReporter {
    pub fn format(result: &ReviewResult) -> Result<String> {
        let mut html = String::new();
        writeln!(html, "<!DOCTYPE html>")?;
        writeln!(html, "<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">")?;
        writeln!(html, "<title>Review: {}</title>", escape(&result.filename))?;
        writeln!(
            html,
            "<style>body{{font-family:sans-serif;margin:2em}}table{{border-collapse:collapse}}\
             td,th{{border:1px solid #ccc;padding:4px 8px;text-align:left}}.miss{{background:#fdecea}}</style>"
        )?;
        writeln!(html, "</head>\n<body>")?;
        writeln!(html, "<h1>{}</h1>", escape(&result.template_name))?;
        writeln!(
            html,
            "<p>Document <strong>{}</strong>, template {} v{}</p>",
            escape(&result.filename),
            escape(&result.template_id),
            escape(&result.template_version)
        )?;
        writeln!(
            html,
            "<p class=\"status\" style=\"color:{}\">Status: <strong>{}</strong>, score {:.1}%</p>",
            status_color(result.status),
            result.status,
            result.compliance_score
        )?;

        writeln!(html, "<table>")?;
        writeln!(
            html,
            "<tr><th>Requirement</th><th>Severity</th><th>Matched</th><th>Confidence</th><th>Detail</th></tr>"
        )?;
        for finding in &result.findings {
            let detail = if finding.matched {
                finding
                    .location
                    .as_ref()
                    .map(|l| l.snippet.as_str())
                    .unwrap_or_default()
            } else {
                finding.recommendation.as_deref().unwrap_or_default()
            };
            writeln!(
                html,
                "<tr{}><td>{}</td><td>{}</td><td>{}</td><td>{:.2}</td><td>{}</td></tr>",
                if finding.matched { "" } else { " class=\"miss\"" },
                escape(&finding.title),
                finding.severity,
                if finding.matched { "yes" } else { "no" },
                finding.confidence,
                escape(detail)
            )?;
        }
        writeln!(html, "</table>")?;

        if !result.recommendations.is_empty() {
            writeln!(html, "<h2>Recommendations</h2>\n<ul>")?;
            for recommendation in &result.recommendations {
                writeln!(html, "<li>{}</li>", escape(recommendation))?;
            }
            writeln!(html, "</ul>")?;
        }
        writeln!(
            html,
            "<footer>Generated {}</footer>\n</body>\n</html>",
            result.generated_at.to_rfc3339()
        )?;
        Ok(html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::fixtures::sample_result;

    #[test]
    fn test_escape() {
        assert_eq!(escape("<a href=\"x\">&</a>"), "&lt;a href=&quot;x&quot;&gt;&amp;&lt;/a&gt;");
    }

    #[test]
    fn test_html_escapes_document_text() {
        let output = HtmlReporter::format(&sample_result()).unwrap();
        assert!(output.contains("The CE marking &lt;affixed&gt; &amp; visible"));
        assert!(!output.contains("<affixed>"));
        assert!(output.contains("class=\"miss\""));
        assert!(output.ends_with("</html>\n"));
    }
}
