//! JSON reporter

use anyhow::Result;
use shared_types::ReviewResult;

pub struct JsonReporter;

impl JsonReporter {
    pub fn format(result: &ReviewResult, pretty: bool) -> Result<String> {
        let output = if pretty {
            serde_json::to_string_pretty(result)?
        } else {
            serde_json::to_string(result)?
        };
        Ok(output)
    }

    pub fn parse(json: &str) -> Result<ReviewResult> {
        Ok(serde_json::from_str(json)?)
    }
}
