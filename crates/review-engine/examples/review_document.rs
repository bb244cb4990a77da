//! Review one document from the command line
//!
//! ```text
//! cargo run -p review-engine --example review_document -- declaration.pdf [engine.toml]
//! ```

use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context};
use document_analyzer::UploadedFile;
use review_engine::reporter::{OutputFormat, Reporter};
use review_engine::{EngineConfig, ReviewEngine, ReviewOutcome, ReviewRequest};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();

    let args: Vec<String> = env::args().collect();
    let Some(document_path) = args.get(1).map(PathBuf::from) else {
        bail!("usage: review_document <document> [engine.toml]");
    };
    let config = match args.get(2) {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };

    let engine = ReviewEngine::from_config(&config)?;
    println!("Templates:");
    for template in engine.list_templates() {
        println!("  {} - {} v{}", template.id, template.name, template.version);
    }

    let file = UploadedFile::from_path(&document_path)
        .with_context(|| format!("Failed to read {}", document_path.display()))?;
    let request_id = engine
        .submit(ReviewRequest::new(file, compliance_engine::EU_DOC_TEMPLATE_ID))
        .await?;

    match engine.wait(&request_id).await? {
        ReviewOutcome::Completed { result } => {
            print!("{}", Reporter::new(OutputFormat::Text).format_result(&result)?);
        }
        ReviewOutcome::Failed { failure } => {
            println!("Review failed: {}", failure.message);
            println!("Suggestion: {}", failure.suggestion);
        }
        ReviewOutcome::Abandoned => println!("Review abandoned"),
    }

    engine.shutdown().await;
    Ok(())
}
