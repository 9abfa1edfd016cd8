/*!
 * Common test utilities for the mtdock test suite
 */

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use mtdock::app_config::Config;
use mtdock::checksum::{Checksum, ChecksumFields};
use mtdock::database::Repository;
use mtdock::database::models::{ArticleRecord, ProviderId};
use mtdock::pipeline::{FinalSubmission, FirstSubmission, PipelineService};
use mtdock::queue::SqliteQueue;

/// Initialise test logging once
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Articles every test pipeline starts with
pub fn sample_articles() -> Vec<ArticleRecord> {
    vec![
        ArticleRecord::new(1, "Hello world", "A first article."),
        ArticleRecord::new(2, "Second", "Another article."),
        ArticleRecord::new(3, "Third", "Yet another article."),
    ]
}

/// Pipeline over an in-memory database seeded with `sample_articles()`
pub async fn create_pipeline(config: Config) -> Result<PipelineService> {
    init_logging();

    let repo = Repository::new_in_memory()?;
    repo.import_articles(sample_articles()).await?;
    let queue = SqliteQueue::new(
        repo.connection().clone(),
        Duration::from_secs(config.queue.visibility_timeout_secs),
    );
    Ok(PipelineService::new(repo, Arc::new(queue), Arc::new(config)))
}

/// Same as `create_pipeline` with a visibility timeout of zero, so unacknowledged messages come straight back
pub async fn create_redelivering_pipeline() -> Result<PipelineService> {
    let mut config = Config::default();
    config.queue.visibility_timeout_secs = 0;
    create_pipeline(config).await
}

/// A valid first-pass submission
pub fn first_submission(id: i64, provider: ProviderId, text: &str) -> FirstSubmission {
    FirstSubmission {
        id,
        title: Some(format!("Title {}", id)),
        text: Some(text.to_string()),
        checksum: Checksum::compute(&ChecksumFields::FirstPass { text: Some(text), id }).to_hex(),
        providers_id: provider.id(),
        lang_from: Some("en".to_string()),
        lang_to: Some("es".to_string()),
    }
}

/// A valid reviewed submission
pub fn final_submission(id: i64, title: &str, text: &str) -> FinalSubmission {
    FinalSubmission {
        id,
        title: Some(title.to_string()),
        text: Some(text.to_string()),
        checksum: Checksum::compute(&ChecksumFields::Final {
            id,
            title: Some(title),
            text: Some(text),
        })
        .to_hex(),
        lang_to: Some("es".to_string()),
        comments: None,
        aws_rating: Some(4),
        gcp_rating: None,
        azure_rating: Some(2),
    }
}
