/*!
 * End-to-end tests: push an article, let provider workers translate it,
 * review it and read it back
 */

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use mtdock::app_config::Config;
use mtdock::dashboard::ReviewForm;
use mtdock::database::models::{ArticleStatus, ProviderId};
use mtdock::pipeline::{FinalParams, FirstParams, PushParams};
use mtdock::providers::mock::MockTranslator;
use mtdock::worker::{BatchReport, TranslationWorker};

use crate::common::{create_pipeline, create_redelivering_pipeline};

fn push(id: i64) -> PushParams {
    PushParams {
        id: Some(id.to_string()),
        to_lang: Some("fr".to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_workers_afterPush_shouldStoreOneTranslationPerProvider() -> Result<()> {
    let pipeline = create_pipeline(Config::default()).await?;
    pipeline.push_to_queue(push(1)).await?;

    for provider in ProviderId::ALL {
        let translator = MockTranslator::working(provider);
        let worker = TranslationWorker::new(Arc::new(translator.clone()), pipeline.clone());

        let report = worker.process_batch().await?;
        assert_eq!(report, BatchReport { received: 1, stored: 1, failed: 0 });
        assert_eq!(translator.request_count(), 2, "title and text for {}", provider);
    }

    for provider in ProviderId::ALL {
        let first = pipeline
            .get_first(FirstParams {
                id: Some("1".to_string()),
                providers_id: Some(provider.as_str().to_string()),
                to_lang: Some("fr".to_string()),
                ..Default::default()
            })
            .await?;
        assert_eq!(first.text.title.as_deref(), Some("[fr] Hello world"));
        assert_eq!(first.text.text, "[fr] A first article.");
        assert_eq!(first.providers_id, provider.label());
    }

    let status = pipeline.get_status().await?;
    assert_eq!(status.len(), 1);
    assert_eq!(status[0].status, Some(ArticleStatus::Pending));
    Ok(())
}

#[tokio::test]
async fn test_worker_withFailingProvider_shouldLeaveMessageForRedelivery() -> Result<()> {
    let pipeline = create_redelivering_pipeline().await?;
    pipeline.push_to_queue(push(2)).await?;

    let failing = TranslationWorker::new(Arc::new(MockTranslator::failing(ProviderId::Gcp)), pipeline.clone());
    let report = failing.process_batch().await?;
    assert_eq!(report, BatchReport { received: 1, stored: 0, failed: 1 });
    assert!(pipeline.get_status().await?.is_empty());

    let working = TranslationWorker::new(Arc::new(MockTranslator::working(ProviderId::Gcp)), pipeline.clone());
    let report = working.process_batch().await?;
    assert_eq!(report, BatchReport { received: 1, stored: 1, failed: 0 });

    assert_eq!(working.process_batch().await?, BatchReport::default());
    Ok(())
}

#[tokio::test]
async fn test_worker_withLongText_shouldChunkAndConcatenate() -> Result<()> {
    let pipeline = create_pipeline(Config::default()).await?;
    let long_text = "word ".repeat(300);
    let articles = serde_json::from_value(serde_json::json!([{"id": 9, "title": "Long", "text": long_text.clone()}]))?;
    pipeline.import_articles(articles).await?;
    pipeline.push_to_queue(push(9)).await?;

    let translator = MockTranslator::working(ProviderId::Azure).with_max_request_size(600);
    let worker = TranslationWorker::new(Arc::new(translator.clone()), pipeline.clone());
    assert_eq!(worker.process_batch().await?.stored, 1);

    // 1500 chars in 100 char chunks plus the title
    assert_eq!(translator.request_count(), 16);
    let first = pipeline
        .get_first(FirstParams { id: Some("9".to_string()), ..Default::default() })
        .await?;
    assert_eq!(first.text.text.matches("[fr] ").count(), 15);
    assert_eq!(first.text.text.replace("[fr] ", ""), long_text);
    Ok(())
}

#[tokio::test]
async fn test_worker_run_shouldStopOnShutdown() -> Result<()> {
    let mut config = Config::default();
    config.queue.poll_interval_ms = 10;
    let pipeline = create_pipeline(config).await?;
    pipeline.push_to_queue(push(3)).await?;

    let worker = TranslationWorker::new(Arc::new(MockTranslator::working(ProviderId::Aws)), pipeline.clone());
    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(async move { worker.run(rx).await });

    let mut stored = false;
    for _ in 0..100 {
        if !pipeline.get_status().await?.is_empty() {
            stored = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(stored, "worker never stored the translation");

    tx.send(true)?;
    tokio::time::timeout(Duration::from_secs(5), handle).await??;
    Ok(())
}

#[test]
fn test_fullReviewCycle_shouldFinishArticle() -> Result<()> {
    tokio_test::block_on(async {
        let pipeline = create_pipeline(Config::default()).await?;
        pipeline.push_to_queue(push(1)).await?;

        let worker = TranslationWorker::new(Arc::new(MockTranslator::working(ProviderId::Aws)), pipeline.clone());
        worker.process_batch().await?;

        let first = pipeline
            .get_first(FirstParams { id: Some("1".to_string()), ..Default::default() })
            .await?;
        let edited = format!(
            "{}\n{}",
            first.text.title.unwrap_or_default().trim_start_matches("[fr] "),
            first.text.text.trim_start_matches("[fr] ")
        );

        let response = pipeline
            .submit_review(ReviewForm {
                aws_rating: Some("4".to_string()),
                current_index: Some(first.id.to_string()),
                final_translation: Some(edited),
                translate_to: Some("fr".to_string()),
                ..Default::default()
            })
            .await?;
        assert!(response.success, "{}", response.message);

        let reviewed = pipeline
            .get_final(FinalParams { id: Some("1".to_string()), to_lang: Some("fr".to_string()), ..Default::default() })
            .await?;
        assert_eq!(reviewed.text.title.as_deref(), Some("Hello world"));
        assert_eq!(reviewed.text.text, "A first article.");
        assert_eq!(reviewed.ratings.aws, Some(4));

        let status = pipeline.get_status().await?;
        assert!(status.iter().all(|row| row.status == Some(ArticleStatus::Done)));
        Ok::<(), anyhow::Error>(())
    })
}
