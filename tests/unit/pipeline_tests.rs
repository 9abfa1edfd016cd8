/*!
 * Tests for the pipeline handlers
 */

use anyhow::Result;
use mtdock::app_config::Config;
use mtdock::dashboard::ReviewForm;
use mtdock::database::models::{ArticleStatus, ProviderId, ProviderRatings};
use mtdock::errors::{ChecksumError, HandlerError};
use mtdock::pipeline::{
    DeleteParams, FinalParams, FirstParams, LookupParams, MSG_DELETED, MSG_FINAL_EXISTS, MSG_FIRST_EXISTS,
    MSG_INSERTED, MSG_NO_RESULT, MSG_NOT_TRANSLATED, PushParams, TranslationParams,
};
use mtdock::queue::QueueMessage;

use crate::common::{create_pipeline, final_submission, first_submission};

fn by_id(id: i64) -> Option<String> {
    Some(id.to_string())
}

// ===== Articles =====

#[tokio::test]
async fn test_getArticle_byIdOrTitle_shouldReturnArticle() -> Result<()> {
    let pipeline = create_pipeline(Config::default()).await?;

    let article = pipeline
        .get_article(LookupParams { id: by_id(2), title: None })
        .await?
        .expect("article 2 exists");
    assert_eq!(article.title, "Second");
    assert_eq!(article.text, "Another article.");

    let article = pipeline
        .get_article(LookupParams { id: None, title: Some("Third".to_string()) })
        .await?
        .expect("article titled Third exists");
    assert_eq!(article.id, 3);
    Ok(())
}

#[tokio::test]
async fn test_getArticle_withUnknownId_shouldBeEmpty() -> Result<()> {
    let pipeline = create_pipeline(Config::default()).await?;
    assert!(pipeline.get_article(LookupParams { id: by_id(99), title: None }).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_getArticle_withNonNumericId_shouldBeBadRequest() -> Result<()> {
    let pipeline = create_pipeline(Config::default()).await?;
    let result = pipeline
        .get_article(LookupParams { id: Some("abc".to_string()), title: None })
        .await;
    assert!(matches!(result, Err(HandlerError::BadRequest(_))));
    Ok(())
}

#[tokio::test]
async fn test_importArticles_shouldKeepExistingStatus() -> Result<()> {
    let pipeline = create_pipeline(Config::default()).await?;
    pipeline.put_first_translation(first_submission(1, ProviderId::Aws, "Hola")).await?;

    let articles = serde_json::from_str(
        r#"[{"id": 1, "title": "Hello again", "BodyText": "Edited."}, {"id": 8, "text": "New."}]"#,
    )?;
    assert_eq!(pipeline.import_articles(articles).await?, 2);

    let status = pipeline.get_status().await?;
    assert_eq!(status.len(), 1);
    assert_eq!(status[0].title, "Hello again");
    assert_eq!(status[0].status, Some(ArticleStatus::Pending));
    Ok(())
}

// ===== First-pass translations =====

#[tokio::test]
async fn test_putFirstTranslation_withValidChecksum_shouldStoreAndMarkPending() -> Result<()> {
    let pipeline = create_pipeline(Config::default()).await?;

    let response = pipeline.put_first_translation(first_submission(1, ProviderId::Gcp, "Hola mundo")).await?;
    assert_eq!(response.message, MSG_INSERTED);

    let status = pipeline.get_status().await?;
    assert_eq!(status.len(), 1);
    assert_eq!(status[0].id, 1);
    assert_eq!(status[0].status, Some(ArticleStatus::Pending));
    assert_eq!(status[0].lang_from.as_deref(), Some("en"));
    assert_eq!(status[0].lang_to.as_deref(), Some("es"));
    Ok(())
}

#[tokio::test]
async fn test_putFirstTranslation_twice_shouldReportExisting() -> Result<()> {
    let pipeline = create_pipeline(Config::default()).await?;
    let submission = first_submission(1, ProviderId::Aws, "Hola");

    pipeline.put_first_translation(submission.clone()).await?;
    let response = pipeline.put_first_translation(submission).await?;
    assert_eq!(response.message, MSG_FIRST_EXISTS);
    Ok(())
}

#[tokio::test]
async fn test_putFirstTranslation_withSameTextFromTwoProviders_shouldStoreBoth() -> Result<()> {
    let pipeline = create_pipeline(Config::default()).await?;

    let aws = pipeline.put_first_translation(first_submission(1, ProviderId::Aws, "Hola")).await?;
    let gcp = pipeline.put_first_translation(first_submission(1, ProviderId::Gcp, "Hola")).await?;
    assert_eq!(aws.message, MSG_INSERTED);
    assert_eq!(gcp.message, MSG_INSERTED);

    for provider in ["aws", "gcp"] {
        let first = pipeline
            .get_first(FirstParams {
                id: by_id(1),
                providers_id: Some(provider.to_string()),
                ..Default::default()
            })
            .await?;
        assert_eq!(first.text.text, "Hola");
        assert_eq!(first.providers_id, provider.to_uppercase());
    }
    Ok(())
}

#[tokio::test]
async fn test_putFirstTranslation_withTamperedText_shouldBeChecksumMismatch() -> Result<()> {
    let pipeline = create_pipeline(Config::default()).await?;
    let mut submission = first_submission(1, ProviderId::Aws, "Hola");
    submission.text = Some("Adios".to_string());

    let error = pipeline.put_first_translation(submission).await.unwrap_err();
    assert!(matches!(error, HandlerError::Checksum(ChecksumError::Mismatch { .. })));
    assert_eq!(error.status_code(), 500);
    assert_eq!(error.to_string(), "Data corruption. Checksums are not the same.");
    assert!(pipeline.get_status().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_putFirstTranslation_withUnknownArticleOrProvider_shouldBeBadRequest() -> Result<()> {
    let pipeline = create_pipeline(Config::default()).await?;

    let error = pipeline
        .put_first_translation(first_submission(42, ProviderId::Aws, "Hola"))
        .await
        .unwrap_err();
    assert_eq!(error.status_code(), 400);

    let mut submission = first_submission(1, ProviderId::Aws, "Hola");
    submission.providers_id = 9;
    let error = pipeline.put_first_translation(submission).await.unwrap_err();
    assert!(matches!(error, HandlerError::BadRequest(_)));
    Ok(())
}

#[tokio::test]
async fn test_putFirstTranslation_withoutLanguages_shouldUseConfiguredPair() -> Result<()> {
    let mut config = Config::default();
    config.languages.target_language = "de".to_string();
    let pipeline = create_pipeline(config).await?;

    let mut submission = first_submission(2, ProviderId::Azure, "Hallo");
    submission.lang_from = None;
    submission.lang_to = None;
    pipeline.put_first_translation(submission).await?;

    let first = pipeline
        .get_first(FirstParams { id: by_id(2), ..Default::default() })
        .await?;
    assert_eq!(first.lang_from, "en");
    assert_eq!(first.lang_to, "de");
    assert_eq!(first.providers_id, "AZURE");
    Ok(())
}

#[tokio::test]
async fn test_getFirst_withDirection_shouldNavigateBetweenArticles() -> Result<()> {
    let pipeline = create_pipeline(Config::default()).await?;
    for id in [1, 2, 3] {
        pipeline.put_first_translation(first_submission(id, ProviderId::Aws, "Texto")).await?;
    }

    let next = pipeline
        .get_first(FirstParams {
            id: by_id(1),
            direction: Some("next".to_string()),
            ..Default::default()
        })
        .await?;
    assert_eq!(next.id, 2);

    let prev = pipeline
        .get_first(FirstParams {
            id: by_id(3),
            direction: Some("prev".to_string()),
            ..Default::default()
        })
        .await?;
    assert_eq!(prev.id, 2);

    let past_end = pipeline
        .get_first(FirstParams {
            id: by_id(3),
            direction: Some("next".to_string()),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(past_end, HandlerError::NoResult(ref m) if m == MSG_NO_RESULT));
    assert_eq!(past_end.status_code(), 400);
    Ok(())
}

#[tokio::test]
async fn test_getFirst_byProviderAndTitle_shouldReturnThatProvider() -> Result<()> {
    let pipeline = create_pipeline(Config::default()).await?;
    pipeline.put_first_translation(first_submission(1, ProviderId::Aws, "de AWS")).await?;
    pipeline.put_first_translation(first_submission(1, ProviderId::Gcp, "de GCP")).await?;

    let first = pipeline
        .get_first(FirstParams {
            title: Some("Title 1".to_string()),
            providers_id: Some("gcp".to_string()),
            ..Default::default()
        })
        .await?;
    assert_eq!(first.text.text, "de GCP");
    assert_eq!(first.text.title.as_deref(), Some("Title 1"));
    assert_eq!(first.providers_id, "GCP");
    assert_eq!(first.status, Some(ArticleStatus::Pending));
    Ok(())
}

// ===== Final translations =====

#[tokio::test]
async fn test_putFinalTranslation_shouldStoreAndMarkDone() -> Result<()> {
    let pipeline = create_pipeline(Config::default()).await?;
    pipeline.put_first_translation(first_submission(1, ProviderId::Aws, "Hola")).await?;

    let response = pipeline.put_final_translation(final_submission(1, "Hola", "Mundo")).await?;
    assert_eq!(response.message, MSG_INSERTED);

    let again = pipeline.put_final_translation(final_submission(1, "Hola", "Mundo")).await?;
    assert_eq!(again.message, MSG_FINAL_EXISTS);

    let final_translation = pipeline
        .get_final(FinalParams { id: by_id(1), ..Default::default() })
        .await?;
    assert_eq!(final_translation.text.text, "Mundo");
    assert_eq!(
        final_translation.ratings,
        ProviderRatings { aws: Some(4), gcp: None, azure: Some(2) }
    );

    let status = pipeline.get_status().await?;
    assert!(status.iter().all(|row| row.status == Some(ArticleStatus::Done)));
    Ok(())
}

#[tokio::test]
async fn test_putFinalTranslation_withBadRatingOrChecksum_shouldFail() -> Result<()> {
    let pipeline = create_pipeline(Config::default()).await?;

    let mut submission = final_submission(1, "Hola", "Mundo");
    submission.gcp_rating = Some(9);
    let error = pipeline.put_final_translation(submission).await.unwrap_err();
    assert_eq!(error.status_code(), 400);

    let mut submission = final_submission(1, "Hola", "Mundo");
    submission.title = Some("Adios".to_string());
    let error = pipeline.put_final_translation(submission).await.unwrap_err();
    assert_eq!(error.status_code(), 500);
    Ok(())
}

#[tokio::test]
async fn test_getFinal_withNothingStored_shouldBeNoResult() -> Result<()> {
    let pipeline = create_pipeline(Config::default()).await?;
    let error = pipeline.get_final(FinalParams::default()).await.unwrap_err();
    assert!(matches!(error, HandlerError::NoResult(_)));
    Ok(())
}

#[tokio::test]
async fn test_submitReview_shouldStoreExtractedTranslation() -> Result<()> {
    let pipeline = create_pipeline(Config::default()).await?;
    pipeline.put_first_translation(first_submission(3, ProviderId::Gcp, "Texto")).await?;

    let form = ReviewForm {
        aws_rating: Some("5".to_string()),
        current_index: Some("3".to_string()),
        final_translation: Some("Tercero\n\nOtro articulo.\n".to_string()),
        comments: Some("fixed grammar".to_string()),
        ..Default::default()
    };
    let response = pipeline.submit_review(form).await?;
    assert!(response.success, "{}", response.message);
    assert_eq!(response.message, "Successfully submitted!");

    let stored = pipeline
        .get_final(FinalParams { id: by_id(3), ..Default::default() })
        .await?;
    assert_eq!(stored.text.title.as_deref(), Some("Tercero"));
    assert_eq!(stored.text.text, "Otro articulo.");
    assert_eq!(stored.comments.as_deref(), Some("fixed grammar"));
    assert_eq!(stored.ratings.aws, Some(5));
    Ok(())
}

#[tokio::test]
async fn test_submitReview_withInvalidFields_shouldRejectWithoutStoring() -> Result<()> {
    let pipeline = create_pipeline(Config::default()).await?;

    let form = ReviewForm {
        azure_rating: Some("seven".to_string()),
        current_index: Some("1".to_string()),
        final_translation: Some("Title\nText".to_string()),
        ..Default::default()
    };
    let response = pipeline.submit_review(form).await?;
    assert!(!response.success);
    assert!(response.message.starts_with("Incorrect submission. Please check submission fields. Error: "));

    let missing_article = ReviewForm {
        current_index: Some("77".to_string()),
        final_translation: Some("Title\nText".to_string()),
        ..Default::default()
    };
    assert!(!pipeline.submit_review(missing_article).await?.success);
    assert!(pipeline.get_final(FinalParams::default()).await.is_err());
    Ok(())
}

// ===== Stored translation lookup =====

#[tokio::test]
async fn test_getTranslation_fromFirstTable_shouldPickProviderFromColumns() -> Result<()> {
    let pipeline = create_pipeline(Config::default()).await?;
    let submission = first_submission(2, ProviderId::Azure, "Otra");
    let checksum = submission.checksum.clone();
    pipeline.put_first_translation(submission).await?;

    let stored = pipeline
        .get_translation(TranslationParams {
            table: Some("first_translation".to_string()),
            id: by_id(2),
            title: None,
            title_column: Some("azure_title".to_string()),
            text_column: Some("azure_text".to_string()),
            checksum_column: Some("azure_checksum".to_string()),
        })
        .await?
        .expect("azure translation stored");
    assert_eq!(stored.text, "Otra");
    assert_eq!(stored.checksum, checksum);

    let other_provider = pipeline
        .get_translation(TranslationParams {
            table: Some("first_translation".to_string()),
            id: by_id(2),
            title: None,
            title_column: Some("aws_title".to_string()),
            text_column: Some("aws_text".to_string()),
            checksum_column: Some("aws_checksum".to_string()),
        })
        .await?;
    assert!(other_provider.is_none());
    Ok(())
}

#[tokio::test]
async fn test_getTranslation_fromFinalTable_shouldReturnReviewedText() -> Result<()> {
    let pipeline = create_pipeline(Config::default()).await?;
    let submission = final_submission(1, "Hola", "Mundo");
    let checksum = submission.checksum.clone();
    pipeline.put_final_translation(submission).await?;

    let stored = pipeline
        .get_translation(TranslationParams {
            table: Some("final_translation".to_string()),
            title: Some("Hola".to_string()),
            ..Default::default()
        })
        .await?
        .expect("final translation stored");
    assert_eq!(stored.id, 1);
    assert_eq!(stored.title.as_deref(), Some("Hola"));
    assert_eq!(stored.checksum, checksum);
    Ok(())
}

#[tokio::test]
async fn test_getTranslation_withUnknownTable_shouldBeBadRequest() -> Result<()> {
    let pipeline = create_pipeline(Config::default()).await?;
    let result = pipeline
        .get_translation(TranslationParams {
            table: Some("articles; DROP TABLE articles".to_string()),
            id: by_id(1),
            ..Default::default()
        })
        .await;
    assert!(matches!(result, Err(HandlerError::BadRequest(_))));
    Ok(())
}

// ===== Removal =====

#[tokio::test]
async fn test_deleteTranslation_shouldClearStatusWhenNoneRemain() -> Result<()> {
    let pipeline = create_pipeline(Config::default()).await?;
    pipeline.put_first_translation(first_submission(1, ProviderId::Aws, "Hola")).await?;
    pipeline.put_first_translation(first_submission(1, ProviderId::Gcp, "Hola")).await?;

    let params = DeleteParams {
        id: by_id(1),
        lang_from: Some("en".to_string()),
        lang_to: Some("es".to_string()),
    };
    assert_eq!(pipeline.delete_translation(params.clone()).await?.message, MSG_DELETED);
    assert!(pipeline.get_status().await?.is_empty());

    let error = pipeline.delete_translation(params).await.unwrap_err();
    assert!(matches!(error, HandlerError::BadRequest(ref m) if m == MSG_NOT_TRANSLATED));
    Ok(())
}

#[tokio::test]
async fn test_deleteTranslation_withMissingParameter_shouldBeBadRequest() -> Result<()> {
    let pipeline = create_pipeline(Config::default()).await?;
    let result = pipeline
        .delete_translation(DeleteParams { id: by_id(1), lang_from: None, lang_to: Some("es".to_string()) })
        .await;
    assert!(matches!(result, Err(HandlerError::BadRequest(_))));
    Ok(())
}

#[tokio::test]
async fn test_removeFromQueue_shouldDropTranslations() -> Result<()> {
    let pipeline = create_pipeline(Config::default()).await?;
    pipeline.put_first_translation(first_submission(2, ProviderId::Aws, "Dos")).await?;

    pipeline.remove_from_queue(2).await?;
    assert!(pipeline.get_status().await?.is_empty());
    assert!(pipeline.get_first(FirstParams { id: by_id(2), ..Default::default() }).await.is_err());

    assert!(pipeline.remove_from_queue(404).await.is_err());
    Ok(())
}

// ===== Queueing =====

#[tokio::test]
async fn test_pushToQueue_shouldFanOutToEnabledProviders() -> Result<()> {
    let mut config = Config::default();
    config.providers.retain(|p| p.provider_type != ProviderId::Aws);
    let pipeline = create_pipeline(config).await?;

    let response = pipeline
        .push_to_queue(PushParams {
            id: by_id(1),
            to_lang: Some("fra".to_string()),
            ..Default::default()
        })
        .await?;
    assert_eq!(response.id, 1);
    assert_eq!(response.providers, vec![ProviderId::Gcp, ProviderId::Azure]);

    let queue = pipeline.queue();
    assert!(queue.receive("translate-aws", 10).await?.is_empty());

    let received = queue.receive("translate-gcp", 10).await?;
    assert_eq!(received.len(), 1);
    let message = QueueMessage::from_body(&received[0].body)?;
    assert_eq!(message.title.as_deref(), Some("Hello world"));
    assert_eq!(message.text, "A first article.");
    assert_eq!(message.from_lang, "en");
    assert_eq!(message.to_lang, "fr");
    Ok(())
}

#[tokio::test]
async fn test_pushToQueue_withUnknownArticle_shouldBeBadRequest() -> Result<()> {
    let pipeline = create_pipeline(Config::default()).await?;

    let missing = pipeline
        .push_to_queue(PushParams { title: Some("Nope".to_string()), ..Default::default() })
        .await;
    assert!(matches!(missing, Err(HandlerError::BadRequest(_))));

    let nothing = pipeline.push_to_queue(PushParams::default()).await;
    assert!(matches!(nothing, Err(HandlerError::BadRequest(_))));
    Ok(())
}

#[tokio::test]
async fn test_pushToQueue_withNoProviders_shouldBeBadRequest() -> Result<()> {
    let mut config = Config::default();
    for provider in &mut config.providers {
        provider.enabled = false;
    }
    let pipeline = create_pipeline(config).await?;

    let result = pipeline.push_to_queue(PushParams { id: by_id(1), ..Default::default() }).await;
    assert!(matches!(result, Err(HandlerError::BadRequest(_))));
    Ok(())
}
