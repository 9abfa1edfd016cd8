/*!
 * Tests for review form handling
 */

use mtdock::dashboard::{ReviewForm, ReviewResponse, extract_title_and_text, validate_rating};
use mtdock::database::models::ProviderRatings;
use mtdock::errors::HandlerError;

#[test]
fn test_reviewForm_withDashboardFieldNames_shouldParse() {
    let form: ReviewForm = serde_json::from_value(serde_json::json!({
        "AWSRating": "5",
        "GCPRating": "3",
        "AzureRating": "",
        "currentIndex": "42",
        "finalTranslation": "Titulo\nCuerpo",
        "CommentsContent": "  good  ",
        "translateTo": "es"
    }))
    .unwrap();

    assert_eq!(form.article_id().unwrap(), 42);
    assert_eq!(
        form.ratings().unwrap(),
        ProviderRatings { aws: Some(5), gcp: Some(3), azure: None }
    );
    assert_eq!(form.comments().as_deref(), Some("good"));
    assert_eq!(form.translate_to.as_deref(), Some("es"));
}

#[test]
fn test_extractTitleAndText_withTwoBodyLines_shouldJoinThem() {
    let (title, text) = extract_title_and_text("Title\nline one\nline two");
    assert_eq!(title, "Title");
    assert_eq!(text, "line one\nline two");
}

#[test]
fn test_validateRating_shouldAcceptOneToFive() {
    assert_eq!(validate_rating("aws_rating", None).unwrap(), None);
    assert_eq!(validate_rating("aws_rating", Some(1)).unwrap(), Some(1));
    assert_eq!(validate_rating("aws_rating", Some(5)).unwrap(), Some(5));
    assert!(validate_rating("aws_rating", Some(0)).is_err());
    assert!(validate_rating("aws_rating", Some(6)).is_err());
}

#[test]
fn test_reviewResponse_rejected_shouldEmbedError() {
    let response = ReviewResponse::rejected(&HandlerError::BadRequest("bad rating".to_string()));
    assert!(!response.success);
    assert_eq!(
        response.message,
        "Incorrect submission. Please check submission fields. Error: bad rating"
    );
    assert!(ReviewResponse::submitted().success);
}
