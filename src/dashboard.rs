/*!
 * Reviewer dashboard form handling.
 *
 * The review form posts the edited translation as a single textarea whose
 * first line is the title, together with one rating per provider and a
 * free-text comment.
 */

use serde::{Deserialize, Deserializer, Serialize};

use crate::database::models::ProviderRatings;
use crate::errors::HandlerError;

/// Split a reviewed textarea into title and body
///
/// The input is trimmed, the first line becomes the title and the remaining
/// non-empty lines are joined with `\n`.
pub fn extract_title_and_text(raw: &str) -> (String, String) {
    let mut lines = raw.trim().split('\n');
    let title = lines.next().unwrap_or_default().to_string();
    let text = lines.filter(|line| !line.is_empty()).collect::<Vec<_>>().join("\n");
    (title, text)
}

/// Review form as posted by the dashboard
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewForm {
    #[serde(rename = "AWSRating", default)]
    pub aws_rating: Option<String>,

    #[serde(rename = "GCPRating", default)]
    pub gcp_rating: Option<String>,

    #[serde(rename = "AzureRating", default)]
    pub azure_rating: Option<String>,

    /// Article id being reviewed
    #[serde(rename = "currentIndex", default)]
    pub current_index: Option<String>,

    /// Edited translation, title on the first line
    #[serde(rename = "finalTranslation", default)]
    pub final_translation: Option<String>,

    #[serde(rename = "CommentsContent", default)]
    pub comments: Option<String>,

    /// Target language of the reviewed translation
    #[serde(rename = "translateTo", default)]
    pub translate_to: Option<String>,
}

impl ReviewForm {
    /// Article id from `currentIndex`
    pub fn article_id(&self) -> Result<i64, HandlerError> {
        let raw = self.current_index.as_deref().map(str::trim).unwrap_or_default();
        raw.parse()
            .map_err(|_| HandlerError::BadRequest(format!("Invalid article index: '{}'", raw)))
    }

    /// Ratings, blank fields meaning "not rated"
    pub fn ratings(&self) -> Result<ProviderRatings, HandlerError> {
        Ok(ProviderRatings {
            aws: parse_rating("AWSRating", self.aws_rating.as_deref())?,
            gcp: parse_rating("GCPRating", self.gcp_rating.as_deref())?,
            azure: parse_rating("AzureRating", self.azure_rating.as_deref())?,
        })
    }

    /// Comment, blank meaning none
    pub fn comments(&self) -> Option<String> {
        self.comments
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
    }
}

/// Check a rating is within 1..=5
pub fn validate_rating(field: &str, rating: Option<u8>) -> Result<Option<u8>, HandlerError> {
    match rating {
        Some(r) if !(1..=5).contains(&r) => Err(HandlerError::BadRequest(format!(
            "{} must be between 1 and 5, got {}",
            field, r
        ))),
        other => Ok(other),
    }
}

fn parse_rating(field: &str, raw: Option<&str>) -> Result<Option<u8>, HandlerError> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(None);
    };
    let rating = raw
        .parse::<u8>()
        .map_err(|_| HandlerError::BadRequest(format!("{} must be a number, got '{}'", field, raw)))?;
    validate_rating(field, Some(rating))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RatingValue {
    Number(u64),
    Text(String),
}

/// Serde helper for ratings sent either as numbers or as form strings (`"4"`, `""`)
pub fn deserialize_rating<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<RatingValue>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RatingValue::Text(raw)) => parse_rating("rating", Some(&raw)).map_err(serde::de::Error::custom),
        Some(RatingValue::Number(n)) => u8::try_from(n)
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("rating must be between 1 and 5, got {}", n))),
    }
}

/// Flash-style outcome shown to the reviewer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewResponse {
    pub success: bool,
    pub message: String,
}

impl ReviewResponse {
    pub fn submitted() -> Self {
        Self {
            success: true,
            message: "Successfully submitted!".to_string(),
        }
    }

    pub fn rejected(error: &HandlerError) -> Self {
        Self {
            success: false,
            message: format!("Incorrect submission. Please check submission fields. Error: {}", error),
        }
    }
}
