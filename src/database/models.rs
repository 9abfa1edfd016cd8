/*!
 * Database entity models and DTOs.
 *
 * These structures map directly to database tables and provide
 * type-safe access to persisted data.
 */

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::checksum::Checksum;

/// Article pipeline status. A NULL column means the article is untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleStatus {
    /// At least one first-pass translation exists
    Pending,
    /// A reviewed translation has been stored
    Done,
}

impl ArticleStatus {
    /// Column value for this status
    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleStatus::Pending => "pending",
            ArticleStatus::Done => "done",
        }
    }
}

impl fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ArticleStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ArticleStatus::Pending),
            "done" => Ok(ArticleStatus::Done),
            _ => Err(anyhow::anyhow!("Invalid article status: {}", s)),
        }
    }
}

/// Machine translation provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    /// Amazon Translate
    Aws,
    /// Google Cloud Translation
    Gcp,
    /// Azure Translator
    Azure,
}

impl ProviderId {
    /// Every provider, in id order
    pub const ALL: [ProviderId; 3] = [ProviderId::Aws, ProviderId::Gcp, ProviderId::Azure];

    /// Numeric id stored in `translations.providers_id`
    pub fn id(&self) -> i64 {
        match self {
            ProviderId::Aws => 1,
            ProviderId::Gcp => 2,
            ProviderId::Azure => 3,
        }
    }

    /// Provider for a stored numeric id
    pub fn from_id(id: i64) -> Option<Self> {
        match id {
            1 => Some(ProviderId::Aws),
            2 => Some(ProviderId::Gcp),
            3 => Some(ProviderId::Azure),
            _ => None,
        }
    }

    /// Lowercase identifier, also the provider's queue name
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Aws => "aws",
            ProviderId::Gcp => "gcp",
            ProviderId::Azure => "azure",
        }
    }

    /// Uppercase label shown on the dashboard
    pub fn label(&self) -> &'static str {
        match self {
            ProviderId::Aws => "AWS",
            ProviderId::Gcp => "GCP",
            ProviderId::Azure => "AZURE",
        }
    }

    /// Per-request size limit of the provider API
    pub fn max_request_size(&self) -> usize {
        match self {
            ProviderId::Aws => 10_000,
            ProviderId::Gcp => 5_000,
            ProviderId::Azure => 50_000,
        }
    }

    /// Queue the provider's worker consumes
    pub fn queue_name(&self) -> String {
        format!("translate-{}", self.as_str())
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(id) = s.parse::<i64>() {
            return ProviderId::from_id(id).ok_or_else(|| anyhow::anyhow!("Invalid provider id: {}", id));
        }
        match s.to_lowercase().as_str() {
            "aws" => Ok(ProviderId::Aws),
            "gcp" | "google" => Ok(ProviderId::Gcp),
            "azure" => Ok(ProviderId::Azure),
            _ => Err(anyhow::anyhow!("Invalid provider: {}", s)),
        }
    }
}

/// Navigation relative to an article id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// The given id itself
    #[default]
    Exact,
    /// The nearest larger id
    Next,
    /// The nearest smaller id
    Prev,
}

impl Direction {
    /// Parse the `direction` query parameter; anything unrecognised means exact
    pub fn from_param(param: Option<&str>) -> Self {
        match param.map(|p| p.trim().to_lowercase()).as_deref() {
            Some("next") => Direction::Next,
            Some("prev") => Direction::Prev,
            _ => Direction::Exact,
        }
    }

    /// SQL comparison operator applied to the id column
    pub fn comparison(&self) -> &'static str {
        match self {
            Direction::Exact => "=",
            Direction::Next => ">",
            Direction::Prev => "<",
        }
    }

    /// SQL sort order so that the closest neighbour comes first
    pub fn order(&self) -> &'static str {
        match self {
            Direction::Prev => "DESC",
            _ => "ASC",
        }
    }
}

/// Source article
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    /// Article id
    pub id: i64,
    /// Headline
    pub title: String,
    /// Body text
    pub body_text: String,
    /// Pipeline status, `None` when untouched
    pub status: Option<ArticleStatus>,
}

impl ArticleRecord {
    /// Create an untouched article
    pub fn new(id: i64, title: impl Into<String>, body_text: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            body_text: body_text.into(),
            status: None,
        }
    }
}

/// Translated title and text as stored in the JSON content columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationContent {
    /// Translated title, when the source had one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Translated body text
    pub text: String,
}

/// New first-pass translation ready to be stored
#[derive(Debug, Clone)]
pub struct NewTranslation {
    /// Article id
    pub text_id: i64,
    /// Provider that produced it
    pub provider: ProviderId,
    /// Translated content
    pub content: TranslationContent,
    /// Source language
    pub lang_from: String,
    /// Target language
    pub lang_to: String,
    /// Verified first-pass checksum
    pub checksum: Checksum,
}

/// Stored first-pass translation joined with its article status
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationRecord {
    /// Article id
    pub text_id: i64,
    /// Article status at read time
    pub status: Option<ArticleStatus>,
    /// Provider that produced it
    pub provider: ProviderId,
    /// Translated content
    pub content: TranslationContent,
    /// Source language
    pub lang_from: String,
    /// Target language
    pub lang_to: String,
    /// Stored checksum
    pub checksum: Checksum,
    /// Creation timestamp (RFC 3339)
    pub created_at: String,
}

/// Reviewer ratings, one per provider, each 1..=5
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderRatings {
    /// AWS rating
    pub aws: Option<u8>,
    /// GCP rating
    pub gcp: Option<u8>,
    /// Azure rating
    pub azure: Option<u8>,
}

/// New reviewed translation ready to be stored
#[derive(Debug, Clone)]
pub struct NewFinalTranslation {
    /// Article id
    pub text_id: i64,
    /// Target language
    pub lang_to: String,
    /// Edited content
    pub content: TranslationContent,
    /// Reviewer ratings
    pub ratings: ProviderRatings,
    /// Free-text reviewer comment
    pub comments: Option<String>,
    /// Verified final checksum
    pub checksum: Checksum,
}

/// Stored reviewed translation
#[derive(Debug, Clone, PartialEq)]
pub struct FinalTranslationRecord {
    /// Article id
    pub text_id: i64,
    /// Target language
    pub lang_to: String,
    /// Edited content
    pub content: TranslationContent,
    /// Reviewer ratings
    pub ratings: ProviderRatings,
    /// Free-text reviewer comment
    pub comments: Option<String>,
    /// Stored checksum
    pub checksum: Checksum,
    /// Creation timestamp (RFC 3339)
    pub created_at: String,
}

/// One row of the dashboard status table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRow {
    /// Article id
    pub id: i64,
    /// Article status
    pub status: Option<ArticleStatus>,
    /// Article title
    pub title: String,
    /// Target language of a translation, if any
    pub lang_to: Option<String>,
    /// Source language of a translation, if any
    pub lang_from: Option<String>,
}

/// Lookup of an article by id and/or title
#[derive(Debug, Clone, Default)]
pub struct ArticleQuery {
    /// Article id
    pub id: Option<i64>,
    /// Exact title
    pub title: Option<String>,
}

/// Lookup of a first-pass translation
#[derive(Debug, Clone, Default)]
pub struct FirstTranslationQuery {
    /// Article id the direction is relative to
    pub id: Option<i64>,
    /// Exact translated title
    pub title: Option<String>,
    /// Restrict to one provider
    pub provider: Option<ProviderId>,
    /// Navigation relative to `id`
    pub direction: Direction,
    /// Restrict to one target language
    pub lang_to: Option<String>,
}

/// Lookup of a reviewed translation
#[derive(Debug, Clone, Default)]
pub struct FinalTranslationQuery {
    /// Article id the direction is relative to
    pub id: Option<i64>,
    /// Exact edited title
    pub title: Option<String>,
    /// Navigation relative to `id`
    pub direction: Direction,
    /// Restrict to one target language
    pub lang_to: Option<String>,
}
