/*!
 * Pipeline handlers.
 *
 * `PipelineService` implements every operation of the translation pipeline:
 * article lookup, queueing, storing first-pass and reviewed translations,
 * navigation for the review dashboard and cleanup. Each handler returns a
 * typed response or a `HandlerError`; the HTTP layer only renders them.
 */

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::Config;
use crate::checksum::{Checksum, ChecksumFields};
use crate::dashboard::{self, ReviewForm, ReviewResponse};
use crate::database::{DatabaseConnection, Repository};
use crate::database::models::{
    ArticleQuery, ArticleRecord, ArticleStatus, Direction, FinalTranslationQuery, FirstTranslationQuery, NewFinalTranslation,
    NewTranslation, ProviderId, ProviderRatings, StatusRow, TranslationContent,
};
use crate::errors::HandlerError;
use crate::language_utils::normalize_language_code;
use crate::queue::{self, MessageQueue, QueueMessage, SqliteQueue};

pub const MSG_INSERTED: &str = "Data inserted successfully";
pub const MSG_FIRST_EXISTS: &str = "Article translation already exists.";
pub const MSG_FINAL_EXISTS: &str = "Article already exists.";
pub const MSG_DELETED: &str = "Deleted translations";
pub const MSG_NO_RESULT: &str = "[ERROR] no result for given id or title";
pub const MSG_NOT_TRANSLATED: &str = "[ERROR]: Article not translated yet";

const TABLE_FINAL: &str = "final_translation";
const TABLE_FIRST: &str = "first_translation";

/// Column names accepted by `get_translation`
const VALID_COLUMNS: [&str; 12] = [
    "gcp_text",
    "gcp_title",
    "azure_text",
    "azure_title",
    "aws_title",
    "aws_text",
    "gcp_checksum",
    "aws_checksum",
    "azure_checksum",
    "title",
    "BodyText",
    "checksum",
];

// ===== Request types =====

/// Lookup by article id and/or title
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LookupParams {
    pub id: Option<String>,
    pub title: Option<String>,
}

/// `get_translation` query
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TranslationParams {
    pub table: Option<String>,
    pub id: Option<String>,
    pub title: Option<String>,
    pub title_column: Option<String>,
    pub text_column: Option<String>,
    pub checksum_column: Option<String>,
}

/// `get_first` query
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FirstParams {
    pub id: Option<String>,
    pub title: Option<String>,
    pub providers_id: Option<String>,
    pub direction: Option<String>,
    pub to_lang: Option<String>,
}

/// `get_final` query
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FinalParams {
    pub id: Option<String>,
    pub title: Option<String>,
    pub direction: Option<String>,
    pub to_lang: Option<String>,
}

/// `delete_translation` query
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeleteParams {
    pub id: Option<String>,
    pub lang_from: Option<String>,
    pub lang_to: Option<String>,
}

/// `push_to_queue` query or body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushParams {
    pub id: Option<String>,
    pub title: Option<String>,
    pub from_lang: Option<String>,
    pub to_lang: Option<String>,
}

/// First-pass translation posted by a provider worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirstSubmission {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    /// Hex SHA-256 over text and id
    pub checksum: String,
    pub providers_id: i64,
    #[serde(default)]
    pub lang_from: Option<String>,
    #[serde(default)]
    pub lang_to: Option<String>,
}

/// Article as found in an import file
#[derive(Debug, Clone, Deserialize)]
pub struct ImportArticle {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(alias = "BodyText", alias = "body_text")]
    pub text: String,
}

/// Reviewed translation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalSubmission {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    /// Hex SHA-256 over id, title and text
    pub checksum: String,
    #[serde(default)]
    pub lang_to: Option<String>,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default, deserialize_with = "dashboard::deserialize_rating")]
    pub aws_rating: Option<u8>,
    #[serde(default, deserialize_with = "dashboard::deserialize_rating")]
    pub gcp_rating: Option<u8>,
    #[serde(default, deserialize_with = "dashboard::deserialize_rating")]
    pub azure_rating: Option<u8>,
}

// ===== Response types =====

/// Plain status message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticleResponse {
    pub id: i64,
    pub title: String,
    pub text: String,
}

/// A stored translation with its hex checksum
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredTranslationResponse {
    pub id: i64,
    pub title: Option<String>,
    pub text: String,
    pub checksum: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FirstResponse {
    pub id: i64,
    pub status: Option<ArticleStatus>,
    pub text: TranslationContent,
    pub lang_to: String,
    pub lang_from: String,
    /// Provider label, e.g. `AWS`
    pub providers_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinalResponse {
    pub id: i64,
    pub text: TranslationContent,
    pub lang_to: String,
    pub ratings: ProviderRatings,
    pub comments: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushResponse {
    pub message: String,
    pub id: i64,
    pub providers: Vec<ProviderId>,
}

// ===== Parameter helpers =====

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_id(raw: Option<String>) -> Result<Option<i64>, HandlerError> {
    non_empty(raw)
        .map(|id| {
            id.parse::<i64>()
                .map_err(|_| HandlerError::BadRequest(format!("[ERROR]: Invalid id '{}'", id)))
        })
        .transpose()
}

fn parse_language(raw: Option<String>) -> Result<Option<String>, HandlerError> {
    non_empty(raw)
        .map(|code| normalize_language_code(&code).map_err(|e| HandlerError::BadRequest(format!("[ERROR]: {}", e))))
        .transpose()
}

fn log_missing(id: Option<i64>, title: Option<&str>) {
    if id.is_none() {
        info!("No id provided.");
    }
    if title.is_none() {
        info!("No title provided.");
    }
}

/// Provider named by a consistent set of `<provider>_<field>` columns
fn provider_from_columns(params: &TranslationParams) -> Result<ProviderId, HandlerError> {
    let columns = [
        ("title_column", params.title_column.as_deref(), "title"),
        ("text_column", params.text_column.as_deref(), "text"),
        ("checksum_column", params.checksum_column.as_deref(), "checksum"),
    ];

    let mut provider = None;
    for (name, value, field) in columns {
        let invalid = || HandlerError::BadRequest(format!("[ERROR]: Invalid column name for {}", name));

        let column = value.filter(|c| VALID_COLUMNS.contains(c)).ok_or_else(invalid)?;
        let (prefix, suffix) = column.split_once('_').ok_or_else(invalid)?;
        if suffix != field {
            return Err(invalid());
        }
        let column_provider: ProviderId = prefix.parse().map_err(|_| invalid())?;

        match provider {
            Some(p) if p != column_provider => {
                return Err(HandlerError::BadRequest(
                    "[ERROR]: Columns name different providers".to_string(),
                ));
            }
            _ => provider = Some(column_provider),
        }
    }

    provider.ok_or_else(|| HandlerError::BadRequest("[ERROR]: Missing column names".to_string()))
}

/// Every pipeline operation over one store, queue and configuration
#[derive(Clone)]
pub struct PipelineService {
    repo: Repository,
    queue: Arc<dyn MessageQueue>,
    config: Arc<Config>,
}

impl PipelineService {
    pub fn new(repo: Repository, queue: Arc<dyn MessageQueue>, config: Arc<Config>) -> Self {
        Self { repo, queue, config }
    }

    /// Open the configured database and build the service over it
    ///
    /// The queue shares the article database.
    pub fn open(config: Config) -> anyhow::Result<Self> {
        let db = DatabaseConnection::open_or_default(config.database.path.as_deref())?;
        let queue = SqliteQueue::new(db.clone(), Duration::from_secs(config.queue.visibility_timeout_secs));
        Ok(Self::new(Repository::new(db), Arc::new(queue), Arc::new(config)))
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    pub fn queue(&self) -> &Arc<dyn MessageQueue> {
        &self.queue
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn source_language(&self, raw: Option<String>) -> Result<String, HandlerError> {
        Ok(parse_language(raw)?.unwrap_or_else(|| self.config.languages.source_language.clone()))
    }

    fn target_language(&self, raw: Option<String>) -> Result<String, HandlerError> {
        Ok(parse_language(raw)?.unwrap_or_else(|| self.config.languages.target_language.clone()))
    }

    // ===== Article Operations =====

    /// Source article by id and/or title; `None` renders as `{}`
    pub async fn get_article(&self, params: LookupParams) -> Result<Option<ArticleResponse>, HandlerError> {
        let id = parse_id(params.id)?;
        let title = non_empty(params.title);
        log_missing(id, title.as_deref());

        let article = self.repo.find_article(ArticleQuery { id, title }).await?;
        Ok(article.map(|a| ArticleResponse {
            id: a.id,
            title: a.title,
            text: a.body_text,
        }))
    }

    /// Load source articles, keeping the status of existing ones
    pub async fn import_articles(&self, articles: Vec<ImportArticle>) -> Result<usize, HandlerError> {
        let records = articles
            .into_iter()
            .map(|a| ArticleRecord::new(a.id, a.title, a.text))
            .collect();
        let imported = self.repo.import_articles(records).await?;
        info!("Imported {} articles", imported);
        Ok(imported)
    }

    /// Articles with translations in progress or done
    pub async fn get_status(&self) -> Result<Vec<StatusRow>, HandlerError> {
        Ok(self.repo.list_status().await?)
    }

    /// Queue an article for translation by every enabled provider
    pub async fn push_to_queue(&self, params: PushParams) -> Result<PushResponse, HandlerError> {
        let id = parse_id(params.id)?;
        let title = non_empty(params.title);
        if id.is_none() && title.is_none() {
            return Err(HandlerError::BadRequest("[ERROR]: An id or a title is required".to_string()));
        }

        let from_lang = self.source_language(params.from_lang)?;
        let to_lang = self.target_language(params.to_lang)?;

        let article = self
            .repo
            .find_article(ArticleQuery { id, title })
            .await?
            .ok_or_else(|| HandlerError::BadRequest("[ERROR]: Article not found".to_string()))?;

        let providers = self.config.enabled_providers();
        if providers.is_empty() {
            return Err(HandlerError::BadRequest("[ERROR]: No providers are enabled".to_string()));
        }

        let message = QueueMessage {
            id: article.id,
            title: Some(article.title).filter(|t| !t.is_empty()),
            text: article.body_text,
            from_lang,
            to_lang,
        };
        let sent = queue::fan_out(self.queue.as_ref(), &message, &providers).await?;

        let names: Vec<&str> = sent.iter().map(|p| p.as_str()).collect();
        info!(
            "Queued article {} ({} -> {}) for {}",
            message.id,
            message.from_lang,
            message.to_lang,
            names.join(", ")
        );
        Ok(PushResponse {
            message: format!("Queued article {} for {}", message.id, names.join(", ")),
            id: message.id,
            providers: sent,
        })
    }

    // ===== First-pass Translations =====

    /// Store a provider's translation after checking its checksum
    pub async fn put_first_translation(&self, submission: FirstSubmission) -> Result<MessageResponse, HandlerError> {
        let checksum = Checksum::verify(
            &ChecksumFields::FirstPass {
                text: submission.text.as_deref(),
                id: submission.id,
            },
            &submission.checksum,
        )
        .inspect_err(|e| warn!("Rejected first-pass translation of article {}: {:?}", submission.id, e))?;

        let text = submission
            .text
            .ok_or_else(|| HandlerError::BadRequest("[ERROR]: Missing text".to_string()))?;
        let provider = ProviderId::from_id(submission.providers_id).ok_or_else(|| {
            HandlerError::BadRequest(format!("[ERROR]: Unknown providers_id {}", submission.providers_id))
        })?;
        let lang_from = self.source_language(submission.lang_from)?;
        let lang_to = self.target_language(submission.lang_to)?;

        if self
            .repo
            .translation_exists(submission.id, provider, &lang_to, checksum)
            .await?
        {
            return Ok(MessageResponse::new(MSG_FIRST_EXISTS));
        }
        self.require_article(submission.id).await?;

        self.repo
            .store_first_translation(NewTranslation {
                text_id: submission.id,
                provider,
                content: TranslationContent {
                    title: non_empty(submission.title),
                    text,
                },
                lang_from,
                lang_to,
                checksum,
            })
            .await?;

        info!("Stored {} translation of article {}", provider, submission.id);
        Ok(MessageResponse::new(MSG_INSERTED))
    }

    /// One first-pass translation, with next/prev navigation
    pub async fn get_first(&self, params: FirstParams) -> Result<FirstResponse, HandlerError> {
        let id = parse_id(params.id)?;
        let title = non_empty(params.title);
        log_missing(id, title.as_deref());

        let provider = non_empty(params.providers_id)
            .map(|p| {
                p.parse::<ProviderId>()
                    .map_err(|_| HandlerError::BadRequest(format!("[ERROR]: Unknown providers_id {}", p)))
            })
            .transpose()?;

        let record = self
            .repo
            .find_first_translation(FirstTranslationQuery {
                id,
                title,
                provider,
                direction: Direction::from_param(params.direction.as_deref()),
                lang_to: parse_language(params.to_lang)?,
            })
            .await?
            .ok_or_else(|| HandlerError::NoResult(MSG_NO_RESULT.to_string()))?;

        Ok(FirstResponse {
            id: record.text_id,
            status: record.status,
            text: record.content,
            lang_to: record.lang_to,
            lang_from: record.lang_from,
            providers_id: record.provider.label().to_string(),
        })
    }

    // ===== Final Translations =====

    /// Store a reviewed translation after checking its checksum
    pub async fn put_final_translation(&self, submission: FinalSubmission) -> Result<MessageResponse, HandlerError> {
        let checksum = Checksum::verify(
            &ChecksumFields::Final {
                id: submission.id,
                title: submission.title.as_deref(),
                text: submission.text.as_deref(),
            },
            &submission.checksum,
        )
        .inspect_err(|e| warn!("Rejected final translation of article {}: {:?}", submission.id, e))?;

        let text = submission
            .text
            .ok_or_else(|| HandlerError::BadRequest("[ERROR]: Missing text".to_string()))?;
        let ratings = ProviderRatings {
            aws: dashboard::validate_rating("aws_rating", submission.aws_rating)?,
            gcp: dashboard::validate_rating("gcp_rating", submission.gcp_rating)?,
            azure: dashboard::validate_rating("azure_rating", submission.azure_rating)?,
        };
        let lang_to = self.target_language(submission.lang_to)?;

        if self.repo.final_exists(submission.id, checksum).await? {
            return Ok(MessageResponse::new(MSG_FINAL_EXISTS));
        }
        self.require_article(submission.id).await?;

        self.repo
            .store_final_translation(NewFinalTranslation {
                text_id: submission.id,
                lang_to,
                content: TranslationContent {
                    title: submission.title,
                    text,
                },
                ratings,
                comments: non_empty(submission.comments),
                checksum,
            })
            .await?;

        info!("Stored reviewed translation of article {}", submission.id);
        Ok(MessageResponse::new(MSG_INSERTED))
    }

    /// One reviewed translation, with next/prev navigation
    pub async fn get_final(&self, params: FinalParams) -> Result<FinalResponse, HandlerError> {
        let id = parse_id(params.id)?;
        let title = non_empty(params.title);
        log_missing(id, title.as_deref());

        let record = self
            .repo
            .find_final_translation(FinalTranslationQuery {
                id,
                title,
                direction: Direction::from_param(params.direction.as_deref()),
                lang_to: parse_language(params.to_lang)?,
            })
            .await?
            .ok_or_else(|| HandlerError::NoResult(MSG_NO_RESULT.to_string()))?;

        Ok(FinalResponse {
            id: record.text_id,
            text: record.content,
            lang_to: record.lang_to,
            ratings: record.ratings,
            comments: record.comments,
        })
    }

    /// Submit the dashboard review form
    ///
    /// Rejections the reviewer can fix come back as an unsuccessful
    /// response; storage failures are errors.
    pub async fn submit_review(&self, form: ReviewForm) -> Result<ReviewResponse, HandlerError> {
        let submission = match Self::review_submission(&form) {
            Ok(submission) => submission,
            Err(e) => return Ok(ReviewResponse::rejected(&e)),
        };

        match self.put_final_translation(submission).await {
            Ok(_) => Ok(ReviewResponse::submitted()),
            Err(e) if e.status_code() == 400 => Ok(ReviewResponse::rejected(&e)),
            Err(e) => Err(e),
        }
    }

    fn review_submission(form: &ReviewForm) -> Result<FinalSubmission, HandlerError> {
        let id = form.article_id()?;
        let ratings = form.ratings()?;
        let (title, text) = dashboard::extract_title_and_text(form.final_translation.as_deref().unwrap_or_default());
        let checksum = Checksum::compute(&ChecksumFields::Final {
            id,
            title: Some(&title),
            text: Some(&text),
        });

        Ok(FinalSubmission {
            id,
            title: Some(title),
            text: Some(text),
            checksum: checksum.to_hex(),
            lang_to: form.translate_to.clone(),
            comments: form.comments(),
            aws_rating: ratings.aws,
            gcp_rating: ratings.gcp,
            azure_rating: ratings.azure,
        })
    }

    // ===== Stored Translation Lookup =====

    /// A stored translation selected by table and column names
    pub async fn get_translation(
        &self,
        params: TranslationParams,
    ) -> Result<Option<StoredTranslationResponse>, HandlerError> {
        let id = parse_id(params.id.clone())?;
        let title = non_empty(params.title.clone());
        log_missing(id, title.as_deref());

        match params.table.as_deref() {
            Some(TABLE_FINAL) => {
                let record = self
                    .repo
                    .find_final_translation(FinalTranslationQuery {
                        id,
                        title,
                        direction: Direction::Exact,
                        lang_to: None,
                    })
                    .await?;
                Ok(record.map(|r| StoredTranslationResponse {
                    id: r.text_id,
                    title: r.content.title,
                    text: r.content.text,
                    checksum: r.checksum.to_hex(),
                }))
            }
            Some(TABLE_FIRST) => {
                let provider = provider_from_columns(&params)?;
                let record = self.repo.find_provider_translation(id, title, provider).await?;
                Ok(record.map(|r| StoredTranslationResponse {
                    id: r.text_id,
                    title: r.content.title,
                    text: r.content.text,
                    checksum: r.checksum.to_hex(),
                }))
            }
            _ => Err(HandlerError::BadRequest("[ERROR]: Invalid table name".to_string())),
        }
    }

    // ===== Removal =====

    /// Delete an article's translations for one language pair
    pub async fn delete_translation(&self, params: DeleteParams) -> Result<MessageResponse, HandlerError> {
        let id = parse_id(params.id)?;
        let lang_from = parse_language(params.lang_from)?;
        let lang_to = parse_language(params.lang_to)?;

        let (Some(id), Some(lang_from), Some(lang_to)) = (id, lang_from, lang_to) else {
            return Err(HandlerError::BadRequest(
                "[ERROR]: id, lang_from and lang_to are required".to_string(),
            ));
        };

        match self.repo.delete_translations(id, &lang_from, &lang_to).await? {
            None => Err(HandlerError::BadRequest(MSG_NOT_TRANSLATED.to_string())),
            Some(remaining) => {
                info!(
                    "Deleted {} -> {} translations of article {}, {} remaining",
                    lang_from, lang_to, id, remaining
                );
                Ok(MessageResponse::new(MSG_DELETED))
            }
        }
    }

    /// Drop every translation of an article and return it to the untouched state
    pub async fn remove_from_queue(&self, id: i64) -> Result<MessageResponse, HandlerError> {
        self.require_article(id).await?;
        let removed = self.repo.remove_article_translations(id).await?;
        info!("Removed article {} from the pipeline ({} translations)", id, removed);
        Ok(MessageResponse::new(format!("Removed article {} from queue", id)))
    }

    async fn require_article(&self, id: i64) -> Result<(), HandlerError> {
        self.repo
            .find_article(ArticleQuery { id: Some(id), title: None })
            .await?
            .map(|_| ())
            .ok_or_else(|| HandlerError::BadRequest(format!("[ERROR]: Unknown article id {}", id)))
    }
}
