/*!
 * Repository layer for database operations.
 *
 * This module provides the high-level API the pipeline handlers use,
 * keeping SQL out of the handler code.
 */

use anyhow::{Result, anyhow};
use log::debug;
use rusqlite::types::{Type, Value};
use rusqlite::{OptionalExtension, Row, params, params_from_iter};

use super::connection::DatabaseConnection;
use super::models::{
    ArticleQuery, ArticleRecord, ArticleStatus, Direction, FinalTranslationQuery, FinalTranslationRecord,
    FirstTranslationQuery, NewFinalTranslation, NewTranslation, ProviderId, ProviderRatings, StatusRow,
    TranslationRecord,
};
use crate::checksum::Checksum;

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    db: DatabaseConnection,
}

/// WHERE clause and its positional parameters, built up condition by condition
#[derive(Default)]
struct Filter {
    conditions: Vec<String>,
    values: Vec<Value>,
}

impl Filter {
    fn push(&mut self, condition: impl Into<String>, value: Value) {
        self.conditions.push(condition.into());
        self.values.push(value);
    }

    fn push_id(&mut self, column: &str, id: Option<i64>, direction: Direction) {
        if let Some(id) = id {
            self.push(format!("{} {} ?", column, direction.comparison()), Value::Integer(id));
        }
    }

    fn push_text(&mut self, condition: &str, value: Option<String>) {
        if let Some(value) = value {
            self.push(condition, Value::Text(value));
        }
    }

    fn where_clause(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }
}

fn conversion_error(
    idx: usize,
    ty: Type,
    err: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, ty, err.into())
}

fn status_column(row: &Row, idx: usize) -> rusqlite::Result<Option<ArticleStatus>> {
    row.get::<_, Option<String>>(idx)?
        .map(|s| s.parse::<ArticleStatus>())
        .transpose()
        .map_err(|e| conversion_error(idx, Type::Text, e))
}

fn content_column<T: serde::de::DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, Type::Text, e))
}

fn checksum_column(row: &Row, idx: usize) -> rusqlite::Result<Checksum> {
    let raw: Vec<u8> = row.get(idx)?;
    Checksum::from_bytes(&raw).map_err(|e| conversion_error(idx, Type::Blob, e))
}

const TRANSLATION_COLUMNS: &str = "a.status, t.content, t.lang_to, t.lang_from, t.providers_id, t.text_id, \
     t.checksum, t.created_at FROM translations t INNER JOIN articles a ON t.text_id = a.id";

fn translation_from_row(row: &Row) -> rusqlite::Result<TranslationRecord> {
    let provider_id: i64 = row.get(4)?;
    let provider = ProviderId::from_id(provider_id)
        .ok_or_else(|| conversion_error(4, Type::Integer, anyhow!("Unknown provider id: {}", provider_id)))?;

    Ok(TranslationRecord {
        status: status_column(row, 0)?,
        content: content_column(row, 1)?,
        lang_to: row.get(2)?,
        lang_from: row.get(3)?,
        provider,
        text_id: row.get(5)?,
        checksum: checksum_column(row, 6)?,
        created_at: row.get(7)?,
    })
}

const FINAL_COLUMNS: &str = "text_id, lang_to, edited_content, aws_rating, gcp_rating, azure_rating, \
     comments, checksum, created_at FROM edited_translations";

fn final_from_row(row: &Row) -> rusqlite::Result<FinalTranslationRecord> {
    Ok(FinalTranslationRecord {
        text_id: row.get(0)?,
        lang_to: row.get(1)?,
        content: content_column(row, 2)?,
        ratings: ProviderRatings {
            aws: row.get(3)?,
            gcp: row.get(4)?,
            azure: row.get(5)?,
        },
        comments: row.get(6)?,
        checksum: checksum_column(row, 7)?,
        created_at: row.get(8)?,
    })
}

impl Repository {
    /// Create a new repository with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a repository with an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        Ok(Self::new(DatabaseConnection::new_in_memory()?))
    }

    /// Underlying connection, shared with the queue
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    // ===== Article Operations =====

    /// Insert an article or replace its title and text; status is left alone
    pub async fn upsert_article(&self, article: &ArticleRecord) -> Result<()> {
        self.import_articles(vec![article.clone()]).await.map(|_| ())
    }

    /// Upsert many articles in one transaction
    pub async fn import_articles(&self, articles: Vec<ArticleRecord>) -> Result<usize> {
        self.db
            .transaction_async(move |tx| {
                let mut stmt = tx.prepare(
                    r#"
                    INSERT INTO articles (id, title, body_text, status) VALUES (?1, ?2, ?3, ?4)
                    ON CONFLICT(id) DO UPDATE SET
                        title = excluded.title,
                        body_text = excluded.body_text
                    "#,
                )?;
                for article in &articles {
                    stmt.execute(params![
                        article.id,
                        article.title,
                        article.body_text,
                        article.status.map(|s| s.as_str()),
                    ])?;
                }
                Ok(articles.len())
            })
            .await
    }

    /// First article matching every given field, lowest id first
    pub async fn find_article(&self, query: ArticleQuery) -> Result<Option<ArticleRecord>> {
        self.db
            .execute_async(move |conn| {
                let mut filter = Filter::default();
                filter.push_id("id", query.id, Direction::Exact);
                filter.push_text("title = ?", query.title);

                let sql = format!(
                    "SELECT id, title, body_text, status FROM articles{} ORDER BY id LIMIT 1",
                    filter.where_clause()
                );
                let article = conn
                    .query_row(&sql, params_from_iter(filter.values), |row| {
                        Ok(ArticleRecord {
                            id: row.get(0)?,
                            title: row.get(1)?,
                            body_text: row.get(2)?,
                            status: status_column(row, 3)?,
                        })
                    })
                    .optional()?;
                Ok(article)
            })
            .await
    }

    /// Articles in progress, one row per distinct language pair
    pub async fn list_status(&self) -> Result<Vec<StatusRow>> {
        self.db
            .execute_async(|conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT DISTINCT a.id, a.status, a.title, t.lang_to, t.lang_from
                    FROM articles a
                    LEFT JOIN translations t ON a.id = t.text_id
                    WHERE a.status = 'done' OR a.status = 'pending'
                    ORDER BY a.id, t.lang_from, t.lang_to
                    "#,
                )?;

                let rows = stmt.query_map([], |row| {
                    Ok(StatusRow {
                        id: row.get(0)?,
                        status: status_column(row, 1)?,
                        title: row.get(2)?,
                        lang_to: row.get(3)?,
                        lang_from: row.get(4)?,
                    })
                })?;

                Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
            })
            .await
    }

    // ===== First-pass Translation Operations =====

    /// Whether this provider already stored this exact translation of the article
    pub async fn translation_exists(
        &self,
        text_id: i64,
        provider: ProviderId,
        lang_to: &str,
        checksum: Checksum,
    ) -> Result<bool> {
        let lang_to = lang_to.to_string();
        self.db
            .execute_async(move |conn| {
                let count: i64 = conn.query_row(
                    r#"
                    SELECT COUNT(*) FROM translations
                    WHERE text_id = ?1 AND providers_id = ?2 AND lang_to = ?3 AND checksum = ?4
                    "#,
                    params![text_id, provider.id(), lang_to, checksum.as_bytes()],
                    |row| row.get(0),
                )?;
                Ok(count > 0)
            })
            .await
    }

    /// Store a provider translation and mark its article pending
    pub async fn store_first_translation(&self, translation: NewTranslation) -> Result<()> {
        let content = serde_json::to_string(&translation.content)?;
        let now = chrono::Utc::now().to_rfc3339();

        self.db
            .transaction_async(move |tx| {
                tx.execute(
                    r#"
                    INSERT INTO translations (text_id, providers_id, content, lang_from, lang_to, checksum, created_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                    ON CONFLICT(text_id, providers_id, lang_to) DO UPDATE SET
                        content = excluded.content,
                        lang_from = excluded.lang_from,
                        checksum = excluded.checksum,
                        created_at = excluded.created_at
                    "#,
                    params![
                        translation.text_id,
                        translation.provider.id(),
                        content,
                        translation.lang_from,
                        translation.lang_to,
                        translation.checksum.as_bytes(),
                        now,
                    ],
                )?;

                tx.execute(
                    "UPDATE articles SET status = ?1 WHERE id = ?2",
                    params![ArticleStatus::Pending.as_str(), translation.text_id],
                )?;

                debug!(
                    "Stored {} translation of article {} ({} -> {})",
                    translation.provider, translation.text_id, translation.lang_from, translation.lang_to
                );
                Ok(())
            })
            .await
    }

    /// First translation matching the query
    ///
    /// `Next` walks ids upward and `Prev` downward so the nearest neighbour
    /// comes back first.
    pub async fn find_first_translation(&self, query: FirstTranslationQuery) -> Result<Option<TranslationRecord>> {
        self.db
            .execute_async(move |conn| {
                let mut filter = Filter::default();
                filter.push_text("json_extract(t.content, '$.title') = ?", query.title);
                filter.push_id("t.text_id", query.id, query.direction);
                if let Some(provider) = query.provider {
                    filter.push("t.providers_id = ?", Value::Integer(provider.id()));
                }
                filter.push_text("t.lang_to = ?", query.lang_to);

                let sql = format!(
                    "SELECT {}{} ORDER BY t.text_id {}, t.providers_id ASC LIMIT 1",
                    TRANSLATION_COLUMNS,
                    filter.where_clause(),
                    query.direction.order()
                );
                Ok(conn
                    .query_row(&sql, params_from_iter(filter.values), translation_from_row)
                    .optional()?)
            })
            .await
    }

    /// One provider's translation of an article, looked up by id and/or title
    pub async fn find_provider_translation(
        &self,
        id: Option<i64>,
        title: Option<String>,
        provider: ProviderId,
    ) -> Result<Option<TranslationRecord>> {
        self.find_first_translation(FirstTranslationQuery {
            id,
            title,
            provider: Some(provider),
            direction: Direction::Exact,
            lang_to: None,
        })
        .await
    }

    // ===== Final Translation Operations =====

    /// Whether a reviewed translation with this checksum is stored for the article
    pub async fn final_exists(&self, text_id: i64, checksum: Checksum) -> Result<bool> {
        self.db
            .execute_async(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM edited_translations WHERE text_id = ?1 AND checksum = ?2",
                    params![text_id, checksum.as_bytes()],
                    |row| row.get(0),
                )?;
                Ok(count > 0)
            })
            .await
    }

    /// Store a reviewed translation and mark its article done
    pub async fn store_final_translation(&self, translation: NewFinalTranslation) -> Result<()> {
        let content = serde_json::to_string(&translation.content)?;
        let now = chrono::Utc::now().to_rfc3339();

        self.db
            .transaction_async(move |tx| {
                tx.execute(
                    r#"
                    INSERT INTO edited_translations (
                        text_id, lang_to, edited_content, aws_rating, gcp_rating, azure_rating,
                        comments, checksum, created_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                    ON CONFLICT(text_id, lang_to) DO UPDATE SET
                        edited_content = excluded.edited_content,
                        aws_rating = excluded.aws_rating,
                        gcp_rating = excluded.gcp_rating,
                        azure_rating = excluded.azure_rating,
                        comments = excluded.comments,
                        checksum = excluded.checksum,
                        created_at = excluded.created_at
                    "#,
                    params![
                        translation.text_id,
                        translation.lang_to,
                        content,
                        translation.ratings.aws,
                        translation.ratings.gcp,
                        translation.ratings.azure,
                        translation.comments,
                        translation.checksum.as_bytes(),
                        now,
                    ],
                )?;

                tx.execute(
                    "UPDATE articles SET status = ?1 WHERE id = ?2",
                    params![ArticleStatus::Done.as_str(), translation.text_id],
                )?;
                Ok(())
            })
            .await
    }

    /// First reviewed translation matching the query
    pub async fn find_final_translation(&self, query: FinalTranslationQuery) -> Result<Option<FinalTranslationRecord>> {
        self.db
            .execute_async(move |conn| {
                let mut filter = Filter::default();
                filter.push_text("json_extract(edited_content, '$.title') = ?", query.title);
                filter.push_id("text_id", query.id, query.direction);
                filter.push_text("lang_to = ?", query.lang_to);

                let sql = format!(
                    "SELECT {}{} ORDER BY text_id {}, lang_to ASC LIMIT 1",
                    FINAL_COLUMNS,
                    filter.where_clause(),
                    query.direction.order()
                );
                Ok(conn
                    .query_row(&sql, params_from_iter(filter.values), final_from_row)
                    .optional()?)
            })
            .await
    }

    // ===== Removal =====

    /// Delete an article's translations for one language pair
    ///
    /// Returns `None` when nothing matched, otherwise how many translations
    /// of the article remain. The article status is cleared once none do.
    pub async fn delete_translations(&self, text_id: i64, lang_from: &str, lang_to: &str) -> Result<Option<i64>> {
        let lang_from = lang_from.to_string();
        let lang_to = lang_to.to_string();

        self.db
            .transaction_async(move |tx| {
                let deleted = tx.execute(
                    "DELETE FROM translations WHERE text_id = ?1 AND lang_to = ?2 AND lang_from = ?3",
                    params![text_id, lang_to, lang_from],
                )?;
                if deleted == 0 {
                    return Ok(None);
                }

                let remaining: i64 = tx.query_row(
                    "SELECT COUNT(*) FROM translations WHERE text_id = ?1",
                    [text_id],
                    |row| row.get(0),
                )?;
                if remaining == 0 {
                    tx.execute("UPDATE articles SET status = NULL WHERE id = ?1", [text_id])?;
                }

                debug!("Deleted {} translations of article {}, {} remain", deleted, text_id, remaining);
                Ok(Some(remaining))
            })
            .await
    }

    /// Delete every first-pass translation of an article and clear its status
    pub async fn remove_article_translations(&self, text_id: i64) -> Result<usize> {
        self.db
            .transaction_async(move |tx| {
                let deleted = tx.execute("DELETE FROM translations WHERE text_id = ?1", [text_id])?;
                tx.execute("UPDATE articles SET status = NULL WHERE id = ?1", [text_id])?;
                Ok(deleted)
            })
            .await
    }
}
