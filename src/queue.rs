/*!
 * Provider work queues.
 *
 * Each provider consumes its own queue. `push_to_queue` fans one message out
 * to every enabled provider queue and the provider workers drain them.
 * The SQLite backend mirrors the semantics of a managed queue: receiving
 * hides a message for a visibility timeout, deleting by receipt acknowledges
 * it, and an unacknowledged message is delivered again once the timeout
 * expires.
 */

use async_trait::async_trait;
use futures::future::try_join_all;
use log::debug;
use rusqlite::params;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::app_config::MAX_RECEIVE_BATCH;
use crate::database::DatabaseConnection;
use crate::database::models::ProviderId;
use crate::errors::QueueError;

/// Body of a translation request as it travels through a provider queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueMessage {
    /// Article id
    pub id: i64,
    /// Article title, translated alongside the text when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Article body text
    pub text: String,
    /// Source language
    pub from_lang: String,
    /// Target language
    pub to_lang: String,
}

impl QueueMessage {
    /// Serialize for sending
    pub fn to_body(&self) -> Result<String, QueueError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a received body
    pub fn from_body(body: &str) -> Result<Self, QueueError> {
        Ok(serde_json::from_str(body)?)
    }
}

/// A message handed out by `receive`, hidden until deleted or timed out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    /// Handle that acknowledges this delivery
    pub receipt: String,
    /// Raw message body
    pub body: String,
    /// Number of times the message has been delivered, this one included
    pub receive_count: i64,
}

/// A named-queue message broker
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Append a message to `queue`
    async fn send(&self, queue: &str, body: &str) -> Result<(), QueueError>;

    /// Take up to `max_messages` visible messages from `queue`
    async fn receive(&self, queue: &str, max_messages: usize) -> Result<Vec<ReceivedMessage>, QueueError>;

    /// Acknowledge a received message
    async fn delete(&self, queue: &str, receipt: &str) -> Result<(), QueueError>;
}

/// Durable queue stored in the pipeline database
#[derive(Clone)]
pub struct SqliteQueue {
    db: DatabaseConnection,
    visibility_timeout: Duration,
}

impl SqliteQueue {
    /// Create a queue backend over an open database
    pub fn new(db: DatabaseConnection, visibility_timeout: Duration) -> Self {
        Self { db, visibility_timeout }
    }

    /// Messages stored in `queue`, visible or not
    pub async fn len(&self, queue: &str) -> Result<usize, QueueError> {
        let queue = queue.to_string();
        let count = self
            .db
            .execute_async(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM queue_messages WHERE queue = ?1",
                    [queue],
                    |row| row.get(0),
                )?;
                Ok(count)
            })
            .await?;
        Ok(count as usize)
    }

    /// Whether `queue` holds no messages
    pub async fn is_empty(&self, queue: &str) -> Result<bool, QueueError> {
        Ok(self.len(queue).await? == 0)
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[async_trait]
impl MessageQueue for SqliteQueue {
    async fn send(&self, queue: &str, body: &str) -> Result<(), QueueError> {
        let queue = queue.to_string();
        let body = body.to_string();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    "INSERT INTO queue_messages (queue, body, visible_at, created_at) VALUES (?1, ?2, ?3, ?4)",
                    params![queue, body, now_millis(), chrono::Utc::now().to_rfc3339()],
                )?;
                debug!("Queued message on {}", queue);
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn receive(&self, queue: &str, max_messages: usize) -> Result<Vec<ReceivedMessage>, QueueError> {
        let queue = queue.to_string();
        let limit = max_messages.clamp(1, MAX_RECEIVE_BATCH) as i64;
        let timeout_ms = i64::try_from(self.visibility_timeout.as_millis()).unwrap_or(i64::MAX);

        let messages = self
            .db
            .transaction_async(move |tx| {
                let now = now_millis();
                let candidates: Vec<(i64, String, i64)> = {
                    let mut stmt = tx.prepare(
                        r#"
                        SELECT id, body, receive_count FROM queue_messages
                        WHERE queue = ?1 AND visible_at <= ?2
                        ORDER BY id
                        LIMIT ?3
                        "#,
                    )?;
                    let rows = stmt.query_map(params![queue, now, limit], |row| {
                        Ok((row.get(0)?, row.get(1)?, row.get(2)?))
                    })?;
                    rows.collect::<rusqlite::Result<Vec<_>>>()?
                };

                let hidden_until = now.saturating_add(timeout_ms);
                let mut received = Vec::with_capacity(candidates.len());
                for (id, body, receive_count) in candidates {
                    let receipt = uuid::Uuid::new_v4().to_string();
                    tx.execute(
                        "UPDATE queue_messages SET receipt = ?1, visible_at = ?2, receive_count = receive_count + 1 WHERE id = ?3",
                        params![receipt, hidden_until, id],
                    )?;
                    received.push(ReceivedMessage {
                        receipt,
                        body,
                        receive_count: receive_count + 1,
                    });
                }
                Ok(received)
            })
            .await?;

        Ok(messages)
    }

    async fn delete(&self, queue: &str, receipt: &str) -> Result<(), QueueError> {
        let queue = queue.to_string();
        let receipt_owned = receipt.to_string();

        let deleted = self
            .db
            .execute_async(move |conn| {
                Ok(conn.execute(
                    "DELETE FROM queue_messages WHERE queue = ?1 AND receipt = ?2",
                    params![queue, receipt_owned],
                )?)
            })
            .await?;

        if deleted == 0 {
            return Err(QueueError::UnknownReceipt(receipt.to_string()));
        }
        Ok(())
    }
}

/// Send `message` to the queue of every provider concurrently
///
/// Fails on the first send error. Messages already sent stay queued.
pub async fn fan_out(
    queue: &dyn MessageQueue,
    message: &QueueMessage,
    providers: &[ProviderId],
) -> Result<Vec<ProviderId>, QueueError> {
    let body = message.to_body()?;

    let sends = providers.iter().map(|provider| {
        let name = provider.queue_name();
        let body = body.as_str();
        async move {
            queue.send(&name, body).await?;
            debug!("Article {} queued for {}", message.id, provider);
            Ok::<_, QueueError>(*provider)
        }
    });

    try_join_all(sends).await
}
