/*!
 * Database schema definitions and migrations.
 *
 * Tables: `articles` (source texts and pipeline status), `translations`
 * (first-pass provider output), `edited_translations` (reviewed output)
 * and `queue_messages` (provider work queues).
 */

use anyhow::{Context, Result, anyhow};
use log::{debug, info};
use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Enable per-connection pragmas and create the schema on first open
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    // foreign_keys is per connection, so it is set on every open
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;

    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Initializing database schema v{}", SCHEMA_VERSION);
        create_all_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version > SCHEMA_VERSION {
        return Err(anyhow!(
            "Database schema v{} is newer than supported v{}",
            current_version,
            SCHEMA_VERSION
        ));
    } else {
        debug!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

fn get_schema_version(conn: &Connection) -> Result<i32> {
    let table_exists: bool = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='schema_version'",
            [],
            |row| row.get(0),
        )
        .context("Failed to check schema_version table existence")?;

    if !table_exists {
        return Ok(0);
    }

    let version: i32 = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
        .unwrap_or(0);

    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_version (id, version, updated_at) VALUES (1, ?1, datetime('now'))",
        [version],
    )?;
    Ok(())
}

fn create_all_tables(conn: &Connection) -> Result<()> {
    // In-memory databases ignore WAL and report "memory"
    conn.query_row("PRAGMA journal_mode=WAL;", [], |row| row.get::<_, String>(0))?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS articles (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            body_text TEXT NOT NULL,
            status TEXT CHECK (status IN ('pending', 'done'))
        );

        CREATE INDEX IF NOT EXISTS idx_articles_title ON articles(title);
        CREATE INDEX IF NOT EXISTS idx_articles_status ON articles(status);

        CREATE TABLE IF NOT EXISTS translations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            text_id INTEGER NOT NULL REFERENCES articles(id) ON DELETE CASCADE,
            providers_id INTEGER NOT NULL CHECK (providers_id BETWEEN 1 AND 3),
            content TEXT NOT NULL,
            lang_from TEXT NOT NULL,
            lang_to TEXT NOT NULL,
            checksum BLOB NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE(text_id, providers_id, lang_to)
        );

        CREATE INDEX IF NOT EXISTS idx_translations_checksum ON translations(text_id, checksum);

        CREATE TABLE IF NOT EXISTS edited_translations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            text_id INTEGER NOT NULL REFERENCES articles(id) ON DELETE CASCADE,
            lang_to TEXT NOT NULL,
            edited_content TEXT NOT NULL,
            aws_rating INTEGER CHECK (aws_rating BETWEEN 1 AND 5),
            gcp_rating INTEGER CHECK (gcp_rating BETWEEN 1 AND 5),
            azure_rating INTEGER CHECK (azure_rating BETWEEN 1 AND 5),
            comments TEXT,
            checksum BLOB NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE(text_id, lang_to)
        );

        CREATE INDEX IF NOT EXISTS idx_edited_checksum ON edited_translations(text_id, checksum);

        CREATE TABLE IF NOT EXISTS queue_messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            queue TEXT NOT NULL,
            body TEXT NOT NULL,
            receipt TEXT,
            visible_at INTEGER NOT NULL,
            receive_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_queue_visible ON queue_messages(queue, visible_at);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_queue_receipt ON queue_messages(receipt);
        "#,
    )?;

    info!("Database schema created successfully");
    Ok(())
}
