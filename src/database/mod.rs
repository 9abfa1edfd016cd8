/*!
 * SQLite persistence for the translation pipeline.
 *
 * - Articles and their pipeline status
 * - First-pass provider translations
 * - Reviewed (final) translations
 * - Provider work queues (see `crate::queue`)
 */

pub mod connection;
pub mod models;
pub mod repository;
pub mod schema;

pub use connection::DatabaseConnection;
pub use repository::Repository;
