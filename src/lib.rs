/*!
 * # mtdock - Multi-provider machine translation pipeline
 *
 * Articles are queued to several machine translation providers, their
 * first-pass translations are stored with integrity checksums, and a human
 * reviewer rates and edits them into a final translation.
 *
 * ## Architecture
 *
 * - `app_config`: Configuration loading, validation and overrides
 * - `checksum`: SHA-256 checksums over translation payloads
 * - `database`: SQLite store for articles and translations
 * - `queue`: Per-provider work queues
 * - `providers`: Clients for the provider APIs:
 *   - `providers::aws`: Amazon Translate
 *   - `providers::gcp`: Google Cloud Translation
 *   - `providers::azure`: Azure Translator
 * - `pipeline`: Handlers implementing every pipeline operation
 * - `worker`: Provider queue consumers
 * - `dashboard`: Review form handling
 * - `server`: HTTP routes
 * - `language_utils`: ISO language code utilities
 * - `errors`: Custom error types for the application
 */

// Global lints configuration
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

pub mod app_config;
pub mod checksum;
pub mod dashboard;
pub mod database;
pub mod errors;
pub mod language_utils;
pub mod pipeline;
pub mod providers;
pub mod queue;
pub mod server;
pub mod worker;

pub use app_config::Config;
pub use checksum::{Checksum, ChecksumFields};
pub use errors::{ChecksumError, HandlerError, ProviderError, QueueError};
pub use language_utils::{get_language_name, normalize_language_code};
pub use pipeline::PipelineService;
pub use worker::{BatchReport, TranslationWorker};
