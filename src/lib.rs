//! Media index synchronization and folder aggregation.
//!
//! The engine keeps a local SurrealDB index of media files and folders in
//! step with an external, eventually consistent media indexer, and performs
//! user file operations so that disk, index and indexer converge.

pub mod config;
pub mod db;
pub mod engine;
pub mod indexer;
pub mod models;
pub mod paths;
pub mod store;

pub use config::Preferences;
pub use db::DbHandle;
pub use engine::{Engine, EngineError, PassOutcome, ReconcileReport};
pub use indexer::{LocalIndexer, MediaIndexer};
