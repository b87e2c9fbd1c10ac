//! Seam to the external media indexer.
//!
//! The indexer is the source of truth for which media exist. It answers
//! snapshot queries and accepts rescan hints; both calls may block.

mod local;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use local::LocalIndexer;

use crate::paths::MediaKind;

#[derive(Debug, Error)]
pub enum IndexerError {
	#[error("media root not available: {0}")]
	RootUnavailable(String),

	#[error("indexer query failed: {0}")]
	QueryFailed(String),
}

/// One entry of an indexer snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedMedia {
	pub path: String,
	pub external_id: i64,
	pub taken_at: i64,
	pub lat: f64,
	pub lng: f64,
	pub duration_ms: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RescanKind {
	FileAdd,
	FileDelete,
	/// Rescan the folder's direct children only.
	FolderAddThis,
	/// Rescan the folder and everything beneath it.
	FolderAddAll,
	FolderDelete,
}

impl RescanKind {
	pub fn is_file_level(self) -> bool {
		matches!(self, RescanKind::FileAdd | RescanKind::FileDelete)
	}

	/// Requests of these kinds cover the whole subtree of their path.
	pub fn covers_subtree(self) -> bool {
		matches!(self, RescanKind::FolderAddAll | RescanKind::FolderDelete)
	}
}

pub trait MediaIndexer: Send + Sync {
	/// Every media entry of `kinds` under any of `roots`.
	fn query(&self, roots: &[String], kinds: &[MediaKind]) -> Result<Vec<IndexedMedia>, IndexerError>;

	/// Ask the indexer to look at `path` again. Fire-and-forget.
	fn request_rescan(&self, path: &str, kind: RescanKind);
}
