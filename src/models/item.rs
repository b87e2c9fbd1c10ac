use serde::{Deserialize, Serialize};

use crate::models::{file_record::FileRecord, folder_record::FolderRecord};

/// Entry of a UI-facing listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ListItem {
	File(FileRecord),
	Folder(FolderRecord),
	/// Group header; carries the group's folder path.
	Separator { title: String },
}

impl ListItem {
	pub fn path(&self) -> Option<String> {
		match self {
			ListItem::File(file) => Some(file.path()),
			ListItem::Folder(folder) => Some(folder.path()),
			ListItem::Separator { .. } => None,
		}
	}
}

/// Per-item result of a mutation batch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MutationStatus {
	Ok,
	Failed,
	FileCollision,
	MoveIntoSelf,
	SystemFolderNotAllowed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemOutcome {
	pub path: String,
	pub status: MutationStatus,
}

impl ItemOutcome {
	pub fn new(path: impl Into<String>, status: MutationStatus) -> Self {
		ItemOutcome { path: path.into(), status }
	}

	pub fn is_ok(&self) -> bool {
		self.status == MutationStatus::Ok
	}
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
	Name,
	Path,
	#[default]
	TakenAt,
	Duration,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SortOrder {
	pub key: SortKey,
	pub descending: bool,
	pub group_by_folder: bool,
}

impl Default for SortOrder {
	fn default() -> Self {
		SortOrder { key: SortKey::TakenAt, descending: true, group_by_folder: false }
	}
}
