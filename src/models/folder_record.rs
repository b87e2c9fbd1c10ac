use serde::{Deserialize, Serialize};

use crate::paths;

/// A folder surfaced by the aggregation pass.
/// Identity is `(parent_path, file_name)`; counts and thumbnail are derived.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FolderRecord {
	pub parent_path: String,
	pub file_name: String,
	#[serde(default)]
	pub last_modified: i64,
	#[serde(default)]
	pub thumbnail: String,
	#[serde(default)]
	pub folder_count: i64,
	#[serde(default)]
	pub file_count: i64,
	#[serde(default)]
	pub user_created: bool,
	#[serde(default)]
	pub starred: bool,
}

impl FolderRecord {
	pub fn at(path: &str) -> Self {
		let (parent_path, file_name) = paths::split_folder(path);
		FolderRecord {
			parent_path,
			file_name,
			last_modified: 0,
			thumbnail: String::new(),
			folder_count: 0,
			file_count: 0,
			user_created: false,
			starred: false,
		}
	}

	pub fn path(&self) -> String {
		paths::join(&self.parent_path, &self.file_name)
	}

	pub fn is_all_videos(&self) -> bool {
		self.parent_path.is_empty() && self.file_name == paths::ALL_VIDEOS
	}

	pub fn is_empty(&self) -> bool {
		self.folder_count == 0 && self.file_count == 0
	}

	pub fn relocated(&self, new_path: &str) -> Self {
		let (parent_path, file_name) = paths::split_folder(new_path);
		FolderRecord { parent_path, file_name, ..self.clone() }
	}

	pub fn to_row(&self) -> Result<serde_json::Value, serde_json::Error> {
		let mut row = serde_json::to_value(self)?;
		row["path"] = serde_json::Value::String(self.path());
		Ok(row)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn all_videos_identity() {
		let folder = FolderRecord::at(paths::ALL_VIDEOS);
		assert!(folder.is_all_videos());
		assert_eq!(folder.path(), paths::ALL_VIDEOS);
		assert!(!FolderRecord::at("/root/Videos").is_all_videos());
	}

	#[test]
	fn relocated_keeps_flags() {
		let mut folder = FolderRecord::at("/root/a/b");
		folder.starred = true;
		let moved = folder.relocated("/root/c/b");
		assert_eq!(moved.path(), "/root/c/b");
		assert!(moved.starred);
	}
}
