//! Persisted index: file, folder and action tables plus the last-sync stamp.
//!
//! Every write that touches more than one row goes through [`IndexDelta`],
//! which commits as a single SurrealDB transaction. Readers therefore see
//! either the state before a delta or the state after it, never a mix.

pub mod actions;
pub mod files;
pub mod folders;

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::{
	db::DbHandle,
	models::{ActionRecord, FileRecord, FolderRecord},
};

#[derive(Debug, Error)]
pub enum StoreError {
	#[error("database error: {0}")]
	Db(String),

	#[error("malformed row: {0}")]
	Decode(#[from] serde_json::Error),
}

/// Unit of work over all three tables.
///
/// Statements run in a fixed order: wholesale clears, deletes, upserts, then
/// the `on_disk = false` marks.
#[derive(Debug, Default, Clone)]
pub struct IndexDelta {
	pub replace_files: bool,
	pub replace_folders: bool,
	pub file_deletes: Vec<String>,
	pub file_upserts: Vec<FileRecord>,
	pub files_absent: Vec<String>,
	pub folder_deletes: Vec<String>,
	pub folder_upserts: Vec<FolderRecord>,
	pub action_deletes: Vec<String>,
	pub action_upserts: Vec<ActionRecord>,
}

const DELTA_BODY: &str = "
    FOR $p IN $file_deletes { DELETE type::record('file_record', $p); };
    FOR $row IN $file_upserts { UPSERT type::record('file_record', $row.path) CONTENT $row; };
    FOR $p IN $files_absent { UPDATE type::record('file_record', $p) SET on_disk = false; };
    FOR $p IN $folder_deletes { DELETE type::record('folder_record', $p); };
    FOR $row IN $folder_upserts { UPSERT type::record('folder_record', $row.path) CONTENT $row; };
    FOR $p IN $action_deletes { DELETE type::record('action_record', $p); };
    FOR $row IN $action_upserts { UPSERT type::record('action_record', $row.path) CONTENT $row; };
";

impl IndexDelta {
	pub fn is_empty(&self) -> bool {
		!self.replace_files
			&& !self.replace_folders
			&& self.file_deletes.is_empty()
			&& self.file_upserts.is_empty()
			&& self.files_absent.is_empty()
			&& self.folder_deletes.is_empty()
			&& self.folder_upserts.is_empty()
			&& self.action_deletes.is_empty()
			&& self.action_upserts.is_empty()
	}

	/// Fold `other` into this delta, keeping statement order per table.
	pub fn merge(&mut self, other: IndexDelta) {
		self.replace_files |= other.replace_files;
		self.replace_folders |= other.replace_folders;
		self.file_deletes.extend(other.file_deletes);
		self.file_upserts.extend(other.file_upserts);
		self.files_absent.extend(other.files_absent);
		self.folder_deletes.extend(other.folder_deletes);
		self.folder_upserts.extend(other.folder_upserts);
		self.action_deletes.extend(other.action_deletes);
		self.action_upserts.extend(other.action_upserts);
	}

	fn sql(&self) -> String {
		let mut sql = String::from("BEGIN TRANSACTION;\n");
		if self.replace_files {
			sql.push_str("    DELETE file_record;\n");
		}
		if self.replace_folders {
			sql.push_str("    DELETE folder_record;\n");
		}
		sql.push_str(DELTA_BODY);
		sql.push_str("COMMIT TRANSACTION;");
		sql
	}

	/// Apply the whole delta atomically.
	pub async fn commit(self, db: &DbHandle) -> Result<(), StoreError> {
		if self.is_empty() {
			return Ok(());
		}
		let sql = self.sql();
		let summary = format!(
			"files +{} -{} absent {}, folders +{} -{}, actions +{} -{}",
			self.file_upserts.len(),
			self.file_deletes.len(),
			self.files_absent.len(),
			self.folder_upserts.len(),
			self.folder_deletes.len(),
			self.action_upserts.len(),
			self.action_deletes.len(),
		);

		let file_upserts = rows(self.file_upserts.iter().map(FileRecord::to_row))?;
		let folder_upserts = rows(self.folder_upserts.iter().map(FolderRecord::to_row))?;
		let action_upserts = rows(self.action_upserts.iter().map(ActionRecord::to_row))?;

		db.db
			.query(&sql)
			.bind(("file_deletes", self.file_deletes))
			.bind(("file_upserts", file_upserts))
			.bind(("files_absent", self.files_absent))
			.bind(("folder_deletes", self.folder_deletes))
			.bind(("folder_upserts", folder_upserts))
			.bind(("action_deletes", self.action_deletes))
			.bind(("action_upserts", action_upserts))
			.await
			.map_err(|e| StoreError::Db(e.to_string()))?
			.check()
			.map_err(|e| StoreError::Db(e.to_string()))?;

		tracing::debug!(replace_files = self.replace_files, replace_folders = self.replace_folders, "committed delta: {summary}");
		Ok(())
	}
}

fn rows(iter: impl Iterator<Item = Result<serde_json::Value, serde_json::Error>>) -> Result<serde_json::Value, StoreError> {
	Ok(serde_json::Value::Array(iter.collect::<Result<_, _>>()?))
}

pub(crate) fn decode_rows<T: DeserializeOwned>(rows: Vec<serde_json::Value>) -> Result<Vec<T>, StoreError> {
	rows.into_iter()
		.map(|row| serde_json::from_value(row).map_err(StoreError::from))
		.collect()
}

/// `path/` form used for prefix matches in queries.
pub(crate) fn subtree_prefix(path: &str) -> String {
	if path.ends_with('/') {
		path.to_string()
	} else {
		format!("{path}/")
	}
}

pub(crate) fn limit_clause(limit: Option<usize>) -> String {
	match limit {
		Some(n) => format!(" LIMIT {n}"),
		None => String::new(),
	}
}

/// Last successful reconciliation or mutation batch, in epoch millis. 0 if never.
pub async fn last_sync(db: &DbHandle) -> Result<i64, StoreError> {
	let mut response = db
		.db
		.query("SELECT stamp FROM sync_state:last")
		.await
		.map_err(|e| StoreError::Db(e.to_string()))?;

	let stamp: Option<i64> = response
		.take("stamp")
		.map_err(|e| StoreError::Db(e.to_string()))?;

	Ok(stamp.unwrap_or(0))
}

pub async fn set_last_sync(db: &DbHandle, stamp: i64) -> Result<(), StoreError> {
	db.db
		.query("UPSERT sync_state:last SET stamp = $stamp")
		.bind(("stamp", stamp))
		.await
		.map_err(|e| StoreError::Db(e.to_string()))?
		.check()
		.map_err(|e| StoreError::Db(e.to_string()))?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{db, models::ActionKind};

	#[tokio::test]
	async fn last_sync_defaults_to_zero_and_persists() {
		let handle = db::init_memory().await.unwrap();
		assert_eq!(last_sync(&handle).await.unwrap(), 0);
		set_last_sync(&handle, 1234).await.unwrap();
		assert_eq!(last_sync(&handle).await.unwrap(), 1234);
	}

	#[tokio::test]
	async fn delta_applies_all_tables_together() {
		let handle = db::init_memory().await.unwrap();
		let photo = FileRecord::at("/root/a/photo.jpg");
		let folder = FolderRecord::at("/root/a");

		IndexDelta {
			file_upserts: vec![photo.clone()],
			folder_upserts: vec![folder.clone()],
			action_upserts: vec![ActionRecord::from_file(&photo, ActionKind::Add, 1)],
			..Default::default()
		}
		.commit(&handle)
		.await
		.unwrap();

		assert_eq!(files::get_all(&handle, files::FileFilter::All).await.unwrap(), vec![photo.clone()]);
		assert_eq!(folders::get_all(&handle).await.unwrap(), vec![folder]);
		assert_eq!(actions::all(&handle).await.unwrap().len(), 1);

		IndexDelta {
			files_absent: vec![photo.path()],
			action_deletes: vec![photo.path()],
			..Default::default()
		}
		.commit(&handle)
		.await
		.unwrap();

		let stored = files::get(&handle, &photo.path()).await.unwrap().unwrap();
		assert!(!stored.exists);
		assert!(actions::all(&handle).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn replace_swaps_whole_table() {
		let handle = db::init_memory().await.unwrap();
		files::upsert(&handle, vec![FileRecord::at("/root/a/old.jpg")]).await.unwrap();

		files::replace_all(&handle, vec![FileRecord::at("/root/b/new.jpg")]).await.unwrap();

		let all = files::get_all(&handle, files::FileFilter::All).await.unwrap();
		assert_eq!(all.len(), 1);
		assert_eq!(all[0].path(), "/root/b/new.jpg");
	}

	#[test]
	fn delta_sql_prepends_clears() {
		let delta = IndexDelta { replace_files: true, ..Default::default() };
		let sql = delta.sql();
		assert!(sql.starts_with("BEGIN TRANSACTION;\n    DELETE file_record;"));
		assert!(sql.trim_end().ends_with("COMMIT TRANSACTION;"));
		assert!(!sql.contains("DELETE folder_record;"));
	}
}
