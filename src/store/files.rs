use crate::{
	db::DbHandle,
	models::FileRecord,
	store::{decode_rows, limit_clause, subtree_prefix, IndexDelta, StoreError},
};

const FIELDS: &str = "path, parent_path, file_name, extension, external_id, taken_at, duration_ms, lat, lng, on_disk";

/// Newest first, the order the media indexer hands files out in.
const ORDER: &str = "ORDER BY taken_at DESC, path ASC";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFilter {
	All,
	Existing,
	Missing,
}

impl FileFilter {
	fn clause(self) -> &'static str {
		match self {
			FileFilter::All => "",
			FileFilter::Existing => " WHERE on_disk = true",
			FileFilter::Missing => " WHERE on_disk = false",
		}
	}
}

pub async fn get_all(db: &DbHandle, filter: FileFilter) -> Result<Vec<FileRecord>, StoreError> {
	let sql = format!("SELECT {FIELDS} FROM file_record{} {ORDER}", filter.clause());
	let mut response = db.db.query(&sql).await.map_err(|e| StoreError::Db(e.to_string()))?;

	let rows: Vec<serde_json::Value> = response
		.take(0)
		.map_err(|e| StoreError::Db(e.to_string()))?;

	decode_rows(rows)
}

pub async fn get(db: &DbHandle, path: &str) -> Result<Option<FileRecord>, StoreError> {
	let sql = format!("SELECT {FIELDS} FROM type::record('file_record', $path)");
	let mut response = db
		.db
		.query(&sql)
		.bind(("path", path.to_string()))
		.await
		.map_err(|e| StoreError::Db(e.to_string()))?;

	let rows: Vec<serde_json::Value> = response
		.take(0)
		.map_err(|e| StoreError::Db(e.to_string()))?;

	Ok(decode_rows(rows)?.into_iter().next())
}

/// Files directly inside `path`, or anywhere beneath it when `recursive`.
pub async fn get_children(
	db: &DbHandle,
	path: &str,
	recursive: bool,
	limit: Option<usize>,
) -> Result<Vec<FileRecord>, StoreError> {
	let filter = if recursive {
		"parent_path = $path OR string::starts_with(parent_path, $prefix)"
	} else {
		"parent_path = $path"
	};
	let sql = format!("SELECT {FIELDS} FROM file_record WHERE {filter} {ORDER}{}", limit_clause(limit));
	let mut response = db
		.db
		.query(&sql)
		.bind(("path", path.to_string()))
		.bind(("prefix", subtree_prefix(path)))
		.await
		.map_err(|e| StoreError::Db(e.to_string()))?;

	let rows: Vec<serde_json::Value> = response
		.take(0)
		.map_err(|e| StoreError::Db(e.to_string()))?;

	decode_rows(rows)
}

/// Insert or replace by identity.
pub async fn upsert(db: &DbHandle, records: Vec<FileRecord>) -> Result<(), StoreError> {
	IndexDelta { file_upserts: records, ..Default::default() }.commit(db).await
}

/// Swap the whole table for `records` in one transaction.
pub async fn replace_all(db: &DbHandle, records: Vec<FileRecord>) -> Result<(), StoreError> {
	IndexDelta { replace_files: true, file_upserts: records, ..Default::default() }
		.commit(db)
		.await
}

pub async fn delete_by_identity(db: &DbHandle, record: &FileRecord) -> Result<(), StoreError> {
	IndexDelta { file_deletes: vec![record.path()], ..Default::default() }
		.commit(db)
		.await
}

pub async fn delete_direct_children(db: &DbHandle, path: &str) -> Result<(), StoreError> {
	db.db
		.query("DELETE file_record WHERE parent_path = $path")
		.bind(("path", path.to_string()))
		.await
		.map_err(|e| StoreError::Db(e.to_string()))?
		.check()
		.map_err(|e| StoreError::Db(e.to_string()))?;
	Ok(())
}

pub async fn delete_descendants(db: &DbHandle, path: &str) -> Result<(), StoreError> {
	db.db
		.query("DELETE file_record WHERE parent_path = $path OR string::starts_with(parent_path, $prefix)")
		.bind(("path", path.to_string()))
		.bind(("prefix", subtree_prefix(path)))
		.await
		.map_err(|e| StoreError::Db(e.to_string()))?
		.check()
		.map_err(|e| StoreError::Db(e.to_string()))?;
	Ok(())
}

pub async fn delete_all(db: &DbHandle) -> Result<(), StoreError> {
	db.db
		.query("DELETE file_record")
		.await
		.map_err(|e| StoreError::Db(e.to_string()))?
		.check()
		.map_err(|e| StoreError::Db(e.to_string()))?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::db;

	fn photo(path: &str, taken_at: i64) -> FileRecord {
		FileRecord { taken_at, ..FileRecord::at(path) }
	}

	async fn seeded() -> DbHandle {
		let handle = db::init_memory().await.unwrap();
		upsert(
			&handle,
			vec![
				photo("/root/a/1.jpg", 10),
				photo("/root/a/2.jpg", 30),
				photo("/root/a/b/3.jpg", 20),
				photo("/root/ab/4.jpg", 40),
			],
		)
		.await
		.unwrap();
		handle
	}

	#[tokio::test]
	async fn direct_children_newest_first() {
		let handle = seeded().await;
		let children = get_children(&handle, "/root/a", false, None).await.unwrap();
		let names: Vec<String> = children.iter().map(FileRecord::path).collect();
		assert_eq!(names, vec!["/root/a/2.jpg", "/root/a/1.jpg"]);
	}

	#[tokio::test]
	async fn recursive_children_skip_shared_prefix_sibling() {
		let handle = seeded().await;
		let children = get_children(&handle, "/root/a", true, None).await.unwrap();
		assert_eq!(children.len(), 3);
		assert!(children.iter().all(|f| f.parent_path != "/root/ab"));

		let limited = get_children(&handle, "/root/a", true, Some(1)).await.unwrap();
		assert_eq!(limited.len(), 1);
		assert_eq!(limited[0].path(), "/root/a/2.jpg");
	}

	#[tokio::test]
	async fn upsert_replaces_on_identity() {
		let handle = seeded().await;
		upsert(&handle, vec![photo("/root/a/1.jpg", 99)]).await.unwrap();

		let all = get_all(&handle, FileFilter::All).await.unwrap();
		assert_eq!(all.len(), 4);
		assert_eq!(get(&handle, "/root/a/1.jpg").await.unwrap().unwrap().taken_at, 99);
	}

	#[tokio::test]
	async fn prefix_deletes() {
		let handle = seeded().await;
		delete_direct_children(&handle, "/root/a").await.unwrap();
		assert_eq!(get_all(&handle, FileFilter::All).await.unwrap().len(), 2);

		delete_descendants(&handle, "/root/a").await.unwrap();
		let left = get_all(&handle, FileFilter::All).await.unwrap();
		assert_eq!(left.len(), 1);
		assert_eq!(left[0].parent_path, "/root/ab");

		delete_by_identity(&handle, &left[0]).await.unwrap();
		assert!(get_all(&handle, FileFilter::All).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn filter_by_presence() {
		let handle = seeded().await;
		IndexDelta { files_absent: vec!["/root/a/1.jpg".into()], ..Default::default() }
			.commit(&handle)
			.await
			.unwrap();

		assert_eq!(get_all(&handle, FileFilter::Existing).await.unwrap().len(), 3);
		let missing = get_all(&handle, FileFilter::Missing).await.unwrap();
		assert_eq!(missing.len(), 1);
		assert_eq!(missing[0].path(), "/root/a/1.jpg");

		delete_all(&handle).await.unwrap();
		assert!(get_all(&handle, FileFilter::All).await.unwrap().is_empty());
	}
}
