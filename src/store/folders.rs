use crate::{
	db::DbHandle,
	models::FolderRecord,
	store::{decode_rows, limit_clause, subtree_prefix, IndexDelta, StoreError},
};

const FIELDS: &str = "path, parent_path, file_name, last_modified, thumbnail, folder_count, file_count, user_created, starred";

async fn select(db: &DbHandle, sql: &str, path: &str) -> Result<Vec<FolderRecord>, StoreError> {
	let mut response = db
		.db
		.query(sql)
		.bind(("path", path.to_string()))
		.bind(("prefix", subtree_prefix(path)))
		.await
		.map_err(|e| StoreError::Db(e.to_string()))?;

	let rows: Vec<serde_json::Value> = response
		.take(0)
		.map_err(|e| StoreError::Db(e.to_string()))?;

	decode_rows(rows)
}

pub async fn get_all(db: &DbHandle) -> Result<Vec<FolderRecord>, StoreError> {
	select(db, &format!("SELECT {FIELDS} FROM folder_record ORDER BY path ASC"), "").await
}

pub async fn get(db: &DbHandle, path: &str) -> Result<Option<FolderRecord>, StoreError> {
	let sql = format!("SELECT {FIELDS} FROM type::record('folder_record', $path)");
	Ok(select(db, &sql, path).await?.into_iter().next())
}

pub async fn get_children(
	db: &DbHandle,
	path: &str,
	recursive: bool,
	limit: Option<usize>,
) -> Result<Vec<FolderRecord>, StoreError> {
	let filter = if recursive {
		"parent_path = $path OR string::starts_with(parent_path, $prefix)"
	} else {
		"parent_path = $path"
	};
	let sql = format!("SELECT {FIELDS} FROM folder_record WHERE {filter} ORDER BY path ASC{}", limit_clause(limit));
	select(db, &sql, path).await
}

pub async fn get_starred(db: &DbHandle) -> Result<Vec<FolderRecord>, StoreError> {
	select(db, &format!("SELECT {FIELDS} FROM folder_record WHERE starred = true ORDER BY path ASC"), "").await
}

pub async fn get_user_created(db: &DbHandle) -> Result<Vec<FolderRecord>, StoreError> {
	select(db, &format!("SELECT {FIELDS} FROM folder_record WHERE user_created = true ORDER BY path ASC"), "").await
}

pub async fn upsert(db: &DbHandle, records: Vec<FolderRecord>) -> Result<(), StoreError> {
	IndexDelta { folder_upserts: records, ..Default::default() }.commit(db).await
}

pub async fn replace_all(db: &DbHandle, records: Vec<FolderRecord>) -> Result<(), StoreError> {
	IndexDelta { replace_folders: true, folder_upserts: records, ..Default::default() }
		.commit(db)
		.await
}

pub async fn delete_by_identity(db: &DbHandle, record: &FolderRecord) -> Result<(), StoreError> {
	IndexDelta { folder_deletes: vec![record.path()], ..Default::default() }
		.commit(db)
		.await
}

pub async fn delete_direct_children(db: &DbHandle, path: &str) -> Result<(), StoreError> {
	db.db
		.query("DELETE folder_record WHERE parent_path = $path")
		.bind(("path", path.to_string()))
		.await
		.map_err(|e| StoreError::Db(e.to_string()))?
		.check()
		.map_err(|e| StoreError::Db(e.to_string()))?;
	Ok(())
}

/// Remove the folders beneath `path`; the folder itself stays.
pub async fn delete_descendants(db: &DbHandle, path: &str) -> Result<(), StoreError> {
	db.db
		.query("DELETE folder_record WHERE parent_path = $path OR string::starts_with(parent_path, $prefix)")
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
		.query("DELETE folder_record")
		.await
		.map_err(|e| StoreError::Db(e.to_string()))?
		.check()
		.map_err(|e| StoreError::Db(e.to_string()))?;
	Ok(())
}
