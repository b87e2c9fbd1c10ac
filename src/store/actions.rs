//! Pending action log.
//!
//! Rows are keyed by the file path, so at most one intent is outstanding per
//! identity. The log is only drained by reconciliation.

use crate::{
	db::DbHandle,
	models::ActionRecord,
	store::{decode_rows, IndexDelta, StoreError},
};

const FIELDS: &str =
	"path, parent_path, file_name, extension, kind, created_at, external_id, taken_at, duration_ms, lat, lng";

pub async fn all(db: &DbHandle) -> Result<Vec<ActionRecord>, StoreError> {
	let sql = format!("SELECT {FIELDS} FROM action_record ORDER BY created_at ASC, path ASC");
	let mut response = db.db.query(&sql).await.map_err(|e| StoreError::Db(e.to_string()))?;

	let rows: Vec<serde_json::Value> = response
		.take(0)
		.map_err(|e| StoreError::Db(e.to_string()))?;

	decode_rows(rows)
}

pub async fn record(db: &DbHandle, actions: Vec<ActionRecord>) -> Result<(), StoreError> {
	IndexDelta { action_upserts: actions, ..Default::default() }.commit(db).await
}

pub async fn remove(db: &DbHandle, paths: Vec<String>) -> Result<(), StoreError> {
	IndexDelta { action_deletes: paths, ..Default::default() }.commit(db).await
}
