use std::path::{Path, PathBuf};

use surrealdb::engine::local::{Db, Mem, SurrealKv};
use surrealdb::Surreal;

use crate::store::StoreError;

/// Wrapper around the SurrealDB handle.
/// Clone is cheap (Arc internally).
#[derive(Clone)]
pub struct DbHandle {
	pub db: Surreal<Db>,
}

/// Resolve the database file path inside the data directory.
pub fn db_path(data_dir: &Path) -> PathBuf {
	data_dir.join("albumsync.db")
}

/// Open (or create) the on-disk index and run migrations.
pub async fn init(data_dir: &Path) -> Result<DbHandle, StoreError> {
	std::fs::create_dir_all(data_dir).map_err(|e| StoreError::Db(format!("create {}: {e}", data_dir.display())))?;
	let db = Surreal::new::<SurrealKv>(db_path(data_dir))
		.await
		.map_err(|e| StoreError::Db(e.to_string()))?;
	open(db).await
}

/// Volatile index, used by tests and dry runs.
pub async fn init_memory() -> Result<DbHandle, StoreError> {
	let db = Surreal::new::<Mem>(()).await.map_err(|e| StoreError::Db(e.to_string()))?;
	open(db).await
}

async fn open(db: Surreal<Db>) -> Result<DbHandle, StoreError> {
	db.use_ns("albumsync")
		.use_db("index")
		.await
		.map_err(|e| StoreError::Db(e.to_string()))?;
	run_migrations(&db).await?;
	tracing::debug!("index schema ready");
	Ok(DbHandle { db })
}

/// Run schema migrations. DEFINE statements are idempotent.
async fn run_migrations(db: &Surreal<Db>) -> Result<(), StoreError> {
	db.query(SCHEMA_V1)
		.await
		.map_err(|e| StoreError::Db(e.to_string()))?
		.check()
		.map_err(|e| StoreError::Db(e.to_string()))?;
	Ok(())
}

const SCHEMA_V1: &str = "
    DEFINE TABLE OVERWRITE file_record SCHEMAFULL;
    DEFINE FIELD OVERWRITE path ON file_record TYPE string;
    DEFINE FIELD OVERWRITE parent_path ON file_record TYPE string;
    DEFINE FIELD OVERWRITE file_name ON file_record TYPE string;
    DEFINE FIELD OVERWRITE extension ON file_record TYPE string;
    DEFINE FIELD OVERWRITE external_id ON file_record TYPE int DEFAULT -1;
    DEFINE FIELD OVERWRITE taken_at ON file_record TYPE int DEFAULT 0;
    DEFINE FIELD OVERWRITE duration_ms ON file_record TYPE int DEFAULT 0;
    DEFINE FIELD OVERWRITE lat ON file_record TYPE float DEFAULT 0.0;
    DEFINE FIELD OVERWRITE lng ON file_record TYPE float DEFAULT 0.0;
    DEFINE FIELD OVERWRITE on_disk ON file_record TYPE bool DEFAULT true;
    DEFINE INDEX OVERWRITE idx_file_parent ON file_record FIELDS parent_path;

    DEFINE TABLE OVERWRITE folder_record SCHEMAFULL;
    DEFINE FIELD OVERWRITE path ON folder_record TYPE string;
    DEFINE FIELD OVERWRITE parent_path ON folder_record TYPE string;
    DEFINE FIELD OVERWRITE file_name ON folder_record TYPE string;
    DEFINE FIELD OVERWRITE last_modified ON folder_record TYPE int DEFAULT 0;
    DEFINE FIELD OVERWRITE thumbnail ON folder_record TYPE string DEFAULT '';
    DEFINE FIELD OVERWRITE folder_count ON folder_record TYPE int DEFAULT 0;
    DEFINE FIELD OVERWRITE file_count ON folder_record TYPE int DEFAULT 0;
    DEFINE FIELD OVERWRITE user_created ON folder_record TYPE bool DEFAULT false;
    DEFINE FIELD OVERWRITE starred ON folder_record TYPE bool DEFAULT false;
    DEFINE INDEX OVERWRITE idx_folder_parent ON folder_record FIELDS parent_path;

    DEFINE TABLE OVERWRITE action_record SCHEMAFULL;
    DEFINE FIELD OVERWRITE path ON action_record TYPE string;
    DEFINE FIELD OVERWRITE parent_path ON action_record TYPE string;
    DEFINE FIELD OVERWRITE file_name ON action_record TYPE string;
    DEFINE FIELD OVERWRITE extension ON action_record TYPE string;
    DEFINE FIELD OVERWRITE kind ON action_record TYPE string;
    DEFINE FIELD OVERWRITE created_at ON action_record TYPE int;
    DEFINE FIELD OVERWRITE external_id ON action_record TYPE int DEFAULT -1;
    DEFINE FIELD OVERWRITE taken_at ON action_record TYPE int DEFAULT 0;
    DEFINE FIELD OVERWRITE duration_ms ON action_record TYPE int DEFAULT 0;
    DEFINE FIELD OVERWRITE lat ON action_record TYPE float DEFAULT 0.0;
    DEFINE FIELD OVERWRITE lng ON action_record TYPE float DEFAULT 0.0;

    DEFINE TABLE OVERWRITE sync_state SCHEMAFULL;
    DEFINE FIELD OVERWRITE stamp ON sync_state TYPE int DEFAULT 0;
";
