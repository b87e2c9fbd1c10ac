//! User-initiated changes: create, delete, move, rename, star and add.
//!
//! Every batch call returns one [`ItemOutcome`] per input, in order. A failed
//! item never stops the rest. Each successful item commits its own
//! [`IndexDelta`] and records an ADD or DELETE intent for every file it
//! touches, which the next reconciliation pass confirms or resolves.

use std::{fs, io, path::Path, time::SystemTime};

use thiserror::Error;

use crate::{
	config::Preferences,
	engine::{aggregate, blocking, rescan::RescanPlan, EngineContext, EngineError},
	indexer::RescanKind,
	models::{ActionKind, ActionRecord, FileRecord, FolderRecord, ItemOutcome, MutationStatus},
	paths,
	store::{files, folders, IndexDelta, StoreError},
};

#[derive(Debug, Error)]
enum ItemError {
	#[error("refused: {0:?}")]
	Refused(MutationStatus),

	#[error(transparent)]
	Engine(#[from] EngineError),
}

impl From<StoreError> for ItemError {
	fn from(e: StoreError) -> Self {
		ItemError::Engine(e.into())
	}
}

impl From<io::Error> for ItemError {
	fn from(e: io::Error) -> Self {
		ItemError::Engine(e.into())
	}
}

type ItemResult = Result<RescanPlan, ItemError>;

/// Collects per-item results and the rescans of the successful ones.
#[derive(Default)]
struct Batch {
	outcomes: Vec<ItemOutcome>,
	rescans: RescanPlan,
	needs_aggregation: bool,
}

impl Batch {
	fn record(&mut self, operation: &str, path: String, result: ItemResult) {
		let status = match result {
			Ok(rescans) => {
				self.rescans.extend(rescans);
				MutationStatus::Ok
			}
			Err(ItemError::Refused(status)) => {
				tracing::debug!(operation, path = %path, ?status, "item refused");
				status
			}
			Err(ItemError::Engine(e)) => {
				tracing::warn!(operation, path = %path, "item failed: {e}");
				MutationStatus::Failed
			}
		};
		self.outcomes.push(ItemOutcome::new(path, status));
	}

	fn any_ok(&self) -> bool {
		self.outcomes.iter().any(ItemOutcome::is_ok)
	}

	/// Re-aggregate, hand off rescans and bump the stamp if anything changed.
	async fn finish(self, ctx: &EngineContext) -> Vec<ItemOutcome> {
		if !self.any_ok() {
			return self.outcomes;
		}
		if self.needs_aggregation {
			if let Err(e) = aggregate::run(ctx).await {
				tracing::warn!("folder aggregation after mutation failed: {e}");
			}
		}
		ctx.rescans.send(self.rescans);
		ctx.bump_last_sync().await;
		self.outcomes
	}
}

fn now_millis() -> i64 {
	chrono::Utc::now().timestamp_millis()
}

/// `Some(is_dir)` for an existing path, `None` if nothing is there.
async fn path_kind(path: &str) -> Result<Option<bool>, EngineError> {
	let target = path.to_string();
	let metadata = blocking(move || fs::symlink_metadata(&target)).await?;
	match metadata {
		Ok(m) => Ok(Some(m.is_dir())),
		Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
		Err(e) => Err(e.into()),
	}
}

/// Make a new folder and index it immediately. Returns false if `path` is
/// relative, already exists, has no parent, or cannot be created.
pub async fn create_folder(ctx: &EngineContext, path: &str, star: bool) -> Result<bool, EngineError> {
	let (parent, name) = paths::split_folder(path);
	if !Path::new(path).is_absolute() || parent.is_empty() || name.is_empty() || parent == paths::ALL_VIDEOS {
		tracing::debug!(path, "create_folder: not an absolute folder path");
		return Ok(false);
	}
	if path_kind(path).await?.is_some() {
		tracing::debug!(path, "create_folder: already exists");
		return Ok(false);
	}

	let target = path.to_string();
	if let Err(e) = blocking(move || fs::create_dir_all(&target)).await? {
		tracing::warn!(path, "create_folder failed: {e}");
		return Ok(false);
	}

	let prefs = ctx.preferences().await;
	let mut folder = FolderRecord::at(path);
	folder.user_created = true;
	folder.starred = star || prefs.auto_star_created_folder;
	folder.last_modified = now_millis();

	let starred = folder.starred;
	let mut upserts = vec![folder];
	if let Some(mut parent_folder) = folders::get(&ctx.db, &parent).await? {
		parent_folder.folder_count += 1;
		upserts.push(parent_folder);
	}
	IndexDelta { folder_upserts: upserts, ..Default::default() }.commit(&ctx.db).await?;

	let mut rescans = RescanPlan::default();
	rescans.push(path, RescanKind::FolderAddThis);
	ctx.rescans.send(rescans);
	ctx.bump_last_sync().await;

	tracing::info!(path, starred, "folder created");
	Ok(true)
}

pub async fn delete_items(ctx: &EngineContext, items: Vec<String>) -> Vec<ItemOutcome> {
	let prefs = ctx.preferences().await;
	let mut batch = Batch { needs_aggregation: true, ..Default::default() };
	for path in items {
		let result = delete_one(ctx, &prefs, &path).await;
		batch.record("delete", path, result);
	}
	batch.finish(ctx).await
}

async fn delete_one(ctx: &EngineContext, prefs: &Preferences, path: &str) -> ItemResult {
	if paths::is_protected(path, &prefs.managed_roots) {
		return Err(ItemError::Refused(MutationStatus::SystemFolderNotAllowed));
	}

	match path_kind(path).await? {
		Some(true) => delete_folder(ctx, path, true).await,
		Some(false) => delete_file(ctx, path, true).await,
		// Gone from disk already; settle the index if it still knows the path.
		None => {
			if folders::get(&ctx.db, path).await?.is_some() {
				delete_folder(ctx, path, false).await
			} else if files::get(&ctx.db, path).await?.is_some() {
				delete_file(ctx, path, false).await
			} else {
				Err(io::Error::new(io::ErrorKind::NotFound, format!("{path} not found")).into())
			}
		}
	}
}

async fn delete_file(ctx: &EngineContext, path: &str, on_disk: bool) -> ItemResult {
	if on_disk {
		let target = path.to_string();
		blocking(move || fs::remove_file(&target)).await??;
	}

	let mut rescans = RescanPlan::default();
	if !paths::is_media(path) {
		return Ok(rescans);
	}

	let mut record = files::get(&ctx.db, path).await?.unwrap_or_else(|| FileRecord::at(path));
	record.exists = false;
	let action = ActionRecord::from_file(&record, ActionKind::Delete, now_millis());
	IndexDelta { file_upserts: vec![record], action_upserts: vec![action], ..Default::default() }
		.commit(&ctx.db)
		.await?;

	rescans.push(path, RescanKind::FileDelete);
	Ok(rescans)
}

/// Drop the folder subtree from the index and mark its files absent. One
/// coarse rescan covers the whole subtree.
async fn delete_folder(ctx: &EngineContext, path: &str, on_disk: bool) -> ItemResult {
	let descendants = files::get_children(&ctx.db, path, true, None).await?;
	let mut folder_deletes: Vec<String> = folders::get_children(&ctx.db, path, true, None)
		.await?
		.iter()
		.map(FolderRecord::path)
		.collect();
	folder_deletes.push(path.to_string());

	if on_disk {
		let target = path.to_string();
		blocking(move || fs::remove_dir_all(&target)).await??;
	}

	let created_at = now_millis();
	let action_upserts = descendants
		.iter()
		.map(|f| ActionRecord::from_file(f, ActionKind::Delete, created_at))
		.collect();
	let files_absent = descendants.iter().map(FileRecord::path).collect();

	IndexDelta { files_absent, folder_deletes, action_upserts, ..Default::default() }
		.commit(&ctx.db)
		.await?;

	tracing::info!(path, files = descendants.len(), "folder deleted");
	let mut rescans = RescanPlan::default();
	rescans.push(path, RescanKind::FolderDelete);
	Ok(rescans)
}

/// Move each item into `destination`. `new_name` renames the item on the way
/// and only applies to single-item batches.
pub async fn move_or_rename(
	ctx: &EngineContext,
	items: Vec<String>,
	destination: &str,
	new_name: Option<String>,
) -> Vec<ItemOutcome> {
	let prefs = ctx.preferences().await;
	let rename = if items.len() == 1 { new_name.filter(|n| !n.is_empty()) } else { None };
	let mut batch = Batch { needs_aggregation: true, ..Default::default() };
	for path in items {
		let name = rename.clone().unwrap_or_else(|| paths::file_name_of(&path));
		let target = paths::join(destination, &name);
		let result = move_one(ctx, &prefs, &path, destination, &target).await;
		batch.record("move", path, result);
	}
	batch.finish(ctx).await
}

async fn move_one(ctx: &EngineContext, prefs: &Preferences, source: &str, destination: &str, target: &str) -> ItemResult {
	if paths::is_protected(source, &prefs.managed_roots) {
		return Err(ItemError::Refused(MutationStatus::SystemFolderNotAllowed));
	}

	let Some(is_dir) = path_kind(source).await? else {
		return Err(io::Error::new(io::ErrorKind::NotFound, format!("{source} not found")).into());
	};
	if is_dir && (paths::path_equals(destination, source) || paths::is_parent_of(source, destination)) {
		return Err(ItemError::Refused(MutationStatus::MoveIntoSelf));
	}
	if path_kind(target).await?.is_some() {
		return Err(ItemError::Refused(MutationStatus::FileCollision));
	}

	let (from, to) = (source.to_string(), target.to_string());
	blocking(move || fs::rename(&from, &to)).await??;

	if is_dir {
		move_folder_index(ctx, source, target).await
	} else {
		move_file_index(ctx, source, target).await
	}
}

async fn move_file_index(ctx: &EngineContext, source: &str, target: &str) -> ItemResult {
	let mut rescans = RescanPlan::default();
	if !paths::is_media(source) && !paths::is_media(target) {
		return Ok(rescans);
	}

	let old = files::get(&ctx.db, source).await?.unwrap_or_else(|| FileRecord::at(source));
	let moved = FileRecord { exists: true, ..old.relocated(target) };
	let created_at = now_millis();

	IndexDelta {
		file_deletes: vec![source.to_string()],
		file_upserts: vec![moved.clone()],
		action_upserts: vec![
			ActionRecord::from_file(&old, ActionKind::Delete, created_at),
			ActionRecord::from_file(&moved, ActionKind::Add, created_at),
		],
		..Default::default()
	}
	.commit(&ctx.db)
	.await?;

	rescans.push(source, RescanKind::FileDelete);
	rescans.push(target, RescanKind::FileAdd);
	Ok(rescans)
}

/// Rewrite every indexed path under `source` to live under `target`, keeping
/// folder flags, in one transaction.
async fn move_folder_index(ctx: &EngineContext, source: &str, target: &str) -> ItemResult {
	let files = files::get_children(&ctx.db, source, true, None).await?;
	let mut folder_records = folders::get_children(&ctx.db, source, true, None).await?;
	if let Some(root) = folders::get(&ctx.db, source).await? {
		folder_records.push(root);
	}

	let created_at = now_millis();
	let mut delta = IndexDelta::default();
	for old in &files {
		let moved = old.relocated(&paths::rebase(&old.path(), source, target));
		delta.file_deletes.push(old.path());
		delta.action_upserts.push(ActionRecord::from_file(old, ActionKind::Delete, created_at));
		delta.action_upserts.push(ActionRecord::from_file(&moved, ActionKind::Add, created_at));
		delta.file_upserts.push(moved);
	}
	for old in &folder_records {
		delta.folder_deletes.push(old.path());
		delta.folder_upserts.push(old.relocated(&paths::rebase(&old.path(), source, target)));
	}
	delta.commit(&ctx.db).await?;

	tracing::info!(from = source, to = target, files = files.len(), folders = folder_records.len(), "folder moved");
	let mut rescans = RescanPlan::default();
	rescans.push(source, RescanKind::FolderDelete);
	rescans.push(target, RescanKind::FolderAddAll);
	Ok(rescans)
}

pub async fn star_items(ctx: &EngineContext, items: Vec<String>, starred: bool) -> Vec<ItemOutcome> {
	let mut batch = Batch { needs_aggregation: true, ..Default::default() };
	for path in items {
		let result = star_one(ctx, &path, starred).await;
		batch.record("star", path, result);
	}
	batch.finish(ctx).await
}

async fn star_one(ctx: &EngineContext, path: &str, starred: bool) -> ItemResult {
	let Some(mut folder) = folders::get(&ctx.db, path).await? else {
		return Err(io::Error::new(io::ErrorKind::NotFound, format!("{path} is not an indexed folder")).into());
	};
	folder.starred = starred;
	folders::upsert(&ctx.db, vec![folder]).await?;
	Ok(RescanPlan::default())
}

/// Index files another component just wrote. When the parent folder is
/// already indexed its counts are adjusted in place; otherwise the folder
/// set is rebuilt.
pub async fn add_files(ctx: &EngineContext, paths: Vec<String>) -> Vec<ItemOutcome> {
	let mut batch = Batch::default();
	for path in paths {
		let result = add_one(ctx, &path, &mut batch.needs_aggregation).await;
		batch.record("add", path, result);
	}
	batch.finish(ctx).await
}

async fn add_one(ctx: &EngineContext, path: &str, needs_aggregation: &mut bool) -> ItemResult {
	if !paths::is_media(path) {
		return Err(io::Error::new(io::ErrorKind::InvalidInput, format!("{path} is not a media file")).into());
	}
	let target = path.to_string();
	let modified = blocking(move || fs::metadata(&target).and_then(|m| m.modified())).await??;

	let previous = files::get(&ctx.db, path).await?;
	let was_counted = previous.as_ref().map(|f| f.exists).unwrap_or(false);
	let mut record = previous.unwrap_or_else(|| FileRecord::at(path));
	record.exists = true;
	if record.taken_at == 0 {
		record.taken_at = system_millis(modified);
	}

	let mut delta = IndexDelta {
		file_upserts: vec![record.clone()],
		action_upserts: vec![ActionRecord::from_file(&record, ActionKind::Add, now_millis())],
		..Default::default()
	};

	match folders::get(&ctx.db, &record.parent_path).await? {
		Some(mut parent) => {
			if !was_counted {
				parent.file_count += 1;
			}
			if record.taken_at >= parent.last_modified || parent.thumbnail.is_empty() {
				parent.thumbnail = record.path();
				parent.last_modified = parent.last_modified.max(record.taken_at);
			}
			delta.folder_upserts.push(parent);
		}
		None => *needs_aggregation = true,
	}
	delta.commit(&ctx.db).await?;

	let mut rescans = RescanPlan::default();
	rescans.push(path, RescanKind::FileAdd);
	Ok(rescans)
}

fn system_millis(time: SystemTime) -> i64 {
	time.duration_since(SystemTime::UNIX_EPOCH)
		.map(|d| d.as_millis() as i64)
		.unwrap_or(0)
}
