//! Synchronization engine.
//!
//! [`Engine`] owns the work queue and the rescan dispatcher. Mutations and
//! reconciliation passes go through the queue one at a time; reads go
//! straight to the store and see committed state only.

pub mod aggregate;
pub mod mutate;
mod queue;
pub mod reconcile;
pub mod rescan;


use std::sync::{
	atomic::{AtomicI64, Ordering},
	Arc,
};

use thiserror::Error;
use tokio::{sync::RwLock, task::JoinHandle};

use crate::{
	config::Preferences,
	db::DbHandle,
	indexer::{IndexerError, MediaIndexer},
	models::{FileRecord, FolderRecord, ItemOutcome, ListItem, SortKey, SortOrder},
	paths,
	store::{self, files, folders, StoreError},
};

pub use reconcile::{PassOutcome, ReconcileReport};
pub use rescan::{RescanPlan, RescanRequest};

use queue::{Command, WorkQueue};

#[derive(Debug, Error)]
pub enum EngineError {
	#[error(transparent)]
	Store(#[from] StoreError),

	#[error(transparent)]
	Indexer(#[from] IndexerError),

	#[error("filesystem error: {0}")]
	Io(#[from] std::io::Error),

	#[error("background task failed: {0}")]
	Join(String),

	#[error("engine worker is not running")]
	WorkerGone,
}

/// State shared by the worker, the rescan dispatcher and readers.
pub struct EngineContext {
	pub db: DbHandle,
	pub prefs: RwLock<Preferences>,
	pub indexer: Arc<dyn MediaIndexer>,
	pub rescans: rescan::RescanDispatcher,
	last_sync: AtomicI64,
}

impl EngineContext {
	pub fn last_sync(&self) -> i64 {
		self.last_sync.load(Ordering::SeqCst)
	}

	/// Advance the stamp to `max(now, previous + 1)` and persist it.
	pub async fn bump_last_sync(&self) -> i64 {
		let now = chrono::Utc::now().timestamp_millis();
		let previous = self
			.last_sync
			.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| Some(now.max(prev + 1)))
			.unwrap_or_else(|prev| prev);
		let stamp = now.max(previous + 1);
		if let Err(e) = store::set_last_sync(&self.db, stamp).await {
			tracing::warn!("failed to persist last sync stamp: {e}");
		}
		stamp
	}

	pub async fn preferences(&self) -> Preferences {
		self.prefs.read().await.clone()
	}
}

/// Run blocking filesystem work off the async worker.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, EngineError>
where
	F: FnOnce() -> T + Send + 'static,
	T: Send + 'static,
{
	tokio::task::spawn_blocking(f)
		.await
		.map_err(|e| EngineError::Join(e.to_string()))
}

pub struct Engine {
	ctx: Arc<EngineContext>,
	queue: WorkQueue,
	rescan_worker: JoinHandle<()>,
}

impl Engine {
	/// Open the engine over an initialized database. Does not run a pass.
	pub async fn start(db: DbHandle, prefs: Preferences, indexer: Arc<dyn MediaIndexer>) -> Result<Self, EngineError> {
		let stamp = store::last_sync(&db).await?;
		let (rescans, rescan_worker) = rescan::RescanDispatcher::start(indexer.clone());
		let ctx = Arc::new(EngineContext {
			db,
			prefs: RwLock::new(prefs),
			indexer,
			rescans,
			last_sync: AtomicI64::new(stamp),
		});
		let queue = WorkQueue::start(ctx.clone());
		tracing::info!(last_sync = stamp, "engine started");
		Ok(Engine { ctx, queue, rescan_worker })
	}

	pub fn context(&self) -> &Arc<EngineContext> {
		&self.ctx
	}

	// Queued operations

	/// Reconcile the index against the media indexer.
	pub async fn refresh(&self) -> Result<PassOutcome, EngineError> {
		self.queue.submit(|reply| Command::Refresh { reply }).await
	}

	/// Rebuild folder rollups without querying the indexer.
	pub async fn aggregate(&self) -> Result<usize, EngineError> {
		self.queue.submit(|reply| Command::Aggregate { reply }).await?
	}

	pub async fn create_folder(&self, path: &str, star: bool) -> Result<bool, EngineError> {
		let path = path.to_string();
		self.queue.submit(|reply| Command::CreateFolder { path, star, reply }).await?
	}

	pub async fn delete_items(&self, items: Vec<String>) -> Result<Vec<ItemOutcome>, EngineError> {
		self.queue.submit(|reply| Command::Delete { items, reply }).await
	}

	/// Move `items` into `destination`. With `new_name` set and a single item,
	/// this is a rename within `destination`.
	pub async fn move_or_rename(
		&self,
		items: Vec<String>,
		destination: &str,
		new_name: Option<String>,
	) -> Result<Vec<ItemOutcome>, EngineError> {
		let destination = destination.to_string();
		self.queue
			.submit(|reply| Command::MoveOrRename { items, destination, new_name, reply })
			.await
	}

	pub async fn star_items(&self, items: Vec<String>, starred: bool) -> Result<Vec<ItemOutcome>, EngineError> {
		self.queue.submit(|reply| Command::Star { items, starred, reply }).await
	}

	/// Register files written by another component.
	pub async fn add_files(&self, paths: Vec<String>) -> Result<Vec<ItemOutcome>, EngineError> {
		self.queue.submit(|reply| Command::AddFiles { paths, reply }).await
	}

	pub async fn set_preferences(&self, prefs: Preferences) -> Result<(), EngineError> {
		self.queue.submit(|reply| Command::SetPreferences { prefs, reply }).await
	}

	// Reads

	pub async fn preferences(&self) -> Preferences {
		self.ctx.preferences().await
	}

	pub fn last_sync_timestamp(&self) -> i64 {
		self.ctx.last_sync()
	}

	/// Folders then existing files directly inside `path`.
	///
	/// Empty folders are hidden unless `include_empty` is set or the user
	/// created them. `ALL_VIDEOS` lists every existing video.
	pub async fn list_children(&self, path: &str, include_empty: bool) -> Result<Vec<ListItem>, EngineError> {
		let db = &self.ctx.db;
		if path == paths::ALL_VIDEOS {
			let videos = files::get_all(db, files::FileFilter::Existing).await?;
			return Ok(videos.into_iter().filter(FileRecord::is_video).map(ListItem::File).collect());
		}

		let mut items: Vec<ListItem> = folders::get_children(db, path, false, None)
			.await?
			.into_iter()
			.filter(|f| include_empty || f.user_created || !f.is_empty())
			.map(ListItem::Folder)
			.collect();

		items.extend(
			files::get_children(db, path, false, None)
				.await?
				.into_iter()
				.filter(|f| f.exists)
				.map(ListItem::File),
		);
		Ok(items)
	}

	/// Every existing file in `order`.
	pub async fn list_all(&self, order: SortOrder) -> Result<Vec<ListItem>, EngineError> {
		let files = files::get_all(&self.ctx.db, files::FileFilter::Existing).await?;
		Ok(sort_listing(files, order))
	}

	pub async fn get_starred(&self) -> Result<Vec<FolderRecord>, EngineError> {
		Ok(folders::get_starred(&self.ctx.db).await?)
	}

	pub async fn get_user_created(&self) -> Result<Vec<FolderRecord>, EngineError> {
		Ok(folders::get_user_created(&self.ctx.db).await?)
	}

	/// Drain queued work, then stop both workers.
	pub async fn shutdown(self) {
		let Engine { ctx, queue, rescan_worker } = self;
		queue.close().await;
		// The dispatcher stops once the last context reference drops its sender.
		drop(ctx);
		if let Err(e) = rescan_worker.await {
			tracing::warn!("rescan worker ended abnormally: {e}");
		}
		tracing::info!("engine stopped");
	}
}

fn sort_listing(mut files: Vec<FileRecord>, order: SortOrder) -> Vec<ListItem> {
	files.sort_by(|a, b| {
		let primary = match order.key {
			SortKey::Name => {
				let (a, b) = (paths::file_name_of(&a.path()), paths::file_name_of(&b.path()));
				a.to_lowercase().cmp(&b.to_lowercase())
			}
			SortKey::Path => a.path().to_lowercase().cmp(&b.path().to_lowercase()),
			SortKey::TakenAt => a.taken_at.cmp(&b.taken_at),
			SortKey::Duration => a.duration_ms.cmp(&b.duration_ms),
		};
		let primary = if order.descending { primary.reverse() } else { primary };
		primary.then_with(|| a.path().cmp(&b.path()))
	});

	if !order.group_by_folder {
		return files.into_iter().map(ListItem::File).collect();
	}

	// Stable sort keeps the requested order inside each folder.
	files.sort_by(|a, b| a.parent_path.to_lowercase().cmp(&b.parent_path.to_lowercase()));
	let mut items = Vec::with_capacity(files.len());
	let mut current: Option<String> = None;
	for file in files {
		if current.as_deref() != Some(file.parent_path.as_str()) {
			current = Some(file.parent_path.clone());
			items.push(ListItem::Separator { title: paths::file_name_of(&file.parent_path) });
		}
		items.push(ListItem::File(file));
	}
	items
}

#[cfg(test)]
mod listing_tests {
	use super::*;

	fn file(path: &str, taken_at: i64, duration_ms: i64) -> FileRecord {
		FileRecord { taken_at, duration_ms, ..FileRecord::at(path) }
	}

	fn paths_of(items: &[ListItem]) -> Vec<String> {
		items.iter().map(|i| i.path().unwrap_or_else(|| "--".into())).collect()
	}

	#[test]
	fn sorts_by_requested_key() {
		let files = vec![
			file("/r/b/zeta.jpg", 10, 0),
			file("/r/a/Alpha.mp4", 30, 500),
			file("/r/a/beta.mp4", 20, 900),
		];

		let by_name = sort_listing(files.clone(), SortOrder { key: SortKey::Name, descending: false, group_by_folder: false });
		assert_eq!(paths_of(&by_name), vec!["/r/a/Alpha.mp4", "/r/a/beta.mp4", "/r/b/zeta.jpg"]);

		let newest = sort_listing(files.clone(), SortOrder::default());
		assert_eq!(paths_of(&newest), vec!["/r/a/Alpha.mp4", "/r/a/beta.mp4", "/r/b/zeta.jpg"]);

		let longest = sort_listing(files, SortOrder { key: SortKey::Duration, descending: true, group_by_folder: false });
		assert_eq!(paths_of(&longest)[0], "/r/a/beta.mp4");
	}

	#[test]
	fn grouping_inserts_separators() {
		let files = vec![file("/r/b/1.jpg", 3, 0), file("/r/a/2.jpg", 2, 0), file("/r/b/3.jpg", 1, 0)];
		let grouped = sort_listing(files, SortOrder { group_by_folder: true, ..Default::default() });

		assert_eq!(paths_of(&grouped), vec!["--", "/r/a/2.jpg", "--", "/r/b/1.jpg", "/r/b/3.jpg"]);
		assert_eq!(grouped[0], ListItem::Separator { title: "a".into() });
	}
}
