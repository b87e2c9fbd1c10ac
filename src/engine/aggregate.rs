//! Folder rollups: which folders exist in the index, their counts, thumbnail
//! and last-modified stamp.
//!
//! The folder table is rebuilt from the file table on every pass and swapped
//! in wholesale. Only `user_created` and `starred` carry over from the
//! previous build.

use std::{
	collections::{BTreeMap, BTreeSet, HashMap},
	fs,
	path::Path,
	time::SystemTime,
};

use crate::{
	config::Preferences,
	engine::{blocking, EngineContext, EngineError},
	models::{FileRecord, FolderRecord},
	paths::{self, ALL_VIDEOS},
	store::{files, folders},
};

/// Rebuild the folder table from the committed file table.
/// Returns the number of folders written.
pub async fn run(ctx: &EngineContext) -> Result<usize, EngineError> {
	let files = files::get_all(&ctx.db, files::FileFilter::All).await?;
	let built = plan(ctx, files).await?;
	let count = built.len();
	folders::replace_all(&ctx.db, built).await?;
	tracing::info!(folders = count, "folder aggregation complete");
	Ok(count)
}

/// Compute the folder set for `files` without writing it.
pub async fn plan(ctx: &EngineContext, files: Vec<FileRecord>) -> Result<Vec<FolderRecord>, EngineError> {
	let previous = folders::get_all(&ctx.db).await?;
	let prefs = ctx.preferences().await;
	blocking(move || build_folders(&files, &previous, &prefs)).await
}

/// Full folder build. Touches the disk for mtimes, existence checks and, with
/// `show_empty_folders`, directory listings.
pub fn build_folders(files: &[FileRecord], previous: &[FolderRecord], prefs: &Preferences) -> Vec<FolderRecord> {
	let previous: HashMap<String, &FolderRecord> = previous.iter().map(|f| (f.path(), f)).collect();

	let mut existing: Vec<&FileRecord> = files.iter().filter(|f| f.exists).collect();
	existing.sort_by(|a, b| b.taken_at.cmp(&a.taken_at).then_with(|| a.path().cmp(&b.path())));

	let mut set: BTreeMap<String, FolderRecord> = BTreeMap::new();
	for leaf in leaves(&existing, &previous, prefs) {
		insert_with_ancestors(&mut set, &leaf, &prefs.managed_roots, &previous);
	}

	if prefs.show_empty_folders {
		surface_empty_subfolders(&mut set, &previous, prefs);
	}

	let has_video = existing.iter().any(|f| f.is_video());
	if prefs.show_all_videos_folder && has_video {
		let mut all_videos = FolderRecord::at(ALL_VIDEOS);
		match previous.get(ALL_VIDEOS) {
			Some(prev) => {
				all_videos.starred = prev.starred;
				all_videos.user_created = prev.user_created;
			}
			None => all_videos.starred = true,
		}
		set.insert(ALL_VIDEOS.to_string(), all_videos);
	}

	assign_thumbnails(&mut set, &existing);
	if prefs.show_empty_folders {
		count_on_disk(&mut set, &existing, prefs);
	} else {
		count_indexed(&mut set, &existing);
	}

	set.into_values().collect()
}

fn leaves(existing: &[&FileRecord], previous: &HashMap<String, &FolderRecord>, prefs: &Preferences) -> BTreeSet<String> {
	let mut leaves: BTreeSet<String> = existing.iter().map(|f| f.parent_path.clone()).collect();

	for (path, folder) in previous {
		if (folder.user_created || folder.starred) && !folder.is_all_videos() && Path::new(path).is_dir() {
			leaves.insert(path.clone());
		}
	}
	for included in &prefs.included_paths {
		if Path::new(included).is_dir() {
			leaves.insert(included.clone());
		}
	}
	leaves.retain(|p| !p.is_empty());
	leaves
}

/// Add `leaf` and every folder between it and its managed root.
fn insert_with_ancestors(
	set: &mut BTreeMap<String, FolderRecord>,
	leaf: &str,
	roots: &[String],
	previous: &HashMap<String, &FolderRecord>,
) {
	insert_folder(set, leaf, previous);
	let Some(root) = paths::root_of(leaf, roots) else {
		return;
	};

	let mut current = leaf.to_string();
	while !paths::path_equals(&current, root) {
		current = paths::parent_of(&current);
		if current.is_empty() || set.contains_key(&current) {
			break;
		}
		insert_folder(set, &current, previous);
	}
}

fn insert_folder(set: &mut BTreeMap<String, FolderRecord>, path: &str, previous: &HashMap<String, &FolderRecord>) {
	if set.contains_key(path) {
		return;
	}
	let mut folder = FolderRecord::at(path);
	folder.last_modified = modified_millis(path);
	if let Some(prev) = previous.get(path) {
		folder.user_created = prev.user_created;
		folder.starred = prev.starred;
	}
	set.insert(path.to_string(), folder);
}

/// One level of real, visible subdirectories that hold no indexed media.
fn surface_empty_subfolders(set: &mut BTreeMap<String, FolderRecord>, previous: &HashMap<String, &FolderRecord>, prefs: &Preferences) {
	let known: Vec<String> = set.keys().cloned().collect();
	for path in known {
		for dir in visible_subdirs(&path, prefs) {
			insert_folder(set, &dir, previous);
		}
	}
}

fn visible_subdirs(path: &str, prefs: &Preferences) -> Vec<String> {
	let Ok(entries) = fs::read_dir(path) else {
		return Vec::new();
	};
	entries
		.flatten()
		.filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
		.map(|e| paths::join(path, &e.file_name().to_string_lossy()))
		.filter(|p| !paths::is_hidden(p) && !paths::is_excluded(p, &prefs.excluded_paths))
		.collect()
}

/// Deepest folders first. A folder takes its newest direct file; failing
/// that, the thumbnail of the first already-processed descendant that has one.
fn assign_thumbnails(set: &mut BTreeMap<String, FolderRecord>, existing: &[&FileRecord]) {
	let mut newest: HashMap<&str, &FileRecord> = HashMap::new();
	for file in existing {
		newest.entry(file.parent_path.as_str()).or_insert(*file);
	}
	let newest_video = existing.iter().find(|f| f.is_video());

	let mut order: Vec<String> = set.keys().cloned().collect();
	order.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

	let mut processed: Vec<(String, String)> = Vec::with_capacity(order.len());
	for path in order {
		let Some(folder) = set.get_mut(&path) else {
			continue;
		};

		let source = if folder.is_all_videos() { newest_video.copied() } else { newest.get(path.as_str()).copied() };
		if let Some(file) = source {
			folder.thumbnail = file.path();
			folder.last_modified = folder.last_modified.max(file.taken_at);
		} else if let Some((_, thumb)) = processed
			.iter()
			.find(|(p, thumb)| !thumb.is_empty() && paths::is_parent_of(&path, p))
		{
			folder.thumbnail = thumb.clone();
		}
		processed.push((path, folder.thumbnail.clone()));
	}
}

fn count_indexed(set: &mut BTreeMap<String, FolderRecord>, existing: &[&FileRecord]) {
	let mut files_per_parent: HashMap<&str, i64> = HashMap::new();
	for file in existing {
		*files_per_parent.entry(file.parent_path.as_str()).or_default() += 1;
	}
	let videos = existing.iter().filter(|f| f.is_video()).count() as i64;

	let mut folders_per_parent: HashMap<String, i64> = HashMap::new();
	for folder in set.values().filter(|f| !f.is_all_videos()) {
		*folders_per_parent.entry(folder.parent_path.clone()).or_default() += 1;
	}

	for (path, folder) in set.iter_mut() {
		if folder.is_all_videos() {
			folder.folder_count = 0;
			folder.file_count = videos;
			continue;
		}
		folder.folder_count = folders_per_parent.get(path).copied().unwrap_or(0);
		folder.file_count = files_per_parent.get(path.as_str()).copied().unwrap_or(0);
	}
}

fn count_on_disk(set: &mut BTreeMap<String, FolderRecord>, existing: &[&FileRecord], prefs: &Preferences) {
	let videos = existing.iter().filter(|f| f.is_video()).count() as i64;
	for (path, folder) in set.iter_mut() {
		if folder.is_all_videos() {
			folder.folder_count = 0;
			folder.file_count = videos;
			continue;
		}
		folder.folder_count = visible_subdirs(path, prefs).len() as i64;
		folder.file_count = media_files_on_disk(path);
	}
}

fn media_files_on_disk(path: &str) -> i64 {
	let Ok(entries) = fs::read_dir(path) else {
		return 0;
	};
	entries
		.flatten()
		.filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
		.filter(|e| paths::is_media(&e.file_name().to_string_lossy()))
		.count() as i64
}

fn modified_millis(path: &str) -> i64 {
	fs::metadata(path)
		.and_then(|m| m.modified())
		.ok()
		.and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
		.map(|d| d.as_millis() as i64)
		.unwrap_or(0)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn prefs(root: &str) -> Preferences {
		Preferences { managed_roots: vec![root.to_string()], ..Default::default() }
	}

	fn file(path: &str, taken_at: i64) -> FileRecord {
		FileRecord { taken_at, ..FileRecord::at(path) }
	}

	fn by_path(folders: Vec<FolderRecord>) -> HashMap<String, FolderRecord> {
		folders.into_iter().map(|f| (f.path(), f)).collect()
	}

	#[test]
	fn walks_up_to_root_and_counts() {
		let files = vec![
			file("/r/a/1.jpg", 1),
			file("/r/a/2.jpg", 2),
			file("/r/a/3.jpg", 3),
			file("/r/a/x/4.jpg", 4),
			file("/r/a/y/z/5.jpg", 5),
		];
		let built = by_path(build_folders(&files, &[], &prefs("/r")));

		let a = &built["/r/a"];
		assert_eq!((a.folder_count, a.file_count), (2, 3));
		assert!(built.contains_key("/r"));
		assert!(built.contains_key("/r/a/y"));
		assert_eq!(built["/r"].folder_count, 1);
		assert!(!built.contains_key("/"));
	}

	#[test]
	fn missing_files_do_not_make_folders() {
		let mut gone = file("/r/gone/1.jpg", 1);
		gone.exists = false;
		let built = by_path(build_folders(&[gone], &[], &prefs("/r")));
		assert!(built.is_empty());
	}

	#[test]
	fn thumbnail_propagates_to_empty_ancestors() {
		let files = vec![file("/r/a/b/c/deep.jpg", 10), file("/r/a/b/c/older.jpg", 5)];
		let built = by_path(build_folders(&files, &[], &prefs("/r")));

		assert_eq!(built["/r/a/b/c"].thumbnail, "/r/a/b/c/deep.jpg");
		assert_eq!(built["/r/a/b/c"].last_modified, 10);
		assert_eq!(built["/r/a/b"].thumbnail, "/r/a/b/c/deep.jpg");
		assert_eq!(built["/r"].thumbnail, "/r/a/b/c/deep.jpg");
	}

	#[test]
	fn shared_prefix_sibling_gives_no_thumbnail() {
		let tmp = tempfile::tempdir().unwrap();
		let root = tmp.path().to_string_lossy().to_string();
		let foo = paths::join(&root, "Foo");
		fs::create_dir_all(&foo).unwrap();
		let starred = FolderRecord { starred: true, ..FolderRecord::at(&foo) };
		let files = vec![file(&paths::join(&root, "Foobar/x/1.jpg"), 1)];

		let built = by_path(build_folders(&files, &[starred], &prefs(&root)));
		assert_eq!(built[&paths::join(&root, "Foobar")].thumbnail, paths::join(&root, "Foobar/x/1.jpg"));
		assert_eq!(built[&foo].thumbnail, "");
	}

	#[test]
	fn all_videos_folder_starred_once() {
		let files = vec![file("/r/a/clip.mp4", 7), file("/r/a/pic.jpg", 9)];
		let built = by_path(build_folders(&files, &[], &prefs("/r")));
		let videos = &built[ALL_VIDEOS];
		assert!(videos.starred);
		assert_eq!(videos.thumbnail, "/r/a/clip.mp4");
		assert_eq!(videos.file_count, 1);
		assert_eq!(built["/r/a"].folder_count, 0);

		let mut unstarred = videos.clone();
		unstarred.starred = false;
		let rebuilt = by_path(build_folders(&files, &[unstarred], &prefs("/r")));
		assert!(!rebuilt[ALL_VIDEOS].starred);

		let hidden = Preferences { show_all_videos_folder: false, ..prefs("/r") };
		assert!(!by_path(build_folders(&files, &[], &hidden)).contains_key(ALL_VIDEOS));
	}

	#[test]
	fn flags_survive_for_folders_on_disk() {
		let tmp = tempfile::tempdir().unwrap();
		let root = tmp.path().to_string_lossy().to_string();
		let album = paths::join(&root, "Trips/Album");
		fs::create_dir_all(&album).unwrap();

		let mut previous = FolderRecord::at(&album);
		previous.user_created = true;
		previous.starred = true;
		let vanished = FolderRecord { starred: true, ..FolderRecord::at(&paths::join(&root, "Gone")) };

		let built = by_path(build_folders(&[], &[previous, vanished], &prefs(&root)));
		assert!(built[&album].user_created);
		assert!(built[&album].starred);
		assert!(built.contains_key(&paths::join(&root, "Trips")));
		assert!(!built.contains_key(&paths::join(&root, "Gone")));
	}

	#[test]
	fn included_paths_become_leaves() {
		let tmp = tempfile::tempdir().unwrap();
		let root = tmp.path().to_string_lossy().to_string();
		let scans = paths::join(&root, "Archive/Scans");
		fs::create_dir_all(&scans).unwrap();
		let missing = paths::join(&root, "Archive/Missing");
		let prefs = Preferences { included_paths: vec![scans.clone(), missing.clone()], ..prefs(&root) };

		let built = by_path(build_folders(&[], &[], &prefs));
		assert!(built[&scans].is_empty());
		assert!(built.contains_key(&paths::join(&root, "Archive")));
		assert!(built.contains_key(&root));
		assert!(!built.contains_key(&missing));
		assert_eq!(built.len(), 3);
	}

	#[test]
	fn show_empty_surfaces_real_subdirs() {
		let tmp = tempfile::tempdir().unwrap();
		let root = tmp.path().to_string_lossy().to_string();
		fs::create_dir_all(tmp.path().join("Photos")).unwrap();
		fs::create_dir_all(tmp.path().join("Empty")).unwrap();
		fs::create_dir_all(tmp.path().join(".hidden")).unwrap();
		fs::write(tmp.path().join("Photos/a.jpg"), "a").unwrap();
		fs::write(tmp.path().join("Photos/notes.txt"), "n").unwrap();
		let files = vec![file(&paths::join(&root, "Photos/a.jpg"), 1)];

		let fast = by_path(build_folders(&files, &[], &prefs(&root)));
		assert!(!fast.contains_key(&paths::join(&root, "Empty")));

		let slow_prefs = Preferences { show_empty_folders: true, ..prefs(&root) };
		let slow = by_path(build_folders(&files, &[], &slow_prefs));
		let empty = &slow[&paths::join(&root, "Empty")];
		assert!(empty.is_empty());
		assert!(!slow.contains_key(&paths::join(&root, ".hidden")));
		assert_eq!(slow[&root].folder_count, 2);
		assert_eq!(slow[&paths::join(&root, "Photos")].file_count, 1);
	}
}
