use std::{path::Path, time::SystemTime};

use walkdir::WalkDir;

use crate::{
	indexer::{IndexedMedia, IndexerError, MediaIndexer, RescanKind},
	paths::{self, MediaKind},
};

/// Indexer that answers every query with a fresh walk of the roots.
///
/// Used where no system media indexer exists. Rescan hints are only logged,
/// since the next query walks the disk anyway.
#[derive(Debug, Default, Clone)]
pub struct LocalIndexer {
	pub skip_hidden: bool,
}

impl LocalIndexer {
	pub fn new() -> Self {
		LocalIndexer { skip_hidden: true }
	}
}

impl MediaIndexer for LocalIndexer {
	fn query(&self, roots: &[String], kinds: &[MediaKind]) -> Result<Vec<IndexedMedia>, IndexerError> {
		let mut found = Vec::new();
		for root in roots {
			found.extend(walk_root(root, kinds, self.skip_hidden)?);
		}
		Ok(found)
	}

	fn request_rescan(&self, path: &str, kind: RescanKind) {
		tracing::debug!(path, ?kind, "rescan hint");
	}
}

fn walk_root(root: &str, kinds: &[MediaKind], skip_hidden: bool) -> Result<Vec<IndexedMedia>, IndexerError> {
	let root_path = Path::new(root);
	if !root_path.is_dir() {
		return Err(IndexerError::RootUnavailable(root.to_string()));
	}

	let mut entries = Vec::new();
	let mut skipped = 0u64;

	let walker = WalkDir::new(root_path)
		.follow_links(false)
		.into_iter()
		.filter_entry(|e| !(skip_hidden && e.depth() > 0 && e.file_name().to_string_lossy().starts_with('.')));

	for result in walker {
		let entry = match result {
			Ok(e) => e,
			Err(e) if e.depth() == 0 => return Err(IndexerError::QueryFailed(format!("{root}: {e}"))),
			Err(_) => {
				skipped += 1;
				continue;
			}
		};

		if !entry.file_type().is_file() {
			continue;
		}

		let path = entry.path().to_string_lossy().to_string();
		if !kinds.contains(&paths::classify_path(&path)) {
			continue;
		}

		let taken_at = entry
			.metadata()
			.ok()
			.and_then(|m| m.modified().ok())
			.map(millis_since_epoch)
			.unwrap_or(0);

		entries.push(IndexedMedia {
			external_id: external_id_for(&path),
			path,
			taken_at,
			lat: 0.0,
			lng: 0.0,
			duration_ms: 0,
		});
	}

	if skipped > 0 {
		tracing::warn!(root, skipped, "unreadable entries skipped while indexing");
	}

	Ok(entries)
}

/// Stable positive id derived from the path.
pub fn external_id_for(path: &str) -> i64 {
	let hash = blake3::hash(path.as_bytes());
	let mut bytes = [0u8; 8];
	bytes.copy_from_slice(&hash.as_bytes()[..8]);
	(u64::from_le_bytes(bytes) >> 1) as i64
}

fn millis_since_epoch(time: SystemTime) -> i64 {
	time.duration_since(SystemTime::UNIX_EPOCH)
		.map(|d| d.as_millis() as i64)
		.unwrap_or(0)
}

#[cfg(test)]
mod tests {
	use std::fs;

	use super::*;

	fn setup_tree(dir: &Path) {
		fs::create_dir_all(dir.join("DCIM/Camera")).unwrap();
		fs::create_dir_all(dir.join(".thumbnails")).unwrap();
		fs::write(dir.join("DCIM/Camera/a.jpg"), "a").unwrap();
		fs::write(dir.join("DCIM/Camera/b.mp4"), "b").unwrap();
		fs::write(dir.join("DCIM/notes.txt"), "n").unwrap();
		fs::write(dir.join(".thumbnails/t.jpg"), "t").unwrap();
	}

	#[test]
	fn finds_media_of_requested_kinds() {
		let tmp = tempfile::tempdir().unwrap();
		setup_tree(tmp.path());
		let root = tmp.path().to_string_lossy().to_string();

		let indexer = LocalIndexer::new();
		let all = indexer.query(&[root.clone()], &[MediaKind::Image, MediaKind::Video]).unwrap();
		let mut names: Vec<String> = all.iter().map(|m| paths::file_name_of(&m.path)).collect();
		names.sort();
		assert_eq!(names, vec!["a.jpg", "b.mp4"]);

		let videos = indexer.query(&[root], &[MediaKind::Video]).unwrap();
		assert_eq!(videos.len(), 1);
		assert!(videos[0].taken_at > 0);
	}

	#[test]
	fn hidden_folders_included_on_request() {
		let tmp = tempfile::tempdir().unwrap();
		setup_tree(tmp.path());
		let root = tmp.path().to_string_lossy().to_string();

		let indexer = LocalIndexer { skip_hidden: false };
		let all = indexer.query(&[root], &[MediaKind::Image]).unwrap();
		assert_eq!(all.len(), 2);
	}

	#[test]
	fn missing_root_errors() {
		let err = LocalIndexer::new()
			.query(&["/tmp/albumsync_definitely_not_real".to_string()], &[MediaKind::Image])
			.unwrap_err();
		assert!(matches!(err, IndexerError::RootUnavailable(_)));
	}

	#[test]
	fn ids_are_stable_and_positive() {
		let a = external_id_for("/root/a.jpg");
		assert_eq!(a, external_id_for("/root/a.jpg"));
		assert!(a >= 0);
		assert_ne!(a, external_id_for("/root/b.jpg"));
	}
}
