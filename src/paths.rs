//! Path model shared by the store and the engine.
//!
//! Paths are plain `/`-separated strings, the same form the media indexer
//! reports. Nothing here touches the filesystem.

use serde::{Deserialize, Serialize};

pub const SEPARATOR: char = '/';

/// Key of the virtual folder that collects every video regardless of location.
pub const ALL_VIDEOS: &str = "@all_videos";

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif", "webp"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "3gp"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
	Image,
	Video,
	Other,
}

/// `(parent_path, file_name, extension)` triple of a file path.
/// `file_name` is the stem; the extension carries no dot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PathParts {
	pub parent_path: String,
	pub file_name: String,
	pub extension: String,
}

impl PathParts {
	pub fn compose(&self) -> String {
		compose_file(&self.parent_path, &self.file_name, &self.extension)
	}
}

fn trim_trailing(path: &str) -> &str {
	let trimmed = path.trim_end_matches(SEPARATOR);
	if trimmed.is_empty() && path.starts_with(SEPARATOR) {
		"/"
	} else {
		trimmed
	}
}

/// Split a folder path into `(parent_path, name)`.
pub fn split_folder(path: &str) -> (String, String) {
	let path = trim_trailing(path);
	if path == "/" {
		return (String::new(), String::new());
	}
	match path.rfind(SEPARATOR) {
		Some(0) => ("/".to_string(), path[1..].to_string()),
		Some(idx) => (path[..idx].to_string(), path[idx + 1..].to_string()),
		None => (String::new(), path.to_string()),
	}
}

/// Split a file path into its identity triple.
pub fn split(path: &str) -> PathParts {
	let (parent_path, name) = split_folder(path);
	let (file_name, extension) = match name.rfind('.') {
		Some(idx) if idx > 0 => (name[..idx].to_string(), name[idx + 1..].to_string()),
		_ => (name, String::new()),
	};
	PathParts { parent_path, file_name, extension }
}

pub fn join(parent: &str, name: &str) -> String {
	if parent.is_empty() {
		name.to_string()
	} else if parent.ends_with(SEPARATOR) {
		format!("{parent}{name}")
	} else {
		format!("{parent}{SEPARATOR}{name}")
	}
}

pub fn compose_file(parent: &str, file_name: &str, extension: &str) -> String {
	if extension.is_empty() {
		join(parent, file_name)
	} else {
		join(parent, &format!("{file_name}.{extension}"))
	}
}

/// Final component of a path, extension included.
pub fn file_name_of(path: &str) -> String {
	split_folder(path).1
}

pub fn parent_of(path: &str) -> String {
	split_folder(path).0
}

pub fn classify(extension: &str) -> MediaKind {
	let ext = extension.to_ascii_lowercase();
	if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
		MediaKind::Image
	} else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
		MediaKind::Video
	} else {
		MediaKind::Other
	}
}

pub fn classify_path(path: &str) -> MediaKind {
	classify(&split(path).extension)
}

pub fn is_media(path: &str) -> bool {
	classify_path(path) != MediaKind::Other
}

pub fn path_equals(a: &str, b: &str) -> bool {
	trim_trailing(a).eq_ignore_ascii_case(trim_trailing(b))
}

fn prefix_of(parent: &str) -> String {
	let parent = trim_trailing(parent);
	if parent.ends_with(SEPARATOR) {
		parent.to_ascii_lowercase()
	} else {
		format!("{}{SEPARATOR}", parent.to_ascii_lowercase())
	}
}

/// True when `candidate` lies strictly beneath `parent`.
///
/// The prefix always ends in a separator, so `/root/Foo` is never a parent of
/// `/root/Foobar`.
pub fn is_parent_of(parent: &str, candidate: &str) -> bool {
	if parent.is_empty() {
		return false;
	}
	let prefix = prefix_of(parent);
	let candidate = trim_trailing(candidate).to_ascii_lowercase();
	candidate.len() > prefix.len() && candidate.starts_with(&prefix)
}

pub fn is_direct_child_of(parent: &str, candidate: &str) -> bool {
	if !is_parent_of(parent, candidate) {
		return false;
	}
	let prefix_len = prefix_of(parent).len();
	!trim_trailing(candidate)[prefix_len..].contains(SEPARATOR)
}

/// Rewrite the `old_root` prefix of `path` to `new_root`.
/// Paths outside `old_root` come back unchanged.
pub fn rebase(path: &str, old_root: &str, new_root: &str) -> String {
	if path_equals(path, old_root) {
		return trim_trailing(new_root).to_string();
	}
	if !is_parent_of(old_root, path) {
		return path.to_string();
	}
	let rest = &trim_trailing(path)[prefix_of(old_root).len()..];
	join(trim_trailing(new_root), rest)
}

/// Managed roots, the virtual videos folder and direct children of a root
/// can never be deleted, moved or renamed.
pub fn is_protected(path: &str, roots: &[String]) -> bool {
	if path == ALL_VIDEOS {
		return true;
	}
	roots
		.iter()
		.any(|root| path_equals(root, path) || is_direct_child_of(root, path))
}

/// The managed root containing `path` (or equal to it), if any.
pub fn root_of<'a>(path: &str, roots: &'a [String]) -> Option<&'a str> {
	roots
		.iter()
		.find(|root| path_equals(root, path) || is_parent_of(root, path))
		.map(String::as_str)
}

/// Whether `path` falls under one of the exclusion prefixes.
pub fn is_excluded(path: &str, exclusions: &[String]) -> bool {
	exclusions
		.iter()
		.any(|excluded| path_equals(excluded, path) || is_parent_of(excluded, path))
}

pub fn is_hidden(path: &str) -> bool {
	file_name_of(path).starts_with('.')
}
