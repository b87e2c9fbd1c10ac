use serde::{Deserialize, Serialize};

use crate::paths::{self, MediaKind};

/// A media file known to the index.
/// Identity is `(parent_path, file_name, extension)`; the store keys it by the composed path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileRecord {
	pub parent_path: String,
	pub file_name: String,
	pub extension: String,
	#[serde(default = "no_external_id")]
	pub external_id: i64,
	#[serde(default)]
	pub taken_at: i64,
	#[serde(default)]
	pub duration_ms: i64,
	#[serde(default)]
	pub lat: f64,
	#[serde(default)]
	pub lng: f64,
	/// Last-known filesystem reality. `false` means removed locally but not
	/// yet confirmed gone by the media indexer, or hidden by an exclusion rule.
	#[serde(rename = "on_disk")]
	pub exists: bool,
}

fn no_external_id() -> i64 {
	-1
}

/// Geo coordinates the store can hold. NaN and infinities become 0.0.
pub fn finite_or_zero(value: f64) -> f64 {
	if value.is_finite() {
		value
	} else {
		0.0
	}
}

impl FileRecord {
	/// A bare record for `path` with no indexer metadata.
	pub fn at(path: &str) -> Self {
		let parts = paths::split(path);
		FileRecord {
			parent_path: parts.parent_path,
			file_name: parts.file_name,
			extension: parts.extension,
			external_id: -1,
			taken_at: 0,
			duration_ms: 0,
			lat: 0.0,
			lng: 0.0,
			exists: true,
		}
	}

	pub fn path(&self) -> String {
		paths::compose_file(&self.parent_path, &self.file_name, &self.extension)
	}

	pub fn kind(&self) -> MediaKind {
		paths::classify(&self.extension)
	}

	pub fn is_video(&self) -> bool {
		self.kind() == MediaKind::Video
	}

	/// The same record under another path, metadata kept.
	pub fn relocated(&self, new_path: &str) -> Self {
		let parts = paths::split(new_path);
		FileRecord {
			parent_path: parts.parent_path,
			file_name: parts.file_name,
			extension: parts.extension,
			..self.clone()
		}
	}

	/// Row shape stored in `file_record`: the serde fields plus the `path` key.
	pub fn to_row(&self) -> Result<serde_json::Value, serde_json::Error> {
		let mut row = serde_json::to_value(self)?;
		row["path"] = serde_json::Value::String(self.path());
		Ok(row)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn row_carries_path_and_renamed_flag() {
		let record = FileRecord::at("/root/DCIM/a.jpg");
		let row = record.to_row().unwrap();
		assert_eq!(row["path"], "/root/DCIM/a.jpg");
		assert_eq!(row["on_disk"], true);
		assert!(row.get("exists").is_none());

		let back: FileRecord = serde_json::from_value(row).unwrap();
		assert_eq!(back, record);
	}

	#[test]
	fn non_finite_geo_reads_as_zero() {
		assert_eq!(finite_or_zero(f64::NAN), 0.0);
		assert_eq!(finite_or_zero(f64::NEG_INFINITY), 0.0);
		assert_eq!(finite_or_zero(-33.9), -33.9);
	}

	#[test]
	fn relocated_keeps_metadata() {
		let mut record = FileRecord::at("/root/a/clip.mp4");
		record.duration_ms = 4200;
		record.external_id = 9;
		let moved = record.relocated("/root/b/clip.mp4");
		assert_eq!(moved.parent_path, "/root/b");
		assert_eq!(moved.duration_ms, 4200);
		assert_eq!(moved.external_id, 9);
		assert!(moved.is_video());
	}
}
