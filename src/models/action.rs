use serde::{Deserialize, Serialize};

use crate::{
	models::file_record::{finite_or_zero, FileRecord},
	paths,
};

/// A local change the media indexer has not confirmed yet.
///
/// One action per identity: a newer intent for the same path replaces the older one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionRecord {
	pub parent_path: String,
	pub file_name: String,
	pub extension: String,
	pub kind: ActionKind,
	pub created_at: i64,
	#[serde(default)]
	pub external_id: i64,
	#[serde(default)]
	pub taken_at: i64,
	#[serde(default)]
	pub duration_ms: i64,
	#[serde(default)]
	pub lat: f64,
	#[serde(default)]
	pub lng: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
	Add,
	Delete,
}

impl ActionRecord {
	pub fn from_file(file: &FileRecord, kind: ActionKind, created_at: i64) -> Self {
		ActionRecord {
			parent_path: file.parent_path.clone(),
			file_name: file.file_name.clone(),
			extension: file.extension.clone(),
			kind,
			created_at,
			external_id: file.external_id,
			taken_at: file.taken_at,
			duration_ms: file.duration_ms,
			lat: finite_or_zero(file.lat),
			lng: finite_or_zero(file.lng),
		}
	}

	pub fn path(&self) -> String {
		paths::compose_file(&self.parent_path, &self.file_name, &self.extension)
	}

	/// Rebuild the file record this action describes, assumed present.
	pub fn to_file_record(&self) -> FileRecord {
		FileRecord {
			parent_path: self.parent_path.clone(),
			file_name: self.file_name.clone(),
			extension: self.extension.clone(),
			external_id: self.external_id,
			taken_at: self.taken_at,
			duration_ms: self.duration_ms,
			lat: self.lat,
			lng: self.lng,
			exists: true,
		}
	}

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
	fn add_action_rebuilds_record() {
		let mut file = FileRecord::at("/root/Camera/IMG_1.jpg");
		file.taken_at = 1_700_000_000_000;
		file.lat = 52.5;
		let action = ActionRecord::from_file(&file, ActionKind::Add, 10);
		assert_eq!(action.path(), "/root/Camera/IMG_1.jpg");
		assert_eq!(action.to_file_record(), file);
		assert_eq!(action.to_row().unwrap()["kind"], "add");
	}

	#[test]
	fn non_finite_geo_recorded_as_zero() {
		let mut file = FileRecord::at("/root/Camera/IMG_2.jpg");
		file.lat = f64::NAN;
		file.lng = f64::INFINITY;
		let action = ActionRecord::from_file(&file, ActionKind::Delete, 10);
		assert_eq!((action.lat, action.lng), (0.0, 0.0));
		assert_eq!(action.to_row().unwrap()["lat"], 0.0);
	}
}
