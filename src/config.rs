use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const APP_DIR: &str = "albumsync";

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to read {path}: {source}")]
	Read {
		path: PathBuf,
		source: std::io::Error,
	},

	#[error("failed to write {path}: {source}")]
	Write {
		path: PathBuf,
		source: std::io::Error,
	},

	#[error("invalid config: {0}")]
	Parse(#[from] toml::de::Error),

	#[error("could not serialize config: {0}")]
	Serialize(#[from] toml::ser::Error),
}

/// User preferences the engine reads on every pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Preferences {
	/// Storage roots the engine manages. Roots and their direct children are protected.
	pub managed_roots: Vec<String>,
	/// Path prefixes indexed as non-existent regardless of the disk.
	pub excluded_paths: Vec<String>,
	/// Folders always surfaced, even without media.
	pub included_paths: Vec<String>,
	pub show_empty_folders: bool,
	pub show_all_videos_folder: bool,
	pub auto_star_created_folder: bool,
}

impl Default for Preferences {
	fn default() -> Self {
		Preferences {
			managed_roots: Vec::new(),
			excluded_paths: Vec::new(),
			included_paths: Vec::new(),
			show_empty_folders: false,
			show_all_videos_folder: true,
			auto_star_created_folder: false,
		}
	}
}

impl Preferences {
	/// Load from `path`; a missing file yields the defaults.
	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		match std::fs::read_to_string(path) {
			Ok(contents) => Ok(toml::from_str(&contents)?),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Preferences::default()),
			Err(source) => Err(ConfigError::Read { path: path.to_path_buf(), source }),
		}
	}

	pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
		let contents = toml::to_string_pretty(self)?;
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write { path: parent.to_path_buf(), source })?;
		}
		std::fs::write(path, contents).map_err(|source| ConfigError::Write { path: path.to_path_buf(), source })
	}
}

/// `<config dir>/albumsync/config.toml`
pub fn default_config_path() -> PathBuf {
	dirs::config_dir()
		.unwrap_or_else(|| PathBuf::from("."))
		.join(APP_DIR)
		.join("config.toml")
}

/// `<data dir>/albumsync`, home of the index and the log file.
pub fn default_data_dir() -> PathBuf {
	dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join(APP_DIR)
}
