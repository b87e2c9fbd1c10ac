//! Reconciliation against the media indexer.
//!
//! A pass replaces the file table with the indexer's snapshot, then replays
//! the pending action log on top of it: intents the indexer already reflects
//! are dropped, the rest are resolved from the disk and kept for the next
//! pass. File table, folder table and action log change in one
//! transaction.

use std::{collections::BTreeMap, path::Path};

use serde::Serialize;

use crate::{
	config::Preferences,
	engine::{aggregate, blocking, rescan::RescanPlan, EngineContext, EngineError},
	indexer::{IndexedMedia, RescanKind},
	models::{finite_or_zero, ActionKind, ActionRecord, FileRecord},
	paths::{self, MediaKind},
	store::{actions, IndexDelta},
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
	pub indexed: usize,
	pub excluded: usize,
	/// Actions the snapshot already reflects.
	pub confirmed: usize,
	/// DELETE actions applied from the disk while the indexer still lists the file.
	pub resolved_locally: usize,
	pub still_pending: usize,
	/// ADD actions whose file is gone.
	pub discarded: usize,
	pub folders: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
	Completed(ReconcileReport),
	/// Nothing was written; the reason is logged.
	Abandoned(String),
}

impl PassOutcome {
	pub fn is_completed(&self) -> bool {
		matches!(self, PassOutcome::Completed(_))
	}
}

/// Result of replaying the action log over a snapshot.
#[derive(Debug, Default)]
pub struct PassPlan {
	pub files: Vec<FileRecord>,
	pub action_deletes: Vec<String>,
	pub rescans: RescanPlan,
	pub report: ReconcileReport,
}

pub async fn run_pass(ctx: &EngineContext) -> PassOutcome {
	match try_pass(ctx).await {
		Ok(report) => PassOutcome::Completed(report),
		Err(e) => {
			tracing::warn!("reconciliation pass abandoned: {e}");
			PassOutcome::Abandoned(e.to_string())
		}
	}
}

async fn try_pass(ctx: &EngineContext) -> Result<ReconcileReport, EngineError> {
	let prefs = ctx.preferences().await;
	let indexer = ctx.indexer.clone();
	let roots = prefs.managed_roots.clone();
	let snapshot = blocking(move || indexer.query(&roots, &[MediaKind::Image, MediaKind::Video])).await??;
	let pending = actions::all(&ctx.db).await?;

	let plan_prefs = prefs.clone();
	let plan = blocking(move || plan_pass(snapshot, pending, &plan_prefs, |p| Path::new(p).exists())).await?;

	let PassPlan { files, action_deletes, rescans, mut report } = plan;
	let folders = aggregate::plan(ctx, files.clone()).await?;
	report.folders = folders.len();

	IndexDelta {
		replace_files: true,
		file_upserts: files,
		replace_folders: true,
		folder_upserts: folders,
		action_deletes,
		..Default::default()
	}
	.commit(&ctx.db)
	.await?;

	ctx.rescans.send(rescans);
	let stamp = ctx.bump_last_sync().await;

	tracing::info!(
		indexed = report.indexed,
		excluded = report.excluded,
		confirmed = report.confirmed,
		resolved = report.resolved_locally,
		pending = report.still_pending,
		discarded = report.discarded,
		folders = report.folders,
		last_sync = stamp,
		"reconciliation pass complete"
	);
	Ok(report)
}

/// Replay `pending` over `snapshot`. `on_disk` answers filesystem existence.
pub fn plan_pass(
	snapshot: Vec<IndexedMedia>,
	pending: Vec<ActionRecord>,
	prefs: &Preferences,
	on_disk: impl Fn(&str) -> bool,
) -> PassPlan {
	let mut plan = PassPlan::default();
	plan.report.indexed = snapshot.len();

	let mut table: BTreeMap<String, FileRecord> = BTreeMap::new();
	for media in snapshot {
		let mut record = from_media(&media);
		if paths::is_excluded(&media.path, &prefs.excluded_paths) {
			record.exists = false;
			plan.report.excluded += 1;
		}
		table.insert(media.path, record);
	}

	for action in pending {
		let path = action.path();
		match (action.kind, table.get_mut(&path)) {
			(ActionKind::Delete, Some(record)) => {
				if on_disk(&path) {
					tracing::debug!(path = %path, "delete still pending");
					plan.report.still_pending += 1;
				} else {
					// Gone locally but still indexed: keep the intent until the
					// snapshot drops the identity.
					record.exists = false;
					plan.rescans.push(path, RescanKind::FileDelete);
					plan.report.resolved_locally += 1;
				}
			}
			(ActionKind::Delete, None) | (ActionKind::Add, Some(_)) => {
				plan.action_deletes.push(path);
				plan.report.confirmed += 1;
			}
			(ActionKind::Add, None) => {
				if on_disk(&path) {
					let mut record = action.to_file_record();
					record.exists = !paths::is_excluded(&path, &prefs.excluded_paths);
					plan.rescans.push(path.clone(), RescanKind::FileAdd);
					table.insert(path, record);
					plan.report.still_pending += 1;
				} else {
					tracing::debug!(path = %path, "added file vanished; dropping intent");
					plan.action_deletes.push(path);
					plan.report.discarded += 1;
				}
			}
		}
	}

	plan.files = table.into_values().collect();
	plan
}

fn from_media(media: &IndexedMedia) -> FileRecord {
	let mut record = FileRecord::at(&media.path);
	record.external_id = media.external_id;
	record.taken_at = media.taken_at;
	record.lat = finite_or_zero(media.lat);
	record.lng = finite_or_zero(media.lng);
	if record.is_video() {
		record.duration_ms = media.duration_ms.max(0);
	}
	record
}

#[cfg(test)]
mod tests {
	use super::*;

	fn media(path: &str) -> IndexedMedia {
		IndexedMedia { path: path.to_string(), external_id: 1, taken_at: 100, lat: 0.0, lng: 0.0, duration_ms: 0 }
	}

	fn action(path: &str, kind: ActionKind) -> ActionRecord {
		ActionRecord::from_file(&FileRecord::at(path), kind, 1)
	}

	fn prefs() -> Preferences {
		Preferences { managed_roots: vec!["/r".into()], ..Default::default() }
	}

	#[test]
	fn snapshot_becomes_table() {
		let plan = plan_pass(vec![media("/r/a/1.jpg"), media("/r/a/2.mp4")], vec![], &prefs(), |_| true);
		assert_eq!(plan.files.len(), 2);
		assert!(plan.files.iter().all(|f| f.exists));
		assert!(plan.rescans.is_empty());
		assert_eq!(plan.report.indexed, 2);
	}

	#[test]
	fn exclusions_force_missing() {
		let prefs = Preferences { excluded_paths: vec!["/r/Private".into()], ..prefs() };
		let plan = plan_pass(vec![media("/r/Private/1.jpg"), media("/r/Public/2.jpg")], vec![], &prefs, |_| true);
		let private = plan.files.iter().find(|f| f.parent_path == "/r/Private").unwrap();
		assert!(!private.exists);
		assert_eq!(plan.report.excluded, 1);
	}

	#[test]
	fn add_confirmed_by_snapshot() {
		let plan = plan_pass(vec![media("/r/a/1.jpg")], vec![action("/r/a/1.jpg", ActionKind::Add)], &prefs(), |_| true);
		assert_eq!(plan.files.len(), 1);
		assert_eq!(plan.action_deletes, vec!["/r/a/1.jpg".to_string()]);
		assert_eq!(plan.report.confirmed, 1);
	}

	#[test]
	fn unconfirmed_add_kept_while_on_disk() {
		let plan = plan_pass(vec![], vec![action("/r/a/new.jpg", ActionKind::Add)], &prefs(), |_| true);
		assert_eq!(plan.files.len(), 1);
		assert!(plan.action_deletes.is_empty());
		assert_eq!(plan.report.still_pending, 1);
		assert!(!plan.rescans.is_empty());

		let gone = plan_pass(vec![], vec![action("/r/a/new.jpg", ActionKind::Add)], &prefs(), |_| false);
		assert!(gone.files.is_empty());
		assert_eq!(gone.report.discarded, 1);
	}

	#[test]
	fn delete_resolved_from_disk() {
		let actions = vec![action("/r/a/1.jpg", ActionKind::Delete)];

		let resolved = plan_pass(vec![media("/r/a/1.jpg")], actions.clone(), &prefs(), |_| false);
		assert!(!resolved.files[0].exists);
		assert!(resolved.action_deletes.is_empty());
		assert_eq!(resolved.report.resolved_locally, 1);

		let again = plan_pass(vec![media("/r/a/1.jpg")], actions.clone(), &prefs(), |_| false);
		assert_eq!(again.files, resolved.files);

		let waiting = plan_pass(vec![media("/r/a/1.jpg")], actions.clone(), &prefs(), |_| true);
		assert!(waiting.files[0].exists);
		assert!(waiting.action_deletes.is_empty());

		let confirmed = plan_pass(vec![], actions, &prefs(), |_| false);
		assert!(confirmed.files.is_empty());
		assert_eq!(confirmed.report.confirmed, 1);
	}

	#[test]
	fn non_finite_geo_falls_back_to_zero() {
		let mut odd = media("/r/a/1.jpg");
		odd.lat = f64::NAN;
		odd.lng = f64::INFINITY;
		let plan = plan_pass(vec![odd], vec![], &prefs(), |_| true);
		assert_eq!((plan.files[0].lat, plan.files[0].lng), (0.0, 0.0));
	}

	#[test]
	fn duration_only_for_videos() {
		let mut clip = media("/r/a/clip.mp4");
		clip.duration_ms = 3000;
		let mut pic = media("/r/a/pic.jpg");
		pic.duration_ms = 3000;
		let plan = plan_pass(vec![clip, pic], vec![], &prefs(), |_| true);
		let by_ext: BTreeMap<String, i64> = plan.files.iter().map(|f| (f.extension.clone(), f.duration_ms)).collect();
		assert_eq!(by_ext["mp4"], 3000);
		assert_eq!(by_ext["jpg"], 0);
	}
}
