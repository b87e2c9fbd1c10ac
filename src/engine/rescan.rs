//! Rescan requests to the media indexer.
//!
//! The engine never calls the indexer from inside a pass. It collects the
//! affected paths into a [`RescanPlan`], coalesces them, and hands them to a
//! dispatcher task over a channel.

use std::{collections::HashMap, sync::Arc};

use tokio::{sync::mpsc, task::JoinHandle};

use crate::{
	indexer::{MediaIndexer, RescanKind},
	paths,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RescanRequest {
	pub path: String,
	pub kind: RescanKind,
}

#[derive(Debug, Default, Clone)]
pub struct RescanPlan {
	requests: Vec<RescanRequest>,
}

impl RescanPlan {
	pub fn push(&mut self, path: impl Into<String>, kind: RescanKind) {
		self.requests.push(RescanRequest { path: path.into(), kind });
	}

	pub fn is_empty(&self) -> bool {
		self.requests.is_empty()
	}

	pub fn extend(&mut self, other: RescanPlan) {
		self.requests.extend(other.requests);
	}

	/// Collapse the plan to roughly one request per affected subtree root.
	///
	/// - exact duplicates go
	/// - anything beneath a `FolderAddAll` / `FolderDelete` root goes
	/// - two or more file requests in one folder become one `FolderAddThis`
	pub fn coalesce(self) -> Vec<RescanRequest> {
		let mut unique: Vec<RescanRequest> = Vec::new();
		for request in self.requests {
			let seen = unique
				.iter()
				.any(|r| r.kind == request.kind && paths::path_equals(&r.path, &request.path));
			if !seen {
				unique.push(request);
			}
		}

		let subtree_roots: Vec<RescanRequest> = unique.iter().filter(|r| r.kind.covers_subtree()).cloned().collect();
		let covered = |request: &RescanRequest| {
			subtree_roots.iter().any(|root| {
				if root == request {
					return false;
				}
				paths::is_parent_of(&root.path, &request.path)
					|| (!request.kind.covers_subtree() && paths::path_equals(&root.path, &request.path))
			})
		};
		let kept: Vec<RescanRequest> = unique.iter().filter(|r| !covered(*r)).cloned().collect();

		let mut per_parent: HashMap<String, usize> = HashMap::new();
		for request in kept.iter().filter(|r| r.kind.is_file_level()) {
			*per_parent.entry(paths::parent_of(&request.path)).or_default() += 1;
		}

		let mut out: Vec<RescanRequest> = Vec::new();
		for request in kept {
			let next = if request.kind.is_file_level() {
				let parent = paths::parent_of(&request.path);
				if per_parent.get(&parent).copied().unwrap_or(0) > 1 {
					RescanRequest { path: parent, kind: RescanKind::FolderAddThis }
				} else {
					request
				}
			} else {
				request
			};
			if !out.contains(&next) {
				out.push(next);
			}
		}
		out
	}
}

/// Sending side of the rescan channel. Cheap to clone.
#[derive(Clone)]
pub struct RescanDispatcher {
	sender: mpsc::UnboundedSender<RescanRequest>,
}

impl RescanDispatcher {
	/// Spawn the task that forwards requests to `indexer`, one at a time.
	pub fn start(indexer: Arc<dyn MediaIndexer>) -> (Self, JoinHandle<()>) {
		let (sender, mut receiver) = mpsc::unbounded_channel::<RescanRequest>();
		let handle = tokio::spawn(async move {
			while let Some(request) = receiver.recv().await {
				let indexer = indexer.clone();
				let path = request.path.clone();
				let result = tokio::task::spawn_blocking(move || indexer.request_rescan(&request.path, request.kind)).await;
				if let Err(e) = result {
					tracing::warn!(path = %path, "rescan request panicked: {e}");
				}
			}
			tracing::debug!("rescan dispatcher stopped");
		});
		(RescanDispatcher { sender }, handle)
	}

	/// Coalesce and enqueue. Never waits for the indexer.
	pub fn send(&self, plan: RescanPlan) {
		for request in plan.coalesce() {
			tracing::debug!(path = %request.path, kind = ?request.kind, "queue rescan");
			if self.sender.send(request).is_err() {
				tracing::warn!("rescan dispatcher gone; dropping requests");
				return;
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn req(path: &str, kind: RescanKind) -> RescanRequest {
		RescanRequest { path: path.to_string(), kind }
	}

	#[test]
	fn folder_delete_swallows_descendants() {
		let mut plan = RescanPlan::default();
		plan.push("/root/a/b/1.jpg", RescanKind::FileDelete);
		plan.push("/root/a", RescanKind::FolderDelete);
		plan.push("/root/a/b", RescanKind::FolderAddThis);
		plan.push("/root/ab/2.jpg", RescanKind::FileDelete);

		assert_eq!(
			plan.coalesce(),
			vec![req("/root/a", RescanKind::FolderDelete), req("/root/ab/2.jpg", RescanKind::FileDelete)]
		);
	}

	#[test]
	fn sibling_files_collapse_to_folder() {
		let mut plan = RescanPlan::default();
		plan.push("/root/a/1.jpg", RescanKind::FileAdd);
		plan.push("/root/a/2.jpg", RescanKind::FileAdd);
		plan.push("/root/a/2.jpg", RescanKind::FileAdd);
		plan.push("/root/b/3.jpg", RescanKind::FileDelete);

		assert_eq!(
			plan.coalesce(),
			vec![req("/root/a", RescanKind::FolderAddThis), req("/root/b/3.jpg", RescanKind::FileDelete)]
		);
	}

	#[test]
	fn folder_move_keeps_both_roots() {
		let mut plan = RescanPlan::default();
		plan.push("/root/a/old", RescanKind::FolderDelete);
		plan.push("/root/b/old", RescanKind::FolderAddAll);

		assert_eq!(plan.coalesce().len(), 2);
	}

	#[test]
	fn nested_subtree_roots_reduce_to_outer() {
		let mut plan = RescanPlan::default();
		plan.push("/root/a", RescanKind::FolderAddAll);
		plan.push("/root/a/b", RescanKind::FolderAddAll);

		assert_eq!(plan.coalesce(), vec![req("/root/a", RescanKind::FolderAddAll)]);
	}
}
