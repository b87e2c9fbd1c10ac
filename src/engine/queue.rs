//! Single-consumer FIFO for every reconciliation and mutation.
//!
//! One tokio task owns the receiving end and runs commands strictly in
//! submission order, so passes and mutations never interleave their writes.

use std::sync::Arc;

use tokio::{
	sync::{mpsc, oneshot},
	task::JoinHandle,
};

use crate::{
	config::Preferences,
	engine::{aggregate, mutate, reconcile, EngineContext, EngineError, PassOutcome},
	models::ItemOutcome,
};

pub(crate) enum Command {
	Refresh {
		reply: oneshot::Sender<PassOutcome>,
	},
	CreateFolder {
		path: String,
		star: bool,
		reply: oneshot::Sender<Result<bool, EngineError>>,
	},
	Delete {
		items: Vec<String>,
		reply: oneshot::Sender<Vec<ItemOutcome>>,
	},
	MoveOrRename {
		items: Vec<String>,
		destination: String,
		new_name: Option<String>,
		reply: oneshot::Sender<Vec<ItemOutcome>>,
	},
	Star {
		items: Vec<String>,
		starred: bool,
		reply: oneshot::Sender<Vec<ItemOutcome>>,
	},
	AddFiles {
		paths: Vec<String>,
		reply: oneshot::Sender<Vec<ItemOutcome>>,
	},
	Aggregate {
		reply: oneshot::Sender<Result<usize, EngineError>>,
	},
	SetPreferences {
		prefs: Preferences,
		reply: oneshot::Sender<()>,
	},
}

impl Command {
	fn name(&self) -> &'static str {
		match self {
			Command::Refresh { .. } => "refresh",
			Command::CreateFolder { .. } => "create_folder",
			Command::Delete { .. } => "delete",
			Command::MoveOrRename { .. } => "move_or_rename",
			Command::Star { .. } => "star",
			Command::AddFiles { .. } => "add_files",
			Command::Aggregate { .. } => "aggregate",
			Command::SetPreferences { .. } => "set_preferences",
		}
	}
}

pub(crate) struct WorkQueue {
	sender: mpsc::UnboundedSender<Command>,
	worker: JoinHandle<()>,
}

impl WorkQueue {
	pub(crate) fn start(ctx: Arc<EngineContext>) -> Self {
		let (sender, receiver) = mpsc::unbounded_channel::<Command>();
		let worker = tokio::spawn(worker_loop(ctx, receiver));
		WorkQueue { sender, worker }
	}

	/// Enqueue a command and wait for its reply.
	pub(crate) async fn submit<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T, EngineError> {
		let (reply, response) = oneshot::channel();
		self.sender.send(build(reply)).map_err(|_| EngineError::WorkerGone)?;
		response.await.map_err(|_| EngineError::WorkerGone)
	}

	/// Stop accepting work and wait for queued commands to finish.
	pub(crate) async fn close(self) {
		drop(self.sender);
		if let Err(e) = self.worker.await {
			tracing::warn!("engine worker ended abnormally: {e}");
		}
	}
}

async fn worker_loop(ctx: Arc<EngineContext>, mut receiver: mpsc::UnboundedReceiver<Command>) {
	while let Some(command) = receiver.recv().await {
		let name = command.name();
		tracing::debug!(command = name, "start");
		dispatch(&ctx, command).await;
		tracing::debug!(command = name, "done");
	}
	tracing::debug!("engine worker stopped");
}

async fn dispatch(ctx: &EngineContext, command: Command) {
	// A dropped reply receiver only means the caller stopped waiting.
	match command {
		Command::Refresh { reply } => {
			let _ = reply.send(reconcile::run_pass(ctx).await);
		}
		Command::CreateFolder { path, star, reply } => {
			let _ = reply.send(mutate::create_folder(ctx, &path, star).await);
		}
		Command::Delete { items, reply } => {
			let _ = reply.send(mutate::delete_items(ctx, items).await);
		}
		Command::MoveOrRename { items, destination, new_name, reply } => {
			let _ = reply.send(mutate::move_or_rename(ctx, items, &destination, new_name).await);
		}
		Command::Star { items, starred, reply } => {
			let _ = reply.send(mutate::star_items(ctx, items, starred).await);
		}
		Command::AddFiles { paths, reply } => {
			let _ = reply.send(mutate::add_files(ctx, paths).await);
		}
		Command::Aggregate { reply } => {
			let result = aggregate::run(ctx).await;
			if result.is_ok() {
				ctx.bump_last_sync().await;
			}
			let _ = reply.send(result);
		}
		Command::SetPreferences { prefs, reply } => {
			*ctx.prefs.write().await = prefs;
			tracing::info!("preferences updated");
			let _ = reply.send(());
		}
	}
}
