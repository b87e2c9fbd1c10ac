use std::{path::PathBuf, sync::Arc};

use albumsync::{
	config::{self, Preferences},
	db,
	engine::{Engine, PassOutcome},
	models::{ItemOutcome, ListItem, SortKey, SortOrder},
	LocalIndexer,
};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "albumsync", about = "Keep a media index in sync with the disk")]
struct Args {
	/// Preferences file
	#[arg(long)]
	config: Option<PathBuf>,

	/// Directory holding the index database and the log
	#[arg(long)]
	data_dir: Option<PathBuf>,

	/// Managed root; repeat for several. Overrides the config file.
	#[arg(long = "root")]
	roots: Vec<String>,

	/// Write the --root values back to the config file
	#[arg(long, requires = "roots")]
	save_roots: bool,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Reconcile the index with the disk
	Refresh,
	/// List folders and files directly inside a folder
	Ls {
		path: String,
		#[arg(long)]
		all: bool,
	},
	/// List every indexed file
	All {
		#[arg(long, value_enum, default_value_t = SortArg::TakenAt)]
		sort: SortArg,
		#[arg(long)]
		asc: bool,
		#[arg(long)]
		group: bool,
	},
	/// Create a folder
	Create {
		path: String,
		#[arg(long)]
		star: bool,
	},
	/// Delete files or folders
	Rm { items: Vec<String> },
	/// Move items into a folder, optionally renaming a single item
	Mv {
		#[arg(required = true)]
		items: Vec<String>,
		#[arg(long)]
		to: String,
		#[arg(long)]
		name: Option<String>,
	},
	/// Star or unstar folders
	Star {
		items: Vec<String>,
		#[arg(long)]
		off: bool,
	},
	/// List starred folders
	Starred,
	/// Show the last sync stamp and configured roots
	Status,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SortArg {
	Name,
	Path,
	TakenAt,
	Duration,
}

impl From<SortArg> for SortKey {
	fn from(arg: SortArg) -> Self {
		match arg {
			SortArg::Name => SortKey::Name,
			SortArg::Path => SortKey::Path,
			SortArg::TakenAt => SortKey::TakenAt,
			SortArg::Duration => SortKey::Duration,
		}
	}
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	let data_dir = args.data_dir.clone().unwrap_or_else(config::default_data_dir);
	std::fs::create_dir_all(&data_dir)?;
	let file_appender = tracing_appender::rolling::never(&data_dir, "albumsync.log");
	tracing_subscriber::registry()
		.with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "albumsync=info".into()))
		.with(tracing_subscriber::fmt::layer().with_writer(file_appender))
		.init();

	let config_path = args.config.clone().unwrap_or_else(config::default_config_path);
	let mut prefs = Preferences::load(&config_path)?;
	if !args.roots.is_empty() {
		prefs.managed_roots = args.roots.clone();
		if args.save_roots {
			prefs.save(&config_path)?;
			tracing::info!(path = %config_path.display(), "managed roots saved");
		}
	}
	if prefs.managed_roots.is_empty() {
		return Err("no managed roots; pass --root or set managed_roots in the config".into());
	}

	let handle = db::init(&data_dir).await?;
	let engine = Engine::start(handle, prefs, Arc::new(LocalIndexer::new())).await?;
	let result = run(&engine, args.command).await;
	engine.shutdown().await;
	result
}

async fn run(engine: &Engine, command: Command) -> Result<(), Box<dyn std::error::Error>> {
	match command {
		Command::Refresh => match engine.refresh().await? {
			PassOutcome::Completed(report) => println!("{}", serde_json::to_string_pretty(&report)?),
			PassOutcome::Abandoned(reason) => return Err(format!("refresh abandoned: {reason}").into()),
		},
		Command::Ls { path, all } => print_items(&engine.list_children(&path, all).await?),
		Command::All { sort, asc, group } => {
			let order = SortOrder { key: sort.into(), descending: !asc, group_by_folder: group };
			print_items(&engine.list_all(order).await?);
		}
		Command::Create { path, star } => {
			if !engine.create_folder(&path, star).await? {
				return Err(format!("could not create {path}").into());
			}
			println!("created {path}");
		}
		Command::Rm { items } => print_outcomes(&engine.delete_items(items).await?),
		Command::Mv { items, to, name } => print_outcomes(&engine.move_or_rename(items, &to, name).await?),
		Command::Star { items, off } => print_outcomes(&engine.star_items(items, !off).await?),
		Command::Starred => {
			for folder in engine.get_starred().await? {
				println!("{}", folder.path());
			}
		}
		Command::Status => {
			let stamp = engine.last_sync_timestamp();
			let when = chrono::DateTime::from_timestamp_millis(stamp)
				.filter(|_| stamp > 0)
				.map(|t| t.to_rfc3339())
				.unwrap_or_else(|| "never".into());
			println!("last sync: {when}");
			for root in engine.preferences().await.managed_roots {
				println!("root: {root}");
			}
		}
	}
	Ok(())
}

fn print_items(items: &[ListItem]) {
	for item in items {
		match item {
			ListItem::Folder(folder) => println!(
				"{}/\t{} folders\t{} files",
				folder.path(),
				folder.folder_count,
				folder.file_count
			),
			ListItem::File(file) => println!("{}", file.path()),
			ListItem::Separator { title } => println!("== {title}"),
		}
	}
}

fn print_outcomes(outcomes: &[ItemOutcome]) {
	for outcome in outcomes {
		println!("{:?}\t{}", outcome.status, outcome.path);
	}
}
