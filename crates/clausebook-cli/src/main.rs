//! `clausebook`: manage a versioned insurance clause library and the
//! policies built from it.
//!
//! # Usage
//!
//! ```
//! clausebook import library.csv
//! clausebook edit 0b5c… --body "Revised wording" --note "legal review"
//! clausebook policy new "Warehouse cover"
//! clausebook policy select "Warehouse cover" 0b5c… 7f21…
//! clausebook serve --port 8080
//! ```
//!
//! Settings come from `clausebook.toml` (or `--config`) and `CLAUSEBOOK_*`
//! environment variables.

mod commands;
mod settings;

use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use clausebook_store_sqlite::SqliteStore;
use commands::{
  ClauseArg, ClearArgs, DbCommand, DeleteVersionArgs, DiffArgs, EditArgs, ExportArgs,
  ImportArgs, ListArgs, PolicyCommand, ServeArgs, ShowArgs, VersionArgs,
};
use settings::Settings;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "clausebook", author, version, about = "Versioned insurance clause library")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = settings::DEFAULT_CONFIG)]
  config: PathBuf,

  /// SQLite database; overrides `store_path` from the settings.
  #[arg(long, value_name = "FILE")]
  store: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Import a CSV clause library.
  Import(ImportArgs),
  /// List clauses, optionally filtered.
  List(ListArgs),
  /// Show a clause or one of its versions.
  Show(ShowArgs),
  /// Edit a clause, creating a new version when its content changes.
  Edit(EditArgs),
  /// List a clause's versions, newest first.
  Versions(ClauseArg),
  /// Diff two versions of a clause.
  Diff(DiffArgs),
  /// Make an existing version current.
  Activate(VersionArgs),
  /// Delete a non-current, unbound version.
  DeleteVersion(DeleteVersionArgs),
  /// Export clauses as CSV, JSON or Markdown.
  Export(ExportArgs),
  /// Manage policies and their clause selections.
  #[command(subcommand)]
  Policy(PolicyCommand),
  /// Snapshot or restore the whole database.
  #[command(subcommand)]
  Db(DbCommand),
  /// Remove every clause, version and policy.
  Clear(ClearArgs),
  /// Serve the REST API.
  Serve(ServeArgs),
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  let cli = Cli::parse();

  // The server logs requests; one-shot commands stay quiet unless asked.
  let default_level = match cli.command {
    Command::Serve(_) => LevelFilter::INFO,
    _ => LevelFilter::WARN,
  };
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy(),
    )
    .init();

  let settings = Settings::load(&cli.config)?;
  let store_path = match cli.store {
    Some(path) => settings::expand_tilde(&path),
    None => settings.store_path.clone(),
  };

  if let Some(parent) = store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {}", parent.display()))?;
  }

  let mut store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {}", store_path.display()))?;

  match cli.command {
    Command::Import(args) => commands::import(&store, args).await,
    Command::List(args) => commands::list(&store, args).await,
    Command::Show(args) => commands::show(&store, args).await,
    Command::Edit(args) => commands::edit(&store, args).await,
    Command::Versions(args) => commands::versions(&store, args).await,
    Command::Diff(args) => commands::diff(&store, args).await,
    Command::Activate(args) => commands::activate(&store, args).await,
    Command::DeleteVersion(args) => commands::delete_version(&store, args).await,
    Command::Export(args) => commands::export(&store, args).await,
    Command::Policy(command) => commands::policy(&store, command).await,
    Command::Db(command) => commands::db(&mut store, command).await,
    Command::Clear(args) => commands::clear(&store, args).await,
    Command::Serve(args) => commands::serve(store, &settings, args).await,
  }
}
