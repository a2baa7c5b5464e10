//! Subcommand arguments and their handlers.

use std::{
  io::{self, Read as _},
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::{Context as _, Result, bail};
use clap::{Args, Subcommand};
use clausebook_core::{
  clause::{Clause, ClauseEdit, UpdateOutcome},
  diff,
  policy::{BindSummary, NewPolicy, Policy, PolicyDetails},
  render::{self, ExportFormat},
  session::Session,
  store::{ClauseQuery, ClauseStore},
  tabular,
};
use clausebook_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use uuid::Uuid;

use crate::settings::Settings;

// ─── Clauses ──────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct ImportArgs {
  /// Clause library, CSV or XLSX (by extension).
  pub file:   PathBuf,
  /// Reconcile this policy's selection after the import.
  #[arg(long, value_name = "POLICY")]
  pub policy: Option<String>,
}

pub async fn import(store: &SqliteStore, args: ImportArgs) -> Result<()> {
  let file = std::fs::File::open(&args.file)
    .with_context(|| format!("failed to open {}", args.file.display()))?;
  let rows = match LibraryFile::of(&args.file) {
    LibraryFile::Xlsx => tabular::read_xlsx_records(io::BufReader::new(file)),
    LibraryFile::Csv => tabular::read_records(file),
  }
  .with_context(|| format!("failed to parse {}", args.file.display()))?;

  let summary = match &args.policy {
    Some(key) => {
      let policy = resolve_policy(store, key).await?;
      let mut session = Session::open(store, policy.policy_id).await?;
      session.import_clauses(store, rows).await?
    }
    None => store.import_clauses(rows).await?,
  };

  println!(
    "{} created, {} updated, {} unchanged",
    summary.created, summary.updated, summary.unchanged
  );
  Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LibraryFile {
  Csv,
  Xlsx,
}

impl LibraryFile {
  /// `.xlsx` files are read as workbooks; anything else as CSV.
  fn of(path: &Path) -> Self {
    match path.extension().and_then(|e| e.to_str()) {
      Some(ext) if ext.eq_ignore_ascii_case("xlsx") => Self::Xlsx,
      _ => Self::Csv,
    }
  }
}

#[derive(Args, Debug)]
pub struct ListArgs {
  /// Substring matched against title, body and phonetic keys.
  #[arg(short, long)]
  pub text:           Option<String>,
  #[arg(long = "type", value_name = "TYPE")]
  pub insurance_type: Option<String>,
  #[arg(long)]
  pub company:        Option<String>,
  #[arg(long = "library", value_name = "TAG")]
  pub library_tag:    Option<String>,
  #[arg(long)]
  pub limit:          Option<usize>,
  #[arg(long)]
  pub offset:         Option<usize>,
}

pub async fn list(store: &SqliteStore, args: ListArgs) -> Result<()> {
  let clauses = store
    .list_clauses(ClauseQuery {
      text:           args.text,
      insurance_type: args.insurance_type,
      company:        args.company,
      library_tag:    args.library_tag,
      limit:          args.limit,
      offset:         args.offset,
    })
    .await?;

  for clause in &clauses {
    print_clause_line(clause);
  }
  Ok(())
}

#[derive(Args, Debug)]
pub struct ShowArgs {
  pub uuid:    Uuid,
  /// Show this version instead of the current one.
  #[arg(long)]
  pub version: Option<u32>,
}

pub async fn show(store: &SqliteStore, args: ShowArgs) -> Result<()> {
  let clause = require_clause(store, args.uuid).await?;

  match args.version {
    Some(n) => {
      let version = store
        .get_version(args.uuid, n)
        .await?
        .with_context(|| format!("clause {} has no version {n}", args.uuid))?;
      println!("{} (version {n}, {})", version.title, version.note);
      println!("{}", version.created_at.to_rfc3339());
      println!();
      println!("{}", version.body);
    }
    None => {
      println!("{} (version {})", clause.title, clause.version_number);
      println!(
        "type: {}  company: {}  library: {}",
        clause.insurance_type, clause.company, clause.library_tag
      );
      println!();
      println!("{}", clause.body);
    }
  }
  Ok(())
}

#[derive(Args, Debug)]
pub struct EditArgs {
  pub uuid:   Uuid,
  #[arg(long)]
  pub title:  Option<String>,
  /// New body text; read from `--file` or stdin when omitted.
  #[arg(long, conflicts_with = "file")]
  pub body:   Option<String>,
  #[arg(long, value_name = "FILE")]
  pub file:   Option<PathBuf>,
  /// Note stored on the new version.
  #[arg(long)]
  pub note:   Option<String>,
  /// Reconcile this policy's selection after the edit.
  #[arg(long, value_name = "POLICY")]
  pub policy: Option<String>,
}

pub async fn edit(store: &SqliteStore, args: EditArgs) -> Result<()> {
  let body = match (args.body, &args.file) {
    (Some(body), _) => body,
    (None, Some(path)) => std::fs::read_to_string(path)
      .with_context(|| format!("failed to read {}", path.display()))?,
    (None, None) => {
      let mut buf = String::new();
      io::stdin().read_to_string(&mut buf).context("failed to read stdin")?;
      buf
    }
  };
  let edit = ClauseEdit { title: args.title, body, note: args.note };

  let outcome = match &args.policy {
    Some(key) => {
      let policy = resolve_policy(store, key).await?;
      let mut session = Session::open(store, policy.policy_id).await?;
      session.update_clause(store, args.uuid, edit).await?
    }
    None => store.update_clause(args.uuid, edit).await?,
  };

  match outcome {
    UpdateOutcome::Unchanged { clause } => {
      println!("unchanged; {} stays at version {}", clause.clause_uuid, clause.version_number);
    }
    UpdateOutcome::Versioned { clause, .. } => {
      println!("saved {} as version {}", clause.clause_uuid, clause.version_number);
    }
  }
  Ok(())
}

// ─── Versions ─────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct ClauseArg {
  pub uuid: Uuid,
}

pub async fn versions(store: &SqliteStore, args: ClauseArg) -> Result<()> {
  let clause = require_clause(store, args.uuid).await?;
  for version in store.get_versions(args.uuid).await? {
    let marker = if version.version_number == clause.version_number { "*" } else { " " };
    println!(
      "{marker} v{:<4} {}  {:<16} {}",
      version.version_number,
      version.created_at.format("%Y-%m-%d %H:%M"),
      version.note,
      version.title,
    );
  }
  Ok(())
}

#[derive(Args, Debug)]
pub struct DiffArgs {
  pub uuid: Uuid,
  pub from: u32,
  /// Defaults to the current version.
  pub to:   Option<u32>,
}

pub async fn diff(store: &SqliteStore, args: DiffArgs) -> Result<()> {
  let to = match args.to {
    Some(n) => n,
    None => require_clause(store, args.uuid).await?.version_number,
  };

  let mut bodies = Vec::with_capacity(2);
  for n in [args.from, to] {
    let version = store
      .get_version(args.uuid, n)
      .await?
      .with_context(|| format!("clause {} has no version {n}", args.uuid))?;
    bodies.push(version.body);
  }

  let lines = diff::line_diff(&bodies[0], &bodies[1]);
  if !diff::has_changes(&lines) {
    println!("versions {} and {to} have the same body", args.from);
    return Ok(());
  }
  println!("--- v{}", args.from);
  println!("+++ v{to}");
  print!("{}", diff::render_unified(&lines));
  Ok(())
}

#[derive(Args, Debug)]
pub struct VersionArgs {
  pub uuid:    Uuid,
  pub version: u32,
  /// Reconcile this policy's selection afterwards.
  #[arg(long, value_name = "POLICY")]
  pub policy:  Option<String>,
}

pub async fn activate(store: &SqliteStore, args: VersionArgs) -> Result<()> {
  match &args.policy {
    Some(key) => {
      let policy = resolve_policy(store, key).await?;
      let mut session = Session::open(store, policy.policy_id).await?;
      session.activate_version(store, args.uuid, args.version).await?;
    }
    None => {
      store.activate_version(args.uuid, args.version).await?;
    }
  }
  println!("{} now at version {}", args.uuid, args.version);
  Ok(())
}

#[derive(Args, Debug)]
pub struct DeleteVersionArgs {
  pub uuid:    Uuid,
  pub version: u32,
  /// Confirm the deletion.
  #[arg(long)]
  pub yes:     bool,
}

pub async fn delete_version(store: &SqliteStore, args: DeleteVersionArgs) -> Result<()> {
  let version = store
    .get_version(args.uuid, args.version)
    .await?
    .with_context(|| format!("clause {} has no version {}", args.uuid, args.version))?;

  if !args.yes {
    println!(
      "would delete version {} of {} ({}, {})",
      version.version_number, version.clause_uuid, version.title, version.note
    );
    println!("re-run with --yes to delete it");
    return Ok(());
  }

  store.delete_version(args.uuid, args.version).await?;
  println!("deleted version {} of {}", args.version, args.uuid);
  Ok(())
}

// ─── Export ───────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct ExportArgs {
  /// csv, json or markdown.
  #[arg(short, long, default_value = "csv")]
  pub format: ExportFormat,
  /// Write here instead of stdout.
  #[arg(short, long, value_name = "FILE")]
  pub output: Option<PathBuf>,
  /// Export only these clauses, in this order.
  pub uuids:  Vec<Uuid>,
}

pub async fn export(store: &SqliteStore, args: ExportArgs) -> Result<()> {
  let clauses = if args.uuids.is_empty() {
    store.export_all().await?
  } else {
    store.export_selected(args.uuids).await?
  };
  let text = render::export(&clauses, args.format)?;
  write_output(args.output.as_ref(), &text)
}

// ─── Policies ─────────────────────────────────────────────────────────────────

#[derive(Subcommand, Debug)]
pub enum PolicyCommand {
  /// Create a policy.
  New {
    name:        String,
    #[arg(short, long, default_value = "")]
    description: String,
    /// JSON file with the insurance details.
    #[arg(long, value_name = "FILE")]
    details:     Option<PathBuf>,
  },
  /// List policies, most recently updated first.
  List,
  /// Show a policy's selected clauses.
  Show { policy: String },
  /// Print the insurance details as JSON, or replace them from a file.
  Details {
    policy: String,
    /// JSON file to replace the details with; `-` reads stdin.
    #[arg(long, value_name = "FILE")]
    set:    Option<PathBuf>,
  },
  /// Replace the policy's selection with these clauses, in order.
  Select { policy: String, uuids: Vec<Uuid> },
  /// Hold a selected clause at a specific version.
  Pin { policy: String, uuid: Uuid, version: u32 },
  /// Let a selected clause follow its current version again.
  Unpin { policy: String, uuid: Uuid },
  /// Render the policy document as Markdown.
  Render {
    policy: String,
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
  },
  /// Delete a policy and its bindings.
  Delete {
    policy: String,
    #[arg(long)]
    yes:    bool,
  },
}

pub async fn policy(store: &SqliteStore, command: PolicyCommand) -> Result<()> {
  match command {
    PolicyCommand::New { name, description, details } => {
      let details = match details {
        Some(path) => read_details(&path)?,
        None => PolicyDetails::default(),
      };
      let policy = store
        .create_policy(NewPolicy { name, description, details })
        .await?;
      println!("created policy {} ({})", policy.name, policy.policy_id);
    }
    PolicyCommand::List => {
      for policy in store.list_policies().await? {
        println!(
          "{}  {}  {}",
          policy.policy_id,
          policy.updated_at.format("%Y-%m-%d %H:%M"),
          policy.name
        );
      }
    }
    PolicyCommand::Show { policy } => {
      let policy = resolve_policy(store, &policy).await?;
      let session = Session::open(store, policy.policy_id).await?;
      println!("{} ({})", policy.name, policy.policy_id);
      if !policy.description.is_empty() {
        println!("{}", policy.description);
      }
      for (i, clause) in session.selection().iter().enumerate() {
        let pin = if clause.pinned { ", pinned" } else { "" };
        println!(
          "{:>3}. {}  v{}{pin}  {}",
          i + 1,
          clause.clause_uuid,
          clause.version_number,
          clause.title
        );
      }
    }
    PolicyCommand::Details { policy, set } => {
      let policy = resolve_policy(store, &policy).await?;
      match set {
        Some(path) => {
          let details = read_details(&path)?;
          store.update_policy_details(policy.policy_id, details).await?;
          println!("updated details of {}", policy.name);
        }
        None => println!("{}", serde_json::to_string_pretty(&policy.details)?),
      }
    }
    PolicyCommand::Select { policy, uuids } => {
      let policy = resolve_policy(store, &policy).await?;
      let mut session = Session::open(store, policy.policy_id).await?;
      let summary = session.select(store, uuids).await?;
      print_bind_summary(&summary);
    }
    PolicyCommand::Pin { policy, uuid, version } => {
      let policy = resolve_policy(store, &policy).await?;
      let mut session = Session::open(store, policy.policy_id).await?;
      session.pin(store, uuid, version).await?;
      println!("{uuid} pinned at version {version} in {}", policy.name);
    }
    PolicyCommand::Unpin { policy, uuid } => {
      let policy = resolve_policy(store, &policy).await?;
      let mut session = Session::open(store, policy.policy_id).await?;
      session.unpin(store, uuid).await?;
      println!("{uuid} follows its current version in {}", policy.name);
    }
    PolicyCommand::Render { policy, output } => {
      let policy = resolve_policy(store, &policy).await?;
      let session = Session::open(store, policy.policy_id).await?;
      write_output(output.as_ref(), &session.document(&policy))?;
    }
    PolicyCommand::Delete { policy, yes } => {
      let policy = resolve_policy(store, &policy).await?;
      if !yes {
        println!("would delete policy {} ({})", policy.name, policy.policy_id);
        println!("re-run with --yes to delete it");
        return Ok(());
      }
      store.delete_policy(policy.policy_id).await?;
      println!("deleted policy {}", policy.name);
    }
  }
  Ok(())
}

// ─── Database ─────────────────────────────────────────────────────────────────

#[derive(Subcommand, Debug)]
pub enum DbCommand {
  /// Write a snapshot of the whole database to FILE.
  Export { file: PathBuf },
  /// Replace the database with the snapshot in FILE.
  Import { file: PathBuf },
}

pub async fn db(store: &mut SqliteStore, command: DbCommand) -> Result<()> {
  match command {
    DbCommand::Export { file } => {
      let bytes = store.export_snapshot().await?;
      std::fs::write(&file, &bytes)
        .with_context(|| format!("failed to write {}", file.display()))?;
      println!("wrote {} bytes to {}", bytes.len(), file.display());
    }
    DbCommand::Import { file } => {
      let bytes =
        std::fs::read(&file).with_context(|| format!("failed to read {}", file.display()))?;
      store.import_snapshot(bytes).await?;
      println!("database replaced from {}", file.display());
    }
  }
  Ok(())
}

#[derive(Args, Debug)]
pub struct ClearArgs {
  /// Confirm wiping every clause, version and policy.
  #[arg(long)]
  pub yes: bool,
}

pub async fn clear(store: &SqliteStore, args: ClearArgs) -> Result<()> {
  if !args.yes {
    bail!("refusing to clear the store without --yes");
  }
  store.clear().await?;
  println!("store cleared");
  Ok(())
}

// ─── Serve ────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct ServeArgs {
  #[arg(long)]
  pub host: Option<String>,
  #[arg(long)]
  pub port: Option<u16>,
}

pub async fn serve(store: SqliteStore, settings: &Settings, args: ServeArgs) -> Result<()> {
  let host = args.host.unwrap_or_else(|| settings.host.clone());
  let port = args.port.unwrap_or(settings.port);
  let address = format!("{host}:{port}");

  let app = axum::Router::new().nest("/api", clausebook_api::api_router(Arc::new(store)));

  tracing::info!("Listening on http://{address}/api");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;
  Ok(())
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

/// Look a policy up by id, falling back to its name.
async fn resolve_policy(store: &SqliteStore, key: &str) -> Result<Policy> {
  let found = match Uuid::parse_str(key) {
    Ok(id) => store.get_policy(id).await?,
    Err(_) => store.find_policy_by_name(key.to_owned()).await?,
  };
  found.with_context(|| format!("no policy named {key:?}"))
}

async fn require_clause(store: &SqliteStore, uuid: Uuid) -> Result<Clause> {
  store
    .get_clause(uuid)
    .await?
    .with_context(|| format!("clause {uuid} not found"))
}

fn print_clause_line(clause: &Clause) {
  println!(
    "{}  v{:<3} {:<12} {:<16} {}",
    clause.clause_uuid,
    clause.version_number,
    clause.insurance_type,
    clause.company,
    clause.title
  );
}

fn print_bind_summary(summary: &BindSummary) {
  println!(
    "{} bound, {} rebound, {} unchanged, {} removed",
    summary.bound, summary.rebound, summary.unchanged, summary.removed
  );
}

fn read_details(path: &Path) -> Result<PolicyDetails> {
  let text = if path.as_os_str() == "-" {
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf).context("failed to read stdin")?;
    buf
  } else {
    std::fs::read_to_string(path)
      .with_context(|| format!("failed to read {}", path.display()))?
  };
  serde_json::from_str(&text).with_context(|| format!("invalid policy details in {}", path.display()))
}

fn write_output(path: Option<&PathBuf>, text: &str) -> Result<()> {
  match path {
    Some(path) => std::fs::write(path, text)
      .with_context(|| format!("failed to write {}", path.display())),
    None => {
      print!("{text}");
      Ok(())
    }
  }
}
