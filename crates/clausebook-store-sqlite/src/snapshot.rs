//! Whole-database snapshots: export a consistent copy of the store file and
//! swap a new one in with a restore-on-failure safety net.

use std::{
  ffi::OsString,
  path::{Path, PathBuf},
};

use clausebook_core::Error as CoreError;
use tokio::io::AsyncWriteExt as _;
use uuid::Uuid;

use crate::{
  Error, Result, SqliteStore,
  schema::{REQUIRED_COLUMNS, SCHEMA_VERSION},
};

/// Files SQLite may keep next to a database in WAL mode.
const SIDECARS: [&str; 3] = ["", "-wal", "-shm"];

impl SqliteStore {
  /// A consistent copy of the whole database as SQLite file bytes.
  pub async fn export_snapshot(&self) -> Result<Vec<u8>> {
    let target = std::env::temp_dir().join(format!("clausebook-export-{}.db", Uuid::new_v4()));
    let target_str = target.to_string_lossy().into_owned();

    self
      .conn
      .call(move |conn| {
        conn.execute("VACUUM INTO ?1", rusqlite::params![target_str])?;
        Ok(())
      })
      .await?;

    let bytes = tokio::fs::read(&target).await;
    remove_quietly(&target).await;
    let bytes = bytes?;

    tracing::info!(bytes = bytes.len(), "exported database snapshot");
    Ok(bytes)
  }

  /// Replace the database with `bytes`.
  ///
  /// The candidate is verified before the current file is touched. After the
  /// swap starts, any failure moves the previous database back and reopens
  /// it. On every path `self` ends up holding an open connection; other
  /// clones of this store keep the closed one.
  pub async fn import_snapshot(&mut self, bytes: Vec<u8>) -> Result<()> {
    let Some(path) = self.path.clone() else {
      return Err(
        CoreError::InvalidOperation("snapshot import needs a file-backed store".into()).into(),
      );
    };
    let incoming = with_suffix(&path, ".incoming");
    let backup = with_suffix(&path, ".bak");

    write_synced(&incoming, &bytes).await?;
    if let Err(e) = verify_snapshot(&incoming).await {
      remove_quietly(&incoming).await;
      return Err(e);
    }

    self.conn.clone().close().await?;

    let swapped = async {
      move_database(&path, &backup).await?;
      tokio::fs::rename(&incoming, &path).await?;
      SqliteStore::open(&path).await
    }
    .await;

    match swapped {
      Ok(store) => {
        *self = store;
        remove_database(&backup).await;
        tracing::info!(path = %path.display(), bytes = bytes.len(), "imported database snapshot");
        Ok(())
      }
      Err(e) => {
        tracing::warn!(error = %e, path = %path.display(), "snapshot import failed, restoring backup");
        remove_quietly(&incoming).await;
        if exists(&backup).await {
          remove_database(&path).await;
          move_database(&backup, &path).await?;
        }
        *self = SqliteStore::open(&path).await?;
        Err(e)
      }
    }
  }
}

/// Open the candidate on its own connection and check it is a sound clause
/// store of a revision this build can open: integrity, `user_version`, and
/// every column the store reads.
async fn verify_snapshot(path: &Path) -> Result<()> {
  let conn = tokio_rusqlite::Connection::open(path)
    .await
    .map_err(|e| Error::InvalidSnapshot(e.to_string()))?;

  let checked = conn
    .call(|conn| {
      let status: String = conn.query_row("PRAGMA integrity_check", [], |r| r.get(0))?;
      if status != "ok" {
        return Ok(Err(format!("integrity check failed: {status}")));
      }

      let version: u32 = conn.pragma_query_value(None, "user_version", |r| r.get(0))?;
      if !(1..=SCHEMA_VERSION).contains(&version) {
        return Ok(Err(format!(
          "unsupported schema version {version} (expected 1 to {SCHEMA_VERSION})"
        )));
      }

      for (table, columns) in REQUIRED_COLUMNS {
        if let Err(e) = conn.prepare(&format!("SELECT {columns} FROM {table} LIMIT 0")) {
          return Ok(Err(format!("table {table} does not match the store layout: {e}")));
        }
      }
      Ok(Ok(()))
    })
    .await;

  if let Err(e) = conn.close().await {
    tracing::debug!(error = %e, "closing snapshot candidate failed");
  }

  match checked {
    Ok(Ok(())) => Ok(()),
    Ok(Err(reason)) => Err(Error::InvalidSnapshot(reason)),
    Err(e) => Err(Error::InvalidSnapshot(e.to_string())),
  }
}

// ─── File helpers ────────────────────────────────────────────────────────────

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
  let mut name = OsString::from(path.as_os_str());
  name.push(suffix);
  PathBuf::from(name)
}

async fn exists(path: &Path) -> bool { tokio::fs::metadata(path).await.is_ok() }

async fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
  let mut file = tokio::fs::File::create(path).await?;
  file.write_all(bytes).await?;
  file.sync_all().await?;
  Ok(())
}

/// Rename a database and whichever of its sidecar files exist.
async fn move_database(from: &Path, to: &Path) -> Result<()> {
  for suffix in SIDECARS {
    let src = with_suffix(from, suffix);
    if exists(&src).await {
      tokio::fs::rename(&src, with_suffix(to, suffix)).await?;
    }
  }
  Ok(())
}

async fn remove_database(path: &Path) {
  for suffix in SIDECARS {
    remove_quietly(&with_suffix(path, suffix)).await;
  }
}

async fn remove_quietly(path: &Path) {
  match tokio::fs::remove_file(path).await {
    Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
      tracing::warn!(error = %e, path = %path.display(), "failed to remove file");
    }
    _ => {}
  }
}
