//! File-backed report collection.
//!
//! The whole collection lives in one JSON array file. Every mutation rewrites
//! the file through a temporary sibling and a rename, so the durable file is
//! always a complete snapshot.
//!
//! # Concurrency
//!
//! Mutations are serialized by `write_lock`, which is held across both the
//! in-memory change and the file write. The published snapshot in `reports`
//! is only replaced after the write succeeded, so readers never wait on disk
//! I/O and never see a change that is not yet durable.

use crate::models::{Report, ReportStatus};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode reports: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Clone)]
pub struct ReportStore {
    inner: Arc<Inner>,
}

struct Inner {
    path: PathBuf,
    reports: RwLock<Vec<Report>>,
    write_lock: Mutex<()>,
}

impl ReportStore {
    /// Open the store at `path`, creating an empty collection if the file does not exist.
    pub async fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let reports = load(&path).await?;
        tracing::info!(
            "Loaded {} reports from {}",
            reports.len(),
            path.display()
        );

        Ok(Self {
            inner: Arc::new(Inner {
                path,
                reports: RwLock::new(reports),
                write_lock: Mutex::new(()),
            }),
        })
    }

    pub async fn len(&self) -> usize {
        self.inner.reports.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// All reports in insertion order, optionally restricted to one status.
    pub async fn list(&self, status: Option<ReportStatus>) -> Vec<Report> {
        let reports = self.inner.reports.read().await;
        match status {
            Some(s) => reports.iter().filter(|r| r.status == s).cloned().collect(),
            None => reports.clone(),
        }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Option<Report> {
        self.inner
            .reports
            .read()
            .await
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    /// Run `f` against a copy of the collection, persist the copy, then publish it.
    ///
    /// If `f` fails nothing is written. If the write fails the published
    /// collection is left as it was. The work runs on its own task, so
    /// dropping the caller's future does not stop it between the file write
    /// and the publish.
    pub async fn mutate<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Vec<Report>) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<StoreError> + Send + 'static,
    {
        let inner = self.inner.clone();
        let task = tokio::spawn(async move {
            let _guard = inner.write_lock.lock().await;

            let mut next = inner.reports.read().await.clone();
            let out = f(&mut next)?;

            persist_all(&inner.path, &next).await?;
            *inner.reports.write().await = next;

            Ok::<T, E>(out)
        });

        match task.await {
            Ok(result) => result,
            Err(e) => Err(StoreError::Task(e).into()),
        }
    }
}

/// Read the collection from `path`. A missing file is initialized as `[]`.
pub async fn load(path: &Path) -> StoreResult<Vec<Report>> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::info!("No report file at {}, creating one", path.display());
            persist_all(path, &[]).await?;
            return Ok(Vec::new());
        }
        Err(e) => return Err(StoreError::io(path, e)),
    };

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }

    serde_json::from_slice(&bytes).map_err(|source| StoreError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

/// Replace the file at `path` with `reports`, via `<file>.tmp` and a rename.
pub async fn persist_all(path: &Path, reports: &[Report]) -> StoreResult<()> {
    let body = serde_json::to_vec_pretty(reports)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::io(parent, e))?;
    }

    let tmp = tmp_path(path);
    if let Err(e) = write_synced(&tmp, &body).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(StoreError::io(&tmp, e));
    }

    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(StoreError::io(path, e));
    }

    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "reports.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}

async fn write_synced(path: &Path, body: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(body).await?;
    file.sync_all().await
}
