//! Orchestrating a sync run

use crate::config::{ProviderConfig, RunConfig};
use crate::mirror;
use crate::worker::{DocumentSelection, ProviderReport, Worker, WorkerError};
use aggregator_common::fetcher::{Fetcher, FetcherOptions};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::io::ErrorKind;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};

/// Published location of the aggregate tree below the web root.
pub const AGGREGATOR_DIR: &str = ".well-known/csaf-aggregator";

/// Failure which aborts the whole run.
///
/// Nothing can proceed without the base directories.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("failed to prepare {}: {source}", path.display())]
    Prepare {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read published folder {}: {source}", path.display())]
    ReadPublished {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Why a single provider failed. Never aborts the run.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("failed to create HTTP client: {0}")]
    Client(anyhow::Error),
    #[error(transparent)]
    Worker(#[from] WorkerError),
    #[error("failed to publish mirror: {0}")]
    Publish(#[source] std::io::Error),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RunMode {
    /// Re-download and re-validate every provider's complete document set.
    Full,
    /// Lighter pass, restricted to recently updated documents.
    Interim,
}

#[derive(Debug)]
pub struct ProviderOutcome {
    pub name: String,
    pub result: Result<ProviderReport, ProviderError>,
}

/// Aggregated end-of-run summary.
#[derive(Debug)]
pub struct RunSummary {
    pub outcomes: Vec<ProviderOutcome>,
}

impl RunSummary {
    pub fn published(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(&outcome.result, Ok(report) if report.dir.is_some()))
            .count()
    }

    pub fn failures(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.result.is_err())
            .count()
    }

    pub fn log(&self) {
        for outcome in &self.outcomes {
            match &outcome.result {
                Ok(report) if report.dir.is_some() => log::info!(
                    "{}: ok, {} documents, {} document errors",
                    outcome.name,
                    report.documents(),
                    report.errors.len()
                ),
                Ok(_) => log::info!("{}: listed only, mirroring disabled by provider", outcome.name),
                Err(err) => log::error!("{}: failed: {err}", outcome.name),
            }
        }

        log::info!(
            "{} providers, {} published, {} failed",
            self.outcomes.len(),
            self.published(),
            self.failures()
        );
    }
}

/// Drives a sync run over the configured provider list.
///
/// Workers own their staging directories exclusively and never touch the
/// published folder; the processor alone creates and removes published links,
/// after worker completion. Mutual exclusion by ownership, not locking.
pub struct Processor {
    config: RunConfig,
    options: FetcherOptions,
}

impl Processor {
    pub fn new(config: RunConfig, options: FetcherOptions) -> Self {
        Self { config, options }
    }

    /// Run a full or interim sync.
    pub async fn process(&self, mode: RunMode) -> Result<RunSummary, ProcessError> {
        mirror::ensure_dir(&self.config.folder).map_err(|source| ProcessError::Prepare {
            path: self.config.folder.clone(),
            source,
        })?;
        let web = self.config.web.join(AGGREGATOR_DIR);
        mirror::ensure_dir(&web).map_err(|source| ProcessError::Prepare {
            path: web.clone(),
            source,
        })?;

        self.remove_orphans()?;

        let selection = self.selection(mode);

        let mut outcomes = stream::iter(&self.config.providers)
            .map(|provider| self.run_provider(provider, selection))
            .buffer_unordered(self.config.workers.max(1))
            .collect::<Vec<_>>()
            .await;

        // publication is the processor's job alone, after worker completion
        let prefix =
            std::fs::canonicalize(&self.config.folder).map_err(|source| ProcessError::Prepare {
                path: self.config.folder.clone(),
                source,
            })?;
        for outcome in &mut outcomes {
            let Ok(report) = &outcome.result else {
                continue;
            };
            let Some(dir) = &report.dir else { continue };

            if let Err(err) = publish(&web, &prefix, &outcome.name, dir) {
                log::error!("{}: publishing failed: {err}", outcome.name);
                outcome.result = Err(ProviderError::Publish(err));
            }
        }

        Ok(RunSummary { outcomes })
    }

    async fn run_provider(
        &self,
        provider: &ProviderConfig,
        selection: DocumentSelection,
    ) -> ProviderOutcome {
        let result = async {
            let fetcher = Fetcher::new(self.options.clone())
                .await
                .map_err(ProviderError::Client)?;
            let mut worker = Worker::new(fetcher, self.config.folder.clone(), selection);
            Ok(worker.run(provider).await?)
        }
        .await;

        if let Err(err) = &result {
            log::error!("{}: sync failed: {err}", provider.name);
        }

        ProviderOutcome {
            name: provider.name.clone(),
            result,
        }
    }

    fn selection(&self, mode: RunMode) -> DocumentSelection {
        match (mode, self.config.interim_window_days) {
            (RunMode::Interim, Some(days)) => {
                DocumentSelection::UpdatedSince(Utc::now() - chrono::Duration::days(days as i64))
            }
            _ => DocumentSelection::All,
        }
    }

    /// Reconcile the published tree against the configured provider list.
    ///
    /// Only symbolic links are managed by this sweep, regular entries are
    /// never touched. A link's target directory is removed as well only when
    /// it is unambiguously an aggregator-owned mirror: a direct child of the
    /// canonicalized working folder. Anything else a link may point at is
    /// left in place.
    pub fn remove_orphans(&self) -> Result<(), ProcessError> {
        let keep = self
            .config
            .providers
            .iter()
            .map(|provider| provider.name.as_str())
            .collect::<HashSet<_>>();

        let web = self.config.web.join(AGGREGATOR_DIR);
        let entries = std::fs::read_dir(&web).map_err(|source| ProcessError::ReadPublished {
            path: web.clone(),
            source,
        })?;

        let prefix =
            std::fs::canonicalize(&self.config.folder).map_err(|source| ProcessError::Prepare {
                path: self.config.folder.clone(),
                source,
            })?;

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    log::warn!("error: {err}");
                    continue;
                }
            };
            if keep.contains(entry.file_name().to_string_lossy().as_ref()) {
                continue;
            }

            let path = entry.path();
            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(err) => {
                    log::warn!("error: {err}");
                    continue;
                }
            };

            // only remove the symlinks
            if !file_type.is_symlink() {
                continue;
            }

            // a dangling link is left alone, too
            let target = match std::fs::canonicalize(&path) {
                Ok(target) => target,
                Err(err) => {
                    log::warn!("error resolving {}: {err}", path.display());
                    continue;
                }
            };

            // if it is not a directory, it is not a mirror
            if !target.is_dir() {
                continue;
            }

            log::info!("removing link {} -> {}", path.display(), target.display());
            if let Err(err) = std::fs::remove_file(&path) {
                log::warn!("error: {err}");
                continue;
            }

            // only remove directories which live in our own working folder
            if target.parent() == Some(prefix.as_path()) {
                log::info!("removing directory {}", target.display());
                if let Err(err) = std::fs::remove_dir_all(&target) {
                    log::warn!("error: {err}");
                }
            }
        }

        Ok(())
    }
}

/// Atomically expose a completed staging directory under its published name.
///
/// The link is created under a hidden staging name and swapped in by rename;
/// a reader sees either the previous complete mirror or the new one, never a
/// partial state. The replaced mirror directory is cleaned up after the swap,
/// when it was aggregator-owned.
fn publish(web: &Path, prefix: &Path, name: &str, dir: &Path) -> std::io::Result<()> {
    let dir = std::fs::canonicalize(dir)?;
    let link = web.join(name);

    // the previous mirror, cleaned up after the swap
    let previous = std::fs::canonicalize(&link)
        .ok()
        .filter(|target| target.is_dir());

    let staged = web.join(format!(".{name}.staging"));
    match std::fs::remove_file(&staged) {
        Ok(()) => (),
        Err(err) if err.kind() == ErrorKind::NotFound => (),
        Err(err) => return Err(err),
    }
    symlink(&dir, &staged)?;
    std::fs::rename(&staged, &link)?;

    log::info!("published {} -> {}", link.display(), dir.display());

    if let Some(previous) = previous {
        if previous != dir && previous.parent() == Some(prefix) {
            log::info!("removing replaced mirror {}", previous.display());
            if let Err(err) = std::fs::remove_dir_all(&previous) {
                log::warn!("error: {err}");
            }
        }
    }

    Ok(())
}
