//! Per-provider sync work

use crate::config::ProviderConfig;
use crate::discover::{self, DiscoveryError};
use crate::mirror::{self, DownloadedDocument, IndexEntry, MirrorError};
use crate::model::advisory::AdvisorySummary;
use crate::model::metadata::{ProviderMetadata, ValidationError};
use crate::model::rolie::{Entry, RolieFeed};
use aggregator_common::fetcher::{Fetcher, Json};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::try_join;
use sha2::{Sha256, Sha512};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use url::Url;

/// Which feed entries a sync run re-fetches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DocumentSelection {
    /// Everything, the full sync mode.
    #[default]
    All,
    /// Only entries updated at or after the cutoff, the interim mode.
    UpdatedSince(DateTime<Utc>),
}

impl DocumentSelection {
    fn selects(&self, updated: DateTime<Utc>) -> bool {
        match self {
            Self::All => true,
            Self::UpdatedSince(cutoff) => updated >= *cutoff,
        }
    }
}

/// Failure which terminates a single provider's task.
///
/// Never fatal to sibling providers.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error("invalid provider metadata: {0}")]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Mirror(#[from] MirrorError),
}

/// Summary entry for one mirrored document.
#[derive(Clone, Debug)]
pub struct DocumentSummary {
    /// Storage path relative to the mirror directory.
    pub filename: String,
    pub url: Url,
    pub advisory: AdvisorySummary,
}

/// A per-document failure; the provider itself still counts as synced.
#[derive(Clone, Debug)]
pub struct DocumentError {
    pub url: String,
    pub message: String,
}

impl DocumentError {
    fn new(url: impl ToString, message: impl ToString) -> Self {
        Self {
            url: url.to_string(),
            message: message.to_string(),
        }
    }
}

/// Result of one provider's completed sync task.
#[derive(Debug)]
pub struct ProviderReport {
    pub name: String,
    /// Location the provider metadata was discovered at.
    pub metadata_url: Url,
    /// Completed staging directory, [`None`] when the provider opted out of
    /// mirroring and is listed only.
    pub dir: Option<PathBuf>,
    /// Advisory summaries, keyed by feed URL.
    pub summaries: HashMap<String, Vec<DocumentSummary>>,
    pub errors: Vec<DocumentError>,
}

impl ProviderReport {
    pub fn documents(&self) -> usize {
        self.summaries.values().map(Vec::len).sum()
    }
}

/// A per-provider unit of work.
///
/// Owns one HTTP client for the provider's lifetime and a private staging
/// directory. Shares no mutable state with sibling workers; the processor
/// aggregates the report after completion.
pub struct Worker {
    fetcher: Fetcher,
    folder: PathBuf,
    selection: DocumentSelection,
    dir: Option<PathBuf>,
}

impl Worker {
    pub fn new(fetcher: Fetcher, folder: impl Into<PathBuf>, selection: DocumentSelection) -> Self {
        Self {
            fetcher,
            folder: folder.into(),
            selection,
            dir: None,
        }
    }

    /// Staging directory of the current task, created on first use.
    fn staging_dir(&mut self, name: &str) -> Result<PathBuf, MirrorError> {
        if let Some(dir) = &self.dir {
            return Ok(dir.clone());
        }

        let dir = mirror::unique_dir(&self.folder, name)?;
        self.dir = Some(dir.clone());
        Ok(dir)
    }

    /// Sync a single provider into a fresh staging directory.
    ///
    /// Failing to resolve or validate the metadata document terminates the
    /// task; a single document's failure is recorded in the report and
    /// processing continues with the next document.
    pub async fn run(&mut self, provider: &ProviderConfig) -> Result<ProviderReport, WorkerError> {
        self.dir = None;

        let discovered =
            discover::locate_provider_metadata(&self.fetcher, &provider.domain).await?;
        log::debug!(
            "{}: provider metadata at {}",
            provider.name,
            discovered.url
        );
        let mut metadata = discovered.metadata;
        metadata.validate()?;
        metadata.apply_defaults();

        if metadata.mirror_on_csaf_aggregators == Some(false) {
            log::info!(
                "{}: provider opted out of mirroring, listing only",
                provider.name
            );
            return Ok(ProviderReport {
                name: provider.name.clone(),
                metadata_url: discovered.url,
                dir: None,
                summaries: HashMap::new(),
                errors: Vec::new(),
            });
        }

        let dir = self.staging_dir(&provider.name)?;

        let mut summaries = HashMap::new();
        let mut errors = Vec::new();
        let mut index = Vec::new();

        for distribution in &metadata.distributions {
            let base = distribution.directory_url.as_ref();
            for rolie in &distribution.rolie {
                for feed in &rolie.feeds {
                    let Some(feed_url) = &feed.url else { continue };
                    let feed_url = match feed_url.to_url() {
                        Ok(url) => url,
                        Err(err) => {
                            errors.push(DocumentError::new(feed_url, err));
                            continue;
                        }
                    };

                    match self
                        .mirror_feed(&dir, base, &feed_url, &mut index, &mut errors)
                        .await
                    {
                        Ok(feed_summaries) => {
                            summaries.insert(feed_url.to_string(), feed_summaries);
                        }
                        Err(error) => errors.push(error),
                    }
                }
            }
        }

        self.mirror_keys(&dir, &metadata, &mut errors).await;

        mirror::write_provider_metadata(&dir, &metadata).await?;
        mirror::write_index(&dir, &index).await?;

        log::info!(
            "{}: mirrored {} documents, {} errors",
            provider.name,
            index.len(),
            errors.len()
        );

        Ok(ProviderReport {
            name: provider.name.clone(),
            metadata_url: discovered.url,
            dir: Some(dir),
            summaries,
            errors,
        })
    }

    async fn mirror_feed(
        &self,
        dir: &Path,
        base: Option<&Url>,
        feed_url: &Url,
        index: &mut Vec<IndexEntry>,
        errors: &mut Vec<DocumentError>,
    ) -> Result<Vec<DocumentSummary>, DocumentError> {
        log::debug!("Walking feed: {feed_url}");

        let feed = self
            .fetcher
            .fetch::<Option<Json<RolieFeed>>>(feed_url.clone())
            .await
            .map_err(|err| DocumentError::new(feed_url, err))?
            .ok_or_else(|| DocumentError::new(feed_url, "feed not found"))?;

        let mut summaries = Vec::new();

        for entry in &feed.feed.entry {
            if !self.selection.selects(entry.updated) {
                log::debug!("Skipping {}: unchanged within the sync window", entry.id);
                continue;
            }

            match self.mirror_document(dir, base, entry).await {
                Ok((summary, entry)) => {
                    index.push(entry);
                    summaries.push(summary);
                }
                Err(error) => errors.push(error),
            }
        }

        Ok(summaries)
    }

    async fn mirror_document(
        &self,
        dir: &Path,
        base: Option<&Url>,
        entry: &Entry,
    ) -> Result<(DocumentSummary, IndexEntry), DocumentError> {
        let url = &entry.content.src;

        let data = self
            .fetcher
            .fetch::<Option<Bytes>>(url.clone())
            .await
            .map_err(|err| DocumentError::new(url, err))?
            .ok_or_else(|| DocumentError::new(url, "document not found"))?;

        // integrity and signature side files, where the provider serves them
        let (signature, sha256, sha512) = try_join!(
            self.fetcher.fetch::<Option<String>>(format!("{url}.asc")),
            self.fetcher.fetch::<Option<String>>(format!("{url}.sha256")),
            self.fetcher.fetch::<Option<String>>(format!("{url}.sha512")),
        )
        .map_err(|err| DocumentError::new(url, err))?;

        let sha256 = sha256
            .map(|line| mirror::checked_digest::<Sha256>(&data, &line, url))
            .transpose()
            .map_err(|err| DocumentError::new(url, err))?;
        let sha512 = sha512
            .map(|line| mirror::checked_digest::<Sha512>(&data, &line, url))
            .transpose()
            .map_err(|err| DocumentError::new(url, err))?;

        let advisory =
            AdvisorySummary::from_document(&data).map_err(|err| DocumentError::new(url, err))?;

        let filename =
            mirror::document_path(base, url).map_err(|err| DocumentError::new(url, err))?;
        mirror::store_document(
            &dir.join(&filename),
            DownloadedDocument {
                data: &data,
                signature: signature.as_deref(),
                sha256: sha256.as_deref(),
                sha512: sha512.as_deref(),
            },
        )
        .await
        .map_err(|err| DocumentError::new(url, err))?;

        Ok((
            DocumentSummary {
                filename: filename.clone(),
                url: url.clone(),
                advisory,
            },
            IndexEntry {
                path: filename,
                changed: entry.updated,
            },
        ))
    }

    /// Mirror the provider's public key files; verification of the keys
    /// themselves is not a concern of the aggregation pipeline.
    async fn mirror_keys(
        &self,
        dir: &Path,
        metadata: &ProviderMetadata,
        errors: &mut Vec<DocumentError>,
    ) {
        for (i, key) in metadata.pgp_keys.iter().enumerate() {
            let Some(url) = &key.url else { continue };
            let name = match &key.fingerprint {
                Some(fingerprint) => fingerprint.as_str().to_string(),
                None => format!("key-{i}"),
            };

            match self.fetcher.fetch::<Option<Bytes>>(url.as_str()).await {
                Ok(Some(data)) => {
                    if let Err(err) = mirror::store_key(dir, &name, &data).await {
                        errors.push(DocumentError::new(url, err));
                    }
                }
                Ok(None) => errors.push(DocumentError::new(url, "key not found")),
                Err(err) => errors.push(DocumentError::new(url, err)),
            }
        }
    }
}
