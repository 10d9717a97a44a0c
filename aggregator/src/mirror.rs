//! Materializing a provider mirror
//!
//! Each provider's content is written into a fresh, uniquely named staging
//! directory below the aggregator's working folder. Staging directories are
//! private to their worker; publication happens separately, by link swap, so a
//! half-written mirror is never visible.

use crate::model::metadata::ProviderMetadata;
use aggregator_common::utils::hex::Hex;
use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use sha2::Digest;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs;
use url::Url;

pub const METADATA_FILE: &str = "provider-metadata.json";
pub const KEYS_DIR: &str = "openpgp";

#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    #[error("{0:#}")]
    Io(anyhow::Error),
    #[error("failed to construct filename from URL: {0}")]
    Filename(Url),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("{url}: digest mismatch, expected {expected}, got {actual}")]
    DigestMismatch {
        url: Url,
        expected: String,
        actual: String,
    },
}

/// Create a directory, including its parents, if it does not exist yet.
///
/// Any error other than the path not existing is passed through.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    match std::fs::metadata(path) {
        Ok(_) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => std::fs::create_dir_all(path),
        Err(err) => Err(err),
    }
}

/// Create a fresh, uniquely named directory below `base`.
///
/// The name starts with `name`; the suffix keeps concurrently processed
/// providers from colliding, even when their names overlap. The directory is
/// claimed with an exclusive create, an existing directory is never reused.
pub fn unique_dir(base: &Path, name: &str) -> Result<PathBuf, MirrorError> {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros();

    for attempt in 0..64u128 {
        let dir = base.join(format!("{name}-{:x}", stamp + attempt));
        match std::fs::create_dir(&dir) {
            Ok(()) => return Ok(dir),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
            Err(err) => {
                return Err(MirrorError::Io(anyhow::Error::new(err).context(format!(
                    "unable to create staging directory: {}",
                    dir.display()
                ))));
            }
        }
    }

    Err(MirrorError::Io(anyhow!(
        "unable to find a unique staging directory name for {name} under {}",
        base.display()
    )))
}

/// Relative storage path of a document below its distribution directory.
///
/// Falls back to the last path segment when the document does not live below
/// the directory URL; never produces an absolute or escaping path.
pub fn document_path(base: Option<&Url>, document: &Url) -> Result<String, MirrorError> {
    if let Some(name) = base.and_then(|base| base.make_relative(document)) {
        if !name.is_empty() && !name.starts_with('/') && !name.split('/').any(|part| part == "..")
        {
            return Ok(name);
        }
    }

    document
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .map(ToString::to_string)
        .ok_or_else(|| MirrorError::Filename(document.clone()))
}

/// Check a served digest line (`<hex> <file>`) against downloaded content.
pub fn checked_digest<D: Digest>(
    data: &[u8],
    served: &str,
    url: &Url,
) -> Result<String, MirrorError> {
    let expected = served
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    let actual = Hex(D::digest(data).as_slice()).to_lower();

    if expected == actual {
        Ok(expected)
    } else {
        Err(MirrorError::DigestMismatch {
            url: url.clone(),
            expected,
            actual,
        })
    }
}

/// A downloaded document plus the integrity side files the provider served.
pub struct DownloadedDocument<'a> {
    pub data: &'a [u8],
    /// Detached OpenPGP signature
    pub signature: Option<&'a str>,
    /// Verified SHA256 digest, lower-case hex
    pub sha256: Option<&'a str>,
    /// Verified SHA512 digest, lower-case hex
    pub sha512: Option<&'a str>,
}

/// Store a document and its side files below the staging directory.
pub async fn store_document(
    file: &Path,
    document: DownloadedDocument<'_>,
) -> Result<(), MirrorError> {
    log::debug!("Writing {}", file.display());

    if let Some(parent) = file.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create parent directory: {}", parent.display()))
            .map_err(MirrorError::Io)?;
    }

    fs::write(&file, document.data)
        .await
        .with_context(|| format!("Failed to write advisory: {}", file.display()))
        .map_err(MirrorError::Io)?;

    if let Some(sha256) = document.sha256 {
        let file = format!("{}.sha256", file.display());
        fs::write(&file, sha256)
            .await
            .with_context(|| format!("Failed to write checksum: {file}"))
            .map_err(MirrorError::Io)?;
    }
    if let Some(sha512) = document.sha512 {
        let file = format!("{}.sha512", file.display());
        fs::write(&file, sha512)
            .await
            .with_context(|| format!("Failed to write checksum: {file}"))
            .map_err(MirrorError::Io)?;
    }
    if let Some(signature) = document.signature {
        let file = format!("{}.asc", file.display());
        fs::write(&file, signature)
            .await
            .with_context(|| format!("Failed to write signature: {file}"))
            .map_err(MirrorError::Io)?;
    }

    Ok(())
}

/// One line of the mirror's change-tracking index.
#[derive(Clone, Debug)]
pub struct IndexEntry {
    /// Storage path relative to the staging directory.
    pub path: String,
    pub changed: DateTime<Utc>,
}

/// Write `index.txt` and `changes.csv` for a completed mirror.
pub async fn write_index(dir: &Path, entries: &[IndexEntry]) -> Result<(), MirrorError> {
    let mut index = entries
        .iter()
        .map(|entry| entry.path.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    if !index.is_empty() {
        index.push('\n');
    }
    fs::write(dir.join("index.txt"), index)
        .await
        .with_context(|| format!("Failed to write index.txt: {}", dir.display()))
        .map_err(MirrorError::Io)?;

    let mut changes = Vec::new();
    {
        let mut writer = csv::Writer::from_writer(&mut changes);
        for entry in entries {
            writer.write_record([entry.path.as_str(), &entry.changed.to_rfc3339()])?;
        }
        writer
            .flush()
            .context("Failed to flush changes.csv")
            .map_err(MirrorError::Io)?;
    }
    fs::write(dir.join("changes.csv"), changes)
        .await
        .with_context(|| format!("Failed to write changes.csv: {}", dir.display()))
        .map_err(MirrorError::Io)?;

    Ok(())
}

/// Write the provider's own metadata document into the mirror.
pub async fn write_provider_metadata(
    dir: &Path,
    metadata: &ProviderMetadata,
) -> Result<(), MirrorError> {
    let mut data = Vec::new();
    metadata
        .save(&mut data)
        .context("Failed serializing provider metadata")
        .map_err(MirrorError::Io)?;

    fs::write(dir.join(METADATA_FILE), data)
        .await
        .with_context(|| format!("Failed to write {METADATA_FILE}: {}", dir.display()))
        .map_err(MirrorError::Io)?;

    Ok(())
}

/// Store a provider's public key file below the mirror's key directory.
pub async fn store_key(dir: &Path, name: &str, data: &[u8]) -> Result<(), MirrorError> {
    let keys = dir.join(KEYS_DIR);
    fs::create_dir_all(&keys)
        .await
        .with_context(|| format!("Failed to create key directory: {}", keys.display()))
        .map_err(MirrorError::Io)?;

    let file = keys.join(format!("{name}.asc"));
    fs::write(&file, data)
        .await
        .with_context(|| format!("Failed to store key: {}", file.display()))
        .map_err(MirrorError::Io)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::Sha256;

    #[test]
    fn unique_dirs_never_collide() {
        let base = tempfile::tempdir().expect("must create");

        let first = unique_dir(base.path(), "example").expect("must create");
        let second = unique_dir(base.path(), "example").expect("must create");

        assert_ne!(first, second);
        assert!(first.is_dir());
        assert!(second.is_dir());
        for dir in [&first, &second] {
            let name = dir
                .file_name()
                .and_then(|name| name.to_str())
                .expect("must have a name");
            assert!(name.starts_with("example-"));
        }
    }

    #[test]
    fn document_paths_stay_below_the_distribution() {
        let base = Url::parse("https://example.com/advisories/").expect("must parse");
        let document =
            Url::parse("https://example.com/advisories/2024/example.json").expect("must parse");
        assert_eq!(
            document_path(Some(&base), &document).expect("must resolve"),
            "2024/example.json"
        );

        // not below the directory URL, fall back to the plain filename
        let foreign = Url::parse("https://example.com/other/example.json").expect("must parse");
        assert_eq!(
            document_path(Some(&base), &foreign).expect("must resolve"),
            "example.json"
        );

        assert_eq!(
            document_path(None, &document).expect("must resolve"),
            "example.json"
        );
    }

    #[test]
    fn digests_are_verified() {
        let url = Url::parse("https://example.com/advisories/a.json").expect("must parse");
        let data = b"payload";
        let digest = Hex(Sha256::digest(data).as_slice()).to_lower();

        let line = format!("{digest}  a.json");
        assert_eq!(
            checked_digest::<Sha256>(data, &line, &url).expect("must match"),
            digest
        );

        let result = checked_digest::<Sha256>(b"tampered", &line, &url);
        assert!(matches!(result, Err(MirrorError::DigestMismatch { .. })));
    }
}
