//! Locating provider metadata
//!
//! Providers publish their metadata document under one of a handful of
//! well-known locations; the standards-based last resort is a `CSAF` field in
//! `.well-known/security.txt` pointing at the document.

use crate::model::metadata::ProviderMetadata;
use aggregator_common::fetcher::{self, Fetcher, Json};
use sectxtlib::SecurityTxt;
use url::Url;

/// Well-known locations probed for a provider metadata document, in order.
pub const METADATA_LOCATIONS: &[&str] = &[
    ".well-known/csaf",
    "security/data/csaf",
    "advisories/csaf",
    "security/csaf",
];

const SECURITY_TXT: &str = ".well-known/security.txt";

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("fetch error: {0}")]
    Fetch(#[from] fetcher::Error),
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
    #[error("security.txt parse error: {0}")]
    SecurityTxt(#[from] sectxtlib::ParseError),
    #[error("no provider-metadata.json found in security.txt")]
    NoCsafField,
    #[error("no provider metadata located for {0}")]
    NotLocated(String),
}

/// A located and decoded, but not yet validated, provider metadata document.
#[derive(Clone, Debug)]
pub struct DiscoveredMetadata {
    /// The location the document was found at.
    pub url: Url,
    pub metadata: ProviderMetadata,
}

/// Prefix a domain with `https://`, unless a scheme is already present.
pub fn https_origin(domain: &str) -> String {
    if domain.starts_with("https://") || domain.starts_with("http://") {
        domain.to_string()
    } else {
        format!("https://{domain}")
    }
}

/// Locate the provider metadata document for a domain.
///
/// Probes the well-known locations in order; a not-found moves on to the next
/// candidate while any hard fetch or decode error aborts the resolution. When
/// all candidates are exhausted, `security.txt` is consulted as the last
/// resort.
pub async fn locate_provider_metadata(
    fetcher: &Fetcher,
    domain: &str,
) -> Result<DiscoveredMetadata, DiscoveryError> {
    let origin = https_origin(domain);

    for location in METADATA_LOCATIONS {
        let url = Url::parse(&format!("{origin}/{location}"))?;
        if let Some(metadata) = fetcher
            .fetch::<Option<Json<ProviderMetadata>>>(url.clone())
            .await?
        {
            log::debug!("Found provider metadata at {url}");
            return Ok(DiscoveredMetadata {
                url,
                metadata: metadata.into_inner(),
            });
        }
    }

    // Read from security.txt

    let url = Url::parse(&format!("{origin}/{SECURITY_TXT}"))?;
    let text = match fetcher.fetch::<Option<String>>(url).await {
        Ok(Some(text)) => text,
        // no security.txt means the provider cannot be located at all
        Ok(None) => return Err(DiscoveryError::NotLocated(domain.to_string())),
        Err(fetcher::Error::Request(err)) if err.status().is_some() => {
            return Err(DiscoveryError::NotLocated(domain.to_string()));
        }
        Err(err) => return Err(err.into()),
    };

    let url = Url::parse(&provider_url_from_security_txt(&text)?)?;
    log::debug!("security.txt points at {url}");

    match fetcher
        .fetch::<Option<Json<ProviderMetadata>>>(url.clone())
        .await?
    {
        Some(metadata) => Ok(DiscoveredMetadata {
            url,
            metadata: metadata.into_inner(),
        }),
        None => Err(DiscoveryError::NotLocated(domain.to_string())),
    }
}

/// Extract the first `CSAF` field value from a `security.txt` body.
///
/// Only exact matches are honored: the field must carry a URL ending in
/// `/provider-metadata.json`.
pub fn provider_url_from_security_txt(text: &str) -> Result<String, DiscoveryError> {
    let parsed = SecurityTxt::parse(text)?;

    parsed
        .extension
        .into_iter()
        .filter(|field| field.name.eq_ignore_ascii_case("csaf"))
        .map(|field| field.value)
        .find(|value| value.ends_with("/provider-metadata.json"))
        .ok_or(DiscoveryError::NoCsafField)
}
