use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Read, Write};
use url::Url;

/// Structural validation failure of a provider metadata document.
///
/// Validation short-circuits, only the first violation found is reported.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} is mandatory")]
    Missing(&'static str),
    #[error("ROLIE needs at least one feed")]
    EmptyRolie,
    #[error("{value:?} does not match {expected}")]
    Pattern {
        value: String,
        expected: &'static str,
    },
}

/// Error when loading a provider metadata document from a byte stream.
///
/// Decode failure and validation failure both reject the document outright.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("JSON decode error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid provider metadata: {0}")]
    Validation(#[from] ValidationError),
}

/// URL of a provider metadata document, ending in `/provider-metadata.json`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProviderUrl(String);

impl ProviderUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ProviderUrl {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.ends_with("/provider-metadata.json") {
            true => Ok(Self(value)),
            false => Err(ValidationError::Pattern {
                value,
                expected: r"/provider-metadata\.json$",
            }),
        }
    }
}

impl From<ProviderUrl> for String {
    fn from(value: ProviderUrl) -> Self {
        value.0
    }
}

impl fmt::Display for ProviderUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// URL of a JSON document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JsonUrl(String);

impl JsonUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&self.0)
    }
}

impl TryFrom<String> for JsonUrl {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.ends_with(".json") {
            true => Ok(Self(value)),
            false => Err(ValidationError::Pattern {
                value,
                expected: r"\.json$",
            }),
        }
    }
}

impl From<JsonUrl> for String {
    fn from(value: JsonUrl) -> Self {
        value.0
    }
}

impl fmt::Display for JsonUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fingerprint of an OpenPGP key used to sign the documents, at least 40 hex
/// digits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let valid = value.len() >= 40 && value.bytes().all(|b| b.is_ascii_hexdigit());
        match valid {
            true => Ok(Self(value)),
            false => Err(ValidationError::Pattern {
                value,
                expected: r"^[0-9a-fA-F]{40,}$",
            }),
        }
    }
}

impl From<Fingerprint> for String {
    fn from(value: Fingerprint) -> Self {
        value.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Traffic light protocol label of a feed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TlpLabel {
    Unlabeled,
    White,
    Green,
    Amber,
    Red,
}

/// Category of the publisher.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Coordinator,
    Discoverer,
    Other,
    Translator,
    User,
    Vendor,
}

/// Version of the metadata schema.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetadataVersion {
    #[default]
    #[serde(rename = "2.0")]
    V2_0,
}

/// Role of the issuing party.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "csaf_publisher")]
    Publisher,
    #[default]
    #[serde(rename = "csaf_provider")]
    Provider,
    #[serde(rename = "csaf_trusted_provider")]
    TrustedProvider,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feed {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// Required, checked by [`Feed::validate`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tlp_label: Option<TlpLabel>,

    /// Required, checked by [`Feed::validate`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<JsonUrl>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rolie {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<JsonUrl>,

    #[serde(default)]
    pub feeds: Vec<Feed>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<JsonUrl>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory_url: Option<Url>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rolie: Vec<Rolie>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PgpKey {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<Fingerprint>,

    /// Required, checked by [`PgpKey::validate`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publisher {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_details: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuing_authority: Option<String>,
}

/// A provider's published capability descriptor.
///
/// Decoding is permissive: unknown fields are ignored and required fields may
/// be absent. Required-ness is a [`ProviderMetadata::validate`] concern,
/// mirroring the document's two-phase life of decode-then-validate. Value
/// patterns (URLs, fingerprints, enumerations) are checked at construction and
/// cannot be bypassed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_url: Option<ProviderUrl>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub distributions: Vec<Distribution>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,

    #[serde(
        rename = "list_on_CSAF_aggregators",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub list_on_csaf_aggregators: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_version: Option<MetadataVersion>,

    #[serde(
        rename = "mirror_on_CSAF_aggregators",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub mirror_on_csaf_aggregators: Option<bool>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pgp_keys: Vec<PgpKey>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<Publisher>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

impl Feed {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.tlp_label.is_none() {
            return Err(ValidationError::Missing("feed[].tlp_label"));
        }
        if self.url.is_none() {
            return Err(ValidationError::Missing("feed[].url"));
        }
        Ok(())
    }
}

impl Rolie {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.feeds.is_empty() {
            return Err(ValidationError::EmptyRolie);
        }
        for feed in &self.feeds {
            feed.validate()?;
        }
        Ok(())
    }
}

impl Distribution {
    pub fn validate(&self) -> Result<(), ValidationError> {
        for rolie in &self.rolie {
            rolie.validate()?;
        }
        Ok(())
    }
}

impl PgpKey {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.url.is_none() {
            return Err(ValidationError::Missing("pgp_key[].url"));
        }
        Ok(())
    }
}

impl Publisher {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.category.is_none() {
            return Err(ValidationError::Missing("publisher.category"));
        }
        if self.name.is_none() {
            return Err(ValidationError::Missing("publisher.name"));
        }
        if self.namespace.is_none() {
            return Err(ValidationError::Missing("publisher.namespace"));
        }
        Ok(())
    }
}

impl ProviderMetadata {
    /// Create a new document with defaults applied, considered updated now.
    pub fn new(canonical_url: ProviderUrl) -> Self {
        let mut metadata = Self {
            canonical_url: Some(canonical_url),
            ..Default::default()
        };
        metadata.apply_defaults();
        metadata.set_last_updated(Utc::now());
        metadata
    }

    /// Fill in default values, only where a value is absent.
    ///
    /// Idempotent, never overwrites an explicit value.
    pub fn apply_defaults(&mut self) {
        self.role.get_or_insert(Role::Provider);
        self.list_on_csaf_aggregators.get_or_insert(true);
        self.mirror_on_csaf_aggregators.get_or_insert(true);
        self.metadata_version.get_or_insert(MetadataVersion::V2_0);
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.canonical_url.is_none() {
            return Err(ValidationError::Missing("canonical_url"));
        }
        if self.last_updated.is_none() {
            return Err(ValidationError::Missing("last_updated"));
        }
        if self.metadata_version.is_none() {
            return Err(ValidationError::Missing("metadata_version"));
        }

        match &self.publisher {
            None => return Err(ValidationError::Missing("publisher")),
            Some(publisher) => publisher.validate()?,
        }

        for key in &self.pgp_keys {
            key.validate()?;
        }

        for distribution in &self.distributions {
            distribution.validate()?;
        }

        Ok(())
    }

    /// Store the last updated timestamp, normalized to UTC.
    pub fn set_last_updated<Tz: TimeZone>(&mut self, time: DateTime<Tz>) {
        self.last_updated = Some(time.with_timezone(&Utc));
    }

    /// Upsert the URL of an OpenPGP key by fingerprint.
    ///
    /// If a key with the given fingerprint exists its URL is updated in place,
    /// otherwise a new binding is appended. Keys are never removed.
    pub fn set_pgp_key(&mut self, fingerprint: Fingerprint, url: impl Into<String>) {
        let url = url.into();
        for key in &mut self.pgp_keys {
            if key.fingerprint.as_ref() == Some(&fingerprint) {
                key.url = Some(url);
                return;
            }
        }
        self.pgp_keys.push(PgpKey {
            fingerprint: Some(fingerprint),
            url: Some(url),
        });
    }

    /// Decode a document, validate it, and apply defaults.
    pub fn load(reader: impl Read) -> Result<Self, LoadError> {
        let mut metadata: Self = serde_json::from_reader(reader)?;
        metadata.validate()?;
        metadata.apply_defaults();
        Ok(metadata)
    }

    /// Serialize with stable two-space indentation, for reproducible diffs.
    pub fn save(&self, mut writer: impl Write) -> std::io::Result<()> {
        let mut data = serde_json::to_vec_pretty(self)?;
        data.push(b'\n');
        writer.write_all(&data)
    }
}
