use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Error extracting a summary from an advisory document.
#[derive(Debug, thiserror::Error)]
pub enum SummaryError {
    #[error("advisory is not a JSON document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("advisory has no {0}")]
    Missing(&'static str),
}

/// Summary of a mirrored advisory, extracted from the document itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvisorySummary {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_release_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_release_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl AdvisorySummary {
    /// Extract the summary members from a raw advisory document.
    ///
    /// `document.tracking.id` and `document.title` must be present, the
    /// release dates and the tracking status are taken when available.
    pub fn from_document(data: &[u8]) -> Result<Self, SummaryError> {
        let document: serde_json::Value = serde_json::from_slice(data)?;

        let id = document
            .pointer("/document/tracking/id")
            .and_then(serde_json::Value::as_str)
            .ok_or(SummaryError::Missing("document.tracking.id"))?
            .to_string();
        let title = document
            .pointer("/document/title")
            .and_then(serde_json::Value::as_str)
            .ok_or(SummaryError::Missing("document.title"))?
            .to_string();

        let date = |pointer| {
            document
                .pointer(pointer)
                .and_then(serde_json::Value::as_str)
                .and_then(|value| value.parse().ok())
        };

        Ok(Self {
            id,
            title,
            initial_release_date: date("/document/tracking/initial_release_date"),
            current_release_date: date("/document/tracking/current_release_date"),
            status: document
                .pointer("/document/tracking/status")
                .and_then(serde_json::Value::as_str)
                .map(ToString::to_string),
        })
    }
}
