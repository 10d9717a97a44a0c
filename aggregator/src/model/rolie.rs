use chrono::{DateTime, Utc};
use serde::Deserialize;
use url::Url;

/// A ROLIE feed document, as served by a provider's distribution.
///
/// Only the members the mirroring pipeline consumes are modeled, everything
/// else is ignored.
#[derive(Clone, Debug, Deserialize)]
pub struct RolieFeed {
    pub feed: Feed,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Feed {
    pub id: String,

    pub title: String,

    #[serde(default)]
    pub link: Vec<Link>,

    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,

    #[serde(default)]
    pub entry: Vec<Entry>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Entry {
    pub id: String,

    pub title: String,

    #[serde(default)]
    pub published: Option<DateTime<Utc>>,

    pub updated: DateTime<Utc>,

    pub content: Content,

    #[serde(default)]
    pub link: Vec<Link>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Content {
    pub src: Url,

    #[serde(rename = "type", default)]
    pub content_type: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Link {
    pub rel: String,

    pub href: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_a_feed_document() {
        let data = serde_json::json!({
            "feed": {
                "id": "example-white",
                "title": "Example white advisories",
                "link": [{"rel": "self", "href": "https://example.com/feed-white.json"}],
                "updated": "2024-03-01T00:00:00Z",
                "entry": [{
                    "id": "EXAMPLE-2024-0001",
                    "title": "Example advisory",
                    "published": "2024-02-01T00:00:00Z",
                    "updated": "2024-02-02T00:00:00Z",
                    "content": {
                        "src": "https://example.com/advisories/2024/example-2024-0001.json",
                        "type": "application/json"
                    }
                }]
            }
        });

        let feed: RolieFeed = serde_json::from_value(data).expect("must decode");
        assert_eq!(feed.feed.entry.len(), 1);
        assert_eq!(
            feed.feed.entry[0].content.src.path(),
            "/advisories/2024/example-2024-0001.json"
        );
    }
}
