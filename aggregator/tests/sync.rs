mod common;

use aggregator_common::fetcher::FetcherOptions;
use aggregator_common::utils::hex::Hex;
use axum::Router;
use axum::routing::get;
use chrono::{Duration, Utc};
use csaf_aggregator::config::{ProviderConfig, RunConfig};
use csaf_aggregator::process::{AGGREGATOR_DIR, Processor, RunMode};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

fn advisory(id: &str) -> Vec<u8> {
    let document = json!({
        "document": {
            "title": format!("Advisory {id}"),
            "tracking": {
                "id": id,
                "status": "final",
                "initial_release_date": "2024-02-01T00:00:00Z",
                "current_release_date": "2024-02-02T00:00:00Z"
            }
        }
    });
    serde_json::to_vec(&document).expect("must serialize")
}

fn metadata_with_feed(origin: &str) -> serde_json::Value {
    let mut metadata = common::provider_metadata(origin);
    metadata["distributions"] = json!([{
        "directory_url": format!("{origin}/advisories/"),
        "rolie": [{
            "feeds": [{
                "summary": "White advisories",
                "tlp_label": "WHITE",
                "url": format!("{origin}/feed-white.json")
            }]
        }]
    }]);
    metadata
}

/// A provider serving one advisory through its first well-known location.
fn alpha_router(origin: &str) -> Router {
    let metadata = metadata_with_feed(origin);
    let feed = json!({
        "feed": {
            "id": "example-white",
            "title": "Example white advisories",
            "updated": "2024-02-02T00:00:00Z",
            "entry": [{
                "id": "EXAMPLE-2024-0001",
                "title": "Advisory EXAMPLE-2024-0001",
                "published": "2024-02-01T00:00:00Z",
                "updated": "2024-02-02T00:00:00Z",
                "content": {
                    "src": format!("{origin}/advisories/2024/example-2024-0001.json"),
                    "type": "application/json"
                }
            }]
        }
    });
    let document = advisory("EXAMPLE-2024-0001");
    let digest_line = format!(
        "{} example-2024-0001.json",
        Hex(Sha256::digest(&document).as_slice()).to_lower()
    );

    Router::new()
        .route(
            "/.well-known/csaf",
            get(move || async move { axum::Json(metadata) }),
        )
        .route("/feed-white.json", get(move || async move { axum::Json(feed) }))
        .route(
            "/advisories/2024/example-2024-0001.json",
            get(move || async move { document }),
        )
        .route(
            "/advisories/2024/example-2024-0001.json.sha256",
            get(move || async move { digest_line }),
        )
}

fn run_config(tmp: &Path, providers: Vec<ProviderConfig>) -> RunConfig {
    RunConfig {
        workers: 2,
        folder: tmp.join("folder"),
        web: tmp.join("web"),
        interim_window_days: Some(30),
        providers,
    }
}

fn provider(name: &str, domain: &str) -> ProviderConfig {
    ProviderConfig {
        name: name.to_string(),
        domain: domain.to_string(),
    }
}

#[tokio::test]
async fn full_sync_publishes_reachable_providers_only() {
    let (listener, origin_alpha) = common::bind().await;
    common::spawn(listener, alpha_router(&origin_alpha));

    // beta answers 404 for everything, including security.txt
    let (listener, origin_beta) = common::bind().await;
    common::spawn(listener, Router::new());

    let tmp = tempfile::tempdir().expect("must create");
    let config = run_config(
        tmp.path(),
        vec![
            provider("alpha", &origin_alpha),
            provider("beta", &origin_beta),
        ],
    );
    let folder = config.folder.clone();
    let web = config.web.clone();
    let processor = Processor::new(config, FetcherOptions::new().retries(0));

    let summary = processor
        .process(RunMode::Full)
        .await
        .expect("the run itself must complete");

    assert_eq!(summary.outcomes.len(), 2);
    assert_eq!(summary.published(), 1);
    assert_eq!(summary.failures(), 1);
    let failed = summary
        .outcomes
        .iter()
        .find(|outcome| outcome.result.is_err())
        .expect("one provider must have failed");
    assert_eq!(failed.name, "beta");

    // alpha is published as a symlink into the working folder
    let link = web.join(AGGREGATOR_DIR).join("alpha");
    let link_meta = fs::symlink_metadata(&link).expect("alpha must be published");
    assert!(link_meta.file_type().is_symlink());
    let mirror = fs::canonicalize(&link).expect("link must resolve");
    assert!(mirror.starts_with(fs::canonicalize(&folder).expect("must resolve")));

    assert!(mirror.join("2024/example-2024-0001.json").is_file());
    assert!(mirror.join("2024/example-2024-0001.json.sha256").is_file());
    assert!(mirror.join("provider-metadata.json").is_file());
    let index = fs::read_to_string(mirror.join("index.txt")).expect("must read");
    assert_eq!(index, "2024/example-2024-0001.json\n");
    let changes = fs::read_to_string(mirror.join("changes.csv")).expect("must read");
    assert!(changes.contains("2024/example-2024-0001.json"));

    // nothing was published for beta, and no staging directory was created
    assert!(fs::symlink_metadata(web.join(AGGREGATOR_DIR).join("beta")).is_err());
    let staged: Vec<_> = fs::read_dir(&folder)
        .expect("must read")
        .map(|entry| entry.expect("must read").file_name().into_string().expect("utf-8"))
        .collect();
    assert!(staged.iter().all(|name| name.starts_with("alpha-")));

    // a second run replaces the mirror and cleans up the stale directory
    let summary = processor
        .process(RunMode::Full)
        .await
        .expect("the second run must complete");
    assert_eq!(summary.published(), 1);

    let staged: Vec<_> = fs::read_dir(&folder)
        .expect("must read")
        .map(|entry| entry.expect("must read").file_name().into_string().expect("utf-8"))
        .collect();
    assert_eq!(staged.len(), 1, "the replaced mirror must be removed: {staged:?}");
    assert!(fs::canonicalize(&link).expect("link must resolve").is_dir());
}

#[tokio::test]
async fn interim_sync_refreshes_recent_documents_only() {
    let (listener, origin) = common::bind().await;

    let recent_updated = (Utc::now() - Duration::days(1)).to_rfc3339();
    let stale_updated = (Utc::now() - Duration::days(300)).to_rfc3339();

    let metadata = metadata_with_feed(&origin);
    let feed = json!({
        "feed": {
            "id": "example-white",
            "title": "Example white advisories",
            "entry": [
                {
                    "id": "EXAMPLE-2024-0002",
                    "title": "Advisory EXAMPLE-2024-0002",
                    "updated": recent_updated,
                    "content": {"src": format!("{origin}/advisories/recent.json")}
                },
                {
                    "id": "EXAMPLE-2023-0001",
                    "title": "Advisory EXAMPLE-2023-0001",
                    "updated": stale_updated,
                    "content": {"src": format!("{origin}/advisories/stale.json")}
                }
            ]
        }
    });
    let recent = advisory("EXAMPLE-2024-0002");
    let stale = advisory("EXAMPLE-2023-0001");
    let app = Router::new()
        .route(
            "/.well-known/csaf",
            get(move || async move { axum::Json(metadata) }),
        )
        .route("/feed-white.json", get(move || async move { axum::Json(feed) }))
        .route("/advisories/recent.json", get(move || async move { recent }))
        .route("/advisories/stale.json", get(move || async move { stale }));
    common::spawn(listener, app);

    let tmp = tempfile::tempdir().expect("must create");
    let config = run_config(tmp.path(), vec![provider("gamma", &origin)]);
    let web = config.web.clone();
    let processor = Processor::new(config, FetcherOptions::new().retries(0));

    let summary = processor
        .process(RunMode::Interim)
        .await
        .expect("the run must complete");
    assert_eq!(summary.published(), 1);

    let mirror =
        fs::canonicalize(web.join(AGGREGATOR_DIR).join("gamma")).expect("must be published");
    assert!(mirror.join("recent.json").is_file());
    assert!(!mirror.join("stale.json").exists());
    let index = fs::read_to_string(mirror.join("index.txt")).expect("must read");
    assert_eq!(index, "recent.json\n");
}
