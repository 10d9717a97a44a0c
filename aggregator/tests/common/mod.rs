#![allow(dead_code)]

use axum::Router;
use tokio::net::TcpListener;

/// Bind a loopback listener, returning it together with its origin URL.
pub async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("must bind a loopback listener");
    let addr = listener.local_addr().expect("must have a local address");
    (listener, format!("http://{addr}"))
}

/// Serve the router on the listener for the rest of the test.
pub fn spawn(listener: TcpListener, app: Router) {
    tokio::spawn(async move {
        axum::serve(listener, app)
            .await
            .expect("server must not fail");
    });
}

/// A minimal, valid provider metadata document for the given origin.
pub fn provider_metadata(origin: &str) -> serde_json::Value {
    serde_json::json!({
        "canonical_url": format!("{origin}/.well-known/csaf/provider-metadata.json"),
        "last_updated": "2024-01-02T03:04:05Z",
        "metadata_version": "2.0",
        "publisher": {
            "category": "vendor",
            "name": "Example Org",
            "namespace": "https://example.com"
        }
    })
}
