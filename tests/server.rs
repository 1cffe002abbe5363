mod support;

use std::sync::Arc;
use tempfile::TempDir;

use support::{line, services, write_transcript, HashEmbedder};
use transcript_recall::server::{router, AppState};

const T: u64 = 1_700_000_000;

/// Serve the router on an ephemeral port; returns the base URL.
async fn spawn(tmp: &TempDir) -> (String, std::path::PathBuf) {
    let (config, services) = services(tmp.path(), HashEmbedder::new()).await;
    let app = router(AppState::new(Arc::new(services)));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), config.archive.root)
}

#[tokio::test]
async fn test_health_and_empty_stats() {
    let tmp = TempDir::new().unwrap();
    let (base, _) = spawn(&tmp).await;
    let client = reqwest::Client::new();

    let health: serde_json::Value = client
        .get(format!("{}/health", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    let stats: serde_json::Value = client
        .get(format!("{}/stats", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["total_messages"], 0);
    assert_eq!(stats["sessions"], 0);
    assert_eq!(stats["projects"], 0);
}

#[tokio::test]
async fn test_search_validation_and_empty_corpus() {
    let tmp = TempDir::new().unwrap();
    let (base, _) = spawn(&tmp).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/search", base))
        .json(&serde_json::json!({"query": "  "}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");

    let body: serde_json::Value = client
        .post(format!("{}/search", base))
        .json(&serde_json::json!({"query": "kafka consumer lag"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(
        body["result"],
        "No relevant conversations found for: kafka consumer lag"
    );
}

#[tokio::test]
async fn test_ingest_then_search_and_session() {
    let tmp = TempDir::new().unwrap();
    let (base, archive) = spawn(&tmp).await;
    let client = reqwest::Client::new();

    write_transcript(
        &archive,
        "-work-stream",
        "sess-k",
        &[
            line("u-1", "user", "Why is the kafka consumer lag growing overnight?"),
            line("a-1", "assistant", "The consumer group rebalances every time a pod restarts."),
        ],
        T,
    );

    let totals: serde_json::Value = client
        .post(format!("{}/ingest", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(totals["files"], 1);
    assert_eq!(totals["messages"], 2);
    assert_eq!(totals["failed"], 0);

    let body: serde_json::Value = client
        .post(format!("{}/search", base))
        .json(&serde_json::json!({"query": "kafka consumer lag"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let result = body["result"].as_str().unwrap();
    assert!(result.contains("kafka consumer lag growing overnight"));

    let session: serde_json::Value = client
        .get(format!("{}/sessions/sess-k", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(session["session_id"], "sess-k");
    assert_eq!(session["messages"].as_array().unwrap().len(), 2);
    assert_eq!(session["messages"][0]["project_path"], "/work/stream");

    let missing = client
        .get(format!("{}/sessions/nope", base))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);
}
