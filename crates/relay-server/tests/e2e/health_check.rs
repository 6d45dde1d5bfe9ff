use super::common;

#[tokio::test]
async fn health_reports_status_and_version() {
    let (base_url, server) = common::spawn_server().await;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{base_url}/health")).send().await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], "test");

    server.abort();
}
