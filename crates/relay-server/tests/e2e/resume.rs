use super::common;

#[tokio::test]
async fn resuming_a_running_task_returns_gone() {
    let (base_url, server) = common::spawn_server().await;
    let client = reqwest::Client::new();

    let invoked = client
        .post(format!("{base_url}/echo-deployment/v1/invoke"))
        .bearer_auth("u-1")
        .json(&serde_json::json!({"items": [{"content_type": "text", "content": "hi"}]}))
        .send()
        .await
        .unwrap()
        .json::<serde_json::Value>()
        .await
        .unwrap();
    let task_id = invoked["task_id"].as_str().unwrap();

    let resp = client
        .post(format!("{base_url}/echo-deployment/v1/resume/{task_id}"))
        .bearer_auth("u-1")
        .json(&serde_json::json!({"action": "approve"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::GONE);

    server.abort();
}

#[tokio::test]
async fn resuming_an_unknown_task_returns_not_found() {
    let (base_url, server) = common::spawn_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base_url}/echo-deployment/v1/resume/no-such-task"))
        .bearer_auth("u-1")
        .json(&serde_json::json!({"action": "approve"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);

    server.abort();
}
