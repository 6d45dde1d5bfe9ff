use super::common;

#[tokio::test]
async fn invoking_without_authorization_is_rejected() {
    let (base_url, server) = common::spawn_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base_url}/echo-deployment/v1/invoke"))
        .json(&serde_json::json!({"items": [{"content_type": "text", "content": "hello"}]}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);

    server.abort();
}

#[tokio::test]
async fn invoking_a_fresh_conversation_echoes_the_message_and_returns_a_task_id() {
    let (base_url, server) = common::spawn_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base_url}/echo-deployment/v1/invoke"))
        .bearer_auth("u-1")
        .json(&serde_json::json!({"items": [{"content_type": "text", "content": "hello there"}]}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["output"], "hello there");
    assert!(body["task_id"].as_str().unwrap_or_default().len() > 0);

    server.abort();
}

#[tokio::test]
async fn a_second_turn_in_the_same_task_carries_the_task_id_forward() {
    let (base_url, server) = common::spawn_server().await;
    let client = reqwest::Client::new();

    let first = client
        .post(format!("{base_url}/echo-deployment/v1/invoke"))
        .bearer_auth("u-1")
        .json(&serde_json::json!({"items": [{"content_type": "text", "content": "first"}]}))
        .send()
        .await
        .unwrap()
        .json::<serde_json::Value>()
        .await
        .unwrap();
    let task_id = first["task_id"].as_str().unwrap().to_string();

    let second = client
        .post(format!("{base_url}/echo-deployment/v1/invoke"))
        .bearer_auth("u-1")
        .json(&serde_json::json!({"task_id": task_id, "items": [{"content_type": "text", "content": "second"}]}))
        .send()
        .await
        .unwrap()
        .json::<serde_json::Value>()
        .await
        .unwrap();
    assert_eq!(second["task_id"], task_id);
    assert_eq!(second["output"], "second");

    server.abort();
}
