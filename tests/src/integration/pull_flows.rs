//! # Pull Delivery Flows
//!
//! Receive, acknowledge, release and reject over HTTP against the full
//! gateway.

use super::harness::{test_config, Gateway, WAIT};
use serde_json::{json, Value};
use shared_types::{SubscriberEntry, TopicsConfig};
use std::time::Duration;

fn topics() -> TopicsConfig {
    TopicsConfig::default().with_topic(
        "orders",
        vec![SubscriberEntry::pull("q1"), SubscriberEntry::pull("q2")],
    )
}

fn event(id: &str) -> Value {
    json!({ "id": id, "source": "/orders", "type": "A", "specversion": "1.0" })
}

fn single(results: &Value) -> (String, u64, String) {
    let value = results["value"].as_array().unwrap();
    assert_eq!(value.len(), 1, "expected one delivery: {results}");
    let broker = &value[0]["brokerProperties"];
    (
        broker["lockToken"].as_str().unwrap().to_string(),
        broker["deliveryCount"].as_u64().unwrap(),
        value[0]["event"]["id"].as_str().unwrap().to_string(),
    )
}

fn is_empty(results: &Value) -> bool {
    results["value"].as_array().is_some_and(Vec::is_empty)
}

#[tokio::test]
async fn test_receive_acknowledge_round_trip() {
    let gateway = Gateway::start(topics()).await;
    gateway.publish("orders", &json!([event("1"), event("2")])).await;

    let (token, count, id) = single(&gateway.receive("orders", "q1").await);
    assert_eq!((count, id.as_str()), (1, "1"));

    let result = gateway.settle("orders", "q1", "acknowledge", &[token.as_str()]).await;
    assert_eq!(result, json!({ "succeededLockTokens": [token], "failedLockTokens": [] }));

    let (_, _, id) = single(&gateway.receive("orders", "q1").await);
    assert_eq!(id, "2");

    // Each subscription has its own copy.
    let (_, _, id) = single(&gateway.receive("orders", "q2").await);
    assert_eq!(id, "1");
    gateway.stop().await;
}

#[tokio::test]
async fn test_release_redelivers_with_fresh_token() {
    let gateway = Gateway::start(topics()).await;
    gateway.publish("orders", &event("1")).await;

    let (first, count, _) = single(&gateway.receive("orders", "q1").await);
    assert_eq!(count, 1);
    gateway.settle("orders", "q1", "release", &[first.as_str()]).await;

    // Redelivery still reports deliveryCount 1 on the wire.
    let (second, count, id) = single(&gateway.receive("orders", "q1").await);
    assert_eq!((count, id.as_str()), (1, "1"));
    assert_ne!(first, second);

    // The released token is dead.
    let result = gateway.settle("orders", "q1", "acknowledge", &[first.as_str()]).await;
    assert_eq!(result["failedLockTokens"][0]["lockToken"], first);
    assert_eq!(result["failedLockTokens"][0]["error"]["message"], "invalid token");
    gateway.stop().await;
}

#[tokio::test]
async fn test_reject_removes_event() {
    let gateway = Gateway::start(topics()).await;
    gateway.publish("orders", &event("1")).await;

    let (token, _, _) = single(&gateway.receive("orders", "q1").await);
    let result = gateway.settle("orders", "q1", "reject", &[token.as_str()]).await;
    assert_eq!(result["succeededLockTokens"], json!([token]));

    // Nothing left: the long-poll times out with an empty result.
    assert!(is_empty(&gateway.receive("orders", "q1").await));
    gateway.stop().await;
}

#[tokio::test]
async fn test_mixed_batch_reports_each_token() {
    let gateway = Gateway::start(topics()).await;
    gateway.publish("orders", &json!([event("1"), event("2")])).await;

    let (a, _, _) = single(&gateway.receive("orders", "q1").await);
    let (b, _, _) = single(&gateway.receive("orders", "q1").await);

    let result = gateway
        .settle("orders", "q1", "acknowledge", &[a.as_str(), "bogus", b.as_str()])
        .await;
    assert_eq!(result["succeededLockTokens"], json!([a, b]));
    assert_eq!(result["failedLockTokens"].as_array().unwrap().len(), 1);
    assert_eq!(result["failedLockTokens"][0]["lockToken"], "bogus");
    gateway.stop().await;
}

#[tokio::test]
async fn test_settle_without_body_is_empty_success() {
    let gateway = Gateway::start(topics()).await;

    for body in [None, Some(json!(null)), Some(json!({ "lockTokens": null }))] {
        let response = gateway
            .action("orders", "q1", "acknowledge", body.as_ref())
            .await;
        assert_eq!(response.status(), 200);
        let result: Value = response.json().await.unwrap();
        assert_eq!(result, json!({ "succeededLockTokens": [], "failedLockTokens": [] }));
    }
    gateway.stop().await;
}

#[tokio::test]
async fn test_malformed_lock_token_body_is_bad_request() {
    let gateway = Gateway::start(topics()).await;
    let response = gateway
        .http
        .post(format!(
            "{}/topics/orders/eventsubscriptions/q1:release",
            gateway.base
        ))
        .body("{ nope")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    gateway.stop().await;
}

#[tokio::test]
async fn test_unconfigured_subscription_is_not_found() {
    let gateway = Gateway::start(topics()).await;

    let response = gateway.action("orders", "nope", "receive", None).await;
    assert_eq!(response.status(), 404);
    let response = gateway.action("other", "q1", "receive", None).await;
    assert_eq!(response.status(), 404);
    let response = gateway.action("orders", "q1", "peek", None).await;
    assert_eq!(response.status(), 404);
    gateway.stop().await;
}

#[tokio::test]
async fn test_waiting_receive_wakes_on_publish() {
    let gateway = Gateway::start(topics()).await;

    let pending = {
        let http = gateway.http.clone();
        let url = format!("{}/topics/orders/eventsubscriptions/q1:receive", gateway.base);
        tokio::spawn(async move {
            http.post(url)
                .send()
                .await
                .unwrap()
                .json::<Value>()
                .await
                .unwrap()
        })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    gateway.publish("orders", &event("late")).await;

    let results = tokio::time::timeout(WAIT, pending).await.unwrap().unwrap();
    let (_, _, id) = single(&results);
    assert_eq!(id, "late");
    gateway.stop().await;
}

#[tokio::test]
async fn test_shutdown_ends_waiting_receive() {
    let mut config = test_config(topics());
    config.pull.max_wait_secs = 30;
    let gateway = Gateway::start_with(config).await;

    let pending = {
        let http = gateway.http.clone();
        let url = format!("{}/topics/orders/eventsubscriptions/q1:receive", gateway.base);
        tokio::spawn(async move { http.post(url).send().await.unwrap().status() })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    gateway.stop().await;

    let status = tokio::time::timeout(WAIT, pending).await.unwrap().unwrap();
    assert_eq!(status, 503);
}

#[tokio::test]
async fn test_publish_rules() {
    let mut config = test_config(topics());
    config.server.max_body_bytes = 1024;
    let gateway = Gateway::start_with(config).await;
    let post = |path: String, body: Vec<u8>| {
        let http = gateway.http.clone();
        async move { http.post(path).body(body).send().await.unwrap().status() }
    };

    // Unknown topics accept anything and keep nothing.
    let status = post(format!("{}/topics/ghost:publish", gateway.base), b"garbage".to_vec()).await;
    assert_eq!(status, 200);

    let status = post(format!("{}/topics/orders:publish", gateway.base), b"garbage".to_vec()).await;
    assert_eq!(status, 400);

    let status = post(
        format!("{}/topics/orders:publish", gateway.base),
        br#"[{"id":"1","type":"A"},{"id":"","type":"A"}]"#.to_vec(),
    )
    .await;
    assert_eq!(status, 400);
    // A rejected batch enqueues none of its events.
    assert!(is_empty(&gateway.receive("orders", "q1").await));

    let status = post(format!("{}/topics/orders:publish", gateway.base), vec![b' '; 4096]).await;
    assert_eq!(status, 413);

    let status = post(format!("{}/topics/orders:subscribe", gateway.base), Vec::new()).await;
    assert_eq!(status, 404);

    // Alternate publish route.
    let status = post(
        format!("{}/topics/orders/api/events", gateway.base),
        serde_json::to_vec(&event("1")).unwrap(),
    )
    .await;
    assert_eq!(status, 200);
    let (_, _, id) = single(&gateway.receive("orders", "q1").await);
    assert_eq!(id, "1");
    gateway.stop().await;
}
