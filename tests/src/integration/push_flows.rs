//! # Push Delivery Flows
//!
//! Publish over HTTP, observe what the webhook receives.
//!
//! ```text
//! test ──POST :publish──► gateway ──fan-out──► webhook (records)
//! ```

use super::harness::{Gateway, Webhook};
use serde_json::json;
use shared_types::{EventFilter, SubscriberEntry, TopicsConfig, DEFAULT_SOURCE_PREFIX};
use std::sync::Arc;
use std::time::Duration;

fn event(id: &str, event_type: &str) -> serde_json::Value {
    json!({
        "id": id,
        "source": "/orders",
        "type": event_type,
        "specversion": "1.0",
        "data": { "n": id },
    })
}

#[tokio::test]
async fn test_fan_out_applies_per_subscriber_filters() {
    let hook = Webhook::start().await;
    let topics = TopicsConfig::default().with_topic(
        "orders",
        vec![
            SubscriberEntry::push(hook.url("all")),
            SubscriberEntry::push(hook.url("only-a")).with_filter(EventFilter::types(["A"])),
        ],
    );
    let gateway = Gateway::start(topics).await;

    let response = gateway
        .publish("orders", &json!([event("1", "A"), event("2", "B")]))
        .await;
    assert_eq!(response.status(), 200);

    hook.wait_for(2).await;
    let all = hook.received_by("all");
    let only_a = hook.received_by("only-a");
    assert_eq!(all.len(), 1);
    assert_eq!(only_a.len(), 1);

    let ids = |events: &[serde_json::Value]| -> Vec<String> {
        events.iter().map(|e| e["id"].as_str().unwrap().to_string()).collect()
    };
    assert_eq!(ids(&all[0].events), vec!["1", "2"]);
    assert_eq!(ids(&only_a[0].events), vec!["1"]);

    assert_eq!(all[0].event_type_header.as_deref(), Some("Notification"));
    assert_eq!(all[0].delivery_count.as_deref(), Some("0"));

    gateway.wait_for_stats(|s| s.succeeded == 2).await;
    gateway.stop().await;
}

#[tokio::test]
async fn test_filter_rejecting_every_event_sends_nothing() {
    let hook = Webhook::start().await;
    let topics = TopicsConfig::default().with_topic(
        "orders",
        vec![
            SubscriberEntry::push(hook.url("only-c")).with_filter(EventFilter::types(["C"])),
            SubscriberEntry::push(hook.url("all")),
        ],
    );
    let gateway = Gateway::start(topics).await;

    gateway.publish("orders", &event("1", "A")).await;
    hook.wait_for(1).await;

    let stats = gateway.wait_for_stats(|s| s.succeeded == 1).await;
    assert_eq!(stats.dispatched, 1);
    assert!(hook.received_by("only-c").is_empty());
    gateway.stop().await;
}

#[tokio::test]
async fn test_missing_source_is_filled_from_topic() {
    let hook = Webhook::start().await;
    let topics = TopicsConfig::default()
        .with_topic("orders", vec![SubscriberEntry::push(hook.url("all"))]);
    let gateway = Gateway::start(topics).await;

    let body = json!({ "id": "1", "type": "A", "specversion": "1.0", "tenant": "x" });
    assert_eq!(gateway.publish("orders", &body).await.status(), 200);

    let received = hook.wait_for(1).await;
    let delivered = &received[0].events[0];
    assert_eq!(
        delivered["source"].as_str().unwrap(),
        format!("{DEFAULT_SOURCE_PREFIX}orders")
    );
    // Extension attributes pass through untouched.
    assert_eq!(delivered["tenant"], "x");
    gateway.stop().await;
}

#[tokio::test]
async fn test_transient_failure_is_retried_with_delivery_count() {
    let hook = Webhook::start().await;
    let topics = TopicsConfig::default()
        .with_topic("orders", vec![SubscriberEntry::push(hook.url("fail"))]);
    let gateway = Gateway::start(topics).await;

    gateway.publish("orders", &event("1", "A")).await;

    let received = hook.wait_for(2).await;
    let counts: Vec<_> = received.iter().map(|r| r.delivery_count.clone()).collect();
    assert_eq!(counts, vec![Some("0".to_string()), Some("1".to_string())]);

    // Final non-success status ends the delivery; it is not an error.
    let stats = gateway.wait_for_stats(|s| s.in_flight == 0 && s.succeeded == 1).await;
    assert_eq!(stats.failed, 0);
    gateway.stop().await;
}

#[tokio::test]
async fn test_unreachable_subscriber_exhausts_retries() {
    let topics = TopicsConfig::default()
        .with_topic("orders", vec![SubscriberEntry::push("http://127.0.0.1:9/unreachable")]);
    let gateway = Gateway::start(topics).await;

    gateway.publish("orders", &event("1", "A")).await;

    let stats = gateway
        .wait_for_stats(|s| s.in_flight == 0 && s.dispatched == 1)
        .await;
    assert_eq!(stats.succeeded, 0);
    assert_eq!(stats.cancelled, 0);
    assert_eq!(stats.exhausted + stats.failed, 1);
    gateway.stop().await;
}

#[tokio::test]
async fn test_removed_subscriber_cancels_in_flight_delivery() {
    let hook = Webhook::start().await;
    let slow = hook.url("slow");
    let topics = TopicsConfig::default().with_topic(
        "orders",
        vec![
            SubscriberEntry::push(slow.clone()),
            SubscriberEntry::push(hook.url("all")),
        ],
    );
    let gateway = Gateway::start(topics.clone()).await;

    gateway.publish("orders", &event("1", "A")).await;
    hook.wait_for(2).await;
    gateway.wait_for_stats(|s| s.succeeded == 1 && s.in_flight == 1).await;

    // Drop the slow subscriber the way a configuration reload does.
    let next = TopicsConfig::default()
        .with_topic("orders", vec![SubscriberEntry::push(hook.url("all"))]);
    let diff = topics.diff(&next);
    gateway.service.topics().replace(next);
    for (topic, endpoint) in &diff.revoked_push {
        gateway.service.registry().revoke(topic, endpoint);
    }
    assert_eq!(diff.revoked_push, vec![("orders".to_string(), slow)]);

    let stats = gateway.wait_for_stats(|s| s.in_flight == 0).await;
    assert_eq!(stats.cancelled, 1);
    assert_eq!(stats.failed, 0);

    // New publishes no longer reach the removed subscriber.
    gateway.publish("orders", &event("2", "A")).await;
    hook.wait_for(3).await;
    assert_eq!(hook.received_by("slow").len(), 1);
    gateway.stop().await;
}

#[tokio::test]
async fn test_shutdown_cancels_and_drains_push_deliveries() {
    let hook = Webhook::start().await;
    let topics = TopicsConfig::default()
        .with_topic("orders", vec![SubscriberEntry::push(hook.url("slow"))]);
    let gateway = Gateway::start(topics).await;

    gateway.publish("orders", &event("1", "A")).await;
    hook.wait_for(1).await;

    let service = Arc::clone(&gateway.service);
    let started = tokio::time::Instant::now();
    gateway.stop().await;

    assert!(started.elapsed() < Duration::from_secs(2));
    let stats = service.push_stats();
    assert_eq!(stats.cancelled, 1);
    assert_eq!(stats.in_flight, 0);
    assert!(service.registry().is_shut_down());
}

#[tokio::test]
async fn test_health_reports_push_stats() {
    let hook = Webhook::start().await;
    let topics = TopicsConfig::default()
        .with_topic("orders", vec![SubscriberEntry::push(hook.url("all"))]);
    let gateway = Gateway::start(topics).await;

    gateway.publish("orders", &event("1", "A")).await;
    gateway.wait_for_stats(|s| s.succeeded == 1).await;

    let health: serde_json::Value = gateway
        .http
        .get(format!("{}/health", gateway.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["topics"], 1);
    assert_eq!(health["pushStats"]["succeeded"], 1);

    gateway.stop().await;
}
