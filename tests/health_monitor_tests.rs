mod common;

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use gwinit::health::{GatewayState, HealthMonitor, HealthOutcome};
use serde_json::{Value, json};
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};
use url::Url;

/// Replays scripted `/StatusPing` answers; the last one repeats forever.
#[derive(Clone)]
struct PingScript {
    replies: Arc<Mutex<VecDeque<(StatusCode, Value)>>>,
    hits: Arc<Mutex<usize>>,
}

impl PingScript {
    fn new(replies: Vec<(StatusCode, Value)>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into())),
            hits: Arc::new(Mutex::new(0)),
        }
    }

    fn hits(&self) -> usize {
        *self.hits.lock().unwrap()
    }
}

async fn status_ping(State(script): State<PingScript>) -> (StatusCode, Json<Value>) {
    *script.hits.lock().unwrap() += 1;
    let mut replies = script.replies.lock().unwrap();
    let reply = if replies.len() > 1 {
        replies.pop_front().expect("scripted reply")
    } else {
        replies.front().cloned().expect("scripted reply")
    };
    (reply.0, Json(reply.1))
}

async fn monitor_for(script: PingScript) -> HealthMonitor {
    let app = Router::new()
        .route("/StatusPing", get(status_ping))
        .with_state(script);
    let base = common::spawn_test_server(app).await;
    HealthMonitor::new(reqwest::Client::new(), &base, Duration::from_millis(10))
        .expect("health monitor")
}

#[tokio::test]
async fn target_wins_over_give_up_when_both_match() {
    let script = PingScript::new(vec![(
        StatusCode::OK,
        json!({"state": "RUNNING"}),
    )]);
    let monitor = monitor_for(script).await;

    let running = GatewayState::running();
    let outcome = monitor
        .await_state("test", &running, Some(&running), Duration::from_secs(5))
        .await;
    assert_eq!(outcome, HealthOutcome::Reached);
}

#[tokio::test]
async fn commissioning_gate_gives_up_on_running_gateway() {
    let script = PingScript::new(vec![(
        StatusCode::OK,
        json!({"state": "RUNNING", "details": null}),
    )]);
    let monitor = monitor_for(script).await;

    let outcome = monitor
        .await_state(
            "commissioning",
            &GatewayState::commissioning(),
            Some(&GatewayState::running()),
            Duration::from_secs(5),
        )
        .await;
    assert_eq!(outcome, HealthOutcome::GaveUp);
}

#[tokio::test]
async fn errors_and_other_states_are_retried_until_target() {
    let script = PingScript::new(vec![
        (StatusCode::SERVICE_UNAVAILABLE, json!({})),
        (StatusCode::OK, json!({"state": "STARTING"})),
        (StatusCode::OK, json!({"unexpected": true})),
        (
            StatusCode::OK,
            json!({"state": "RUNNING", "details": "COMMISSIONING"}),
        ),
    ]);
    let monitor = monitor_for(script.clone()).await;

    let outcome = monitor
        .await_state(
            "commissioning",
            &GatewayState::commissioning(),
            Some(&GatewayState::running()),
            Duration::from_secs(5),
        )
        .await;
    assert_eq!(outcome, HealthOutcome::Reached);
    assert!(script.hits() >= 4, "hits = {}", script.hits());
}

#[tokio::test]
async fn stuck_state_times_out() {
    let script = PingScript::new(vec![(StatusCode::OK, json!({"state": "STARTING"}))]);
    let monitor = monitor_for(script).await;

    let outcome = monitor
        .await_state(
            "provisioning",
            &GatewayState::running(),
            None,
            Duration::from_millis(150),
        )
        .await;
    assert_eq!(outcome, HealthOutcome::TimedOut);
}

#[tokio::test]
async fn ping_reports_state_or_none() {
    let script = PingScript::new(vec![(
        StatusCode::OK,
        json!({"state": "RUNNING", "details": "COMMISSIONING"}),
    )]);
    let monitor = monitor_for(script).await;
    assert_eq!(monitor.ping().await, Some(GatewayState::commissioning()));
    assert!(monitor.status_url().as_str().ends_with("/StatusPing"));

    let closed = HealthMonitor::new(
        reqwest::Client::new(),
        &Url::parse("http://127.0.0.1:1/").unwrap(),
        Duration::from_millis(10),
    )
    .unwrap();
    assert_eq!(closed.ping().await, None);
}
