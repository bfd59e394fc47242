mod common;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use gwinit::GwInitError;
use gwinit::commissioning::CommissioningDriver;
use gwinit::config::CommissioningConfig;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};

#[derive(Clone)]
struct WizardState {
    bootstrap: Value,
    /// Step id answered with 500 instead of its success status.
    fail_on: Option<&'static str>,
    posts: Arc<Mutex<Vec<Value>>>,
}

impl WizardState {
    fn new(bootstrap: Value) -> Self {
        Self {
            bootstrap,
            fail_on: None,
            posts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn posted_ids(&self) -> Vec<String> {
        self.posts
            .lock()
            .unwrap()
            .iter()
            .map(|p| p["id"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}

async fn bootstrap(State(state): State<WizardState>) -> Json<Value> {
    Json(state.bootstrap.clone())
}

async fn post_step(State(state): State<WizardState>, Json(body): Json<Value>) -> StatusCode {
    let id = body["id"].as_str().unwrap_or_default().to_string();
    state.posts.lock().unwrap().push(body);
    if state.fail_on == Some(id.as_str()) {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    if id == "finished" {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    }
}

async fn driver_for(state: WizardState, settings: CommissioningConfig) -> CommissioningDriver {
    let app = Router::new()
        .route("/bootstrap", get(bootstrap))
        .route("/post-step", post(post_step))
        .with_state(state);
    let base = common::spawn_test_server(app).await;
    CommissioningDriver::new(reqwest::Client::new(), &base, settings).expect("driver")
}

#[tokio::test]
async fn advertised_steps_run_in_protocol_order() {
    let state = WizardState::new(json!({
        "edition": "NOT_SET",
        "steps": {"authSetup": {}, "eula": {}}
    }));
    let driver = driver_for(state.clone(), CommissioningConfig::default()).await;

    driver.commission().await.expect("commissioning succeeds");
    assert_eq!(
        state.posted_ids(),
        vec!["edition", "license", "authentication", "finished"]
    );

    let posts = state.posts.lock().unwrap();
    assert_eq!(posts[0], json!({"id": "edition", "step": "edition", "data": {"edition": ""}}));
    assert_eq!(posts[1], json!({"id": "license", "step": "eula", "data": {"accept": true}}));

    let auth = &posts[2];
    assert_eq!(auth["step"], "authSetup");
    assert_eq!(auth["data"]["username"], "admin");
    let password = auth["data"]["password"].as_str().expect("password");
    let (salt, hash) = password
        .strip_prefix('[')
        .and_then(|rest| rest.split_once(']'))
        .expect("salted password format");
    assert_eq!(salt.len(), 8);
    assert_eq!(hash.len(), 64);
    assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));

    assert_eq!(posts[3], json!({"id": "finished", "data": {"startGateway": true}}));
}

#[tokio::test]
async fn satisfied_wizard_only_finalizes() {
    let state = WizardState::new(json!({"edition": "standard", "steps": {}}));
    let driver = driver_for(state.clone(), CommissioningConfig::default()).await;

    driver.commission().await.expect("commissioning succeeds");
    assert_eq!(state.posted_ids(), vec!["finished"]);
}

#[tokio::test]
async fn connections_step_posts_configured_ports() {
    let state = WizardState::new(json!({"edition": "standard", "steps": {"connections": {}}}));
    let driver = driver_for(state.clone(), CommissioningConfig::default()).await;

    driver.commission().await.expect("commissioning succeeds");
    let posts = state.posts.lock().unwrap();
    assert_eq!(
        posts[0],
        json!({
            "id": "connections",
            "step": "connections",
            "data": {"http": 8088, "https": 8043, "gan": 8060, "useSSL": false}
        })
    );
}

#[tokio::test]
async fn unexpected_status_aborts_before_finalize() {
    let mut state = WizardState::new(json!({
        "edition": "NOT_SET",
        "steps": {"eula": {}, "authSetup": {}}
    }));
    state.fail_on = Some("license");
    let driver = driver_for(state.clone(), CommissioningConfig::default()).await;

    let err = driver.commission().await.expect_err("must fail");
    assert!(matches!(
        err,
        GwInitError::UnexpectedStatus { status, .. } if status == StatusCode::INTERNAL_SERVER_ERROR
    ));
    assert_eq!(state.posted_ids(), vec!["edition", "license"]);
}

#[tokio::test]
async fn activation_without_credentials_is_an_error() {
    let state = WizardState::new(json!({"edition": "standard", "steps": {"activated": {}}}));
    let driver = driver_for(state.clone(), CommissioningConfig::default()).await;

    let err = driver.commission().await.expect_err("must fail");
    assert!(matches!(err, GwInitError::MissingActivationCredentials));
    assert!(state.posted_ids().is_empty());
}

#[tokio::test]
async fn activation_posts_license_credentials() {
    let state = WizardState::new(json!({"edition": "standard", "steps": {"activated": {}}}));
    let settings = CommissioningConfig {
        license_key: Some("KEY-1".to_string()),
        activation_token: Some("TOKEN-1".to_string()),
        ..Default::default()
    };
    let driver = driver_for(state.clone(), settings).await;

    driver.commission().await.expect("commissioning succeeds");
    let posts = state.posts.lock().unwrap();
    assert_eq!(
        posts[0],
        json!({"id": "activation", "data": {"licenseKey": "KEY-1", "activationToken": "TOKEN-1"}})
    );
}
