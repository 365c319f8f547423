//! Test helpers: build AppState and router for integration tests.
//!
//! Run from workspace root: `cargo test -p ingress-api --test upload_test`.
//! Uploads are staged on a local backend in a temp dir; announcements and
//! validation requests are captured by recording doubles.

#![allow(dead_code)]

use axum_test::TestServer;
use ingress_api::constants;
use ingress_api::services::upload::AdmissionPipeline;
use ingress_api::services::{Announcer, Validator};
use ingress_api::setup::routes;
use ingress_api::state::AppState;
use ingress_core::models::{ServiceDescriptor, StagedRequest, StatusEvent, UploadStatus};
use ingress_core::{AppError, Config};
use ingress_storage::LocalStager;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const TEST_BASE_URL: &str = "http://localhost";
pub const TEST_URL_SECRET: &str = "0123456789abcdef0123456789abcdef";

/// API path prefix for tests (e.g. `/api/ingress/v1`).
pub fn api_path(path: &str) -> String {
    format!("{}{}", constants::API_PREFIX, path)
}

#[derive(Default)]
pub struct RecordingAnnouncer {
    events: Mutex<Vec<StatusEvent>>,
}

impl RecordingAnnouncer {
    pub fn events(&self) -> Vec<StatusEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn statuses(&self) -> Vec<UploadStatus> {
        self.events().iter().map(|e| e.status).collect()
    }
}

impl Announcer for RecordingAnnouncer {
    fn status(&self, event: StatusEvent) -> bool {
        self.events.lock().unwrap().push(event);
        true
    }
}

pub struct RecordingValidator {
    accepted: HashSet<String>,
    requests: Mutex<Vec<StagedRequest>>,
}

impl RecordingValidator {
    pub fn requests(&self) -> Vec<StagedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Validator for RecordingValidator {
    fn validate_service(&self, descriptor: &ServiceDescriptor) -> Result<(), AppError> {
        if self.accepted.contains(&descriptor.service) {
            Ok(())
        } else {
            Err(AppError::UnrecognizedService(descriptor.service.clone()))
        }
    }

    fn validate(&self, request: StagedRequest) {
        self.requests.lock().unwrap().push(request);
    }
}

/// Test application: server, collaborator doubles and owned resources.
pub struct TestApp {
    pub server: TestServer,
    pub announcer: Arc<RecordingAnnouncer>,
    pub validator: Arc<RecordingValidator>,
    pub stager: Arc<LocalStager>,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }
}

/// Setup test app with default settings and a local staging backend.
pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(&[]).await
}

/// Setup test app with configuration overrides.
pub async fn setup_test_app_with(overrides: &[(&str, &str)]) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let base_url = format!("{}{}", TEST_BASE_URL, api_path("/staged"));

    let mut vars: HashMap<String, String> = HashMap::from([
        ("STORAGE_BACKEND".to_string(), "local".to_string()),
        (
            "LOCAL_STORAGE_PATH".to_string(),
            temp_dir.path().to_string_lossy().to_string(),
        ),
        ("LOCAL_STORAGE_BASE_URL".to_string(), base_url.clone()),
        ("STAGING_URL_SECRET".to_string(), TEST_URL_SECRET.to_string()),
    ]);
    for (key, value) in overrides {
        vars.insert(key.to_string(), value.to_string());
    }
    let config = Config::from_lookup(|key| vars.get(key).cloned())
        .expect("Failed to build test config");

    let stager = Arc::new(
        LocalStager::new(temp_dir.path(), base_url, TEST_URL_SECRET.as_bytes())
            .await
            .expect("Failed to create local stager"),
    );
    let announcer = Arc::new(RecordingAnnouncer::default());
    let validator = Arc::new(RecordingValidator {
        accepted: config.valid_services(),
        requests: Mutex::new(Vec::new()),
    });

    let pipeline = AdmissionPipeline::from_config(
        &config,
        stager.clone(),
        validator.clone(),
        announcer.clone(),
    )
    .expect("Failed to build pipeline");

    let state = Arc::new(AppState {
        config: config.clone(),
        pipeline: Arc::new(pipeline),
        local_stager: Some(stager.clone()),
        hostname: "test-host".to_string(),
    });

    let app = routes::setup_routes(&config, state);
    let server = TestServer::new(app.into_make_service()).expect("Failed to create test server");

    TestApp {
        server,
        announcer,
        validator,
        stager,
        _temp_dir: temp_dir,
    }
}
