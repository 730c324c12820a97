//! Fake collaborators and app wiring shared by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::{to_bytes, Body, Bytes};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;
use tower_http::normalize_path::NormalizePath;

use crate::clients::{
    ClientError, Collaborators, ImageAnalysis, ImageSearchParams, ImageSearchResult,
    ImageSearcher, TextGenerator, VisionAnalyzer,
};
use crate::db::Repositories;
use crate::generation::AdvertGenerator;
use crate::media::MediaStorage;
use crate::AppState;

pub const GENERATED_LISTING: &str =
    "Trek 1.2 Road Bike, 56cm Aluminium Frame\n- Shimano Sora 2x9\n- Condition: good, light scuffs";

fn upstream_failure(service: &'static str) -> ClientError {
    ClientError::Status {
        service,
        status: 503,
        message: "service unavailable".to_string(),
    }
}

#[derive(Clone, Default)]
pub struct FakeVision {
    fail: bool,
    calls: Arc<AtomicUsize>,
}

impl FakeVision {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VisionAnalyzer for FakeVision {
    async fn analyze(&self, _image: &[u8]) -> Result<ImageAnalysis, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(upstream_failure("vision"));
        }
        Ok(ImageAnalysis {
            labels: vec!["Bicycle".to_string(), "Wheel".to_string()],
            objects: vec!["Bicycle".to_string()],
            text: vec!["TREK".to_string()],
        })
    }
}

#[derive(Clone, Default)]
pub struct FakeTextGenerator {
    fail: bool,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl FakeTextGenerator {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl TextGenerator for FakeTextGenerator {
    async fn generate(&self, prompt: &str, _system_instruction: &str) -> Result<String, ClientError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if self.fail {
            return Err(upstream_failure("text generation"));
        }
        Ok(GENERATED_LISTING.to_string())
    }
}

#[derive(Clone, Default)]
pub struct FakeImageSearch {
    fail: bool,
    queries: Arc<Mutex<Vec<String>>>,
}

impl FakeImageSearch {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageSearcher for FakeImageSearch {
    async fn search(
        &self,
        query: &str,
        params: &ImageSearchParams,
    ) -> Result<Vec<ImageSearchResult>, ClientError> {
        self.queries.lock().unwrap().push(query.to_string());
        if self.fail {
            return Err(upstream_failure("image search"));
        }
        Ok((0..params.num)
            .map(|i| ImageSearchResult {
                url: format!("https://img.example/{}.jpg", i),
                title: None,
                path: None,
            })
            .collect())
    }
}

/// Fakes whose recorded calls stay observable after they are handed out.
#[derive(Clone, Default)]
pub struct TestCollaborators {
    pub vision: FakeVision,
    pub text: FakeTextGenerator,
    pub search: FakeImageSearch,
}

impl TestCollaborators {
    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            vision: Arc::new(self.vision.clone()),
            text: Arc::new(self.text.clone()),
            search: Arc::new(self.search.clone()),
        }
    }
}

pub fn temp_media() -> MediaStorage {
    let root = std::env::temp_dir().join(format!("listing-media-{}", uuid::Uuid::new_v4()));
    MediaStorage::new(root, "/media/")
}

/// App state over the in-memory store and the given fakes.
pub fn test_state(fakes: &TestCollaborators) -> AppState {
    let repos = Repositories::memory();
    let media = temp_media();
    let generator = AdvertGenerator::new(
        fakes.collaborators(),
        repos.advertisements.clone(),
        media.clone(),
    );
    AppState {
        repos,
        media,
        generator,
    }
}

pub type TestApp = NormalizePath<Router>;

pub fn test_app(fakes: &TestCollaborators) -> (TestApp, AppState) {
    let state = test_state(fakes);
    (crate::build_app(state.clone(), 1024 * 1024), state)
}

pub async fn send_raw(app: &TestApp, request: Request<Body>) -> (StatusCode, Bytes) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, to_bytes(response.into_body(), usize::MAX).await.unwrap())
}

/// Sends one request through the full middleware stack and decodes the JSON body.
pub async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let (status, bytes) = send_raw(app, request).await;
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

pub fn empty(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn json(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

const BOUNDARY: &str = "listing-test-boundary";

/// Builds a `multipart/form-data` POST with text fields and an optional
/// `(field, filename, bytes)` file part.
pub fn multipart(uri: &str, fields: &[(&str, &str)], file: Option<(&str, &str, &[u8])>) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    if let Some((name, filename, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, name, filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

pub const PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00];
