//! Shared fixtures for the server integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use lighttable_common::config::{CompiledDefaults, ConfigOverrides, Settings, TomlConfig};
use lighttable_common::{Error, Result};
use lighttable_server::transcode::encoder::{MediaInfo, ProgressSink, VideoStream};
use lighttable_server::transcode::Encoder;
use lighttable_server::{build_router, AppState};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::util::ServiceExt;

pub const SECRET: &str = "integration-test-secret";

/// Encoder stand-in that writes placeholder outputs and counts calls
#[derive(Default)]
pub struct FakeEncoder {
    pub transcodes: AtomicUsize,
    pub snapshots: AtomicUsize,
    /// Time each transcode takes
    pub delay: Duration,
    /// Make every transcode fail
    pub fail: bool,
    /// Probe reports no video stream
    pub audio_only: bool,
}

impl FakeEncoder {
    pub fn transcode_count(&self) -> usize {
        self.transcodes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Encoder for FakeEncoder {
    async fn probe(&self, _input: &Path) -> Result<MediaInfo> {
        let video = (!self.audio_only).then(|| VideoStream {
            codec: "hevc".to_string(),
            width: Some(1920),
            height: Some(1080),
            bitrate: Some(8_000_000),
            ..VideoStream::default()
        });
        Ok(MediaInfo {
            format: Some("mov,mp4,m4a,3gp,3g2,mj2".to_string()),
            duration: Some(25.0),
            video,
            ..MediaInfo::default()
        })
    }

    async fn transcode(&self, _input: &Path, output: &Path, progress: ProgressSink<'_>) -> Result<()> {
        self.transcodes.fetch_add(1, Ordering::SeqCst);
        progress(40.0);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        // Regressing report must not reach the job
        progress(10.0);
        if self.fail {
            tokio::fs::write(output, b"trunc").await?;
            return Err(Error::Encoder("exit status 1".to_string()));
        }
        tokio::fs::write(output, b"mp4").await?;
        progress(100.0);
        Ok(())
    }

    async fn snapshot(&self, _input: &Path, output: &Path, _at: &str) -> Result<()> {
        self.snapshots.fetch_add(1, Ordering::SeqCst);
        tokio::fs::write(output, b"jpg").await?;
        Ok(())
    }

    async fn snapshots(&self, _input: &Path, dir: &Path, timestamps: &[f64]) -> Result<()> {
        self.snapshots.fetch_add(1, Ordering::SeqCst);
        for i in 0..timestamps.len() {
            tokio::fs::write(dir.join(format!("thumb_{}.jpg", i + 1)), b"jpg").await?;
        }
        Ok(())
    }
}

/// Temporary data directory plus users file
pub struct TestEnv {
    pub dir: TempDir,
    pub settings: Settings,
}

impl TestEnv {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        std::fs::create_dir_all(&data_dir).unwrap();

        let users_file = dir.path().join("users.json");
        let users = json!({
            "users": [
                {"email": "ana@example.com", "name": "Ana", "role": "admin"},
                {"email": "max@example.com", "name": "Max", "role": "manager"},
                {"email": "bob@example.com", "name": "Bob", "role": "user", "startPath": "ProjectA"}
            ]
        });
        std::fs::write(&users_file, serde_json::to_string_pretty(&users).unwrap()).unwrap();

        let mut settings = Settings::resolve(
            ConfigOverrides {
                data_dir: Some(data_dir),
                users_file: Some(users_file),
                session_secret: Some(SECRET.to_string()),
                ..ConfigOverrides::default()
            },
            TomlConfig::default(),
            CompiledDefaults::default(),
        );
        settings.max_upload_bytes = 1024;

        Self { dir, settings }
    }

    pub fn data_dir(&self) -> &Path {
        &self.settings.data_dir
    }

    /// Write a content file under the data directory
    pub fn put(&self, path: &str, bytes: &[u8]) {
        let full = self.data_dir().join(path);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, bytes).unwrap();
    }

    pub fn state(&self, encoder: Arc<FakeEncoder>) -> AppState {
        AppState::new(&self.settings, SECRET, encoder)
    }

    pub fn router(&self) -> Router {
        build_router(self.state(Arc::new(FakeEncoder::default())))
    }
}

pub fn request(method: &str, uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn json_request(method: &str, uri: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

/// Log in and return the `auth-token=...` pair for the Cookie header
pub async fn login(app: &Router, email: &str) -> String {
    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/auth/login", None, json!({ "email": email })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("login sets a cookie")
        .to_str()
        .unwrap();
    set_cookie.split(';').next().unwrap().to_string()
}
