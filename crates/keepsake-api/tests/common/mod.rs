#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use keepsake_api::speech::SpeechEngine;
use keepsake_api::tokens::TokenService;
use keepsake_api::{AppState, AppStateInner, build_router};
use keepsake_db::Database;

pub const SECRET: &str = "integration-test-secret";
const BOUNDARY: &str = "keepsake-test-boundary";

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    _dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_speech(SpeechEngine::Disabled).await
    }

    pub async fn with_speech(speech: SpeechEngine) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("keepsake.db")).unwrap();
        let state = AppStateInner::build(
            db,
            TokenService::with_defaults(SECRET),
            speech,
            dir.path().join("static"),
            10 * 1024 * 1024,
        )
        .await
        .unwrap();

        Self {
            router: build_router(state.clone()),
            state,
            _dir: dir,
        }
    }

    /// Send a request and return (status, parsed JSON body or Null).
    pub async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }

    pub async fn get_raw(&self, uri: &str) -> (StatusCode, Vec<u8>) {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    pub async fn signup(&self, email: &str, password: &str) -> (StatusCode, Value) {
        let body = serde_json::json!({ "email": email, "password": password });
        let req = Request::builder()
            .method("POST")
            .uri("/signup")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(req).await
    }

    pub async fn login(&self, email: &str, password: &str) -> (StatusCode, Value) {
        let req = Request::builder()
            .method("POST")
            .uri("/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(format!("username={}&password={}", email, password)))
            .unwrap();
        self.send(req).await
    }

    /// Sign up and log in, returning the bearer token.
    pub async fn register(&self, email: &str) -> String {
        let (status, _) = self.signup(email, "hunter22").await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = self.login(email, "hunter22").await;
        assert_eq!(status, StatusCode::OK);
        body["access_token"].as_str().unwrap().to_string()
    }

    pub async fn create_capsule(
        &self,
        token: &str,
        fields: &[(&str, &str)],
        files: &[(&str, &str, &[u8])],
    ) -> (StatusCode, Value) {
        let req = Request::builder()
            .method("POST")
            .uri("/capsules")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(fields, files)))
            .unwrap();
        self.send(req).await
    }

    /// Create a capsule with only the required fields plus tags.
    pub async fn quick_capsule(&self, token: &str, title: &str, date: &str, tags: &str) -> i64 {
        let (status, body) = self
            .create_capsule(
                token,
                &[("title", title), ("text", "a story"), ("date", date), ("tags", tags)],
                &[],
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["id"].as_i64().unwrap()
    }

    pub async fn list(&self, token: &str, query: &str) -> (StatusCode, Value) {
        let req = Request::builder()
            .uri(format!("/capsules{}", query))
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        self.send(req).await
    }

    pub async fn delete(&self, token: &str, id: i64) -> (StatusCode, Value) {
        let req = Request::builder()
            .method("DELETE")
            .uri(format!("/capsules/{}", id))
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        self.send(req).await
    }

    /// Filesystem path of a `/static/...` reference.
    pub fn static_path(&self, reference: &str) -> std::path::PathBuf {
        let relative = reference.strip_prefix("/static/").unwrap();
        self.state.static_dir.join(relative)
    }
}

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={}", BOUNDARY)
}

pub fn multipart_body(fields: &[(&str, &str)], files: &[(&str, &str, &[u8])]) -> Vec<u8> {
    multipart_body_named(fields, "files", files)
}

pub fn multipart_body_named(
    fields: &[(&str, &str)],
    file_field: &str,
    files: &[(&str, &str, &[u8])],
) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    for (filename, content_type, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{file_field}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// Decode the JSON-encoded `media` string of a capsule response.
pub fn media_refs(capsule: &Value) -> Vec<String> {
    serde_json::from_str(capsule["media"].as_str().unwrap()).unwrap()
}
