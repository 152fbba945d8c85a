pub mod fixtures;

use anyhow::Context as _;
use async_trait::async_trait;
use axum::{
    body::{Body, Bytes},
    http::{HeaderMap, HeaderName, HeaderValue, Method, Request, StatusCode},
    Router,
};
use raito::{
    api::create_router,
    db::MemoryDocumentStore,
    models::{Role, Session},
    services::issuer::IssuerClient,
    AppState, Config,
};
use serde_json::{json, Value as JsonValue};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt as _;

pub use fixtures::*;

pub const JWT_SECRET: &str = "test-jwt-secret";
pub const CODEC_SECRET: &str = "test-codec-secret";
pub const CALLBACK_API_KEY: &str = "test-callback-key";

/// Issuer fake that answers every issuance with a QR payload and remembers
/// what it was asked to do.
#[derive(Default)]
pub struct RecordingIssuer {
    pub issued: Mutex<Vec<JsonValue>>,
    pub revoked: Mutex<Vec<String>>,
}

#[async_trait]
impl IssuerClient for RecordingIssuer {
    async fn create_issuance(&self, request: &JsonValue) -> raito::Result<JsonValue> {
        self.issued.lock().unwrap().push(request.clone());
        Ok(json!({
            "requestId": request["callback"]["state"],
            "url": "openid-vc://?request_uri=https://issuer.example/request",
            "qrCode": "data:image/png;base64,iVBORw0KGgo=",
            "expiry": 1_700_000_000,
        }))
    }

    async fn revoke(&self, session: &Session) -> raito::Result<()> {
        self.revoked.lock().unwrap().push(session.id.clone());
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub issuer: Arc<RecordingIssuer>,
}

impl TestApp {
    pub async fn new() -> anyhow::Result<Self> {
        Self::new_with_config(|_| {}).await
    }

    pub async fn new_with_config(configure: impl FnOnce(&mut Config)) -> anyhow::Result<Self> {
        let mut config = Config::default();
        config.auth.jwt_secret = JWT_SECRET.to_string();
        config.codec.secret = CODEC_SECRET.to_string();
        config.issuer.callback_api_key = CALLBACK_API_KEY.to_string();
        configure(&mut config);
        config.validate().context("validate test config")?;

        let issuer = Arc::new(RecordingIssuer::default());
        let state = AppState::with_parts(
            config,
            Arc::new(MemoryDocumentStore::new()),
            issuer.clone(),
        );
        let router = create_router(state.clone());

        Ok(Self {
            router,
            state,
            issuer,
        })
    }

    /// Bearer token for the raw user id.
    pub fn token(&self, user_id: &str, role: Role) -> anyhow::Result<String> {
        Ok(self.state.auth.issue_token(user_id, role, 3600)?)
    }

    pub fn encode(&self, raw_id: &str) -> String {
        self.state.codec.encode(raw_id)
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<JsonValue>,
    ) -> anyhow::Result<(StatusCode, HeaderMap, JsonValue)> {
        self.request_with_extra_headers(method, path, token, body, &[])
            .await
    }

    pub async fn request_with_extra_headers(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<JsonValue>,
        extra_headers: &[(&str, &str)],
    ) -> anyhow::Result<(StatusCode, HeaderMap, JsonValue)> {
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let mut request = builder
            .body(match body {
                Some(value) => Body::from(serde_json::to_vec(&value)?),
                None => Body::empty(),
            })
            .context("build request")?;

        for (name, value) in extra_headers {
            request.headers_mut().insert(
                name.parse::<HeaderName>().context("parse header name")?,
                value.parse::<HeaderValue>().context("parse header value")?,
            );
        }

        self.dispatch(request).await
    }

    /// Send `raw` as the body verbatim, for payloads that are not valid JSON.
    pub async fn request_raw(
        &self,
        method: Method,
        path: &str,
        raw: &str,
    ) -> anyhow::Result<(StatusCode, HeaderMap, JsonValue)> {
        let request = Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(raw.to_string()))
            .context("build request")?;
        self.dispatch(request).await
    }

    async fn dispatch(
        &self,
        request: Request<Body>,
    ) -> anyhow::Result<(StatusCode, HeaderMap, JsonValue)> {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .context("dispatch request")?;

        let status = response.status();
        let headers = response.headers().clone();
        let bytes: Bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .context("read response body")?;
        let body = if bytes.is_empty() {
            JsonValue::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                JsonValue::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };

        Ok((status, headers, body))
    }

    /// Create a patient owned by `owner` through the API; returns the
    /// encoded patient id.
    pub async fn create_patient(
        &self,
        owner: &str,
        name: &str,
        group: Option<&str>,
    ) -> anyhow::Result<String> {
        let token = self.token(owner, Role::User)?;
        let (status, _, body) = self
            .request(
                Method::POST,
                "/patients",
                Some(&token),
                Some(json!({
                    "patientName": name,
                    "surname": "Test",
                    "birthDate": "2015-04-02",
                    "gender": "female",
                    "group": group,
                })),
            )
            .await?;
        assert_status(status, StatusCode::CREATED, "create patient");
        body["patientId"]
            .as_str()
            .map(str::to_string)
            .context("patientId missing from create response")
    }

    pub fn decode(&self, encoded: &str) -> anyhow::Result<String> {
        Ok(self.state.codec.decode(encoded)?)
    }
}

pub fn assert_status(actual: StatusCode, expected: StatusCode, context: &str) {
    assert_eq!(actual, expected, "{context}: expected {expected}, got {actual}");
}

/// Poll `check` until it returns true or a second has passed; background
/// workers write asynchronously.
pub async fn eventually<F, Fut>(mut check: F) -> anyhow::Result<bool>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = anyhow::Result<bool>>,
{
    for _ in 0..50 {
        if check().await? {
            return Ok(true);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    Ok(false)
}
