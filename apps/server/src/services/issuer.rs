//! Credential issuer integration
//!
//! Issuance is requested synchronously because the caller needs the QR
//! payload in its response. Revocations run on a background worker fed by a
//! bounded channel; their failures are logged and counted, never returned.

use crate::config::IssuerConfig;
use crate::db::Repository;
use crate::metrics::ISSUER_REQUESTS_TOTAL;
use crate::models::{Session, SessionStatus, SessionType};
use crate::{Error, Result};
use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Outbound side of the external credential issuer.
#[async_trait]
pub trait IssuerClient: Send + Sync {
    /// Create an issuance request; returns the issuer's response (QR code,
    /// request id, expiry).
    async fn create_issuance(&self, request: &JsonValue) -> Result<JsonValue>;

    /// Revoke whatever credential was issued for `session`.
    async fn revoke(&self, session: &Session) -> Result<()>;
}

pub struct HttpIssuerClient {
    client: reqwest::Client,
    issuance_endpoint: String,
    revocation_endpoint: String,
    bearer_token: String,
}

impl HttpIssuerClient {
    pub fn new(config: &IssuerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Internal(format!("failed to build issuer client: {}", e)))?;

        Ok(Self {
            client,
            issuance_endpoint: config.issuance_endpoint.clone(),
            revocation_endpoint: config.revocation_endpoint.clone(),
            bearer_token: config.bearer_token.clone(),
        })
    }

    async fn post(&self, url: &str, body: &JsonValue) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.bearer_token)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Issuer(format!("request to {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(Error::Issuer(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl IssuerClient for HttpIssuerClient {
    async fn create_issuance(&self, request: &JsonValue) -> Result<JsonValue> {
        self.post(&self.issuance_endpoint, request)
            .await?
            .json::<JsonValue>()
            .await
            .map_err(|e| Error::Issuer(format!("invalid issuance response: {}", e)))
    }

    async fn revoke(&self, session: &Session) -> Result<()> {
        if self.revocation_endpoint.is_empty() {
            tracing::debug!(session_id = %session.id, "No revocation endpoint configured");
            return Ok(());
        }

        let body = json!({
            "state": session.id,
            "type": session.session_type,
            "sharedWith": session.shared_with,
            "credential": session.data,
        });
        self.post(&self.revocation_endpoint, &body).await?;
        Ok(())
    }
}

/// Used when `issuer.enabled` is false: issuance fails, revocation is a no-op.
pub struct DisabledIssuer;

#[async_trait]
impl IssuerClient for DisabledIssuer {
    async fn create_issuance(&self, _request: &JsonValue) -> Result<JsonValue> {
        Err(Error::Issuer("credential issuer is disabled".to_string()))
    }

    async fn revoke(&self, _session: &Session) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug)]
enum IssuerJob {
    Revoke(Session),
}

/// Progress report posted by the issuer for a session.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuanceCallback {
    #[serde(alias = "requestStatus")]
    pub code: String,
    /// Session id the request was created with.
    pub state: String,
    #[serde(default)]
    pub error: Option<JsonValue>,
}

#[derive(Clone)]
pub struct IssuerService {
    client: Arc<dyn IssuerClient>,
    repository: Repository,
    config: Arc<IssuerConfig>,
    jobs: mpsc::Sender<IssuerJob>,
}

impl IssuerService {
    pub fn new(client: Arc<dyn IssuerClient>, repository: Repository, config: IssuerConfig) -> Self {
        let (jobs, mut receiver) = mpsc::channel::<IssuerJob>(config.queue_capacity.max(1));

        let worker_client = client.clone();
        tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                match job {
                    IssuerJob::Revoke(session) => {
                        match worker_client.revoke(&session).await {
                            Ok(()) => {
                                ISSUER_REQUESTS_TOTAL
                                    .with_label_values(&["revoke", "success"])
                                    .inc();
                                tracing::info!(session_id = %session.id, "Credential revoked");
                            }
                            Err(e) => {
                                ISSUER_REQUESTS_TOTAL
                                    .with_label_values(&["revoke", "error"])
                                    .inc();
                                tracing::warn!(
                                    session_id = %session.id,
                                    shared_with = %session.shared_with,
                                    "Credential revocation failed: {}",
                                    e
                                );
                            }
                        }
                    }
                }
            }
        });

        Self {
            client,
            repository,
            config: Arc::new(config),
            jobs,
        }
    }

    pub fn callback_api_key(&self) -> &str {
        &self.config.callback_api_key
    }

    /// Persist `session` in its initial state, then ask the issuer for a
    /// credential offer. On success the issuer payload (plus PIN) is stored on
    /// the session; on failure the session is marked `issuance_error` and the
    /// error is returned.
    pub async fn issue(&self, mut session: Session, claims: JsonValue) -> Result<Session> {
        self.repository.insert_session(&session).await?;

        let pin = generate_pin();
        let manifest = match session.session_type {
            SessionType::Organization => &self.config.organization_manifest,
            SessionType::Clinician => &self.config.clinician_manifest,
        };
        let request = json!({
            "includeQRCode": true,
            "callback": {
                "url": self.config.callback_url,
                "state": session.id,
                "headers": { "api-key": self.config.callback_api_key },
            },
            "authority": self.config.authority,
            "manifest": manifest,
            "pin": { "value": pin, "length": pin.len() },
            "claims": claims,
        });

        match self.client.create_issuance(&request).await {
            Ok(mut payload) => {
                ISSUER_REQUESTS_TOTAL
                    .with_label_values(&["issue", "success"])
                    .inc();
                if let Some(object) = payload.as_object_mut() {
                    object.insert("pin".to_string(), JsonValue::String(pin));
                }
                session.data = Some(payload);
                self.repository.save_session(&session).await?;
                Ok(session)
            }
            Err(e) => {
                ISSUER_REQUESTS_TOTAL
                    .with_label_values(&["issue", "error"])
                    .inc();
                session.session_data = SessionStatus::IssuanceError.into();
                if let Err(save_err) = self.repository.save_session(&session).await {
                    tracing::warn!(session_id = %session.id, "Failed to mark session failed: {}", save_err);
                }
                Err(e)
            }
        }
    }

    /// Queue revocation of the credentials behind `sessions`. Never blocks.
    pub fn enqueue_revocations(&self, sessions: Vec<Session>) {
        for session in sessions {
            match self.jobs.try_send(IssuerJob::Revoke(session)) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(job)) => {
                    let jobs = self.jobs.clone();
                    tokio::spawn(async move {
                        if let Err(e) = jobs.send(job).await {
                            tracing::warn!("Failed to enqueue revocation: {}", e);
                        }
                    });
                }
                Err(mpsc::error::TrySendError::Closed(_job)) => {
                    tracing::warn!("Issuer job queue closed; dropping revocation");
                }
            }
        }
    }

    /// Apply an issuer progress report to its session.
    pub async fn handle_callback(&self, callback: IssuanceCallback) -> Result<Session> {
        let status = match callback.code.as_str() {
            "request_retrieved" => SessionStatus::RequestRetrieved,
            "issuance_successful" => SessionStatus::IssuanceSuccessful,
            "issuance_error" => SessionStatus::IssuanceError,
            other => {
                return Err(Error::Validation(format!(
                    "unknown issuance callback code '{}'",
                    other
                )))
            }
        };

        if let Some(error) = &callback.error {
            tracing::warn!(session_id = %callback.state, error = %error, "Issuer reported an error");
        }

        self.repository
            .set_session_status(&callback.state, status.into())
            .await?
            .ok_or_else(|| Error::NotFound("Session not found".to_string()))
    }
}

/// Four-digit PIN shown to the holder alongside the QR code.
fn generate_pin() -> String {
    format!("{:04}", rand::thread_rng().gen_range(0..10_000))
}
