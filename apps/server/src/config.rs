//! Server configuration
//!
//! Loaded from an optional YAML file (`config.yaml`, or the path in
//! `RAITO_CONFIG`) and overridden by `RAITO__SECTION__KEY` environment
//! variables. A `.env` file is read first when present.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub codec: CodecConfig,
    pub audit: AuditConfig,
    pub issuer: IssuerConfig,
    pub resources: ResourcesConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_request_body_size: usize,
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8443,
            max_request_body_size: 10 * 1024 * 1024,
            cors_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub backend: StorageBackend,
    pub url: String,
    pub pool_max_size: u32,
    pub pool_timeout_seconds: u64,
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            url: String::new(),
            pool_max_size: 10,
            pool_timeout_seconds: 30,
            run_migrations: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub enabled: bool,
    pub jwt_secret: String,
    pub leeway_seconds: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            jwt_secret: String::new(),
            leeway_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Secret the identifier keys are derived from. Changing it invalidates
    /// every identifier handed out before.
    pub secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub enabled: bool,
    pub queue_capacity: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            queue_capacity: 2048,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IssuerConfig {
    pub enabled: bool,
    /// Endpoint that creates an issuance request and returns the QR payload.
    pub issuance_endpoint: String,
    /// Endpoint that revokes a previously issued credential.
    pub revocation_endpoint: String,
    pub bearer_token: String,
    /// URL the issuer calls back with progress for a session.
    pub callback_url: String,
    /// Value expected in the `api-key` header of issuer callbacks.
    pub callback_api_key: String,
    pub authority: String,
    pub organization_manifest: String,
    pub clinician_manifest: String,
    pub timeout_seconds: u64,
    pub queue_capacity: usize,
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            issuance_endpoint: String::new(),
            revocation_endpoint: String::new(),
            bearer_token: String::new(),
            callback_url: String::new(),
            callback_api_key: String::new(),
            authority: String::new(),
            organization_manifest: "OrganizationConsent".to_string(),
            clinician_manifest: "ClinicianShare".to_string(),
            timeout_seconds: 10,
            queue_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourcesConfig {
    /// Directory of questionnaire definitions (`<id>.json`) loaded at startup.
    pub questionnaire_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
    pub file_enabled: bool,
    pub file_directory: String,
    pub file_prefix: String,
    pub file_rotation: String,
    pub opentelemetry_enabled: bool,
    pub otlp_endpoint: String,
    pub otlp_timeout_seconds: u64,
    pub trace_sample_ratio: f64,
    pub service_name: String,
    pub service_version: Option<String>,
    pub deployment_environment: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file_enabled: false,
            file_directory: "logs".to_string(),
            file_prefix: "raito".to_string(),
            file_rotation: "daily".to_string(),
            opentelemetry_enabled: false,
            otlp_endpoint: "http://localhost:4317".to_string(),
            otlp_timeout_seconds: 10,
            trace_sample_ratio: 1.0,
            service_name: "raito-server".to_string(),
            service_version: None,
            deployment_environment: "development".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment.
    pub fn load() -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();

        let path = std::env::var("RAITO_CONFIG").unwrap_or_else(|_| "config".to_string());
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&path).required(false))
            .add_source(
                config::Environment::with_prefix("RAITO")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.codec.secret.trim().is_empty() {
            anyhow::bail!("codec.secret must be set");
        }
        if self.auth.enabled && self.auth.jwt_secret.trim().is_empty() {
            anyhow::bail!("auth.jwt_secret must be set when auth is enabled");
        }
        if self.database.backend == StorageBackend::Postgres && self.database.url.is_empty() {
            anyhow::bail!("database.url must be set for the postgres backend");
        }
        if self.audit.queue_capacity == 0 || self.issuer.queue_capacity == 0 {
            anyhow::bail!("queue capacities must be greater than zero");
        }
        if self.issuer.enabled && self.issuer.issuance_endpoint.is_empty() {
            anyhow::bail!("issuer.issuance_endpoint must be set when the issuer is enabled");
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = format!("{}:{}", self.server.host, self.server.port);
        Ok(addr.parse()?)
    }
}
