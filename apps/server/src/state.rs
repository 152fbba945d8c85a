//! Shared application state handed to every handler and middleware

use crate::auth::AuthManager;
use crate::codec::IdCodec;
use crate::config::{Config, StorageBackend};
use crate::db::{DocumentStore, MemoryDocumentStore, PostgresDocumentStore, Repository};
use crate::models::Questionnaire;
use crate::services::{
    aggregate::Aggregator,
    audit::AccessAuditService,
    consent::ConsentService,
    export::ExportService,
    import::ImportService,
    issuer::{DisabledIssuer, HttpIssuerClient, IssuerClient, IssuerService},
    sharing::SharingService,
};
use crate::{Error, Result};
use sqlx::postgres::PgPoolOptions;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub repository: Repository,
    pub codec: Arc<IdCodec>,
    pub auth: AuthManager,
    pub audit: AccessAuditService,
    pub issuer: IssuerService,
    pub consent: ConsentService,
    pub sharing: SharingService,
    pub aggregator: Aggregator,
    pub export: ExportService,
    pub import: ImportService,
}

impl AppState {
    /// Build the state from configuration: storage backend, migrations,
    /// issuer client and the questionnaire catalog.
    pub async fn new(config: Config) -> Result<Self> {
        let store: Arc<dyn DocumentStore> = match config.database.backend {
            StorageBackend::Memory => {
                tracing::warn!("Using the in-memory store; data is lost on restart");
                Arc::new(MemoryDocumentStore::new())
            }
            StorageBackend::Postgres => {
                let pool = PgPoolOptions::new()
                    .max_connections(config.database.pool_max_size)
                    .acquire_timeout(Duration::from_secs(config.database.pool_timeout_seconds))
                    .connect(&config.database.url)
                    .await?;
                let store = PostgresDocumentStore::new(pool);
                if config.database.run_migrations {
                    store.migrate().await?;
                    tracing::info!("Database migrations applied");
                }
                Arc::new(store)
            }
        };

        let issuer_client: Arc<dyn IssuerClient> = if config.issuer.enabled {
            Arc::new(HttpIssuerClient::new(&config.issuer)?)
        } else {
            tracing::info!("Credential issuer disabled");
            Arc::new(DisabledIssuer)
        };

        let state = Self::with_parts(config, store, issuer_client);

        if let Some(dir) = state.config.resources.questionnaire_dir.clone() {
            let loaded = load_questionnaires(&state.repository, &dir).await?;
            tracing::info!(count = loaded, dir = %dir.display(), "Questionnaires loaded");
        }

        Ok(state)
    }

    /// Assemble the state around an existing store and issuer client.
    pub fn with_parts(
        config: Config,
        store: Arc<dyn DocumentStore>,
        issuer_client: Arc<dyn IssuerClient>,
    ) -> Self {
        let config = Arc::new(config);
        let repository = Repository::new(store);
        let codec = Arc::new(IdCodec::new(&config.codec.secret));
        let auth = AuthManager::new(config.clone(), codec.clone());
        let audit = AccessAuditService::new(
            repository.clone(),
            config.audit.enabled,
            config.audit.queue_capacity,
        );
        let issuer = IssuerService::new(issuer_client, repository.clone(), config.issuer.clone());
        let consent = ConsentService::new(repository.clone(), issuer.clone());
        let sharing = SharingService::new(repository.clone(), codec.clone(), issuer.clone());
        let aggregator = Aggregator::new(repository.clone());
        let export = ExportService::new(repository.clone(), aggregator.clone(), codec.clone());
        let import = ImportService::new(repository.clone());

        Self {
            config,
            repository,
            codec,
            auth,
            audit,
            issuer,
            consent,
            sharing,
            aggregator,
            export,
            import,
        }
    }
}

/// Upsert every `*.json` questionnaire definition in `dir`. A file may hold a
/// single definition or an array of them.
async fn load_questionnaires(repository: &Repository, dir: &Path) -> Result<usize> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| Error::Internal(format!("cannot read {}: {}", dir.display(), e)))?;

    let mut count = 0;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| Error::Internal(e.to_string()))?
    {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let raw = tokio::fs::read(&path)
            .await
            .map_err(|e| Error::Internal(format!("cannot read {}: {}", path.display(), e)))?;
        let value: serde_json::Value = serde_json::from_slice(&raw)?;
        let definitions: Vec<Questionnaire> = if value.is_array() {
            serde_json::from_value(value)?
        } else {
            vec![serde_json::from_value(value)?]
        };
        for questionnaire in definitions {
            repository.save_questionnaire(&questionnaire).await?;
            count += 1;
        }
    }
    Ok(count)
}
