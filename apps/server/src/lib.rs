//! Raito server
//!
//! Consent-gated sharing of patient-reported clinical data:
//! - Per-patient share configuration (open link, invitation, named grantee)
//! - Access gates with an audit trail for collaborator reads
//! - Organization consent with verifiable-credential issuance
//! - FHIR R4 bundle export and bulk import

#![allow(
    clippy::too_many_arguments,
    clippy::large_enum_variant,
)]

pub mod api;
pub mod auth;
pub mod codec;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod request_context;
pub mod services;
pub mod state;

pub use config::Config;
pub use error::{Error, Result};
pub use state::AppState;
