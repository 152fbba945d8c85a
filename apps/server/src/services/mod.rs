//! Domain services: access gate, consent, sharing, issuer, aggregation,
//! export and import.

pub mod access;
pub mod aggregate;
pub mod audit;
pub mod consent;
pub mod export;
pub mod import;
pub mod issuer;
pub mod sharing;
