//! Route tables, one function per area

pub mod export;
pub mod gated;
pub mod issuer;
pub mod metrics;
pub mod patients;
