//! End-to-end tests driving the router in process against the in-memory store

mod support;

mod auth;
mod consent;
mod export;
mod gates;
mod import;
mod issuer;
mod shares;
