//! Middleware stack for the API

pub mod gate;
pub mod layers;
pub mod metrics;
pub mod request_id;
pub mod security;

pub use gate::{invitation_gate, open_link_gate, registered_viewer_gate, GatedPatient};
pub use layers::{compression, cors};
pub use metrics::metrics_middleware;
pub use request_id::request_id_middleware;
pub use security::security_headers_middleware;
