//! Collaborator read routes, one table per access gate

use crate::api::handlers::gated;
use crate::api::middleware::{invitation_gate, open_link_gate, registered_viewer_gate};
use crate::state::AppState;
use axum::{middleware::from_fn_with_state, routing::post, Router};

pub const OPEN_LINK_PREFIX: &str = "/openraito";
pub const REGISTERED_VIEWER_PREFIX: &str = "/openraito/v2";
pub const INVITATION_PREFIX: &str = "/openraito/invitation";

fn read_routes(prefix: &str) -> Router<AppState> {
    Router::new()
        .route(
            &format!("{prefix}/phenotypes/:patientId"),
            post(gated::phenotypes),
        )
        .route(
            &format!("{prefix}/seizures/dates/:patientId"),
            post(gated::seizures_dates),
        )
        .route(
            &format!("{prefix}/medications/dates/:patientId"),
            post(gated::medications_dates),
        )
        .route(
            &format!("{prefix}/feels/dates/:patientId"),
            post(gated::feels_dates),
        )
}

/// All three gated tables. The gate runs as a route layer so unmatched paths
/// still fall through to 404.
pub fn gated_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(
            read_routes(OPEN_LINK_PREFIX)
                .route_layer(from_fn_with_state(state.clone(), open_link_gate)),
        )
        .merge(
            read_routes(REGISTERED_VIEWER_PREFIX)
                .route_layer(from_fn_with_state(state.clone(), registered_viewer_gate)),
        )
        .merge(
            read_routes(INVITATION_PREFIX)
                .route_layer(from_fn_with_state(state, invitation_gate)),
        )
}
