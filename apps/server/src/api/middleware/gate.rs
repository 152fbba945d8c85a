//! Access gate middleware for the collaborator read routes
//!
//! Each gate buffers the JSON body to read the caller's credential, resolves
//! the patient from the trailing encoded id, and either rejects with a bare
//! 403 or records an access event and forwards the request with the
//! resolved patient attached.

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value as JsonValue;

use crate::metrics::GATE_DECISIONS_TOTAL;
use crate::models::Patient;
use crate::request_context::RequestContext;
use crate::services::access::{evaluate, Credential, GateKind};
use crate::services::audit::AccessEvent;
use crate::state::AppState;
use crate::Error;

/// Patient that passed the gate, for the downstream handler.
#[derive(Debug, Clone)]
pub struct GatedPatient(pub Patient);

pub async fn open_link_gate(State(state): State<AppState>, req: Request, next: Next) -> Response {
    guard(state, GateKind::OpenLink, req, next).await
}

pub async fn registered_viewer_gate(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    guard(state, GateKind::RegisteredViewer, req, next).await
}

pub async fn invitation_gate(State(state): State<AppState>, req: Request, next: Next) -> Response {
    guard(state, GateKind::Invitation, req, next).await
}

async fn guard(state: AppState, kind: GateKind, req: Request, next: Next) -> Response {
    let (parts, body) = req.into_parts();
    // A body the gate cannot read is denied like any other failed check.
    let Ok(bytes) = axum::body::to_bytes(body, state.config.server.max_request_body_size).await
    else {
        return deny(kind);
    };
    let body_json: JsonValue = if bytes.is_empty() {
        JsonValue::Null
    } else {
        match serde_json::from_slice(&bytes) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(gate = kind.as_str(), error = %e, "Unreadable gate body");
                return deny(kind);
            }
        }
    };

    let encoded = parts.uri.path().rsplit('/').next().unwrap_or_default();
    let Ok(patient_id) = state.codec.decode(encoded) else {
        return deny(kind);
    };
    let patient = match state.repository.get_patient(&patient_id).await {
        Ok(Some(patient)) => patient,
        Ok(None) => return deny(kind),
        Err(e) => return e.into_response(),
    };

    let credential = Credential::from_body(&body_json);
    let Some(grant) = evaluate(kind, &patient, &credential) else {
        return deny(kind);
    };

    GATE_DECISIONS_TOTAL
        .with_label_values(&[kind.as_str(), "allow"])
        .inc();
    state.audit.enqueue(AccessEvent {
        platform: grant.platform,
        route: parts.uri.path().to_string(),
        method: parts.method.to_string(),
        request_id: parts
            .extensions
            .get::<RequestContext>()
            .map(|ctx| ctx.request_id.clone()),
        body: body_json,
        grant: grant.share,
        patient_id: patient.id.clone(),
    });

    let mut req = Request::from_parts(parts, Body::from(bytes));
    req.extensions_mut().insert(GatedPatient(patient));
    next.run(req).await
}

fn deny(kind: GateKind) -> Response {
    GATE_DECISIONS_TOTAL
        .with_label_values(&[kind.as_str(), "deny"])
        .inc();
    Error::Forbidden.into_response()
}
