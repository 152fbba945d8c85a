//! Authentication / Authorization primitives.
//!
//! Bearer tokens are HS256 JWTs signed with `auth.jwt_secret`. The subject
//! is the caller's encoded user id; the role decides which routes and
//! patients the caller may reach.

use axum::{
    extract::{FromRequestParts, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::{
    codec::IdCodec,
    models::{Patient, Role},
    state::AppState,
    Config, Error,
};

/// Subject used when authentication is disabled.
pub const SYSTEM_SUBJECT: &str = "system";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub exp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    /// Encoded user id, as carried in the token.
    pub subject: String,
    /// Raw user id.
    pub user_id: String,
    pub role: Role,
}

impl Principal {
    pub fn system() -> Self {
        Self {
            subject: SYSTEM_SUBJECT.to_string(),
            user_id: SYSTEM_SUBJECT.to_string(),
            role: Role::SuperAdmin,
        }
    }

    pub fn require_role(&self, allowed: &[Role]) -> crate::Result<()> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(Error::Forbidden)
        }
    }

    /// Staff reach every patient; a `User` only the patients they created.
    pub fn ensure_patient_access(&self, patient: &Patient) -> crate::Result<()> {
        if self.role.is_staff() || patient.created_by == self.user_id {
            Ok(())
        } else {
            Err(Error::Forbidden)
        }
    }
}

#[derive(Debug, Clone)]
pub enum AuthError {
    MissingToken,
    InvalidToken(String),
}

impl AuthError {
    fn message(&self) -> String {
        match self {
            Self::MissingToken => "Missing bearer token".to_string(),
            Self::InvalidToken(msg) => format!("Invalid bearer token: {msg}"),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = axum::Json(json!({ "message": self.message() }));
        let mut response = (StatusCode::UNAUTHORIZED, body).into_response();
        response.headers_mut().insert(
            header::WWW_AUTHENTICATE,
            header::HeaderValue::from_static("Bearer"),
        );
        response
    }
}

#[derive(Clone)]
pub struct AuthManager {
    config: Arc<Config>,
    codec: Arc<IdCodec>,
}

impl AuthManager {
    pub fn new(config: Arc<Config>, codec: Arc<IdCodec>) -> Self {
        Self { config, codec }
    }

    pub fn enabled(&self) -> bool {
        self.config.auth.enabled
    }

    pub fn authenticate_headers(&self, headers: &HeaderMap) -> Result<Principal, AuthError> {
        let authz = headers
            .get(header::AUTHORIZATION)
            .ok_or(AuthError::MissingToken)?
            .to_str()
            .map_err(|_| {
                AuthError::InvalidToken("Authorization header is not valid UTF-8".to_string())
            })?;

        let token = authz
            .strip_prefix("Bearer ")
            .or_else(|| authz.strip_prefix("bearer "))
            .ok_or_else(|| {
                AuthError::InvalidToken("Authorization header must be 'Bearer <token>'".to_string())
            })?;

        self.principal_from_token(token)
    }

    fn principal_from_token(&self, token: &str) -> Result<Principal, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = self.config.auth.leeway_seconds;

        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.auth.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| AuthError::InvalidToken(format!("{e}")))?
        .claims;

        let user_id = self
            .codec
            .decode(&claims.sub)
            .map_err(|_| AuthError::InvalidToken("unknown subject".to_string()))?;

        Ok(Principal {
            subject: claims.sub,
            user_id,
            role: claims.role,
        })
    }

    /// Sign a token for the raw user id, valid for `ttl_seconds`.
    pub fn issue_token(&self, user_id: &str, role: Role, ttl_seconds: i64) -> crate::Result<String> {
        let claims = Claims {
            sub: self.codec.encode(user_id),
            role,
            exp: Utc::now().timestamp() + ttl_seconds,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.auth.jwt_secret.as_bytes()),
        )
        .map_err(|e| Error::Internal(format!("failed to sign token: {e}")))
    }
}

/// Extractor for the authenticated principal attached by middleware.
#[derive(Debug, Clone)]
pub struct AuthenticatedPrincipal(pub Principal);

#[async_trait::async_trait]
impl<S> FromRequestParts<S> for AuthenticatedPrincipal
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(AuthenticatedPrincipal)
            .ok_or_else(|| AuthError::MissingToken.into_response())
    }
}

/// Middleware for attaching `Principal` (or rejecting) on protected routes.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    if !state.auth.enabled() {
        req.extensions_mut().insert(Principal::system());
        return next.run(req).await;
    }

    if req.method() == axum::http::Method::OPTIONS {
        return next.run(req).await;
    }

    match state.auth.authenticate_headers(req.headers()) {
        Ok(principal) => {
            req.extensions_mut().insert::<Principal>(principal);
            next.run(req).await
        }
        Err(err) => {
            tracing::debug!(path = %req.uri().path(), "Rejected request: {}", err.message());
            err.into_response()
        }
    }
}
