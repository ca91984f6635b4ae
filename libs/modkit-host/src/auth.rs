//! Caller authentication for routes registered with `requires_auth`.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::problem::Problem;

/// Verified identity of the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub email: String,
}

impl CallerIdentity {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
        }
    }

    /// The part of the email before `@` (the whole address if there is none).
    #[must_use]
    pub fn local_part(&self) -> &str {
        self.email
            .split_once('@')
            .map_or(self.email.as_str(), |(local, _)| local)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,
    #[error("invalid bearer token")]
    InvalidToken,
    #[error("caller identity not found, auth middleware not configured")]
    MissingIdentity,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        Problem::unauthorized(self.to_string()).into_response()
    }
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Resolve a bearer token to the caller behind it.
    ///
    /// # Errors
    /// Returns [`AuthError::InvalidToken`] if the token is unknown.
    async fn authenticate(&self, token: &str) -> Result<CallerIdentity, AuthError>;

    /// Whether this authenticator can accept anyone at all.
    fn is_available(&self) -> bool {
        true
    }
}

/// Bearer tokens mapped to caller emails, loaded from `auth.tokens`.
#[derive(Debug, Default, Clone)]
pub struct StaticAuthenticator {
    tokens: BTreeMap<String, String>,
}

impl StaticAuthenticator {
    #[must_use]
    pub fn new(tokens: BTreeMap<String, String>) -> Self {
        Self { tokens }
    }
}

#[async_trait]
impl Authenticator for StaticAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<CallerIdentity, AuthError> {
        self.tokens
            .get(token)
            .map(CallerIdentity::new)
            .ok_or(AuthError::InvalidToken)
    }

    fn is_available(&self) -> bool {
        !self.tokens.is_empty()
    }
}

/// Extractor for the identity inserted by [`require_identity`].
#[derive(Debug, Clone)]
pub struct Identity(pub CallerIdentity);

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .cloned()
            .map(Identity)
            .ok_or(AuthError::MissingIdentity)
    }
}

/// Route middleware: resolve the bearer token to a [`CallerIdentity`] or answer 401.
pub async fn require_identity(
    State(authenticator): State<Arc<dyn Authenticator>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = extract_bearer_token(request.headers()) else {
        return AuthError::MissingToken.into_response();
    };

    match authenticator.authenticate(token).await {
        Ok(identity) => {
            tracing::debug!(email = %identity.email, "caller authenticated");
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(err) => {
            tracing::debug!("rejecting request: {err}");
            err.into_response()
        }
    }
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer ").map(str::trim))
}
