/**
 * Bearer Token Extraction
 *
 * Pulls the raw bearer token out of a request. Verification is left to
 * `ChatService`, which authenticates every operation exactly once.
 *
 * # Token Sources
 *
 * 1. `Authorization: Bearer <token>` header
 * 2. `?token=<token>` query parameter, for WebSocket clients that cannot set
 *    headers on the upgrade request
 */

use axum::{
    extract::{FromRequestParts, Query},
    http::{header::AUTHORIZATION, request::Parts},
};
use serde::Deserialize;

use crate::backend::error::ChatError;

/// Raw bearer token supplied with a request
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(pub String);

impl BearerToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BearerToken(..)")
    }
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

fn header_token(parts: &Parts) -> Option<String> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

fn query_token(parts: &Parts) -> Option<String> {
    Query::<TokenQuery>::try_from_uri(&parts.uri)
        .ok()?
        .0
        .token
        .filter(|token| !token.is_empty())
}

impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = ChatError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        header_token(parts)
            .or_else(|| query_token(parts))
            .map(BearerToken)
            .ok_or_else(|| {
                tracing::warn!(path = %parts.uri.path(), "[Server] Missing bearer token");
                ChatError::unauthorized("missing bearer token")
            })
    }
}
