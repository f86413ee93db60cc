// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::ErrorResponse;

use super::state::AppState;

/// Constant-time string comparison to prevent timing side-channel attacks.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    let mut acc = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        acc |= x ^ y;
    }
    acc == 0
}

/// Pull a token from the supported locations: the `x-agmux-token` header,
/// an `Authorization: Bearer` header, or a `?token=` query parameter.
pub fn extract_token<'a>(headers: &'a HeaderMap, query_token: Option<&'a str>) -> Option<&'a str> {
    if let Some(token) = headers.get("x-agmux-token").and_then(|v| v.to_str().ok()) {
        return Some(token);
    }
    if let Some(token) = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        return Some(token);
    }
    query_token
}

/// Validate a presented token. `Ok` when auth is disabled or the token
/// matches; all three transport positions are equivalent.
pub fn validate_token(
    headers: &HeaderMap,
    query_token: Option<&str>,
    expected: Option<&str>,
) -> Result<(), ()> {
    let Some(expected) = expected else {
        return Ok(());
    };
    match extract_token(headers, query_token) {
        Some(token) if constant_time_eq(token, expected) => Ok(()),
        _ => Err(()),
    }
}

/// Validate the `Origin` header against the allowlist. Absent origins pass
/// (non-browser clients); present origins must match exactly.
pub fn validate_origin(headers: &HeaderMap, allowed: &[String]) -> Result<(), ()> {
    let Some(origin) = headers.get("origin").and_then(|v| v.to_str().ok()) else {
        return Ok(());
    };
    if allowed.iter().any(|a| a == origin) {
        Ok(())
    } else {
        Err(())
    }
}

/// Axum middleware requiring the token on every `/api/*` request
/// (OPTIONS excepted, for CORS preflight). Pass-through when auth is off.
pub async fn auth_layer(
    State(state): State<Arc<AppState>>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let path = req.uri().path();
    let needs_auth = state.settings.auth_token.is_some()
        && path.starts_with("/api/")
        && req.method() != Method::OPTIONS;

    if needs_auth {
        let query_token = query_param(req.uri().query(), "token");
        if validate_token(req.headers(), query_token.as_deref(), state.settings.auth_token.as_deref())
            .is_err()
        {
            let body = ErrorResponse { error: "unauthorized".to_owned() };
            return (StatusCode::UNAUTHORIZED, axum::Json(body)).into_response();
        }
    }

    next.run(req).await
}

/// Extract a single query parameter value from a raw query string.
pub fn query_param(query: Option<&str>, key: &str) -> Option<String> {
    let query = query?;
    for pair in query.split('&') {
        if let Some(value) = pair.strip_prefix(key) {
            if let Some(value) = value.strip_prefix('=') {
                return Some(value.to_owned());
            }
        }
    }
    None
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
