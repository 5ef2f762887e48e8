//! Session cookie middleware.
//!
//! Resolves the `session_id` cookie into a [`SessionId`] request extension,
//! issuing a fresh identifier (and cookie) when the request carries none.
//!
//! Cookie values that are not well-formed identifiers are ignored: the id
//! names a directory under the artifacts root, so it must never carry path
//! separators or dots.

use axum::extract::Request;
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, TimeDelta, Utc};

use crate::ident::{self, ID_LEN};

pub const COOKIE_NAME: &str = "session_id";
const MAX_AGE_SECS: i64 = 24 * 3600;

/// The session a request belongs to, inserted by [`session_middleware`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Axum middleware function for session resolution.
pub async fn session_middleware(mut req: Request, next: Next) -> Response {
    let cookie_header = req
        .headers()
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let existing = parse_cookie(cookie_header, COOKIE_NAME)
        .filter(|value| ident::is_valid_id(value))
        .map(str::to_string);

    let (session_id, is_new) = match existing {
        Some(id) => (id, false),
        None => match ident::generate_id(ID_LEN) {
            Ok(id) => (id, true),
            Err(e) => {
                tracing::error!(error = %e, "Failed to generate session id");
                return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create session")
                    .into_response();
            }
        },
    };

    if is_new {
        tracing::debug!(session_id = %session_id, "New session");
    }

    req.extensions_mut().insert(SessionId(session_id.clone()));
    let mut response = next.run(req).await;

    if is_new {
        let cookie = make_set_cookie(&session_id, Utc::now());
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::error!(error = %e, "Invalid Set-Cookie header"),
        }
    }

    response
}

/// Set-Cookie value for a new session issued at `now`
pub fn make_set_cookie(session_id: &str, now: DateTime<Utc>) -> String {
    let expires = now + TimeDelta::seconds(MAX_AGE_SECS);

    let parts = [
        format!("{}={}", COOKIE_NAME, session_id),
        "Path=/".to_string(),
        format!("Max-Age={}", MAX_AGE_SECS),
        format!("Expires={}", expires.format("%a, %d %b %Y %H:%M:%S GMT")),
        "SameSite=Lax".to_string(),
        "HttpOnly".to_string(),
    ];
    parts.join("; ")
}

/// Parse a specific cookie from a Cookie header value.
pub fn parse_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|part| {
        part.trim()
            .strip_prefix(name)
            .and_then(|rest| rest.strip_prefix('='))
    })
}
