//! Actix-web extractor for API key authentication.
//!
//! The key is read from the `X-API-Key` header. Browsers loading `data.js`
//! through a `<script>` tag cannot set headers, so the `api_key` query
//! parameter is accepted as a fallback.

use actix_web::dev::Payload;
use actix_web::http::StatusCode;
use actix_web::{web, FromRequest, HttpRequest, HttpResponse, ResponseError};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::future::{ready, Ready};
use tracing::debug;

use super::ApiKey;
use crate::config::{API_KEY_HEADER, API_KEY_QUERY_PARAM};
use crate::error::ErrorResponse;

/// Extract a secret header value, wrapping it in SecretString.
/// Returns None if the header is missing or invalid UTF-8.
fn extract_secret_header(req: &HttpRequest, header_name: &str) -> Option<SecretString> {
    req.headers()
        .get(header_name)
        .and_then(|v| v.to_str().ok())
        .map(|s| SecretString::from(s.to_string()))
}

#[derive(Deserialize)]
struct KeyQuery {
    api_key: Option<String>,
}

fn extract_secret_query(req: &HttpRequest) -> Option<SecretString> {
    web::Query::<KeyQuery>::from_query(req.query_string())
        .ok()
        .and_then(|q| q.into_inner().api_key)
        .map(SecretString::from)
}

/// Authentication error for extractors.
#[derive(Debug)]
pub struct AuthError {
    message: String,
}

impl AuthError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(StatusCode::UNAUTHORIZED).json(ErrorResponse {
            error: "UNAUTHORIZED".to_string(),
            message: self.message.clone(),
        })
    }
}

/// Extractor that requires the configured API key.
///
/// ```ignore
/// async fn protected_handler(_auth: ApiKeyAuth) -> impl Responder { ... }
/// ```
pub struct ApiKeyAuth;

impl FromRequest for ApiKeyAuth {
    type Error = AuthError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let Some(expected) = req.app_data::<web::Data<ApiKey>>() else {
            return ready(Err(AuthError::new("Internal configuration error")));
        };

        let provided = extract_secret_header(req, API_KEY_HEADER).or_else(|| extract_secret_query(req));

        match provided {
            Some(ref key) if expected.verify(key.expose_secret()) => ready(Ok(ApiKeyAuth)),
            Some(_) => {
                debug!(path = %req.path(), "Rejected request with invalid API key");
                ready(Err(AuthError::new("Invalid API key")))
            }
            None => ready(Err(AuthError::new(format!(
                "Missing API key. Provide {} header or {} query parameter.",
                API_KEY_HEADER, API_KEY_QUERY_PARAM
            )))),
        }
    }
}
