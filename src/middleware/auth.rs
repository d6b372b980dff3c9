use axum::{
    Json,
    http::{HeaderMap, StatusCode, header},
};
use serde::Serialize;

use crate::clients::{AuthClient, AuthError};

#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub email: Option<String>,
}

#[derive(Debug, Serialize, Clone)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Shorthand for the `(status, Json<ErrorResponse>)` rejection handlers return.
pub fn api_error(status: StatusCode, error: impl Into<String>, code: &str) -> ApiError {
    (status, Json(ErrorResponse::new(error, code)))
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Resolve the caller behind `Authorization: Bearer <token>` via the auth provider.
pub async fn require_user_from_headers(
    auth: &AuthClient,
    headers: &HeaderMap,
) -> Result<AuthenticatedUser, ApiError> {
    let Some(token) = bearer_token(headers) else {
        return Err(api_error(
            StatusCode::UNAUTHORIZED,
            "Session token required. Please log in.",
            "SESSION_REQUIRED",
        ));
    };

    match auth.current_user(token).await {
        Ok(user) => Ok(AuthenticatedUser {
            user_id: user.id,
            email: user.email,
        }),
        Err(AuthError::InvalidSession) => Err(api_error(
            StatusCode::UNAUTHORIZED,
            "Invalid or expired session",
            "SESSION_INVALID",
        )),
        Err(e @ AuthError::Unavailable(_)) => {
            tracing::error!("Auth provider lookup failed: {}", e);
            Err(api_error(
                StatusCode::SERVICE_UNAVAILABLE,
                "Authentication service unavailable",
                "AUTH_UNAVAILABLE",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_requires_prefix_and_value() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer  "));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer tok-1"));
        assert_eq!(bearer_token(&headers), Some("tok-1"));
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized() {
        let auth = AuthClient::new("http://unused", "anon", Some("secret".into())).unwrap();
        let (status, Json(body)) = require_user_from_headers(&auth, &HeaderMap::new())
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.code, "SESSION_REQUIRED");
    }

    #[test]
    fn error_details_are_optional() {
        let plain = serde_json::to_value(ErrorResponse::new("x", "X")).unwrap();
        assert!(plain.get("details").is_none());

        let detailed = serde_json::to_value(ErrorResponse::new("x", "X").with_details("why")).unwrap();
        assert_eq!(detailed["details"], "why");
    }
}
