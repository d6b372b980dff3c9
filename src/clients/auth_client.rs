// Client for the hosted auth provider ("get current user from bearer credential")

use std::time::Duration;

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

const AUTH_TIMEOUT_SECS: u64 = 10;

/// Audience the provider stamps on user access tokens
const TOKEN_AUDIENCE: &str = "authenticated";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid or expired session")]
    InvalidSession,
    #[error("Auth provider unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Deserialize)]
struct AccessTokenClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Clone)]
pub struct AuthClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    jwt_secret: Option<String>,
}

impl AuthClient {
    pub fn new(
        base_url: impl Into<String>,
        anon_key: impl Into<String>,
        jwt_secret: Option<String>,
    ) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(AUTH_TIMEOUT_SECS))
            .build()
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            jwt_secret: jwt_secret.filter(|s| !s.is_empty()),
        })
    }

    /// Resolve the user behind a bearer token.
    ///
    /// With a JWT secret configured the token is verified locally; otherwise
    /// the provider's `/auth/v1/user` endpoint is asked.
    pub async fn current_user(&self, token: &str) -> Result<AuthUser, AuthError> {
        if let Some(secret) = &self.jwt_secret {
            return verify_access_token(secret, token);
        }

        let url = format!("{}/auth/v1/user", self.base_url);
        let response = self
            .http
            .get(&url)
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;

        match response.status() {
            status if status.is_success() => response
                .json::<AuthUser>()
                .await
                .map_err(|e| AuthError::Unavailable(format!("Malformed user payload: {}", e))),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(AuthError::InvalidSession),
            status => Err(AuthError::Unavailable(format!(
                "Auth provider returned {}",
                status
            ))),
        }
    }
}

fn verify_access_token(secret: &str, token: &str) -> Result<AuthUser, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[TOKEN_AUDIENCE]);

    let data = decode::<AccessTokenClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        tracing::debug!("Rejected access token: {}", e);
        AuthError::InvalidSession
    })?;

    Ok(AuthUser {
        id: data.claims.sub,
        email: data.claims.email,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::test_support::spawn_stub;
    use axum::{Json, Router, http::HeaderMap, routing::get};
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::json;

    fn token(secret: &str, aud: &str) -> String {
        let exp = chrono::Utc::now().timestamp() + 3600;
        encode(
            &Header::new(Algorithm::HS256),
            &json!({ "sub": "user-1", "email": "a@b.co", "aud": aud, "exp": exp }),
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn local_verification_accepts_signed_token() {
        let client = AuthClient::new("http://unused", "anon", Some("s3cret".into())).unwrap();
        let user = client
            .current_user(&token("s3cret", TOKEN_AUDIENCE))
            .await
            .unwrap();
        assert_eq!(user.id, "user-1");
        assert_eq!(user.email.as_deref(), Some("a@b.co"));
    }

    #[tokio::test]
    async fn local_verification_rejects_bad_signature_or_audience() {
        let client = AuthClient::new("http://unused", "anon", Some("s3cret".into())).unwrap();
        assert!(matches!(
            client.current_user(&token("other", TOKEN_AUDIENCE)).await,
            Err(AuthError::InvalidSession)
        ));
        assert!(matches!(
            client.current_user(&token("s3cret", "anon")).await,
            Err(AuthError::InvalidSession)
        ));
    }

    #[tokio::test]
    async fn remote_lookup_forwards_credentials() {
        let app = Router::new().route(
            "/auth/v1/user",
            get(|headers: HeaderMap| async move {
                if headers["apikey"] == "anon" && headers["authorization"] == "Bearer good" {
                    Ok(Json(json!({ "id": "u-42", "email": "x@y.z", "role": "authenticated" })))
                } else {
                    Err(axum::http::StatusCode::UNAUTHORIZED)
                }
            }),
        );
        let base = spawn_stub(app).await;
        let client = AuthClient::new(base, "anon", None).unwrap();

        let user = client.current_user("good").await.unwrap();
        assert_eq!(user.id, "u-42");
        assert!(matches!(
            client.current_user("bad").await,
            Err(AuthError::InvalidSession)
        ));
    }
}
