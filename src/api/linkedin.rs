use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::AppState;
use super::publishing::{self, PublishedPost};
use crate::clients::{LinkedInError, LinkedInProfile};
use crate::db::queries;
use crate::middleware::{ApiError, ErrorResponse, api_error, require_user_from_headers};
use crate::models::LinkedInConnection;
use crate::utils::encryption;

// ============================================
// Request / Response Types
// ============================================

#[derive(Debug, Deserialize)]
pub struct ExchangeTokenRequest {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ExchangeTokenResponse {
    pub success: bool,
    pub access_token: String,
    pub profile: LinkedInProfile,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ConnectRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "LinkedIn access token is required"))]
    pub linkedin_access_token: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "LinkedIn ID is required"))]
    pub linkedin_id: String,
    #[serde(default)]
    pub linkedin_name: Option<String>,
    #[serde(default)]
    pub linkedin_picture: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConnectResponse {
    pub success: bool,
    pub message: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct ProfileQuery {
    pub access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedInPostRequest {
    pub post_id: Option<Uuid>,
    #[serde(default)]
    pub include_media: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedInPostResponse {
    pub success: bool,
    pub message: &'static str,
    #[serde(flatten)]
    pub published: PublishedPost,
}

fn linkedin_error(error: &str, code: &str, e: &LinkedInError) -> ApiError {
    let status = match e {
        LinkedInError::NotConfigured => StatusCode::INTERNAL_SERVER_ERROR,
        LinkedInError::Api { .. } => StatusCode::BAD_REQUEST,
        LinkedInError::Network(_) | LinkedInError::Malformed(_) => StatusCode::BAD_GATEWAY,
    };
    (
        status,
        Json(ErrorResponse::new(error, code).with_details(e.to_string())),
    )
}

// ============================================
// Handlers
// ============================================

/// Trade an OAuth authorization code for an access token and profile
pub async fn exchange_token(
    State(state): State<AppState>,
    Json(req): Json<ExchangeTokenRequest>,
) -> Result<Json<ExchangeTokenResponse>, ApiError> {
    let Some(code) = req.code.filter(|c| !c.is_empty()) else {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Authorization code is required",
            "CODE_REQUIRED",
        ));
    };

    if !state.linkedin.oauth_configured() {
        return Err(api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "LinkedIn OAuth not configured",
            "LINKEDIN_NOT_CONFIGURED",
        ));
    }

    tracing::debug!(oauth_state = ?req.state, "Exchanging LinkedIn authorization code");

    let token = state
        .linkedin
        .exchange_code(&code, &state.config.linkedin_redirect_uri())
        .await
        .map_err(|e| {
            tracing::error!("LinkedIn token exchange failed: {}", e);
            linkedin_error("Failed to exchange authorization code", "TOKEN_EXCHANGE_FAILED", &e)
        })?;

    let profile = state
        .linkedin
        .profile(&token.access_token)
        .await
        .map_err(|e| linkedin_error("Failed to fetch LinkedIn profile", "PROFILE_FETCH_FAILED", &e))?;

    Ok(Json(ExchangeTokenResponse {
        success: true,
        access_token: token.access_token,
        profile,
    }))
}

/// Store the caller's LinkedIn credentials (token encrypted at rest)
///
/// **Auth: Session Required**
pub async fn connect(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ConnectRequest>,
) -> Result<Json<ConnectResponse>, ApiError> {
    let user = require_user_from_headers(&state.auth, &headers).await?;

    req.validate().map_err(|_| {
        api_error(
            StatusCode::BAD_REQUEST,
            "LinkedIn access token and ID are required",
            "VALIDATION_ERROR",
        )
    })?;

    let encrypted = encryption::encrypt(&state.config.encryption_key, &req.linkedin_access_token)
        .map_err(|e| {
            tracing::error!("Failed to encrypt LinkedIn token: {}", e);
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to store LinkedIn credentials",
                "ENCRYPTION_FAILED",
            )
        })?;

    let connection = LinkedInConnection {
        user_id: user.user_id,
        linkedin_id: req.linkedin_id,
        linkedin_name: req.linkedin_name,
        linkedin_picture: req.linkedin_picture,
        encrypted_access_token: encrypted,
        connected_at: Utc::now(),
    };

    queries::upsert_linkedin_connection(&state.db, &connection)
        .await
        .map_err(|e| {
            tracing::error!("Failed to store LinkedIn connection: {}", e);
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to store LinkedIn credentials",
                "DB_ERROR",
            )
        })?;

    tracing::info!(user_id = %connection.user_id, "LinkedIn account connected");

    Ok(Json(ConnectResponse {
        success: true,
        message: "LinkedIn credentials stored successfully",
    }))
}

/// Combined LinkedIn profile for a LinkedIn access token
pub async fn profile(
    State(state): State<AppState>,
    Query(query): Query<ProfileQuery>,
    headers: HeaderMap,
) -> Result<Json<LinkedInProfile>, ApiError> {
    let token = query
        .access_token
        .filter(|t| !t.is_empty())
        .or_else(|| {
            headers
                .get("x-linkedin-token")
                .and_then(|h| h.to_str().ok())
                .filter(|t| !t.is_empty())
                .map(str::to_string)
        })
        .ok_or_else(|| {
            api_error(
                StatusCode::BAD_REQUEST,
                "LinkedIn access token required",
                "TOKEN_REQUIRED",
            )
        })?;

    let profile = state.linkedin.profile(&token).await.map_err(|e| {
        tracing::error!("LinkedIn profile lookup failed: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(
                ErrorResponse::new("Failed to fetch LinkedIn profile", "PROFILE_FETCH_FAILED")
                    .with_details(e.to_string()),
            ),
        )
    })?;

    Ok(Json(profile))
}

/// Publish a stored post to the caller's LinkedIn feed
///
/// **Auth: Session Required**
pub async fn post_to_linkedin(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<LinkedInPostRequest>,
) -> Result<Json<LinkedInPostResponse>, ApiError> {
    let user = require_user_from_headers(&state.auth, &headers).await?;

    let Some(post_id) = req.post_id else {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Post ID is required",
            "VALIDATION_ERROR",
        ));
    };

    let post = queries::get_post(&state.db, &user.user_id, post_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load post: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to load post", "DB_ERROR")
        })?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Post not found", "POST_NOT_FOUND"))?;

    let published = publishing::publish_to_linkedin(&state, &user.user_id, &post, req.include_media)
        .await
        .map_err(|e| e.into_api_error())?;

    Ok(Json(LinkedInPostResponse {
        success: true,
        message: "Post published to LinkedIn successfully",
        published,
    }))
}
