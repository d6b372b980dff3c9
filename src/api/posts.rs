use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::AppState;
use super::publishing::{self, BatchItem, PublishedPost};
use crate::db::queries;
use crate::middleware::{ApiError, api_error, require_user_from_headers};
use crate::models::{Post, PostStatus, UserStreak};

// ============================================
// Request / Response Types
// ============================================

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Content is required"))]
    pub content: String,
    #[serde(default)]
    pub status: Option<PostStatus>,
    #[serde(default)]
    #[validate(url)]
    pub media_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulePostRequest {
    pub post_id: Option<Uuid>,
    pub schedule_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostIdRequest {
    #[serde(default)]
    pub post_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledPublishResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<PublishedPost>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<BatchItem>,
}

fn db_error(action: &str, e: sqlx::Error) -> ApiError {
    tracing::error!("Failed to {}: {}", action, e);
    api_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Failed to {}", action),
        "DB_ERROR",
    )
}

fn post_not_found() -> ApiError {
    api_error(StatusCode::NOT_FOUND, "Post not found", "POST_NOT_FOUND")
}

// ============================================
// Handlers
// ============================================

/// Create a post (default status `draft`)
///
/// **Auth: Session Required**
pub async fn create_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreatePostRequest>,
) -> Result<Json<Post>, ApiError> {
    if let Err(errors) = req.validate() {
        let message = if errors.field_errors().contains_key("content") {
            "Content is required".to_string()
        } else {
            errors.to_string()
        };
        return Err(api_error(StatusCode::BAD_REQUEST, message, "VALIDATION_ERROR"));
    }

    let user = require_user_from_headers(&state.auth, &headers).await?;
    let status = req.status.unwrap_or(PostStatus::Draft);

    let post = queries::insert_post(
        &state.db,
        &user.user_id,
        &req.content,
        status,
        req.media_url.as_deref(),
    )
    .await
    .map_err(|e| db_error("create post", e))?;

    tracing::info!(post_id = %post.id, status = %post.status, "Post created");
    Ok(Json(post))
}

/// List the caller's posts, newest first
///
/// **Auth: Session Required**
pub async fn list_posts(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Post>>, ApiError> {
    let user = require_user_from_headers(&state.auth, &headers).await?;

    let posts = queries::list_posts(&state.db, &user.user_id)
        .await
        .map_err(|e| db_error("fetch posts", e))?;

    Ok(Json(posts))
}

/// Schedule a post for later publishing
///
/// **Auth: Session Required**
pub async fn schedule_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SchedulePostRequest>,
) -> Result<Json<Post>, ApiError> {
    let (Some(post_id), Some(schedule_time)) = (req.post_id, req.schedule_time) else {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Post ID and schedule time are required",
            "VALIDATION_ERROR",
        ));
    };

    let user = require_user_from_headers(&state.auth, &headers).await?;

    let post = queries::schedule_post(&state.db, &user.user_id, post_id, schedule_time)
        .await
        .map_err(|e| db_error("schedule post", e))?
        .ok_or_else(post_not_found)?;

    tracing::info!(post_id = %post.id, %schedule_time, "Post scheduled");
    Ok(Json(post))
}

/// Mark a post published locally (no LinkedIn call) and advance the streak
///
/// **Auth: Session Required**
pub async fn publish_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<PostIdRequest>,
) -> Result<Json<Post>, ApiError> {
    let Some(post_id) = req.post_id else {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Post ID is required",
            "VALIDATION_ERROR",
        ));
    };

    let user = require_user_from_headers(&state.auth, &headers).await?;

    let post = queries::mark_post_published(&state.db, &user.user_id, post_id, None)
        .await
        .map_err(|e| db_error("publish post", e))?
        .ok_or_else(post_not_found)?;

    if let Err(e) =
        queries::record_publish_activity(&state.db, &user.user_id, UserStreak::today()).await
    {
        tracing::warn!(post_id = %post.id, "Failed to update streak: {}", e);
    }

    Ok(Json(post))
}

/// Publish one scheduled post, or all of the caller's due posts when no id is given
///
/// **Auth: Session Required**
pub async fn run_scheduled_publisher(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<PostIdRequest>,
) -> Result<Json<ScheduledPublishResponse>, ApiError> {
    let user = require_user_from_headers(&state.auth, &headers).await?;

    let Some(post_id) = req.post_id else {
        let results = publishing::publish_due_posts(&state, &user.user_id)
            .await
            .map_err(|e| e.into_api_error())?;
        let published = results.iter().filter(|r| r.success).count();

        return Ok(Json(ScheduledPublishResponse {
            success: published == results.len(),
            message: format!("Published {} of {} due posts", published, results.len()),
            published: None,
            results,
        }));
    };

    let post = queries::get_post(&state.db, &user.user_id, post_id)
        .await
        .map_err(|e| db_error("load post", e))?
        .filter(|p| p.status == PostStatus::Scheduled)
        .ok_or_else(|| {
            api_error(
                StatusCode::NOT_FOUND,
                "Scheduled post not found",
                "POST_NOT_FOUND",
            )
        })?;

    let published = publishing::publish_to_linkedin(&state, &user.user_id, &post, post.media_url.is_some())
        .await
        .map_err(|e| e.into_api_error())?;

    Ok(Json(ScheduledPublishResponse {
        success: true,
        message: "Post published to LinkedIn successfully".to_string(),
        published: Some(published),
        results: Vec::new(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{lazy_state, test_config};
    use axum::{Router, body::Body, http::Request, routing::post};
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route("/posts", post(create_post))
            .route("/posts/schedule", post(schedule_post))
            .route("/posts/publish", post(publish_post))
            .with_state(lazy_state(test_config()))
    }

    async fn send(app: Router, uri: &str, body: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn create_requires_content() {
        let (status, body) = send(app(), "/posts", r#"{"content": ""}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Content is required");
    }

    #[tokio::test]
    async fn create_requires_session() {
        let (status, body) = send(app(), "/posts", r#"{"content": "Hello"}"#).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "SESSION_REQUIRED");
    }

    #[tokio::test]
    async fn schedule_requires_id_and_time() {
        let (status, body) = send(
            app(),
            "/posts/schedule",
            r#"{"postId": "6f1c2c3e-0000-4000-8000-000000000001"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Post ID and schedule time are required");
    }

    #[tokio::test]
    async fn publish_requires_post_id() {
        let (status, body) = send(app(), "/posts/publish", "{}").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Post ID is required");
    }
}
