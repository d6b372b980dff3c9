// Publishing a stored post to LinkedIn, shared by the direct and scheduled paths

use axum::http::StatusCode;
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use super::AppState;
use crate::clients::{LinkedInError, UgcShare, linkedin_client::person_urn};
use crate::db::queries;
use crate::middleware::{ApiError, ErrorResponse};
use crate::models::{Post, UserStreak};
use crate::utils::encryption;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("LinkedIn not connected")]
    NotConnected,
    #[error("Stored LinkedIn credentials could not be read")]
    CredentialsUnreadable,
    #[error("Failed to post to LinkedIn: {0}")]
    LinkedIn(#[from] LinkedInError),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl PublishError {
    pub fn into_api_error(self) -> ApiError {
        let (status, code) = match &self {
            PublishError::NotConnected => (StatusCode::BAD_REQUEST, "LINKEDIN_NOT_CONNECTED"),
            PublishError::CredentialsUnreadable => {
                (StatusCode::INTERNAL_SERVER_ERROR, "LINKEDIN_CREDENTIALS_INVALID")
            }
            PublishError::LinkedIn(LinkedInError::Api { .. }) => {
                (StatusCode::BAD_REQUEST, "LINKEDIN_POST_FAILED")
            }
            PublishError::LinkedIn(_) => (StatusCode::BAD_GATEWAY, "LINKEDIN_UNAVAILABLE"),
            PublishError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DB_ERROR"),
        };

        let mut body = match &self {
            PublishError::LinkedIn(_) => ErrorResponse::new("Failed to post to LinkedIn", code),
            PublishError::Database(_) => ErrorResponse::new("Failed to update post", code),
            other => ErrorResponse::new(other.to_string(), code),
        };
        if let PublishError::LinkedIn(e) = &self {
            body = body.with_details(e.to_string());
        }

        (status, axum::Json(body))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedPost {
    pub post_id: Uuid,
    pub linked_in_post_id: String,
    pub media_attached: bool,
}

/// Share `post` on the caller's connected LinkedIn account.
///
/// A failed share marks the post `failed` with the error text; a successful
/// one marks it `published` and advances the user's streak.
pub async fn publish_to_linkedin(
    state: &AppState,
    user_id: &str,
    post: &Post,
    include_media: bool,
) -> Result<PublishedPost, PublishError> {
    let connection = queries::get_linkedin_connection(&state.db, user_id)
        .await?
        .ok_or(PublishError::NotConnected)?;

    let access_token = encryption::decrypt(
        &state.config.encryption_key,
        &connection.encrypted_access_token,
    )
    .map_err(|e| {
        tracing::error!(user_id, "Failed to decrypt LinkedIn token: {}", e);
        PublishError::CredentialsUnreadable
    })?;

    let mut share = UgcShare::text(&connection.linkedin_id, &post.content);
    let mut media_attached = false;

    if include_media {
        if let Some(media_url) = post.media_url.as_deref() {
            match attach_image(state, &access_token, &connection.linkedin_id, media_url).await {
                Ok(asset) => {
                    share = share.with_image(asset);
                    media_attached = true;
                }
                Err(e) => {
                    tracing::warn!(post_id = %post.id, "Media upload failed, posting text only: {}", e);
                }
            }
        }
    }

    let linkedin_post_id = match state.linkedin.create_share(&access_token, &share).await {
        Ok(id) => id,
        Err(e) => {
            tracing::error!(post_id = %post.id, "LinkedIn share failed: {}", e);
            queries::mark_post_failed(&state.db, user_id, post.id, &e.to_string()).await?;
            return Err(e.into());
        }
    };

    Ok(record_share(state, user_id, post.id, linkedin_post_id, media_attached).await)
}

/// Bookkeeping after a successful share. The share is already live, so
/// database failures are logged and the LinkedIn id is still returned.
async fn record_share(
    state: &AppState,
    user_id: &str,
    post_id: Uuid,
    linkedin_post_id: String,
    media_attached: bool,
) -> PublishedPost {
    if let Err(e) =
        queries::mark_post_published(&state.db, user_id, post_id, Some(&linkedin_post_id)).await
    {
        tracing::error!(
            post_id = %post_id,
            linkedin_post_id = %linkedin_post_id,
            "Shared on LinkedIn but failed to mark post published: {}",
            e
        );
    }
    if let Err(e) = queries::record_publish_activity(&state.db, user_id, UserStreak::today()).await
    {
        tracing::warn!(user_id, "Failed to update streak: {}", e);
    }

    tracing::info!(post_id = %post_id, linkedin_post_id = %linkedin_post_id, "Post published to LinkedIn");

    PublishedPost {
        post_id,
        linked_in_post_id: linkedin_post_id,
        media_attached,
    }
}

async fn attach_image(
    state: &AppState,
    access_token: &str,
    linkedin_id: &str,
    media_url: &str,
) -> Result<String, LinkedInError> {
    let upload = state
        .linkedin
        .register_image_upload(access_token, &person_urn(linkedin_id))
        .await?;
    let bytes = state.linkedin.fetch_media(media_url).await?;
    state
        .linkedin
        .upload_media(access_token, &upload.upload_url, bytes)
        .await?;
    Ok(upload.asset)
}

/// Outcome of one post in a scheduled batch
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItem {
    pub post_id: Uuid,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linked_in_post_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Concurrent shares in one scheduled batch
pub const BATCH_CONCURRENCY: usize = 4;

/// Publish every due scheduled post of `user_id`.
pub async fn publish_due_posts(
    state: &AppState,
    user_id: &str,
) -> Result<Vec<BatchItem>, PublishError> {
    use futures::StreamExt;

    let due = queries::list_due_posts(&state.db, user_id, Utc::now()).await?;
    tracing::info!(user_id, count = due.len(), "Publishing due scheduled posts");

    let results = futures::stream::iter(due.into_iter())
        .map(|post| async move {
            match publish_to_linkedin(state, user_id, &post, post.media_url.is_some()).await {
                Ok(published) => BatchItem {
                    post_id: post.id,
                    success: true,
                    linked_in_post_id: Some(published.linked_in_post_id),
                    error: None,
                },
                Err(e) => BatchItem {
                    post_id: post.id,
                    success: false,
                    linked_in_post_id: None,
                    error: Some(e.to_string()),
                },
            }
        })
        .buffer_unordered(BATCH_CONCURRENCY)
        .collect::<Vec<_>>()
        .await;

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{lazy_state, test_config};

    #[test]
    fn linkedin_rejection_maps_to_bad_request_with_details() {
        let err = PublishError::LinkedIn(LinkedInError::Api {
            status: 422,
            body: "duplicate share".into(),
        });
        let (status, axum::Json(body)) = err.into_api_error();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.code, "LINKEDIN_POST_FAILED");
        assert!(body.details.unwrap().contains("duplicate share"));
    }

    #[test]
    fn missing_connection_is_a_client_error() {
        let (status, axum::Json(body)) = PublishError::NotConnected.into_api_error();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "LinkedIn not connected");
        assert!(body.details.is_none());
    }

    #[tokio::test]
    async fn share_survives_bookkeeping_failures() {
        // Pool is unreachable: both the status update and the streak update fail
        let state = lazy_state(test_config());
        let post_id = Uuid::new_v4();

        let published = record_share(&state, "user-1", post_id, "urn:li:share:1".into(), true).await;
        assert_eq!(published.post_id, post_id);
        assert_eq!(published.linked_in_post_id, "urn:li:share:1");
        assert!(published.media_attached);
    }

    #[tokio::test]
    async fn batch_publisher_runs_on_a_spawned_task() {
        let state = lazy_state(test_config());
        let result = tokio::spawn(async move { publish_due_posts(&state, "user-1").await })
            .await
            .unwrap();
        assert!(matches!(result, Err(PublishError::Database(_))));
    }
}
