use axum::{Json, extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::drafting::{self, Tone};
use crate::middleware::{ApiError, api_error};

#[derive(Debug, Deserialize)]
pub struct GeneratePostRequest {
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub tone: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GeneratePostResponse {
    pub content: String,
    pub topic: String,
    pub tone: String,
    pub generated_at: DateTime<Utc>,
    pub note: &'static str,
}

/// Draft a LinkedIn post about a topic in the requested tone
pub async fn generate_post(
    State(state): State<AppState>,
    Json(req): Json<GeneratePostRequest>,
) -> Result<Json<GeneratePostResponse>, ApiError> {
    let topic = req
        .topic
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Topic is required", "TOPIC_REQUIRED"))?;

    let tone = req
        .tone
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| Tone::Professional.as_str().to_string());

    let draft = drafting::draft_post(state.llm.as_ref(), &topic, Tone::parse(&tone)).await;

    Ok(Json(GeneratePostResponse {
        content: draft.content,
        topic,
        tone,
        generated_at: Utc::now(),
        note: draft.note,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{lazy_state, test_config};
    use axum::{Router, body::Body, http::Request, routing::post};
    use tower::ServiceExt;

    async fn call(body: &str) -> (StatusCode, serde_json::Value) {
        let app = Router::new()
            .route("/posts/generate", post(generate_post))
            .with_state(lazy_state(test_config()));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/posts/generate")
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
    async fn missing_topic_is_rejected() {
        let (status, body) = call(r#"{"tone": "casual"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Topic is required");
    }

    #[tokio::test]
    async fn template_draft_without_llm() {
        let (status, body) = call(r#"{"topic": "AI in logistics", "tone": "thoughtful"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["topic"], "AI in logistics");
        assert_eq!(body["tone"], "thoughtful");
        assert_eq!(body["note"], drafting::NOTE_TEMPLATE);
        assert!(body["content"].as_str().unwrap().contains("AI in logistics"));
        assert!(body["generated_at"].is_string());
    }

    #[tokio::test]
    async fn tone_defaults_to_professional() {
        let (_, body) = call(r#"{"topic": "remote teams"}"#).await;
        assert_eq!(body["tone"], "professional");
    }
}
