use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::db::queries;
use crate::middleware::{ApiError, api_error, require_user_from_headers};
use crate::recommendations::{self, LinkedInSummary, ProfileContext, Recommendation};

#[derive(Debug, Default, Deserialize)]
pub struct RecommendationRequest {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub experience_years: Option<String>,
    #[serde(default)]
    pub goal: Option<String>,
    #[serde(default)]
    pub content_style: Option<String>,
    #[serde(default)]
    pub linkedin_profile: Option<LinkedInSummary>,
    #[serde(default, alias = "useSurveyData")]
    pub use_survey_data: bool,
}

#[derive(Debug, Serialize)]
pub struct RecommendationResponse {
    pub recommendations: Vec<Recommendation>,
}

/// Suggest up to ten LinkedIn topics for the caller's role.
///
/// Provider or parsing failures are answered with the fallback batch, never
/// with an error. With `useSurveyData` and a session, blanks are filled from
/// the stored onboarding survey.
pub async fn get_recommendations(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(mut req): Json<RecommendationRequest>,
) -> Result<Json<RecommendationResponse>, ApiError> {
    let Some(role) = req.role.take().filter(|r| !r.trim().is_empty()) else {
        return Err(api_error(StatusCode::BAD_REQUEST, "Role is required", "ROLE_REQUIRED"));
    };

    let Some(llm) = state.llm.as_ref() else {
        return Err(api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "OpenAI API key not configured",
            "LLM_NOT_CONFIGURED",
        ));
    };

    if req.use_survey_data && headers.contains_key(axum::http::header::AUTHORIZATION) {
        match require_user_from_headers(&state.auth, &headers).await {
            Ok(user) => fill_from_survey(&state, &user.user_id, &mut req).await,
            Err((status, _)) => {
                tracing::warn!(%status, "Session not usable for survey data, using request data only")
            }
        }
    }

    let mut profile = ProfileContext::new(role.trim())
        .with_industry(req.industry)
        .with_experience(req.experience_years)
        .with_goal(req.goal)
        .with_content_style(req.content_style);
    profile.linkedin_profile = req.linkedin_profile.unwrap_or_default();
    profile.use_survey_data = req.use_survey_data;

    let recommendations = recommendations::generate_recommendations(llm, &profile).await;

    tracing::info!(
        role = %profile.role,
        count = recommendations.len(),
        "Recommendations generated"
    );

    Ok(Json(RecommendationResponse { recommendations }))
}

async fn fill_from_survey(state: &AppState, user_id: &str, req: &mut RecommendationRequest) {
    match queries::get_survey(&state.db, user_id).await {
        Ok(Some(survey)) => {
            req.industry.get_or_insert(survey.industry);
            req.experience_years.get_or_insert(survey.experience);
            req.goal.get_or_insert(survey.goals);
            req.content_style.get_or_insert(survey.content_preferences);
        }
        Ok(None) => {}
        Err(e) => tracing::warn!("Survey lookup failed, using request data only: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{lazy_state, test_config};
    use crate::clients::test_support::spawn_stub;
    use crate::config::Config;
    use axum::{Router, body::Body, http::Request, routing::post};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    async fn call(config: Config, body: Value) -> (StatusCode, Value) {
        call_with_token(config, body, None).await
    }

    async fn call_with_token(
        config: Config,
        body: Value,
        bearer: Option<&str>,
    ) -> (StatusCode, Value) {
        let app = Router::new()
            .route("/posts/recommendations", post(get_recommendations))
            .with_state(lazy_state(config));

        let mut request = Request::builder()
            .method("POST")
            .uri("/posts/recommendations")
            .header("content-type", "application/json");
        if let Some(token) = bearer {
            request = request.header("authorization", format!("Bearer {}", token));
        }

        let response = app
            .oneshot(request.body(Body::from(body.to_string())).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn with_llm(base_url: &str) -> Config {
        Config {
            openai_api_key: Some("sk-test".into()),
            openai_base_url: base_url.to_string(),
            llm_timeout_secs: 2,
            ..test_config()
        }
    }

    #[tokio::test]
    async fn missing_role_is_bad_request() {
        let (status, body) = call(with_llm("http://127.0.0.1:9"), json!({ "industry": "Retail" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Role is required");
    }

    #[tokio::test]
    async fn missing_api_key_is_server_error() {
        let (status, body) = call(test_config(), json!({ "role": "Engineer" })).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "OpenAI API key not configured");
    }

    #[tokio::test]
    async fn unreachable_provider_serves_fallback() {
        let (status, body) = call(
            with_llm("http://127.0.0.1:9"),
            json!({ "role": "Software Engineer" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let records = body["recommendations"].as_array().unwrap();
        assert_eq!(records.len(), 10);
        let role_titles = records
            .iter()
            .filter(|r| r["title"].as_str().unwrap().contains("Software Engineer"))
            .count();
        assert_eq!(role_titles, 8);
    }

    #[tokio::test]
    async fn provider_answer_is_returned() {
        let stub = Router::new().route(
            "/chat/completions",
            post(|| async {
                axum::Json(json!({
                    "choices": [{ "message": { "content":
                        "[{\"id\":\"topic-1\",\"title\":\"Scaling a design system\",\"format\":\"Case Study\",\"angle\":\"What broke at 40 teams\",\"hashtags\":[\"#DesignSystems\"]}]"
                    } }]
                }))
            }),
        );
        let base = spawn_stub(stub).await;

        let (status, body) = call(with_llm(&base), json!({ "role": "Designer" })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["recommendations"][0]["title"], "Scaling a design system");
        assert_eq!(body["recommendations"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn invalid_session_with_survey_flag_still_serves_recommendations() {
        let (status, body) = call_with_token(
            with_llm("http://127.0.0.1:9"),
            json!({ "role": "Software Engineer", "useSurveyData": true }),
            Some("expired.or.garbage"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["recommendations"].as_array().unwrap().len(), 10);
    }
}
