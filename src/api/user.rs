use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use serde::Serialize;
use validator::Validate;

use super::AppState;
use crate::db::queries;
use crate::middleware::{ApiError, api_error, require_user_from_headers};
use crate::models::{SurveyData, UserStreak};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyResponse {
    pub survey_data: Option<SurveyData>,
    pub has_completed_survey: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveSurveyResponse {
    pub success: bool,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakResponse {
    pub current_streak: i32,
    pub longest_streak: i32,
    pub total_posts: i32,
    pub last_activity_date: Option<chrono::NaiveDate>,
}

impl From<UserStreak> for StreakResponse {
    fn from(streak: UserStreak) -> Self {
        Self {
            current_streak: streak.current_as_of(UserStreak::today()),
            longest_streak: streak.longest_streak,
            total_posts: streak.total_posts,
            last_activity_date: streak.last_activity_date,
        }
    }
}

fn missing_survey_fields() -> ApiError {
    api_error(
        StatusCode::BAD_REQUEST,
        "All survey fields are required",
        "VALIDATION_ERROR",
    )
}

/// Accepts `{surveyData: {...}}` or the survey fields at the top level.
fn parse_survey(body: serde_json::Value) -> Result<SurveyData, ApiError> {
    let payload = match body {
        serde_json::Value::Object(mut map) if map.contains_key("surveyData") => {
            map.remove("surveyData").unwrap_or_default()
        }
        other => other,
    };

    let survey: SurveyData = serde_json::from_value(payload).map_err(|_| missing_survey_fields())?;
    survey.validate().map_err(|_| missing_survey_fields())?;
    Ok(survey)
}

/// Store the onboarding survey
///
/// **Auth: Session Required**
pub async fn save_survey(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<SaveSurveyResponse>, ApiError> {
    let user = require_user_from_headers(&state.auth, &headers).await?;
    let survey = parse_survey(body)?;

    queries::upsert_survey(&state.db, &user.user_id, &survey)
        .await
        .map_err(|e| {
            tracing::error!("Failed to save survey: {}", e);
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to save survey data",
                "DB_ERROR",
            )
        })?;

    Ok(Json(SaveSurveyResponse {
        success: true,
        message: "Survey data saved successfully",
    }))
}

/// **Auth: Session Required**
pub async fn get_survey(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SurveyResponse>, ApiError> {
    let user = require_user_from_headers(&state.auth, &headers).await?;

    let survey = queries::get_survey(&state.db, &user.user_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load survey: {}", e);
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch survey data",
                "DB_ERROR",
            )
        })?;

    Ok(Json(SurveyResponse {
        has_completed_survey: survey.is_some(),
        survey_data: survey,
    }))
}

/// **Auth: Session Required**
pub async fn get_streak(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<StreakResponse>, ApiError> {
    let user = require_user_from_headers(&state.auth, &headers).await?;

    let streak = queries::get_streak(&state.db, &user.user_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load streak: {}", e);
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch streak",
                "DB_ERROR",
            )
        })?;

    Ok(Json(streak.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn complete() -> serde_json::Value {
        json!({
            "currentRole": "Engineer",
            "industry": "Software",
            "experience": "3-5 years",
            "goals": "Grow audience",
            "contentPreferences": "Stories"
        })
    }

    #[test]
    fn survey_accepts_wrapped_or_flat_payload() {
        assert_eq!(parse_survey(complete()).unwrap().current_role, "Engineer");
        let wrapped = json!({ "surveyData": complete() });
        assert_eq!(parse_survey(wrapped).unwrap().goals, "Grow audience");
    }

    #[test]
    fn survey_rejects_missing_or_blank_fields() {
        let mut missing = complete();
        missing.as_object_mut().unwrap().remove("industry");
        let (status, Json(body)) = parse_survey(missing).unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "All survey fields are required");

        let mut blank = complete();
        blank["goals"] = json!("");
        assert!(parse_survey(blank).is_err());
    }

    #[test]
    fn streak_response_hides_stale_runs() {
        let mut streak = UserStreak::empty("u");
        streak.current_streak = 4;
        streak.longest_streak = 6;
        streak.total_posts = 10;
        streak.last_activity_date = Some(UserStreak::today() - chrono::Duration::days(3));

        let response = StreakResponse::from(streak);
        assert_eq!(response.current_streak, 0);
        assert_eq!(response.longest_streak, 6);
    }
}
