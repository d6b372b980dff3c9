use serde::{Deserialize, Serialize};
use validator::Validate;

/// Onboarding survey answers, keyed by user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SurveyData {
    #[validate(length(min = 1, message = "currentRole is required"))]
    pub current_role: String,
    #[validate(length(min = 1, message = "industry is required"))]
    pub industry: String,
    #[validate(length(min = 1, message = "experience is required"))]
    pub experience: String,
    #[validate(length(min = 1, message = "goals is required"))]
    pub goals: String,
    #[validate(length(min = 1, message = "contentPreferences is required"))]
    pub content_preferences: String,
}
