//! LinkedIn topic recommendations.
//!
//! A provider call produces raw text which [`parser`] turns into records; any
//! failure along the way is absorbed into the deterministic [`fallback`]
//! batch so callers always get a full, well-formed list.

pub mod fallback;
pub mod parser;
pub mod prompt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::clients::{ChatCompletion, ChatMessage, LlmError};
pub use parser::ParseError;

/// Upper bound on records returned to a caller
pub const MAX_RECOMMENDATIONS: usize = 10;

pub const COMPLETION_MAX_TOKENS: u32 = 2000;
pub const COMPLETION_TEMPERATURE: f32 = 0.7;

const DEFAULT_INDUSTRY: &str = "Professional Services";
const DEFAULT_EXPERIENCE: &str = "3-5 years";
const DEFAULT_GOAL: &str = "Personal Branding";
const DEFAULT_CONTENT_STYLE: &str = "Tips & Insights";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: String,
    pub title: String,
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angle: Option<String>,
    #[serde(default)]
    pub hashtags: Vec<String>,
}

/// Optional LinkedIn profile excerpt supplied by the caller
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LinkedInSummary {
    #[serde(default)]
    pub headline: Option<String>,
    #[serde(default)]
    pub about: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub recent_posts: Vec<String>,
}

/// Everything the prompt and the fallback need to know about the caller
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileContext {
    pub role: String,
    pub industry: String,
    pub experience_years: String,
    pub goal: String,
    pub content_style: String,
    pub linkedin_profile: LinkedInSummary,
    pub use_survey_data: bool,
}

impl ProfileContext {
    /// A profile for `role` with every other field at its default.
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            industry: DEFAULT_INDUSTRY.to_string(),
            experience_years: DEFAULT_EXPERIENCE.to_string(),
            goal: DEFAULT_GOAL.to_string(),
            content_style: DEFAULT_CONTENT_STYLE.to_string(),
            linkedin_profile: LinkedInSummary::default(),
            use_survey_data: false,
        }
    }

    pub fn with_industry(mut self, industry: Option<String>) -> Self {
        if let Some(value) = non_blank(industry) {
            self.industry = value;
        }
        self
    }

    pub fn with_experience(mut self, experience_years: Option<String>) -> Self {
        if let Some(value) = non_blank(experience_years) {
            self.experience_years = value;
        }
        self
    }

    pub fn with_goal(mut self, goal: Option<String>) -> Self {
        if let Some(value) = non_blank(goal) {
            self.goal = value;
        }
        self
    }

    pub fn with_content_style(mut self, content_style: Option<String>) -> Self {
        if let Some(value) = non_blank(content_style) {
            self.content_style = value;
        }
        self
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

#[derive(Debug, thiserror::Error)]
pub enum RecommendationError {
    #[error(transparent)]
    Provider(#[from] LlmError),
    #[error("malformed recommendations: {0}")]
    Malformed(#[from] ParseError),
}

/// Ask the provider for recommendations and parse its answer.
pub async fn request_recommendations<P: ChatCompletion>(
    provider: &P,
    profile: &ProfileContext,
) -> Result<Vec<Recommendation>, RecommendationError> {
    let messages = vec![
        ChatMessage::system(prompt::system_prompt()),
        ChatMessage::user(prompt::user_prompt(profile)),
    ];

    let raw = provider
        .complete(messages, COMPLETION_MAX_TOKENS, COMPLETION_TEMPERATURE)
        .await?;

    parser::parse_recommendations(&raw, MAX_RECOMMENDATIONS).map_err(|e| {
        warn!(raw_len = raw.len(), "Unparseable recommendation response: {}", e);
        RecommendationError::Malformed(e)
    })
}

/// Replace any failure with the fallback batch for `profile`.
pub fn with_fallback(
    result: Result<Vec<Recommendation>, RecommendationError>,
    profile: &ProfileContext,
    now: DateTime<Utc>,
) -> Vec<Recommendation> {
    match result {
        Ok(records) => records,
        Err(e) => {
            warn!(role = %profile.role, "Serving fallback recommendations: {}", e);
            fallback::fallback_batch(profile, now)
        }
    }
}

/// Full pipeline: prompt, provider call, parse, truncate, fallback.
pub async fn generate_recommendations<P: ChatCompletion>(
    provider: &P,
    profile: &ProfileContext,
) -> Vec<Recommendation> {
    let result = request_recommendations(provider, profile).await;
    with_fallback(result, profile, Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Provider that replays a canned result and records the prompt it saw
    struct ScriptedProvider {
        reply: Mutex<Option<Result<String, LlmError>>>,
        seen: Mutex<Vec<ChatMessage>>,
    }

    impl ScriptedProvider {
        fn replying(reply: Result<String, LlmError>) -> Self {
            Self {
                reply: Mutex::new(Some(reply)),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl ChatCompletion for ScriptedProvider {
        async fn complete(
            &self,
            messages: Vec<ChatMessage>,
            max_tokens: u32,
            temperature: f32,
        ) -> Result<String, LlmError> {
            assert_eq!(max_tokens, COMPLETION_MAX_TOKENS);
            assert!((temperature - COMPLETION_TEMPERATURE).abs() < f32::EPSILON);
            *self.seen.lock().unwrap() = messages;
            self.reply
                .lock()
                .unwrap()
                .take()
                .unwrap_or(Err(LlmError::EmptyCompletion))
        }
    }

    fn is_fallback(records: &[Recommendation]) -> bool {
        records.len() == MAX_RECOMMENDATIONS
            && records[0].id.starts_with("role-specific-")
            && records[9].id.starts_with("general-")
    }

    #[tokio::test]
    async fn valid_completion_is_passed_through() {
        let provider = ScriptedProvider::replying(Ok(r##"```json
[{"id": "topic-1", "title": "Shipping on Fridays", "format": "Story", "angle": "Contrarian take", "hashtags": ["#DevOps"]}]
```"##
            .to_string()));
        let profile = ProfileContext::new("SRE").with_industry(Some("Fintech".into()));

        let records = generate_recommendations(&provider, &profile).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "Shipping on Fridays");

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen[0].role, "system");
        assert!(seen[1].content.contains("Industry: Fintech"));
    }

    #[tokio::test]
    async fn prose_completion_yields_fallback() {
        let provider =
            ScriptedProvider::replying(Ok("Here are some great ideas for you!".to_string()));
        let records = generate_recommendations(&provider, &ProfileContext::new("Chef")).await;

        assert!(is_fallback(&records));
        for record in &records {
            assert!(!record.title.is_empty());
            assert!(!record.format.is_empty());
            assert!(record.hashtags.iter().all(|t| t.starts_with('#')));
        }
    }

    #[tokio::test]
    async fn empty_array_yields_fallback() {
        let provider = ScriptedProvider::replying(Ok("[]".to_string()));
        let records = generate_recommendations(&provider, &ProfileContext::new("Chef")).await;
        assert!(is_fallback(&records));

        let provider = ScriptedProvider::replying(Ok(
            r#"[{"id": "1", "title": "t", "format": "Story", "angle": "a"}]"#.to_string(),
        ));
        let records = generate_recommendations(&provider, &ProfileContext::new("Chef")).await;
        assert!(is_fallback(&records));
    }

    #[tokio::test]
    async fn provider_failure_yields_role_focused_fallback() {
        let provider =
            ScriptedProvider::replying(Err(LlmError::Timeout(Duration::from_secs(30))));
        let records =
            generate_recommendations(&provider, &ProfileContext::new("Software Engineer")).await;

        assert!(is_fallback(&records));
        let role_focused = records
            .iter()
            .filter(|r| r.title.contains("Software Engineer"))
            .count();
        assert_eq!(role_focused, 8);
        assert_eq!(
            records.iter().filter(|r| r.id.starts_with("general-")).count(),
            2
        );
    }

    #[test]
    fn blank_overrides_keep_defaults() {
        let profile = ProfileContext::new("Nurse")
            .with_industry(Some("  ".into()))
            .with_goal(None)
            .with_experience(Some("10+ years".into()))
            .with_content_style(Some(String::new()));

        assert_eq!(profile.industry, DEFAULT_INDUSTRY);
        assert_eq!(profile.goal, DEFAULT_GOAL);
        assert_eq!(profile.experience_years, "10+ years");
        assert_eq!(profile.content_style, DEFAULT_CONTENT_STYLE);
    }
}
