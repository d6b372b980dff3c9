// Deterministic topic batch used whenever the LLM path fails

use chrono::{DateTime, Datelike, Utc};

use super::{ProfileContext, Recommendation};
use crate::utils::hashtag_from;

struct Template {
    title: &'static str,
    format: &'static str,
    angle: &'static str,
    hashtags: &'static [&'static str],
}

/// Topics addressed at the caller's specific role. `{role}` and `{industry}`
/// are substituted; the role hashtag is prepended to `hashtags`.
const ROLE_TEMPLATES: [Template; 8] = [
    Template {
        title: "Daily Challenges I Face as a {role}",
        format: "Story",
        angle: "Real challenges and how I overcome them",
        hashtags: &["#ProfessionalChallenges", "#ProblemSolving"],
    },
    Template {
        title: "Essential Tools Every {role} Should Know",
        format: "Tips & Insights",
        angle: "Role-specific tools and their benefits",
        hashtags: &["#Tools", "#Productivity"],
    },
    Template {
        title: "How I Improved My {role} Skills This Year",
        format: "Story",
        angle: "Personal skill development journey",
        hashtags: &["#SkillDevelopment", "#Growth"],
    },
    Template {
        title: "Common Mistakes New {role}s Make",
        format: "Tips & Insights",
        angle: "Lessons learned from experience",
        hashtags: &["#CareerAdvice", "#LessonsLearned"],
    },
    Template {
        title: "The Future of {role} in {industry}",
        format: "Thought Leadership",
        angle: "Role-specific industry predictions",
        hashtags: &["#FutureOfWork", "#IndustryTrends"],
    },
    Template {
        title: "Behind the Scenes: A Typical Day as a {role}",
        format: "Behind-the-Scenes",
        angle: "Authentic daily routine and responsibilities",
        hashtags: &["#DayInTheLife", "#WorkLife"],
    },
    Template {
        title: "Key Metrics I Track as a {role}",
        format: "Case Study",
        angle: "Role-specific performance indicators",
        hashtags: &["#Metrics", "#Performance"],
    },
    Template {
        title: "Networking Tips for {role}s",
        format: "Tips & Insights",
        angle: "Role-specific networking strategies",
        hashtags: &["#Networking", "#ProfessionalGrowth"],
    },
];

/// Build the fixed 8 + 2 fallback batch for `profile`.
///
/// Output depends only on the profile and `now`; ids carry `now` in millis.
pub fn fallback_batch(profile: &ProfileContext, now: DateTime<Utc>) -> Vec<Recommendation> {
    let stamp = now.timestamp_millis();
    let role = profile.role.trim();
    let industry = profile.industry.trim();
    let role_tag = hashtag_from(role);
    let industry_tag = hashtag_from(industry);

    let fill = |text: &str| text.replace("{role}", role).replace("{industry}", industry);

    let mut batch: Vec<Recommendation> = ROLE_TEMPLATES
        .iter()
        .enumerate()
        .map(|(i, template)| Recommendation {
            id: format!("role-specific-{}-{}", stamp, i + 1),
            title: fill(template.title),
            format: template.format.to_string(),
            angle: Some(template.angle.to_string()),
            hashtags: std::iter::once(role_tag.clone())
                .chain(template.hashtags.iter().map(|tag| tag.to_string()))
                .collect(),
        })
        .collect();

    batch.push(Recommendation {
        id: format!("general-{}-1", stamp),
        title: format!("Industry Trends That Will Impact {} in {}", industry, now.year()),
        format: "Thought Leadership".to_string(),
        angle: Some("Broader industry analysis and predictions".to_string()),
        hashtags: vec![
            industry_tag,
            "#IndustryTrends".to_string(),
            "#Innovation".to_string(),
        ],
    });

    batch.push(Recommendation {
        id: format!("general-{}-2", stamp),
        title: "Building Your Personal Brand in the Digital Age".to_string(),
        format: "Tips & Insights".to_string(),
        angle: Some(format!("Personal branding strategies that support {}", profile.goal.trim())),
        hashtags: vec![
            "#PersonalBrand".to_string(),
            "#DigitalMarketing".to_string(),
            "#ProfessionalGrowth".to_string(),
        ],
    });

    batch
}
