// Prompt construction for topic recommendations

use super::{MAX_RECOMMENDATIONS, ProfileContext};

const NOT_PROVIDED: &str = "Not provided";

/// Instructions shared by every recommendation request.
pub fn system_prompt() -> String {
    format!(
        r##"You are a LinkedIn content strategist and personal branding coach.

Generate exactly {count} LinkedIn post topic ideas for the user described in the next message.

Weighting:
- {role_focused} ideas must center on the user's specific role: daily responsibilities, challenges, tools, methods, career advice and role-specific trends.
- {general} ideas may cover broader ground such as industry trends, personal branding or professional development.

Match the user's preferred content style (Story, Tips & Insights, Thought Leadership, Case Study, Behind-the-Scenes).
Keep titles short, clear and conversational.

For each idea provide:
- title: an engaging post title
- format: Story / Insight / Tip / Trend / Case Study
- angle: the recommended approach, e.g. "personal lesson from failure"
- hashtags: 3 to 5 relevant hashtags

Respond with ONLY a JSON array, no prose, in this shape:
[
  {{
    "id": "topic-1",
    "title": "How I moved from design into product management",
    "format": "Story",
    "angle": "Personal career journey with lessons learned",
    "hashtags": ["#ProductManagement", "#CareerGrowth", "#SaaS"]
  }}
]"##,
        count = MAX_RECOMMENDATIONS,
        role_focused = MAX_RECOMMENDATIONS * 4 / 5,
        general = MAX_RECOMMENDATIONS - MAX_RECOMMENDATIONS * 4 / 5,
    )
}

/// User context block: profile, LinkedIn summary and survey hint.
pub fn user_prompt(profile: &ProfileContext) -> String {
    let linkedin = &profile.linkedin_profile;

    let headline = linkedin.headline.as_deref().filter(|s| !s.is_empty());
    let about = linkedin.about.as_deref().filter(|s| !s.is_empty());
    let skills = (!linkedin.skills.is_empty()).then(|| linkedin.skills.join(", "));
    let recent_posts = (!linkedin.recent_posts.is_empty()).then(|| linkedin.recent_posts.join(" | "));

    let mut prompt = format!(
        "## User Context\n\
         Role (primary focus): {role}\n\
         Industry: {industry}\n\
         Years of Experience: {experience}\n\
         Main Goal: {goal}\n\
         Preferred Content Style: {style}\n\
         \n\
         ## LinkedIn Profile\n\
         Headline: {headline}\n\
         About: {about}\n\
         Skills: {skills}\n\
         Recent Posts: {recent_posts}\n",
        role = profile.role,
        industry = profile.industry,
        experience = profile.experience_years,
        goal = profile.goal,
        style = profile.content_style,
        headline = headline.unwrap_or(NOT_PROVIDED),
        about = about.unwrap_or(NOT_PROVIDED),
        skills = skills.as_deref().unwrap_or(NOT_PROVIDED),
        recent_posts = recent_posts.as_deref().unwrap_or(NOT_PROVIDED),
    );

    if profile.use_survey_data {
        prompt.push_str(
            "\n## Additional Context\n\
             The user completed a survey about their goals and content preferences. \
             Use it to make the ideas more personal and targeted.\n",
        );
    }

    prompt.push_str(&format!(
        "\nMake {} ideas about the work of a \"{}\" and the rest about broader topics.\n",
        MAX_RECOMMENDATIONS * 4 / 5,
        profile.role
    ));

    prompt
}
