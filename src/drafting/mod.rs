// Post draft generation: LLM when available, tone templates otherwise

use std::fmt;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::Serialize;
use tracing::warn;

use crate::clients::{ChatCompletion, ChatMessage};

const DRAFT_MAX_TOKENS: u32 = 700;
const DRAFT_TEMPERATURE: f32 = 0.8;

pub const NOTE_LLM: &str = "Generated by language model";
pub const NOTE_TEMPLATE: &str = "Generated using template system";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Professional,
    Casual,
    Enthusiastic,
    Thoughtful,
    Humorous,
}

impl Tone {
    /// Case-insensitive; anything unrecognised is treated as professional.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "casual" => Tone::Casual,
            "enthusiastic" => Tone::Enthusiastic,
            "thoughtful" => Tone::Thoughtful,
            "humorous" => Tone::Humorous,
            _ => Tone::Professional,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Professional => "professional",
            Tone::Casual => "casual",
            Tone::Enthusiastic => "enthusiastic",
            Tone::Thoughtful => "thoughtful",
            Tone::Humorous => "humorous",
        }
    }

    fn templates(&self) -> &'static [PostTemplate] {
        match self {
            Tone::Professional => &PROFESSIONAL,
            Tone::Casual => &CASUAL,
            Tone::Enthusiastic => &ENTHUSIASTIC,
            Tone::Thoughtful => &THOUGHTFUL,
            Tone::Humorous => &HUMOROUS,
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================
// Templates
// ============================================

struct PostTemplate {
    intro: &'static str,
    body: &'static str,
    hashtags: &'static str,
}

static PROFESSIONAL: [PostTemplate; 2] = [
    PostTemplate {
        intro: "🚀 Where {topic} is heading next",
        body: "Working with {topic} has changed how I think about priorities and planning.\n\n\
               What stands out to me:\n\
               • Why {topic} matters strategically\n\
               • The trends worth watching\n\
               • Practical ways to get started\n\n\
               How are you approaching {topic}? I'd like to hear your view in the comments.",
        hashtags: "#ProfessionalDevelopment #Innovation #Growth",
    },
    PostTemplate {
        intro: "💡 A closer look at {topic}",
        body: "{topic} keeps coming up in conversations with peers, so here is a short summary.\n\n\
               🔍 Where things stand:\n\
               • How the market is moving\n\
               • Who is doing it well\n\n\
               🎯 What to do about it:\n\
               • Start with a small pilot\n\
               • Measure results early\n\n\
               How is {topic} affecting your industry?",
        hashtags: "#BusinessStrategy #Leadership #IndustryInsights",
    },
];

static CASUAL: [PostTemplate; 2] = [
    PostTemplate {
        intro: "Hey everyone 👋 some thoughts on {topic}",
        body: "I've been reading a lot about {topic} lately and it's more interesting than I expected.\n\n\
               A few things I picked up:\n\
               • What makes {topic} fun to explore\n\
               • Why it affects more of us than we think\n\
               • Small ways to try it out\n\n\
               Anyone else digging into {topic}? Tell me below 👇",
        hashtags: "#Networking #Community #Learning",
    },
    PostTemplate {
        intro: "Quick thought on {topic} 💭",
        body: "The best part of {topic} isn't the technical side. It's the people it brings together.\n\n\
               My take:\n\
               • The human side of {topic}\n\
               • Where I've seen it work in real life\n\n\
               What's your experience with {topic}?",
        hashtags: "#PersonalGrowth #Connections #Innovation",
    },
];

static ENTHUSIASTIC: [PostTemplate; 2] = [
    PostTemplate {
        intro: "🔥 I can't stop thinking about {topic}!",
        body: "The progress in {topic} over the last year has been incredible.\n\n\
               🚀 What has me excited:\n\
               • New breakthroughs in {topic}\n\
               • Ideas that were impossible a year ago\n\n\
               💪 Why it matters:\n\
               • A real edge for early adopters\n\
               • Plenty of room to experiment\n\n\
               What excites you most about {topic}? 🎉",
        hashtags: "#Innovation #Excitement #FutureOfWork",
    },
    PostTemplate {
        intro: "🎯 {topic} is changing everything in our field!",
        body: "Every week I see another team doing something new with {topic}.\n\n\
               🌟 The shift:\n\
               • Fresh tools and approaches\n\
               • Old assumptions being challenged\n\n\
               Are you as excited about {topic} as I am? 🚀",
        hashtags: "#Transformation #Leadership #Innovation",
    },
];

static THOUGHTFUL: [PostTemplate; 2] = [
    PostTemplate {
        intro: "🤔 Some reflections on {topic}",
        body: "The longer I spend with {topic}, the more I think about its long-term effects.\n\n\
               💭 Questions I keep returning to:\n\
               • Who benefits, and who is left out?\n\
               • What responsibilities come with it?\n\n\
               I'd value your perspective on {topic}.",
        hashtags: "#DeepThinking #Reflection #Future",
    },
    PostTemplate {
        intro: "📚 Exploring the nuances of {topic}",
        body: "{topic} is rarely as simple as the headlines suggest.\n\n\
               🔍 Dimensions worth considering:\n\
               • How we got here\n\
               • Today's trade-offs\n\
               • Where it could lead\n\n\
               Which part of {topic} do you find most thought-provoking?",
        hashtags: "#CriticalThinking #Collaboration #Insights",
    },
];

static HUMOROUS: [PostTemplate; 2] = [
    PostTemplate {
        intro: "😂 The honest truth about {topic}",
        body: "{topic} is a bit like that colleague who's always late but still delivers. 😅\n\n\
               🎭 The funny side:\n\
               • Plans meeting reality\n\
               • Fixes nobody saw coming\n\n\
               Got a {topic} story that made you laugh? Share it! 😆",
        hashtags: "#Humor #WorkLife #Positivity",
    },
    PostTemplate {
        intro: "🤪 My adventures with {topic}",
        body: "I set out to master {topic} and ended up starring in my own sitcom. 😂\n\n\
               🎬 Episode guide:\n\
               • Unexpected plot twists\n\
               • Character growth (that's me)\n\
               • A happy ending, eventually\n\n\
               What's your {topic} comedy moment? 👂",
        hashtags: "#Adventures #Learning #Fun",
    },
];

/// Topic keyword → words that may be appended to sharpen the topic
const TOPIC_ENRICHMENT: [(&str, &[&str]); 5] = [
    ("ai", &["artificial intelligence", "machine learning", "automation", "digital transformation"]),
    ("business", &["strategy", "growth", "innovation", "leadership"]),
    ("technology", &["innovation", "digital", "automation", "future"]),
    ("marketing", &["brand", "engagement", "conversion", "growth"]),
    ("leadership", &["management", "team building", "vision", "strategy"]),
];

/// `"AI in healthcare"` → `"AI in healthcare (machine learning)"` for the first
/// matching keyword; other topics are returned as-is.
pub fn enrich_topic<R: Rng + ?Sized>(topic: &str, rng: &mut R) -> String {
    let lower = topic.to_lowercase();
    TOPIC_ENRICHMENT
        .iter()
        .find(|(key, _)| lower.contains(key))
        .and_then(|(_, keywords)| keywords.choose(rng))
        .map(|keyword| format!("{} ({})", topic, keyword))
        .unwrap_or_else(|| topic.to_string())
}

/// Render a canned post for `tone`.
pub fn render_template<R: Rng + ?Sized>(topic: &str, tone: Tone, rng: &mut R) -> String {
    let templates = tone.templates();
    let template = &templates[rng.gen_range(0..templates.len())];
    let subject = enrich_topic(topic, rng);

    format!(
        "{}\n\n{}\n\n{}",
        template.intro.replace("{topic}", &subject),
        template.body.replace("{topic}", &subject),
        template.hashtags
    )
}

// ============================================
// LLM drafting
// ============================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub content: String,
    pub note: &'static str,
}

fn draft_messages(topic: &str, tone: Tone) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(
            "You write LinkedIn posts. Keep them under 1300 characters, use short \
             paragraphs and a few bullet points, end with a question for readers and \
             3 to 5 hashtags. Return only the post text.",
        ),
        ChatMessage::user(format!(
            "Write a {} LinkedIn post about: {}",
            tone.as_str(),
            topic
        )),
    ]
}

/// Draft a post with `provider` if one is configured, otherwise (or on any
/// provider failure) from the tone templates.
pub async fn draft_post<P: ChatCompletion>(provider: Option<&P>, topic: &str, tone: Tone) -> Draft {
    if let Some(provider) = provider {
        match provider
            .complete(draft_messages(topic, tone), DRAFT_MAX_TOKENS, DRAFT_TEMPERATURE)
            .await
        {
            Ok(content) => {
                return Draft {
                    content: content.trim().to_string(),
                    note: NOTE_LLM,
                };
            }
            Err(e) => warn!(%tone, "Post drafting fell back to templates: {}", e),
        }
    }

    Draft {
        content: render_template(topic, tone, &mut rand::thread_rng()),
        note: NOTE_TEMPLATE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::LlmError;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    struct FixedProvider(Result<&'static str, ()>);

    impl ChatCompletion for FixedProvider {
        async fn complete(
            &self,
            messages: Vec<ChatMessage>,
            _max_tokens: u32,
            _temperature: f32,
        ) -> Result<String, LlmError> {
            assert!(messages[1].content.contains("casual"));
            self.0
                .map(str::to_string)
                .map_err(|_| LlmError::EmptyCompletion)
        }
    }

    #[test]
    fn unknown_tone_is_professional() {
        assert_eq!(Tone::parse("Casual"), Tone::Casual);
        assert_eq!(Tone::parse(" HUMOROUS "), Tone::Humorous);
        assert_eq!(Tone::parse("sarcastic"), Tone::Professional);
        assert_eq!(Tone::parse(""), Tone::Professional);
    }

    #[test]
    fn template_mentions_topic_and_hashtags() {
        let mut rng = StdRng::seed_from_u64(7);
        for tone in [
            Tone::Professional,
            Tone::Casual,
            Tone::Enthusiastic,
            Tone::Thoughtful,
            Tone::Humorous,
        ] {
            let post = render_template("remote work", tone, &mut rng);
            assert!(post.contains("remote work"), "{tone}: {post}");
            assert!(!post.contains("{topic}"));
            assert!(post.lines().last().unwrap().starts_with('#'));
        }
    }

    #[test]
    fn known_topics_are_enriched() {
        let mut rng = StdRng::seed_from_u64(1);
        let enriched = enrich_topic("Marketing on a budget", &mut rng);
        assert!(enriched.starts_with("Marketing on a budget ("));
        assert!(enriched.ends_with(')'));

        assert_eq!(enrich_topic("gardening", &mut rng), "gardening");
    }

    #[tokio::test]
    async fn llm_draft_is_preferred() {
        let provider = FixedProvider(Ok("  Hello LinkedIn!  "));
        let draft = draft_post(Some(&provider), "coffee", Tone::Casual).await;
        assert_eq!(draft.content, "Hello LinkedIn!");
        assert_eq!(draft.note, NOTE_LLM);
    }

    #[tokio::test]
    async fn provider_failure_uses_template() {
        let provider = FixedProvider(Err(()));
        let draft = draft_post(Some(&provider), "coffee", Tone::Casual).await;
        assert_eq!(draft.note, NOTE_TEMPLATE);
        assert!(draft.content.contains("coffee"));

        let draft = draft_post::<FixedProvider>(None, "coffee", Tone::Casual).await;
        assert_eq!(draft.note, NOTE_TEMPLATE);
    }
}
