use chrono::{NaiveDate, Utc};
use serde::Serialize;

/// Posting streak; advanced once per published post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStreak {
    pub user_id: String,
    pub current_streak: i32,
    pub longest_streak: i32,
    pub total_posts: i32,
    pub last_activity_date: Option<NaiveDate>,
}

impl UserStreak {
    pub fn empty(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            current_streak: 0,
            longest_streak: 0,
            total_posts: 0,
            last_activity_date: None,
        }
    }

    /// Record a post published on `today`.
    pub fn advance(&mut self, today: NaiveDate) {
        self.total_posts += 1;

        self.current_streak = match self.last_activity_date {
            Some(last) if last == today => self.current_streak.max(1),
            Some(last) if last.succ_opt() == Some(today) => self.current_streak + 1,
            _ => 1,
        };
        self.longest_streak = self.longest_streak.max(self.current_streak);
        self.last_activity_date = Some(today);
    }

    /// Streak as seen on `today`: a run whose last post is older than
    /// yesterday no longer counts.
    pub fn current_as_of(&self, today: NaiveDate) -> i32 {
        match self.last_activity_date {
            Some(last) if last == today || last.succ_opt() == Some(today) => self.current_streak,
            _ => 0,
        }
    }

    pub fn today() -> NaiveDate {
        Utc::now().date_naive()
    }
}
