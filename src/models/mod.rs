pub mod linkedin;
pub mod post;
pub mod streak;
pub mod survey;

pub use linkedin::LinkedInConnection;
pub use post::{Post, PostStatus};
pub use streak::UserStreak;
pub use survey::SurveyData;
