use chrono::{DateTime, Utc};

/// A user's linked LinkedIn account. The access token is kept encrypted.
#[derive(Debug, Clone)]
pub struct LinkedInConnection {
    pub user_id: String,
    pub linkedin_id: String,
    pub linkedin_name: Option<String>,
    pub linkedin_picture: Option<String>,
    pub encrypted_access_token: String,
    pub connected_at: DateTime<Utc>,
}
