use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::models::{LinkedInConnection, Post, PostStatus, SurveyData, UserStreak};

const POST_COLUMNS: &str = "id, user_id, content, status, schedule_time, linkedin_post_id, \
                            media_url, error_message, published_at, created_at, updated_at";

fn post_from_row(row: &PgRow) -> Result<Post, sqlx::Error> {
    let status: String = row.try_get("status")?;
    let status = status.parse::<PostStatus>().map_err(|e| sqlx::Error::ColumnDecode {
        index: "status".to_string(),
        source: e.into(),
    })?;

    Ok(Post {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        content: row.try_get("content")?,
        status,
        schedule_time: row.try_get("schedule_time")?,
        linkedin_post_id: row.try_get("linkedin_post_id")?,
        media_url: row.try_get("media_url")?,
        error_message: row.try_get("error_message")?,
        published_at: row.try_get("published_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

// ============================================
// Posts
// ============================================

pub async fn insert_post(
    pool: &PgPool,
    user_id: &str,
    content: &str,
    status: PostStatus,
    media_url: Option<&str>,
) -> Result<Post, sqlx::Error> {
    let row = sqlx::query(&format!(
        r#"
        INSERT INTO posts (user_id, content, status, media_url)
        VALUES ($1, $2, $3, $4)
        RETURNING {POST_COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(content)
    .bind(status.as_str())
    .bind(media_url)
    .fetch_one(pool)
    .await?;

    post_from_row(&row)
}

/// Caller's posts, newest first
pub async fn list_posts(pool: &PgPool, user_id: &str) -> Result<Vec<Post>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        "SELECT {POST_COLUMNS} FROM posts WHERE user_id = $1 ORDER BY created_at DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(post_from_row).collect()
}

pub async fn get_post(
    pool: &PgPool,
    user_id: &str,
    post_id: Uuid,
) -> Result<Option<Post>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {POST_COLUMNS} FROM posts WHERE id = $1 AND user_id = $2"
    ))
    .bind(post_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(post_from_row).transpose()
}

pub async fn schedule_post(
    pool: &PgPool,
    user_id: &str,
    post_id: Uuid,
    schedule_time: DateTime<Utc>,
) -> Result<Option<Post>, sqlx::Error> {
    let row = sqlx::query(&format!(
        r#"
        UPDATE posts
        SET status = 'scheduled', schedule_time = $3, error_message = NULL, updated_at = NOW()
        WHERE id = $1 AND user_id = $2
        RETURNING {POST_COLUMNS}
        "#
    ))
    .bind(post_id)
    .bind(user_id)
    .bind(schedule_time)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(post_from_row).transpose()
}

/// Mark published; `linkedin_post_id` is absent for local-only publishes.
pub async fn mark_post_published(
    pool: &PgPool,
    user_id: &str,
    post_id: Uuid,
    linkedin_post_id: Option<&str>,
) -> Result<Option<Post>, sqlx::Error> {
    let row = sqlx::query(&format!(
        r#"
        UPDATE posts
        SET status = 'published',
            linkedin_post_id = COALESCE($3, linkedin_post_id),
            error_message = NULL,
            published_at = NOW(),
            updated_at = NOW()
        WHERE id = $1 AND user_id = $2
        RETURNING {POST_COLUMNS}
        "#
    ))
    .bind(post_id)
    .bind(user_id)
    .bind(linkedin_post_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(post_from_row).transpose()
}

pub async fn mark_post_failed(
    pool: &PgPool,
    user_id: &str,
    post_id: Uuid,
    error_message: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE posts
        SET status = 'failed', error_message = $3, updated_at = NOW()
        WHERE id = $1 AND user_id = $2
        "#,
    )
    .bind(post_id)
    .bind(user_id)
    .bind(error_message)
    .execute(pool)
    .await?;

    Ok(())
}

/// Caller's scheduled posts whose time has come, oldest first
pub async fn list_due_posts(
    pool: &PgPool,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<Vec<Post>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {POST_COLUMNS} FROM posts
        WHERE user_id = $1 AND status = 'scheduled' AND schedule_time <= $2
        ORDER BY schedule_time ASC
        "#
    ))
    .bind(user_id)
    .bind(now)
    .fetch_all(pool)
    .await?;

    rows.iter().map(post_from_row).collect()
}

// ============================================
// Streaks
// ============================================

fn streak_from_row(row: &PgRow) -> UserStreak {
    UserStreak {
        user_id: row.get("user_id"),
        current_streak: row.get("current_streak"),
        longest_streak: row.get("longest_streak"),
        total_posts: row.get("total_posts"),
        last_activity_date: row.get::<Option<NaiveDate>, _>("last_activity_date"),
    }
}

pub async fn get_streak(pool: &PgPool, user_id: &str) -> Result<UserStreak, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT user_id, current_streak, longest_streak, total_posts, last_activity_date
        FROM user_streaks
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(match row {
        Some(row) => streak_from_row(&row),
        None => UserStreak::empty(user_id),
    })
}

/// Advance the caller's streak for a post published on `today`.
///
/// The row is locked for the read-modify-write so concurrent publishes for
/// one user are applied one after another.
pub async fn record_publish_activity(
    pool: &PgPool,
    user_id: &str,
    today: NaiveDate,
) -> Result<UserStreak, sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("INSERT INTO user_streaks (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    let row = sqlx::query(
        r#"
        SELECT user_id, current_streak, longest_streak, total_posts, last_activity_date
        FROM user_streaks
        WHERE user_id = $1
        FOR UPDATE
        "#,
    )
    .bind(user_id)
    .fetch_one(&mut *tx)
    .await?;

    let mut streak = streak_from_row(&row);
    streak.advance(today);

    sqlx::query(
        r#"
        UPDATE user_streaks SET
            current_streak = $2,
            longest_streak = $3,
            total_posts = $4,
            last_activity_date = $5,
            updated_at = NOW()
        WHERE user_id = $1
        "#,
    )
    .bind(&streak.user_id)
    .bind(streak.current_streak)
    .bind(streak.longest_streak)
    .bind(streak.total_posts)
    .bind(streak.last_activity_date)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(streak)
}

// ============================================
// Surveys
// ============================================

pub async fn upsert_survey(
    pool: &PgPool,
    user_id: &str,
    survey: &SurveyData,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO user_surveys
            (user_id, job_role, industry, experience, goals, content_preferences, completed_at)
        VALUES ($1, $2, $3, $4, $5, $6, NOW())
        ON CONFLICT (user_id) DO UPDATE SET
            job_role = EXCLUDED.job_role,
            industry = EXCLUDED.industry,
            experience = EXCLUDED.experience,
            goals = EXCLUDED.goals,
            content_preferences = EXCLUDED.content_preferences,
            completed_at = NOW()
        "#,
    )
    .bind(user_id)
    .bind(&survey.current_role)
    .bind(&survey.industry)
    .bind(&survey.experience)
    .bind(&survey.goals)
    .bind(&survey.content_preferences)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_survey(pool: &PgPool, user_id: &str) -> Result<Option<SurveyData>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT job_role, industry, experience, goals, content_preferences
        FROM user_surveys
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| SurveyData {
        current_role: row.get("job_role"),
        industry: row.get("industry"),
        experience: row.get("experience"),
        goals: row.get("goals"),
        content_preferences: row.get("content_preferences"),
    }))
}

// ============================================
// LinkedIn connections
// ============================================

pub async fn upsert_linkedin_connection(
    pool: &PgPool,
    connection: &LinkedInConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO linkedin_connections
            (user_id, linkedin_id, linkedin_name, linkedin_picture, access_token_encrypted, connected_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (user_id) DO UPDATE SET
            linkedin_id = EXCLUDED.linkedin_id,
            linkedin_name = EXCLUDED.linkedin_name,
            linkedin_picture = EXCLUDED.linkedin_picture,
            access_token_encrypted = EXCLUDED.access_token_encrypted,
            connected_at = EXCLUDED.connected_at
        "#,
    )
    .bind(&connection.user_id)
    .bind(&connection.linkedin_id)
    .bind(&connection.linkedin_name)
    .bind(&connection.linkedin_picture)
    .bind(&connection.encrypted_access_token)
    .bind(connection.connected_at)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_linkedin_connection(
    pool: &PgPool,
    user_id: &str,
) -> Result<Option<LinkedInConnection>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT user_id, linkedin_id, linkedin_name, linkedin_picture,
               access_token_encrypted, connected_at
        FROM linkedin_connections
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| LinkedInConnection {
        user_id: row.get("user_id"),
        linkedin_id: row.get("linkedin_id"),
        linkedin_name: row.get("linkedin_name"),
        linkedin_picture: row.get("linkedin_picture"),
        encrypted_access_token: row.get("access_token_encrypted"),
        connected_at: row.get("connected_at"),
    }))
}
