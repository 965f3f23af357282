//! Database row types. Distinct from the sociofeed-types wire models so the
//! storage layer stays independent of the JSON contract.

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub struct NewUser<'a> {
    pub id: Uuid,
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
}

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_active: bool,
    pub reset_token: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSummaryRow {
    pub id: Uuid,
    pub username: String,
    pub avatar_url: Option<String>,
}

/// Only the columns that are actually changing; `None` keeps the stored value.
#[derive(Debug, Default)]
pub struct ProfileUpdate<'a> {
    pub username: Option<&'a str>,
    pub bio: Option<&'a str>,
    pub avatar_url: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProfileCounts {
    pub followers: i64,
    pub following: i64,
    pub posts: i64,
}

#[derive(Debug, Clone)]
pub struct RefreshTokenRow {
    pub token: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

pub struct NewMedia {
    pub url: String,
    pub media_type: String,
}

#[derive(Debug, Clone)]
pub struct MediaRow {
    pub id: Uuid,
    pub post_id: Uuid,
    pub url: String,
    pub media_type: String,
}

/// A post with its author, media and counters, as seen by one viewer.
#[derive(Debug, Clone)]
pub struct PostRow {
    pub id: Uuid,
    pub content: Option<String>,
    pub author: UserSummaryRow,
    pub media: Vec<MediaRow>,
    pub likes_count: i64,
    pub comments_count: i64,
    pub liked_by_viewer: bool,
    pub saved_by_viewer: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CommentRow {
    pub id: Uuid,
    pub post_id: Uuid,
    pub content: String,
    pub author: UserSummaryRow,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Who may moderate a comment: its author and the author of the post.
#[derive(Debug, Clone, Copy)]
pub struct CommentOwnership {
    pub comment_author: Uuid,
    pub post_author: Uuid,
}

#[derive(Debug, Clone)]
pub struct SaveRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub post_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ChatRow {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub content: String,
    pub sender: UserSummaryRow,
    pub receiver: UserSummaryRow,
    pub created_at: DateTime<Utc>,
}

/// One entry of a user's inbox.
#[derive(Debug, Clone)]
pub struct ChatOverviewRow {
    pub chat: ChatRow,
    pub other: Option<UserSummaryRow>,
    pub latest_message: Option<MessageRow>,
}
