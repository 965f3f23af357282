//! Row-to-wire conversions.

use sociofeed_db::models::{
    CommentRow, MediaRow, MessageRow, PostRow, SaveRow, UserRow, UserSummaryRow,
};
use sociofeed_types::models::{
    Account, ChatMessage, Comment, MediaItem, Post, SavedPost, UserSummary,
};

pub fn summary(row: UserSummaryRow) -> UserSummary {
    UserSummary {
        id: row.id,
        username: row.username,
        avatar_url: row.avatar_url,
    }
}

pub fn summaries(rows: Vec<UserSummaryRow>) -> Vec<UserSummary> {
    rows.into_iter().map(summary).collect()
}

pub fn account(row: UserRow) -> Account {
    Account {
        id: row.id,
        username: row.username,
        email: row.email,
        bio: row.bio,
        avatar_url: row.avatar_url,
    }
}

fn media(row: MediaRow) -> MediaItem {
    MediaItem {
        id: row.id,
        url: row.url,
        media_type: row.media_type,
    }
}

pub fn post(row: PostRow) -> Post {
    Post {
        id: row.id,
        content: row.content,
        user: summary(row.author),
        media: row.media.into_iter().map(media).collect(),
        likes_count: row.likes_count,
        comments_count: row.comments_count,
        liked_by_current_user: row.liked_by_viewer,
        is_saved: row.saved_by_viewer,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

pub fn posts(rows: Vec<PostRow>) -> Vec<Post> {
    rows.into_iter().map(post).collect()
}

pub fn comment(row: CommentRow) -> Comment {
    Comment {
        id: row.id,
        post_id: row.post_id,
        content: row.content,
        user: summary(row.author),
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

pub fn saved(row: SaveRow) -> SavedPost {
    SavedPost {
        id: row.id,
        user_id: row.user_id,
        post_id: row.post_id,
        created_at: row.created_at,
    }
}

pub fn message(row: MessageRow) -> ChatMessage {
    ChatMessage {
        id: row.id,
        chat_id: row.chat_id,
        content: row.content,
        sender: summary(row.sender),
        receiver: summary(row.receiver),
        created_at: row.created_at,
    }
}
