use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            username    TEXT NOT NULL UNIQUE COLLATE NOCASE,
            email       TEXT NOT NULL UNIQUE COLLATE NOCASE,
            password    TEXT NOT NULL,
            is_active   INTEGER NOT NULL DEFAULT 0,
            reset_token TEXT,
            bio         TEXT,
            avatar_url  TEXT,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS refresh_tokens (
            id          TEXT PRIMARY KEY,
            token       TEXT NOT NULL UNIQUE,
            user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            expires_at  TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_refresh_tokens_expiry
            ON refresh_tokens(expires_at);

        CREATE TABLE IF NOT EXISTS follows (
            follower_id  TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            following_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at   TEXT NOT NULL,
            PRIMARY KEY (follower_id, following_id)
        );

        CREATE INDEX IF NOT EXISTS idx_follows_following
            ON follows(following_id);

        CREATE TABLE IF NOT EXISTS posts (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            content     TEXT,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_posts_author
            ON posts(user_id, created_at);

        CREATE TABLE IF NOT EXISTS media (
            id          TEXT PRIMARY KEY,
            post_id     TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
            url         TEXT NOT NULL,
            media_type  TEXT NOT NULL,
            position    INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_media_post
            ON media(post_id);

        CREATE TABLE IF NOT EXISTS comments (
            id          TEXT PRIMARY KEY,
            post_id     TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
            user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            content     TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_comments_post
            ON comments(post_id, created_at);

        CREATE TABLE IF NOT EXISTS likes (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            post_id     TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
            created_at  TEXT NOT NULL,
            UNIQUE(user_id, post_id)
        );

        CREATE INDEX IF NOT EXISTS idx_likes_post
            ON likes(post_id);

        CREATE TABLE IF NOT EXISTS saved_posts (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            post_id     TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
            created_at  TEXT NOT NULL,
            UNIQUE(user_id, post_id)
        );

        CREATE TABLE IF NOT EXISTS chats (
            id          TEXT PRIMARY KEY,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS chat_participants (
            chat_id     TEXT NOT NULL REFERENCES chats(id) ON DELETE CASCADE,
            user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            PRIMARY KEY (chat_id, user_id)
        );

        CREATE INDEX IF NOT EXISTS idx_chat_participants_user
            ON chat_participants(user_id);

        CREATE TABLE IF NOT EXISTS messages (
            id          TEXT PRIMARY KEY,
            chat_id     TEXT NOT NULL REFERENCES chats(id) ON DELETE CASCADE,
            sender_id   TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            receiver_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            content     TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_chat
            ON messages(chat_id, created_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
