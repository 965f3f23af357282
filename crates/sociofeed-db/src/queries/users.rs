use rusqlite::{Connection, OptionalExtension, Row, params};
use uuid::Uuid;

use crate::convert::{now, time_at, uuid_at};
use crate::models::{NewUser, ProfileCounts, ProfileUpdate, UserRow, UserSummaryRow};
use crate::queries::summary_at;
use crate::{Database, Result};

const USER_COLUMNS: &str = "id, username, email, password, is_active, reset_token, bio, avatar_url, created_at, updated_at";

impl Database {
    /// Inserts an inactive account.
    pub fn create_user(&self, user: &NewUser<'_>) -> Result<()> {
        self.with_conn(|conn| {
            let ts = now();
            conn.execute(
                "INSERT INTO users (id, username, email, password, is_active, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5)",
                params![
                    user.id.to_string(),
                    user.username,
                    user.email,
                    user.password_hash,
                    ts
                ],
            )?;
            Ok(())
        })
    }

    pub fn delete_user(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let affected = conn.execute("DELETE FROM users WHERE id = ?1", [id.to_string()])?;
            Ok(affected > 0)
        })
    }

    pub fn get_user_by_id(&self, id: Uuid) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", &id.to_string()))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email = ?1", email))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username = ?1", username))
    }

    /// Returns any account that already holds either identifier.
    pub fn find_user_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {USER_COLUMNS} FROM users WHERE username = ?1 OR email = ?2 LIMIT 1"
            );
            let row = conn
                .query_row(&sql, params![username, email], map_user)
                .optional()?;
            Ok(row)
        })
    }

    pub fn get_user_summary(&self, id: Uuid) -> Result<Option<UserSummaryRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, username, avatar_url FROM users WHERE id = ?1",
                    [id.to_string()],
                    |row| summary_at(row, 0),
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Flips an inactive account to active. Returns `false` when the account
    /// was already active, so a second activation has no side effect.
    pub fn activate_user(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let affected = conn.execute(
                "UPDATE users SET is_active = 1, updated_at = ?2 WHERE id = ?1 AND is_active = 0",
                params![id.to_string(), now()],
            )?;
            Ok(affected > 0)
        })
    }

    /// Stores the latest reset token, superseding any earlier one.
    pub fn set_reset_token(&self, id: Uuid, token: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET reset_token = ?2, updated_at = ?3 WHERE id = ?1",
                params![id.to_string(), token, now()],
            )?;
            Ok(())
        })
    }

    /// Replaces the password hash and consumes the reset token in one
    /// statement. Returns `false` if `expected_token` is no longer the stored one.
    pub fn reset_password(&self, id: Uuid, expected_token: &str, password_hash: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let affected = conn.execute(
                "UPDATE users SET password = ?3, reset_token = NULL, updated_at = ?4
                 WHERE id = ?1 AND reset_token = ?2",
                params![id.to_string(), expected_token, password_hash, now()],
            )?;
            Ok(affected > 0)
        })
    }

    pub fn update_profile(&self, id: Uuid, update: &ProfileUpdate<'_>) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET
                    username = COALESCE(?2, username),
                    bio = COALESCE(?3, bio),
                    avatar_url = COALESCE(?4, avatar_url),
                    updated_at = ?5
                 WHERE id = ?1",
                params![id.to_string(), update.username, update.bio, update.avatar_url, now()],
            )?;
            query_user(conn, "id = ?1", &id.to_string())
        })
    }

    /// Case-insensitive substring match on username or bio.
    pub fn search_users(&self, query: &str, limit: u32) -> Result<Vec<UserSummaryRow>> {
        let pattern = format!("%{}%", escape_like(query));
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, username, avatar_url FROM users
                 WHERE username LIKE ?1 ESCAPE '\\' OR bio LIKE ?1 ESCAPE '\\'
                 ORDER BY username
                 LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(params![pattern, limit], |row| summary_at(row, 0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn profile_counts(&self, id: Uuid) -> Result<ProfileCounts> {
        self.with_conn(|conn| {
            let counts = conn.query_row(
                "SELECT
                    (SELECT COUNT(*) FROM follows WHERE following_id = ?1),
                    (SELECT COUNT(*) FROM follows WHERE follower_id = ?1),
                    (SELECT COUNT(*) FROM posts WHERE user_id = ?1)",
                [id.to_string()],
                |row| {
                    Ok(ProfileCounts {
                        followers: row.get(0)?,
                        following: row.get(1)?,
                        posts: row.get(2)?,
                    })
                },
            )?;
            Ok(counts)
        })
    }
}

fn query_user(conn: &Connection, predicate: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {predicate}");
    let row = conn.query_row(&sql, [value], map_user).optional()?;
    Ok(row)
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: uuid_at(row, 0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        is_active: row.get(4)?,
        reset_token: row.get(5)?,
        bio: row.get(6)?,
        avatar_url: row.get(7)?,
        created_at: time_at(row, 8)?,
        updated_at: time_at(row, 9)?,
    })
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
