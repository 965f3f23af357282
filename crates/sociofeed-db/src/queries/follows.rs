use rusqlite::{Connection, params};
use uuid::Uuid;

use crate::convert::now;
use crate::models::UserSummaryRow;
use crate::queries::summary_at;
use crate::{Database, Result};

impl Database {
    pub fn is_following(&self, follower: Uuid, following: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let exists = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = ?1 AND following_id = ?2)",
                params![follower.to_string(), following.to_string()],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
    }

    /// Follows if not following, unfollows otherwise. Returns the new state.
    pub fn toggle_follow(&self, follower: Uuid, following: Uuid) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let removed = tx.execute(
                "DELETE FROM follows WHERE follower_id = ?1 AND following_id = ?2",
                params![follower.to_string(), following.to_string()],
            )?;

            let now_following = if removed > 0 {
                false
            } else {
                tx.execute(
                    "INSERT INTO follows (follower_id, following_id, created_at) VALUES (?1, ?2, ?3)",
                    params![follower.to_string(), following.to_string(), now()],
                )?;
                true
            };

            tx.commit()?;
            Ok(now_following)
        })
    }

    /// Users who follow `user_id`.
    pub fn list_followers(&self, user_id: Uuid) -> Result<Vec<UserSummaryRow>> {
        self.with_conn(|conn| {
            query_edges(
                conn,
                "SELECT u.id, u.username, u.avatar_url FROM follows f
                 JOIN users u ON u.id = f.follower_id
                 WHERE f.following_id = ?1
                 ORDER BY f.created_at DESC",
                user_id,
            )
        })
    }

    /// Users that `user_id` follows.
    pub fn list_following(&self, user_id: Uuid) -> Result<Vec<UserSummaryRow>> {
        self.with_conn(|conn| {
            query_edges(
                conn,
                "SELECT u.id, u.username, u.avatar_url FROM follows f
                 JOIN users u ON u.id = f.following_id
                 WHERE f.follower_id = ?1
                 ORDER BY f.created_at DESC",
                user_id,
            )
        })
    }
}

fn query_edges(conn: &Connection, sql: &str, user_id: Uuid) -> Result<Vec<UserSummaryRow>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([user_id.to_string()], |row| summary_at(row, 0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
