use rusqlite::{OptionalExtension, Row, params};
use uuid::Uuid;

use crate::convert::{now, time_at, uuid_at};
use crate::models::{CommentOwnership, CommentRow};
use crate::queries::summary_at;
use crate::{Database, Result};

const COMMENT_SELECT: &str = "SELECT c.id, c.post_id, c.content, c.created_at, c.updated_at,
        u.id, u.username, u.avatar_url
     FROM comments c
     JOIN users u ON u.id = c.user_id";

impl Database {
    pub fn add_comment(&self, id: Uuid, post_id: Uuid, user_id: Uuid, content: &str) -> Result<CommentRow> {
        self.with_conn(|conn| {
            let ts = now();
            conn.execute(
                "INSERT INTO comments (id, post_id, user_id, content, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![id.to_string(), post_id.to_string(), user_id.to_string(), content, ts],
            )?;
            let sql = format!("{COMMENT_SELECT} WHERE c.id = ?1");
            let row = conn.query_row(&sql, [id.to_string()], map_comment)?;
            Ok(row)
        })
    }

    pub fn get_comment(&self, id: Uuid) -> Result<Option<CommentRow>> {
        self.with_conn(|conn| {
            let sql = format!("{COMMENT_SELECT} WHERE c.id = ?1");
            let row = conn.query_row(&sql, [id.to_string()], map_comment).optional()?;
            Ok(row)
        })
    }

    pub fn comment_ownership(&self, id: Uuid) -> Result<Option<CommentOwnership>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT c.user_id, p.user_id FROM comments c
                     JOIN posts p ON p.id = c.post_id
                     WHERE c.id = ?1",
                    [id.to_string()],
                    |row| {
                        Ok(CommentOwnership {
                            comment_author: uuid_at(row, 0)?,
                            post_author: uuid_at(row, 1)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn update_comment(&self, id: Uuid, content: &str) -> Result<Option<CommentRow>> {
        self.with_conn(|conn| {
            let affected = conn.execute(
                "UPDATE comments SET content = ?2, updated_at = ?3 WHERE id = ?1",
                params![id.to_string(), content, now()],
            )?;
            if affected == 0 {
                return Ok(None);
            }
            let sql = format!("{COMMENT_SELECT} WHERE c.id = ?1");
            let row = conn.query_row(&sql, [id.to_string()], map_comment)?;
            Ok(Some(row))
        })
    }

    pub fn delete_comment(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let affected = conn.execute("DELETE FROM comments WHERE id = ?1", [id.to_string()])?;
            Ok(affected > 0)
        })
    }

    /// Comments on a post, oldest first.
    pub fn list_comments(&self, post_id: Uuid) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let sql = format!("{COMMENT_SELECT} WHERE c.post_id = ?1 ORDER BY c.created_at ASC, c.rowid ASC");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([post_id.to_string()], map_comment)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn map_comment(row: &Row<'_>) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        id: uuid_at(row, 0)?,
        post_id: uuid_at(row, 1)?,
        content: row.get(2)?,
        created_at: time_at(row, 3)?,
        updated_at: time_at(row, 4)?,
        author: summary_at(row, 5)?,
    })
}
