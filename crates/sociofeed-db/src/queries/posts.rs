use std::collections::HashMap;

use rusqlite::{Connection, OptionalExtension, Row, ToSql, named_params, params};
use uuid::Uuid;

use crate::convert::{now, time_at, uuid_at};
use crate::models::{MediaRow, NewMedia, PostRow, SaveRow, UserSummaryRow};
use crate::queries::summary_at;
use crate::{Database, Result};

/// Post projection shared by every listing. `:viewer` may be NULL, in which
/// case the liked/saved flags are false.
const POST_SELECT: &str = "SELECT p.id, p.content, p.created_at, p.updated_at,
        u.id, u.username, u.avatar_url,
        (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id),
        (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id),
        EXISTS(SELECT 1 FROM likes l WHERE l.post_id = p.id AND l.user_id = :viewer),
        EXISTS(SELECT 1 FROM saved_posts s WHERE s.post_id = p.id AND s.user_id = :viewer)
     FROM posts p
     JOIN users u ON u.id = p.user_id";

impl Database {
    /// Inserts a post and its media in one transaction.
    pub fn create_post(
        &self,
        id: Uuid,
        user_id: Uuid,
        content: Option<&str>,
        media: &[NewMedia],
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let ts = now();
            tx.execute(
                "INSERT INTO posts (id, user_id, content, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?4)",
                params![id.to_string(), user_id.to_string(), content, ts],
            )?;
            for (position, item) in media.iter().enumerate() {
                tx.execute(
                    "INSERT INTO media (id, post_id, url, media_type, position) VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        Uuid::new_v4().to_string(),
                        id.to_string(),
                        item.url,
                        item.media_type,
                        position as i64
                    ],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_post(&self, id: Uuid, viewer: Option<Uuid>) -> Result<Option<PostRow>> {
        self.with_conn(|conn| {
            let sql = format!("{POST_SELECT} WHERE p.id = :id");
            let row = conn
                .query_row(
                    &sql,
                    named_params! {
                        ":id": id.to_string(),
                        ":viewer": viewer.map(|v| v.to_string()),
                    },
                    map_post,
                )
                .optional()?;

            match row {
                Some(post) => {
                    let mut posts = vec![post];
                    attach_media(conn, &mut posts)?;
                    Ok(posts.pop())
                }
                None => Ok(None),
            }
        })
    }

    /// Returns the author of a post, or `None` if the post does not exist.
    pub fn get_post_author(&self, id: Uuid) -> Result<Option<Uuid>> {
        self.with_conn(|conn| {
            let author = conn
                .query_row("SELECT user_id FROM posts WHERE id = ?1", [id.to_string()], |row| {
                    uuid_at(row, 0)
                })
                .optional()?;
            Ok(author)
        })
    }

    /// The viewer's own posts plus those of everyone they follow, newest first.
    pub fn list_feed(&self, viewer: Uuid, limit: u32, offset: u32) -> Result<Vec<PostRow>> {
        let sql = format!(
            "{POST_SELECT}
             WHERE p.user_id = :viewer
                OR p.user_id IN (SELECT following_id FROM follows WHERE follower_id = :viewer)
             ORDER BY p.created_at DESC, p.rowid DESC
             LIMIT :limit OFFSET :offset"
        );
        self.with_conn(|conn| {
            query_posts(
                conn,
                &sql,
                named_params! {
                    ":viewer": viewer.to_string(),
                    ":limit": limit,
                    ":offset": offset,
                },
            )
        })
    }

    /// Posts written by `author`, newest first. `limit = None` returns all.
    pub fn list_user_posts(
        &self,
        author: Uuid,
        viewer: Option<Uuid>,
        limit: Option<u32>,
        offset: u32,
    ) -> Result<Vec<PostRow>> {
        let sql = format!(
            "{POST_SELECT}
             WHERE p.user_id = :author
             ORDER BY p.created_at DESC, p.rowid DESC
             LIMIT :limit OFFSET :offset"
        );
        // SQLite treats a negative LIMIT as unbounded.
        let limit = limit.map(i64::from).unwrap_or(-1);
        self.with_conn(|conn| {
            query_posts(
                conn,
                &sql,
                named_params! {
                    ":author": author.to_string(),
                    ":viewer": viewer.map(|v| v.to_string()),
                    ":limit": limit,
                    ":offset": offset,
                },
            )
        })
    }

    /// Posts the user saved, most recently saved first.
    pub fn list_saved_posts(&self, user_id: Uuid) -> Result<Vec<PostRow>> {
        let sql = format!(
            "{POST_SELECT}
             JOIN saved_posts sp ON sp.post_id = p.id AND sp.user_id = :viewer
             ORDER BY sp.created_at DESC, sp.rowid DESC"
        );
        self.with_conn(|conn| {
            query_posts(conn, &sql, named_params! { ":viewer": user_id.to_string() })
        })
    }

    // -- Likes --

    pub fn add_like(&self, user_id: Uuid, post_id: Uuid) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO likes (id, user_id, post_id, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    Uuid::new_v4().to_string(),
                    user_id.to_string(),
                    post_id.to_string(),
                    now()
                ],
            )?;
            Ok(())
        })
    }

    /// Returns `false` when there was no like to remove.
    pub fn remove_like(&self, user_id: Uuid, post_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let affected = conn.execute(
                "DELETE FROM likes WHERE user_id = ?1 AND post_id = ?2",
                params![user_id.to_string(), post_id.to_string()],
            )?;
            Ok(affected > 0)
        })
    }

    pub fn count_likes(&self, post_id: Uuid) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM likes WHERE post_id = ?1",
                [post_id.to_string()],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    pub fn list_likers(&self, post_id: Uuid) -> Result<Vec<UserSummaryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.username, u.avatar_url FROM likes l
                 JOIN users u ON u.id = l.user_id
                 WHERE l.post_id = ?1
                 ORDER BY l.created_at ASC",
            )?;
            let rows = stmt
                .query_map([post_id.to_string()], |row| summary_at(row, 0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Saves --

    pub fn save_post(&self, user_id: Uuid, post_id: Uuid) -> Result<SaveRow> {
        self.with_conn(|conn| {
            let id = Uuid::new_v4();
            let ts = now();
            conn.execute(
                "INSERT INTO saved_posts (id, user_id, post_id, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![id.to_string(), user_id.to_string(), post_id.to_string(), ts],
            )?;
            let row = conn.query_row(
                "SELECT id, user_id, post_id, created_at FROM saved_posts WHERE id = ?1",
                [id.to_string()],
                |row| {
                    Ok(SaveRow {
                        id: uuid_at(row, 0)?,
                        user_id: uuid_at(row, 1)?,
                        post_id: uuid_at(row, 2)?,
                        created_at: time_at(row, 3)?,
                    })
                },
            )?;
            Ok(row)
        })
    }

    /// Returns `false` when the post was not saved by this user.
    pub fn unsave_post(&self, user_id: Uuid, post_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let affected = conn.execute(
                "DELETE FROM saved_posts WHERE user_id = ?1 AND post_id = ?2",
                params![user_id.to_string(), post_id.to_string()],
            )?;
            Ok(affected > 0)
        })
    }
}

fn query_posts(
    conn: &Connection,
    sql: &str,
    params: &[(&str, &dyn ToSql)],
) -> Result<Vec<PostRow>> {
    let mut stmt = conn.prepare(sql)?;
    let mut posts = stmt
        .query_map(params, map_post)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    attach_media(conn, &mut posts)?;
    Ok(posts)
}

fn map_post(row: &Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: uuid_at(row, 0)?,
        content: row.get(1)?,
        created_at: time_at(row, 2)?,
        updated_at: time_at(row, 3)?,
        author: summary_at(row, 4)?,
        media: Vec::new(),
        likes_count: row.get(7)?,
        comments_count: row.get(8)?,
        liked_by_viewer: row.get(9)?,
        saved_by_viewer: row.get(10)?,
    })
}

/// Batch-fetches media for a page of posts in one query.
fn attach_media(conn: &Connection, posts: &mut [PostRow]) -> Result<()> {
    if posts.is_empty() {
        return Ok(());
    }

    let placeholders: Vec<String> = (1..=posts.len()).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "SELECT id, post_id, url, media_type FROM media WHERE post_id IN ({}) ORDER BY position",
        placeholders.join(", ")
    );

    let ids: Vec<String> = posts.iter().map(|p| p.id.to_string()).collect();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(ids.iter()), |row| {
            Ok(MediaRow {
                id: uuid_at(row, 0)?,
                post_id: uuid_at(row, 1)?,
                url: row.get(2)?,
                media_type: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut by_post: HashMap<Uuid, Vec<MediaRow>> = HashMap::new();
    for media in rows {
        by_post.entry(media.post_id).or_default().push(media);
    }
    for post in posts.iter_mut() {
        post.media = by_post.remove(&post.id).unwrap_or_default();
    }
    Ok(())
}
