use rusqlite::{Connection, OptionalExtension, Row, params};
use uuid::Uuid;

use crate::convert::{now, time_at, uuid_at};
use crate::models::{ChatOverviewRow, ChatRow, MessageRow, UserSummaryRow};
use crate::queries::summary_at;
use crate::{Database, Result};

const MESSAGE_SELECT: &str = "SELECT m.id, m.chat_id, m.content, m.created_at,
        s.id, s.username, s.avatar_url,
        r.id, r.username, r.avatar_url
     FROM messages m
     JOIN users s ON s.id = m.sender_id
     JOIN users r ON r.id = m.receiver_id";

impl Database {
    /// The chat whose participants are exactly `a` and `b`, if one exists.
    pub fn find_direct_chat(&self, a: Uuid, b: Uuid) -> Result<Option<ChatRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT c.id, c.created_at, c.updated_at FROM chats c
                     WHERE EXISTS(SELECT 1 FROM chat_participants WHERE chat_id = c.id AND user_id = ?1)
                       AND EXISTS(SELECT 1 FROM chat_participants WHERE chat_id = c.id AND user_id = ?2)
                       AND (SELECT COUNT(*) FROM chat_participants WHERE chat_id = c.id) = 2
                     ORDER BY c.created_at
                     LIMIT 1",
                    params![a.to_string(), b.to_string()],
                    map_chat,
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Creates a two-party chat and its participant rows atomically.
    pub fn create_chat(&self, id: Uuid, a: Uuid, b: Uuid) -> Result<ChatRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let ts = now();
            tx.execute(
                "INSERT INTO chats (id, created_at, updated_at) VALUES (?1, ?2, ?2)",
                params![id.to_string(), ts],
            )?;
            for user in [a, b] {
                tx.execute(
                    "INSERT INTO chat_participants (chat_id, user_id) VALUES (?1, ?2)",
                    params![id.to_string(), user.to_string()],
                )?;
            }
            let chat = tx.query_row(
                "SELECT id, created_at, updated_at FROM chats WHERE id = ?1",
                [id.to_string()],
                map_chat,
            )?;
            tx.commit()?;
            Ok(chat)
        })
    }

    /// Returns the chat only if `user_id` takes part in it.
    pub fn get_chat_for_participant(&self, chat_id: Uuid, user_id: Uuid) -> Result<Option<ChatRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT c.id, c.created_at, c.updated_at FROM chats c
                     JOIN chat_participants cp ON cp.chat_id = c.id AND cp.user_id = ?2
                     WHERE c.id = ?1",
                    params![chat_id.to_string(), user_id.to_string()],
                    map_chat,
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn is_participant(&self, chat_id: Uuid, user_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let exists = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM chat_participants WHERE chat_id = ?1 AND user_id = ?2)",
                params![chat_id.to_string(), user_id.to_string()],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
    }

    /// The participant that is not `user_id`.
    pub fn other_participant(
        &self,
        chat_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<UserSummaryRow>> {
        self.with_conn(|conn| query_other(conn, chat_id, user_id))
    }

    /// A user's chats, most recently active first.
    pub fn list_chats_for_user(&self, user_id: Uuid) -> Result<Vec<ChatOverviewRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.created_at, c.updated_at FROM chats c
                 JOIN chat_participants cp ON cp.chat_id = c.id
                 WHERE cp.user_id = ?1
                 ORDER BY c.updated_at DESC, c.rowid DESC",
            )?;
            let chats = stmt
                .query_map([user_id.to_string()], map_chat)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut overview = Vec::with_capacity(chats.len());
            for chat in chats {
                let other = query_other(conn, chat.id, user_id)?;
                let sql = format!(
                    "{MESSAGE_SELECT} WHERE m.chat_id = ?1 ORDER BY m.created_at DESC, m.rowid DESC LIMIT 1"
                );
                let latest_message = conn
                    .query_row(&sql, [chat.id.to_string()], map_message)
                    .optional()?;
                overview.push(ChatOverviewRow {
                    chat,
                    other,
                    latest_message,
                });
            }
            Ok(overview)
        })
    }

    /// One page of messages counted back from the newest, returned oldest
    /// first within the page.
    pub fn list_messages(&self, chat_id: Uuid, limit: u32, offset: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{MESSAGE_SELECT} WHERE m.chat_id = ?1
                 ORDER BY m.created_at DESC, m.rowid DESC
                 LIMIT ?2 OFFSET ?3"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt
                .query_map(params![chat_id.to_string(), limit, offset], map_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.reverse();
            Ok(rows)
        })
    }

    pub fn count_messages(&self, chat_id: Uuid) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE chat_id = ?1",
                [chat_id.to_string()],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    /// Stores a message and bumps the chat's `updated_at` in one transaction.
    pub fn insert_message(
        &self,
        id: Uuid,
        chat_id: Uuid,
        sender: Uuid,
        receiver: Uuid,
        content: &str,
    ) -> Result<MessageRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let ts = now();
            tx.execute(
                "INSERT INTO messages (id, chat_id, sender_id, receiver_id, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id.to_string(),
                    chat_id.to_string(),
                    sender.to_string(),
                    receiver.to_string(),
                    content,
                    ts
                ],
            )?;
            tx.execute(
                "UPDATE chats SET updated_at = ?2 WHERE id = ?1",
                params![chat_id.to_string(), ts],
            )?;
            let sql = format!("{MESSAGE_SELECT} WHERE m.id = ?1");
            let message = tx.query_row(&sql, [id.to_string()], map_message)?;
            tx.commit()?;
            Ok(message)
        })
    }
}

fn query_other(
    conn: &Connection,
    chat_id: Uuid,
    user_id: Uuid,
) -> Result<Option<UserSummaryRow>> {
    let row = conn
        .query_row(
            "SELECT u.id, u.username, u.avatar_url FROM chat_participants cp
             JOIN users u ON u.id = cp.user_id
             WHERE cp.chat_id = ?1 AND cp.user_id != ?2
             LIMIT 1",
            params![chat_id.to_string(), user_id.to_string()],
            |row| summary_at(row, 0),
        )
        .optional()?;
    Ok(row)
}

fn map_chat(row: &Row<'_>) -> rusqlite::Result<ChatRow> {
    Ok(ChatRow {
        id: uuid_at(row, 0)?,
        created_at: time_at(row, 1)?,
        updated_at: time_at(row, 2)?,
    })
}

fn map_message(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: uuid_at(row, 0)?,
        chat_id: uuid_at(row, 1)?,
        content: row.get(2)?,
        created_at: time_at(row, 3)?,
        sender: summary_at(row, 4)?,
        receiver: summary_at(row, 7)?,
    })
}
