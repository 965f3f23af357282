use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};
use uuid::Uuid;

use crate::convert::{format_timestamp, now, time_at, uuid_at};
use crate::models::RefreshTokenRow;
use crate::{Database, Result};

impl Database {
    pub fn insert_refresh_token(
        &self,
        token: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO refresh_tokens (id, token, user_id, expires_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    Uuid::new_v4().to_string(),
                    token,
                    user_id.to_string(),
                    format_timestamp(expires_at),
                    now()
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_refresh_token(&self, token: &str) -> Result<Option<RefreshTokenRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT token, user_id, expires_at FROM refresh_tokens WHERE token = ?1",
                    [token],
                    |row| {
                        Ok(RefreshTokenRow {
                            token: row.get(0)?,
                            user_id: uuid_at(row, 1)?,
                            expires_at: time_at(row, 2)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Deletes every row holding this token value. Returns the number removed.
    pub fn delete_refresh_token(&self, token: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let affected = conn.execute("DELETE FROM refresh_tokens WHERE token = ?1", [token])?;
            Ok(affected)
        })
    }

    pub fn delete_expired_refresh_tokens(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        self.with_conn(|conn| {
            let affected = conn.execute(
                "DELETE FROM refresh_tokens WHERE expires_at <= ?1",
                [format_timestamp(cutoff)],
            )?;
            Ok(affected)
        })
    }
}
