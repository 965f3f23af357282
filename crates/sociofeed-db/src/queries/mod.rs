//! Typed query helpers, one module per aggregate. Every function is an
//! inherent method on [`crate::Database`].

mod chats;
mod comments;
mod follows;
mod posts;
mod tokens;
mod users;

use rusqlite::Row;

use crate::convert::uuid_at;
use crate::models::UserSummaryRow;

/// Reads `(id, username, avatar_url)` starting at column `start`.
pub(crate) fn summary_at(row: &Row<'_>, start: usize) -> rusqlite::Result<UserSummaryRow> {
    Ok(UserSummaryRow {
        id: uuid_at(row, start)?,
        username: row.get(start + 1)?,
        avatar_url: row.get(start + 2)?,
    })
}
