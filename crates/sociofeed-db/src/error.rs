use rusqlite::ffi;
use thiserror::Error;

/// Errors produced by the datastore layer.
#[derive(Debug, Error)]
pub enum DbError {
    /// A UNIQUE or PRIMARY KEY constraint rejected the write.
    #[error("Duplicate record: {0}")]
    Conflict(String),

    /// A FOREIGN KEY constraint rejected the write (the referenced row is gone).
    #[error("Missing referenced record: {0}")]
    MissingReference(String),

    #[error("Database error: {0}")]
    Sqlite(rusqlite::Error),

    #[error("Database lock poisoned")]
    LockPoisoned,
}

impl From<rusqlite::Error> for DbError {
    fn from(e: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(failure, message) = &e {
            let detail = message.clone().unwrap_or_else(|| failure.to_string());
            match failure.extended_code {
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    return DbError::Conflict(detail);
                }
                ffi::SQLITE_CONSTRAINT_FOREIGNKEY => return DbError::MissingReference(detail),
                _ => {}
            }
        }
        DbError::Sqlite(e)
    }
}

pub type Result<T> = std::result::Result<T, DbError>;
