use rocket::http::Status;
use rocket::response::Responder;
use rocket::serde::json::Json;
use thiserror::Error;
use shared::{ErrorCode, ValidationError};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Operation timed out after {seconds}s")]
    Timeout { seconds: u64 },
    #[error("Database still locked after {attempts} attempts: {source}")]
    Contention {
        attempts: usize,
        #[source]
        source: sqlx::Error,
    },
}

impl StoreError {
    /// SQLite reports a held write lock as SQLITE_BUSY (5) or SQLITE_LOCKED (6),
    /// possibly as an extended code whose low byte is one of those.
    pub fn is_contention(&self) -> bool {
        match self {
            StoreError::Database(err) => is_sqlite_lock_error(err),
            StoreError::Contention { .. } => true,
            _ => false,
        }
    }

    pub fn code(&self) -> ErrorCode {
        if self.is_contention() {
            ErrorCode::StoreBusy
        } else {
            ErrorCode::StoreUnavailable
        }
    }
}

pub(crate) fn is_sqlite_lock_error(err: &sqlx::Error) -> bool {
    let sqlx::Error::Database(db_err) = err else { return false };

    let by_code = db_err
        .code()
        .and_then(|code| code.parse::<i32>().ok())
        .map(|code| matches!(code & 0xff, 5 | 6))
        .unwrap_or(false);

    by_code || db_err.message().contains("database is locked")
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    InvalidChoice(#[from] ValidationError),
    #[error("Missing vote parameter")]
    MissingVote,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for ApiError {
    fn respond_to(self, req: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        let (status, body) = match self {
            ApiError::InvalidChoice(err) => (Status::BadRequest, shared::Error::from(err)),
            ApiError::MissingVote => (
                Status::NotFound,
                shared::Error::with_details(
                    ErrorCode::NotFound,
                    "Missing vote parameter",
                    "Use ?vote=classic_music or ?vote=rock_music.",
                ),
            ),
        };

        rocket::Response::build_from(Json(body).respond_to(req)?)
            .status(status)
            .ok()
    }
}
