use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredoError {
    #[error("configuration file not found: {}", .0.display())]
    ConfigMissing(PathBuf),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("connection pool error: {0}")]
    Pool(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("expected at most one row, found more: {0}")]
    MultipleRows(String),
}

impl CredoError {
    pub fn invalid(message: impl Into<String>) -> Self {
        CredoError::InvalidArgument(message.into())
    }

    /// True for failures that indicate the connection itself is unusable.
    pub fn is_disconnect(&self) -> bool {
        match self {
            CredoError::Database(err) => is_disconnect(err),
            CredoError::Pool(_) => true,
            _ => false,
        }
    }
}

pub(crate) fn is_disconnect(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
    )
}

pub type Result<T> = std::result::Result<T, CredoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_errors_count_as_disconnects() {
        assert!(CredoError::Database(sqlx::Error::PoolClosed).is_disconnect());
        assert!(CredoError::Pool("probe failed".to_string()).is_disconnect());
        assert!(!CredoError::invalid("bad fingerprint").is_disconnect());
        assert!(!CredoError::Database(sqlx::Error::RowNotFound).is_disconnect());
    }

    #[test]
    fn missing_config_names_the_path() {
        let err = CredoError::ConfigMissing(PathBuf::from("/etc/credo.json"));
        assert!(err.to_string().contains("/etc/credo.json"));
    }
}
