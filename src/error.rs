//! Custom error types for grimoire

use thiserror::Error;

/// Main error type for grimoire operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    Conflict(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Corrupt data: {0}")]
    Corrupt(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Coarse classification callers branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    InvalidInput,
    IoFailure,
    UpstreamFailure,
    Config,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::Database(_) | Error::Corrupt(_) | Error::Io(_) => ErrorKind::IoFailure,
            Error::Embedding(_) | Error::Fetch(_) | Error::Http(_) => ErrorKind::UpstreamFailure,
            Error::Config(_)
            | Error::Parse(_)
            | Error::UrlParse(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::Yaml(_) => ErrorKind::Config,
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        if matches!(err, sqlx::Error::RowNotFound) {
            return Error::NotFound("row".to_string());
        }
        if let sqlx::Error::Database(db) = &err {
            // SQLite reports constraint failures with extended result codes
            if db.is_unique_violation() {
                return Error::Conflict(db.message().to_string());
            }
            if db.is_foreign_key_violation() {
                return Error::InvalidInput(db.message().to_string());
            }
        }
        Error::Database(err)
    }
}

/// Result type alias for grimoire
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(Error::NotFound("x".into()).kind(), ErrorKind::NotFound);
        assert_eq!(Error::Conflict("x".into()).kind(), ErrorKind::Conflict);
        assert_eq!(
            Error::Embedding("down".into()).kind(),
            ErrorKind::UpstreamFailure
        );
        assert_eq!(Error::Corrupt("blob".into()).kind(), ErrorKind::IoFailure);
        assert!(Error::Conflict("dup".into()).is_conflict());
        assert!(!Error::InvalidInput("bad".into()).is_conflict());
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: Error = sqlx::Error::RowNotFound.into();
        assert!(err.is_not_found());
    }
}
