use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Invalid severity token: {0:?}")]
    InvalidSeverity(String),

    #[error("Invalid document literal: {0}")]
    DocumentLiteral(String),

    #[error("Invalid namespace: {0:?}")]
    InvalidNamespace(String),

    #[error("Field {0:?} has no known direction")]
    InvalidDirection(String),

    #[error("Invalid index specification: {0}")]
    IndexSpec(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn error_code(&self) -> i32 {
        match self {
            Error::Io(_) => -1,
            Error::Json(_) => -2,
            Error::Parse { .. } => -3,
            Error::InvalidSeverity(_) => -4,
            Error::DocumentLiteral(_) => -5,
            Error::InvalidNamespace(_) => -6,
            Error::InvalidDirection(_) => -7,
            Error::IndexSpec(_) => -8,
            Error::NotImplemented(_) => -9,
            Error::Catalog(_) => -10,
            Error::Config(_) => -11,
        }
    }

    /// True for errors that describe a single bad input record rather than a
    /// broken environment; ingestion drivers skip these and keep going.
    pub fn is_record_error(&self) -> bool {
        matches!(
            self,
            Error::Parse { .. }
                | Error::InvalidSeverity(_)
                | Error::DocumentLiteral(_)
                | Error::InvalidNamespace(_)
        )
    }
}
