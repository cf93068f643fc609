use chrono::NaiveDate;
use rspotify::model::IdError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SotdError {
    #[error("backing table failure: {0}")]
    Persistence(String),
    #[error("backing table I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("backing table encoding error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("backing table HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("row {row}: column '{column}' has malformed value '{value}'")]
    MalformedRow {
        row: usize,
        column: &'static str,
        value: String,
    },
    #[error("a song is already logged for {0}")]
    DuplicateDate(NaiveDate),
    #[error("Spotify API error: {0}")]
    Catalog(#[from] rspotify::ClientError),
    #[error("invalid Spotify id: {0}")]
    InvalidId(#[from] IdError),
    #[error("Spotify request timed out")]
    CatalogTimeout,
    #[error("Spotify catalog is not available in this session")]
    CatalogUnavailable,
    #[error("{0} not set")]
    MissingConfig(&'static str),
    #[error("invalid value '{value}' for {key}")]
    InvalidConfig { key: &'static str, value: String },
    #[error("{0}")]
    InvalidArgument(String),
}

impl SotdError {
    /// True for failures reading or writing the backing table.
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            SotdError::Persistence(_) | SotdError::Io(_) | SotdError::Json(_) | SotdError::Http(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SotdError>;
