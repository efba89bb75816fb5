use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("month {month:?} is not in the data (available: {})", .available.join(", "))]
    MonthOutOfRange {
        month: String,
        available: Vec<String>,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to load {resource}: {message}")]
    Source { resource: String, message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("CSV parsing failed: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, DashboardError>;
