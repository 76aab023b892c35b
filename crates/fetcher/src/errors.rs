//! Fetch pipeline error types

use chrono::NaiveDate;
use potd_common::errors::AppError;
use potd_common::Source;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// Network failure, non-success status or malformed payload
    #[error("Failed to fetch from {source_id}: {message}")]
    Upstream { source_id: String, message: String },

    /// The upstream answered but has no picture for the date
    #[error("No {source_id} picture available for {date}")]
    NoContent { source_id: String, date: NaiveDate },

    #[error("Cannot fetch {source_id} picture for future date {date}")]
    FutureDate { source_id: String, date: NaiveDate },

    #[error("Unknown source: {0}")]
    UnknownSource(String),

    #[error("Source {0} is currently disabled")]
    SourceDisabled(String),

    #[error("{operation} is not supported for {source_id}")]
    Unsupported { source_id: String, operation: String },

    #[error("Text processing error: {0}")]
    Enrichment(String),

    #[error("Image error: {0}")]
    Image(String),

    #[error(transparent)]
    Store(AppError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn upstream(source: Source, message: impl Into<String>) -> Self {
        PipelineError::Upstream {
            source_id: source.as_str().to_string(),
            message: message.into(),
        }
    }

    pub fn no_content(source: Source, date: NaiveDate) -> Self {
        PipelineError::NoContent {
            source_id: source.as_str().to_string(),
            date,
        }
    }
}

impl From<AppError> for PipelineError {
    fn from(e: AppError) -> Self {
        match e {
            AppError::UnknownSource { source_id, .. } => PipelineError::UnknownSource(source_id),
            AppError::SourceDisabled { source_id } => PipelineError::SourceDisabled(source_id),
            AppError::LanguageModel { message } => PipelineError::Enrichment(message),
            other => PipelineError::Store(other),
        }
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
