//! Picture of the Day Common Library
//!
//! Shared code for the fetcher and the gateway including:
//! - Picture sources and the normalized draft shape
//! - Database models and the record store
//! - Chat completion client abstraction
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod config;
pub mod db;
pub mod errors;
pub mod llm;
pub mod metrics;
pub mod source;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{DbPool, InMemoryStore, PictureStore, Repository};
pub use errors::{AppError, Result};
pub use source::{MediaType, PictureDraft, Source};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
