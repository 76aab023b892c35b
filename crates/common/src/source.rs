//! Picture sources and the normalized draft every adapter produces

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::AppError;

/// External picture-of-the-day providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Apod,
    Wikipedia,
    Bing,
}

impl Source {
    /// Every known source, in display order
    pub const ALL: [Source; 3] = [Source::Apod, Source::Wikipedia, Source::Bing];

    /// Stable identifier used in URLs, the CLI and the database
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Apod => "apod",
            Source::Wikipedia => "wikipedia",
            Source::Bing => "bing",
        }
    }

    /// Human readable label
    pub fn label(&self) -> &'static str {
        match self {
            Source::Apod => "Astronomy Picture of the Day (NASA)",
            Source::Wikipedia => "Wikipedia Picture of the Day",
            Source::Bing => "Bing Picture of the Day",
        }
    }

    /// Domain hint handed to the text enrichment prompt
    pub fn enrichment_context(&self) -> EnrichmentContext {
        match self {
            Source::Apod => EnrichmentContext::Astronomy,
            Source::Wikipedia | Source::Bing => EnrichmentContext::General,
        }
    }

    fn identifiers() -> String {
        Source::ALL
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "apod" => Ok(Source::Apod),
            "wikipedia" => Ok(Source::Wikipedia),
            "bing" => Ok(Source::Bing),
            other => Err(AppError::UnknownSource {
                source_id: other.to_string(),
                available: Source::identifiers(),
            }),
        }
    }
}

/// Term-selection guidance used by the enrichment prompts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichmentContext {
    Astronomy,
    General,
}

impl EnrichmentContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrichmentContext::Astronomy => "astronomy",
            EnrichmentContext::General => "general",
        }
    }
}

/// Kind of media published for a day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    Image,
    Video,
    Other,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
            MediaType::Other => "other",
        }
    }
}

impl From<&str> for MediaType {
    fn from(s: &str) -> Self {
        match s {
            "image" => MediaType::Image,
            "video" => MediaType::Video,
            _ => MediaType::Other,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized, not-yet-persisted output of a source adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PictureDraft {
    pub title: String,
    pub date: NaiveDate,
    pub explanation: String,
    /// May be empty, never absent
    pub image_url: String,
    pub hd_image_url: Option<String>,
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub media_type: MediaType,
    pub copyright: Option<String>,
    pub source_url: Option<String>,
}

/// Current calendar date used for "today" lookups and date offsets
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Parse a strict `YYYY-MM-DD` date
pub fn parse_iso_date(value: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| AppError::InvalidFormat {
        message: format!("Invalid date '{}'. Use YYYY-MM-DD", value),
    })
}
