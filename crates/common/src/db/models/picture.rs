//! Picture entity: one row per (source, date)

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::source::{MediaType, PictureDraft, Source};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "pictures")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Source identifier, unique together with `date`
    #[sea_orm(column_type = "Text")]
    pub source: String,

    pub date: Date,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub original_explanation: String,

    #[sea_orm(column_type = "Text")]
    pub media_type: String,

    #[sea_orm(column_type = "Text")]
    pub image_url: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub hd_image_url: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub thumbnail_url: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub local_image_path: Option<String>,

    pub image_width: Option<i32>,

    pub image_height: Option<i32>,

    pub image_size_bytes: Option<i64>,

    #[sea_orm(column_type = "Text", nullable)]
    pub simplified_explanation: Option<String>,

    /// Explanation with reference links embedded
    #[sea_orm(column_type = "Text", nullable)]
    pub processed_explanation: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub copyright: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub source_url: Option<String>,

    pub is_processed: bool,

    #[sea_orm(column_type = "Text", nullable)]
    pub processing_error: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Unsaved record built from an adapter draft
    pub fn from_draft(source: Source, draft: &PictureDraft) -> Self {
        let now = chrono::Utc::now().fixed_offset();
        Self {
            id: Uuid::new_v4(),
            source: source.as_str().to_string(),
            date: draft.date,
            title: draft.title.clone(),
            original_explanation: draft.explanation.clone(),
            media_type: draft.media_type.as_str().to_string(),
            image_url: draft.image_url.clone(),
            hd_image_url: draft.hd_image_url.clone(),
            thumbnail_url: draft.thumbnail_url.clone(),
            local_image_path: None,
            image_width: None,
            image_height: None,
            image_size_bytes: None,
            simplified_explanation: None,
            processed_explanation: None,
            copyright: draft.copyright.clone(),
            source_url: draft.source_url.clone(),
            is_processed: false,
            processing_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrite the source-provided fields and reset processing state.
    /// Enrichment output and image metadata are left in place.
    pub fn refresh_from_draft(&mut self, draft: &PictureDraft) {
        self.title = draft.title.clone();
        self.original_explanation = draft.explanation.clone();
        self.media_type = draft.media_type.as_str().to_string();
        self.image_url = draft.image_url.clone();
        self.hd_image_url = draft.hd_image_url.clone();
        self.thumbnail_url = draft.thumbnail_url.clone();
        self.copyright = draft.copyright.clone();
        self.source_url = draft.source_url.clone();
        self.is_processed = false;
        self.processing_error = None;
        self.updated_at = chrono::Utc::now().fixed_offset();
    }

    /// Parsed source, `None` for rows written by an unknown producer
    pub fn picture_source(&self) -> Option<Source> {
        self.source.parse().ok()
    }

    pub fn media(&self) -> MediaType {
        MediaType::from(self.media_type.as_str())
    }

    pub fn is_image(&self) -> bool {
        self.media() == MediaType::Image
    }

    /// Processed, then simplified, then original explanation
    pub fn display_explanation(&self) -> &str {
        self.processed_explanation
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.simplified_explanation.as_deref().filter(|s| !s.is_empty()))
            .unwrap_or(&self.original_explanation)
    }

    /// Local copy, then HD URL, then regular URL
    pub fn display_image_url(&self) -> &str {
        self.local_image_path
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.hd_image_url.as_deref().filter(|s| !s.is_empty()))
            .unwrap_or(&self.image_url)
    }

    /// Best remote URL to probe or download
    pub fn best_remote_url(&self) -> Option<&str> {
        self.hd_image_url
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(Some(self.image_url.as_str()).filter(|s| !s.is_empty()))
    }

    /// `"{width}x{height}"` when both dimensions are known
    pub fn image_resolution(&self) -> Option<String> {
        match (self.image_width, self.image_height) {
            (Some(w), Some(h)) => Some(format!("{}x{}", w, h)),
            _ => None,
        }
    }

    /// Size in MiB rounded to two decimals
    pub fn image_size_mb(&self) -> Option<f64> {
        self.image_size_bytes
            .map(|bytes| (bytes as f64 / BYTES_PER_MB * 100.0).round() / 100.0)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
