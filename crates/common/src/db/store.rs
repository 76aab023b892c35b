//! Record store contract shared by the fetcher and the gateway

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use uuid::Uuid;

use crate::db::models::{Picture, SourceConfig};
use crate::errors::{AppError, Result};
use crate::source::{PictureDraft, Source};

/// Persistence operations for pictures and source switches.
///
/// `(source, date)` is unique across all pictures. Implementations must
/// turn a uniqueness violation on create into `AppError::PersistenceConflict`.
#[async_trait]
pub trait PictureStore: Send + Sync {
    /// Insert a new record, failing if `(source, date)` already exists
    async fn create_picture(&self, source: Source, draft: &PictureDraft) -> Result<Picture>;

    /// Return the existing record or create one. The flag is `true` when created.
    async fn get_or_create_picture(
        &self,
        source: Source,
        draft: &PictureDraft,
    ) -> Result<(Picture, bool)> {
        if let Some(existing) = self.find_picture(source, draft.date).await? {
            return Ok((existing, false));
        }

        match self.create_picture(source, draft).await {
            Ok(created) => Ok((created, true)),
            Err(AppError::PersistenceConflict { .. }) => {
                // Another writer created it between the read and the insert
                let existing = self.find_picture(source, draft.date).await?.ok_or_else(|| {
                    AppError::Internal {
                        message: format!("{} {} vanished after conflict", source, draft.date),
                    }
                })?;
                Ok((existing, false))
            }
            Err(e) => Err(e),
        }
    }

    /// Create, or overwrite the source fields of the existing record and
    /// reset its processing state. The flag is `true` when created.
    async fn upsert_picture(&self, source: Source, draft: &PictureDraft) -> Result<(Picture, bool)> {
        if let Some(mut existing) = self.find_picture(source, draft.date).await? {
            existing.refresh_from_draft(draft);
            return Ok((self.save_picture(&existing).await?, false));
        }

        match self.create_picture(source, draft).await {
            Ok(created) => Ok((created, true)),
            Err(AppError::PersistenceConflict { .. }) => {
                let mut existing =
                    self.find_picture(source, draft.date).await?.ok_or_else(|| {
                        AppError::Internal {
                            message: format!("{} {} vanished after conflict", source, draft.date),
                        }
                    })?;
                existing.refresh_from_draft(draft);
                Ok((self.save_picture(&existing).await?, false))
            }
            Err(e) => Err(e),
        }
    }

    /// Persist every field of an existing record
    async fn save_picture(&self, picture: &Picture) -> Result<Picture>;

    async fn find_picture_by_id(&self, id: Uuid) -> Result<Option<Picture>>;

    async fn find_picture(&self, source: Source, date: NaiveDate) -> Result<Option<Picture>>;

    /// Newest record of a source
    async fn latest_picture(&self, source: Source) -> Result<Option<Picture>> {
        Ok(self.recent_pictures(source, Some(1)).await?.into_iter().next())
    }

    /// One page ordered by date descending, plus the total match count.
    /// `page` is zero-based.
    async fn list_pictures(
        &self,
        source: Option<Source>,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<Picture>, u64)>;

    /// Records of a source, newest first, optionally capped
    async fn recent_pictures(&self, source: Source, limit: Option<u64>) -> Result<Vec<Picture>>;

    /// Delete by id, returning the number of rows removed
    async fn delete_pictures(&self, ids: &[Uuid]) -> Result<u64>;

    async fn find_source_config(&self, source: Source) -> Result<Option<SourceConfig>>;

    async fn list_source_configs(&self) -> Result<Vec<SourceConfig>>;

    /// Insert a configuration row, failing if one exists for the source
    async fn create_source_config(&self, source: Source, is_enabled: bool) -> Result<SourceConfig>;

    /// Flip the switch on an existing row
    async fn set_source_enabled(&self, source: Source, is_enabled: bool) -> Result<SourceConfig>;

    /// Connectivity check for readiness probes
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// A source with no configuration row counts as enabled.
pub async fn is_source_enabled(store: &dyn PictureStore, source: Source) -> Result<bool> {
    match store.find_source_config(source).await? {
        Some(config) => Ok(config.is_enabled),
        None => Ok(true),
    }
}

/// Enabled sources in display order
pub async fn enabled_sources(store: &dyn PictureStore) -> Result<Vec<Source>> {
    let configs: HashMap<String, bool> = store
        .list_source_configs()
        .await?
        .into_iter()
        .map(|c| (c.source, c.is_enabled))
        .collect();

    Ok(Source::ALL
        .into_iter()
        .filter(|s| configs.get(s.as_str()).copied().unwrap_or(true))
        .collect())
}

pub async fn ensure_source_enabled(store: &dyn PictureStore, source: Source) -> Result<()> {
    if is_source_enabled(store, source).await? {
        Ok(())
    } else {
        Err(AppError::SourceDisabled {
            source_id: source.as_str().to_string(),
        })
    }
}

/// Parse a raw identifier and require the source to be enabled
pub async fn validate_source(store: &dyn PictureStore, raw: &str) -> Result<Source> {
    let source: Source = raw.parse()?;
    ensure_source_enabled(store, source).await?;
    Ok(source)
}
