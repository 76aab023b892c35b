//! In-memory implementation of PictureStore.
//!
//! Backs the test suites of the fetcher and the gateway, and enforces the
//! same `(source, date)` uniqueness as the database.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::models::{Picture, SourceConfig};
use crate::db::store::PictureStore;
use crate::errors::{AppError, Result};
use crate::source::{PictureDraft, Source};

#[derive(Debug, Default)]
struct State {
    pictures: HashMap<Uuid, Picture>,
    configs: HashMap<Source, SourceConfig>,
}

/// HashMap-backed store. All data is lost when the last clone is dropped.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
    picture_queries: Arc<AtomicUsize>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a fully-formed record (for testing).
    pub async fn insert(&self, picture: Picture) -> Result<Picture> {
        let mut state = self.state.write().await;
        if state
            .pictures
            .values()
            .any(|p| p.source == picture.source && p.date == picture.date)
        {
            return Err(AppError::PersistenceConflict {
                source_id: picture.source.clone(),
                date: picture.date,
            });
        }
        state.pictures.insert(picture.id, picture.clone());
        Ok(picture)
    }

    /// Number of stored pictures (for testing).
    pub async fn len(&self) -> usize {
        self.state.read().await.pictures.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.pictures.is_empty()
    }

    /// Number of picture reads and writes served so far (for testing).
    pub fn picture_queries(&self) -> usize {
        self.picture_queries.load(Ordering::SeqCst)
    }

    fn count_query(&self) {
        self.picture_queries.fetch_add(1, Ordering::SeqCst);
    }
}

fn newest_first(pictures: &mut [Picture]) {
    pictures.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.source.cmp(&b.source)));
}

#[async_trait]
impl PictureStore for InMemoryStore {
    async fn create_picture(&self, source: Source, draft: &PictureDraft) -> Result<Picture> {
        self.count_query();
        self.insert(Picture::from_draft(source, draft)).await
    }

    async fn save_picture(&self, picture: &Picture) -> Result<Picture> {
        self.count_query();
        let mut state = self.state.write().await;
        match state.pictures.get_mut(&picture.id) {
            Some(slot) => {
                *slot = picture.clone();
                Ok(picture.clone())
            }
            None => Err(AppError::NotFound {
                resource_type: "picture".into(),
                id: picture.id.to_string(),
            }),
        }
    }

    async fn find_picture_by_id(&self, id: Uuid) -> Result<Option<Picture>> {
        self.count_query();
        Ok(self.state.read().await.pictures.get(&id).cloned())
    }

    async fn find_picture(&self, source: Source, date: NaiveDate) -> Result<Option<Picture>> {
        self.count_query();
        Ok(self
            .state
            .read()
            .await
            .pictures
            .values()
            .find(|p| p.source == source.as_str() && p.date == date)
            .cloned())
    }

    async fn list_pictures(
        &self,
        source: Option<Source>,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<Picture>, u64)> {
        self.count_query();
        let mut matching: Vec<Picture> = self
            .state
            .read()
            .await
            .pictures
            .values()
            .filter(|p| source.map_or(true, |s| p.source == s.as_str()))
            .cloned()
            .collect();
        newest_first(&mut matching);

        let total = matching.len() as u64;
        let offset = usize::try_from(page.saturating_mul(page_size)).unwrap_or(usize::MAX);
        let items = matching
            .into_iter()
            .skip(offset)
            .take(usize::try_from(page_size).unwrap_or(usize::MAX))
            .collect();
        Ok((items, total))
    }

    async fn recent_pictures(&self, source: Source, limit: Option<u64>) -> Result<Vec<Picture>> {
        self.count_query();
        let mut matching: Vec<Picture> = self
            .state
            .read()
            .await
            .pictures
            .values()
            .filter(|p| p.source == source.as_str())
            .cloned()
            .collect();
        newest_first(&mut matching);

        if let Some(limit) = limit {
            matching.truncate(limit as usize);
        }
        Ok(matching)
    }

    async fn delete_pictures(&self, ids: &[Uuid]) -> Result<u64> {
        self.count_query();
        let mut state = self.state.write().await;
        let removed = ids
            .iter()
            .filter(|id| state.pictures.remove(*id).is_some())
            .count();
        Ok(removed as u64)
    }

    async fn find_source_config(&self, source: Source) -> Result<Option<SourceConfig>> {
        Ok(self.state.read().await.configs.get(&source).cloned())
    }

    async fn list_source_configs(&self) -> Result<Vec<SourceConfig>> {
        let mut configs: Vec<SourceConfig> =
            self.state.read().await.configs.values().cloned().collect();
        configs.sort_by(|a, b| a.source.cmp(&b.source));
        Ok(configs)
    }

    async fn create_source_config(&self, source: Source, is_enabled: bool) -> Result<SourceConfig> {
        let mut state = self.state.write().await;
        if state.configs.contains_key(&source) {
            return Err(AppError::Validation {
                message: format!("Configuration for {} already exists", source),
                field: Some("source".into()),
            });
        }
        let config = SourceConfig::new(source, is_enabled);
        state.configs.insert(source, config.clone());
        Ok(config)
    }

    async fn set_source_enabled(&self, source: Source, is_enabled: bool) -> Result<SourceConfig> {
        let mut state = self.state.write().await;
        let config = state.configs.get_mut(&source).ok_or_else(|| AppError::NotFound {
            resource_type: "source configuration".into(),
            id: source.to_string(),
        })?;
        config.is_enabled = is_enabled;
        config.updated_at = chrono::Utc::now().fixed_offset();
        Ok(config.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MediaType;

    fn draft(date: NaiveDate, title: &str) -> PictureDraft {
        PictureDraft {
            title: title.into(),
            date,
            explanation: "A galaxy far away.".into(),
            image_url: "https://example.com/a.jpg".into(),
            hd_image_url: None,
            thumbnail_url: None,
            media_type: MediaType::Image,
            copyright: None,
            source_url: None,
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[tokio::test]
    async fn test_create_enforces_uniqueness() {
        let store = InMemoryStore::new();
        store.create_picture(Source::Apod, &draft(day(15), "a")).await.unwrap();

        let err = store
            .create_picture(Source::Apod, &draft(day(15), "b"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PersistenceConflict { .. }));

        // Same date, different source is fine
        store.create_picture(Source::Bing, &draft(day(15), "c")).await.unwrap();
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_get_or_create_returns_existing() {
        let store = InMemoryStore::new();
        let (first, created) = store
            .get_or_create_picture(Source::Apod, &draft(day(15), "first"))
            .await
            .unwrap();
        assert!(created);

        let (second, created) = store
            .get_or_create_picture(Source::Apod, &draft(day(15), "second"))
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(second.id, first.id);
        assert_eq!(second.title, "first");
    }

    #[tokio::test]
    async fn test_upsert_overwrites_and_resets() {
        let store = InMemoryStore::new();
        let (mut picture, _) = store
            .get_or_create_picture(Source::Apod, &draft(day(15), "first"))
            .await
            .unwrap();
        picture.is_processed = true;
        picture.processed_explanation = Some("<a>linked</a>".into());
        store.save_picture(&picture).await.unwrap();

        let (updated, created) = store
            .upsert_picture(Source::Apod, &draft(day(15), "second"))
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(updated.id, picture.id);
        assert_eq!(updated.title, "second");
        assert!(!updated.is_processed);
        assert_eq!(updated.processed_explanation.as_deref(), Some("<a>linked</a>"));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_list_pages_newest_first() {
        let store = InMemoryStore::new();
        for d in 1..=5 {
            store.create_picture(Source::Apod, &draft(day(d), "apod")).await.unwrap();
        }
        store.create_picture(Source::Bing, &draft(day(3), "bing")).await.unwrap();

        let (items, total) = store.list_pictures(None, 0, 4).await.unwrap();
        assert_eq!(total, 6);
        assert_eq!(items.len(), 4);
        assert_eq!(items[0].date, day(5));

        let (items, total) = store.list_pictures(Some(Source::Apod), 1, 4).await.unwrap();
        assert_eq!(total, 5);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].date, day(1));

        let latest = store.latest_picture(Source::Bing).await.unwrap().unwrap();
        assert_eq!(latest.title, "bing");
    }

    #[tokio::test]
    async fn test_list_far_page_is_empty() {
        let store = InMemoryStore::new();
        store.create_picture(Source::Apod, &draft(day(1), "a")).await.unwrap();

        let (items, total) = store.list_pictures(None, u64::MAX - 1, 100).await.unwrap();
        assert_eq!(total, 1);
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_delete_pictures() {
        let store = InMemoryStore::new();
        let a = store.create_picture(Source::Apod, &draft(day(1), "a")).await.unwrap();
        store.create_picture(Source::Apod, &draft(day(2), "b")).await.unwrap();

        assert_eq!(store.delete_pictures(&[a.id, Uuid::new_v4()]).await.unwrap(), 1);
        assert_eq!(store.len().await, 1);
    }
}
