//! Postgres-backed PictureStore
//!
//! All access goes through SeaORM entities. Uniqueness violations on
//! insert are reported as `PersistenceConflict` so callers can re-read.

use async_trait::async_trait;
use chrono::NaiveDate;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, SqlErr,
};
use uuid::Uuid;

use crate::db::models::*;
use crate::db::store::PictureStore;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use crate::source::{PictureDraft, Source};

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> &DatabaseConnection {
        self.pool.conn()
    }
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

#[async_trait]
impl PictureStore for Repository {
    async fn create_picture(&self, source: Source, draft: &PictureDraft) -> Result<Picture> {
        let model = Picture::from_draft(source, draft).into_active_model().reset_all();

        model.insert(self.conn()).await.map_err(|e| {
            if is_unique_violation(&e) {
                AppError::PersistenceConflict {
                    source_id: source.as_str().to_string(),
                    date: draft.date,
                }
            } else {
                e.into()
            }
        })
    }

    async fn save_picture(&self, picture: &Picture) -> Result<Picture> {
        let mut model = picture.clone().into_active_model().reset_all();
        model.updated_at = sea_orm::Set(chrono::Utc::now().fixed_offset());

        model.update(self.conn()).await.map_err(Into::into)
    }

    async fn find_picture_by_id(&self, id: Uuid) -> Result<Option<Picture>> {
        PictureEntity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    async fn find_picture(&self, source: Source, date: NaiveDate) -> Result<Option<Picture>> {
        PictureEntity::find()
            .filter(PictureColumn::Source.eq(source.as_str()))
            .filter(PictureColumn::Date.eq(date))
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    async fn list_pictures(
        &self,
        source: Option<Source>,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<Picture>, u64)> {
        let mut query = PictureEntity::find();
        if let Some(source) = source {
            query = query.filter(PictureColumn::Source.eq(source.as_str()));
        }

        let paginator = query
            .order_by_desc(PictureColumn::Date)
            .order_by_asc(PictureColumn::Source)
            .paginate(self.conn(), page_size);

        let total = paginator.num_items().await?;
        let pictures = paginator.fetch_page(page).await?;

        Ok((pictures, total))
    }

    async fn recent_pictures(&self, source: Source, limit: Option<u64>) -> Result<Vec<Picture>> {
        PictureEntity::find()
            .filter(PictureColumn::Source.eq(source.as_str()))
            .order_by_desc(PictureColumn::Date)
            .limit(limit)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    async fn delete_pictures(&self, ids: &[Uuid]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = PictureEntity::delete_many()
            .filter(PictureColumn::Id.is_in(ids.iter().copied()))
            .exec(self.conn())
            .await?;

        Ok(result.rows_affected)
    }

    async fn find_source_config(&self, source: Source) -> Result<Option<SourceConfig>> {
        SourceConfigEntity::find()
            .filter(SourceConfigColumn::Source.eq(source.as_str()))
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    async fn list_source_configs(&self) -> Result<Vec<SourceConfig>> {
        SourceConfigEntity::find()
            .order_by_asc(SourceConfigColumn::Source)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    async fn create_source_config(&self, source: Source, is_enabled: bool) -> Result<SourceConfig> {
        let model = SourceConfig::new(source, is_enabled)
            .into_active_model()
            .reset_all();

        model.insert(self.conn()).await.map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Validation {
                    message: format!("Configuration for {} already exists", source),
                    field: Some("source".into()),
                }
            } else {
                e.into()
            }
        })
    }

    async fn set_source_enabled(&self, source: Source, is_enabled: bool) -> Result<SourceConfig> {
        let existing = self
            .find_source_config(source)
            .await?
            .ok_or_else(|| AppError::NotFound {
                resource_type: "source configuration".into(),
                id: source.to_string(),
            })?;

        let mut model: SourceConfigActiveModel = existing.into();
        model.is_enabled = sea_orm::Set(is_enabled);
        model.updated_at = sea_orm::Set(chrono::Utc::now().fixed_offset());

        model.update(self.conn()).await.map_err(Into::into)
    }

    async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }
}
