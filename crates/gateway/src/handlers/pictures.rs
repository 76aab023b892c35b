//! Picture query handlers
//!
//! Every source-scoped route validates the source (known and enabled)
//! before touching picture rows.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use potd_common::{
    db::{enabled_sources, models::Picture, validate_source, PictureStore},
    errors::{AppError, Result},
    source::{parse_iso_date, today},
    Source,
};

/// Bing rotates daily, so the random pool takes several of its pictures
const BING_POOL_SIZE: u64 = 8;

/// List item shape
#[derive(Debug, Serialize)]
pub struct PictureSummary {
    pub id: Uuid,
    pub source: String,
    pub source_display: String,
    pub date: NaiveDate,
    pub title: String,
    pub display_explanation: String,
    pub display_image_url: String,
    pub media_type: String,
    pub copyright: Option<String>,
    pub source_url: Option<String>,
    pub is_processed: bool,
    pub image_width: Option<i32>,
    pub image_height: Option<i32>,
    pub image_size_mb: Option<f64>,
    pub image_resolution: Option<String>,
    pub created_at: DateTime<FixedOffset>,
}

impl From<&Picture> for PictureSummary {
    fn from(p: &Picture) -> Self {
        Self {
            id: p.id,
            source: p.source.clone(),
            source_display: source_display(p),
            date: p.date,
            title: p.title.clone(),
            display_explanation: p.display_explanation().to_string(),
            display_image_url: p.display_image_url().to_string(),
            media_type: p.media_type.clone(),
            copyright: p.copyright.clone(),
            source_url: p.source_url.clone(),
            is_processed: p.is_processed,
            image_width: p.image_width,
            image_height: p.image_height,
            image_size_mb: p.image_size_mb(),
            image_resolution: p.image_resolution(),
            created_at: p.created_at,
        }
    }
}

/// Every stored column plus the derived fields
#[derive(Debug, Serialize)]
pub struct PictureDetail {
    #[serde(flatten)]
    pub picture: Picture,
    pub source_display: String,
    pub display_explanation: String,
    pub display_image_url: String,
    pub image_size_mb: Option<f64>,
    pub image_resolution: Option<String>,
}

impl From<Picture> for PictureDetail {
    fn from(picture: Picture) -> Self {
        Self {
            source_display: source_display(&picture),
            display_explanation: picture.display_explanation().to_string(),
            display_image_url: picture.display_image_url().to_string(),
            image_size_mb: picture.image_size_mb(),
            image_resolution: picture.image_resolution(),
            picture,
        }
    }
}

fn source_display(picture: &Picture) -> String {
    picture
        .picture_source()
        .map(|s| s.label().to_string())
        .unwrap_or_else(|| picture.source.clone())
}

fn summaries(pictures: &[Picture]) -> Vec<PictureSummary> {
    pictures.iter().map(PictureSummary::from).collect()
}

#[derive(Debug, Deserialize, Validate)]
pub struct ListQuery {
    #[serde(default)]
    pub source: Option<String>,

    #[validate(range(min = 1))]
    #[serde(default = "default_page")]
    pub page: u64,

    #[validate(range(min = 1, max = 100))]
    #[serde(default = "default_page_size")]
    pub page_size: u64,
}

fn default_page() -> u64 {
    1
}

fn default_page_size() -> u64 {
    20
}

#[derive(Debug, Serialize)]
pub struct PaginatedResponse {
    pub count: u64,
    pub page: u64,
    pub page_size: u64,
    pub total_pages: u64,
    pub results: Vec<PictureSummary>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct SourceEntry {
    pub value: String,
    pub label: String,
    pub enabled: bool,
}

/// Today's picture, falling back to yesterday's
async fn today_or_yesterday(store: &dyn PictureStore, source: Source) -> Result<Option<Picture>> {
    let today = today();
    if let Some(picture) = store.find_picture(source, today).await? {
        return Ok(Some(picture));
    }
    store.find_picture(source, today - Duration::days(1)).await
}

/// GET /pictures
pub async fn list_pictures(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<PaginatedResponse>> {
    query.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let source = match query.source.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(validate_source(state.store.as_ref(), raw).await?),
        None => None,
    };

    let (pictures, count) = state
        .store
        .list_pictures(source, query.page - 1, query.page_size)
        .await?;

    Ok(Json(PaginatedResponse {
        count,
        page: query.page,
        page_size: query.page_size,
        total_pages: count.div_ceil(query.page_size),
        results: summaries(&pictures),
    }))
}

/// GET /pictures/{id}
pub async fn get_picture(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PictureDetail>> {
    let picture = state
        .store
        .find_picture_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound {
            resource_type: "picture".into(),
            id: id.to_string(),
        })?;

    Ok(Json(picture.into()))
}

/// GET /pictures/today/{source}
pub async fn today_picture(
    State(state): State<AppState>,
    Path(source): Path<String>,
) -> Result<Json<PictureDetail>> {
    let source = validate_source(state.store.as_ref(), &source).await?;

    let picture = today_or_yesterday(state.store.as_ref(), source)
        .await?
        .ok_or_else(|| AppError::PictureNotFound {
            message: format!("No {} picture available. Please run the fetch command.", source),
        })?;

    Ok(Json(picture.into()))
}

/// GET /pictures/date/{date}/{source}
pub async fn picture_by_date(
    State(state): State<AppState>,
    Path((date, source)): Path<(String, String)>,
) -> Result<Json<PictureSummary>> {
    let source = validate_source(state.store.as_ref(), &source).await?;
    let parsed = parse_iso_date(&date)?;

    let picture = state
        .store
        .find_picture(source, parsed)
        .await?
        .ok_or_else(|| AppError::PictureNotFound {
            message: format!("No {} picture found for {}", source, date),
        })?;

    Ok(Json(PictureSummary::from(&picture)))
}

/// GET /pictures/latest/{source}
pub async fn latest_picture(
    State(state): State<AppState>,
    Path(source): Path<String>,
) -> Result<Json<PictureSummary>> {
    let source = validate_source(state.store.as_ref(), &source).await?;

    let picture = state
        .store
        .latest_picture(source)
        .await?
        .ok_or_else(|| AppError::PictureNotFound {
            message: format!("No {} picture available", source),
        })?;

    Ok(Json(PictureSummary::from(&picture)))
}

/// GET /pictures/sources
///
/// Enabled sources only. A source without a configuration row counts as
/// enabled and is labelled with its built-in name.
pub async fn list_sources(State(state): State<AppState>) -> Result<Json<Vec<SourceEntry>>> {
    let configs = state.store.list_source_configs().await?;

    let entries = Source::ALL
        .into_iter()
        .filter_map(|source| {
            let config = configs.iter().find(|c| c.source == source.as_str());
            let enabled = config.map(|c| c.is_enabled).unwrap_or(true);
            enabled.then(|| SourceEntry {
                value: source.as_str().to_string(),
                label: config
                    .map(|c| c.label())
                    .unwrap_or_else(|| source.label().to_string()),
                enabled,
            })
        })
        .collect();

    Ok(Json(entries))
}

/// GET /pictures/all_recent
///
/// Pool for random selection: today-or-yesterday for each non-Bing source
/// plus the most recent Bing pictures.
pub async fn all_recent(State(state): State<AppState>) -> Result<Json<Vec<PictureSummary>>> {
    let store = state.store.as_ref();
    let enabled = enabled_sources(store).await?;
    if enabled.is_empty() {
        return Err(AppError::NoSourcesEnabled);
    }

    let mut pictures = Vec::new();
    for &source in enabled.iter().filter(|s| **s != Source::Bing) {
        if let Some(picture) = today_or_yesterday(store, source).await? {
            pictures.push(picture);
        }
    }

    if enabled.contains(&Source::Bing) {
        pictures.extend(store.recent_pictures(Source::Bing, Some(BING_POOL_SIZE)).await?);
    }

    Ok(Json(summaries(&pictures)))
}

/// GET /pictures/list/{source}
pub async fn list_by_source(
    State(state): State<AppState>,
    Path(source): Path<String>,
) -> Result<Json<Vec<PictureSummary>>> {
    let source = validate_source(state.store.as_ref(), &source).await?;
    let pictures = state.store.recent_pictures(source, None).await?;
    Ok(Json(summaries(&pictures)))
}
