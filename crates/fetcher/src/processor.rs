//! Fetch orchestrator
//!
//! Drives one adapter for one date (or a batch of dates), saves the draft
//! and walks the record through its processing stages:
//!
//! ```text
//! absent -> fetched -> metadata resolved -> [image downloaded] -> text processed
//! ```
//!
//! Every arrow is persisted on its own. A failed stage leaves the record at
//! the last completed state; only an enrichment failure is returned to the
//! caller.

use chrono::NaiveDate;
use potd_common::config::EnrichmentMode;
use potd_common::db::{ensure_source_enabled, models::Picture, PictureStore};
use potd_common::{metrics, PictureDraft, Source};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

use crate::enrichment::TextProcessor;
use crate::errors::{PipelineError, PipelineResult};
use crate::fetchers::{FetcherRegistry, PictureFetcher, MAX_BATCH_DAYS};
use crate::images::{image_path, ImageResolver};

/// Switches for one run
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchOptions {
    /// Overwrite an existing record and re-run enrichment
    pub force: bool,
    pub download_image: bool,
    pub process_text: bool,
}

/// What happened to one record
#[derive(Debug, Clone, Default)]
pub struct RecordReport {
    pub date: Option<NaiveDate>,
    pub title: String,
    pub created: bool,
    pub metadata_resolved: bool,
    pub image_downloaded: bool,
    pub text_processed: bool,
    pub error: Option<String>,
}

/// Summary of a run
#[derive(Debug, Clone)]
pub struct FetchReport {
    pub source: Source,
    pub records: Vec<RecordReport>,
}

impl FetchReport {
    pub fn created(&self) -> usize {
        self.records.iter().filter(|r| r.created).count()
    }

    pub fn failed(&self) -> usize {
        self.records.iter().filter(|r| r.error.is_some()).count()
    }
}

pub struct PictureProcessor {
    store: Arc<dyn PictureStore>,
    registry: FetcherRegistry,
    images: Arc<dyn ImageResolver>,
    text: Option<TextProcessor>,
    media_root: PathBuf,
    mode: EnrichmentMode,
}

impl PictureProcessor {
    pub fn new(
        store: Arc<dyn PictureStore>,
        registry: FetcherRegistry,
        images: Arc<dyn ImageResolver>,
        media_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            registry,
            images,
            text: None,
            media_root: media_root.into(),
            mode: EnrichmentMode::default(),
        }
    }

    pub fn with_text_processor(mut self, text: TextProcessor, mode: EnrichmentMode) -> Self {
        self.text = Some(text);
        self.mode = mode;
        self
    }

    /// Resolve the adapter for an identifier, rejecting unknown and
    /// disabled sources before any network call
    pub async fn enabled_fetcher(&self, raw_source: &str) -> PipelineResult<Arc<dyn PictureFetcher>> {
        let source: Source = raw_source.parse()?;
        ensure_source_enabled(self.store.as_ref(), source).await?;
        self.registry.get(source)
    }

    /// Single date, or every available date when `fetch_all` is set and the
    /// source supports it
    pub async fn run(
        &self,
        raw_source: &str,
        date: NaiveDate,
        fetch_all: bool,
        options: FetchOptions,
    ) -> PipelineResult<FetchReport> {
        let fetcher = self.enabled_fetcher(raw_source).await?;

        if fetch_all {
            if fetcher.supports_batch() {
                return self.fetch_batch(fetcher.as_ref(), MAX_BATCH_DAYS, options).await;
            }
            warn!(
                source = %fetcher.source(),
                "Source does not support fetching all pictures, fetching a single date"
            );
        }

        let record = self.fetch_date(fetcher.as_ref(), date, options).await?;
        Ok(FetchReport {
            source: fetcher.source(),
            records: vec![record],
        })
    }

    #[instrument(skip(self, fetcher, options), fields(source = %fetcher.source()))]
    async fn fetch_date(
        &self,
        fetcher: &dyn PictureFetcher,
        date: NaiveDate,
        options: FetchOptions,
    ) -> PipelineResult<RecordReport> {
        let source = fetcher.source();
        info!(date = %date, "Fetching picture");

        let start = Instant::now();
        let result = fetcher.fetch(date).await;
        metrics::record_fetch(source.as_str(), start.elapsed().as_secs_f64(), result.is_ok());
        let draft = result?;

        let (picture, created) = self.save_picture(source, &draft, options.force).await?;
        if created {
            info!(title = %picture.title, "Created new picture");
        } else {
            info!(title = %picture.title, "Picture already exists");
        }

        self.process_record(source, picture, created, options).await
    }

    /// Apply the full record sequence to every draft the source still
    /// serves. One record's failure does not stop the others.
    #[instrument(skip(self, fetcher, options), fields(source = %fetcher.source()))]
    async fn fetch_batch(
        &self,
        fetcher: &dyn PictureFetcher,
        max_days: u32,
        options: FetchOptions,
    ) -> PipelineResult<FetchReport> {
        let source = fetcher.source();

        let start = Instant::now();
        let result = fetcher.fetch_all_available(max_days).await;
        metrics::record_fetch(source.as_str(), start.elapsed().as_secs_f64(), result.is_ok());
        let drafts = result?;

        info!(count = drafts.len(), "Found pictures");

        let mut records = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let outcome = match self.save_picture(source, &draft, options.force).await {
                Ok((picture, created)) => self.process_record(source, picture, created, options).await,
                Err(e) => Err(e),
            };

            match outcome {
                Ok(record) => records.push(record),
                Err(e) => {
                    error!(date = %draft.date, error = %e, "Failed to process picture");
                    records.push(RecordReport {
                        date: Some(draft.date),
                        title: draft.title.clone(),
                        error: Some(e.to_string()),
                        ..RecordReport::default()
                    });
                }
            }
        }

        Ok(FetchReport { source, records })
    }

    /// Get-or-create, or with `force` an upsert that re-arms enrichment
    pub async fn save_picture(
        &self,
        source: Source,
        draft: &PictureDraft,
        force: bool,
    ) -> PipelineResult<(Picture, bool)> {
        let saved = if force {
            self.store.upsert_picture(source, draft).await?
        } else {
            self.store.get_or_create_picture(source, draft).await?
        };
        Ok(saved)
    }

    async fn process_record(
        &self,
        source: Source,
        mut picture: Picture,
        created: bool,
        options: FetchOptions,
    ) -> PipelineResult<RecordReport> {
        let mut report = RecordReport {
            date: Some(picture.date),
            title: picture.title.clone(),
            created,
            ..RecordReport::default()
        };

        if picture.is_image() {
            report.metadata_resolved = self.resolve_metadata(&mut picture).await;
        }

        if options.download_image && picture.is_image() {
            match self.download_image(source, &mut picture).await {
                Ok(downloaded) => report.image_downloaded = downloaded,
                Err(e) => {
                    error!(error = %e, "Image download failed");
                    picture.processing_error = Some(format!("Image download error: {}", e));
                    match self.store.save_picture(&picture).await {
                        Ok(saved) => picture = saved,
                        Err(e) => error!(error = %e, "Failed to record image download error"),
                    }
                }
            }
        }

        if options.process_text && (!picture.is_processed || options.force) {
            self.enrich(source, &mut picture, options.force).await?;
            report.text_processed = true;
        } else if options.process_text {
            info!("Picture already processed, use --force to reprocess");
        }

        Ok(report)
    }

    /// Probe and persist dimensions and size. Failures are logged only.
    async fn resolve_metadata(&self, picture: &mut Picture) -> bool {
        let Some(url) = picture.best_remote_url().map(str::to_string) else {
            warn!("No image URL available");
            return false;
        };

        let Some((width, height, size)) = self.images.metadata(&url).await.complete() else {
            warn!(url = %url, "Could not retrieve image metadata");
            return false;
        };

        picture.image_width = i32::try_from(width).ok();
        picture.image_height = i32::try_from(height).ok();
        picture.image_size_bytes = i64::try_from(size).ok();

        match self.store.save_picture(picture).await {
            Ok(saved) => {
                *picture = saved;
                info!(
                    resolution = ?picture.image_resolution(),
                    size_mb = ?picture.image_size_mb(),
                    "Image metadata retrieved"
                );
                true
            }
            Err(e) => {
                error!(error = %e, "Failed to save image metadata");
                false
            }
        }
    }

    async fn download_image(&self, source: Source, picture: &mut Picture) -> PipelineResult<bool> {
        let Some(url) = picture.best_remote_url().map(str::to_string) else {
            warn!("No image URL available");
            return Ok(false);
        };

        let relative = image_path(source.as_str(), picture.date, None);
        let full = self.media_root.join(&relative);

        let result = self.images.download(&url, Some(&full)).await;
        metrics::record_image_download(source.as_str(), result.is_ok());
        let downloaded = result?;

        picture.local_image_path = Some(relative.to_string_lossy().replace('\\', "/"));
        picture.image_width = downloaded.width.and_then(|w| i32::try_from(w).ok());
        picture.image_height = downloaded.height.and_then(|h| i32::try_from(h).ok());
        picture.image_size_bytes = i64::try_from(downloaded.size_bytes).ok();
        *picture = self.store.save_picture(picture).await?;

        info!(path = %full.display(), "Image downloaded");
        Ok(true)
    }

    /// Simplify, persist, link, persist. A stored simplified text is reused
    /// unless `force` is set, so a failed second stage resumes cheaply.
    async fn enrich(&self, source: Source, picture: &mut Picture, force: bool) -> PipelineResult<()> {
        let result = self.run_enrichment(source, picture, force).await;

        if let Err(e) = &result {
            error!(error = %e, "Text processing failed");
            picture.processing_error = Some(e.to_string());
            match self.store.save_picture(picture).await {
                Ok(saved) => *picture = saved,
                Err(save_err) => error!(error = %save_err, "Failed to record text processing error"),
            }
        }
        result
    }

    async fn run_enrichment(
        &self,
        source: Source,
        picture: &mut Picture,
        force: bool,
    ) -> PipelineResult<()> {
        let text = self
            .text
            .as_ref()
            .ok_or_else(|| PipelineError::Enrichment("Language model is not configured".to_string()))?;
        let context = source.enrichment_context();

        let simplified = match picture.simplified_explanation.clone().filter(|s| !s.is_empty()) {
            Some(existing) if !force => {
                info!("Resuming from stored simplified text");
                existing
            }
            _ => {
                let simplified = text.simplify_text(&picture.original_explanation, context).await?;
                picture.simplified_explanation = Some(simplified.clone());
                *picture = self.store.save_picture(picture).await?;
                info!("Text simplified");
                simplified
            }
        };

        let processed = text.link_stage(self.mode, &simplified, context).await?;
        picture.processed_explanation = Some(processed);
        picture.is_processed = true;
        picture.processing_error = None;
        *picture = self.store.save_picture(picture).await?;
        info!("Wikipedia links added");

        Ok(())
    }
}
