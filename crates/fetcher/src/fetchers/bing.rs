//! Bing homepage image via the HPImageArchive feed
//!
//! The feed is indexed by "days back from today", not by date, and keeps
//! roughly fifteen days of history.

use async_trait::async_trait;
use chrono::NaiveDate;
use potd_common::config::SourcesConfig;
use potd_common::source::today;
use potd_common::{MediaType, PictureDraft, Source};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use super::{get_text, parse_json, PictureFetcher, MAX_BATCH_DAYS};
use crate::errors::{PipelineError, PipelineResult};

const DEFAULT_TITLE: &str = "Bing Picture of the Day";
const NO_DESCRIPTION: &str = "No description available.";
const MIN_HISTORY: u32 = 8;

pub struct BingFetcher {
    client: reqwest::Client,
    base_url: String,
    market: String,
}

#[derive(Debug, Deserialize)]
struct Archive {
    #[serde(default)]
    images: Vec<BingImage>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct BingImage {
    #[serde(default)]
    startdate: Option<String>,
    #[serde(default)]
    url: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    copyright: Option<String>,
}

impl BingImage {
    fn start_date(&self) -> Option<NaiveDate> {
        self.startdate
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y%m%d").ok())
    }
}

/// Days between `target` and `today`, rejecting future dates
pub(crate) fn days_offset(today: NaiveDate, target: NaiveDate) -> PipelineResult<i64> {
    let offset = (today - target).num_days();
    if offset < 0 {
        return Err(PipelineError::FutureDate {
            source_id: Source::Bing.as_str().to_string(),
            date: target,
        });
    }
    Ok(offset)
}

/// How many archive entries to request so `offset` is plausibly covered
pub(crate) fn history_size(offset: i64) -> u32 {
    if offset <= 7 {
        MIN_HISTORY
    } else {
        (offset + 1).min(MAX_BATCH_DAYS as i64) as u32
    }
}

/// Exact start-date match, else the entry at `offset`, else the newest.
/// The last two branches can return a picture for a different day.
pub(crate) fn select_image(
    images: &[BingImage],
    target: NaiveDate,
    offset: i64,
) -> Option<&BingImage> {
    if let Some(exact) = images.iter().find(|i| i.start_date() == Some(target)) {
        return Some(exact);
    }

    if offset == 0 {
        return images.first();
    }

    images.get(offset as usize).or_else(|| images.first())
}

/// Swap a `_{w}x{h}.jpg` resolution token for `_UHD.jpg`. URLs without a
/// token come back unchanged.
pub(crate) fn uhd_url(image_url: &str) -> String {
    regex!(r"_\d+x\d+\.jpg")
        .replace_all(image_url, "_UHD.jpg")
        .into_owned()
}

fn parse_archive(body: &str) -> PipelineResult<Vec<BingImage>> {
    let archive: Archive = parse_json(Source::Bing, body)?;
    Ok(archive.images)
}

impl BingFetcher {
    pub fn new(client: reqwest::Client, config: &SourcesConfig) -> Self {
        Self {
            client,
            base_url: config.bing_base_url.trim_end_matches('/').to_string(),
            market: config.bing_market.clone(),
        }
    }

    async fn fetch_archive(&self, count: u32) -> PipelineResult<Vec<BingImage>> {
        let url = format!("{}/HPImageArchive.aspx", self.base_url);
        let count = count.to_string();
        let body = get_text(
            &self.client,
            Source::Bing,
            &url,
            &[
                ("format", "js"),
                ("idx", "0"),
                ("n", count.as_str()),
                ("mkt", self.market.as_str()),
            ],
        )
        .await?;

        parse_archive(&body)
    }

    fn absolute_url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            path.to_string()
        }
    }

    /// Map one archive entry onto a draft dated `date`
    pub(crate) fn to_draft(&self, image: &BingImage, date: NaiveDate) -> PictureDraft {
        let image_url = self.absolute_url(&image.url);
        let copyright = image.copyright.clone().filter(|c| !c.is_empty());
        let title = image
            .title
            .clone()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());

        let explanation = copyright
            .clone()
            .or_else(|| image.title.clone().filter(|t| !t.is_empty()))
            .unwrap_or_else(|| NO_DESCRIPTION.to_string());

        PictureDraft {
            title,
            date,
            explanation,
            hd_image_url: Some(uhd_url(&image_url)),
            thumbnail_url: Some(image_url.clone()),
            image_url,
            media_type: MediaType::Image,
            copyright,
            source_url: Some(self.source_url(date)),
        }
    }

    pub(crate) fn select_draft(
        &self,
        images: &[BingImage],
        target: NaiveDate,
        offset: i64,
    ) -> PipelineResult<PictureDraft> {
        let image = select_image(images, target, offset)
            .ok_or_else(|| PipelineError::no_content(Source::Bing, target))?;

        if image.start_date() != Some(target) {
            warn!(
                date = %target,
                start_date = ?image.startdate,
                "No exact Bing match, using positional fallback"
            );
        }

        Ok(self.to_draft(image, target))
    }

    pub(crate) fn drafts_from(&self, images: &[BingImage]) -> Vec<PictureDraft> {
        images
            .iter()
            .filter_map(|image| match image.start_date() {
                Some(date) => Some(self.to_draft(image, date)),
                None => {
                    debug!(start_date = ?image.startdate, "Skipping entry with unparseable date");
                    None
                }
            })
            .collect()
    }
}

#[async_trait]
impl PictureFetcher for BingFetcher {
    fn source(&self) -> Source {
        Source::Bing
    }

    #[instrument(skip(self), fields(source = "bing"))]
    async fn fetch(&self, date: NaiveDate) -> PipelineResult<PictureDraft> {
        let offset = days_offset(today(), date)?;
        let images = self.fetch_archive(history_size(offset)).await?;
        self.select_draft(&images, date, offset)
    }

    fn source_url(&self, _date: NaiveDate) -> String {
        "https://www.bing.com".to_string()
    }

    fn supports_batch(&self) -> bool {
        true
    }

    #[instrument(skip(self), fields(source = "bing"))]
    async fn fetch_all_available(&self, max_days: u32) -> PipelineResult<Vec<PictureDraft>> {
        let images = self.fetch_archive(max_days.clamp(1, MAX_BATCH_DAYS)).await?;
        Ok(self.drafts_from(&images))
    }
}
