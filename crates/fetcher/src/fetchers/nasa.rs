//! NASA Astronomy Picture of the Day

use async_trait::async_trait;
use chrono::NaiveDate;
use potd_common::config::SourcesConfig;
use potd_common::{MediaType, PictureDraft, Source};
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{get_text, parse_json, PictureFetcher};
use crate::errors::PipelineResult;

pub struct NasaFetcher {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct ApodResponse {
    title: String,
    #[serde(default)]
    date: Option<String>,
    explanation: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    hdurl: Option<String>,
    #[serde(default)]
    thumbnail_url: Option<String>,
    #[serde(default)]
    media_type: Option<String>,
    #[serde(default)]
    copyright: Option<String>,
}

impl NasaFetcher {
    pub fn new(client: reqwest::Client, config: &SourcesConfig) -> Self {
        Self {
            client,
            api_key: config.nasa_api_key.clone(),
            endpoint: format!(
                "{}/planetary/apod",
                config.nasa_base_url.trim_end_matches('/')
            ),
        }
    }

    /// Map one APOD JSON payload onto a draft
    pub fn parse_response(&self, body: &str, target: NaiveDate) -> PipelineResult<PictureDraft> {
        let data: ApodResponse = parse_json(Source::Apod, body)?;

        let date = data
            .date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .unwrap_or(target);

        Ok(PictureDraft {
            title: data.title,
            date,
            explanation: data.explanation,
            image_url: data.url.unwrap_or_default(),
            hd_image_url: data.hdurl,
            thumbnail_url: data.thumbnail_url,
            media_type: data
                .media_type
                .as_deref()
                .map(MediaType::from)
                .unwrap_or_default(),
            copyright: data.copyright.map(|c| c.trim().to_string()),
            source_url: Some(self.source_url(target)),
        })
    }
}

#[async_trait]
impl PictureFetcher for NasaFetcher {
    fn source(&self) -> Source {
        Source::Apod
    }

    #[instrument(skip(self), fields(source = "apod"))]
    async fn fetch(&self, date: NaiveDate) -> PipelineResult<PictureDraft> {
        let iso = date.format("%Y-%m-%d").to_string();
        let body = get_text(
            &self.client,
            Source::Apod,
            &self.endpoint,
            &[("api_key", self.api_key.as_str()), ("date", iso.as_str())],
        )
        .await?;

        debug!(bytes = body.len(), "APOD payload received");
        self.parse_response(&body, date)
    }

    fn source_url(&self, date: NaiveDate) -> String {
        format!("https://apod.nasa.gov/apod/ap{}.html", date.format("%y%m%d"))
    }
}
