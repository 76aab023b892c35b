//! Wikipedia Picture of the Day via the MediaWiki action API

use async_trait::async_trait;
use chrono::NaiveDate;
use potd_common::config::SourcesConfig;
use potd_common::{MediaType, PictureDraft, Source};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use super::wikitext::{self, Extracted};
use super::{get_text, parse_json, PictureFetcher};
use crate::errors::{PipelineError, PipelineResult};

const DEFAULT_TITLE: &str = "Wikipedia Picture of the Day";
const NO_DESCRIPTION: &str = "No description available.";

pub struct WikipediaFetcher {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    query: Option<Query>,
}

#[derive(Debug, Deserialize)]
struct Query {
    #[serde(default)]
    pages: Vec<Page>,
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    images: Vec<Titled>,
    #[serde(default)]
    imageinfo: Vec<ImageInfo>,
    #[serde(default)]
    revisions: Vec<Revision>,
}

#[derive(Debug, Deserialize)]
struct Titled {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ImageInfo {
    url: String,
}

#[derive(Debug, Deserialize)]
struct Revision {
    #[serde(default)]
    slots: Option<Slots>,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Slots {
    main: Slot,
}

#[derive(Debug, Deserialize)]
struct Slot {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ParseResponse {
    parse: Option<Parsed>,
}

#[derive(Debug, Deserialize)]
struct Parsed {
    text: ParsedText,
}

#[derive(Debug, Deserialize)]
struct ParsedText {
    #[serde(rename = "*")]
    html: String,
}

/// Where the caption and title are looked for, in order
#[derive(Debug, Clone, Copy)]
enum CaptionStrategy {
    Wikitext,
    RenderedHtml,
}

const CAPTION_STRATEGIES: [CaptionStrategy; 2] =
    [CaptionStrategy::Wikitext, CaptionStrategy::RenderedHtml];

fn first_page(response: QueryResponse) -> Option<Page> {
    response.query.and_then(|q| q.pages.into_iter().next())
}

/// Filename of the image embedded in `Template:POTD protected/{date}`
pub(crate) fn parse_image_filename(body: &str, date: NaiveDate) -> PipelineResult<String> {
    let response: QueryResponse = parse_json(Source::Wikipedia, body)?;
    first_page(response)
        .and_then(|p| p.images.into_iter().next())
        .map(|i| i.title)
        .ok_or_else(|| PipelineError::no_content(Source::Wikipedia, date))
}

/// Full resolution URL from an imageinfo lookup
pub(crate) fn parse_image_url(body: &str, filename: &str) -> PipelineResult<String> {
    let response: QueryResponse = parse_json(Source::Wikipedia, body)?;
    first_page(response)
        .and_then(|p| p.imageinfo.into_iter().next())
        .map(|i| i.url)
        .ok_or_else(|| {
            PipelineError::upstream(
                Source::Wikipedia,
                format!("Could not fetch image URL for {}", filename),
            )
        })
}

/// Main-slot wikitext of the first revision, if any
pub(crate) fn parse_revision_content(body: &str) -> Option<String> {
    let response: QueryResponse = serde_json::from_str(body).ok()?;
    let revision = first_page(response)?.revisions.into_iter().next()?;

    revision
        .slots
        .and_then(|s| s.main.content)
        .filter(|c| !c.is_empty())
        .or(revision.content)
        .filter(|c| !c.is_empty())
}

pub(crate) fn parse_rendered_html(body: &str) -> Option<String> {
    let response: ParseResponse = serde_json::from_str(body).ok()?;
    response.parse.map(|p| p.text.html)
}

fn source_page_url(date: NaiveDate) -> String {
    format!(
        "https://en.wikipedia.org/wiki/Wikipedia:Picture_of_the_day/{}",
        date.format("%B_%d,_%Y")
    )
}

/// Assemble the draft, falling back to the filename for the title
pub(crate) fn build_draft(
    date: NaiveDate,
    filename: &str,
    image_url: String,
    extracted: Option<Extracted>,
) -> PictureDraft {
    let Extracted { explanation, title } = extracted.unwrap_or_default();

    let title = title
        .or_else(|| Some(wikitext::title_from_filename(filename)))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());

    PictureDraft {
        title,
        date,
        explanation: explanation.unwrap_or_else(|| NO_DESCRIPTION.to_string()),
        hd_image_url: Some(image_url.clone()),
        thumbnail_url: Some(image_url.clone()),
        image_url,
        media_type: MediaType::Image,
        copyright: None,
        source_url: Some(source_page_url(date)),
    }
}

impl WikipediaFetcher {
    pub fn new(client: reqwest::Client, config: &SourcesConfig) -> Self {
        Self {
            client,
            endpoint: config.wikipedia_endpoint.clone(),
        }
    }

    async fn query(&self, params: &[(&str, &str)]) -> PipelineResult<String> {
        get_text(&self.client, Source::Wikipedia, &self.endpoint, params).await
    }

    async fn fetch_image_url(&self, filename: &str) -> PipelineResult<String> {
        let body = self
            .query(&[
                ("action", "query"),
                ("format", "json"),
                ("formatversion", "2"),
                ("prop", "imageinfo"),
                ("iiprop", "url"),
                ("titles", filename),
            ])
            .await?;
        parse_image_url(&body, filename)
    }

    async fn run_strategy(&self, strategy: CaptionStrategy, template: &str) -> Option<Extracted> {
        let result = match strategy {
            CaptionStrategy::Wikitext => self
                .query(&[
                    ("action", "query"),
                    ("format", "json"),
                    ("formatversion", "2"),
                    ("prop", "revisions"),
                    ("rvprop", "content"),
                    ("rvslots", "main"),
                    ("titles", template),
                ])
                .await
                .map(|body| parse_revision_content(&body).and_then(|w| wikitext::from_wikitext(&w))),
            CaptionStrategy::RenderedHtml => self
                .query(&[
                    ("action", "parse"),
                    ("format", "json"),
                    ("page", template),
                    ("prop", "text"),
                    ("section", "0"),
                ])
                .await
                .map(|body| parse_rendered_html(&body).and_then(|h| wikitext::from_html(&h))),
        };

        match result {
            Ok(found) => found,
            Err(e) => {
                warn!(strategy = ?strategy, error = %e, "Caption lookup failed");
                None
            }
        }
    }

    /// Best-effort caption and title from `Template:POTD/{date}`
    async fn fetch_description(&self, template: &str) -> Option<Extracted> {
        for strategy in CAPTION_STRATEGIES {
            if let Some(found) = self.run_strategy(strategy, template).await {
                debug!(strategy = ?strategy, "Caption recovered");
                return Some(found);
            }
        }
        None
    }
}

#[async_trait]
impl PictureFetcher for WikipediaFetcher {
    fn source(&self) -> Source {
        Source::Wikipedia
    }

    #[instrument(skip(self), fields(source = "wikipedia"))]
    async fn fetch(&self, date: NaiveDate) -> PipelineResult<PictureDraft> {
        let iso = date.format("%Y-%m-%d").to_string();
        let protected = format!("Template:POTD protected/{}", iso);
        let template = format!("Template:POTD/{}", iso);

        let body = self
            .query(&[
                ("action", "query"),
                ("format", "json"),
                ("formatversion", "2"),
                ("prop", "images"),
                ("titles", protected.as_str()),
            ])
            .await?;
        let filename = parse_image_filename(&body, date)?;

        let image_url = self.fetch_image_url(&filename).await?;
        let extracted = self.fetch_description(&template).await;

        Ok(build_draft(date, &filename, image_url, extracted))
    }

    fn source_url(&self, date: NaiveDate) -> String {
        source_page_url(date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jan15() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    }

    #[test]
    fn test_parse_image_filename() {
        let body = r#"{"batchcomplete":true,"query":{"pages":[{"ns":10,"title":"Template:POTD protected/2024-01-15","images":[{"ns":6,"title":"File:Lake_Louise.jpg"}]}]}}"#;
        assert_eq!(
            parse_image_filename(body, jan15()).unwrap(),
            "File:Lake_Louise.jpg"
        );
    }

    #[test]
    fn test_template_without_image_is_no_content() {
        let body = r#"{"query":{"pages":[{"ns":10,"title":"Template:POTD protected/2024-01-15","missing":true}]}}"#;
        let err = parse_image_filename(body, jan15()).unwrap_err();
        assert!(matches!(err, PipelineError::NoContent { .. }));
    }

    #[test]
    fn test_parse_image_url() {
        let body = r#"{"query":{"pages":[{"title":"File:Lake_Louise.jpg","imageinfo":[{"url":"https://upload.wikimedia.org/a/ab/Lake_Louise.jpg","descriptionurl":"x"}]}]}}"#;
        assert_eq!(
            parse_image_url(body, "File:Lake_Louise.jpg").unwrap(),
            "https://upload.wikimedia.org/a/ab/Lake_Louise.jpg"
        );

        let err = parse_image_url(r#"{"query":{"pages":[{}]}}"#, "File:x.jpg").unwrap_err();
        assert!(matches!(err, PipelineError::Upstream { .. }));
    }

    #[test]
    fn test_parse_revision_content_prefers_main_slot() {
        let body = r#"{"query":{"pages":[{"revisions":[{"slots":{"main":{"contentmodel":"wikitext","content":"|title=[[Test Title]]|caption=Test caption"}}}]}]}}"#;
        let content = parse_revision_content(body).unwrap();
        let extracted = wikitext::from_wikitext(&content).unwrap();
        assert_eq!(extracted.title.as_deref(), Some("Test Title"));
        assert_eq!(extracted.explanation.as_deref(), Some("Test caption"));

        let legacy = r#"{"query":{"pages":[{"revisions":[{"content":"|caption=Old"}]}]}}"#;
        assert_eq!(parse_revision_content(legacy).as_deref(), Some("|caption=Old"));

        assert_eq!(parse_revision_content(r#"{"query":{"pages":[{}]}}"#), None);
    }

    #[test]
    fn test_parse_rendered_html() {
        let body = r#"{"parse":{"title":"Template:POTD/2024-01-15","text":{"*":"<div>hi</div>"}}}"#;
        assert_eq!(parse_rendered_html(body).as_deref(), Some("<div>hi</div>"));
        assert_eq!(parse_rendered_html(r#"{"error":{"code":"missingtitle"}}"#), None);
    }

    #[test]
    fn test_build_draft_with_caption() {
        let extracted = Extracted {
            explanation: Some("A lake.".into()),
            title: Some("Lake Louise".into()),
        };
        let draft = build_draft(
            jan15(),
            "File:Whatever.jpg",
            "https://upload/x.jpg".into(),
            Some(extracted),
        );

        assert_eq!(draft.title, "Lake Louise");
        assert_eq!(draft.explanation, "A lake.");
        assert_eq!(draft.hd_image_url.as_deref(), Some("https://upload/x.jpg"));
        assert_eq!(draft.thumbnail_url.as_deref(), Some("https://upload/x.jpg"));
        assert_eq!(
            draft.source_url.as_deref(),
            Some("https://en.wikipedia.org/wiki/Wikipedia:Picture_of_the_day/January_15,_2024")
        );
    }

    #[test]
    fn test_build_draft_falls_back_to_filename() {
        let draft = build_draft(
            jan15(),
            "File:Lake_Louise_2024-01-15_ABC.jpg",
            "https://upload/x.jpg".into(),
            None,
        );
        assert_eq!(draft.title, "Lake Louise");
        assert_eq!(draft.explanation, "No description available.");

        let draft = build_draft(jan15(), "File:2024-01-15.jpg", String::new(), None);
        assert_eq!(draft.title, "Wikipedia Picture of the Day");
        assert_eq!(draft.image_url, "");
    }
}
