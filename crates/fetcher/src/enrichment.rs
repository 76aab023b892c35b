//! Language-model text enrichment
//!
//! Two stages: simplify the original explanation, then embed Wikipedia
//! links. In validated mode the second stage asks for a summary of at most
//! `MAX_WORDS` words with exactly `REQUIRED_LINKS` links and repairs the
//! output when the model overshoots.

use potd_common::config::EnrichmentMode;
use potd_common::llm::{ChatModel, ChatPrompt};
use potd_common::metrics;
use potd_common::source::EnrichmentContext;
use regex_lite::Regex;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::errors::{PipelineError, PipelineResult};

pub const MAX_WORDS: usize = 300;
pub const REQUIRED_LINKS: usize = 3;

fn link_pattern() -> &'static Regex {
    regex!(r#"(?is)<a\s+href=["']https?://en\.wikipedia\.org/wiki/[^"']+["'][^>]*>.*?</a>"#)
}

fn strip_tags(text: &str) -> String {
    regex!(r"<[^>]+>").replace_all(text, "").into_owned()
}

fn word_count(text: &str) -> usize {
    strip_tags(text).split_whitespace().count()
}

/// Byte offsets where each Wikipedia link ends
fn link_ends(text: &str) -> Vec<usize> {
    link_pattern().find_iter(text).map(|m| m.end()).collect()
}

/// Remove a surrounding ```html fence
pub fn strip_code_fences(text: &str) -> String {
    let text = text.trim();
    let text = regex!(r"^```(?:html)?[ \t]*\n").replace(text, "");
    let text = regex!(r"\n```$").replace(&text, "");
    text.trim().to_string()
}

/// Enforce the word budget and link count on model output.
///
/// Valid input is returned unchanged. With at least three links the cut is
/// never placed before the end of the third link, so the result can stay
/// over budget. With fewer than three links the text is returned as is,
/// unless it is too long, in which case it is cut to `MAX_WORDS` plain words.
pub fn validate_processed_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut text = text.to_string();

    if word_count(&text) > MAX_WORDS {
        let ends = link_ends(&text);

        if ends.len() >= REQUIRED_LINKS {
            let third_end = ends[REQUIRED_LINKS - 1];
            text.truncate(third_end);

            let words = word_count(&text);
            if words > MAX_WORDS {
                warn!(words, "Over word budget before the third link, keeping all three links");
            }
        } else {
            text = strip_tags(&text)
                .split_whitespace()
                .take(MAX_WORDS)
                .collect::<Vec<_>>()
                .join(" ");
        }
    }

    let ends = link_ends(&text);
    if ends.len() > REQUIRED_LINKS {
        text.truncate(ends[REQUIRED_LINKS - 1]);
    } else if ends.len() < REQUIRED_LINKS {
        debug!(links = ends.len(), "Fewer links than requested");
    }

    text
}

fn term_guidance(context: EnrichmentContext) -> &'static str {
    match context {
        EnrichmentContext::Astronomy => {
            "Focus on the most significant astronomical concepts, objects, or phenomena mentioned.\n\
             Prioritize: major celestial objects, important scientific discoveries, key astronomical phenomena, or notable space missions."
        }
        EnrichmentContext::General => {
            "Focus on the most significant people, places, events, or concepts mentioned.\n\
             Prioritize: notable historical figures, important locations, significant events, or key scientific/cultural concepts."
        }
    }
}

fn link_focus(context: EnrichmentContext) -> &'static str {
    match context {
        EnrichmentContext::Astronomy => {
            "- Celestial objects (galaxies, nebulae, stars, planets, etc.)\n\
             - Astronomical phenomena (eclipses, supernovae, etc.)\n\
             - Scientific concepts (spectroscopy, redshift, etc.)\n\
             - Space missions and telescopes"
        }
        EnrichmentContext::General => {
            "- Important people, places, and events\n\
             - Scientific concepts and terms\n\
             - Historical events and figures\n\
             - Cultural and artistic concepts"
        }
    }
}

fn simplify_subject(context: EnrichmentContext) -> &'static str {
    match context {
        EnrichmentContext::Astronomy => "scientific",
        EnrichmentContext::General => "encyclopedic",
    }
}

/// Prompts and post-processing around a `ChatModel`
#[derive(Clone)]
pub struct TextProcessor {
    model: Arc<dyn ChatModel>,
}

impl TextProcessor {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    async fn complete(&self, stage: &str, prompt: ChatPrompt) -> PipelineResult<String> {
        let start = Instant::now();
        let result = self.model.complete(&prompt).await;
        let elapsed = start.elapsed().as_secs_f64();

        metrics::record_enrichment(stage, elapsed, result.is_ok());
        debug!(
            stage,
            model = self.model.model_name(),
            elapsed_secs = elapsed,
            "Language model call finished"
        );

        let text = result.map_err(|e| PipelineError::Enrichment(e.to_string()))?;
        if text.is_empty() {
            return Err(PipelineError::Enrichment(format!(
                "Empty {} response",
                stage
            )));
        }
        Ok(text)
    }

    /// Summary of at most 300 words with exactly three validated links
    pub async fn process_picture_description(
        &self,
        original_text: &str,
        context: EnrichmentContext,
    ) -> PipelineResult<String> {
        let user = format!(
            "Create a highly representative summary of the following picture description. The summary should:\n\
             1. Be concise and informative (maximum {max} words)\n\
             2. Capture the essential information and key points about the picture\n\
             3. Be accessible to a general audience while maintaining accuracy\n\
             4. Include exactly {links} high-value Wikipedia links to the most important terms/concepts\n\n\
             Select the {links} most important terms/concepts that would benefit readers most from Wikipedia links.\n\n\
             {guidance}\n\n\
             Format the Wikipedia links as HTML anchor tags:\n\
             <a href=\"https://en.wikipedia.org/wiki/Article_Name\" target=\"_blank\">term</a>\n\n\
             Original description:\n{text}\n\n\
             Return ONLY the processed summary text with exactly {links} Wikipedia links embedded, no preamble or explanation:",
            max = MAX_WORDS,
            links = REQUIRED_LINKS,
            guidance = term_guidance(context),
            text = original_text,
        );

        let raw = self
            .complete(
                "summarize",
                ChatPrompt {
                    system: "You are an expert at creating concise, informative summaries and identifying the most valuable terms for Wikipedia linking.".to_string(),
                    user,
                    max_tokens: 800,
                    temperature: 0.7,
                },
            )
            .await?;

        Ok(validate_processed_text(&strip_code_fences(&raw)))
    }

    /// Plain-language rewrite of similar length
    pub async fn simplify_text(
        &self,
        text: &str,
        context: EnrichmentContext,
    ) -> PipelineResult<String> {
        let user = format!(
            "Please simplify the following explanation to make it more accessible to a general audience.\n\
             Keep it informative but reduce technical jargon. Maintain the key facts and interesting details.\n\
             Keep the length similar to the original.\n\n\
             Original text:\n{}\n\n\
             Simplified version:",
            text
        );

        self.complete(
            "simplify",
            ChatPrompt {
                system: format!(
                    "You are an expert at simplifying {} text while maintaining accuracy.",
                    simplify_subject(context)
                ),
                user,
                max_tokens: 1000,
                temperature: 0.7,
            },
        )
        .await
    }

    /// Link the first occurrence of every notable term, without validation
    pub async fn add_wikipedia_links(
        &self,
        text: &str,
        context: EnrichmentContext,
    ) -> PipelineResult<String> {
        let user = format!(
            "Please identify important concepts, terms, people, places, and notable phenomena in the following text and add Wikipedia links to them.\n\n\
             Return the text with HTML anchor tags linking to relevant Wikipedia articles.\n\
             Format: <a href=\"https://en.wikipedia.org/wiki/Article_Name\" target=\"_blank\">term</a>\n\n\
             Only link the FIRST occurrence of each term. Don't over-link common words.\n\
             Focus on:\n{}\n\n\
             Text:\n{}\n\n\
             Return ONLY the text with links added, no preamble or explanation:",
            link_focus(context),
            text
        );

        let raw = self
            .complete(
                "links",
                ChatPrompt {
                    system: "You are an expert at identifying important concepts and linking them to Wikipedia.".to_string(),
                    user,
                    max_tokens: 1500,
                    temperature: 0.3,
                },
            )
            .await?;

        Ok(strip_code_fences(&raw))
    }

    /// Second stage for the configured mode
    pub async fn link_stage(
        &self,
        mode: EnrichmentMode,
        simplified: &str,
        context: EnrichmentContext,
    ) -> PipelineResult<String> {
        match mode {
            EnrichmentMode::Validated => self.process_picture_description(simplified, context).await,
            EnrichmentMode::Legacy => self.add_wikipedia_links(simplified, context).await,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use potd_common::errors::{AppError, Result as AppResult};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned responses and records the prompts it saw
    pub(crate) struct ScriptedModel {
        responses: Mutex<VecDeque<AppResult<String>>>,
        pub prompts: Mutex<Vec<ChatPrompt>>,
    }

    impl ScriptedModel {
        pub(crate) fn new(responses: Vec<AppResult<String>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        pub(crate) fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(&self, prompt: &ChatPrompt) -> AppResult<String> {
            self.prompts.lock().unwrap().push(prompt.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| {
                    Err(AppError::LanguageModel {
                        message: "no scripted response".into(),
                    })
                })
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    fn link(term: &str) -> String {
        format!(
            "<a href=\"https://en.wikipedia.org/wiki/{}\" target=\"_blank\">{}</a>",
            term, term
        )
    }

    fn words(n: usize) -> String {
        vec!["word"; n].join(" ")
    }

    #[test]
    fn test_valid_text_unchanged() {
        let text = format!(
            "The {} is near the {} and {}. {}",
            link("Moon"),
            link("Earth"),
            link("Sun"),
            words(50)
        );
        assert_eq!(validate_processed_text(&text), text);
        // Idempotent
        assert_eq!(validate_processed_text(&validate_processed_text(&text)), text);
    }

    #[test]
    fn test_extra_links_trimmed_after_third() {
        let text = format!(
            "{} {} {} and {} end",
            link("A"),
            link("B"),
            link("C"),
            link("D")
        );
        let expected = format!("{} {} {}", link("A"), link("B"), link("C"));
        assert_eq!(validate_processed_text(&text), expected);
    }

    #[test]
    fn test_long_text_cut_after_third_link() {
        let text = format!(
            "{} {} {} {} {}",
            link("A"),
            words(10),
            link("B"),
            link("C"),
            words(400)
        );
        let result = validate_processed_text(&text);
        assert!(result.ends_with(&link("C")));
        assert_eq!(link_ends(&result).len(), 3);
        assert!(word_count(&result) <= MAX_WORDS);
    }

    #[test]
    fn test_third_link_past_budget_keeps_links() {
        let text = format!(
            "{} {} {} {} {}",
            link("A"),
            words(350),
            link("B"),
            link("C"),
            words(20)
        );
        let result = validate_processed_text(&text);
        assert_eq!(link_ends(&result).len(), 3);
        assert!(result.ends_with(&link("C")));
    }

    #[test]
    fn test_all_links_past_budget_cut_at_third_link() {
        let text = format!(
            "{} {} {} and {} trailing {}",
            words(320),
            link("A"),
            link("B"),
            link("C"),
            words(30)
        );
        let result = validate_processed_text(&text);

        let expected_end = text.find(&link("C")).unwrap() + link("C").len();
        assert_eq!(result, &text[..expected_end]);
        assert_eq!(link_ends(&result).len(), 3);
        assert!(word_count(&result) > MAX_WORDS);
    }

    #[test]
    fn test_long_text_with_few_links_hard_truncated() {
        let text = format!("{} {}", link("A"), words(400));
        let result = validate_processed_text(&text);
        assert_eq!(word_count(&result), MAX_WORDS);
        assert!(result.starts_with("A word"));
    }

    #[test]
    fn test_few_links_returned_as_is() {
        let text = format!("Only {} here.", link("One"));
        assert_eq!(validate_processed_text(&text), text);
        assert_eq!(validate_processed_text(""), "");
    }

    #[test]
    fn test_link_pattern_case_insensitive() {
        let text = "<A HREF='http://EN.wikipedia.org/wiki/Mars'>Mars</A>";
        assert_eq!(link_ends(text).len(), 1);
        // Other domains are not counted
        assert_eq!(link_ends("<a href=\"https://example.com/wiki/X\">X</a>").len(), 0);
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```html\n<p>x</p>\n```"), "<p>x</p>");
        assert_eq!(strip_code_fences("```\nplain\n```"), "plain");
        assert_eq!(strip_code_fences("no fence"), "no fence");
    }

    #[tokio::test]
    async fn test_process_picture_description_uses_context() {
        let response = format!(
            "```html\nA {} in the {} near {}.\n```",
            link("Nebula"),
            link("Milky_Way"),
            link("Orion")
        );
        let model = ScriptedModel::new(vec![Ok(response)]);
        let processor = TextProcessor::new(model.clone());

        let result = processor
            .process_picture_description("A nebula.", EnrichmentContext::Astronomy)
            .await
            .unwrap();

        assert!(result.starts_with("A <a href"));
        assert!(!result.contains("```"));
        let prompts = model.prompts.lock().unwrap();
        assert!(prompts[0].user.contains("astronomical"));
        assert_eq!(prompts[0].max_tokens, 800);
    }

    #[tokio::test]
    async fn test_model_failure_is_enrichment_error() {
        let model = ScriptedModel::new(vec![Err(AppError::LanguageModel {
            message: "rate limited".into(),
        })]);
        let processor = TextProcessor::new(model);

        let err = processor
            .simplify_text("text", EnrichmentContext::General)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Enrichment(ref m) if m.contains("rate limited")));
    }

    #[tokio::test]
    async fn test_simplify_prompt_follows_context() {
        let model = ScriptedModel::new(vec![Ok("simple".into()), Ok("plain".into())]);
        let processor = TextProcessor::new(model.clone());

        processor
            .simplify_text("Redshift of a quasar.", EnrichmentContext::Astronomy)
            .await
            .unwrap();
        processor
            .simplify_text("A castle in Bavaria.", EnrichmentContext::General)
            .await
            .unwrap();

        let prompts = model.prompts.lock().unwrap();
        assert!(prompts[0].system.contains("scientific"));
        assert!(prompts[1].system.contains("encyclopedic"));
        assert!(prompts[1].user.contains("A castle in Bavaria."));
    }

    #[tokio::test]
    async fn test_link_stage_dispatches_on_mode() {
        let model = ScriptedModel::new(vec![Ok("linked".into()), Ok("summary".into())]);
        let processor = TextProcessor::new(model.clone());

        let legacy = processor
            .link_stage(EnrichmentMode::Legacy, "s", EnrichmentContext::General)
            .await
            .unwrap();
        assert_eq!(legacy, "linked");

        let validated = processor
            .link_stage(EnrichmentMode::Validated, "s", EnrichmentContext::General)
            .await
            .unwrap();
        assert_eq!(validated, "summary");

        let prompts = model.prompts.lock().unwrap();
        assert_eq!(prompts[0].temperature, 0.3);
        assert!(prompts[1].user.contains("maximum 300 words"));
    }
}
