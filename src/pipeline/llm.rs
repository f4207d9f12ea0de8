//! VLM-backed [`ExtractionService`].
//!
//! Builds one chat request per document: the extraction instruction as the
//! system message, then a user message carrying the document as image
//! attachments. Photos go out as uploaded; PDFs are rasterised first
//! (leading pages only, see [`crate::config::DocFillConfig::pdf_pages`]).
//!
//! No retries: a failed call degrades that one document, and the operator
//! can re-upload it.

use crate::config::{DocFillConfig, DEFAULT_MODEL};
use crate::error::{DocFillError, ExtractionError};
use crate::pipeline::extract::{ExtractionRequest, ExtractionService};
use crate::pipeline::{encode, render};
use crate::record::MediaKind;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Extraction service backed by an edgequake-llm provider.
pub struct LlmExtractionService {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
    pdf_pages: usize,
    max_rendered_pixels: u32,
}

impl LlmExtractionService {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &DocFillConfig) -> Self {
        Self {
            provider,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            pdf_pages: config.pdf_pages,
            max_rendered_pixels: config.max_rendered_pixels,
        }
    }

    /// Resolve the provider from `config` and build the service.
    pub fn from_config(config: &DocFillConfig) -> Result<Self, DocFillError> {
        let provider = resolve_provider(config)?;
        Ok(Self::new(provider, config))
    }

    fn build_options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }

    async fn attachments(
        &self,
        document: &[u8],
        mime_type: &str,
    ) -> Result<Vec<ImageData>, ExtractionError> {
        match MediaKind::from_mime(mime_type) {
            MediaKind::Image => Ok(vec![encode::encode_upload(document, mime_type)]),
            MediaKind::Pdf => {
                let bytes = document.to_vec();
                let pages = self.pdf_pages;
                let max_px = self.max_rendered_pixels;
                let images = tokio::task::spawn_blocking(move || {
                    render::render_leading_pages(&bytes, pages, max_px)
                })
                .await
                .map_err(|e| ExtractionError::RenderFailed(format!("render task panicked: {e}")))?
                .map_err(|e| ExtractionError::RenderFailed(e.to_string()))?;

                images
                    .iter()
                    .map(|img| {
                        encode::encode_page(img)
                            .map_err(|e| ExtractionError::RenderFailed(e.to_string()))
                    })
                    .collect()
            }
            MediaKind::Other => Err(ExtractionError::UnsupportedMedia {
                mime_type: mime_type.to_string(),
            }),
        }
    }
}

#[async_trait]
impl ExtractionService for LlmExtractionService {
    async fn request(&self, request: ExtractionRequest<'_>) -> Result<String, ExtractionError> {
        let start = Instant::now();
        let images = self
            .attachments(request.document, request.mime_type)
            .await?;

        let messages = vec![
            ChatMessage::system(request.instruction),
            ChatMessage::user_with_images("Extract the fields from this document.", images),
        ];

        let response = self
            .provider
            .chat(&messages, Some(&self.build_options()))
            .await
            .map_err(|e| ExtractionError::Provider(e.to_string()))?;

        debug!(
            "{}: {} input tokens, {} output tokens, {:?}",
            request.mime_type,
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        Ok(response.content)
    }
}

/// Where the vision model for reading scans comes from, when the caller
/// did not hand in a ready provider.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ProviderSource {
    /// A provider name and model id, from config or environment.
    Named { provider: String, model: String },
    /// Let edgequake-llm probe the environment for any API key.
    Detect,
}

/// Pick the provider source. First match wins:
/// `--provider`/`--model`, the `EDGEQUAKE_LLM_PROVIDER` +
/// `EDGEQUAKE_MODEL` pair, an OpenAI key, then auto-detection.
fn provider_source(config: &DocFillConfig, env: impl Fn(&str) -> Option<String>) -> ProviderSource {
    let var = |key: &str| env(key).filter(|v| !v.trim().is_empty());
    let model = || config.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string());

    if let Some(provider) = config.provider_name.clone() {
        return ProviderSource::Named { provider, model: model() };
    }
    if let (Some(provider), Some(model)) = (var("EDGEQUAKE_LLM_PROVIDER"), var("EDGEQUAKE_MODEL")) {
        return ProviderSource::Named { provider, model };
    }
    if var("OPENAI_API_KEY").is_some() {
        return ProviderSource::Named {
            provider: "openai".to_string(),
            model: model(),
        };
    }
    ProviderSource::Detect
}

/// Resolve the vision provider that will read the scans.
///
/// A provider set on the config is used as-is.
pub fn resolve_provider(config: &DocFillConfig) -> Result<Arc<dyn LLMProvider>, DocFillError> {
    if let Some(provider) = &config.provider {
        return Ok(Arc::clone(provider));
    }
    match provider_source(config, |key| std::env::var(key).ok()) {
        ProviderSource::Named { provider, model } => {
            debug!("Reading scans with {}/{}", provider, model);
            ProviderFactory::create_llm_provider(&provider, &model).map_err(|e| {
                DocFillError::ProviderNotConfigured {
                    hint: format!(
                        "cannot open {provider}/{model} for document reading ({e}); \
                         check the provider's API key and that the model accepts images"
                    ),
                    provider,
                }
            })
        }
        ProviderSource::Detect => ProviderFactory::from_env()
            .map(|(llm, _embedding)| llm)
            .map_err(|e| DocFillError::ProviderNotConfigured {
                provider: "auto".to_string(),
                hint: format!(
                    "no vision model found to read the scans ({e}); pass --provider and \
                     --model, or export OPENAI_API_KEY, GEMINI_API_KEY or ANTHROPIC_API_KEY"
                ),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn named_provider_beats_environment() {
        let config = DocFillConfig::builder()
            .provider_name("gemini")
            .model("gemini-2.5-flash")
            .build()
            .unwrap();
        let source = provider_source(&config, env(&[("OPENAI_API_KEY", "sk-x")]));
        assert_eq!(
            source,
            ProviderSource::Named {
                provider: "gemini".into(),
                model: "gemini-2.5-flash".into()
            }
        );
    }

    #[test]
    fn environment_pair_then_openai_key() {
        let config = DocFillConfig::default();
        let pair = env(&[
            ("EDGEQUAKE_LLM_PROVIDER", "anthropic"),
            ("EDGEQUAKE_MODEL", "claude-x"),
            ("OPENAI_API_KEY", "sk-x"),
        ]);
        assert_eq!(
            provider_source(&config, pair),
            ProviderSource::Named {
                provider: "anthropic".into(),
                model: "claude-x".into()
            }
        );

        let key_only = env(&[("EDGEQUAKE_LLM_PROVIDER", "anthropic"), ("OPENAI_API_KEY", "sk-x")]);
        assert_eq!(
            provider_source(&config, key_only),
            ProviderSource::Named {
                provider: "openai".into(),
                model: DEFAULT_MODEL.into()
            }
        );
    }

    #[test]
    fn blank_variables_fall_through_to_detection() {
        let config = DocFillConfig::default();
        let blank = env(&[("OPENAI_API_KEY", "  "), ("EDGEQUAKE_MODEL", "")]);
        assert_eq!(provider_source(&config, blank), ProviderSource::Detect);
    }
}
