//! Configuration for batch extraction and export.
//!
//! All behaviour is controlled through [`DocFillConfig`], built via its
//! [`DocFillConfigBuilder`]. One struct makes it easy to share a config
//! between the session and its extraction tasks and to log the exact knobs
//! a run used.

use crate::error::DocFillError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Default model when a provider is named without one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Configuration for a docfill session.
///
/// Built via [`DocFillConfig::builder()`] or [`DocFillConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_docfill::DocFillConfig;
///
/// let config = DocFillConfig::builder()
///     .concurrency(8)
///     .model("gpt-4.1-mini")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct DocFillConfig {
    /// LLM model identifier, e.g. "gpt-4.1-nano", "gemini-2.5-flash".
    /// If None, uses the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "gemini", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.0.
    ///
    /// Field extraction is transcription, not generation; any creativity
    /// shows up as typos in identity numbers.
    pub temperature: f32,

    /// Maximum tokens the model may generate per document. Default: 1024.
    ///
    /// The answer is a ten-key JSON object; 1024 leaves room for models that
    /// wrap it in prose or code fences.
    pub max_tokens: usize,

    /// Number of extraction calls in flight at once. Default: 4.
    pub concurrency: usize,

    /// Per-document extraction deadline in seconds. Default: 120.
    ///
    /// An expired deadline degrades that one document to "no data"; it is
    /// not retried.
    pub api_timeout_secs: u64,

    /// Leading PDF pages rasterised and attached to an extraction request. Default: 2.
    ///
    /// Identity cards and registration forms put every field on the first
    /// page or two; attaching more costs tokens without adding data.
    pub pdf_pages: usize,

    /// Maximum rendered image dimension (width or height) in pixels. Default: 2000.
    pub max_rendered_pixels: u32,

    /// Custom extraction instruction. If None, uses the built-in one.
    pub instruction: Option<String>,

    /// Receives per-document batch events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for DocFillConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 1024,
            concurrency: 4,
            api_timeout_secs: 120,
            pdf_pages: 2,
            max_rendered_pixels: 2000,
            instruction: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for DocFillConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocFillConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("concurrency", &self.concurrency)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("pdf_pages", &self.pdf_pages)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("instruction", &self.instruction.as_ref().map(|s| s.len()))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl DocFillConfig {
    /// Create a new builder for `DocFillConfig`.
    pub fn builder() -> DocFillConfigBuilder {
        DocFillConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`DocFillConfig`].
#[derive(Debug)]
pub struct DocFillConfigBuilder {
    config: DocFillConfig,
}

impl DocFillConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn pdf_pages(mut self, n: usize) -> Self {
        self.config.pdf_pages = n;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn instruction(mut self, text: impl Into<String>) -> Self {
        self.config.instruction = Some(text.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<DocFillConfig, DocFillError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(DocFillError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.pdf_pages == 0 {
            return Err(DocFillError::InvalidConfig(
                "pdf_pages must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(DocFillError::InvalidConfig(
                "api_timeout_secs must be ≥ 1".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(DocFillError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = DocFillConfig::default();
        assert_eq!(c.concurrency, 4);
        assert_eq!(c.pdf_pages, 2);
        assert_eq!(c.api_timeout_secs, 120);
        assert!(c.instruction.is_none());
    }

    #[test]
    fn builder_clamps() {
        let c = DocFillConfig::builder()
            .concurrency(0)
            .temperature(5.0)
            .max_rendered_pixels(10)
            .build()
            .unwrap();
        assert_eq!(c.concurrency, 1);
        assert_eq!(c.temperature, 2.0);
        assert_eq!(c.max_rendered_pixels, 100);
    }

    #[test]
    fn builder_rejects_zero_pdf_pages() {
        let err = DocFillConfig::builder().pdf_pages(0).build().unwrap_err();
        assert!(err.to_string().contains("pdf_pages"));
    }

    #[test]
    fn builder_rejects_zero_timeout() {
        assert!(DocFillConfig::builder().api_timeout_secs(0).build().is_err());
    }
}
