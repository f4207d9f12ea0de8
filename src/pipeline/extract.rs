//! Extraction adapter: raw document → [`ExtractedRecord`] or nothing.
//!
//! The document-understanding service is a black box behind the
//! [`ExtractionService`] trait. This module owns the only place where its
//! free-text answer is turned into typed fields; a failure of any kind
//! (provider error, timeout, empty or unparseable answer) is logged and
//! becomes `None` for that one document. Nothing here is retried.

use crate::error::ExtractionError;
use crate::prompts::EXTRACTION_INSTRUCTION;
use crate::record::{ExtractedRecord, FieldKey, FieldValue};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// One request to the extraction service.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionRequest<'a> {
    pub document: &'a [u8],
    pub mime_type: &'a str,
    pub instruction: &'a str,
}

/// The external document-understanding service.
///
/// Implementations return the service's raw text answer; interpreting it is
/// the adapter's job.
#[async_trait]
pub trait ExtractionService: Send + Sync {
    async fn request(&self, request: ExtractionRequest<'_>) -> Result<String, ExtractionError>;
}

/// Wraps an [`ExtractionService`] and normalises its answers.
#[derive(Clone)]
pub struct ExtractionAdapter {
    service: Arc<dyn ExtractionService>,
    instruction: Option<String>,
    timeout: Duration,
}

impl ExtractionAdapter {
    pub fn new(service: Arc<dyn ExtractionService>) -> Self {
        Self {
            service,
            instruction: None,
            timeout: Duration::from_secs(120),
        }
    }

    /// Replace the built-in instruction.
    pub fn with_instruction(mut self, instruction: Option<String>) -> Self {
        self.instruction = instruction;
        self
    }

    /// Per-document deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn instruction(&self) -> &str {
        self.instruction
            .as_deref()
            .unwrap_or(EXTRACTION_INSTRUCTION.as_str())
    }

    /// Extract the ten fields from one document.
    ///
    /// Returns `None` on any failure; the batch carries on with the next
    /// document.
    pub async fn extract(&self, document: &[u8], mime_type: &str) -> Option<ExtractedRecord> {
        match self.try_extract(document, mime_type).await {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Extraction failed ({}): {}", mime_type, e);
                None
            }
        }
    }

    /// Like [`extract`](Self::extract) but keeps the failure reason.
    pub async fn try_extract(
        &self,
        document: &[u8],
        mime_type: &str,
    ) -> Result<ExtractedRecord, ExtractionError> {
        let request = ExtractionRequest {
            document,
            mime_type,
            instruction: self.instruction(),
        };

        let answer = tokio::time::timeout(self.timeout, self.service.request(request))
            .await
            .map_err(|_| ExtractionError::Timeout {
                secs: self.timeout.as_secs(),
            })??;

        let record = parse_response(&answer)?;
        debug!(
            "Extracted {}/10 fields from {} document",
            FieldKey::ALL
                .iter()
                .filter(|k| record.field(**k).is_present())
                .count(),
            mime_type
        );
        Ok(record)
    }
}

// ── Response parsing ─────────────────────────────────────────────────────

static RE_CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[a-zA-Z]*\s*\n?(.*?)\s*```$").unwrap());

/// Parse the service's text answer into a record.
///
/// Accepts a bare JSON object, one wrapped in a code fence, or one embedded
/// in surrounding prose.
pub fn parse_response(text: &str) -> Result<ExtractedRecord, ExtractionError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ExtractionError::EmptyResponse);
    }

    let unfenced = match RE_CODE_FENCE.captures(trimmed) {
        Some(caps) => caps[1].trim().to_string(),
        None => trimmed.to_string(),
    };

    let object = match serde_json::from_str::<Value>(&unfenced) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            return Err(ExtractionError::MalformedResponse(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            )))
        }
        Err(first_err) => embedded_object(&unfenced).ok_or_else(|| {
            ExtractionError::MalformedResponse(first_err.to_string())
        })?,
    };

    Ok(record_from_object(&object))
}

/// Fall back to the outermost `{ … }` span when the model added prose.
fn embedded_object(text: &str) -> Option<Map<String, Value>> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&text[start..=end]) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn record_from_object(object: &Map<String, Value>) -> ExtractedRecord {
    let field = |key: FieldKey| -> FieldValue {
        match object.get(key.json_key()) {
            Some(Value::String(s)) => FieldValue::from_raw(s),
            // NIK and IDPEL regularly come back as bare numbers.
            Some(Value::Number(n)) => FieldValue::from_raw(&n.to_string()),
            Some(Value::Bool(b)) => FieldValue::from_raw(&b.to_string()),
            _ => FieldValue::NotFound,
        }
    };

    ExtractedRecord {
        name: field(FieldKey::Name),
        national_id: field(FieldKey::NationalId),
        customer_id: field(FieldKey::CustomerId),
        address: field(FieldKey::Address),
        subdistrict: field(FieldKey::Subdistrict),
        district: field(FieldKey::District),
        rt: field(FieldKey::Rt),
        rw: field(FieldKey::Rw),
        email: field(FieldKey::Email),
        phone: field(FieldKey::Phone),
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
