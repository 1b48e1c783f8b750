//! Structured extraction: page text in, schema-shaped [`Record`] out.
//!
//! The [`Extractor`] builds one prompt per page, asks a [`ModelBackend`] for
//! JSON constrained to the schema, and validates the answer. Every failure
//! comes back as an [`ExtractionError`]; nothing panics or retries.

pub mod schema;

use crate::api::{GenerateRequest, ModelBackend};
use crate::error::ExtractionError;
use crate::models::Record;
use crate::utils::truncate_for_log;
use tracing::{debug, instrument, warn};

pub use schema::SchemaDescriptor;

const INSTRUCTIONS: &str = "Analyze the following text and extract the information into a JSON object \
that strictly follows the provided schema.";

const GUARDRAIL: &str = "Do not hallucinate. If a field cannot be determined from the text, leave it empty.";

/// Build the single prompt sent for one page.
pub fn build_prompt(text: &str, schema: &SchemaDescriptor, extra_instructions: Option<&str>) -> String {
    let mut prompt = format!(
        "{INSTRUCTIONS}\n\nSchema '{}' fields:\n{}\n",
        schema.name,
        schema.field_guide()
    );
    if let Some(extra) = extra_instructions.map(str::trim).filter(|s| !s.is_empty()) {
        prompt.push('\n');
        prompt.push_str(extra);
        prompt.push('\n');
    }
    prompt.push('\n');
    prompt.push_str(GUARDRAIL);
    prompt.push_str("\n\nText to analyze:\n---\n");
    prompt.push_str(text);
    prompt.push_str("\n---\n");
    prompt
}

/// Turns page text into a validated record.
pub trait RecordExtractor {
    async fn extract(
        &self,
        text: &str,
        schema: &SchemaDescriptor,
        extra_instructions: Option<&str>,
    ) -> Result<Record, ExtractionError>;
}

/// [`RecordExtractor`] backed by a language model.
#[derive(Debug)]
pub struct Extractor<B> {
    backend: B,
}

impl<B: ModelBackend> Extractor<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }
}

impl<B: ModelBackend> RecordExtractor for Extractor<B> {
    #[instrument(level = "info", skip_all, fields(schema = %schema.name, chars = text.chars().count()))]
    async fn extract(
        &self,
        text: &str,
        schema: &SchemaDescriptor,
        extra_instructions: Option<&str>,
    ) -> Result<Record, ExtractionError> {
        let prompt = build_prompt(text, schema, extra_instructions);
        let response_schema = schema.response_schema();

        let payload = self
            .backend
            .generate(GenerateRequest {
                prompt: &prompt,
                response_schema: &response_schema,
            })
            .await?;

        match schema.validate(&payload) {
            Ok(record) => {
                debug!("Model output matches schema");
                Ok(record)
            }
            Err(e) => {
                warn!(
                    error = %e,
                    response_preview = %truncate_for_log(&payload, 300),
                    "Model returned non-conforming JSON"
                );
                Err(e)
            }
        }
    }
}
