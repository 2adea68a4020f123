use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ExtractionConfig;
use crate::schema::ParameterDefinition;

use super::domain::GuidelineDocument;
use super::extraction::{
    parse_extraction_payload, ExtractionAdapter, ExtractionError, ExtractionResult,
};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Extraction adapter backed by the Gemini `generateContent` endpoint.
#[derive(Debug, Clone)]
pub struct GeminiExtractionAdapter {
    api_key: String,
    model: String,
    base_url: String,
    temperature: f64,
    http_client: reqwest::Client,
}

impl GeminiExtractionAdapter {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: 0.1,
            http_client: reqwest::Client::new(),
        }
    }

    /// `None` when no API key is configured.
    pub fn from_config(config: &ExtractionConfig) -> Option<Self> {
        let api_key = config.api_key.clone()?;
        Some(Self::new(api_key, config.model.clone()).with_base_url(config.base_url.clone()))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    fn request(&self, document: &GuidelineDocument, schema: &[ParameterDefinition]) -> GeminiRequest {
        let data = base64::engine::general_purpose::STANDARD.encode(&document.bytes);
        GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![
                    GeminiPart::InlineData {
                        inline_data: GeminiBlob {
                            mime_type: document.mime_type().to_string(),
                            data,
                        },
                    },
                    GeminiPart::Text {
                        text: extraction_prompt(schema),
                    },
                ],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: self.temperature,
                response_mime_type: "application/json".to_string(),
            },
        }
    }
}

#[async_trait]
impl ExtractionAdapter for GeminiExtractionAdapter {
    async fn extract(
        &self,
        document: &GuidelineDocument,
        schema: &[ParameterDefinition],
    ) -> Result<ExtractionResult, ExtractionError> {
        debug!(
            model = %self.model,
            file_name = %document.file_name,
            bytes = document.bytes.len(),
            "sending document for extraction"
        );

        let response = self
            .http_client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&self.request(document, schema))
            .send()
            .await
            .map_err(|error| ExtractionError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractionError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let completion: GeminiResponse = response
            .json()
            .await
            .map_err(|error| ExtractionError::Transport(error.to_string()))?;

        let text = completion.text().ok_or(ExtractionError::EmptyResponse)?;
        let result = parse_extraction_payload(&text)?;
        info!(
            file_name = %document.file_name,
            rules = result.rules.len(),
            malformed = result.malformed.len(),
            "extraction returned candidate rules"
        );
        Ok(result)
    }
}

/// Prompt listing the current schema so the model reuses existing keys.
pub fn extraction_prompt(schema: &[ParameterDefinition]) -> String {
    let schema_lines = if schema.is_empty() {
        "No parameters defined yet".to_string()
    } else {
        schema
            .iter()
            .map(|definition| {
                format!(
                    "{} ({}): {}",
                    definition.key,
                    definition.data_type.label(),
                    definition.label
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        r#"You are a credit underwriter assistant specialized in extracting lending criteria from policy documents.

**Current Parameter Schema:**
{schema_lines}

**Your Task:**
1. Identify every eligibility rule and scoring criterion in the document
2. For each rule:
   - If it maps to an existing parameter in the Current Schema, use that parameter's key_name
   - If it requires a NEW parameter not in the Current Schema, define it with:
     * key_name (snake_case, e.g., "truck_age_years")
     * display_label (human-readable, e.g., "Age of Truck")
     * data_type (one of: string, number, boolean, select, currency)
     * options (only for select type, e.g., {{"values": ["Option1", "Option2"]}})
3. Determine the operator (gt, lt, eq, neq, gte, lte, in, contains)
4. Extract the threshold value
5. Classify as "eligibility" (must pass) or "scoring" (adds points)
6. Write a clear failure_reason message

**Output Format (JSON):**
{{
  "rules": [
    {{
      "parameter": "fico_score",
      "operator": "gte",
      "value": 650,
      "type": "eligibility",
      "weight": 0,
      "reason": "FICO score must be at least 650"
    }},
    {{
      "parameter": "truck_age_years",
      "new_parameter_def": {{
        "key_name": "truck_age_years",
        "display_label": "Age of Truck (Years)",
        "data_type": "number",
        "description": "Age of the equipment in years"
      }},
      "operator": "lte",
      "value": 10,
      "type": "eligibility",
      "weight": 0,
      "reason": "Equipment cannot be older than 10 years"
    }}
  ]
}}

**Important:**
- Only include "new_parameter_def" if the parameter doesn't exist in Current Schema
- Be precise with operators (use gte/lte for "at least"/"at most")
- Extract ALL rules, even minor ones
- For scoring rules, assign appropriate weight (1-10 scale)
- Keep all names shorter than 50 characters
"#
    )
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiPart {
    InlineData { inline_data: GeminiBlob },
    Text { text: String },
}

#[derive(Debug, Serialize)]
struct GeminiBlob {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    temperature: f64,
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiCandidateContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: Option<String>,
}

impl GeminiResponse {
    /// Concatenated text of the first candidate.
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}
