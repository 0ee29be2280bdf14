//! OpenAI-compatible chat-completions client.
//!
//! # Responsibility
//! - Build prompts for generation, DDL export and documentation.
//! - Call the hosted service over blocking HTTP and return the reply text.
//!
//! # Invariants
//! - Prompt text and document contents are never logged; only sizes.
//! - The API key comes from configuration, never from source.

use crate::assistant::{Attachment, AssistantError, DdlDialect, GenerationRequest, SchemaAssistant};
use crate::config::ConfigError;
use crate::model::document::SchemaDocument;
use log::{error, info};
use serde_json::{json, Value};
use std::time::{Duration, Instant};

pub const API_KEY_ENV: &str = "DAXI_LLM_API_KEY";
pub const MODEL_ENV: &str = "DAXI_LLM_MODEL";
pub const BASE_URL_ENV: &str = "DAXI_LLM_BASE_URL";

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
const MAX_INLINE_ATTACHMENT_CHARS: usize = 64 * 1024;

const GENERATE_INSTRUCTIONS: &str = "You design relational and document database schemas as \
entity-relationship models. Reply with exactly one JSON object containing an `entities` array \
and a `relationships` array, and nothing else. Keep every entity of the current model unless \
the request says otherwise.";
const DDL_INSTRUCTIONS: &str = "You translate entity-relationship models into database DDL. \
Reply with the DDL script only, inside one fenced code block.";
const DOCUMENTATION_INSTRUCTIONS: &str = "You write technical documentation for database \
schemas. Use markdown headings: one `#` heading per major section, `##` per entity.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl AssistantConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Reads `DAXI_LLM_API_KEY` (required), `DAXI_LLM_MODEL`, `DAXI_LLM_BASE_URL`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = env_value(API_KEY_ENV).ok_or(ConfigError::Missing(API_KEY_ENV))?;
        let mut config = Self::new(api_key);
        if let Some(model) = env_value(MODEL_ENV) {
            config.model = model;
        }
        if let Some(base_url) = env_value(BASE_URL_ENV) {
            config.base_url = base_url;
        }
        Ok(config)
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

/// Blocking HTTP implementation of [`SchemaAssistant`].
pub struct HttpAssistant {
    client: reqwest::blocking::Client,
    config: AssistantConfig,
}

impl HttpAssistant {
    pub fn new(config: AssistantConfig) -> Result<Self, AssistantError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| AssistantError::Service(format!("failed to build http client: {err}")))?;
        Ok(Self { client, config })
    }

    fn complete(&self, operation: &str, instructions: &str, user: String) -> Result<String, AssistantError> {
        let started_at = Instant::now();
        let body = chat_body(&self.config.model, instructions, &user);
        info!(
            "event=assistant_call module=assistant status=start operation={operation} prompt_chars={}",
            user.chars().count()
        );

        let response = self
            .client
            .post(self.config.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .map_err(|err| {
                error!("event=assistant_call module=assistant status=error operation={operation} error_code=transport");
                AssistantError::Service(format!("request failed: {err}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            error!(
                "event=assistant_call module=assistant status=error operation={operation} error_code=http http_status={}",
                status.as_u16()
            );
            return Err(AssistantError::Service(format!("http {status}: {}", text.trim())));
        }

        let payload: Value = response
            .json()
            .map_err(|err| AssistantError::Service(format!("invalid response body: {err}")))?;
        let reply = reply_text(&payload)
            .ok_or_else(|| AssistantError::Service("response has no message content".to_string()))?;

        info!(
            "event=assistant_call module=assistant status=ok operation={operation} reply_chars={} duration_ms={}",
            reply.chars().count(),
            started_at.elapsed().as_millis()
        );
        Ok(reply)
    }
}

impl SchemaAssistant for HttpAssistant {
    fn generate_schema(&self, request: &GenerationRequest) -> Result<String, AssistantError> {
        self.complete("generate", GENERATE_INSTRUCTIONS, generation_prompt(request))
    }

    fn export_ddl(&self, dialect: DdlDialect, document: &SchemaDocument) -> Result<String, AssistantError> {
        let user = format!(
            "Target database: {}\n\nModel:\n{}",
            dialect.label(),
            document.serialize()
        );
        self.complete("export_ddl", DDL_INSTRUCTIONS, user)
    }

    fn write_documentation(&self, document: &SchemaDocument) -> Result<String, AssistantError> {
        let user = format!("Document this model:\n{}", document.serialize());
        self.complete("export_documentation", DOCUMENTATION_INSTRUCTIONS, user)
    }
}

fn chat_body(model: &str, instructions: &str, user: &str) -> Value {
    json!({
        "model": model,
        "temperature": 0,
        "messages": [
            { "role": "system", "content": instructions },
            { "role": "user", "content": user }
        ]
    })
}

fn reply_text(payload: &Value) -> Option<String> {
    let content = payload
        .get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()?
        .trim();
    if content.is_empty() {
        None
    } else {
        Some(content.to_string())
    }
}

/// User message for a generation call.
pub fn generation_prompt(request: &GenerationRequest) -> String {
    let mut prompt = format!(
        "Current model:\n{}\n\nRequest:\n{}\n",
        request.current_document.serialize(),
        request.prompt.trim()
    );
    append_attachments(&mut prompt, "Reference documents", &request.reference_files);
    append_attachments(&mut prompt, "Legacy schema files", &request.schema_files);
    prompt
}

fn append_attachments(prompt: &mut String, title: &str, files: &[Attachment]) {
    if files.is_empty() {
        return;
    }
    prompt.push_str(&format!("\n{title}:\n"));
    for file in files {
        match file.as_text() {
            Some(text) => {
                let inline = text.chars().take(MAX_INLINE_ATTACHMENT_CHARS).collect::<String>();
                prompt.push_str(&format!(
                    "--- {} ({}) ---\n{}\n",
                    file.file_name, file.mime_type, inline
                ));
            }
            None => prompt.push_str(&format!(
                "--- {} ({}, {} bytes, binary content omitted) ---\n",
                file.file_name,
                file.mime_type,
                file.bytes.len()
            )),
        }
    }
}

fn env_value(key: &str) -> Option<String> {
    let raw = std::env::var(key).ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{chat_body, generation_prompt, reply_text, AssistantConfig};
    use crate::assistant::{Attachment, GenerationRequest};
    use crate::model::document::SchemaDocument;
    use serde_json::json;

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let mut config = AssistantConfig::new("key");
        config.base_url = "http://localhost:8080/v1/".to_string();
        assert_eq!(config.endpoint(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn chat_body_places_instructions_first() {
        let body = chat_body("m", "sys", "usr");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "usr");
        assert_eq!(body["model"], "m");
    }

    #[test]
    fn reply_text_reads_first_choice() {
        let payload = json!({ "choices": [{ "message": { "role": "assistant", "content": " {} " } }] });
        assert_eq!(reply_text(&payload).as_deref(), Some("{}"));
        assert_eq!(reply_text(&json!({ "choices": [] })), None);
    }

    #[test]
    fn generation_prompt_inlines_text_and_summarizes_binary_files() {
        let mut request = GenerationRequest::new("add invoices", SchemaDocument::empty());
        request.reference_files.push(Attachment::new("rules.md", b"Invoices need a due date".to_vec(), "text/markdown"));
        request.schema_files.push(Attachment::new("legacy.xlsx", vec![0x50, 0x4b, 0xff], "application/vnd.ms-excel"));

        let prompt = generation_prompt(&request);
        assert!(prompt.contains("add invoices"));
        assert!(prompt.contains("Invoices need a due date"));
        assert!(prompt.contains("legacy.xlsx (application/vnd.ms-excel, 3 bytes, binary content omitted)"));
        assert!(prompt.contains("\"entities\""));
    }
}
