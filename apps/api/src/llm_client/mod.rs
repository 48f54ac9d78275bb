/// LLM client: the single point of entry for all Ollama calls in Scout.
///
/// No other module talks to the Ollama HTTP API directly. Every call is a
/// single attempt bounded by `ORACLE_TIMEOUT`; callers decide what a failure
/// means for them.
///
/// The model is resolved once at startup (see `LlmClient::resolve_model`) and
/// stays fixed for the lifetime of the client.
use std::time::Duration;

use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod prompts;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "gemma3:1b";
/// Fixed per-call timeout. There is no retry after it elapses.
pub const ORACLE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("LLM returned empty content")]
    EmptyContent,
}

impl LlmError {
    /// True when the service could not be reached at all (timeout, refused
    /// connection), as opposed to answering with something unusable.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, LlmError::Http(_))
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    format: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub eval_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

/// The single LLM client used by every oracle in Scout.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    base_url: String,
    model: String,
}

impl LlmClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(ORACLE_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Probes the installed models once and swaps in the first installed one
    /// when the preferred model is missing. A failed probe keeps the
    /// preferred model; scoring will then fall back per document.
    pub async fn resolve_model(mut self) -> Self {
        match self.list_models().await {
            Ok(installed) => {
                if installed.is_empty() {
                    warn!(
                        "No Ollama models installed; run 'ollama pull {}'",
                        self.model
                    );
                } else {
                    info!("Installed Ollama models: {}", installed.join(", "));
                }
                let chosen = choose_model(&self.model, &installed);
                if chosen != self.model {
                    info!("Model '{}' not installed, using '{}'", self.model, chosen);
                    self.model = chosen;
                }
            }
            Err(e) => warn!("Could not list Ollama models: {e}"),
        }
        self
    }

    /// Lists installed model names via `GET /api/tags`.
    pub async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let tags: TagsResponse = serde_json::from_str(&body)?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Makes one non-streaming generate call in JSON mode and returns the raw
    /// model text.
    pub async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let request_body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            format: "json",
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            warn!("Ollama returned {}: {}", status, body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let generated: GenerateResponse = serde_json::from_str(&body)?;
        debug!(
            "LLM call succeeded: model={}, eval_count={:?}",
            self.model, generated.eval_count
        );

        if generated.response.trim().is_empty() {
            return Err(LlmError::EmptyContent);
        }
        Ok(generated.response)
    }

    /// Calls the LLM and deserializes its text as JSON.
    pub async fn generate_json<T: DeserializeOwned>(&self, prompt: &str) -> Result<T, LlmError> {
        let text = self.generate(prompt).await?;
        parse_json_text(&text)
    }
}

/// Picks the model to use: the preferred one when installed (or when nothing
/// is installed), otherwise the first installed model.
pub fn choose_model(preferred: &str, installed: &[String]) -> String {
    match installed.first() {
        Some(first) if !installed.iter().any(|m| m == preferred) => first.clone(),
        _ => preferred.to_string(),
    }
}

pub fn parse_json_text<T: DeserializeOwned>(text: &str) -> Result<T, LlmError> {
    serde_json::from_str(strip_json_fences(text)).map_err(LlmError::Parse)
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(stripped) = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
    else {
        return text;
    };
    stripped
        .trim_start()
        .strip_suffix("```")
        .map(|s| s.trim())
        .unwrap_or(stripped.trim_start())
}
