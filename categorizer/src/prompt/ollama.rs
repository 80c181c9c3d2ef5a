use std::time::Duration;

use serde::Deserialize;
use serde_json::json;

use super::LabelGenerator;
use crate::{
    categorizer_config::LlmConfig,
    error::{CategorizerError, CategorizerResult},
};

const CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    #[serde(default)]
    name: String,
}

/// Client for a local Ollama server's non-streaming generate endpoint
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http_client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(http_client: reqwest::Client, base_url: &str, model: &str) -> Self {
        OllamaClient {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    pub fn from_config(config: &LlmConfig) -> Self {
        Self::new(reqwest::Client::new(), &config.base_url, &config.model)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }

    /// True when the server answers and has the configured model pulled
    pub async fn is_available(&self) -> bool {
        let resp = self
            .http_client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(CONNECTION_TIMEOUT)
            .send()
            .await;

        let tags = match resp {
            Ok(resp) if resp.status().is_success() => resp.json::<TagsResponse>().await,
            Ok(resp) => {
                tracing::error!("Ollama server returned status {}", resp.status());
                return false;
            }
            Err(e) => {
                tracing::error!("Cannot connect to Ollama at {}: {}", self.base_url, e);
                return false;
            }
        };

        match tags {
            Ok(tags) if tags.models.iter().any(|m| m.name.contains(&self.model)) => true,
            Ok(tags) => {
                tracing::error!(
                    "Model '{}' not found. Available models: {}",
                    self.model,
                    tags.models
                        .iter()
                        .map(|m| m.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                false
            }
            Err(e) => {
                tracing::error!("Could not parse Ollama model list: {}", e);
                false
            }
        }
    }
}

impl LabelGenerator for OllamaClient {
    async fn generate(&self, prompt: &str, timeout: Duration) -> CategorizerResult<String> {
        let resp = self
            .http_client
            .post(self.generate_url())
            .timeout(timeout)
            .json(&json!({
                "model": &self.model,
                "prompt": prompt,
                "stream": false
            }))
            .send()
            .await
            .map_err(|e| timeout_aware(e, timeout))?;

        if !resp.status().is_success() {
            return Err(CategorizerError::Llm(format!(
                "Ollama API error: {}",
                resp.status()
            )));
        }

        let body = resp
            .json::<GenerateResponse>()
            .await
            .map_err(|e| timeout_aware(e, timeout))?;
        Ok(body.response.trim().to_string())
    }
}

fn timeout_aware(error: reqwest::Error, timeout: Duration) -> CategorizerError {
    if error.is_timeout() {
        CategorizerError::LlmTimeout(timeout)
    } else {
        error.into()
    }
}
