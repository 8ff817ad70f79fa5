use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::{transport_error, AiError, AiProvider, AiResult};
use crate::config::ProviderConfig;

const NAME: &str = "huggingface";
const LABEL: &str = "Hugging Face";
const MAX_NEW_TOKENS: u32 = 240;

/// Text-generation models on the hosted inference API. These take a single
/// prompt, so the system prompt is folded into it.
pub struct HuggingFaceProvider {
    client: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
    temperature: f32,
}

impl HuggingFaceProvider {
    pub fn new(client: Client, config: &ProviderConfig, temperature: f32) -> Self {
        Self {
            client,
            api_key: config.key().map(str::to_string),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            temperature,
        }
    }
}

pub fn build_prompt(message: &str, system_prompt: &str) -> String {
    format!("{}\n\nUser:\n{}\n\nAssistant:", system_prompt, message)
}

fn generated_text(data: &Value) -> &str {
    data[0]["generated_text"]
        .as_str()
        .filter(|t| !t.is_empty())
        .or_else(|| data["generated_text"].as_str())
        .unwrap_or_default()
}

#[async_trait]
impl AiProvider for HuggingFaceProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn complete(&self, message: &str, system_prompt: &str) -> AiResult<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AiError::missing_key(NAME, LABEL, "HUGGINGFACE_API_KEY"))?;

        let payload = json!({
            "inputs": build_prompt(message, system_prompt),
            "parameters": {
                "max_new_tokens": MAX_NEW_TOKENS,
                "temperature": self.temperature,
                "return_full_text": false,
            },
        });

        let response = self
            .client
            .post(format!("{}/models/{}", self.base_url, self.model))
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| transport_error(NAME, LABEL, e))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let data: Value = serde_json::from_str(&body).unwrap_or_else(|_| json!({}));

        if !status.is_success() || !data["error"].is_null() {
            let details = match &data["error"] {
                Value::Null => format!("{} HTTP {}", LABEL, status.as_u16()),
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            // An error body on a 2xx is still an upstream failure.
            let status = if status.is_success() { 502 } else { status.as_u16() };
            let can_fallback = status == 429 || status >= 500 || details.contains("loading");

            return Err(AiError::new(
                status,
                NAME,
                format!("{} request failed.", LABEL),
                details,
                can_fallback,
            ));
        }

        let text = generated_text(&data).trim();
        if text.is_empty() {
            return Err(AiError::empty_content(NAME, LABEL, "No generated_text found."));
        }
        Ok(text.to_string())
    }
}
