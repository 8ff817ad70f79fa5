//! OpenAI-compatible chat completions. Serves both OpenAI and Groq, which
//! speak the same wire format at different base URLs.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::{extract_text_from_choices, transport_error, AiError, AiProvider, AiResult};
use crate::config::ProviderConfig;

pub struct ChatCompletionsProvider {
    client: Client,
    name: &'static str,
    label: &'static str,
    key_var: &'static str,
    api_key: Option<String>,
    model: String,
    base_url: String,
    temperature: f32,
}

impl ChatCompletionsProvider {
    pub fn openai(client: Client, config: &ProviderConfig, temperature: f32) -> Self {
        Self::new(client, "openai", "OpenAI", "OPENAI_API_KEY", config, temperature)
    }

    pub fn groq(client: Client, config: &ProviderConfig, temperature: f32) -> Self {
        Self::new(client, "groq", "Groq", "GROQ_API_KEY", config, temperature)
    }

    fn new(
        client: Client,
        name: &'static str,
        label: &'static str,
        key_var: &'static str,
        config: &ProviderConfig,
        temperature: f32,
    ) -> Self {
        Self {
            client,
            name,
            label,
            key_var,
            api_key: config.key().map(str::to_string),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            temperature,
        }
    }

    fn http_error(&self, status: u16, data: &Value) -> AiError {
        let details = data["error"]["message"]
            .as_str()
            .or_else(|| data["message"].as_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{} HTTP {}", self.label, status));

        // Groq keeps its generic wording for rejected keys.
        let message = if status == 401 && self.name == "openai" {
            format!("{} authentication failed.", self.label)
        } else {
            format!("{} request failed.", self.label)
        };

        AiError::new(status, self.name, message, details, status == 429 || status >= 500)
    }
}

#[async_trait]
impl AiProvider for ChatCompletionsProvider {
    fn name(&self) -> &str {
        self.name
    }

    async fn complete(&self, message: &str, system_prompt: &str) -> AiResult<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AiError::missing_key(self.name, self.label, self.key_var))?;

        let payload = json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": message },
            ],
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| transport_error(self.name, self.label, e))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let data: Value = serde_json::from_str(&body).unwrap_or_else(|_| json!({}));

        if !status.is_success() {
            return Err(self.http_error(status.as_u16(), &data));
        }

        let text = extract_text_from_choices(&data);
        if text.is_empty() {
            return Err(AiError::empty_content(self.name, self.label, "No text in response choices."));
        }
        Ok(text)
    }
}
