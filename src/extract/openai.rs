// src/extract/openai.rs

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Mutex;
use tracing::{debug, warn};

use super::{Extraction, Extractor, Usage, INSTRUCTION, LISTING_SCHEMA};
use crate::{config::ScrapeConfig, fetch::IsolatedDocument};

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}

/// Chat-completions extraction against an OpenAI-compatible endpoint.
pub struct OpenAiExtractor {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    usage: Mutex<Usage>,
}

impl OpenAiExtractor {
    pub fn new(client: Client, config: &ScrapeConfig) -> Self {
        Self {
            client,
            endpoint: format!("{}/chat/completions", config.api_base.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            usage: Mutex::new(Usage::default()),
        }
    }

    fn record_usage(&self, usage: Option<&ApiUsage>) {
        let u = usage.map_or((0, 0, 0), |u| {
            (u.prompt_tokens, u.completion_tokens, u.total_tokens)
        });
        if let Ok(mut total) = self.usage.lock() {
            total.add(u.0, u.1, u.2);
        }
    }
}

fn request_body(model: &str, content: &str) -> Value {
    json!({
        "model": model,
        "temperature": 0,
        "response_format": { "type": "json_object" },
        "messages": [
            {
                "role": "system",
                "content": format!(
                    "{}\n\nReturn JSON matching this schema:\n{}",
                    INSTRUCTION, *LISTING_SCHEMA
                ),
            },
            { "role": "user", "content": content },
        ],
    })
}

fn into_extraction(resp: &ChatResponse) -> Extraction {
    match resp.choices.first().and_then(|c| c.message.content.clone()) {
        Some(content) => Extraction {
            content: Some(content),
            error_message: None,
        },
        None => Extraction {
            content: None,
            error_message: Some("response carried no message content".to_string()),
        },
    }
}

#[async_trait]
impl Extractor for OpenAiExtractor {
    async fn extract(&self, doc: &IsolatedDocument) -> Result<Extraction> {
        let text = doc.to_text();
        debug!(chars = text.len(), model = %self.model, "submitting listing");

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request_body(&self.model, &text))
            .send()
            .await
            .with_context(|| format!("POST {}", self.endpoint))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(%status, "extraction request rejected");
            self.record_usage(None);
            return Ok(Extraction {
                content: None,
                error_message: Some(format!("{}: {}", status, body)),
            });
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .context("decoding chat completion response")?;
        self.record_usage(parsed.usage.as_ref());
        Ok(into_extraction(&parsed))
    }

    fn usage(&self) -> Usage {
        self.usage.lock().map(|u| *u).unwrap_or_default()
    }
}
