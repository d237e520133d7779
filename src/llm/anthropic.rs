use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::{GenerateRequest, Provider, ProviderError, require_key};

const NAME: &str = "anthropic";
pub const DEFAULT_API_BASE: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1024;

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

/// Anthropic Messages API.
pub struct AnthropicProvider {
    client: Client,
}

impl AnthropicProvider {
    pub fn new(client: Client) -> Self {
        AnthropicProvider { client }
    }
}

fn messages_url(base: &str) -> String {
    if base.ends_with("/v1") {
        format!("{base}/messages")
    } else {
        format!("{base}/v1/messages")
    }
}

fn parse_response(body: &str) -> Result<String, ProviderError> {
    let resp: MessagesResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::new(NAME, format!("failed to parse response: {e}"), false))?;

    if let Some(usage) = &resp.usage {
        log::debug!(
            "Token usage: input={}, output={}",
            usage.input_tokens,
            usage.output_tokens
        );
    }

    let text: String = resp
        .content
        .into_iter()
        .filter(|b| b.kind == "text")
        .map(|b| b.text)
        .collect();

    if text.is_empty() {
        return Err(ProviderError::new(NAME, "no text content returned", false));
    }
    Ok(text)
}

impl Provider for AnthropicProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    fn default_api_base(&self) -> &'static str {
        DEFAULT_API_BASE
    }

    fn generate(&self, req: &GenerateRequest<'_>) -> Result<String, ProviderError> {
        let key = require_key(NAME, req)?;
        let url = messages_url(&req.base_url(self.default_api_base()));

        log::info!("Calling Anthropic model {:?}", req.model);

        let body = MessagesRequest {
            model: req.model,
            max_tokens: MAX_TOKENS,
            system: &req.prompt.system,
            messages: vec![Message {
                role: "user",
                content: &req.prompt.user,
            }],
        };

        let resp = self
            .client
            .post(url)
            .header("x-api-key", key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .map_err(|e| ProviderError::from_transport(NAME, e))?;

        let status = resp.status();
        let text = resp
            .text()
            .map_err(|e| ProviderError::from_transport(NAME, e))?;

        if !status.is_success() {
            return Err(ProviderError::from_status(NAME, status, &text));
        }

        parse_response(&text)
    }
}
