use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::{GenerateRequest, Provider, ProviderError, require_key};

const NAME: &str = "openai";
pub const DEFAULT_API_BASE: &str = "https://api.openai.com";

/// Minimal request/response structs for OpenAI Chat Completions API.
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

/// OpenAI (and OpenAI-compatible) Chat Completions.
pub struct OpenAiProvider {
    client: Client,
}

impl OpenAiProvider {
    pub fn new(client: Client) -> Self {
        OpenAiProvider { client }
    }
}

fn chat_url(base: &str) -> String {
    if base.ends_with("/v1") {
        format!("{base}/chat/completions")
    } else {
        format!("{base}/v1/chat/completions")
    }
}

fn parse_response(body: &str) -> Result<String, ProviderError> {
    let chat_resp: ChatResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::new(NAME, format!("failed to parse response: {e}"), false))?;

    if let Some(usage) = &chat_resp.usage {
        log::debug!(
            "Token usage: prompt={}, completion={}, total={}",
            usage.prompt_tokens,
            usage.completion_tokens,
            usage.total_tokens
        );
    }

    chat_resp
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| ProviderError::new(NAME, "no choices returned", false))
}

impl Provider for OpenAiProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    fn default_api_base(&self) -> &'static str {
        DEFAULT_API_BASE
    }

    fn generate(&self, req: &GenerateRequest<'_>) -> Result<String, ProviderError> {
        let key = require_key(NAME, req)?;
        let url = chat_url(&req.base_url(self.default_api_base()));

        log::info!("Calling OpenAI model {:?}", req.model);

        let body = ChatRequest {
            model: req.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &req.prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &req.prompt.user,
                },
            ],
        };

        let resp = self
            .client
            .post(url)
            .bearer_auth(key)
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_url_does_not_duplicate_v1() {
        assert_eq!(
            chat_url("https://api.openai.com"),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            chat_url("http://localhost:4000/v1"),
            "http://localhost:4000/v1/chat/completions"
        );
    }

    #[test]
    fn parses_first_choice() {
        let body = r#"{
            "id": "chatcmpl-1",
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "Add new line to file"}}
            ],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }"#;
        assert_eq!(parse_response(body).unwrap(), "Add new line to file");
    }

    #[test]
    fn empty_choices_is_an_error() {
        let err = parse_response(r#"{"choices": []}"#).unwrap_err();
        assert_eq!(err.message, "no choices returned");
        assert!(parse_response("not json").is_err());
    }
}
