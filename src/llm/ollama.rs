use musli::json;
use musli::{Decode, Encode};
use reqwest::blocking::Client;

use super::{GenerateRequest, Provider, ProviderError};

const NAME: &str = "ollama";
pub const DEFAULT_API_BASE: &str = "http://localhost:11434";

#[derive(Debug, Encode, Decode)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Debug, Decode)]
struct OllamaChatResponse {
    message: OllamaMessage,
}

/// Local Ollama runtime via /api/chat. Needs no API key.
pub struct OllamaProvider {
    http: Client,
}

impl OllamaProvider {
    pub fn new(http: Client) -> Self {
        Self { http }
    }
}

fn encode_request(model: &str, system: &str, user: &str) -> Result<String, ProviderError> {
    #[derive(Debug, Encode)]
    struct ChatRequest {
        model: String,
        stream: bool,
        messages: Vec<OllamaMessage>,
    }

    let req_body = ChatRequest {
        model: model.to_string(),
        stream: false,
        messages: vec![
            OllamaMessage {
                role: "system".to_string(),
                content: system.to_string(),
            },
            OllamaMessage {
                role: "user".to_string(),
                content: user.to_string(),
            },
        ],
    };

    json::to_string(&req_body)
        .map_err(|e| ProviderError::new(NAME, format!("failed to encode request: {e}"), false))
}

fn decode_response(body: &str) -> Result<String, ProviderError> {
    let parsed: OllamaChatResponse = json::from_str(body)
        .map_err(|e| ProviderError::new(NAME, format!("failed to decode response: {e}"), false))?;
    Ok(parsed.message.content)
}

impl Provider for OllamaProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    fn default_api_base(&self) -> &'static str {
        DEFAULT_API_BASE
    }

    fn requires_key(&self) -> bool {
        false
    }

    fn generate(&self, req: &GenerateRequest<'_>) -> Result<String, ProviderError> {
        let body_str = encode_request(req.model, &req.prompt.system, &req.prompt.user)?;
        log::trace!("Ollama request body: {body_str}");

        let url = format!("{}/api/chat", req.base_url(self.default_api_base()));
        log::info!("Calling Ollama model {:?} at {url}", req.model);

        let resp = self
            .http
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body_str)
            .send()
            .map_err(|e| ProviderError::from_transport(NAME, e))?;

        let status = resp.status();
        let resp_text = resp
            .text()
            .map_err(|e| ProviderError::from_transport(NAME, e))?;

        if !status.is_success() {
            return Err(ProviderError::from_status(NAME, status, &resp_text));
        }

        log::trace!("Ollama raw JSON response: {resp_text}");
        decode_response(&resp_text)
    }
}
