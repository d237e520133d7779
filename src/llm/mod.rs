pub mod anthropic;
pub mod ollama;
pub mod openai;
pub mod prompt_builder;
mod prompts;
pub mod retry;

use std::fmt;
use std::time::{Duration, Instant};

use log::debug;
use reqwest::blocking::Client;
use thiserror::Error;

use crate::error::{AppError, Result};
use crate::secrets::Credential;
use prompt_builder::PromptPair;
use retry::{RetryPolicy, retry_transient};

/// Failure reported by (or while reaching) a model provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{provider} request failed: {message}")]
pub struct ProviderError {
    pub provider: String,
    pub message: String,
    /// Worth retrying: timeouts, connection failures, HTTP 429 and 5xx.
    pub transient: bool,
}

impl ProviderError {
    pub fn new(provider: &str, message: impl Into<String>, transient: bool) -> Self {
        ProviderError {
            provider: provider.to_string(),
            message: message.into(),
            transient,
        }
    }

    /// Build from a transport-level reqwest failure.
    pub fn from_transport(provider: &str, err: reqwest::Error) -> Self {
        let transient = err.is_timeout() || err.is_connect();
        ProviderError::new(provider, err.to_string(), transient)
    }

    /// Build from a non-success HTTP status and its body.
    ///
    /// Every 5xx counts as transient, including Anthropic's 529 "overloaded".
    pub fn from_status(provider: &str, status: reqwest::StatusCode, body: &str) -> Self {
        let transient = status.as_u16() == 429 || status.is_server_error();
        ProviderError::new(
            provider,
            format!("HTTP {} - {}", status.as_u16(), body.trim()),
            transient,
        )
    }
}

/// One completion request as seen by a provider handler.
pub struct GenerateRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a PromptPair,
    pub credential: Option<&'a Credential>,
    pub api_base: Option<&'a str>,
}

impl GenerateRequest<'_> {
    pub fn base_url(&self, default: &str) -> String {
        self.api_base
            .unwrap_or(default)
            .trim_end_matches('/')
            .to_string()
    }
}

/// A model backend reachable over its own API convention.
pub trait Provider: Send + Sync {
    /// Also the secrets lookup name (`{NAME}_API_KEY`, `{name}_key`).
    fn name(&self) -> &'static str;

    /// Endpoint used when no `--apibase` override is given.
    fn default_api_base(&self) -> &'static str;

    fn requires_key(&self) -> bool {
        true
    }

    fn generate(&self, req: &GenerateRequest<'_>) -> std::result::Result<String, ProviderError>;
}

struct Route {
    prefix: &'static str,
    strip_prefix: bool,
    provider: Box<dyn Provider>,
}

/// A model identifier resolved to its handler.
pub struct Routed<'a> {
    pub provider: &'a dyn Provider,
    /// Model name as the provider expects it.
    pub model: &'a str,
}

impl fmt::Debug for Routed<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Routed")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .finish()
    }
}

/// Maps model-identifier prefixes to provider handlers.
#[derive(Default)]
pub struct ProviderRegistry {
    routes: Vec<Route>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        ProviderRegistry::default()
    }

    /// OpenAI, Anthropic and Ollama sharing one HTTP client.
    /// `None` leaves requests without a timeout.
    pub fn with_defaults(timeout: Option<Duration>) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Other(anyhow::anyhow!("failed to build HTTP client: {e}")))?;

        let mut registry = ProviderRegistry::new();
        registry.register("openai/", true, Box::new(openai::OpenAiProvider::new(http.clone())));
        registry.register("gpt", false, Box::new(openai::OpenAiProvider::new(http.clone())));
        registry.register(
            "anthropic/",
            true,
            Box::new(anthropic::AnthropicProvider::new(http.clone())),
        );
        registry.register("claude", false, Box::new(anthropic::AnthropicProvider::new(http.clone())));
        registry.register("ollama/", true, Box::new(ollama::OllamaProvider::new(http)));
        Ok(registry)
    }

    pub fn register(&mut self, prefix: &'static str, strip_prefix: bool, provider: Box<dyn Provider>) {
        self.routes.push(Route {
            prefix,
            strip_prefix,
            provider,
        });
    }

    /// Longest matching prefix wins.
    pub fn route<'a>(&'a self, model_id: &'a str) -> Result<Routed<'a>> {
        let route = self
            .routes
            .iter()
            .filter(|r| model_id.starts_with(r.prefix))
            .max_by_key(|r| r.prefix.len())
            .ok_or_else(|| AppError::UnknownModel(model_id.to_string()))?;

        let model = if route.strip_prefix {
            &model_id[route.prefix.len()..]
        } else {
            model_id
        };

        if model.is_empty() {
            return Err(AppError::UnknownModel(model_id.to_string()));
        }

        Ok(Routed {
            provider: route.provider.as_ref(),
            model,
        })
    }
}

/// Routes a prompt to the right provider with timeout and retry handling.
pub struct ModelClient {
    registry: ProviderRegistry,
    retry: RetryPolicy,
}

impl ModelClient {
    pub fn new(registry: ProviderRegistry, retry: RetryPolicy) -> Self {
        ModelClient { registry, retry }
    }

    pub fn route<'a>(&'a self, model_id: &'a str) -> Result<Routed<'a>> {
        self.registry.route(model_id)
    }

    pub fn generate(
        &self,
        model_id: &str,
        prompt: &PromptPair,
        credential: Option<&Credential>,
        api_base: Option<&str>,
    ) -> Result<String> {
        let routed = self.route(model_id)?;
        let provider = routed.provider;

        if provider.requires_key() && credential.is_none() {
            return Err(AppError::CredentialMissing {
                provider: provider.name().to_string(),
                env_var: crate::secrets::env_var_name(provider.name()),
            });
        }

        let req = GenerateRequest {
            model: routed.model,
            prompt,
            credential,
            api_base,
        };

        debug!("Prompt for {model_id}:\n{}", truncate(&prompt.user, 3000));

        let start = Instant::now();
        let raw = retry_transient(&self.retry, || provider.generate(&req))?;
        debug!("Query took {:.2} seconds", start.elapsed().as_secs_f64());

        let message = raw.trim();
        if message.is_empty() {
            return Err(ProviderError::new(provider.name(), "empty completion returned", false).into());
        }
        Ok(message.to_string())
    }
}

/// Truncate long strings for debug logging.
fn truncate(s: &str, max_len: usize) -> String {
    match s.char_indices().nth(max_len) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}...\n[truncated {} chars]", &s[..cut], s.len() - cut),
    }
}

/// Pull the key out of a request for providers that need one.
pub(crate) fn require_key<'a>(
    provider: &str,
    req: &GenerateRequest<'a>,
) -> std::result::Result<&'a str, ProviderError> {
    req.credential
        .map(Credential::expose)
        .ok_or_else(|| ProviderError::new(provider, "no API key supplied", false))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns canned text and counts calls.
    pub struct FakeProvider {
        pub name: &'static str,
        pub needs_key: bool,
        pub reply: std::result::Result<String, ProviderError>,
        pub calls: Arc<AtomicUsize>,
    }

    impl FakeProvider {
        pub fn replying(name: &'static str, reply: &str) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let provider = FakeProvider {
                name,
                needs_key: true,
                reply: Ok(reply.to_string()),
                calls: calls.clone(),
            };
            (provider, calls)
        }
    }

    impl Provider for FakeProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        fn default_api_base(&self) -> &'static str {
            "http://fake.invalid"
        }

        fn requires_key(&self) -> bool {
            self.needs_key
        }

        fn generate(&self, _req: &GenerateRequest<'_>) -> std::result::Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FakeProvider;
    use super::*;
    use std::sync::atomic::Ordering;

    fn prompt() -> PromptPair {
        PromptPair {
            system: "sys".into(),
            user: "+added line\n".into(),
        }
    }

    #[test]
    fn default_routes() {
        let registry = ProviderRegistry::with_defaults(Some(Duration::from_secs(5))).unwrap();

        let cases = [
            ("gpt-4o-mini", "openai", "gpt-4o-mini"),
            ("openai/gpt-4o", "openai", "gpt-4o"),
            ("claude-3-5-haiku-latest", "anthropic", "claude-3-5-haiku-latest"),
            ("anthropic/claude-sonnet-4-0", "anthropic", "claude-sonnet-4-0"),
            ("ollama/llama3", "ollama", "llama3"),
        ];

        for (id, provider, model) in cases {
            let routed = registry.route(id).unwrap();
            assert_eq!(routed.provider.name(), provider, "{id}");
            assert_eq!(routed.model, model, "{id}");
        }

        assert!(!registry.route("ollama/llama3").unwrap().provider.requires_key());
    }

    #[test]
    fn default_endpoints_per_provider() {
        let registry = ProviderRegistry::with_defaults(Some(Duration::from_secs(5))).unwrap();

        let cases = [
            ("gpt-4o-mini", openai::DEFAULT_API_BASE),
            ("claude-3-5-haiku-latest", anthropic::DEFAULT_API_BASE),
            ("ollama/llama3", ollama::DEFAULT_API_BASE),
        ];
        for (id, base) in cases {
            assert_eq!(registry.route(id).unwrap().provider.default_api_base(), base, "{id}");
        }
    }

    #[test]
    fn client_builds_without_a_timeout() {
        let registry = ProviderRegistry::with_defaults(None).unwrap();
        assert_eq!(registry.route("gpt-4o").unwrap().provider.name(), "openai");
    }

    #[test]
    fn unknown_and_bare_prefixes_fail() {
        let registry = ProviderRegistry::with_defaults(Some(Duration::from_secs(5))).unwrap();
        for id in ["llama2", "", "ollama/", "mistral/large"] {
            assert!(matches!(registry.route(id), Err(AppError::UnknownModel(_))), "{id}");
        }
    }

    #[test]
    fn registered_provider_routes_without_touching_dispatch() {
        let mut registry = ProviderRegistry::new();
        let (fake, calls) = FakeProvider::replying("fake", "  Add new line to file \n");
        registry.register("fake/", true, Box::new(fake));

        let client = ModelClient::new(registry, RetryPolicy::none());
        let key = Credential::new("k").unwrap();
        let message = client
            .generate("fake/model", &prompt(), Some(&key), None)
            .unwrap();

        assert_eq!(message, "Add new line to file");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn keyed_provider_without_credential_is_rejected() {
        let mut registry = ProviderRegistry::new();
        let (fake, calls) = FakeProvider::replying("fake", "msg");
        registry.register("fake/", true, Box::new(fake));

        let client = ModelClient::new(registry, RetryPolicy::none());
        let err = client.generate("fake/x", &prompt(), None, None).unwrap_err();

        assert!(matches!(err, AppError::CredentialMissing { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn provider_errors_and_empty_replies_surface() {
        let mut registry = ProviderRegistry::new();
        let (mut failing, _) = FakeProvider::replying("failing", "");
        failing.reply = Err(ProviderError::new("failing", "HTTP 401 - bad key", false));
        failing.needs_key = false;
        registry.register("fail/", true, Box::new(failing));

        let (mut empty, _) = FakeProvider::replying("empty", "  \n");
        empty.needs_key = false;
        registry.register("empty/", true, Box::new(empty));

        let client = ModelClient::new(registry, RetryPolicy::none());

        let err = client.generate("fail/x", &prompt(), None, None).unwrap_err();
        assert_eq!(err.to_string(), "failing request failed: HTTP 401 - bad key");

        let err = client.generate("empty/x", &prompt(), None, None).unwrap_err();
        assert_eq!(err.kind(), "ProviderError");
    }

    #[test]
    fn status_classification() {
        let e = ProviderError::from_status("openai", reqwest::StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(e.transient);
        assert_eq!(e.message, "HTTP 429 - slow down");

        let e = ProviderError::from_status("openai", reqwest::StatusCode::BAD_GATEWAY, "");
        assert!(e.transient);

        let overloaded = reqwest::StatusCode::from_u16(529).unwrap();
        assert!(ProviderError::from_status("anthropic", overloaded, "overloaded").transient);

        let e = ProviderError::from_status("openai", reqwest::StatusCode::UNAUTHORIZED, "bad key");
        assert!(!e.transient);
    }

    #[test]
    fn api_base_override_wins() {
        let p = prompt();
        let req = GenerateRequest {
            model: "m",
            prompt: &p,
            credential: None,
            api_base: Some("http://proxy.local:8080/"),
        };
        assert_eq!(req.base_url("https://api.openai.com"), "http://proxy.local:8080");

        let req = GenerateRequest { api_base: None, ..req };
        assert_eq!(req.base_url("https://api.openai.com"), "https://api.openai.com");
    }
}
