use crossterm::tty::IsTty;
use log::debug;

use crate::config::Config;
use crate::error::Result;
use crate::llm::retry::RetryPolicy;
use crate::llm::{ModelClient, ProviderRegistry};
use crate::secrets::{Prompter, TerminalPrompter};

/// Build the model client with the default provider routes.
pub fn build_model_client(cfg: &Config) -> Result<ModelClient> {
    let registry = ProviderRegistry::with_defaults(cfg.timeout)?;
    debug!(
        "Model client: timeout {:?}, {} transient retries",
        cfg.timeout, cfg.max_retries
    );
    Ok(ModelClient::new(registry, RetryPolicy::new(cfg.max_retries)))
}

/// A terminal prompter, but only when the run may ask for input.
pub fn build_prompter(cfg: &Config) -> Option<&'static dyn Prompter> {
    static TERMINAL: TerminalPrompter = TerminalPrompter;

    if !cfg.interactive {
        debug!("Interactive key entry disabled by configuration");
        return None;
    }
    if !std::io::stdin().is_tty() {
        debug!("stdin is not a terminal; interactive key entry disabled");
        return None;
    }
    Some(&TERMINAL)
}

/// Spinner only when stderr is a terminal and not drowned by debug logs.
pub fn show_progress(debug_logging: bool) -> bool {
    !debug_logging && std::io::stderr().is_tty()
}
