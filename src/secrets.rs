//! API key lookup.
//!
//! Order: `{PROVIDER}_API_KEY` env var > keyring entry `{provider}_key` >
//! interactive prompt (with an offer to store the key in the keyring).

use std::fmt;

use dialoguer::{Confirm, Password};
use keyring::Entry;
use log::{debug, warn};
use secrecy::{ExposeSecret, SecretString};

use crate::error::{AppError, Result};

const SERVICE_NAME: &str = "ai_commit_gen";

/// A non-empty API key. `Debug` never shows the value.
#[derive(Clone)]
pub struct Credential(SecretString);

impl Credential {
    /// Trims the raw value; returns `None` when nothing is left.
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Credential(SecretString::from(trimmed.to_string())))
        }
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

/// Persistent secret storage addressed by key.
pub trait SecretStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Questions we may ask the operator while resolving a key.
pub trait Prompter {
    fn confirm(&self, question: &str) -> Result<bool>;
    fn read_secret(&self, prompt: &str) -> Result<String>;
}

/// OS keyring (macOS Keychain, Secret Service, Windows Credential Manager).
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new() -> Self {
        KeyringStore {
            service: SERVICE_NAME.to_string(),
        }
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretStore for KeyringStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let lookup = Entry::new(&self.service, key).and_then(|entry| entry.get_password());
        Ok(stored_or_absent(key, lookup))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let entry = Entry::new(&self.service, key)?;
        entry.set_password(value)?;
        Ok(())
    }
}

/// Any keyring failure, including building the entry, reads as "not stored".
fn stored_or_absent(key: &str, lookup: keyring::Result<String>) -> Option<String> {
    match lookup {
        Ok(password) => Some(password),
        Err(keyring::Error::NoEntry) => None,
        Err(e) => {
            warn!("Keyring lookup for {key} failed: {e}");
            None
        }
    }
}

/// Terminal prompts with hidden key entry.
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn confirm(&self, question: &str) -> Result<bool> {
        let answer = Confirm::new()
            .with_prompt(question)
            .default(false)
            .interact()?;
        Ok(answer)
    }

    fn read_secret(&self, prompt: &str) -> Result<String> {
        let value = Password::new()
            .with_prompt(prompt)
            .allow_empty_password(true)
            .interact()?;
        Ok(value)
    }
}

pub fn env_var_name(provider: &str) -> String {
    format!("{}_API_KEY", provider.to_uppercase())
}

pub fn store_key(provider: &str) -> String {
    format!("{provider}_key")
}

fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

pub struct SecretsResolver<'a> {
    store: &'a dyn SecretStore,
    prompter: Option<&'a dyn Prompter>,
    env: fn(&str) -> Option<String>,
}

impl<'a> SecretsResolver<'a> {
    /// Without a prompter the resolver never asks for input.
    pub fn new(store: &'a dyn SecretStore, prompter: Option<&'a dyn Prompter>) -> Self {
        SecretsResolver {
            store,
            prompter,
            env: read_env,
        }
    }

    /// Swap the environment lookup (used by tests).
    pub fn with_env(mut self, env: fn(&str) -> Option<String>) -> Self {
        self.env = env;
        self
    }

    pub fn resolve(&self, provider: &str) -> Result<Credential> {
        let env_var = env_var_name(provider);

        if let Some(key) = (self.env)(&env_var).as_deref().and_then(Credential::new) {
            debug!("Using {provider} API key from ${env_var}");
            return Ok(key);
        }

        let entry = store_key(provider);
        if let Some(key) = self.store.get(&entry)?.as_deref().and_then(Credential::new) {
            debug!("Using {provider} API key from keyring entry {entry}");
            return Ok(key);
        }

        let missing = || AppError::CredentialMissing {
            provider: provider.to_string(),
            env_var: env_var.clone(),
        };

        let Some(prompter) = self.prompter else {
            return Err(missing());
        };

        let label = capitalize(provider);
        let raw = prompter.read_secret(&format!(
            "No {label} API key found. Enter your {label} API key"
        ))?;
        let key = Credential::new(&raw).ok_or_else(missing)?;

        if prompter.confirm(&format!("Store the {label} API key in the system keyring?"))? {
            match self.store.set(&entry, key.expose()) {
                Ok(()) => debug!("Stored {provider} API key in keyring entry {entry}"),
                Err(e) => warn!("Could not store the {label} API key: {e}"),
            }
        }

        Ok(key)
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
