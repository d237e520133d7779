use thiserror::Error;

use crate::llm::ProviderError;

/// Every way a run can fail. Each variant maps to a stable exit code.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("this directory is not inside a git work tree")]
    NotARepository,

    #[error("no staged changes found; stage something with 'git add' first")]
    NoStagedChanges,

    #[error("no {provider} API key found (set {env_var} or run interactively to store one)")]
    CredentialMissing { provider: String, env_var: String },

    #[error("unknown prompt template '{0}' (expected one of: default, refactoring, documentation, mimic)")]
    UnknownTemplate(String),

    #[error("no provider handles model '{0}' (try gpt-*, claude-*, ollama/<name>, openai/<name> or anthropic/<name>)")]
    UnknownModel(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("{0}")]
    CommitFailed(String),

    #[error("cannot access secure storage: {0}")]
    SecretStore(String),

    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Short name printed in front of the message.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotARepository => "NotARepository",
            AppError::NoStagedChanges => "NoStagedChanges",
            AppError::CredentialMissing { .. } => "CredentialMissing",
            AppError::UnknownTemplate(_) => "UnknownTemplate",
            AppError::UnknownModel(_) => "UnknownModel",
            AppError::Provider(_) => "ProviderError",
            AppError::CommitFailed(_) => "CommitFailed",
            AppError::SecretStore(_) => "SecretStore",
            AppError::Io(_) | AppError::Other(_) => "Error",
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Io(_) | AppError::Other(_) => 1,
            AppError::NotARepository => 2,
            AppError::NoStagedChanges => 3,
            AppError::CredentialMissing { .. } => 4,
            AppError::UnknownTemplate(_) => 5,
            AppError::UnknownModel(_) => 6,
            AppError::Provider(_) => 7,
            AppError::CommitFailed(_) => 8,
            AppError::SecretStore(_) => 9,
        }
    }
}

impl From<keyring::Error> for AppError {
    fn from(err: keyring::Error) -> Self {
        AppError::SecretStore(err.to_string())
    }
}

impl From<dialoguer::Error> for AppError {
    fn from(err: dialoguer::Error) -> Self {
        AppError::Io(std::io::Error::other(err))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
