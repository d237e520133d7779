use clap::Parser;

/// CLI options
#[derive(Parser, Debug)]
#[command(
    name = "ai-commit-gen",
    version,
    about = "LLM-assisted Git commit message generator for staged changes"
)]
pub struct Cli {
    /// Prompt template: default, refactoring, documentation or mimic
    /// (mimic copies the style of the last few commit messages)
    #[arg(short, long, value_name = "TEMPLATE")]
    pub prompt: Option<String>,

    /// Create the commit with the generated message instead of printing it
    #[arg(short, long)]
    pub commit: bool,

    /// Model to use, e.g. gpt-4o-mini, claude-3-5-haiku-latest, ollama/llama3
    #[arg(short, long)]
    pub model: Option<String>,

    /// Verbose logging to stderr (-d debug, -dd trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub debug: u8,

    /// Override the provider endpoint URL
    #[arg(long = "apibase", value_name = "URL")]
    pub api_base: Option<String>,

    /// Never prompt for input; fail if no API key is found
    #[arg(long)]
    pub no_input: bool,
}
