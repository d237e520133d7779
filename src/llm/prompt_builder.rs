use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use crate::error::{AppError, Result};
use crate::llm::prompts;

/// How many past commit messages the `mimic` template shows.
pub const MIMIC_HISTORY: usize = 5;

pub struct PromptPair {
    pub system: String,
    pub user: String,
}

/// The fixed set of prompt templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    Default,
    Refactoring,
    Documentation,
    Mimic,
}

impl Template {
    pub const ALL: [Template; 4] = [
        Template::Default,
        Template::Refactoring,
        Template::Documentation,
        Template::Mimic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Template::Default => "default",
            Template::Refactoring => "refactoring",
            Template::Documentation => "documentation",
            Template::Mimic => "mimic",
        }
    }

    pub fn needs_history(&self) -> bool {
        matches!(self, Template::Mimic)
    }
}

impl FromStr for Template {
    type Err = AppError;

    fn from_str(name: &str) -> Result<Self> {
        Template::ALL
            .into_iter()
            .find(|t| t.as_str() == name)
            .ok_or_else(|| AppError::UnknownTemplate(name.to_string()))
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse `template_name` and compose the prompt in one step.
pub fn build(
    template_name: &str,
    diff: &str,
    recent: &[String],
    max_diff_chars: usize,
) -> Result<PromptPair> {
    let template = template_name.parse::<Template>()?;
    Ok(compose(template, diff, recent, max_diff_chars))
}

pub fn compose(
    template: Template,
    diff: &str,
    recent: &[String],
    max_diff_chars: usize,
) -> PromptPair {
    let instructions: Cow<'static, str> = match template {
        Template::Default => prompts::DEFAULT.into(),
        Template::Refactoring => prompts::REFACTORING.into(),
        Template::Documentation => prompts::DOCUMENTATION.into(),
        Template::Mimic => mimic_instructions(recent).into(),
    };

    let user = format!(
        "{instructions}\n\n{header}\n{diff}\n",
        header = prompts::DIFF_HEADER,
        diff = cap_diff(diff, max_diff_chars)
    );

    PromptPair {
        system: prompts::SYSTEM.to_owned(),
        user,
    }
}

fn mimic_instructions(recent: &[String]) -> String {
    let mut out = String::from(prompts::MIMIC_HEAD);
    out.push_str("\n\n");

    if !recent.is_empty() {
        let examples = recent
            .iter()
            .enumerate()
            .map(|(i, msg)| format!("Example {} - {}", i + 1, msg.trim()))
            .collect::<Vec<_>>()
            .join("\n\n");
        out.push_str(&format!("Recent commits:\n{examples}\n\n"));
    }

    out.push_str(prompts::MIMIC_TAIL);
    out
}

/// Keep at most `max_chars` characters of the diff; `0` means no cap.
pub fn cap_diff(diff: &str, max_chars: usize) -> Cow<'_, str> {
    if max_chars == 0 {
        return Cow::Borrowed(diff);
    }

    match diff.char_indices().nth(max_chars) {
        None => Cow::Borrowed(diff),
        Some((cut, _)) => {
            log::warn!("Staged diff is longer than {max_chars} characters; truncating");
            Cow::Owned(format!(
                "{}\n(cut off at {max_chars} characters)",
                &diff[..cut]
            ))
        }
    }
}
