//! The linear run: template check, key, diff, prompt, model, print or commit.

use std::io::Write;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use log::debug;

use crate::config::Config;
use crate::error::Result;
use crate::git::{self, Vcs};
use crate::llm::ModelClient;
use crate::llm::prompt_builder::{self, MIMIC_HISTORY, Template};
use crate::secrets::SecretsResolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Init,
    KeyResolved,
    DiffCollected,
    PromptBuilt,
    MessageGenerated,
    Printed,
    Committed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Printed { message: String },
    Committed { message: String, summary: String },
}

pub struct Pipeline<'a> {
    vcs: &'a dyn Vcs,
    secrets: &'a SecretsResolver<'a>,
    model: &'a ModelClient,
    show_progress: bool,
}

impl<'a> Pipeline<'a> {
    pub fn new(vcs: &'a dyn Vcs, secrets: &'a SecretsResolver<'a>, model: &'a ModelClient) -> Self {
        Pipeline {
            vcs,
            secrets,
            model,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn run(&self, cfg: &Config, out: &mut dyn Write) -> Result<Outcome> {
        enter(Stage::Init);
        let template: Template = cfg.template.parse()?;
        let routed = self.model.route(&cfg.model)?;
        debug!(
            "Template {template}, model {} via {}",
            routed.model,
            routed.provider.name()
        );

        let credential = if routed.provider.requires_key() {
            Some(self.secrets.resolve(routed.provider.name())?)
        } else {
            None
        };
        enter(Stage::KeyResolved);

        let diff = git::collect(self.vcs)?;
        enter(Stage::DiffCollected);

        let recent = if template.needs_history() {
            self.vcs.recent_messages(MIMIC_HISTORY)
        } else {
            Vec::new()
        };
        let prompt =
            prompt_builder::build(&cfg.template, diff.as_str(), &recent, cfg.max_diff_chars)?;
        enter(Stage::PromptBuilt);

        let spinner = self.spinner(&cfg.model);
        let generated = self.model.generate(
            &cfg.model,
            &prompt,
            credential.as_ref(),
            cfg.api_base.as_deref(),
        );
        spinner.finish_and_clear();
        let message = generated?;
        enter(Stage::MessageGenerated);

        if cfg.commit {
            let result = git::commit(self.vcs, &message)?;
            enter(Stage::Committed);
            writeln!(out, "{}", result.summary)?;
            return Ok(Outcome::Committed {
                message,
                summary: result.summary,
            });
        }

        writeln!(out, "{message}")?;
        enter(Stage::Printed);
        Ok(Outcome::Printed { message })
    }

    fn spinner(&self, model: &str) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner} {msg} ({elapsed})") {
            pb.set_style(style);
        }
        pb.set_message(format!("Asking {model} for a commit message"));
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }
}

fn enter(stage: Stage) {
    debug!("stage: {stage:?}");
}
