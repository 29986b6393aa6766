//! Terminal prompter for the interactive link phase.

use anyhow::Context;
use dialoguer::Input;
use dialoguer::theme::ColorfulTheme;
use submirror_domain::{PromptAnswer, PromptRequest, Prompter};

#[derive(Default)]
pub struct TerminalPrompter {
    theme: ColorfulTheme,
}

impl Prompter for TerminalPrompter {
    fn ask(&mut self, request: &PromptRequest) -> anyhow::Result<PromptAnswer> {
        eprintln!();
        eprintln!(
            "{} ({}): no path for {} in repository {} (review {})",
            request.student, request.login, request.task_path, request.repository, request.review
        );
        for (i, candidate) in request.candidates.iter().enumerate() {
            eprintln!("  {}) {}", i + 1, candidate);
        }

        let hint = match request.candidates.len() {
            0 => "path, or - to skip",
            1 => "number or path; empty takes 1, - skips",
            _ => "number or path; empty or - skips",
        };
        let input: String = Input::with_theme(&self.theme)
            .with_prompt(hint)
            .allow_empty(true)
            .interact_text()
            .context("read answer from terminal")?;
        Ok(PromptAnswer::parse(&input, request.candidates.len()))
    }
}
