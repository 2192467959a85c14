//! Operator interaction for steps that need a human decision.

use anyhow::{Context, Result};
use dialoguer::Confirm;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::IsTerminal;

pub trait Operator {
    /// Ask a yes/no question. `Ok(false)` means the operator declined.
    fn confirm(&self, prompt: &str) -> Result<bool>;
}

/// Prompts on the controlling terminal; declines when there is none.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalOperator;

impl Operator for TerminalOperator {
    fn confirm(&self, prompt: &str) -> Result<bool> {
        if !std::io::stdin().is_terminal() {
            log::warn!("No TTY to ask \"{}\"; treating as declined (use --yes)", prompt);
            return Ok(false);
        }
        Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .context("Failed to read confirmation input")
    }
}

/// Answers yes to everything (`--yes`).
#[derive(Debug, Default, Clone, Copy)]
pub struct AssumeYes;

impl Operator for AssumeYes {
    fn confirm(&self, prompt: &str) -> Result<bool> {
        log::info!("Assuming yes: {}", prompt);
        Ok(true)
    }
}

/// Replays canned answers and records every prompt. Runs out as "no".
#[derive(Debug, Default)]
pub struct ScriptedOperator {
    answers: RefCell<VecDeque<bool>>,
    prompts: RefCell<Vec<String>>,
}

impl ScriptedOperator {
    pub fn new(answers: impl IntoIterator<Item = bool>) -> Self {
        Self {
            answers: RefCell::new(answers.into_iter().collect()),
            prompts: RefCell::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }
}

impl Operator for ScriptedOperator {
    fn confirm(&self, prompt: &str) -> Result<bool> {
        self.prompts.borrow_mut().push(prompt.to_string());
        Ok(self.answers.borrow_mut().pop_front().unwrap_or(false))
    }
}
