//! Interactive prompt protocol.
//!
//! Every question the tool asks goes through a [`Prompter`] as a
//! [`PromptRequest`] and comes back as a [`PromptResponse`], so callers never
//! depend on the shape of a particular terminal library's answers.

use std::{
    cell::RefCell,
    collections::VecDeque,
    io::IsTerminal,
};

use anyhow::Result;
use dialoguer::{Confirm, Input, Select, theme::ColorfulTheme};

use crate::core::error::ForkError;

/// A question to ask the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptRequest
{
    /// Pick exactly one of `options`
    SingleChoice
    {
        message: String,
        options: Vec<String>,
    },

    /// Answer yes or no; `default` is preselected
    Confirm
    {
        message: String,
        default: bool,
    },

    /// Type a line of text
    FreeText
    {
        message: String,
    },
}

/// The user's answer to a [`PromptRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptResponse
{
    /// Index into `SingleChoice::options`
    Choice(usize),

    /// Answer to `Confirm`
    Confirmed(bool),

    /// Answer to `FreeText`
    Text(String),

    /// The user dismissed the prompt (Esc / Ctrl-C)
    Cancelled,

    /// No terminal is attached; nobody can answer
    Unavailable,
}

/// Something that can answer prompts.
pub trait Prompter
{
    fn ask(
        &self,
        request: &PromptRequest,
    ) -> Result<PromptResponse>;
}

/// Ask a single-choice question; `None` when no one can answer.
pub fn choose(
    prompter: &dyn Prompter,
    message: &str,
    options: &[String],
) -> Result<Option<usize>>
{
    let req = PromptRequest::SingleChoice {
        message: message.to_string(),
        options: options.to_vec(),
    };

    match prompter.ask(&req)?
    {
        PromptResponse::Choice(i) if i < options.len() => Ok(Some(i)),
        PromptResponse::Cancelled => Err(ForkError::Cancelled.into()),
        PromptResponse::Unavailable => Ok(None),
        other => anyhow::bail!("unexpected answer {other:?} to a selection prompt"),
    }
}

/// Ask a yes/no question; `None` when no one can answer.
pub fn confirm(
    prompter: &dyn Prompter,
    message: &str,
    default: bool,
) -> Result<Option<bool>>
{
    let req = PromptRequest::Confirm { message: message.to_string(), default };

    match prompter.ask(&req)?
    {
        PromptResponse::Confirmed(yes) => Ok(Some(yes)),
        PromptResponse::Cancelled => Err(ForkError::Cancelled.into()),
        PromptResponse::Unavailable => Ok(None),
        other => anyhow::bail!("unexpected answer {other:?} to a confirmation prompt"),
    }
}

/// Ask for a line of text; `None` when no one can answer.
pub fn text(
    prompter: &dyn Prompter,
    message: &str,
) -> Result<Option<String>>
{
    let req = PromptRequest::FreeText { message: message.to_string() };

    match prompter.ask(&req)?
    {
        PromptResponse::Text(s) => Ok(Some(s)),
        PromptResponse::Cancelled => Err(ForkError::Cancelled.into()),
        PromptResponse::Unavailable => Ok(None),
        other => anyhow::bail!("unexpected answer {other:?} to a text prompt"),
    }
}

/// Terminal prompts backed by dialoguer; answers `Unavailable` when stdin or
/// stderr is not a terminal.
pub struct TerminalPrompter
{
    theme: ColorfulTheme,
    interactive: bool,
}

impl TerminalPrompter
{
    pub fn new() -> Self
    {
        Self {
            theme: ColorfulTheme::default(),
            interactive: std::io::stdin().is_terminal() && std::io::stderr().is_terminal(),
        }
    }
}

impl Default for TerminalPrompter
{
    fn default() -> Self
    {
        Self::new()
    }
}

impl Prompter for TerminalPrompter
{
    fn ask(
        &self,
        request: &PromptRequest,
    ) -> Result<PromptResponse>
    {
        if !self.interactive
        {
            return Ok(PromptResponse::Unavailable);
        }

        // dialoguer reports Esc/Ctrl-C as `None` from the *_opt variants
        let answer = match request
        {
            PromptRequest::SingleChoice { message, options } => Select::with_theme(&self.theme)
                .with_prompt(message)
                .items(options.as_slice())
                .default(0)
                .interact_opt()?
                .map(PromptResponse::Choice),
            PromptRequest::Confirm { message, default } => Confirm::with_theme(&self.theme)
                .with_prompt(message)
                .default(*default)
                .interact_opt()?
                .map(PromptResponse::Confirmed),
            PromptRequest::FreeText { message } => Some(PromptResponse::Text(
                Input::<String>::with_theme(&self.theme)
                    .with_prompt(message)
                    .allow_empty(true)
                    .interact_text()?,
            )),
        };

        Ok(answer.unwrap_or(PromptResponse::Cancelled))
    }
}

/// Replays canned answers in order; answers `Unavailable` once exhausted.
/// Records every request it was asked.
#[derive(Debug, Default)]
pub struct ScriptedPrompter
{
    answers: RefCell<VecDeque<PromptResponse>>,
    asked: RefCell<Vec<PromptRequest>>,
}

impl ScriptedPrompter
{
    pub fn new(answers: impl IntoIterator<Item = PromptResponse>) -> Self
    {
        Self {
            answers: RefCell::new(answers.into_iter().collect()),
            asked: RefCell::new(Vec::new()),
        }
    }

    /// A prompter with no answers, behaving like a detached terminal.
    pub fn detached() -> Self
    {
        Self::default()
    }

    /// Requests received so far.
    pub fn asked(&self) -> Vec<PromptRequest>
    {
        self.asked.borrow().clone()
    }
}

impl Prompter for ScriptedPrompter
{
    fn ask(
        &self,
        request: &PromptRequest,
    ) -> Result<PromptResponse>
    {
        self.asked.borrow_mut().push(request.clone());
        Ok(self
            .answers
            .borrow_mut()
            .pop_front()
            .unwrap_or(PromptResponse::Unavailable))
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn scripted_answers_replay_in_order()
    {
        let p = ScriptedPrompter::new([PromptResponse::Choice(1), PromptResponse::Confirmed(false)]);
        let options = vec!["a".to_string(), "b".to_string()];

        assert_eq!(choose(&p, "pick", &options).unwrap(), Some(1));
        assert_eq!(confirm(&p, "sure?", true).unwrap(), Some(false));
        assert_eq!(text(&p, "name?").unwrap(), None);
        assert_eq!(p.asked().len(), 3);
    }

    #[test]
    fn cancelled_prompt_is_an_error()
    {
        let p = ScriptedPrompter::new([PromptResponse::Cancelled]);
        let err = confirm(&p, "sure?", true).unwrap_err();
        assert!(matches!(err.downcast_ref::<ForkError>(), Some(ForkError::Cancelled)));
    }

    #[test]
    fn out_of_range_choice_is_rejected()
    {
        let p = ScriptedPrompter::new([PromptResponse::Choice(5)]);
        assert!(choose(&p, "pick", &["only".to_string()]).is_err());
    }
}
