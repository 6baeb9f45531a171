//! Comment-triggered actions and their handlers.
//!
//! Users drive the service with `/packit <command>` comments. The first
//! command word selects a [`CommentAction`]; the [`CommentActionRegistry`]
//! maps each action to the handler responsible for it. The registry is
//! built explicitly at start-up (see [`CommentActionRegistry::standard`])
//! and is read-only afterwards.

use crate::events::{Event, TriggerType};
use crate::IntakeError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

/// Mark that introduces a command in a comment
pub const PACKIT_COMMAND_MARK: &str = "/packit";

/// Words kept after the mark; the last one holds the rest of the comment.
const MAX_COMMAND_WORDS: usize = 3;

// ============================================================================
// Errors
// ============================================================================

/// Error raised when looking up a handler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("No handler registered for action '{action}'")]
    NotRegistered { action: CommentAction },
}

/// Reasons a comment does not yield a usable command.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("comment '{comment}' is empty.")]
    Empty { comment: String },

    #[error("comment '{comment}' is not handled by packit-service.")]
    NotHandled { comment: String },

    #[error("comment '{comment}' does not contain a packit-service command.")]
    NoCommand { comment: String },

    #[error("'{command}' is not a packit-service command.")]
    UnknownCommand { command: String },
}

impl CommandError {
    /// Get user-friendly error description
    pub fn get_user_message(&self) -> String {
        match self {
            CommandError::UnknownCommand { command } => format!(
                "'{}' is not a valid command. Known commands: {}.",
                command,
                CommentAction::ALL
                    .iter()
                    .map(CommentAction::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            _ => self.to_string(),
        }
    }
}

// ============================================================================
// CommentAction
// ============================================================================

/// Actions a user can request in a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommentAction {
    CoprBuild,
    ProposeUpdate,
    Test,
    Build,
}

impl CommentAction {
    pub const ALL: [CommentAction; 4] = [
        CommentAction::CoprBuild,
        CommentAction::ProposeUpdate,
        CommentAction::Test,
        CommentAction::Build,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CommentAction::CoprBuild => "copr-build",
            CommentAction::ProposeUpdate => "propose-update",
            CommentAction::Test => "test",
            CommentAction::Build => "build",
        }
    }

    /// Action for a command word as typed in a comment.
    ///
    /// `copr_build` is accepted as well as `copr-build`.
    pub fn from_command_word(word: &str) -> Option<Self> {
        let word = word.replace('_', "-");
        Self::ALL.into_iter().find(|a| a.as_str() == word)
    }
}

impl fmt::Display for CommentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommentAction {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_command_word(s).ok_or_else(|| CommandError::UnknownCommand {
            command: s.to_string(),
        })
    }
}

// ============================================================================
// Command parsing
// ============================================================================

/// Words following the `/packit` mark in a comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackitCommand {
    words: Vec<String>,
}

impl PackitCommand {
    /// Command word, e.g. `copr-build`
    pub fn command(&self) -> &str {
        &self.words[0]
    }

    /// Words after the command word
    pub fn arguments(&self) -> &[String] {
        &self.words[1..]
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    /// Action requested by the command word.
    pub fn action(&self) -> Result<CommentAction, CommandError> {
        self.command().parse()
    }
}

/// Extract the `/packit` command from a comment.
///
/// The mark may appear anywhere in the comment; everything before it is
/// ignored. At most three words are kept after the mark, the last of them
/// holding the remainder of the comment.
pub fn find_packit_command(comment: &str) -> Result<PackitCommand, CommandError> {
    let comment = comment.trim();
    if comment.is_empty() {
        return Err(CommandError::Empty {
            comment: comment.to_string(),
        });
    }

    let not_handled = || CommandError::NotHandled {
        comment: comment.to_string(),
    };
    let start = comment.find(PACKIT_COMMAND_MARK).ok_or_else(not_handled)?;
    let mut parts = split_words(&comment[start..], MAX_COMMAND_WORDS + 1).into_iter();
    if parts.next() != Some(PACKIT_COMMAND_MARK) {
        return Err(not_handled());
    }

    let words: Vec<String> = parts.map(str::to_string).collect();
    if words.is_empty() {
        return Err(CommandError::NoCommand {
            comment: comment.to_string(),
        });
    }
    debug!(?words, "Found packit command");
    Ok(PackitCommand { words })
}

/// Split on whitespace into at most `limit` parts.
fn split_words(text: &str, limit: usize) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut rest = text.trim_start();
    while !rest.is_empty() {
        if parts.len() + 1 == limit {
            parts.push(rest);
            break;
        }
        match rest.split_once(char::is_whitespace) {
            Some((word, tail)) => {
                parts.push(word);
                rest = tail.trim_start();
            }
            None => {
                parts.push(rest);
                break;
            }
        }
    }
    parts
}

// ============================================================================
// Handlers
// ============================================================================

/// A job handler reachable through a comment action.
pub trait CommentActionHandler: Send + Sync + fmt::Debug {
    /// Action the handler is registered under unless aliased
    fn default_action(&self) -> CommentAction;

    fn name(&self) -> &'static str;

    /// Worker task that runs the handler
    fn task_name(&self) -> &'static str;

    fn triggers(&self) -> &'static [TriggerType];

    /// Canonical event types the handler can work with
    fn event_types(&self) -> &'static [&'static str];

    fn accepts(&self, event: &Event) -> bool {
        self.triggers().contains(&event.trigger()) && self.event_types().contains(&event.event_type())
    }
}

/// Builds in Copr for a pull or merge request comment.
#[derive(Debug, Clone, Copy, Default)]
pub struct PullRequestCommentCoprBuildHandler;

impl CommentActionHandler for PullRequestCommentCoprBuildHandler {
    fn default_action(&self) -> CommentAction {
        CommentAction::CoprBuild
    }

    fn name(&self) -> &'static str {
        "pull_request_comment_copr_build"
    }

    fn task_name(&self) -> &'static str {
        "task.run_copr_build_handler"
    }

    fn triggers(&self) -> &'static [TriggerType] {
        &[TriggerType::Comment]
    }

    fn event_types(&self) -> &'static [&'static str] {
        &[
            "pull_request_comment_github",
            "merge_request_comment_gitlab",
            "pull_request_comment_pagure",
        ]
    }
}

/// Proposes a new upstream release downstream, requested on an issue.
#[derive(Debug, Clone, Copy, Default)]
pub struct IssueCommentProposeUpdateHandler;

impl CommentActionHandler for IssueCommentProposeUpdateHandler {
    fn default_action(&self) -> CommentAction {
        CommentAction::ProposeUpdate
    }

    fn name(&self) -> &'static str {
        "issue_comment_propose_update"
    }

    fn task_name(&self) -> &'static str {
        "task.run_propose_downstream_comment_handler"
    }

    fn triggers(&self) -> &'static [TriggerType] {
        &[TriggerType::Comment]
    }

    fn event_types(&self) -> &'static [&'static str] {
        &["issue_comment_github", "issue_comment_gitlab"]
    }
}

/// Runs tests in Testing Farm for a pull or merge request comment.
#[derive(Debug, Clone, Copy, Default)]
pub struct PullRequestCommentTestingFarmHandler;

impl CommentActionHandler for PullRequestCommentTestingFarmHandler {
    fn default_action(&self) -> CommentAction {
        CommentAction::Test
    }

    fn name(&self) -> &'static str {
        "pull_request_comment_testing_farm"
    }

    fn task_name(&self) -> &'static str {
        "task.run_testing_farm_handler"
    }

    fn triggers(&self) -> &'static [TriggerType] {
        &[TriggerType::Comment]
    }

    fn event_types(&self) -> &'static [&'static str] {
        &["pull_request_comment_github", "merge_request_comment_gitlab"]
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Mapping from comment action to handler.
///
/// When an action is registered twice the later registration replaces
/// the earlier one.
#[derive(Debug, Clone, Default)]
pub struct CommentActionRegistry {
    handlers: HashMap<CommentAction, Arc<dyn CommentActionHandler>>,
}

impl CommentActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the handlers the service ships with.
    ///
    /// `build` is an alias of `copr-build`.
    pub fn standard() -> Self {
        let copr_build: Arc<dyn CommentActionHandler> = Arc::new(PullRequestCommentCoprBuildHandler);

        let mut registry = Self::new();
        registry.register(copr_build.clone());
        registry.register_as(CommentAction::Build, copr_build);
        registry.register(Arc::new(IssueCommentProposeUpdateHandler));
        registry.register(Arc::new(PullRequestCommentTestingFarmHandler));
        registry
    }

    /// Register a handler under its default action.
    ///
    /// Returns the handler previously registered for that action.
    pub fn register(
        &mut self,
        handler: Arc<dyn CommentActionHandler>,
    ) -> Option<Arc<dyn CommentActionHandler>> {
        let action = handler.default_action();
        self.register_as(action, handler)
    }

    /// Register a handler under an explicit action.
    pub fn register_as(
        &mut self,
        action: CommentAction,
        handler: Arc<dyn CommentActionHandler>,
    ) -> Option<Arc<dyn CommentActionHandler>> {
        debug!(action = %action, handler = handler.name(), "Registering comment action handler");
        let previous = self.handlers.insert(action, handler);
        if let Some(previous) = &previous {
            info!(
                action = %action,
                replaced = previous.name(),
                "Comment action handler overridden"
            );
        }
        previous
    }

    /// Handler for `action`.
    ///
    /// Callers are expected to check [`contains`](Self::contains) first;
    /// an unregistered action is an error.
    pub fn get(&self, action: CommentAction) -> Result<Arc<dyn CommentActionHandler>, RegistryError> {
        self.handlers
            .get(&action)
            .cloned()
            .ok_or(RegistryError::NotRegistered { action })
    }

    pub fn contains(&self, action: CommentAction) -> bool {
        self.handlers.contains_key(&action)
    }

    /// Registered actions ordered by name
    pub fn actions(&self) -> Vec<CommentAction> {
        let mut actions: Vec<CommentAction> = self.handlers.keys().copied().collect();
        actions.sort_by_key(|a| a.as_str());
        actions
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Resolve a comment body to its action and handler.
    ///
    /// # Errors
    ///
    /// Returns [`IntakeError::Command`] when the comment holds no known
    /// command and [`IntakeError::Registry`] when the action has no handler.
    pub fn resolve_comment(
        &self,
        comment: &str,
    ) -> Result<(CommentAction, Arc<dyn CommentActionHandler>), IntakeError> {
        let action = find_packit_command(comment)?.action()?;
        let handler = self.get(action)?;
        Ok((action, handler))
    }
}

#[cfg(test)]
#[path = "comment_actions_tests.rs"]
mod tests;
