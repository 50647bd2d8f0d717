//! Dialogue session: the per-user state of one scripted flow.
//!
//! A session is a plain value: `DialogueSession::start` builds a fresh one,
//! and the engine mutates it through the crate-private methods below. Nothing
//! here talks to the network.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::llm::{ChatMessage, Role};

use super::flows::{Flow, FlowKind, FlowStep};

/// Where a dialogue is in its flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "step", rename_all = "snake_case")]
pub enum DialogueState {
    /// Waiting for the answer to step `i` (0-based).
    AwaitingStep(usize),
    /// Every step has been answered.
    Complete,
}

impl DialogueState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

impl std::fmt::Display for DialogueState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AwaitingStep(i) => write!(f, "awaiting_step({i})"),
            Self::Complete => write!(f, "complete"),
        }
    }
}

/// One recorded answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Answer {
    pub key: &'static str,
    pub value: String,
}

/// Answers keyed by step key, in the order they were given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Answers {
    entries: Vec<Answer>,
}

impl Answers {
    /// Record `value` under `key`. Each key is written at most once; returns
    /// false (and keeps the first value) if the key is already present.
    pub fn record(&mut self, key: &'static str, value: impl Into<String>) -> bool {
        if self.get(key).is_some() {
            return false;
        }
        self.entries.push(Answer {
            key,
            value: value.into(),
        });
        true
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|a| a.key == key)
            .map(|a| a.value.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Answer> {
        self.entries.iter()
    }

    pub fn keys(&self) -> Vec<&'static str> {
        self.entries.iter().map(|a| a.key).collect()
    }

    /// `- key: value` lines, one per answer, in insertion order.
    pub fn summary_lines(&self) -> String {
        self.entries
            .iter()
            .map(|a| format!("- {}: {}\n", a.key, a.value))
            .collect()
    }
}

/// State of one run through one flow.
#[derive(Debug, Clone, Serialize)]
pub struct DialogueSession {
    id: Uuid,
    flow: FlowKind,
    step_index: usize,
    answers: Answers,
    messages: Vec<ChatMessage>,
    final_output: Option<String>,
    started_at: DateTime<Utc>,
}

impl DialogueSession {
    /// Fresh session seeded with the persona instruction and the first
    /// question.
    pub fn start(flow: FlowKind) -> Self {
        let definition = flow.flow();
        let mut messages = vec![ChatMessage::system(definition.persona)];
        if let Some(first) = definition.step(0) {
            messages.push(ChatMessage::assistant(first.prompt));
        }
        Self {
            id: Uuid::new_v4(),
            flow,
            step_index: 0,
            answers: Answers::default(),
            messages,
            final_output: None,
            started_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn flow_kind(&self) -> FlowKind {
        self.flow
    }

    pub fn flow(&self) -> &'static Flow {
        self.flow.flow()
    }

    /// 0-based index of the step being answered; equals the step count once
    /// the flow is complete.
    pub fn step_index(&self) -> usize {
        self.step_index
    }

    pub fn state(&self) -> DialogueState {
        if self.step_index >= self.flow().len() {
            DialogueState::Complete
        } else {
            DialogueState::AwaitingStep(self.step_index)
        }
    }

    pub fn is_complete(&self) -> bool {
        self.state().is_terminal()
    }

    /// Number of steps still unanswered.
    pub fn remaining(&self) -> usize {
        self.flow().len().saturating_sub(self.step_index)
    }

    /// The step awaiting an answer, if any.
    pub fn current_step(&self) -> Option<&'static FlowStep> {
        self.flow().step(self.step_index)
    }

    pub fn answers(&self) -> &Answers {
        &self.answers
    }

    /// Full history, system message included.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// History without system messages, as shown to the user.
    pub fn visible_messages(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter().filter(|m| m.role != Role::System)
    }

    pub fn final_output(&self) -> Option<&str> {
        self.final_output.as_deref()
    }

    pub fn is_finalized(&self) -> bool {
        self.final_output.is_some()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub(crate) fn push_message(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Record `reply` against the current step. Returns the key it was stored
    /// under, or `None` if the flow is already complete.
    pub(crate) fn record_reply(&mut self, reply: &str) -> Option<&'static str> {
        let step = self.current_step()?;
        self.answers.record(step.key, reply);
        Some(step.key)
    }

    /// Move past the current step. Never goes beyond the step count.
    pub(crate) fn advance(&mut self) -> DialogueState {
        if self.step_index < self.flow().len() {
            self.step_index += 1;
        }
        self.state()
    }

    pub(crate) fn set_final_output(&mut self, text: String) {
        self.final_output = Some(text);
    }
}
