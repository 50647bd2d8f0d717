//! View effects returned by the session controller.
//!
//! Every controller operation returns a `Transition`: a full snapshot of what
//! the presentation layer should render plus any notices to show alongside.

use serde::Serialize;
use uuid::Uuid;

use crate::llm::ChatMessage;

use super::controller::Mode;
use super::flows::FlowKind;
use super::session::DialogueState;

/// Severity of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A message for the user that is not part of the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            text: text.into(),
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            text: text.into(),
        }
    }
}

/// Position within the house-then-material sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompositePosition {
    /// 0-based index of the active sub-flow.
    pub index: usize,
    pub flows: Vec<FlowKind>,
}

/// Which discrete actions the user can trigger right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct AvailableActions {
    pub finalize: bool,
    pub proceed: bool,
    pub finish: bool,
}

/// Snapshot of a session for rendering.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub mode: Mode,
    pub flow: FlowKind,
    pub flow_title: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub composite: Option<CompositePosition>,
    pub state: DialogueState,
    pub step_index: usize,
    pub total_steps: usize,
    pub answered: usize,
    pub finalized: bool,
    pub actions: AvailableActions,
    /// Configured API keys, disabled ones included.
    pub credential_count: usize,
    pub enabled_credentials: usize,
    /// Conversation without system messages.
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_output: Option<String>,
}

/// Result of one controller operation.
#[derive(Debug, Clone, Serialize)]
pub struct Transition {
    pub view: SessionView,
    pub notices: Vec<Notice>,
}

impl Transition {
    pub fn has_errors(&self) -> bool {
        self.notices.iter().any(|n| n.level == NoticeLevel::Error)
    }
}
