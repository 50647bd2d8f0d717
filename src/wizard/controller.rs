//! Session controller: top-level orchestration of one user's session.
//!
//! Owns the active mode, the composite cursor and the current
//! `DialogueSession`. Every operation returns a `Transition`; errors are
//! turned into notices here and never reach the caller.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{CredentialFailure, CredentialFailureKind, WizardError, display_index};

use super::engine::{ContextualReply, DialogueEngine};
use super::flows::FlowKind;
use super::session::DialogueSession;
use super::view::{AvailableActions, CompositePosition, Notice, SessionView, Transition};

/// Top-level mode selected by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Material,
    House,
    /// House layout first, then materials.
    Composite,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Material => write!(f, "material"),
            Self::House => write!(f, "house"),
            Self::Composite => write!(f, "composite"),
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "material" | "materials" => Ok(Self::Material),
            "house" | "layout" => Ok(Self::House),
            "both" | "composite" => Ok(Self::Composite),
            other => Err(format!(
                "unknown mode '{other}' (expected material, house or both)"
            )),
        }
    }
}

/// Sub-flows of composite mode, in order.
pub const COMPOSITE_FLOWS: [FlowKind; 2] = [FlowKind::House, FlowKind::Material];

/// Cursor over `COMPOSITE_FLOWS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompositeSequence {
    cursor: usize,
}

impl CompositeSequence {
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current(&self) -> FlowKind {
        COMPOSITE_FLOWS[self.cursor]
    }

    /// The sub-flow after the current one, if any.
    pub fn next(&self) -> Option<FlowKind> {
        COMPOSITE_FLOWS.get(self.cursor + 1).copied()
    }

    pub fn is_last(&self) -> bool {
        self.next().is_none()
    }

    /// Move to the next sub-flow; `None` (and no change) at the end.
    pub fn advance(&mut self) -> Option<FlowKind> {
        let next = self.next()?;
        self.cursor += 1;
        Some(next)
    }

    pub fn rewind(&mut self) {
        self.cursor = 0;
    }
}

/// One user's session: mode, composite cursor and the active dialogue.
pub struct SessionController {
    engine: DialogueEngine,
    mode: Mode,
    composite: CompositeSequence,
    session: DialogueSession,
}

impl SessionController {
    pub fn new(engine: DialogueEngine, mode: Mode) -> Self {
        let composite = CompositeSequence::default();
        let session = DialogueSession::start(active_flow(mode, &composite));
        Self {
            engine,
            mode,
            composite,
            session,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn session(&self) -> &DialogueSession {
        &self.session
    }

    /// The composite cursor, when in composite mode.
    pub fn composite(&self) -> Option<&CompositeSequence> {
        (self.mode == Mode::Composite).then_some(&self.composite)
    }

    pub fn engine(&self) -> &DialogueEngine {
        &self.engine
    }

    /// Switch mode. A different mode discards all progress; the same mode is
    /// a no-op.
    pub fn select_mode(&mut self, mode: Mode) -> Transition {
        if mode == self.mode {
            return self.transition(Vec::new());
        }
        info!(from = %self.mode, to = %mode, "Mode switched; discarding session");
        self.mode = mode;
        self.restart();
        self.transition(vec![Notice::info(format!(
            "Switched to {}.",
            self.session.flow().title
        ))])
    }

    /// Route one user reply into the active dialogue.
    pub async fn submit_reply(&mut self, text: &str) -> Transition {
        if text.trim().is_empty() {
            return self.transition(vec![Notice::info("Type a reply to continue.")]);
        }

        let outcome = self.engine.reply(&mut self.session, text).await;

        let mut notices = Vec::new();
        match &outcome.contextual {
            ContextualReply::Generated(dispatched) => {
                notices.extend(failure_notices(&dispatched.failures));
            }
            ContextualReply::Failed(e) => {
                if let crate::error::DispatchError::Exhausted { failures, .. } = e {
                    notices.extend(failure_notices(failures));
                }
                notices.push(Notice::warning(
                    "AI provider failed. If this continues, check your API keys.",
                ));
            }
            ContextualReply::Skipped => {}
        }
        if outcome.state.is_terminal() && outcome.recorded_key.is_some() {
            notices.push(Notice::info(
                "All questions answered. Use /finalize to generate the final output.",
            ));
        }
        self.transition(notices)
    }

    /// Generate the final output for the active flow.
    pub async fn finalize(&mut self) -> Transition {
        match self.engine.finalize(&mut self.session).await {
            Ok(dispatched) => {
                let mut notices = failure_notices(&dispatched.failures);
                if self.mode == Mode::Composite {
                    notices.push(Notice::info(match self.composite.next() {
                        Some(next) => format!("Use /next to continue with the {next} flow."),
                        None => "Use /finish to wrap up and start over.".to_string(),
                    }));
                }
                self.transition(notices)
            }
            Err(e) => {
                let mut notices = match &e {
                    WizardError::Dispatch(crate::error::DispatchError::Exhausted {
                        failures, ..
                    }) => failure_notices(failures),
                    _ => Vec::new(),
                };
                notices.push(Notice::error(e.to_string()));
                self.transition(notices)
            }
        }
    }

    /// Composite mode: move to the next sub-flow after finalizing this one.
    pub fn proceed(&mut self) -> Transition {
        match self.try_proceed() {
            Ok(next) => {
                info!(flow = %next, cursor = self.composite.cursor(), "Proceeding to next flow");
                self.transition(vec![Notice::info(format!(
                    "Starting {}.",
                    next.flow().title
                ))])
            }
            Err(e) => self.transition(vec![Notice::error(e.to_string())]),
        }
    }

    fn try_proceed(&mut self) -> Result<FlowKind, WizardError> {
        if self.mode != Mode::Composite {
            return Err(WizardError::NoCompositeFlow);
        }
        if !self.session.is_finalized() {
            return Err(WizardError::NotFinalized {
                flow: self.session.flow_kind().to_string(),
            });
        }
        let next = self.composite.advance().ok_or(WizardError::NoNextFlow)?;
        self.session = DialogueSession::start(next);
        Ok(next)
    }

    /// Composite mode: after the last sub-flow is finalized, clear everything
    /// and return to the first sub-flow.
    pub fn finish(&mut self) -> Transition {
        match self.try_finish() {
            Ok(()) => {
                info!("Composite sequence finished; state cleared");
                self.transition(vec![Notice::info("All flows finished. Starting over.")])
            }
            Err(e) => self.transition(vec![Notice::error(e.to_string())]),
        }
    }

    fn try_finish(&mut self) -> Result<(), WizardError> {
        if self.mode != Mode::Composite {
            return Err(WizardError::NoCompositeFlow);
        }
        if let Some(next) = self.composite.next() {
            return Err(WizardError::NotLastFlow {
                next: next.to_string(),
            });
        }
        if !self.session.is_finalized() {
            return Err(WizardError::NotFinalized {
                flow: self.session.flow_kind().to_string(),
            });
        }
        self.restart();
        Ok(())
    }

    /// Start the current mode over from its first question.
    pub fn reset(&mut self) -> Transition {
        info!(mode = %self.mode, "Session reset");
        self.restart();
        self.transition(vec![Notice::info("Conversation reset.")])
    }

    /// Snapshot for rendering.
    pub fn view(&self) -> SessionView {
        let session = &self.session;
        let flow = session.flow();
        let pool = self.engine.dispatcher().pool();
        let composite = self.composite();

        let actions = AvailableActions {
            finalize: session.is_complete(),
            proceed: composite.is_some_and(|c| !c.is_last()) && session.is_finalized(),
            finish: composite.is_some_and(|c| c.is_last()) && session.is_finalized(),
        };

        SessionView {
            session_id: session.id(),
            mode: self.mode,
            flow: session.flow_kind(),
            flow_title: flow.title,
            composite: composite.map(|c| CompositePosition {
                index: c.cursor(),
                flows: COMPOSITE_FLOWS.to_vec(),
            }),
            state: session.state(),
            step_index: session.step_index(),
            total_steps: flow.len(),
            answered: session.answers().len(),
            finalized: session.is_finalized(),
            actions,
            credential_count: pool.len(),
            enabled_credentials: pool.enabled_count(),
            messages: session.visible_messages().cloned().collect(),
            final_output: session.final_output().map(str::to_string),
        }
    }

    fn restart(&mut self) {
        self.composite.rewind();
        self.session = DialogueSession::start(active_flow(self.mode, &self.composite));
    }

    fn transition(&self, notices: Vec<Notice>) -> Transition {
        Transition {
            view: self.view(),
            notices,
        }
    }
}

fn active_flow(mode: Mode, composite: &CompositeSequence) -> FlowKind {
    match mode {
        Mode::Material => FlowKind::Material,
        Mode::House => FlowKind::House,
        Mode::Composite => composite.current(),
    }
}

/// One warning per key whose request failed. Uninitialized keys are silent.
fn failure_notices(failures: &[CredentialFailure]) -> Vec<Notice> {
    failures
        .iter()
        .filter(|f| matches!(f.kind, CredentialFailureKind::Request(_)))
        .map(|f| {
            Notice::warning(format!(
                "API key #{} raised {}; trying next key.",
                display_index(f.index),
                f.category()
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses_aliases() {
        assert_eq!("Material".parse::<Mode>(), Ok(Mode::Material));
        assert_eq!("layout".parse::<Mode>(), Ok(Mode::House));
        assert_eq!(" both ".parse::<Mode>(), Ok(Mode::Composite));
        assert!("garden".parse::<Mode>().is_err());
    }

    #[test]
    fn composite_sequence_walks_house_then_material() {
        let mut seq = CompositeSequence::default();
        assert_eq!(seq.current(), FlowKind::House);
        assert_eq!(seq.next(), Some(FlowKind::Material));
        assert!(!seq.is_last());

        assert_eq!(seq.advance(), Some(FlowKind::Material));
        assert_eq!(seq.cursor(), 1);
        assert!(seq.is_last());
        assert_eq!(seq.advance(), None);
        assert_eq!(seq.cursor(), 1);

        seq.rewind();
        assert_eq!(seq.current(), FlowKind::House);
    }

    #[test]
    fn failure_notices_skip_uninitialized_keys() {
        let failures = vec![
            CredentialFailure {
                index: 0,
                kind: CredentialFailureKind::NotInitialized,
            },
            CredentialFailure {
                index: 1,
                kind: CredentialFailureKind::Request(crate::error::LlmError::AuthFailed {
                    provider: "groq".to_string(),
                }),
            },
        ];
        let notices = failure_notices(&failures);
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].text, "API key #2 raised auth_failed; trying next key.");
    }
}
