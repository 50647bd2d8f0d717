//! Dialogue engine: drives a `DialogueSession` through its flow.
//!
//! Each user reply appends two assistant messages: a model-generated
//! contextual reply (or an inline error) and the next scripted question (or
//! the completion notice). Progress through the script never depends on what
//! the model says.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{DispatchError, WizardError, display_index};
use crate::llm::{ChatMessage, Dispatched, FailoverDispatcher};

use super::session::{DialogueSession, DialogueState};

/// Whether each reply also asks the model for an acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContextualReplyPolicy {
    /// One model call per reply, in addition to the scripted question.
    #[default]
    Always,
    /// Scripted questions only; the model is called at finalization.
    Never,
}

impl ContextualReplyPolicy {
    pub fn from_enabled(enabled: bool) -> Self {
        if enabled { Self::Always } else { Self::Never }
    }
}

/// What happened to the contextual reply for one turn.
#[derive(Debug)]
pub enum ContextualReply {
    /// The model answered; its text is already in the history.
    Generated(Dispatched),
    /// Every key failed; an inline error message was appended instead.
    Failed(DispatchError),
    /// Disabled by policy.
    Skipped,
}

/// Result of one user reply.
#[derive(Debug)]
pub struct TurnOutcome {
    /// Step key the reply was stored under; `None` after completion.
    pub recorded_key: Option<&'static str>,
    /// State after the turn.
    pub state: DialogueState,
    pub contextual: ContextualReply,
}

/// Stateless driver shared by every session; holds the dispatcher and the
/// model to call.
#[derive(Debug, Clone)]
pub struct DialogueEngine {
    dispatcher: Arc<FailoverDispatcher>,
    model: String,
    policy: ContextualReplyPolicy,
}

impl DialogueEngine {
    pub fn new(dispatcher: Arc<FailoverDispatcher>, model: impl Into<String>) -> Self {
        Self {
            dispatcher,
            model: model.into(),
            policy: ContextualReplyPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ContextualReplyPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn dispatcher(&self) -> &FailoverDispatcher {
        &self.dispatcher
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn policy(&self) -> ContextualReplyPolicy {
        self.policy
    }

    /// Apply one user reply to `session`.
    ///
    /// Never fails: a dispatch failure becomes an inline assistant message
    /// and the script still advances.
    pub async fn reply(&self, session: &mut DialogueSession, text: &str) -> TurnOutcome {
        session.push_message(ChatMessage::user(text));
        let recorded_key = session.record_reply(text);

        let contextual = match self.policy {
            ContextualReplyPolicy::Never => ContextualReply::Skipped,
            ContextualReplyPolicy::Always => {
                match self.dispatcher.send(session.messages(), &self.model).await {
                    Ok(dispatched) => {
                        session.push_message(ChatMessage::assistant(dispatched.text.clone()));
                        ContextualReply::Generated(dispatched)
                    }
                    Err(e) => {
                        warn!(flow = %session.flow_kind(), error = %e, "Contextual reply failed");
                        session.push_message(ChatMessage::assistant(format!(
                            "Error: AI provider failed: {e}"
                        )));
                        ContextualReply::Failed(e)
                    }
                }
            }
        };

        let state = session.advance();
        let flow = session.flow();
        match state {
            DialogueState::AwaitingStep(i) => {
                if let Some(next) = flow.step(i) {
                    session.push_message(ChatMessage::assistant(next.prompt));
                }
            }
            DialogueState::Complete => {
                session.push_message(ChatMessage::assistant(flow.completion_notice));
            }
        }

        info!(
            flow = %session.flow_kind(),
            step = ?recorded_key,
            state = %state,
            "Reply recorded"
        );

        TurnOutcome {
            recorded_key,
            state,
            contextual,
        }
    }

    /// Generate the final recommendation for a completed session.
    ///
    /// Sends a fresh two-message context (persona + answer summary and task),
    /// not the transcript. The result is stored on the session and appended
    /// to its history; on failure an inline error is appended instead.
    pub async fn finalize(&self, session: &mut DialogueSession) -> Result<Dispatched, WizardError> {
        if !session.is_complete() {
            return Err(WizardError::FlowIncomplete {
                remaining: session.remaining(),
            });
        }

        let request = synthesis_request(session);
        match self.dispatcher.send(&request, &self.model).await {
            Ok(dispatched) => {
                info!(
                    flow = %session.flow_kind(),
                    credential = display_index(dispatched.credential_index),
                    "Final output generated"
                );
                session.push_message(ChatMessage::assistant(dispatched.text.clone()));
                session.set_final_output(dispatched.text.clone());
                Ok(dispatched)
            }
            Err(e) => {
                warn!(flow = %session.flow_kind(), error = %e, "Final output failed");
                session.push_message(ChatMessage::assistant(format!(
                    "Error generating final output: {e}"
                )));
                Err(WizardError::Dispatch(e))
            }
        }
    }
}

/// The synthesis context for `session`: the persona as system message, then
/// one user message with the answer summary followed by the flow's task.
pub fn synthesis_request(session: &DialogueSession) -> Vec<ChatMessage> {
    let flow = session.flow();
    let summary = format!(
        "{}\n{}",
        flow.summary_header,
        session.answers().summary_lines()
    );
    vec![
        ChatMessage::system(flow.persona),
        ChatMessage::user(format!("{summary}\n\n{}", flow.task)),
    ]
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::error::LlmError;
    use crate::llm::{
        CompletionRequest, CompletionResponse, CredentialPool, CredentialSlot, FinishReason,
        LlmProvider, Role,
    };
    use crate::wizard::flows::FlowKind;

    /// Records every request and answers with a fixed text, or fails.
    struct RecordingLlm {
        reply: Option<&'static str>,
        requests: Mutex<Vec<Vec<ChatMessage>>>,
    }

    #[async_trait]
    impl LlmProvider for RecordingLlm {
        fn name(&self) -> &str {
            "recording"
        }

        async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            self.requests.lock().unwrap().push(request.messages);
            match self.reply {
                Some(text) => Ok(CompletionResponse {
                    content: text.to_string(),
                    input_tokens: 0,
                    output_tokens: 0,
                    finish_reason: FinishReason::Stop,
                    response_id: None,
                }),
                None => Err(LlmError::RequestFailed {
                    provider: "recording".to_string(),
                    reason: "offline".to_string(),
                }),
            }
        }
    }

    fn engine_with(reply: Option<&'static str>) -> (DialogueEngine, Arc<RecordingLlm>) {
        let llm = Arc::new(RecordingLlm {
            reply,
            requests: Mutex::new(Vec::new()),
        });
        let pool = CredentialPool::from_slots(vec![CredentialSlot::Ready(
            Arc::clone(&llm) as Arc<dyn LlmProvider>
        )]);
        let engine = DialogueEngine::new(Arc::new(FailoverDispatcher::new(pool)), "test-model");
        (engine, llm)
    }

    #[tokio::test]
    async fn reply_appends_three_messages_and_advances() {
        let (engine, llm) = engine_with(Some("Noted."));
        let mut session = DialogueSession::start(FlowKind::Material);

        let outcome = engine.reply(&mut session, "interior").await;

        assert_eq!(outcome.recorded_key, Some("area_type"));
        assert_eq!(outcome.state, DialogueState::AwaitingStep(1));
        assert!(matches!(outcome.contextual, ContextualReply::Generated(_)));

        let msgs = session.messages();
        assert_eq!(msgs.len(), 5);
        assert_eq!(msgs[2], ChatMessage::user("interior"));
        assert_eq!(msgs[3], ChatMessage::assistant("Noted."));
        assert!(msgs[4].content.starts_with("Which country"));

        // The model saw persona + history up to and including the reply.
        let requests = llm.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].len(), 3);
        assert_eq!(requests[0][0].role, Role::System);
        assert_eq!(requests[0][2], ChatMessage::user("interior"));
    }

    #[tokio::test]
    async fn dispatch_failure_becomes_inline_error() {
        let (engine, _llm) = engine_with(None);
        let mut session = DialogueSession::start(FlowKind::House);

        let outcome = engine.reply(&mut session, "new house").await;

        assert!(matches!(outcome.contextual, ContextualReply::Failed(_)));
        assert_eq!(outcome.state, DialogueState::AwaitingStep(1));
        let msgs = session.messages();
        assert!(msgs[3].content.starts_with("Error: AI provider failed:"));
        assert!(msgs[4].content.starts_with("Which country and city"));
        assert_eq!(session.answers().get("purpose"), Some("new house"));
    }

    #[tokio::test]
    async fn policy_never_skips_model_call() {
        let (engine, llm) = engine_with(Some("unused"));
        let engine = engine.with_policy(ContextualReplyPolicy::Never);
        let mut session = DialogueSession::start(FlowKind::Material);

        let outcome = engine.reply(&mut session, "exterior").await;

        assert!(matches!(outcome.contextual, ContextualReply::Skipped));
        assert_eq!(session.messages().len(), 4);
        assert!(llm.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn last_reply_appends_completion_notice() {
        let (engine, _llm) = engine_with(Some("ok"));
        let mut session = DialogueSession::start(FlowKind::Material);
        for i in 0..10 {
            engine.reply(&mut session, &format!("answer {i}")).await;
        }
        assert!(session.is_complete());
        assert_eq!(
            session.messages().last().map(|m| m.content.as_str()),
            Some(FlowKind::Material.flow().completion_notice)
        );
    }

    #[tokio::test]
    async fn reply_after_completion_goes_to_history_only() {
        let (engine, _llm) = engine_with(Some("ok"));
        let mut session = DialogueSession::start(FlowKind::Material);
        for i in 0..10 {
            engine.reply(&mut session, &format!("answer {i}")).await;
        }
        let before = session.messages().len();

        let outcome = engine.reply(&mut session, "one more thing").await;

        assert_eq!(outcome.recorded_key, None);
        assert_eq!(outcome.state, DialogueState::Complete);
        assert_eq!(session.answers().len(), 10);
        assert_eq!(session.step_index(), 10);
        assert_eq!(session.messages().len(), before + 3);
    }

    #[tokio::test]
    async fn finalize_before_completion_is_rejected() {
        let (engine, llm) = engine_with(Some("ok"));
        let mut session = DialogueSession::start(FlowKind::House);
        engine.reply(&mut session, "new").await;

        let err = engine.finalize(&mut session).await.unwrap_err();
        assert!(matches!(err, WizardError::FlowIncomplete { remaining: 14 }));
        // Only the contextual reply went out.
        assert_eq!(llm.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn finalize_sends_fresh_two_message_context() {
        let (engine, llm) = engine_with(Some("Plan A / Plan B"));
        let engine = engine.with_policy(ContextualReplyPolicy::Never);
        let mut session = DialogueSession::start(FlowKind::House);
        for i in 0..15 {
            engine.reply(&mut session, &format!("a{i}")).await;
        }

        let dispatched = engine.finalize(&mut session).await.unwrap();

        assert_eq!(dispatched.text, "Plan A / Plan B");
        assert_eq!(session.final_output(), Some("Plan A / Plan B"));
        assert_eq!(
            session.messages().last(),
            Some(&ChatMessage::assistant("Plan A / Plan B"))
        );

        let requests = llm.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let sent = &requests[0];
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].role, Role::System);
        assert!(sent[1].content.starts_with("Collected inputs for house planning:\n- purpose: a0\n"));
        assert!(sent[1].content.contains("- final_choice: a14\n"));
        assert!(sent[1].content.ends_with(FlowKind::House.flow().task));
    }

    #[tokio::test]
    async fn finalize_failure_is_reported_and_recoverable() {
        let (engine, _llm) = engine_with(None);
        let engine = engine.with_policy(ContextualReplyPolicy::Never);
        let mut session = DialogueSession::start(FlowKind::Material);
        for i in 0..10 {
            engine.reply(&mut session, &format!("a{i}")).await;
        }

        let err = engine.finalize(&mut session).await.unwrap_err();

        assert!(matches!(err, WizardError::Dispatch(_)));
        assert!(!session.is_finalized());
        assert!(
            session
                .messages()
                .last()
                .unwrap()
                .content
                .starts_with("Error generating final output:")
        );
        // Still complete; finalize can be retried.
        assert!(session.is_complete());
    }

    #[test]
    fn synthesis_request_for_partial_answers_lists_only_answered() {
        let mut session = DialogueSession::start(FlowKind::Material);
        session.record_reply("both");
        let req = synthesis_request(&session);
        assert_eq!(req[1].content, format!(
            "Collected inputs:\n- area_type: both\n\n\n{}",
            FlowKind::Material.flow().task
        ));
    }
}
