//! Guided intake wizard.
//!
//! - `flows`: the scripted Material and House question sequences
//! - `session`: per-flow dialogue state (answers, history, final output)
//! - `engine`: applies replies and runs synthesis through the dispatcher
//! - `controller`: mode, composite sequencing and view effects
//! - `view`: what the presentation layer renders

pub mod controller;
pub mod engine;
pub mod flows;
pub mod session;
pub mod view;

pub use controller::{COMPOSITE_FLOWS, CompositeSequence, Mode, SessionController};
pub use engine::{
    ContextualReply, ContextualReplyPolicy, DialogueEngine, TurnOutcome, synthesis_request,
};
pub use flows::{Flow, FlowKind, FlowStep};
pub use session::{Answer, Answers, DialogueSession, DialogueState};
pub use view::{AvailableActions, CompositePosition, Notice, NoticeLevel, SessionView, Transition};
