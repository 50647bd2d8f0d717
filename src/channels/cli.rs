//! CLI channel: stdin/stdout REPL over a `SessionController`.

use std::fmt::Write as _;

use tokio::io::{AsyncBufReadExt, BufReader};
use uuid::Uuid;

use crate::channels::input::{HELP, Input, InputParser};
use crate::llm::Role;
use crate::wizard::{NoticeLevel, SessionController, SessionView, Transition};

/// Tracks what has already been printed so each transition only shows what
/// is new.
#[derive(Debug, Default)]
pub struct Renderer {
    session: Option<Uuid>,
    shown: usize,
}

impl Renderer {
    /// Text for stdout: messages appended since the last render, or the whole
    /// transcript when the session was replaced.
    pub fn render(&mut self, view: &SessionView) -> String {
        let mut out = String::new();
        if self.session != Some(view.session_id) {
            self.session = Some(view.session_id);
            self.shown = 0;
            let _ = writeln!(out, "── {} ──", view.flow_title);
        }
        for msg in view.messages.iter().skip(self.shown) {
            let speaker = match msg.role {
                Role::User => "you",
                _ => "planner",
            };
            let _ = writeln!(out, "{speaker}: {}\n", msg.content);
        }
        self.shown = view.messages.len();

        let hints = action_hints(view);
        if !hints.is_empty() {
            let _ = writeln!(out, "[{}]", hints.join("  "));
        }
        out
    }
}

fn action_hints(view: &SessionView) -> Vec<&'static str> {
    let mut hints = Vec::new();
    if view.actions.finalize {
        hints.push("/finalize");
    }
    if view.actions.proceed {
        hints.push("/next");
    }
    if view.actions.finish {
        hints.push("/finish");
    }
    hints
}

/// One-line progress summary.
pub fn status_line(view: &SessionView) -> String {
    let mut line = format!(
        "mode {} | {} | step {}/{} | {} answered",
        view.mode,
        view.flow_title,
        (view.step_index + 1).min(view.total_steps),
        view.total_steps,
        view.answered
    );
    if let Some(composite) = &view.composite {
        let _ = write!(
            line,
            " | flow {}/{}",
            composite.index + 1,
            composite.flows.len()
        );
    }
    if view.finalized {
        line.push_str(" | finalized");
    }
    line
}

pub fn keys_line(view: &SessionView) -> String {
    format!(
        "API keys configured: {} ({} usable)",
        view.credential_count, view.enabled_credentials
    )
}

/// Terminal front end. Owns the controller for the life of the process.
pub struct CliChannel {
    controller: SessionController,
    renderer: Renderer,
}

impl CliChannel {
    pub fn new(controller: SessionController) -> Self {
        Self {
            controller,
            renderer: Renderer::default(),
        }
    }

    /// Read lines from stdin until EOF or `/quit`.
    pub async fn run(mut self) -> std::io::Result<()> {
        let view = self.controller.view();
        eprintln!("   {}", keys_line(&view));
        if view.enabled_credentials == 0 {
            eprintln!("   Warning: no usable API keys; set GROQ_KEY_1..3");
        }
        eprintln!("   Type /help for commands.\n");
        print!("{}", self.renderer.render(&view));
        eprint!("> ");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                eprint!("> ");
                continue;
            }
            let transition = match InputParser::parse(&line) {
                Input::Quit => break,
                Input::Help => {
                    eprintln!("{HELP}");
                    None
                }
                Input::Status => {
                    eprintln!("{}", status_line(&self.controller.view()));
                    None
                }
                Input::Keys => {
                    eprintln!("{}", keys_line(&self.controller.view()));
                    None
                }
                Input::Invalid(reason) => {
                    eprintln!("{reason}");
                    None
                }
                Input::SelectMode(mode) => Some(self.controller.select_mode(mode)),
                Input::Finalize => {
                    eprintln!("⏳ Generating final output...");
                    Some(self.controller.finalize().await)
                }
                Input::Proceed => Some(self.controller.proceed()),
                Input::Finish => Some(self.controller.finish()),
                Input::Reset => Some(self.controller.reset()),
                Input::Reply(text) => Some(self.controller.submit_reply(&text).await),
            };
            if let Some(transition) = transition {
                self.show(&transition);
            }
            eprint!("> ");
        }
        tracing::debug!("CLI input closed");
        Ok(())
    }

    fn show(&mut self, transition: &Transition) {
        print!("{}", self.renderer.render(&transition.view));
        for notice in &transition.notices {
            match notice.level {
                NoticeLevel::Info => eprintln!("ℹ️  {}", notice.text),
                NoticeLevel::Warning => eprintln!("⚠️  {}", notice.text),
                NoticeLevel::Error => eprintln!("❌ {}", notice.text),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::llm::{CredentialPool, FailoverDispatcher};
    use crate::wizard::{ContextualReplyPolicy, DialogueEngine, Mode};

    fn controller(mode: Mode) -> SessionController {
        let dispatcher = Arc::new(FailoverDispatcher::new(CredentialPool::default()));
        let engine = DialogueEngine::new(dispatcher, "test-model")
            .with_policy(ContextualReplyPolicy::Never);
        SessionController::new(engine, mode)
    }

    #[tokio::test]
    async fn renderer_prints_only_new_messages() {
        let mut ctl = controller(Mode::Material);
        let mut renderer = Renderer::default();

        let first = renderer.render(&ctl.view());
        assert!(first.starts_with("── Material selection ──"));
        assert!(first.contains("planner: Are we selecting materials"));

        let t = ctl.submit_reply("interior").await;
        let second = renderer.render(&t.view);
        assert!(!second.contains("──"));
        assert!(!second.contains("Are we selecting"));
        assert!(second.contains("you: interior"));
        assert!(second.contains("planner: Which country"));
    }

    #[tokio::test]
    async fn renderer_replays_after_reset() {
        let mut ctl = controller(Mode::House);
        let mut renderer = Renderer::default();
        renderer.render(&ctl.view());
        let t = ctl.submit_reply("new").await;
        renderer.render(&t.view);

        let t = ctl.reset();
        let out = renderer.render(&t.view);
        assert!(out.starts_with("── Layout planning"));
        assert!(out.contains("planning a new house"));
        assert!(!out.contains("you: new"));
    }

    #[test]
    fn status_line_shows_composite_position() {
        let ctl = controller(Mode::Composite);
        let line = status_line(&ctl.view());
        assert!(line.contains("mode composite"));
        assert!(line.contains("step 1/15"));
        assert!(line.contains("flow 1/2"));
    }

    #[test]
    fn keys_line_counts_pool() {
        let ctl = controller(Mode::Material);
        assert_eq!(
            keys_line(&ctl.view()),
            "API keys configured: 0 (0 usable)"
        );
    }
}
