//! Input parsing for the terminal channel.
//!
//! Every line is either a slash command or a reply to the active question.

use crate::wizard::Mode;

/// One parsed line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Free text routed to the active dialogue.
    Reply(String),
    SelectMode(Mode),
    Finalize,
    Proceed,
    Finish,
    Reset,
    Status,
    Keys,
    Help,
    Quit,
    /// A command we could not make sense of, with the reason.
    Invalid(String),
}

/// Parses user lines into `Input`.
pub struct InputParser;

impl InputParser {
    pub fn parse(line: &str) -> Input {
        let trimmed = line.trim();
        let lower = trimmed.to_lowercase();

        match lower.as_str() {
            "/finalize" | "/generate" => Input::Finalize,
            "/next" | "/proceed" => Input::Proceed,
            "/finish" => Input::Finish,
            "/reset" | "/restart" => Input::Reset,
            "/status" => Input::Status,
            "/keys" => Input::Keys,
            "/help" | "/?" => Input::Help,
            "/quit" | "/exit" => Input::Quit,
            _ => parse_mode_command(&lower).unwrap_or_else(|| {
                if lower.starts_with('/') && !lower.contains(' ') {
                    Input::Invalid(format!("Unknown command {trimmed}. Type /help."))
                } else {
                    Input::Reply(trimmed.to_string())
                }
            }),
        }
    }
}

/// `/mode <material|house|both>`.
fn parse_mode_command(lower: &str) -> Option<Input> {
    if lower != "/mode" && !lower.starts_with("/mode ") {
        return None;
    }
    let arg = lower.trim_start_matches("/mode").trim();
    if arg.is_empty() {
        return Some(Input::Invalid(
            "Usage: /mode material|house|both".to_string(),
        ));
    }
    Some(match arg.parse::<Mode>() {
        Ok(mode) => Input::SelectMode(mode),
        Err(e) => Input::Invalid(e),
    })
}

pub const HELP: &str = "\
Commands:
  /mode material|house|both  switch mode (discards progress)
  /finalize                  generate the final output once all questions are answered
  /next                      combined mode: continue to the next flow
  /finish                    combined mode: wrap up and start over
  /reset                     start the current mode over
  /status                    show progress
  /keys                      show configured API keys
  /quit                      exit
Anything else is your answer to the current question.";
