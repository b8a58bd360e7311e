use anyhow::Result;
use metr::models::message::ChatMessage;
use serde_json::Value;

pub mod cliclack;

pub trait Prompt {
    /// Show a finished message
    fn render(&mut self, message: &ChatMessage);
    /// Show the reply streamed so far; called again each time it grows
    fn render_progress(&mut self, message: &ChatMessage);
    fn render_documents(&mut self, documents: &Value);
    /// A line of session chatter that is not part of the conversation
    fn notify(&mut self, text: &str);
    fn get_input(&mut self) -> Result<Input>;
    fn show_busy(&mut self);
    fn hide_busy(&mut self);
    fn close(&self);
    fn metr_ready(&mut self) {
        self.notify("Ready. Ask a question, or /? for commands.");
    }
}

#[derive(Debug, PartialEq)]
pub struct Input {
    pub input_type: InputType,
    pub content: Option<String>, // Only set for messages
}

#[derive(Debug, PartialEq)]
pub enum InputType {
    AskAgain,   // Nothing to do, prompt again
    Message,    // User sent a message
    Exit,       // User wants to exit the session
    NewSession, // Forget the current conversation
    History,    // Print the conversation so far
    Documents,  // Print the documents of the last reply
}

impl Input {
    fn command(input_type: InputType) -> Self {
        Input {
            input_type,
            content: None,
        }
    }
}

pub const HELP: &str = "Commands:
/exit, /quit - Exit the session
/new - Start a new conversation
/history - Show the conversation so far
/docs - Show the supporting documents of the last reply
/? - Display this help message";

/// Classify a line typed at the prompt. `/?` yields `None`; the caller shows help.
pub fn parse_command(line: &str) -> Option<Input> {
    let text = line.trim();
    let input = if text.is_empty() {
        Input::command(InputType::AskAgain)
    } else if text.eq_ignore_ascii_case("/exit") || text.eq_ignore_ascii_case("/quit") {
        Input::command(InputType::Exit)
    } else if text.eq_ignore_ascii_case("/new") {
        Input::command(InputType::NewSession)
    } else if text.eq_ignore_ascii_case("/history") {
        Input::command(InputType::History)
    } else if text.eq_ignore_ascii_case("/docs") {
        Input::command(InputType::Documents)
    } else if text == "/?" {
        return None;
    } else {
        Input {
            input_type: InputType::Message,
            content: Some(text.to_string()),
        }
    };
    Some(input)
}
