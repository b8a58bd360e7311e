use std::io::{self, Write};

use anyhow::Result;
use bat::WrappingMode;
use cliclack::{input, spinner};
use console::{measure_text_width, style, Term};
use metr::models::message::{ChatMessage, Role};
use serde_json::Value;
use tracing::warn;

use super::{parse_command, Input, InputType, Prompt, HELP};

const THEME: &str = "zenburn";

pub struct CliclackPrompt {
    spinner: cliclack::ProgressBar,
    busy: bool,
    // Raw text printed for the reply in flight, and the segment it currently shows
    streamed: String,
    segment: String,
}

impl CliclackPrompt {
    pub fn new() -> Self {
        CliclackPrompt {
            spinner: spinner(),
            busy: false,
            streamed: String::new(),
            segment: String::new(),
        }
    }

    fn stop_spinner(&mut self) {
        if self.busy {
            self.spinner.stop("");
            self.busy = false;
        }
    }

    /// Erase the raw streamed text so the finished reply can be printed highlighted.
    /// Returns false when the output is not a terminal and the text has to stay.
    fn clear_streamed(&mut self) -> bool {
        if self.streamed.is_empty() {
            return true;
        }
        let streamed = std::mem::take(&mut self.streamed);
        self.segment.clear();

        let term = Term::stdout();
        if !term.is_term() {
            print_newline();
            return false;
        }
        let rows = screen_rows(&streamed, term.size().1 as usize);
        let _ = term.clear_line();
        if rows > 1 {
            let _ = term.clear_last_lines(rows - 1);
        }
        true
    }
}

/// Terminal rows taken by `text` when wrapped at `width` columns
fn screen_rows(text: &str, width: usize) -> usize {
    let width = width.max(1);
    text.split('\n')
        .map(|line| measure_text_width(line).div_ceil(width).max(1))
        .sum()
}

fn print_documents(content: &str) {
    let printed = bat::PrettyPrinter::new()
        .input(bat::Input::from_bytes(content.as_bytes()).name("Supporting documents"))
        .theme(THEME)
        .language("JSON")
        .grid(true)
        .header(true)
        .wrapping_mode(WrappingMode::Character)
        .print();
    if let Err(err) = printed {
        warn!(error = %err, "Highlighting failed, printing plain text");
        println!("{}", content);
    }
}

fn print(content: &str) {
    let printed = bat::PrettyPrinter::new()
        .input(bat::Input::from_bytes(content.as_bytes()))
        .theme(THEME)
        .language("Markdown")
        .wrapping_mode(WrappingMode::Character)
        .print();
    if let Err(err) = printed {
        warn!(error = %err, "Highlighting failed, printing plain text");
        println!("{}", content);
    }
}

fn print_newline() {
    println!();
}

impl Prompt for CliclackPrompt {
    fn render(&mut self, message: &ChatMessage) {
        self.stop_spinner();
        match message.role {
            Role::User => println!("{} {}", style("you>").cyan().bold(), message.source),
            // The terminal shows the Markdown the HTML was rendered from
            Role::Assistant => {
                if self.clear_streamed() {
                    print(&message.source);
                }
            }
        }

        print_newline();
        let _ = io::stdout().flush();
    }

    fn render_progress(&mut self, message: &ChatMessage) {
        self.stop_spinner();
        let source = message.source.as_str();
        match source.strip_prefix(self.segment.as_str()) {
            Some(delta) => {
                print!("{}", delta);
                self.streamed.push_str(delta);
            }
            // a new segment began after a documents block
            None => {
                print!("\n{}", source);
                self.streamed.push('\n');
                self.streamed.push_str(source);
            }
        }
        self.segment = source.to_string();
        let _ = io::stdout().flush();
    }

    fn render_documents(&mut self, documents: &Value) {
        let pretty =
            serde_json::to_string_pretty(documents).unwrap_or_else(|_| documents.to_string());
        print_documents(&pretty);
        print_newline();
    }

    fn notify(&mut self, text: &str) {
        self.stop_spinner();
        if !self.streamed.is_empty() {
            // keep whatever partial reply made it to the screen
            self.streamed.clear();
            self.segment.clear();
            print_newline();
        }
        println!("{}", style(text).dim());
    }

    fn show_busy(&mut self) {
        self.streamed.clear();
        self.segment.clear();
        self.spinner = spinner();
        self.spinner.start("awaiting reply");
        self.busy = true;
    }

    fn hide_busy(&mut self) {
        self.stop_spinner();
    }

    fn get_input(&mut self) -> Result<Input> {
        loop {
            let line: String = match input("MetR: ( ? )>         [Help: /?]")
                .placeholder("")
                .interact()
            {
                Ok(line) => line,
                // Ctrl+C or Esc at the prompt
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {
                    return Ok(Input {
                        input_type: InputType::Exit,
                        content: None,
                    })
                }
                Err(err) => return Err(err.into()),
            };

            match parse_command(&line) {
                Some(input) => return Ok(input),
                None => println!("{}", HELP),
            }
        }
    }

    fn close(&self) {
        // No cleanup required
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_screen_rows_counts_wrapped_lines() {
        assert_eq!(screen_rows("short", 80), 1);
        assert_eq!(screen_rows("one\ntwo\n", 80), 3);
        assert_eq!(screen_rows(&"x".repeat(81), 80), 2);
        assert_eq!(screen_rows("", 0), 1);
    }
}
