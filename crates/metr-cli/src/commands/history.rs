use anyhow::Result;

use super::build_chat;
use crate::configuration::Settings;
use crate::prompt::cliclack::CliclackPrompt;
use crate::prompt::Prompt;

pub async fn execute(settings: &Settings) -> Result<()> {
    let chat = build_chat(settings)?;
    let mut prompt = CliclackPrompt::new();

    match chat.resume().await? {
        Some(id) => {
            prompt.notify(&format!("Conversation {}", id));
            for message in chat.messages() {
                prompt.render(&message);
            }
        }
        None => prompt.notify("No conversation yet."),
    }
    Ok(())
}
