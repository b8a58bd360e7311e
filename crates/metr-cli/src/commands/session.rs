use anyhow::Result;

use super::build_chat;
use crate::configuration::Settings;
use crate::prompt::cliclack::CliclackPrompt;
use crate::session::Session;

pub async fn execute(settings: &Settings) -> Result<()> {
    let chat = build_chat(settings)?;
    let prompt = Box::new(CliclackPrompt::new());
    let mut session = Session::new(chat, prompt, settings.location.resolver()?);
    session.start().await
}
