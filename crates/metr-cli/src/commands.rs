use anyhow::{Context, Result};
use metr::api::client::BackendClient;
use metr::chat::ChatController;
use metr::store::FileConversationStore;

use crate::configuration::Settings;

pub mod history;
pub mod locate;
pub mod reset;
pub mod run;
pub mod session;

pub type Chat = ChatController<BackendClient, FileConversationStore>;

pub fn build_chat(settings: &Settings) -> Result<Chat> {
    let client = BackendClient::new(settings.backend.clone().into_config())
        .context("Failed to build the HTTP client")?;
    let store = settings.conversation_store()?;
    Ok(ChatController::new(
        client,
        store,
        settings.backend.domain.as_str(),
    ))
}
