use anyhow::Result;
use console::style;
use metr::store::{ConversationStore, FileConversationStore};

pub fn execute(store: &FileConversationStore) -> Result<()> {
    store.clear()?;
    println!(
        "{}",
        style(format!("Forgot the stored conversation ({})", store.path().display())).dim()
    );
    Ok(())
}
