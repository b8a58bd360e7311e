use serde_json::Value;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info, warn};

use crate::api::base::{Backend, SearchRequest};
use crate::api::stream::StreamUpdate;
use crate::errors::{ChatError, ChatResult};
use crate::models::location::Location;
use crate::models::message::{ChatMessage, REPLY_ERROR_NOTICE};
use crate::store::ConversationStore;

#[derive(Debug, Default)]
struct ChatState {
    conversation_id: Option<i64>,
    messages: Vec<ChatMessage>,
    documents: Option<Value>,
    location: Location,
    busy: bool,
}

fn lock_state(state: &Mutex<ChatState>) -> MutexGuard<'_, ChatState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clears the busy flag when a send finishes, however it finishes
struct BusyGuard<'a> {
    state: &'a Mutex<ChatState>,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        lock_state(self.state).busy = false;
    }
}

/// Drives a conversation: creating or resuming it, sending queries and
/// folding the streamed replies into the message list.
///
/// Methods take `&self`; the state lock is never held across an await, so
/// sends can be polled concurrently on one thread and the second one is
/// turned away while the first is in flight.
pub struct ChatController<B, S> {
    backend: B,
    store: S,
    domain: String,
    state: Mutex<ChatState>,
}

impl<B: Backend, S: ConversationStore> ChatController<B, S> {
    pub fn new<D: Into<String>>(backend: B, store: S, domain: D) -> Self {
        Self {
            backend,
            store,
            domain: domain.into(),
            state: Mutex::new(ChatState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, ChatState> {
        lock_state(&self.state)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn set_location(&self, location: Location) {
        self.state().location = location;
    }

    pub fn location(&self) -> Location {
        self.state().location.clone()
    }

    pub fn conversation_id(&self) -> Option<i64> {
        self.state().conversation_id
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.state().messages.clone()
    }

    /// Supporting documents received with the most recent reply
    pub fn documents(&self) -> Option<Value> {
        self.state().documents.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.state().busy
    }

    /// Pick up the stored conversation, if any, and load its history
    pub async fn resume(&self) -> ChatResult<Option<i64>> {
        let Some(id) = self.store.load()? else {
            return Ok(None);
        };
        self.state().conversation_id = Some(id);

        let conversation = self.backend.get_conversation(id).await?;
        let messages: Vec<ChatMessage> = conversation
            .messages
            .into_iter()
            .map(ChatMessage::from)
            .collect();
        info!(conversation_id = id, messages = messages.len(), "Resumed conversation");
        self.state().messages = messages;
        Ok(Some(id))
    }

    /// Forget the current conversation so the next send starts a new one
    pub fn reset(&self) -> ChatResult<()> {
        {
            let mut state = self.state();
            state.conversation_id = None;
            state.messages.clear();
            state.documents = None;
        }
        self.store.clear()?;
        Ok(())
    }

    /// Send a query and stream the reply into a new assistant message
    ///
    /// Returns the finished assistant message. If the reply fails, the
    /// message shows an error notice and the error is returned.
    pub async fn send(&self, text: &str) -> ChatResult<ChatMessage> {
        self.send_inner(text, None).await
    }

    /// Same as [`send`](Self::send), also passing every partial rendering of
    /// the reply to `progress` as it streams in
    pub async fn send_with_progress(
        &self,
        text: &str,
        progress: UnboundedSender<ChatMessage>,
    ) -> ChatResult<ChatMessage> {
        self.send_inner(text, Some(progress)).await
    }

    async fn send_inner(
        &self,
        text: &str,
        progress: Option<UnboundedSender<ChatMessage>>,
    ) -> ChatResult<ChatMessage> {
        if text.trim().is_empty() {
            return Err(ChatError::EmptyQuery);
        }
        let _busy = self.acquire()?;

        let conversation_id = self.ensure_conversation().await?;

        let placeholder = ChatMessage::assistant_placeholder();
        let reply_id = placeholder.id.clone();
        let location = {
            let mut state = self.state();
            state.messages.push(ChatMessage::user(text));
            state.messages.push(placeholder);
            state.documents = None;
            state.location.clone()
        };

        let request =
            SearchRequest::new(text, conversation_id, self.domain.as_str()).with_location(&location);
        let mut on_update =
            |update: StreamUpdate| self.apply_update(&reply_id, update, progress.as_ref());

        match self.backend.stream_query(&request, &mut on_update).await {
            Ok(()) => Ok(self.message(&reply_id).unwrap_or_else(ChatMessage::assistant_placeholder)),
            Err(err) => {
                error!(error = %err, conversation_id, "Failed to get a reply");
                self.update_message(&reply_id, |message| {
                    message.set_content(REPLY_ERROR_NOTICE, REPLY_ERROR_NOTICE)
                });
                Err(err.into())
            }
        }
    }

    fn acquire(&self) -> ChatResult<BusyGuard<'_>> {
        let mut state = self.state();
        if state.busy {
            return Err(ChatError::Busy);
        }
        state.busy = true;
        Ok(BusyGuard { state: &self.state })
    }

    async fn ensure_conversation(&self) -> ChatResult<i64> {
        let existing = self.state().conversation_id;
        if let Some(id) = existing {
            return Ok(id);
        }

        let conversation = self.backend.create_conversation(&self.domain).await?;
        if let Err(err) = self.store.save(conversation.id) {
            warn!(error = %err, "Could not remember the new conversation");
        }
        info!(conversation_id = conversation.id, "Started conversation");
        self.state().conversation_id = Some(conversation.id);
        Ok(conversation.id)
    }

    fn apply_update(
        &self,
        reply_id: &str,
        update: StreamUpdate,
        progress: Option<&UnboundedSender<ChatMessage>>,
    ) {
        match update {
            StreamUpdate::Text(text) => {
                let updated = self.update_message(reply_id, |message| {
                    message.set_content(text.html, text.markdown)
                });
                if let (Some(progress), Some(message)) = (progress, updated) {
                    // nobody listening any more is fine
                    let _ = progress.send(message);
                }
            }
            StreamUpdate::Documents(docs) => {
                self.state().documents = Some(docs);
            }
        }
    }

    fn update_message(
        &self,
        id: &str,
        update: impl FnOnce(&mut ChatMessage),
    ) -> Option<ChatMessage> {
        let mut state = self.state();
        let message = state.messages.iter_mut().find(|m| m.id == id)?;
        update(message);
        Some(message.clone())
    }

    fn message(&self, id: &str) -> Option<ChatMessage> {
        self.state().messages.iter().find(|m| m.id == id).cloned()
    }
}
