use anyhow::Result;
use metr::api::base::Backend;
use metr::chat::ChatController;
use metr::errors::{ChatError, ChatResult};
use metr::location::resolver::LocationResolver;
use metr::models::message::{ChatMessage, REPLY_ERROR_NOTICE};
use metr::store::ConversationStore;
use tokio::sync::mpsc;
use tracing::warn;

use crate::prompt::{InputType, Prompt};

pub struct Session<'a, B, S> {
    chat: ChatController<B, S>,
    prompt: Box<dyn Prompt + 'a>,
    resolver: Option<LocationResolver>,
}

impl<'a, B: Backend, S: ConversationStore> Session<'a, B, S> {
    pub fn new(
        chat: ChatController<B, S>,
        prompt: Box<dyn Prompt + 'a>,
        resolver: Option<LocationResolver>,
    ) -> Self {
        Session {
            chat,
            prompt,
            resolver,
        }
    }

    pub async fn start(&mut self) -> Result<()> {
        self.setup_session().await;
        self.prompt.metr_ready();

        loop {
            let input = self.prompt.get_input()?;
            match input.input_type {
                InputType::Message => {
                    if let Some(content) = &input.content {
                        self.send(content).await;
                    }
                }
                InputType::NewSession => {
                    self.chat.reset()?;
                    self.prompt.notify("Started a new conversation.");
                }
                InputType::History => self.render_history(),
                InputType::Documents => self.render_documents(),
                InputType::Exit => break,
                InputType::AskAgain => continue,
            }
        }

        self.close_session();
        Ok(())
    }

    /// Answer a single query without prompting
    pub async fn headless_start(&mut self, text: &str) -> Result<()> {
        self.resume().await;
        self.resolve_location().await;

        let reply = self.stream_reply(text).await;
        let failed = reply.is_err();
        self.show_reply(reply);
        if let Some(documents) = self.chat.documents() {
            self.prompt.render_documents(&documents);
        }
        self.prompt.close();

        if failed {
            anyhow::bail!(REPLY_ERROR_NOTICE);
        }
        Ok(())
    }

    async fn setup_session(&mut self) {
        if let Some(id) = self.resume().await {
            self.prompt
                .notify(&format!("Resuming conversation {}.", id));
            self.render_history();
        }
        self.resolve_location().await;
    }

    async fn resume(&mut self) -> Option<i64> {
        match self.chat.resume().await {
            Ok(id) => id,
            Err(err) => {
                warn!(error = %err, "Could not load the stored conversation");
                self.prompt
                    .notify("Could not load the previous conversation history.");
                self.chat.conversation_id()
            }
        }
    }

    async fn resolve_location(&mut self) {
        if let Some(resolver) = &self.resolver {
            let location = resolver.resolve().await;
            self.chat.set_location(location);
        }
    }

    async fn send(&mut self, text: &str) {
        self.prompt.show_busy();
        let reply = self.stream_reply(text).await;
        self.prompt.hide_busy();
        self.show_reply(reply);
    }

    /// Send `text`, redrawing the reply each time the stream grows it
    async fn stream_reply(&mut self, text: &str) -> ChatResult<ChatMessage> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let reply = {
            let sending = self.chat.send_with_progress(text, tx);
            tokio::pin!(sending);
            loop {
                tokio::select! {
                    biased;
                    Some(partial) = rx.recv() => self.prompt.render_progress(&partial),
                    reply = &mut sending => break reply,
                }
            }
        };
        while let Ok(partial) = rx.try_recv() {
            self.prompt.render_progress(&partial);
        }
        reply
    }

    fn show_reply(&mut self, reply: ChatResult<ChatMessage>) {
        match reply {
            Ok(message) => self.prompt.render(&message),
            Err(ChatError::Api(err)) => {
                warn!(error = %err, "Query failed");
                self.prompt.notify(REPLY_ERROR_NOTICE);
            }
            Err(err) => self.prompt.notify(&err.to_string()),
        }
    }

    fn render_history(&mut self) {
        for message in self.chat.messages() {
            self.prompt.render(&message);
        }
    }

    fn render_documents(&mut self) {
        match self.chat.documents() {
            Some(documents) => self.prompt.render_documents(&documents),
            None => self
                .prompt
                .notify("The last reply came without supporting documents."),
        }
    }

    fn close_session(&mut self) {
        if let Some(id) = self.chat.conversation_id() {
            self.prompt
                .notify(&format!("Closing session. Conversation {} is kept for next time.", id));
        }
        self.prompt.close();
    }
}
