use async_trait::async_trait;
use reqwest::StatusCode;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use super::base::{Backend, SearchRequest};
use super::stream::{StreamProcessor, StreamUpdate};
use crate::errors::{ApiError, ApiResult};
use crate::models::conversation::Conversation;

/// A scripted reply for the mock backend
pub enum MockReply {
    /// Body chunks fed through the real stream processor
    Chunks(Vec<String>),
    /// Fail the request with this status
    Fail(StatusCode),
}

/// A backend that serves pre-configured replies for testing
#[derive(Default)]
pub struct MockBackend {
    conversations: Mutex<HashMap<i64, Conversation>>,
    replies: Mutex<Vec<MockReply>>,
    requests: Mutex<Vec<SearchRequest>>,
    created: Mutex<usize>,
    fail_create: bool,
    gate: Option<Arc<Notify>>,
}

impl MockBackend {
    /// Create a mock backend answering queries with the given replies, in order
    pub fn new(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Mutex::new(replies),
            ..Default::default()
        }
    }

    /// Every query waits for a notification on `gate` before replying
    pub fn with_gate(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn with_failing_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    pub fn with_conversation(self, conversation: Conversation) -> Self {
        self.conversations
            .lock()
            .unwrap()
            .insert(conversation.id, conversation);
        self
    }

    pub fn requests(&self) -> Vec<SearchRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn created_count(&self) -> usize {
        *self.created.lock().unwrap()
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn create_conversation(&self, domain: &str) -> ApiResult<Conversation> {
        if self.fail_create {
            return Err(ApiError::Status {
                status: StatusCode::INTERNAL_SERVER_ERROR,
            });
        }
        let mut created = self.created.lock().unwrap();
        *created += 1;
        let conversation = Conversation {
            id: 100 + *created as i64,
            domain: domain.to_string(),
            messages: Vec::new(),
        };
        self.conversations
            .lock()
            .unwrap()
            .insert(conversation.id, conversation.clone());
        Ok(conversation)
    }

    async fn get_conversation(&self, id: i64) -> ApiResult<Conversation> {
        self.conversations
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(ApiError::Status {
                status: StatusCode::NOT_FOUND,
            })
    }

    async fn stream_query(
        &self,
        request: &SearchRequest,
        on_update: &mut (dyn FnMut(StreamUpdate) + Send),
    ) -> ApiResult<()> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let reply = {
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                MockReply::Chunks(Vec::new())
            } else {
                replies.remove(0)
            }
        };

        match reply {
            MockReply::Fail(status) => Err(ApiError::Status { status }),
            MockReply::Chunks(chunks) => {
                let mut processor = StreamProcessor::new();
                for chunk in chunks {
                    for update in processor.push(chunk.as_bytes()) {
                        on_update(update);
                    }
                }
                for update in processor.finish() {
                    on_update(update);
                }
                Ok(())
            }
        }
    }
}
