use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response};
use serde_json::json;
use tracing::debug;

use super::base::{Backend, SearchRequest};
use super::configs::BackendConfig;
use super::stream::{StreamProcessor, StreamUpdate};
use crate::errors::{ApiError, ApiResult};
use crate::models::conversation::Conversation;

/// HTTP client for the conversation and search endpoints
pub struct BackendClient {
    client: Client,
    config: BackendConfig,
}

impl BackendClient {
    pub fn new(config: BackendConfig) -> ApiResult<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self { client, config })
    }

    fn check_status(response: Response) -> ApiResult<Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(ApiError::Status { status })
        }
    }

    async fn read_conversation(response: Response) -> ApiResult<Conversation> {
        let response = Self::check_status(response)?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl Backend for BackendClient {
    async fn create_conversation(&self, domain: &str) -> ApiResult<Conversation> {
        let url = self.config.url("/api/v1/conversations");
        debug!(%url, domain, "Creating conversation");

        let response = self
            .client
            .post(&url)
            .json(&json!({ "domain": domain }))
            .send()
            .await?;

        Self::read_conversation(response).await
    }

    async fn get_conversation(&self, id: i64) -> ApiResult<Conversation> {
        let url = self.config.url(&format!("/api/v1/conversations/{}", id));
        debug!(%url, "Fetching conversation");

        let response = self.client.get(&url).send().await?;

        Self::read_conversation(response).await
    }

    async fn stream_query(
        &self,
        request: &SearchRequest,
        on_update: &mut (dyn FnMut(StreamUpdate) + Send),
    ) -> ApiResult<()> {
        let url = self.config.url("/api/v1/search");
        debug!(%url, conversation_id = request.conversation_id, "Submitting query");

        let response = self.client.post(&url).json(request).send().await?;
        let response = Self::check_status(response)?;

        let mut body = response.bytes_stream();
        let mut processor = StreamProcessor::new();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(ApiError::Stream)?;
            for update in processor.push(&chunk) {
                on_update(update);
            }
        }
        for update in processor.finish() {
            on_update(update);
        }

        debug!(conversation_id = request.conversation_id, "Reply stream finished");
        Ok(())
    }
}
