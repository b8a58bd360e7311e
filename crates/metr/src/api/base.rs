use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::stream::StreamUpdate;
use crate::errors::ApiResult;
use crate::models::conversation::Conversation;
use crate::models::location::Location;

/// Body of a search request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub conversation_id: i64,
    pub domain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl SearchRequest {
    pub fn new<Q: Into<String>, D: Into<String>>(query: Q, conversation_id: i64, domain: D) -> Self {
        Self {
            query: query.into(),
            conversation_id,
            domain: domain.into(),
            latitude: None,
            longitude: None,
            country: None,
        }
    }

    /// Attach whatever parts of the location are known
    pub fn with_location(mut self, location: &Location) -> Self {
        self.latitude = location.latitude;
        self.longitude = location.longitude;
        self.country = location.country.clone();
        self
    }
}

/// The conversation/search backend the chat talks to
#[async_trait]
pub trait Backend: Send + Sync {
    /// Create a new conversation in the given domain
    async fn create_conversation(&self, domain: &str) -> ApiResult<Conversation>;

    /// Fetch a conversation with its full message history
    async fn get_conversation(&self, id: i64) -> ApiResult<Conversation>;

    /// Submit a query and feed every update of the streamed reply to `on_update`, in order
    async fn stream_query(
        &self,
        request: &SearchRequest,
        on_update: &mut (dyn FnMut(StreamUpdate) + Send),
    ) -> ApiResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_search_request_without_location() {
        let request = SearchRequest::new("hi", 4, "general");
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"query": "hi", "conversation_id": 4, "domain": "general"})
        );
    }

    #[test]
    fn test_search_request_with_partial_location() {
        let location = Location::new(1.5, 2.5, None);
        let request = SearchRequest::new("hi", 4, "general").with_location(&location);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["latitude"], 1.5);
        assert_eq!(value["longitude"], 2.5);
        assert!(value.get("country").is_none());
    }
}
