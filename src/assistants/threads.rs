use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{client::OpenAiClient, ApiResponseOrError};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Thread {
    pub id: String,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub created_at: u64,
    /// Set of 16 key-value pairs that can be attached to an object. Keys can be a maximum of 64 characters long and values can be a maximum of 512 characters long.
    #[serde(default)]
    pub metadata: Option<HashMap<String, String>>,
}

#[derive(Debug, Serialize, Default, Clone)]
pub struct CreateThreadRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,
}

impl OpenAiClient {
    pub async fn create_thread(&self, request: CreateThreadRequest) -> ApiResponseOrError<Thread> {
        self.post("threads", request).await
    }
}
