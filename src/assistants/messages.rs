use crate::{assistants::Tool, client::OpenAiClient, ApiResponseOrError};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Message {
    pub id: String,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub created_at: u64,
    /// The thread ID that this message belongs to.
    pub thread_id: String,
    /// The entity that produced the message. One of user or assistant
    pub role: Role,
    /// The content of the message.
    #[serde(default)]
    pub content: Vec<Content>,
    /// The assistant that produced the message.
    #[serde(default)]
    pub assistant_id: Option<String>,
    /// The ID of the run associated with the creation of this message. Value is null when messages are created manually.
    #[serde(default)]
    pub run_id: Option<String>,
    /// A list of files attached to the message.
    #[serde(default)]
    pub attachments: Option<Vec<Attachment>>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, String>>,
}

impl Message {
    /// The text parts of the message, joined by newlines. Image and refusal
    /// parts are skipped.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|content| match content {
                Content::Text { text } => Some(text.value.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Content {
    Text { text: Text },
    ImageFile { image_file: Value },
    ImageUrl { image_url: Value },
    Refusal { refusal: String },
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Text {
    pub value: String,
    #[serde(default)]
    pub annotations: Vec<Value>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Attachment {
    pub file_id: String,
    pub tools: Vec<Tool>,
}

impl Attachment {
    /// Makes the file available to the code execution tool.
    pub fn for_code_interpreter(file_id: impl Into<String>) -> Self {
        Attachment {
            file_id: file_id.into(),
            tools: vec![Tool::CodeInterpreter],
        }
    }
}

#[derive(Serialize, Builder, Debug, Clone, PartialEq)]
#[builder(pattern = "owned")]
#[builder(name = "CreateMessageBuilder")]
#[builder(setter(strip_option, into))]
pub struct CreateMessageRequest {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub attachments: Option<Vec<Attachment>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub metadata: Option<HashMap<String, String>>,
}

impl OpenAiClient {
    pub async fn create_message(
        &self,
        thread_id: &str,
        request: CreateMessageRequest,
    ) -> ApiResponseOrError<Message> {
        self.post(format!("threads/{thread_id}/messages"), request)
            .await
    }

    /// Lists every message of the thread, oldest first.
    pub async fn list_messages(&self, thread_id: &str) -> ApiResponseOrError<Vec<Message>> {
        self.list(format!("threads/{thread_id}/messages")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_skips_non_text_parts() {
        let message: Message = serde_json::from_value(json!({
            "id": "msg_1",
            "thread_id": "thread_1",
            "role": "assistant",
            "content": [
                { "type": "text", "text": { "value": "Here is the chart", "annotations": [] } },
                { "type": "image_file", "image_file": { "file_id": "file_9" } },
                { "type": "text", "text": { "value": "and the numbers." } }
            ]
        }))
        .unwrap();

        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.text(), "Here is the chart\nand the numbers.");
    }

    #[test]
    fn message_request_attaches_files_to_code_interpreter() {
        let request = CreateMessageBuilder::default()
            .role(Role::User)
            .content("Summarise the file")
            .attachments(vec![Attachment::for_code_interpreter("file_1")])
            .build()
            .unwrap();

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "role": "user",
                "content": "Summarise the file",
                "attachments": [
                    { "file_id": "file_1", "tools": [{ "type": "code_interpreter" }] }
                ]
            })
        );
    }
}
