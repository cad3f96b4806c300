use crate::{client::OpenAiClient, ApiResponseOrError};
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct File {
    pub id: String,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub created_at: u64,
    #[serde(default)]
    pub bytes: u64,
    #[serde(default)]
    pub filename: String,
    pub purpose: FilePurpose,
    /// Deprecated upstream, but still reported by some deployments.
    #[serde(default)]
    pub status: Option<String>,
}

impl File {
    pub fn failed_processing(&self) -> bool {
        self.status.as_deref() == Some("error")
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FilePurpose {
    Assistants,
    AssistantsOutput,
    Vision,
}

impl OpenAiClient {
    pub async fn upload_file(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        purpose: FilePurpose,
    ) -> ApiResponseOrError<File> {
        let file_part = Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str("application/octet-stream")?;

        let form = Form::new()
            .part("file", file_part)
            .text("purpose", purpose.to_string());

        self.post_multipart("files", form).await
    }
}
