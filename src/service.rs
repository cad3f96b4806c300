//! The operations the orchestration core needs from a hosted assistant
//! service.
//!
//! [`OpenAiClient`] is the production implementation; tests substitute a
//! scripted one.

use async_trait::async_trait;

use crate::{
    assistants::{
        files::{File, FilePurpose},
        messages::{CreateMessageRequest, Message},
        runs::{CreateRunRequest, Run, SubmitToolOutputsRequest},
        threads::{CreateThreadRequest, Thread},
        Assistant, CreateAssistantRequest, ModifyAssistantRequest,
    },
    client::OpenAiClient,
    ApiResponseOrError,
};

#[async_trait]
pub trait AssistantService: Send + Sync {
    async fn list_assistants(&self) -> ApiResponseOrError<Vec<Assistant>>;

    async fn get_assistant(&self, assistant_id: &str) -> ApiResponseOrError<Assistant>;

    async fn create_assistant(
        &self,
        request: CreateAssistantRequest,
    ) -> ApiResponseOrError<Assistant>;

    async fn modify_assistant(
        &self,
        assistant_id: &str,
        request: ModifyAssistantRequest,
    ) -> ApiResponseOrError<Assistant>;

    async fn delete_assistant(&self, assistant_id: &str) -> ApiResponseOrError<()>;

    async fn create_thread(&self) -> ApiResponseOrError<Thread>;

    async fn create_message(
        &self,
        thread_id: &str,
        request: CreateMessageRequest,
    ) -> ApiResponseOrError<Message>;

    /// Every message of the thread, oldest first.
    async fn list_messages(&self, thread_id: &str) -> ApiResponseOrError<Vec<Message>>;

    async fn create_run(&self, thread_id: &str, request: CreateRunRequest)
        -> ApiResponseOrError<Run>;

    async fn get_run(&self, thread_id: &str, run_id: &str) -> ApiResponseOrError<Run>;

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        request: SubmitToolOutputsRequest,
    ) -> ApiResponseOrError<Run>;

    async fn upload_file(&self, filename: &str, bytes: Vec<u8>) -> ApiResponseOrError<File>;
}

#[async_trait]
impl AssistantService for OpenAiClient {
    async fn list_assistants(&self) -> ApiResponseOrError<Vec<Assistant>> {
        OpenAiClient::list_assistants(self).await
    }

    async fn get_assistant(&self, assistant_id: &str) -> ApiResponseOrError<Assistant> {
        OpenAiClient::get_assistant(self, assistant_id).await
    }

    async fn create_assistant(
        &self,
        request: CreateAssistantRequest,
    ) -> ApiResponseOrError<Assistant> {
        OpenAiClient::create_assistant(self, request).await
    }

    async fn modify_assistant(
        &self,
        assistant_id: &str,
        request: ModifyAssistantRequest,
    ) -> ApiResponseOrError<Assistant> {
        OpenAiClient::modify_assistant(self, assistant_id, request).await
    }

    async fn delete_assistant(&self, assistant_id: &str) -> ApiResponseOrError<()> {
        OpenAiClient::delete_assistant(self, assistant_id)
            .await
            .map(|_| ())
    }

    async fn create_thread(&self) -> ApiResponseOrError<Thread> {
        OpenAiClient::create_thread(self, CreateThreadRequest::default()).await
    }

    async fn create_message(
        &self,
        thread_id: &str,
        request: CreateMessageRequest,
    ) -> ApiResponseOrError<Message> {
        OpenAiClient::create_message(self, thread_id, request).await
    }

    async fn list_messages(&self, thread_id: &str) -> ApiResponseOrError<Vec<Message>> {
        OpenAiClient::list_messages(self, thread_id).await
    }

    async fn create_run(
        &self,
        thread_id: &str,
        request: CreateRunRequest,
    ) -> ApiResponseOrError<Run> {
        OpenAiClient::create_run(self, thread_id, request).await
    }

    async fn get_run(&self, thread_id: &str, run_id: &str) -> ApiResponseOrError<Run> {
        OpenAiClient::get_run(self, thread_id, run_id).await
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        request: SubmitToolOutputsRequest,
    ) -> ApiResponseOrError<Run> {
        OpenAiClient::submit_tool_outputs(self, thread_id, run_id, request).await
    }

    async fn upload_file(&self, filename: &str, bytes: Vec<u8>) -> ApiResponseOrError<File> {
        OpenAiClient::upload_file(self, filename, bytes, FilePurpose::Assistants).await
    }
}
