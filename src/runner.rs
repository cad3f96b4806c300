//! Drives one conversation turn: posts the prompt, starts a run and answers
//! its tool calls until the run completes.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    assistants::{
        messages::{Attachment, CreateMessageRequest, Message, Role},
        runs::{CreateRunRequest, Run, Status, SubmitToolOutputsRequest, ToolOutput},
    },
    capability::CapabilityCatalog,
    config::RunnerConfig,
    invoker::{FunctionInvoker, InvokeError},
    service::AssistantService,
    session::{SessionContext, ThreadStore},
    Error, OpenAiError, Result,
};

/// One entry of the chat history handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub value: String,
    pub role: Role,
}

impl From<&Message> for ChatMessage {
    fn from(message: &Message) -> Self {
        ChatMessage {
            value: message.text(),
            role: message.role,
        }
    }
}

/// Both outcomes leave the file attached to the assistant's thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded { file_id: String },
    /// The local file was uploaded earlier in this session; nothing was sent.
    AlreadyUploaded { file_id: String },
}

impl UploadOutcome {
    pub fn file_id(&self) -> &str {
        match self {
            UploadOutcome::Uploaded { file_id } | UploadOutcome::AlreadyUploaded { file_id } => {
                file_id
            }
        }
    }
}

pub struct RunDriver {
    service: Arc<dyn AssistantService>,
    catalog: Arc<CapabilityCatalog>,
    invoker: FunctionInvoker,
    threads: ThreadStore,
    config: RunnerConfig,
}

impl RunDriver {
    pub fn new(
        service: Arc<dyn AssistantService>,
        catalog: Arc<CapabilityCatalog>,
        config: RunnerConfig,
        context: SessionContext,
    ) -> Result<Self> {
        let invoker = FunctionInvoker::new(config.request_timeout).map_err(OpenAiError::from)?;
        Ok(RunDriver {
            service,
            catalog,
            invoker,
            threads: ThreadStore::new(context),
            config,
        })
    }

    pub fn with_invoker(mut self, invoker: FunctionInvoker) -> Self {
        self.invoker = invoker;
        self
    }

    pub fn threads(&self) -> &ThreadStore {
        &self.threads
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Sends `prompt` to the assistant on this session's thread and returns
    /// the whole thread, oldest message first, once the run has completed.
    ///
    /// Calls for one thread must not overlap: a second run is only started
    /// after the previous call returned.
    pub async fn run_thread(&self, prompt: &str, assistant_id: &str) -> Result<Vec<ChatMessage>> {
        let thread_id = self
            .threads
            .get_or_create_thread(self.service.as_ref(), assistant_id)
            .await?;

        let attachments: Vec<Attachment> = self
            .threads
            .attached_file_ids(assistant_id)
            .await
            .into_iter()
            .map(Attachment::for_code_interpreter)
            .collect();
        let message = CreateMessageRequest {
            role: Role::User,
            content: prompt.to_string(),
            attachments: (!attachments.is_empty()).then_some(attachments),
            metadata: None,
        };
        self.service.create_message(&thread_id, message).await?;

        // Tools may have been edited since the last turn.
        let assistant = self.service.get_assistant(assistant_id).await?;
        let request = CreateRunRequest {
            assistant_id: assistant_id.to_string(),
            instructions: self.config.run_instructions.clone(),
            tools: Some(assistant.tools),
            metadata: None,
        };
        let run = self.service.create_run(&thread_id, request).await?;
        log::info!(
            "Started run {} of assistant {} on thread {}",
            run.id,
            assistant_id,
            thread_id
        );

        self.poll_until_complete(&thread_id, run).await?;

        let messages = self.service.list_messages(&thread_id).await?;
        Ok(messages.iter().map(ChatMessage::from).collect())
    }

    async fn poll_until_complete(&self, thread_id: &str, mut run: Run) -> Result<()> {
        let mut answered = HashSet::new();
        let mut polls = 0;

        loop {
            match run.status {
                Status::Completed => {
                    log::info!("Run {} completed after {} polls", run.id, polls);
                    return Ok(());
                }
                Status::RequiresAction => {
                    self.answer_tool_calls(thread_id, &run, &mut answered).await?;
                }
                status if status.is_terminal() => {
                    log::warn!("Run {} ended with status {}", run.id, status);
                    return Err(Error::RunEnded {
                        run_id: run.id,
                        status,
                        last_error: run.last_error.map(|error| error.message),
                    });
                }
                _ => {}
            }

            if polls >= self.config.max_polls {
                return Err(Error::PollLimitExceeded {
                    run_id: run.id,
                    polls,
                });
            }
            polls += 1;

            tokio::time::sleep(self.config.poll_interval).await;
            let next = self.service.get_run(thread_id, &run.id).await?;
            if next.status != run.status {
                log::debug!("Run {}: {} -> {}", run.id, run.status, next.status);
            }
            run = next;
        }
    }

    /// Submits one output per pending call in a single batch. Calls answered
    /// by an earlier batch of the same run are not answered again.
    async fn answer_tool_calls(
        &self,
        thread_id: &str,
        run: &Run,
        answered: &mut HashSet<String>,
    ) -> Result<()> {
        let pending: Vec<_> = run
            .pending_tool_calls()
            .iter()
            .filter(|call| !answered.contains(&call.id))
            .collect();
        if pending.is_empty() {
            return Ok(());
        }

        let registry = self.catalog.for_assistant(&run.assistant_id);
        let mut tool_outputs = Vec::with_capacity(pending.len());
        for call in pending {
            log::info!(
                "Run {} calls {} with {}",
                run.id,
                call.function.name,
                call.function.arguments
            );
            let result = match &registry {
                Some(registry) => {
                    self.invoker
                        .call(registry, &call.function.name, &call.function.arguments)
                        .await
                }
                None => {
                    log::warn!(
                        "No capabilities registered for assistant {}",
                        run.assistant_id
                    );
                    Err(InvokeError::UnknownFunction(call.function.name.clone()))
                }
            };
            let output = result.unwrap_or_else(|error| error.to_output());
            log::debug!("Output of {}: {}", call.id, output);
            tool_outputs.push(ToolOutput {
                tool_call_id: call.id.clone(),
                output,
            });
        }

        let ids: Vec<String> = tool_outputs
            .iter()
            .map(|output| output.tool_call_id.clone())
            .collect();
        self.service
            .submit_tool_outputs(thread_id, &run.id, SubmitToolOutputsRequest { tool_outputs })
            .await?;
        answered.extend(ids);
        Ok(())
    }

    /// Uploads `bytes` and attaches the file to the assistant's thread,
    /// unless `local_file_id` was uploaded for the assistant already.
    /// Concurrent calls for the same local file upload it once.
    pub async fn upload_file(
        &self,
        assistant_id: &str,
        local_file_id: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadOutcome> {
        let _slot = self.threads.lock_upload(assistant_id, local_file_id).await;

        if let Some(existing) = self.threads.uploaded_file(assistant_id, local_file_id).await {
            log::debug!("Skipping upload of {filename}: already sent as {}", existing.file_id);
            return Ok(UploadOutcome::AlreadyUploaded {
                file_id: existing.file_id,
            });
        }

        let file = self.service.upload_file(filename, bytes).await?;
        if file.failed_processing() {
            return Err(Error::UploadFailed {
                filename: filename.to_string(),
                reason: format!("file {} could not be processed", file.id),
            });
        }

        let tracked = self
            .threads
            .track_uploaded_file(self.service.as_ref(), assistant_id, local_file_id, &file.id)
            .await?;
        if !tracked {
            let existing = self.threads.uploaded_file(assistant_id, local_file_id).await;
            let file_id = existing.map(|existing| existing.file_id).unwrap_or(file.id);
            log::warn!("{filename} was attached concurrently as {file_id}");
            return Ok(UploadOutcome::AlreadyUploaded { file_id });
        }

        log::info!(
            "Uploaded {} as {} for assistant {}",
            filename,
            file.id,
            assistant_id
        );
        Ok(UploadOutcome::Uploaded { file_id: file.id })
    }
}
