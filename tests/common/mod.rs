#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use assistant_runner::{
    assistants::{
        files::File,
        messages::{CreateMessageRequest, Message},
        runs::{CreateRunRequest, Run, SubmitToolOutputsRequest},
        threads::Thread,
        Assistant, CreateAssistantRequest, ModifyAssistantRequest,
    },
    ApiResponseOrError, AssistantService, OpenAiError,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

/// One status the scripted run reports, with the tool calls it asks for when
/// the status is `requires_action`.
#[derive(Clone, Debug)]
pub struct Step {
    pub status: &'static str,
    pub calls: Vec<(String, String, String)>,
}

pub fn step(status: &'static str) -> Step {
    Step {
        status,
        calls: Vec::new(),
    }
}

/// A `requires_action` step asking for `(call id, function, arguments)`.
pub fn action(calls: &[(&str, &str, &str)]) -> Step {
    Step {
        status: "requires_action",
        calls: calls
            .iter()
            .map(|(id, name, args)| (id.to_string(), name.to_string(), args.to_string()))
            .collect(),
    }
}

#[derive(Default)]
pub struct State {
    pub assistants: Vec<Assistant>,
    pub threads_created: usize,
    pub messages: HashMap<String, Vec<Message>>,
    pub created_messages: Vec<(String, CreateMessageRequest)>,
    pub created_runs: Vec<(String, CreateRunRequest)>,
    pub script: VecDeque<Step>,
    pub polls: usize,
    pub submissions: Vec<SubmitToolOutputsRequest>,
    pub modifications: Vec<ModifyAssistantRequest>,
    pub uploads: Vec<String>,
    pub upload_status: Option<String>,
    pub upload_delay: Option<Duration>,
    pub reply: String,
    pub last_error: Option<String>,
}

/// In-memory assistant service. Every run plays `script` from the start: the
/// first step is returned by `create_run`, each poll returns the next one and
/// the last step repeats once the script is exhausted.
#[derive(Default)]
pub struct ScriptedService {
    pub state: Mutex<State>,
}

impl ScriptedService {
    pub fn new() -> Self {
        let service = Self::default();
        service.state.lock().reply = "Done.".to_string();
        service
    }

    pub fn with_assistant(self, id: &str, name: &str, tools: Value) -> Self {
        let assistant = serde_json::from_value(json!({
            "id": id,
            "name": name,
            "model": "gpt-4o",
            "tools": tools,
        }))
        .unwrap();
        self.state.lock().assistants.push(assistant);
        self
    }

    pub fn with_script(self, steps: Vec<Step>) -> Self {
        self.state.lock().script = steps.into();
        self
    }

    fn run(state: &mut State, thread_id: &str, assistant_id: &str, step: &Step) -> Run {
        let required_action = (step.status == "requires_action").then(|| {
            let tool_calls: Vec<Value> = step
                .calls
                .iter()
                .map(|(id, name, arguments)| {
                    json!({
                        "id": id,
                        "type": "function",
                        "function": { "name": name, "arguments": arguments }
                    })
                })
                .collect();
            json!({
                "type": "submit_tool_outputs",
                "submit_tool_outputs": { "tool_calls": tool_calls }
            })
        });
        let last_error = state
            .last_error
            .as_ref()
            .filter(|_| step.status == "failed")
            .map(|message| json!({ "code": "server_error", "message": message }));

        if step.status == "completed" {
            let reply = message(thread_id, "assistant", &state.reply);
            state
                .messages
                .entry(thread_id.to_string())
                .or_default()
                .push(reply);
        }

        serde_json::from_value(json!({
            "id": format!("run_{}", state.created_runs.len()),
            "assistant_id": assistant_id,
            "thread_id": thread_id,
            "status": step.status,
            "required_action": required_action,
            "last_error": last_error,
        }))
        .unwrap()
    }

    fn not_found(what: &str) -> OpenAiError {
        OpenAiError::new(format!("No {what} found"), "invalid_request_error".to_string())
    }
}

pub fn message(thread_id: &str, role: &str, text: &str) -> Message {
    serde_json::from_value(json!({
        "id": format!("msg_{}", uuid::Uuid::new_v4()),
        "thread_id": thread_id,
        "role": role,
        "content": [{ "type": "text", "text": { "value": text, "annotations": [] } }]
    }))
    .unwrap()
}

#[async_trait]
impl AssistantService for ScriptedService {
    async fn list_assistants(&self) -> ApiResponseOrError<Vec<Assistant>> {
        Ok(self.state.lock().assistants.clone())
    }

    async fn get_assistant(&self, assistant_id: &str) -> ApiResponseOrError<Assistant> {
        self.state
            .lock()
            .assistants
            .iter()
            .find(|assistant| assistant.id == assistant_id)
            .cloned()
            .ok_or_else(|| Self::not_found("assistant"))
    }

    async fn create_assistant(
        &self,
        request: CreateAssistantRequest,
    ) -> ApiResponseOrError<Assistant> {
        let mut state = self.state.lock();
        let assistant: Assistant = serde_json::from_value(json!({
            "id": format!("asst_{}", state.assistants.len() + 1),
            "name": request.name,
            "description": request.description,
            "model": request.model,
            "instructions": request.instructions,
            "tools": request.tools,
            "metadata": request.metadata,
        }))
        .unwrap();
        state.assistants.push(assistant.clone());
        Ok(assistant)
    }

    async fn modify_assistant(
        &self,
        assistant_id: &str,
        request: ModifyAssistantRequest,
    ) -> ApiResponseOrError<Assistant> {
        let mut state = self.state.lock();
        state.modifications.push(request.clone());
        let assistant = state
            .assistants
            .iter_mut()
            .find(|assistant| assistant.id == assistant_id)
            .ok_or_else(|| Self::not_found("assistant"))?;
        if let Some(name) = request.name {
            assistant.name = Some(name);
        }
        if let Some(description) = request.description {
            assistant.description = Some(description);
        }
        if let Some(instructions) = request.instructions {
            assistant.instructions = Some(instructions);
        }
        if let Some(tools) = request.tools {
            assistant.tools = tools;
        }
        if let Some(metadata) = request.metadata {
            assistant.metadata = Some(metadata);
        }
        Ok(assistant.clone())
    }

    async fn delete_assistant(&self, assistant_id: &str) -> ApiResponseOrError<()> {
        let mut state = self.state.lock();
        let before = state.assistants.len();
        state
            .assistants
            .retain(|assistant| assistant.id != assistant_id);
        if state.assistants.len() == before {
            return Err(Self::not_found("assistant"));
        }
        Ok(())
    }

    async fn create_thread(&self) -> ApiResponseOrError<Thread> {
        let mut state = self.state.lock();
        state.threads_created += 1;
        let thread = serde_json::from_value(json!({
            "id": format!("thread_{}", state.threads_created),
            "object": "thread",
            "created_at": 1700000000,
        }))
        .unwrap();
        Ok(thread)
    }

    async fn create_message(
        &self,
        thread_id: &str,
        request: CreateMessageRequest,
    ) -> ApiResponseOrError<Message> {
        let mut state = self.state.lock();
        let created = message(thread_id, "user", &request.content);
        state
            .messages
            .entry(thread_id.to_string())
            .or_default()
            .push(created.clone());
        state
            .created_messages
            .push((thread_id.to_string(), request));
        Ok(created)
    }

    async fn list_messages(&self, thread_id: &str) -> ApiResponseOrError<Vec<Message>> {
        Ok(self
            .state
            .lock()
            .messages
            .get(thread_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_run(
        &self,
        thread_id: &str,
        request: CreateRunRequest,
    ) -> ApiResponseOrError<Run> {
        let mut state = self.state.lock();
        let assistant_id = request.assistant_id.clone();
        state
            .created_runs
            .push((thread_id.to_string(), request));
        let first = state.script.front().cloned().unwrap_or_else(|| step("completed"));
        Ok(Self::run(&mut state, thread_id, &assistant_id, &first))
    }

    async fn get_run(&self, thread_id: &str, _run_id: &str) -> ApiResponseOrError<Run> {
        let mut state = self.state.lock();
        state.polls += 1;
        if state.script.len() > 1 {
            state.script.pop_front();
        }
        let current = state.script.front().cloned().unwrap_or_else(|| step("completed"));
        let assistant_id = state
            .created_runs
            .last()
            .map(|(_, request)| request.assistant_id.clone())
            .unwrap_or_default();
        Ok(Self::run(&mut state, thread_id, &assistant_id, &current))
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        request: SubmitToolOutputsRequest,
    ) -> ApiResponseOrError<Run> {
        let mut state = self.state.lock();
        state.submissions.push(request);
        let assistant_id = state
            .created_runs
            .last()
            .map(|(_, request)| request.assistant_id.clone())
            .unwrap_or_default();
        let run = serde_json::from_value(json!({
            "id": run_id,
            "assistant_id": assistant_id,
            "thread_id": thread_id,
            "status": "in_progress",
        }))
        .unwrap();
        Ok(run)
    }

    async fn upload_file(&self, filename: &str, _bytes: Vec<u8>) -> ApiResponseOrError<File> {
        let delay = self.state.lock().upload_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        state.uploads.push(filename.to_string());
        let file = serde_json::from_value(json!({
            "id": format!("file_{}", state.uploads.len()),
            "filename": filename,
            "purpose": "assistants",
            "status": state.upload_status.clone().unwrap_or_else(|| "processed".to_string()),
        }))
        .unwrap();
        Ok(file)
    }
}
