use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{assistants::Tool, client::OpenAiClient, ApiResponseOrError};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Run {
    pub id: String,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub created_at: u64,
    /// The ID of the assistant used for this run.
    pub assistant_id: String,
    /// The ID of the thread associated with this run.
    pub thread_id: String,
    /// The status of the run.
    pub status: Status,
    /// Details on the action required to continue the run. Will be null if no action is required.
    #[serde(default)]
    pub required_action: Option<RequiredAction>,
    /// The last error that occurred during this run.
    #[serde(default)]
    pub last_error: Option<LastError>,
    /// The time at which the run will expire.
    #[serde(default)]
    pub expires_at: Option<u64>,
    /// The time at which the run was completed.
    #[serde(default)]
    pub completed_at: Option<u64>,
    /// The tools used for this run.
    #[serde(default)]
    pub tools: Vec<Tool>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, String>>,
}

impl Run {
    /// The tool calls the run is waiting on, empty unless the run requires
    /// tool outputs.
    pub fn pending_tool_calls(&self) -> &[ToolCall] {
        match (&self.status, &self.required_action) {
            (
                Status::RequiresAction,
                Some(RequiredAction::SubmitToolOutputs {
                    submit_tool_outputs,
                }),
            ) => &submit_tool_outputs.tool_calls,
            _ => &[],
        }
    }
}

#[derive(
    Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Incomplete,
    Expired,
}

impl Status {
    /// Whether the run can no longer change status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Status::Completed
                | Status::Failed
                | Status::Cancelled
                | Status::Expired
                | Status::Incomplete
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequiredAction {
    SubmitToolOutputs {
        submit_tool_outputs: ToolCallBatch,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct ToolCallBatch {
    pub tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ToolCall {
    /// The ID of the tool call. Its output must be submitted under the same ID.
    pub id: String,
    /// The type of the tool. Currently, only `function` is supported.
    #[serde(rename = "type", default)]
    pub r#type: FunctionLiteral,
    /// The function that the model called.
    pub function: ToolCallFunction,
}

#[derive(Deserialize, Serialize, Clone, Debug, Eq, PartialEq)]
pub struct ToolCallFunction {
    /// The name of the function to call.
    pub name: String,
    /// The arguments to call the function with, as generated by the model in
    /// JSON format.
    /// Note that the model does not always generate valid JSON, and may
    /// hallucinate parameters not defined by your function schema.
    pub arguments: String,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FunctionLiteral;

impl Serialize for FunctionLiteral {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str("function")
    }
}

impl<'de> Deserialize<'de> for FunctionLiteral {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if s != "function" {
            return Err(serde::de::Error::custom("expected function"));
        }
        Ok(FunctionLiteral)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LastError {
    pub code: String,
    pub message: String,
}

#[derive(Serialize, Builder, Debug, Clone, Default, PartialEq)]
#[builder(pattern = "owned")]
#[builder(name = "CreateRunBuilder")]
#[builder(setter(strip_option, into))]
pub struct CreateRunRequest {
    pub assistant_id: String,
    /// Overrides the assistant's instructions for this run only.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub instructions: Option<String>,
    /// Overrides the assistant's tools for this run only.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub tools: Option<Vec<Tool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub metadata: Option<HashMap<String, String>>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SubmitToolOutputsRequest {
    pub tool_outputs: Vec<ToolOutput>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub tool_call_id: String,
    pub output: String,
}

impl OpenAiClient {
    pub async fn create_run(
        &self,
        thread_id: &str,
        request: CreateRunRequest,
    ) -> ApiResponseOrError<Run> {
        self.post(format!("threads/{thread_id}/runs"), request)
            .await
    }

    pub async fn get_run(&self, thread_id: &str, run_id: &str) -> ApiResponseOrError<Run> {
        self.get(format!("threads/{thread_id}/runs/{run_id}")).await
    }

    pub async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        request: SubmitToolOutputsRequest,
    ) -> ApiResponseOrError<Run> {
        self.post(
            format!("threads/{thread_id}/runs/{run_id}/submit_tool_outputs"),
            request,
        )
        .await
    }
}
