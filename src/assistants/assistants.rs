use std::collections::HashMap;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    client::{Empty, OpenAiClient},
    ApiResponseOrError,
};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Assistant {
    pub id: String,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub created_at: u64,
    /// The name of the assistant. The maximum length is 256 characters.
    pub name: Option<String>,
    /// The description of the assistant. The maximum length is 512 characters.
    #[serde(default)]
    pub description: Option<String>,
    /// ID of the model (or deployment) the assistant runs on.
    #[serde(default)]
    pub model: String,
    /// The system instructions that the assistant uses. The maximum length is 256,000 characters.
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub tools: Vec<Tool>,
    /// Set of 16 key-value pairs that can be attached to an object. Keys can be a maximum of 64 characters long and values can be a maximum of 512 characters long.
    #[serde(default)]
    pub metadata: Option<HashMap<String, String>>,
}

impl Assistant {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// A capability enabled on an assistant or a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Tool {
    CodeInterpreter,
    Function { function: FunctionDefinition },
}

impl Tool {
    pub fn function(function: FunctionDefinition) -> Self {
        Tool::Function { function }
    }

    pub fn as_function(&self) -> Option<&FunctionDefinition> {
        match self {
            Tool::Function { function } => Some(function),
            Tool::CodeInterpreter => None,
        }
    }

    pub fn is_code_interpreter(&self) -> bool {
        matches!(self, Tool::CodeInterpreter)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FunctionDefinition {
    /// The name of the function to be called.
    pub name: String,
    /// A description of what the function does, used by the model to choose when and how to call the function.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The parameters the function accepts, described as a JSON Schema object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

#[derive(Serialize, Builder, Default, Debug, Clone)]
#[builder(pattern = "owned")]
#[builder(name = "CreateAssistantBuilder")]
#[builder(setter(strip_option, into))]
pub struct CreateAssistantRequest {
    /// ID of the model to use.
    pub model: String,
    /// The name of the assistant. The maximum length is 256 characters.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub name: Option<String>,
    /// The description of the assistant. The maximum length is 512 characters.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub description: Option<String>,
    /// The system instructions that the assistant uses. The maximum length is 256,000 characters.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub instructions: Option<String>,
    /// A set of tools that the assistant can use.
    #[builder(default)]
    pub tools: Vec<Tool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub metadata: Option<HashMap<String, String>>,
}

/// Fields left as `None` are not sent and stay untouched on the service.
/// Fields that are sent replace the stored value as a whole.
#[derive(Serialize, Builder, Default, Debug, Clone, PartialEq)]
#[builder(pattern = "owned")]
#[builder(name = "ModifyAssistantBuilder")]
#[builder(setter(strip_option, into))]
pub struct ModifyAssistantRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub instructions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub tools: Option<Vec<Tool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub metadata: Option<HashMap<String, String>>,
}

impl OpenAiClient {
    pub async fn create_assistant(
        &self,
        request: CreateAssistantRequest,
    ) -> ApiResponseOrError<Assistant> {
        self.post("assistants", request).await
    }

    pub async fn list_assistants(&self) -> ApiResponseOrError<Vec<Assistant>> {
        self.list("assistants").await
    }

    pub async fn get_assistant(&self, assistant_id: &str) -> ApiResponseOrError<Assistant> {
        self.get(format!("assistants/{}", assistant_id)).await
    }

    pub async fn delete_assistant(&self, assistant_id: &str) -> ApiResponseOrError<Empty> {
        self.delete(format!("assistants/{}", assistant_id)).await
    }

    pub async fn modify_assistant(
        &self,
        assistant_id: &str,
        request: ModifyAssistantRequest,
    ) -> ApiResponseOrError<Assistant> {
        self.post(format!("assistants/{}", assistant_id), request)
            .await
    }
}
