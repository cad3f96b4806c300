//! Lists the assistants available to a session and manages their
//! instructions, tools and conversation starters.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::{
    assistants::{
        Assistant, CreateAssistantRequest, FunctionDefinition, ModifyAssistantRequest, Tool,
    },
    capability::{CapabilityCatalog, CapabilityRegistry},
    service::AssistantService,
    Error, Result,
};

const CONVERSATION_STARTERS_KEY: &str = "conversation_starters";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssistantSummary {
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub created_at: u64,
}

impl From<&Assistant> for AssistantSummary {
    fn from(assistant: &Assistant) -> Self {
        AssistantSummary {
            id: assistant.id.clone(),
            name: assistant.name.clone(),
            description: assistant.description.clone(),
            created_at: assistant.created_at,
        }
    }
}

pub struct AssistantDirectory {
    service: Arc<dyn AssistantService>,
    catalog: Arc<CapabilityCatalog>,
    model: String,
}

impl AssistantDirectory {
    /// `model` is the model or deployment new assistants are created on.
    pub fn new(
        service: Arc<dyn AssistantService>,
        catalog: Arc<CapabilityCatalog>,
        model: impl Into<String>,
    ) -> Self {
        AssistantDirectory {
            service,
            catalog,
            model: model.into(),
        }
    }

    pub async fn list(&self) -> Result<Vec<Assistant>> {
        Ok(self.service.list_assistants().await?)
    }

    pub async fn summaries(&self) -> Result<Vec<AssistantSummary>> {
        let assistants = self.list().await?;
        Ok(assistants.iter().map(AssistantSummary::from).collect())
    }

    pub async fn get(&self, assistant_id: &str) -> Result<Assistant> {
        Ok(self.service.get_assistant(assistant_id).await?)
    }

    /// The first assistant whose name is exactly `name`.
    pub async fn find_by_name(&self, name: &str) -> Result<Option<Assistant>> {
        let assistants = self.list().await?;
        Ok(assistants
            .into_iter()
            .find(|assistant| assistant.name.as_deref() == Some(name)))
    }

    pub async fn is_duplicate_name(&self, name: &str) -> Result<bool> {
        Ok(self.find_by_name(name).await?.is_some())
    }

    /// Creates an assistant with no tools enabled.
    pub async fn create(
        &self,
        name: &str,
        instructions: &str,
        description: Option<&str>,
    ) -> Result<Assistant> {
        if self.is_duplicate_name(name).await? {
            return Err(Error::DuplicateAssistant(name.to_string()));
        }

        let request = CreateAssistantRequest {
            model: self.model.clone(),
            name: Some(name.to_string()),
            description: description.map(str::to_string),
            instructions: Some(instructions.to_string()),
            tools: Vec::new(),
            metadata: None,
        };
        let assistant = self.service.create_assistant(request).await?;
        log::info!("Created assistant {} ({})", name, assistant.id);
        Ok(assistant)
    }

    pub async fn delete(&self, assistant_id: &str) -> Result<()> {
        self.service.delete_assistant(assistant_id).await?;
        self.catalog.forget(assistant_id);
        log::info!("Deleted assistant {assistant_id}");
        Ok(())
    }

    pub async fn update_instructions(
        &self,
        assistant_id: &str,
        instructions: &str,
    ) -> Result<Assistant> {
        let assistant = self.get(assistant_id).await?;
        if assistant.instructions.as_deref() == Some(instructions) {
            return Ok(assistant);
        }

        self.modify(
            assistant_id,
            ModifyAssistantRequest {
                instructions: Some(instructions.to_string()),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn set_code_interpreter(&self, assistant_id: &str, enabled: bool) -> Result<Assistant> {
        let assistant = self.get(assistant_id).await?;
        if Self::has_code_interpreter(&assistant) == enabled {
            return Ok(assistant);
        }

        let mut tools: Vec<Tool> = assistant
            .tools
            .into_iter()
            .filter(|tool| !tool.is_code_interpreter())
            .collect();
        if enabled {
            tools.insert(0, Tool::CodeInterpreter);
        }
        self.replace_tools(assistant_id, tools).await
    }

    /// Adds one function per operation of an OpenAPI document and makes the
    /// document's operations callable for the assistant. Functions with an
    /// existing name are replaced in place.
    pub async fn add_functions_from_spec(
        &self,
        assistant_id: &str,
        spec_text: &str,
    ) -> Result<Assistant> {
        let registry = CapabilityRegistry::from_spec_text(spec_text)?;
        let assistant = self.get(assistant_id).await?;

        let mut tools = assistant.tools;
        for tool in registry.tools() {
            upsert_function(&mut tools, tool);
        }

        let assistant = self.replace_tools(assistant_id, tools).await?;
        log::info!(
            "Registered {} functions for assistant {}",
            registry.len(),
            assistant_id
        );
        self.catalog.register(assistant_id, registry);
        Ok(assistant)
    }

    /// Replaces the function with the same name as the JSON function
    /// definition `definition`, or adds it.
    pub async fn update_function(&self, assistant_id: &str, definition: &str) -> Result<Assistant> {
        let function: FunctionDefinition = serde_json::from_str(definition)
            .map_err(|error| Error::InvalidFunctionDefinition(error.to_string()))?;
        if function.name.trim().is_empty() {
            return Err(Error::InvalidFunctionDefinition(
                "function name is empty".to_string(),
            ));
        }

        let assistant = self.get(assistant_id).await?;
        let mut tools = assistant.tools;
        log::debug!("Updating function {} of {}", function.name, assistant_id);
        upsert_function(&mut tools, Tool::function(function));
        self.replace_tools(assistant_id, tools).await
    }

    pub async fn delete_function(&self, assistant_id: &str, name: &str) -> Result<Assistant> {
        let assistant = self.get(assistant_id).await?;
        let before = assistant.tools.len();
        let tools: Vec<Tool> = assistant
            .tools
            .into_iter()
            .filter(|tool| tool.as_function().map(|function| function.name.as_str()) != Some(name))
            .collect();
        if tools.len() == before {
            return Err(Error::UnknownFunction(name.to_string()));
        }
        self.replace_tools(assistant_id, tools).await
    }

    pub fn functions(assistant: &Assistant) -> Vec<&FunctionDefinition> {
        assistant.tools.iter().filter_map(Tool::as_function).collect()
    }

    pub fn has_code_interpreter(assistant: &Assistant) -> bool {
        assistant.tools.iter().any(Tool::is_code_interpreter)
    }

    /// Suggested first prompts, kept in the assistant's metadata.
    pub async fn conversation_starters(&self, assistant_id: &str) -> Result<Vec<String>> {
        let assistant = self.get(assistant_id).await?;
        let raw = assistant
            .metadata
            .as_ref()
            .and_then(|metadata| metadata.get(CONVERSATION_STARTERS_KEY));
        match raw {
            None => Ok(Vec::new()),
            Some(raw) => match serde_json::from_str(raw) {
                Ok(starters) => Ok(starters),
                Err(error) => {
                    log::warn!("Ignoring unreadable conversation starters of {assistant_id}: {error}");
                    Ok(Vec::new())
                }
            },
        }
    }

    /// Stores `starters` as the assistant's only metadata entry.
    pub async fn set_conversation_starters(
        &self,
        assistant_id: &str,
        starters: &[String],
    ) -> Result<Assistant> {
        let encoded = serde_json::to_string(starters).map_err(crate::OpenAiError::from)?;
        let metadata = HashMap::from([(CONVERSATION_STARTERS_KEY.to_string(), encoded)]);
        self.modify(
            assistant_id,
            ModifyAssistantRequest {
                metadata: Some(metadata),
                ..Default::default()
            },
        )
        .await
    }

    async fn replace_tools(&self, assistant_id: &str, tools: Vec<Tool>) -> Result<Assistant> {
        self.modify(
            assistant_id,
            ModifyAssistantRequest {
                tools: Some(tools),
                ..Default::default()
            },
        )
        .await
    }

    async fn modify(&self, assistant_id: &str, request: ModifyAssistantRequest) -> Result<Assistant> {
        Ok(self.service.modify_assistant(assistant_id, request).await?)
    }
}

fn upsert_function(tools: &mut Vec<Tool>, tool: Tool) {
    let name = match tool.as_function() {
        Some(function) => function.name.clone(),
        None => return,
    };
    let existing = tools
        .iter_mut()
        .find(|candidate| candidate.as_function().map(|function| &function.name) == Some(&name));
    match existing {
        Some(slot) => *slot = tool,
        None => tools.push(tool),
    }
}
