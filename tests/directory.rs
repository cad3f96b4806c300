mod common;

use std::sync::Arc;

use assistant_runner::{
    assistants::{FunctionDefinition, Tool},
    AssistantDirectory, CapabilityCatalog, Error,
};
use common::ScriptedService;
use serde_json::json;

const STORES_SPEC: &str = r#"{
    "openapi": "3.0.1",
    "info": { "title": "Stores", "version": "1" },
    "servers": [{ "url": "https://stores.example" }],
    "paths": {
        "/stores": {
            "get": { "operationId": "listStores", "summary": "List the stores" }
        },
        "/stores/{id}": {
            "get": {
                "operationId": "getStore",
                "summary": "One store",
                "parameters": [
                    { "name": "id", "in": "path", "required": true, "schema": { "type": "string" } }
                ]
            }
        }
    }
}"#;

fn directory(service: &Arc<ScriptedService>, catalog: &Arc<CapabilityCatalog>) -> AssistantDirectory {
    AssistantDirectory::new(service.clone(), catalog.clone(), "gpt-4o")
}

fn function_names(tools: &[Tool]) -> Vec<String> {
    tools
        .iter()
        .filter_map(Tool::as_function)
        .map(|function| function.name.clone())
        .collect()
}

#[tokio::test]
async fn create_rejects_duplicate_names() {
    let service = Arc::new(ScriptedService::new().with_assistant("asst_1", "Weather", json!([])));
    let directory = directory(&service, &Arc::new(CapabilityCatalog::new()));

    let error = directory
        .create("Weather", "Talk about weather", None)
        .await
        .unwrap_err();
    assert!(matches!(error, Error::DuplicateAssistant(name) if name == "Weather"));

    let created = directory
        .create("Stores", "Find stores", Some("Store finder"))
        .await
        .unwrap();
    assert_eq!(created.name.as_deref(), Some("Stores"));
    assert_eq!(created.model, "gpt-4o");
    assert!(created.tools.is_empty());
    assert_eq!(directory.summaries().await.unwrap().len(), 2);
}

#[tokio::test]
async fn find_by_name_matches_exactly() {
    let service = Arc::new(ScriptedService::new().with_assistant("asst_1", "Weather", json!([])));
    let directory = directory(&service, &Arc::new(CapabilityCatalog::new()));

    assert_eq!(
        directory.find_by_name("Weather").await.unwrap().map(|a| a.id),
        Some("asst_1".to_string())
    );
    assert!(!directory.is_duplicate_name("weather").await.unwrap());
}

#[tokio::test]
async fn unchanged_instructions_are_not_sent() {
    let service = Arc::new(ScriptedService::new().with_assistant("asst_1", "Weather", json!([])));
    let directory = directory(&service, &Arc::new(CapabilityCatalog::new()));

    directory
        .update_instructions("asst_1", "Be concise")
        .await
        .unwrap();
    directory
        .update_instructions("asst_1", "Be concise")
        .await
        .unwrap();

    assert_eq!(service.state.lock().modifications.len(), 1);
}

#[tokio::test]
async fn code_interpreter_toggle_keeps_functions() {
    let service = Arc::new(ScriptedService::new().with_assistant(
        "asst_1",
        "Weather",
        json!([{ "type": "function", "function": { "name": "getWeather" } }]),
    ));
    let directory = directory(&service, &Arc::new(CapabilityCatalog::new()));

    let enabled = directory.set_code_interpreter("asst_1", true).await.unwrap();
    assert!(AssistantDirectory::has_code_interpreter(&enabled));
    assert_eq!(function_names(&enabled.tools), ["getWeather"]);

    let disabled = directory.set_code_interpreter("asst_1", false).await.unwrap();
    assert!(!AssistantDirectory::has_code_interpreter(&disabled));
    assert_eq!(function_names(&disabled.tools), ["getWeather"]);
}

#[tokio::test]
async fn functions_from_spec_are_merged_and_registered() {
    let service = Arc::new(ScriptedService::new().with_assistant(
        "asst_1",
        "Stores",
        json!([
            { "type": "code_interpreter" },
            { "type": "function", "function": { "name": "getStore", "description": "stale" } },
            { "type": "function", "function": { "name": "health" } }
        ]),
    ));
    let catalog = Arc::new(CapabilityCatalog::new());
    let directory = directory(&service, &catalog);

    let assistant = directory
        .add_functions_from_spec("asst_1", STORES_SPEC)
        .await
        .unwrap();

    assert_eq!(
        function_names(&assistant.tools),
        ["getStore", "health", "listStores"]
    );
    let get_store = AssistantDirectory::functions(&assistant)[0];
    assert_eq!(get_store.description.as_deref(), Some("One store"));
    let registry = catalog.for_assistant("asst_1").unwrap();
    assert!(registry.get("listStores").is_some());
}

#[tokio::test]
async fn invalid_spec_changes_nothing() {
    let service = Arc::new(ScriptedService::new().with_assistant("asst_1", "Stores", json!([])));
    let catalog = Arc::new(CapabilityCatalog::new());
    let directory = directory(&service, &catalog);

    let error = directory
        .add_functions_from_spec("asst_1", r#"{"info":{},"paths":{},"servers":[]}"#)
        .await
        .unwrap_err();

    assert!(matches!(error, Error::Spec(_)));
    assert!(error.to_string().starts_with("not a valid specification"));
    assert!(service.state.lock().modifications.is_empty());
    assert!(catalog.for_assistant("asst_1").is_none());
}

#[tokio::test]
async fn function_definitions_can_be_edited_and_removed() {
    let service = Arc::new(ScriptedService::new().with_assistant(
        "asst_1",
        "Stores",
        json!([{ "type": "function", "function": { "name": "getStore" } }]),
    ));
    let directory = directory(&service, &Arc::new(CapabilityCatalog::new()));

    let updated = directory
        .update_function(
            "asst_1",
            r#"{"name":"getStore","description":"Look up one store","parameters":{"type":"object","properties":{}}}"#,
        )
        .await
        .unwrap();
    assert_eq!(
        AssistantDirectory::functions(&updated),
        [&FunctionDefinition {
            name: "getStore".to_string(),
            description: Some("Look up one store".to_string()),
            parameters: Some(json!({ "type": "object", "properties": {} })),
        }]
    );

    let error = directory
        .update_function("asst_1", "{not json")
        .await
        .unwrap_err();
    assert!(matches!(error, Error::InvalidFunctionDefinition(_)));

    let removed = directory.delete_function("asst_1", "getStore").await.unwrap();
    assert!(removed.tools.is_empty());
    let error = directory
        .delete_function("asst_1", "getStore")
        .await
        .unwrap_err();
    assert!(matches!(error, Error::UnknownFunction(_)));
}

#[tokio::test]
async fn conversation_starters_round_trip_through_metadata() {
    let service = Arc::new(ScriptedService::new().with_assistant("asst_1", "Weather", json!([])));
    let directory = directory(&service, &Arc::new(CapabilityCatalog::new()));

    assert!(directory
        .conversation_starters("asst_1")
        .await
        .unwrap()
        .is_empty());

    let starters = vec!["Weather in Paris?".to_string(), "Will it rain?".to_string()];
    let assistant = directory
        .set_conversation_starters("asst_1", &starters)
        .await
        .unwrap();

    assert_eq!(
        assistant.metadata.unwrap()["conversation_starters"],
        r#"["Weather in Paris?","Will it rain?"]"#
    );
    assert_eq!(
        directory.conversation_starters("asst_1").await.unwrap(),
        starters
    );
}

#[tokio::test]
async fn delete_forgets_registered_capabilities() {
    let service = Arc::new(ScriptedService::new().with_assistant("asst_1", "Stores", json!([])));
    let catalog = Arc::new(CapabilityCatalog::new());
    let directory = directory(&service, &catalog);
    directory
        .add_functions_from_spec("asst_1", STORES_SPEC)
        .await
        .unwrap();

    directory.delete("asst_1").await.unwrap();

    assert!(catalog.for_assistant("asst_1").is_none());
    assert!(directory.list().await.unwrap().is_empty());
}
