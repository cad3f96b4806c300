//! Turns an OpenAPI-style capability description into invocable function
//! descriptors and into the function tools advertised to an assistant.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::assistants::{FunctionDefinition, Tool};
use crate::invoker::InvokeError;

const REQUIRED_KEYS: [&str; 4] = ["info", "openapi", "servers", "paths"];

#[derive(Debug, thiserror::Error)]
pub enum SpecError {
    #[error("not a valid specification: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error("not a valid specification: missing top-level keys {0}")]
    MissingKeys(String),
    #[error("not a valid specification: {method} {path} has no operationId")]
    MissingOperationId { path: String, method: HttpMethod },
    #[error("not a valid specification: operationId `{0}` is used more than once")]
    DuplicateOperationId(String),
    #[error("not a valid specification: {0}")]
    Malformed(String),
    #[error("not a valid specification: could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 5] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Delete,
        HttpMethod::Patch,
    ];

    /// Whether the parsed arguments travel as a JSON request body.
    pub fn sends_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }

    pub fn as_reqwest(&self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Patch => reqwest::Method::PATCH,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterDescriptor {
    pub name: String,
    pub description: String,
    /// JSON Schema type, e.g. `string` or `integer`.
    pub kind: String,
    pub location: ParameterLocation,
    pub required: bool,
}

/// One operation of a capability description, ready to be advertised as a
/// function tool and to be called over HTTP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParameterDescriptor>,
    /// Names of the parameters flagged `required: true`, in declaration order.
    pub required: Vec<String>,
    pub method: HttpMethod,
    /// Path template with `{param}` placeholders.
    pub path: String,
    /// Candidate base URLs, without trailing `/`.
    pub servers: Vec<String>,
}

impl FunctionDescriptor {
    /// The function tool shape the assistant service expects.
    pub fn to_tool(&self) -> Tool {
        let parameters = if self.parameters.is_empty() {
            None
        } else {
            let properties: Map<String, Value> = self
                .parameters
                .iter()
                .map(|parameter| {
                    (
                        parameter.name.clone(),
                        json!({
                            "description": parameter.description,
                            "type": parameter.kind,
                        }),
                    )
                })
                .collect();

            Some(json!({
                "type": "object",
                "properties": properties,
                "required": self.required,
            }))
        };

        Tool::function(FunctionDefinition {
            name: self.name.clone(),
            description: Some(self.description.clone()),
            parameters,
        })
    }

    /// Builds one candidate URL per server for a call with `args`.
    ///
    /// Path parameters are substituted by replacing the bare parameter name in
    /// the template; braces are stripped afterwards, once query parameters
    /// have been appended as `name=value` with the value percent-encoded.
    pub fn build_call_plan(&self, args: &Map<String, Value>) -> Result<Vec<String>, InvokeError> {
        let mut path = self.path.clone();
        let mut query = Vec::new();

        for parameter in &self.parameters {
            let value = match args.get(&parameter.name) {
                Some(value) => argument_text(value),
                None if parameter.required || parameter.location == ParameterLocation::Path => {
                    return Err(InvokeError::MissingArgument {
                        function: self.name.clone(),
                        argument: parameter.name.clone(),
                    });
                }
                None => continue,
            };

            match parameter.location {
                ParameterLocation::Path => path = path.replace(&parameter.name, &value),
                ParameterLocation::Query => query.push(format!(
                    "{}={}",
                    parameter.name,
                    urlencoding::encode(&value)
                )),
                ParameterLocation::Header | ParameterLocation::Cookie => {}
            }
        }

        if !query.is_empty() {
            path.push('?');
            path.push_str(&query.join("&"));
        }

        let path = path.replace(['{', '}'], "");

        Ok(self
            .servers
            .iter()
            .map(|server| format!("{server}{path}"))
            .collect())
    }
}

fn argument_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[derive(Deserialize)]
struct Document {
    servers: Vec<Server>,
    paths: BTreeMap<String, PathItem>,
}

#[derive(Deserialize)]
struct Server {
    url: String,
}

#[derive(Deserialize, Default)]
struct PathItem {
    get: Option<Operation>,
    post: Option<Operation>,
    put: Option<Operation>,
    delete: Option<Operation>,
    patch: Option<Operation>,
}

impl PathItem {
    fn operation(&self, method: HttpMethod) -> Option<&Operation> {
        match method {
            HttpMethod::Get => self.get.as_ref(),
            HttpMethod::Post => self.post.as_ref(),
            HttpMethod::Put => self.put.as_ref(),
            HttpMethod::Delete => self.delete.as_ref(),
            HttpMethod::Patch => self.patch.as_ref(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Operation {
    operation_id: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Vec<Parameter>,
}

#[derive(Deserialize)]
struct Parameter {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(rename = "in")]
    location: ParameterLocation,
    #[serde(default)]
    required: Option<bool>,
    #[serde(default)]
    schema: Option<ParameterSchema>,
}

#[derive(Deserialize)]
struct ParameterSchema {
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

fn parse_checked(spec_text: &str) -> Result<Value, SpecError> {
    let value: Value = serde_json::from_str(spec_text).map_err(SpecError::InvalidJson)?;
    let object = value
        .as_object()
        .ok_or_else(|| SpecError::Malformed("document is not a JSON object".to_string()))?;

    let missing: Vec<&str> = REQUIRED_KEYS
        .iter()
        .copied()
        .filter(|key| !object.contains_key(*key))
        .collect();
    if !missing.is_empty() {
        return Err(SpecError::MissingKeys(missing.join(", ")));
    }

    Ok(value)
}

/// Whether `spec_text` is JSON carrying all of `info`, `openapi`, `servers`
/// and `paths`.
pub fn validate(spec_text: &str) -> bool {
    parse_checked(spec_text).is_ok()
}

/// Builds one descriptor per (path, verb) pair of the document.
pub fn extract_function_descriptors(spec: &Value) -> Result<Vec<FunctionDescriptor>, SpecError> {
    let document = Document::deserialize(spec)
        .map_err(|error| SpecError::Malformed(error.to_string()))?;

    let servers: Vec<String> = document
        .servers
        .iter()
        .map(|server| server.url.trim_end_matches('/').to_string())
        .collect();

    let mut descriptors: Vec<FunctionDescriptor> = Vec::new();

    for (path, item) in &document.paths {
        for method in HttpMethod::ALL {
            let Some(operation) = item.operation(method) else {
                continue;
            };

            let name = operation
                .operation_id
                .clone()
                .ok_or_else(|| SpecError::MissingOperationId {
                    path: path.clone(),
                    method,
                })?;

            if descriptors.iter().any(|descriptor| descriptor.name == name) {
                return Err(SpecError::DuplicateOperationId(name));
            }

            let parameters: Vec<ParameterDescriptor> = operation
                .parameters
                .iter()
                .map(|parameter| ParameterDescriptor {
                    name: parameter.name.clone(),
                    description: parameter.description.clone(),
                    kind: parameter
                        .schema
                        .as_ref()
                        .and_then(|schema| schema.kind.clone())
                        .unwrap_or_else(|| "string".to_string()),
                    location: parameter.location,
                    required: parameter.required == Some(true),
                })
                .collect();

            let required = parameters
                .iter()
                .filter(|parameter| parameter.required)
                .map(|parameter| parameter.name.clone())
                .collect();

            descriptors.push(FunctionDescriptor {
                name,
                description: operation
                    .summary
                    .clone()
                    .or_else(|| operation.description.clone())
                    .unwrap_or_default(),
                parameters,
                required,
                method,
                path: path.clone(),
                servers: servers.clone(),
            });
        }
    }

    Ok(descriptors)
}

/// Lookup table of the functions of one or more capability descriptions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityRegistry {
    functions: Vec<FunctionDescriptor>,
}

impl CapabilityRegistry {
    /// Validates and loads a whole document; nothing is registered when any
    /// part of it is rejected.
    pub fn from_spec_text(spec_text: &str) -> Result<Self, SpecError> {
        let spec = parse_checked(spec_text)?;
        let functions = extract_function_descriptors(&spec)?;
        log::debug!("Loaded capability description with {} functions", functions.len());
        Ok(Self { functions })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SpecError> {
        let path = path.as_ref();
        let spec_text = std::fs::read_to_string(path).map_err(|source| SpecError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_spec_text(&spec_text)
    }

    pub fn get(&self, function_name: &str) -> Option<&FunctionDescriptor> {
        self.functions
            .iter()
            .find(|descriptor| descriptor.name == function_name)
    }

    pub fn descriptors(&self) -> &[FunctionDescriptor] {
        &self.functions
    }

    pub fn tools(&self) -> Vec<Tool> {
        self.functions.iter().map(FunctionDescriptor::to_tool).collect()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Functions of `other` replace same-named functions of `self`.
    pub fn merged(&self, other: &CapabilityRegistry) -> CapabilityRegistry {
        let mut functions: Vec<FunctionDescriptor> = self
            .functions
            .iter()
            .filter(|descriptor| other.get(&descriptor.name).is_none())
            .cloned()
            .collect();
        functions.extend(other.functions.iter().cloned());
        CapabilityRegistry { functions }
    }
}

/// The capability registries known to this process, per assistant, with an
/// optional default used for every assistant.
#[derive(Debug, Default)]
pub struct CapabilityCatalog {
    default: RwLock<Option<Arc<CapabilityRegistry>>>,
    by_assistant: RwLock<HashMap<String, Arc<CapabilityRegistry>>>,
}

impl CapabilityCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(registry: CapabilityRegistry) -> Self {
        let catalog = Self::default();
        catalog.set_default(registry);
        catalog
    }

    pub fn set_default(&self, registry: CapabilityRegistry) {
        *self.default.write() = Some(Arc::new(registry));
    }

    /// Adds `registry` to what is already known for the assistant.
    pub fn register(&self, assistant_id: &str, registry: CapabilityRegistry) {
        let mut by_assistant = self.by_assistant.write();
        let merged = match by_assistant.get(assistant_id) {
            Some(existing) => existing.merged(&registry),
            None => registry,
        };
        by_assistant.insert(assistant_id.to_string(), Arc::new(merged));
    }

    pub fn forget(&self, assistant_id: &str) {
        self.by_assistant.write().remove(assistant_id);
    }

    /// The registry tool calls of `assistant_id` resolve against: its own
    /// functions layered over the default ones.
    pub fn for_assistant(&self, assistant_id: &str) -> Option<Arc<CapabilityRegistry>> {
        let own = self.by_assistant.read().get(assistant_id).cloned();
        let default = self.default.read().clone();
        match (default, own) {
            (Some(default), Some(own)) => Some(Arc::new(default.merged(&own))),
            (default, own) => own.or(default),
        }
    }
}
