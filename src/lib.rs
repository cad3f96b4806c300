//! Drive hosted assistant runs to completion.
//!
//! The crate talks to an OpenAI-compatible assistants service, keeps one
//! thread per assistant for a session, and answers the tool calls a run asks
//! for by executing the HTTP operations described in an OpenAPI document.

use serde::Deserialize;
use std::env;

pub mod assistants;
pub mod capability;
pub mod client;
pub mod config;
pub mod directory;
pub mod invoker;
pub mod runner;
pub mod service;
pub mod session;

pub use capability::{CapabilityCatalog, CapabilityRegistry, FunctionDescriptor, SpecError};
pub use client::OpenAiClient;
pub use config::RunnerConfig;
pub use directory::AssistantDirectory;
pub use invoker::{FunctionInvoker, InvokeError};
pub use runner::{ChatMessage, RunDriver, UploadOutcome};
pub use service::AssistantService;
pub use session::{SessionContext, ThreadStore};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1/";

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct OpenAiError {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: String,
    pub param: Option<String>,
    pub code: Option<String>,
}

impl OpenAiError {
    pub fn new(message: String, error_type: String) -> OpenAiError {
        OpenAiError {
            message,
            error_type,
            param: None,
            code: None,
        }
    }
}

impl std::fmt::Display for OpenAiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for OpenAiError {}

impl From<reqwest::Error> for OpenAiError {
    fn from(value: reqwest::Error) -> Self {
        OpenAiError::new(value.to_string(), "reqwest".to_string())
    }
}

impl From<serde_json::Error> for OpenAiError {
    fn from(value: serde_json::Error) -> Self {
        OpenAiError::new(value.to_string(), "serde_json".to_string())
    }
}

pub type ApiResponseOrError<T> = std::result::Result<T, OpenAiError>;

/// Everything that can stop a conversation turn or a management operation.
///
/// Failures of a single tool call never show up here: those are turned into
/// an output string and handed back to the run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("assistant service error: {0}")]
    Api(#[from] OpenAiError),
    #[error(transparent)]
    Spec(#[from] SpecError),
    #[error("run {run_id} ended with status {status}{}", error_suffix(.last_error))]
    RunEnded {
        run_id: String,
        status: assistants::runs::Status,
        last_error: Option<String>,
    },
    #[error("run {run_id} did not finish after {polls} polls")]
    PollLimitExceeded { run_id: String, polls: u32 },
    #[error("an assistant named `{0}` already exists")]
    DuplicateAssistant(String),
    #[error("no assistant with id `{0}`")]
    UnknownAssistant(String),
    #[error("assistant has no function named `{0}`")]
    UnknownFunction(String),
    #[error("not a valid function definition: {0}")]
    InvalidFunctionDefinition(String),
    #[error("upload of `{filename}` failed: {reason}")]
    UploadFailed { filename: String, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;

fn error_suffix(last_error: &Option<String>) -> String {
    last_error
        .as_deref()
        .map(|error| format!(": {error}"))
        .unwrap_or_default()
}

/// Holds the API key, base URL and optional API version used for every
/// request to the assistant service.
///
/// A present `api_version` selects Azure-style requests: `api-key` header
/// authentication and an `api-version` query parameter.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Credentials {
    api_key: String,
    base_url: String,
    api_version: Option<String>,
}

impl Credentials {
    /// The base URL is normalised to end with a `/` so routes can be
    /// appended directly.
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self {
            api_key: api_key.into(),
            base_url,
            api_version: None,
        }
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = Some(api_version.into());
        self
    }

    /// Reads `OPENAI_KEY` and `OPENAI_BASE_URL`, loading a `.env` file first
    /// when there is one.
    ///
    /// ## Examples
    ///
    /// ```rust
    /// use assistant_runner::Credentials;
    ///
    /// std::env::set_var("OPENAI_KEY", "sk-test");
    /// let credentials = Credentials::from_env();
    /// assert_eq!(credentials.api_key(), "sk-test");
    /// ```
    pub fn from_env() -> Credentials {
        dotenvy::dotenv().ok();
        let api_key = env::var("OPENAI_KEY").unwrap_or_default();
        let base_url = env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Credentials::new(api_key, base_url)
    }

    /// Reads `AZURE_OPENAI_RESOURCE_NAME`, `AZURE_OPENAI_KEY` and
    /// `AZURE_OPENAI_API_VERSION`.
    pub fn from_azure_env() -> Credentials {
        dotenvy::dotenv().ok();
        let resource = env::var("AZURE_OPENAI_RESOURCE_NAME").unwrap_or_default();
        let api_key = env::var("AZURE_OPENAI_KEY").unwrap_or_default();
        let api_version = env::var("AZURE_OPENAI_API_VERSION").ok();
        azure_credentials(&resource, api_key, api_version)
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_version(&self) -> Option<&str> {
        self.api_version.as_deref()
    }
}

fn azure_base_url(resource: &str) -> String {
    format!("https://{resource}.openai.azure.com/openai/")
}

fn azure_credentials(resource: &str, api_key: String, api_version: Option<String>) -> Credentials {
    let credentials = Credentials::new(api_key, azure_base_url(resource));
    match api_version.filter(|version| !version.trim().is_empty()) {
        Some(version) => credentials.with_api_version(version),
        None => credentials,
    }
}
