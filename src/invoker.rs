//! Executes the HTTP call behind a function tool call.

use std::time::Duration;

use rand::seq::SliceRandom;
use reqwest::{Client, StatusCode};
use serde_json::{Map, Value};

use crate::capability::{CapabilityRegistry, FunctionDescriptor};

/// Why a single tool call produced no result. Recovered by the run driver,
/// which reports it to the run as the call's output.
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    #[error("no function named `{0}` is registered")]
    UnknownFunction(String),
    #[error("arguments for `{function}` are not valid JSON: {source}")]
    MalformedArguments {
        function: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("arguments for `{0}` are not a JSON object")]
    ArgumentsNotObject(String),
    #[error("`{function}` requires argument `{argument}`")]
    MissingArgument { function: String, argument: String },
    #[error("`{0}` has no candidate servers")]
    NoServers(String),
    #[error("no server answered `{function}` with 200 OK after {attempts} attempts")]
    Exhausted { function: String, attempts: usize },
}

impl InvokeError {
    /// The output string submitted to the run in place of a result.
    pub fn to_output(&self) -> String {
        format!("ERROR: {self}")
    }
}

#[derive(Clone, Debug, Default)]
pub struct FunctionInvoker {
    client: Client,
}

impl FunctionInvoker {
    pub fn new(request_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Calls `function_name` with the JSON-encoded `args_json`, trying every
    /// candidate server in random order until one answers 200 OK. The body of
    /// that response is the result.
    pub async fn call(
        &self,
        registry: &CapabilityRegistry,
        function_name: &str,
        args_json: &str,
    ) -> Result<String, InvokeError> {
        let result = self.try_call(registry, function_name, args_json).await;
        if let Err(error) = &result {
            log::warn!("Function call {function_name} failed: {error}");
        }
        result
    }

    async fn try_call(
        &self,
        registry: &CapabilityRegistry,
        function_name: &str,
        args_json: &str,
    ) -> Result<String, InvokeError> {
        let descriptor = registry
            .get(function_name)
            .ok_or_else(|| InvokeError::UnknownFunction(function_name.to_string()))?;

        let args = parse_arguments(function_name, args_json)?;

        let mut candidates = descriptor.build_call_plan(&args)?;
        if candidates.is_empty() {
            return Err(InvokeError::NoServers(function_name.to_string()));
        }
        candidates.shuffle(&mut rand::thread_rng());

        let attempts = candidates.len();
        for url in candidates {
            match self.attempt(descriptor, &url, &args).await {
                Ok(body) => {
                    log::debug!("{} {} answered {} bytes", descriptor.method, url, body.len());
                    return Ok(body);
                }
                Err(reason) => {
                    log::debug!("{} {} failed: {}", descriptor.method, url, reason);
                }
            }
        }

        Err(InvokeError::Exhausted {
            function: function_name.to_string(),
            attempts,
        })
    }

    async fn attempt(
        &self,
        descriptor: &FunctionDescriptor,
        url: &str,
        args: &Map<String, Value>,
    ) -> Result<String, String> {
        let mut request = self.client.request(descriptor.method.as_reqwest(), url);
        if descriptor.method.sends_body() {
            request = request.json(args);
        }

        let response = request.send().await.map_err(|error| error.to_string())?;
        if response.status() != StatusCode::OK {
            return Err(format!("status {}", response.status()));
        }

        response.text().await.map_err(|error| error.to_string())
    }
}

fn parse_arguments(function_name: &str, args_json: &str) -> Result<Map<String, Value>, InvokeError> {
    if args_json.trim().is_empty() {
        return Ok(Map::new());
    }

    let value: Value =
        serde_json::from_str(args_json).map_err(|source| InvokeError::MalformedArguments {
            function: function_name.to_string(),
            source,
        })?;

    match value {
        Value::Object(args) => Ok(args),
        Value::Null => Ok(Map::new()),
        _ => Err(InvokeError::ArgumentsNotObject(function_name.to_string())),
    }
}
