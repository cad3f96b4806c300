use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use derive_builder::Builder;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_MAX_POLLS: u32 = 600;
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MODEL: &str = "gpt-4o";

/// Settings of the run driver and of the assistants it creates.
#[derive(Debug, Clone, PartialEq, Builder)]
#[builder(pattern = "owned", default)]
#[builder(name = "RunnerConfigBuilder")]
pub struct RunnerConfig {
    /// Pause between two run status polls.
    pub poll_interval: Duration,
    /// Polls allowed before a run is given up on.
    pub max_polls: u32,
    /// Timeout of each HTTP call made for a tool call.
    pub request_timeout: Duration,
    /// Instructions overriding the assistant's own for every run.
    #[builder(setter(into, strip_option))]
    pub run_instructions: Option<String>,
    /// Model or deployment new assistants are created on.
    #[builder(setter(into))]
    pub model: String,
    /// Capability description used for every assistant without its own.
    #[builder(setter(into, strip_option))]
    pub capability_spec_path: Option<PathBuf>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_polls: DEFAULT_MAX_POLLS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            run_instructions: None,
            model: DEFAULT_MODEL.to_string(),
            capability_spec_path: None,
        }
    }
}

impl RunnerConfig {
    pub fn builder() -> RunnerConfigBuilder {
        RunnerConfigBuilder::default()
    }

    /// Reads `ASSISTANT_POLL_INTERVAL_MS`, `ASSISTANT_MAX_POLLS`,
    /// `ASSISTANT_REQUEST_TIMEOUT_SECS`, `ASSISTANT_RUN_INSTRUCTIONS`,
    /// `ASSISTANT_CAPABILITY_SPEC` and the model from
    /// `AZURE_OPENAI_MODEL_DEPLOYMENT_NAME` or `OPENAI_MODEL`.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Self {
            poll_interval: Duration::from_millis(parse_or(
                &lookup,
                "ASSISTANT_POLL_INTERVAL_MS",
                defaults.poll_interval.as_millis() as u64,
            )),
            max_polls: parse_or(&lookup, "ASSISTANT_MAX_POLLS", defaults.max_polls),
            request_timeout: Duration::from_secs(parse_or(
                &lookup,
                "ASSISTANT_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )),
            run_instructions: non_empty("ASSISTANT_RUN_INSTRUCTIONS"),
            model: non_empty("AZURE_OPENAI_MODEL_DEPLOYMENT_NAME")
                .or_else(|| non_empty("OPENAI_MODEL"))
                .unwrap_or(defaults.model),
            capability_spec_path: non_empty("ASSISTANT_CAPABILITY_SPEC").map(PathBuf::from),
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                log::warn!("Ignoring {key}={raw:?}: not a valid value, using {default}");
                default
            }
        },
    }
}
