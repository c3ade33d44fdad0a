//! Configuration for the trip planner.

use std::env;
use std::str::FromStr;

use crate::error::PlannerError;
use crate::state::StatusMergePolicy;
use crate::Result;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Configuration for the planner and its Gemini client.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// API key for the generative language service.
    pub api_key: String,

    /// Model name to use.
    pub model: String,

    /// Base URL up to and including the API version.
    pub api_base_url: String,

    /// Optional sampling temperature; provider default when unset.
    pub temperature: Option<f32>,

    /// Transport timeout for a single model call.
    pub request_timeout_secs: u64,

    /// Acknowledgement rounds allowed in one chat turn.
    pub max_tool_rounds: usize,

    /// How local rejected markers survive a model-driven replacement.
    pub status_merge: StatusMergePolicy,

    /// Port for the HTTP API.
    pub port: u16,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            api_base_url: DEFAULT_API_URL.to_string(),
            temperature: None,
            request_timeout_secs: 120,
            max_tool_rounds: 4,
            status_merge: StatusMergePolicy::Overwrite,
            port: 8080,
        }
    }
}

impl PlannerConfig {
    /// Create configuration from environment variables.
    ///
    /// Required environment variables:
    /// - `GEMINI_API_KEY` - API key for authentication
    ///
    /// Optional environment variables:
    /// - `GEMINI_MODEL` - Model name (default: gemini-2.5-flash)
    /// - `GEMINI_API_URL` - Base URL (default: v1beta endpoint)
    /// - `GEMINI_TEMPERATURE` - Sampling temperature (default: provider default)
    /// - `GEMINI_TIMEOUT_SECS` - Request timeout (default: 120)
    /// - `PLANNER_MAX_TOOL_ROUNDS` - Tool acknowledgement rounds per turn (default: 4)
    /// - `PLANNER_STATUS_MERGE` - `overwrite` or `preserve_rejected` (default: overwrite)
    /// - `PORT` or `API_PORT` - HTTP port (default: 8080)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as `from_env` with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = get("GEMINI_API_KEY")
            .ok_or_else(|| PlannerError::Configuration("GEMINI_API_KEY not set".to_string()))?;

        let status_merge = match get("PLANNER_STATUS_MERGE") {
            Some(value) => value.parse()?,
            None => defaults.status_merge,
        };

        Ok(Self {
            api_key,
            model: get("GEMINI_MODEL").unwrap_or(defaults.model),
            api_base_url: get("GEMINI_API_URL").unwrap_or(defaults.api_base_url),
            temperature: parse_opt("GEMINI_TEMPERATURE", get("GEMINI_TEMPERATURE"))?,
            request_timeout_secs: parse_opt("GEMINI_TIMEOUT_SECS", get("GEMINI_TIMEOUT_SECS"))?
                .unwrap_or(defaults.request_timeout_secs),
            max_tool_rounds: parse_opt("PLANNER_MAX_TOOL_ROUNDS", get("PLANNER_MAX_TOOL_ROUNDS"))?
                .unwrap_or(defaults.max_tool_rounds),
            status_merge,
            port: parse_opt("PORT", get("PORT").or_else(|| get("API_PORT")))?
                .unwrap_or(defaults.port),
        })
    }
}

fn parse_opt<T: FromStr>(key: &str, value: Option<String>) -> Result<Option<T>> {
    value
        .map(|raw| {
            raw.parse::<T>().map_err(|_| {
                PlannerError::Configuration(format!("{} has an invalid value: {}", key, raw))
            })
        })
        .transpose()
}
