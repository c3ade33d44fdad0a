//! Error types for the trip planner

use thiserror::Error;
use uuid::Uuid;

/// Result type alias for planner operations
pub type Result<T> = std::result::Result<T, PlannerError>;

#[derive(Error, Debug)]
pub enum PlannerError {

    // =============================
    // Planning Pipeline Errors
    // =============================

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Empty response: {0}")]
    EmptyResponse(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("No chat session for trip {0}; generate a trip first")]
    SessionNotInitialized(Uuid),

    #[error("Model did not invoke a tool: {0}")]
    NoToolInvocation(String),

    #[error("Model kept calling tools after {0} acknowledgements")]
    ToolRoundsExceeded(usize),

    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    #[error("Invalid preferences: {0}")]
    InvalidPreferences(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl PlannerError {
    /// Fixed sentence safe to show to an end user.
    pub fn user_message(&self) -> String {
        match self {
            PlannerError::Transport(_) | PlannerError::Http(_) => {
                "The travel assistant is unreachable right now. Please try again.".to_string()
            }
            PlannerError::EmptyResponse(_) | PlannerError::Parse(_) | PlannerError::InvalidPlan(_) => {
                "Failed to generate itinerary. Please try again.".to_string()
            }
            PlannerError::SessionNotInitialized(_) => {
                "No active trip session. Please generate a trip and try again.".to_string()
            }
            PlannerError::NoToolInvocation(_) | PlannerError::ToolRoundsExceeded(_) => {
                "Failed to update itinerary. Please try again.".to_string()
            }
            PlannerError::InvalidPreferences(reason) => reason.clone(),
            PlannerError::Configuration(_) | PlannerError::Serialization(_) => {
                "Something went wrong on our side. Please try again later.".to_string()
            }
        }
    }

    /// Whether repeating the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PlannerError::Transport(_)
                | PlannerError::Http(_)
                | PlannerError::EmptyResponse(_)
                | PlannerError::Parse(_)
                | PlannerError::InvalidPlan(_)
                | PlannerError::NoToolInvocation(_)
                | PlannerError::ToolRoundsExceeded(_)
        )
    }
}
