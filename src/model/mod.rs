//! Generative model trait and wire types
//!
//! The planner talks to the model through `GenerativeModel`, so the Gemini
//! client and the scripted model used in tests are interchangeable.

use crate::error::PlannerError;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

pub mod gemini;
pub use gemini::GeminiClient;

pub const ROLE_USER: &str = "user";
pub const ROLE_MODEL: &str = "model";

//
// ================= Conversation Content =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Some(ROLE_USER.to_string()),
            parts: vec![Part::text(text)],
        }
    }

    pub fn model_text(text: impl Into<String>) -> Self {
        Self {
            role: Some(ROLE_MODEL.to_string()),
            parts: vec![Part::text(text)],
        }
    }

    pub fn user_parts(parts: Vec<Part>) -> Self {
        Self {
            role: Some(ROLE_USER.to_string()),
            parts,
        }
    }

    /// Instruction blocks carry no role.
    pub fn instruction(text: impl Into<String>) -> Self {
        Self {
            role: None,
            parts: vec![Part::text(text)],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Set on reasoning summaries, which are not part of the answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,
    /// Opaque token the provider wants echoed back in history.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought_signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_response: Option<FunctionResponse>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn function_call(call: FunctionCall) -> Self {
        Self {
            function_call: Some(call),
            ..Default::default()
        }
    }

    pub fn function_response(response: FunctionResponse) -> Self {
        Self {
            function_response: Some(response),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub response: Value,
}

//
// ================= Tools =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct GoogleSearch {}

/// One entry of the request `tools` array.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum Tool {
    GoogleSearch(GoogleSearch),
    FunctionDeclarations(Vec<FunctionDeclaration>),
}

impl Tool {
    pub fn search() -> Self {
        Tool::GoogleSearch(GoogleSearch::default())
    }

    pub fn declares(&self, function_name: &str) -> bool {
        match self {
            Tool::FunctionDeclarations(decls) => decls.iter().any(|d| d.name == function_name),
            Tool::GoogleSearch(_) => false,
        }
    }
}

//
// ================= Request / Response =================
//

/// Everything one stateless model call needs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GenerateRequest {
    pub system_instruction: Option<String>,
    pub contents: Vec<Content>,
    pub tools: Vec<Tool>,
}

impl GenerateRequest {
    pub fn uses_search(&self) -> bool {
        self.tools.iter().any(|t| matches!(t, Tool::GoogleSearch(_)))
    }
}

/// A single model answer.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelTurn {
    pub content: Content,
    pub finish_reason: Option<String>,
}

impl ModelTurn {
    pub fn from_parts(parts: Vec<Part>) -> Self {
        Self {
            content: Content {
                role: Some(ROLE_MODEL.to_string()),
                parts,
            },
            finish_reason: Some("STOP".to_string()),
        }
    }

    pub fn text_reply(text: impl Into<String>) -> Self {
        Self::from_parts(vec![Part::text(text)])
    }

    /// Answer text with reasoning parts left out; `None` when there is none.
    pub fn text(&self) -> Option<String> {
        let text: String = self
            .content
            .parts
            .iter()
            .filter(|p| p.thought != Some(true))
            .filter_map(|p| p.text.as_deref())
            .collect();

        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }

    pub fn function_calls(&self) -> Vec<FunctionCall> {
        self.content
            .parts
            .iter()
            .filter_map(|p| p.function_call.clone())
            .collect()
    }
}

/// Trait for a hosted generative model (stateless request/response)
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn generate(&self, request: &GenerateRequest) -> Result<ModelTurn>;
}

//
// ================= Scripted Model =================
//

/// Replays queued turns in order and records every request.
/// Keeps the planner testable without a network dependency.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<ModelTurn>>>,
    requests: Mutex<Vec<GenerateRequest>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_turn(&self, turn: ModelTurn) -> &Self {
        self.push_result(Ok(turn))
    }

    pub fn push_text(&self, text: impl Into<String>) -> &Self {
        self.push_turn(ModelTurn::text_reply(text))
    }

    pub fn push_result(&self, result: Result<ModelTurn>) -> &Self {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(result);
        }
        self
    }

    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests
            .lock()
            .map(|reqs| reqs.clone())
            .unwrap_or_default()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().map(|reqs| reqs.len()).unwrap_or(0)
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl GenerativeModel for ScriptedModel {
    async fn generate(&self, request: &GenerateRequest) -> Result<ModelTurn> {
        if let Ok(mut reqs) = self.requests.lock() {
            reqs.push(request.clone());
        }

        let next = self
            .replies
            .lock()
            .map_err(|_| PlannerError::Transport("scripted model poisoned".to_string()))?
            .pop_front();

        next.unwrap_or_else(|| {
            Err(PlannerError::Transport(
                "scripted model has no reply queued".to_string(),
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_serialization_matches_wire_format() {
        let tools = vec![
            Tool::search(),
            Tool::FunctionDeclarations(vec![FunctionDeclaration {
                name: "update_itinerary".to_string(),
                description: "d".to_string(),
                parameters: json!({ "type": "OBJECT" }),
            }]),
        ];

        let value = serde_json::to_value(&tools).unwrap();
        assert_eq!(value[0], json!({ "googleSearch": {} }));
        assert_eq!(value[1]["functionDeclarations"][0]["name"], "update_itinerary");
        assert!(tools[1].declares("update_itinerary"));
        assert!(!tools[0].declares("update_itinerary"));
    }

    #[test]
    fn test_part_deserializes_function_call() {
        let part: Part = serde_json::from_value(json!({
            "functionCall": { "id": "call-1", "name": "update_itinerary", "args": { "summary": "x" } },
            "thoughtSignature": "sig"
        }))
        .unwrap();

        let call = part.function_call.unwrap();
        assert_eq!(call.id.as_deref(), Some("call-1"));
        assert_eq!(call.args["summary"], "x");
        assert_eq!(part.thought_signature.as_deref(), Some("sig"));
    }

    #[test]
    fn test_turn_text_skips_thoughts() {
        let mut thought = Part::text("thinking about pho");
        thought.thought = Some(true);
        let turn = ModelTurn::from_parts(vec![thought, Part::text("Done.")]);
        assert_eq!(turn.text().as_deref(), Some("Done."));

        let empty = ModelTurn::from_parts(vec![Part::text("  ")]);
        assert_eq!(empty.text(), None);
    }

    #[tokio::test]
    async fn test_scripted_model_replays_in_order() {
        let model = ScriptedModel::new();
        model.push_text("first").push_text("second");

        let request = GenerateRequest::default();
        let a = model.generate(&request).await.unwrap();
        let b = model.generate(&request).await.unwrap();
        assert_eq!(a.text().as_deref(), Some("first"));
        assert_eq!(b.text().as_deref(), Some("second"));
        assert!(model.generate(&request).await.is_err());
        assert_eq!(model.request_count(), 3);
    }
}
