//! JSON extraction from free-form model output
//!
//! Search-grounded answers cannot be schema constrained, so the plan arrives
//! as text. Strategies are tried from cheapest to loosest:
//! 1. the whole text
//! 2. the first ```json fenced block
//! 3. the slice from the first `{` to the last `}`

use serde_json::Value;
use tracing::debug;

use crate::error::PlannerError;
use crate::models::TripPlan;
use crate::Result;

const JSON_FENCE: &str = "```json";
const FENCE: &str = "```";

/// Returns the first strategy result that parses as JSON.
pub fn extract_json(text: &str) -> Result<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(text.trim()) {
        return Ok(value);
    }

    if let Some(block) = fenced_block(text) {
        match serde_json::from_str::<Value>(block) {
            Ok(value) => return Ok(value),
            Err(e) => debug!("Fenced JSON block did not parse: {}", e),
        }
    }

    if let Some(slice) = brace_slice(text) {
        match serde_json::from_str::<Value>(slice) {
            Ok(value) => return Ok(value),
            Err(e) => debug!("Brace-delimited JSON did not parse: {}", e),
        }
    }

    Err(PlannerError::Parse(
        "Could not parse JSON from model response".to_string(),
    ))
}

/// Extracts and deserializes a trip plan. Shape mismatches are parse errors.
pub fn parse_trip_plan(text: &str) -> Result<TripPlan> {
    let value = extract_json(text)?;
    serde_json::from_value(value)
        .map_err(|e| PlannerError::Parse(format!("Response JSON is not a trip plan: {}", e)))
}

fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find(JSON_FENCE)?;
    let after_fence = &text[start + JSON_FENCE.len()..];
    let end = after_fence.find(FENCE)?;
    Some(after_fence[..end].trim())
}

fn brace_slice(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}
