//! Function declaration for model-driven itinerary edits
//!
//! The parameter schema mirrors `TripPlan` so the model can hand back a whole
//! plan as structured call arguments instead of text.

use serde_json::{json, Value};

use crate::model::{FunctionDeclaration, Tool};

pub const UPDATE_ITINERARY: &str = "update_itinerary";

fn event_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "id": { "type": "STRING", "description": "Unique UUID for the event. Keep existing ids for events you do not replace." },
            "time": { "type": "STRING", "description": "Time of day (e.g., 09:00 AM)" },
            "endTime": { "type": "STRING", "description": "Optional end time" },
            "activity": { "type": "STRING", "description": "Short title of activity" },
            "locationName": { "type": "STRING", "description": "Name of the place/venue" },
            "address": { "type": "STRING", "description": "Real, specific physical address usable for map navigation" },
            "phoneNumber": { "type": "STRING", "description": "Contact phone number if available" },
            "website": { "type": "STRING", "description": "Official website URL if available" },
            "description": { "type": "STRING", "description": "Two sentences on why this place was chosen" },
            "costEstimate": { "type": "NUMBER", "description": "Estimated cost per person, numeric only" },
            "currency": { "type": "STRING", "description": "Currency code (e.g., USD, VND)" },
            "transportMethod": { "type": "STRING", "description": "How to get here from the previous location" },
            "transportDuration": { "type": "STRING", "description": "Estimated travel time" },
            "type": { "type": "STRING", "enum": ["activity", "food", "lodging", "transport"] },
            "status": { "type": "STRING", "description": "Always 'accepted'" }
        },
        "required": ["id", "time", "activity", "locationName", "address", "costEstimate", "type"]
    })
}

fn day_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "day": { "type": "INTEGER" },
            "date": { "type": "STRING", "description": "YYYY-MM-DD" },
            "theme": { "type": "STRING", "description": "Theme of the day" },
            "events": { "type": "ARRAY", "items": event_schema() }
        },
        "required": ["day", "events"]
    })
}

/// Schema of a full trip plan in the provider's OpenAPI subset.
pub fn trip_plan_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "summary": { "type": "STRING", "description": "A short engaging summary of the trip" },
            "tips": { "type": "STRING", "description": "Three essential tips, sentences separated by periods" },
            "stats": {
                "type": "OBJECT",
                "properties": {
                    "totalCost": { "type": "NUMBER" },
                    "currency": { "type": "STRING" },
                    "totalEvents": { "type": "INTEGER" },
                    "weatherSummary": { "type": "STRING", "description": "Expected weather forecast" },
                    "durationDays": { "type": "INTEGER" }
                },
                "required": ["totalCost", "weatherSummary"]
            },
            "itinerary": { "type": "ARRAY", "items": day_schema() }
        },
        "required": ["summary", "itinerary", "stats"]
    })
}

pub fn update_itinerary_declaration() -> FunctionDeclaration {
    FunctionDeclaration {
        name: UPDATE_ITINERARY.to_string(),
        description: "Call this function ONLY when you need to modify, add, or remove events in the \
                      travel plan based on the user's request. Return the FULL updated trip plan."
            .to_string(),
        parameters: trip_plan_schema(),
    }
}

/// Tools advertised on every chat turn: the edit function plus live search.
pub fn chat_tools() -> Vec<Tool> {
    vec![
        Tool::FunctionDeclarations(vec![update_itinerary_declaration()]),
        Tool::search(),
    ]
}

/// Tools for the initial grounded generation. No function declarations.
pub fn generation_tools() -> Vec<Tool> {
    vec![Tool::search()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_nests_days_and_events() {
        let schema = trip_plan_schema();
        let event = &schema["properties"]["itinerary"]["items"]["properties"]["events"]["items"];
        assert_eq!(event["properties"]["costEstimate"]["type"], "NUMBER");
        assert!(event["required"]
            .as_array()
            .unwrap()
            .iter()
            .any(|f| f == "id"));
    }

    #[test]
    fn test_schema_field_names_match_plan_serialization() {
        let plan = serde_json::to_value(crate::models::fixtures::hanoi_plan()).unwrap();
        let schema = trip_plan_schema();

        for key in plan.as_object().unwrap().keys() {
            assert!(schema["properties"].get(key).is_some(), "missing {}", key);
        }
        let event = &plan["itinerary"][0]["events"][0];
        let event_props = &schema["properties"]["itinerary"]["items"]["properties"]["events"]["items"]["properties"];
        for key in event.as_object().unwrap().keys() {
            assert!(event_props.get(key).is_some(), "missing event field {}", key);
        }
    }

    #[test]
    fn test_tool_sets() {
        assert!(chat_tools().iter().any(|t| t.declares(UPDATE_ITINERARY)));
        assert!(!generation_tools().iter().any(|t| t.declares(UPDATE_ITINERARY)));
    }
}
