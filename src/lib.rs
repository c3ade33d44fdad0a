//! Trip Planner Orchestrator
//!
//! Itinerary generation and refinement on top of a hosted generative model:
//! - Renders trip preferences into a search-grounded generation prompt
//! - Scrapes the plan JSON out of free-form model text
//! - Keeps one chat session per trip for follow-up edits
//! - Applies model edits delivered as `update_itinerary` tool calls
//! - Reviews events locally (reject / restore) and regenerates rejections
//!
//! FLOW:
//! PREFERENCES → PROMPT → GENERATE → PLAN → CHAT / REVIEW → REGENERATE → PLAN

pub mod api;
pub mod calendar;
pub mod config;
pub mod error;
pub mod extract;
pub mod model;
pub mod models;
pub mod planner;
pub mod prompt;
pub mod schema;
pub mod session;
pub mod state;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use planner::{PlannerSettings, TripPlanner};
