//! Core data models for trip planning

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

use crate::error::PlannerError;
use crate::Result;

pub const DEFAULT_CURRENCY: &str = "USD";
pub const DEFAULT_BUDGET_TIER: &str = "Moderate";

//
// ================= Enums =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TravelStyle {
    Cultural,
    Adventure,
    Relaxing,
    Foodie,
    Historical,
    Nature,
    Luxury,
    Budget,
}

/// Model output is loose here; unknown kinds read as `Activity`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum EventType {
    #[default]
    Activity,
    Food,
    Lodging,
    Transport,
}

/// Local review state of an event. Plans coming from the model are reset to
/// `Accepted`; unknown values read as `Accepted`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum EventStatus {
    Pending,
    #[default]
    Accepted,
    Rejected,
}

impl From<String> for EventType {
    fn from(raw: String) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "food" | "dining" | "restaurant" | "meal" | "cafe" => EventType::Food,
            "lodging" | "hotel" | "accommodation" | "stay" => EventType::Lodging,
            "transport" | "transportation" | "transfer" | "travel" => EventType::Transport,
            _ => EventType::Activity,
        }
    }
}

impl From<String> for EventStatus {
    fn from(raw: String) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "rejected" => EventStatus::Rejected,
            "pending" => EventStatus::Pending,
            _ => EventStatus::Accepted,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

//
// ================= Preferences =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PartySize {
    pub adults: u32,
    pub children: u32,
}

impl PartySize {
    pub fn total(&self) -> u32 {
        self.adults.saturating_add(self.children)
    }
}

/// Trip constraints collected from the planning form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    pub destination: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub style: Vec<TravelStyle>,
    #[serde(default)]
    pub prompt: String,
    /// Qualitative tier such as "Moderate"; ignored when `exact_budget` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exact_budget: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    pub party_size: PartySize,
}

/// Resolved budget instruction for a trip.
#[derive(Debug, Clone, PartialEq)]
pub enum Budget {
    Tier(String),
    Exact { amount: f64, currency: String },
}

impl UserPreferences {
    pub fn currency(&self) -> &str {
        self.currency
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_CURRENCY)
    }

    /// An exact figure wins over the qualitative tier when it is positive.
    pub fn budget(&self) -> Budget {
        match self.exact_budget {
            Some(amount) if amount > 0.0 => Budget::Exact {
                amount,
                currency: self.currency().to_string(),
            },
            _ => Budget::Tier(
                self.budget
                    .as_deref()
                    .map(str::trim)
                    .filter(|b| !b.is_empty())
                    .unwrap_or(DEFAULT_BUDGET_TIER)
                    .to_string(),
            ),
        }
    }

    /// Inclusive number of calendar days covered by the trip.
    pub fn duration_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }

    pub fn validate(&self) -> Result<()> {
        if self.destination.trim().is_empty() {
            return Err(PlannerError::InvalidPreferences(
                "Destination is required".to_string(),
            ));
        }
        if self.start_date > self.end_date {
            return Err(PlannerError::InvalidPreferences(
                "End date cannot be before start date".to_string(),
            ));
        }
        if self.party_size.total() == 0 {
            return Err(PlannerError::InvalidPreferences(
                "Party must include at least one traveller".to_string(),
            ));
        }
        Ok(())
    }
}

//
// ================= Trip Plan =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ItineraryEvent {
    pub id: String,
    #[serde(default)]
    pub time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(default)]
    pub activity: String,
    #[serde(default)]
    pub location_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default)]
    pub description: String,
    /// Per person.
    #[serde(default)]
    pub cost_estimate: f64,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub transport_method: String,
    #[serde(default)]
    pub transport_duration: String,
    #[serde(rename = "type", default)]
    pub event_type: EventType,
    #[serde(default)]
    pub status: EventStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DayPlan {
    pub day: u32,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub theme: String,
    #[serde(default)]
    pub events: Vec<ItineraryEvent>,
}

/// Aggregates as reported by the model. They are never recomputed locally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TripStats {
    #[serde(default)]
    pub total_cost: f64,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub total_events: u32,
    #[serde(default)]
    pub weather_summary: String,
    #[serde(default)]
    pub duration_days: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TripPlan {
    pub summary: String,
    #[serde(default)]
    pub tips: String,
    pub stats: TripStats,
    pub itinerary: Vec<DayPlan>,
}

impl TripPlan {
    pub fn events(&self) -> impl Iterator<Item = &ItineraryEvent> {
        self.itinerary.iter().flat_map(|day| day.events.iter())
    }

    pub fn find_event(&self, event_id: &str) -> Option<&ItineraryEvent> {
        self.events().find(|evt| evt.id == event_id)
    }

    /// Date of the day that holds `event_id`.
    pub fn event_date(&self, event_id: &str) -> Option<&str> {
        self.itinerary
            .iter()
            .find(|day| day.events.iter().any(|evt| evt.id == event_id))
            .map(|day| day.date.as_str())
    }

    /// Tips are stored as one string of sentences.
    pub fn tip_list(&self) -> Vec<String> {
        self.tips
            .split('.')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| format!("{}.", t))
            .collect()
    }

    /// Orders days ascending by day number, keeping the model's order for ties.
    pub fn sort_days(&mut self) {
        self.itinerary.sort_by_key(|day| day.day);
    }

    /// Marks every event as accepted. Used on freshly generated plans only.
    pub fn accept_all(&mut self) {
        for day in &mut self.itinerary {
            for evt in &mut day.events {
                evt.status = EventStatus::Accepted;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.itinerary.is_empty() {
            return Err(PlannerError::InvalidPlan("Itinerary has no days".to_string()));
        }

        let mut seen = HashSet::new();
        for evt in self.events() {
            if evt.id.trim().is_empty() {
                return Err(PlannerError::InvalidPlan(format!(
                    "Event '{}' has no id",
                    evt.activity
                )));
            }
            if !seen.insert(evt.id.as_str()) {
                return Err(PlannerError::InvalidPlan(format!(
                    "Duplicate event id {}",
                    evt.id
                )));
            }
            if !(evt.cost_estimate >= 0.0) {
                return Err(PlannerError::InvalidPlan(format!(
                    "Event {} has a negative cost estimate",
                    evt.id
                )));
            }
        }

        Ok(())
    }
}

//
// ================= Chat =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
    #[serde(default)]
    pub is_tool_output: bool,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
            is_tool_output: false,
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            text: text.into(),
            is_tool_output: false,
        }
    }

    pub fn tool_output(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            text: text.into(),
            is_tool_output: true,
        }
    }
}

/// Outcome of one chat turn. `updated_plan` is a full replacement when set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_plan: Option<TripPlan>,
}

/// A freshly generated plan and the id its chat session is keyed by.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedTrip {
    pub trip_id: Uuid,
    pub plan: TripPlan,
}

impl fmt::Display for TravelStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TravelStyle::Cultural => "Cultural",
            TravelStyle::Adventure => "Adventure",
            TravelStyle::Relaxing => "Relaxing",
            TravelStyle::Foodie => "Foodie",
            TravelStyle::Historical => "Historical",
            TravelStyle::Nature => "Nature",
            TravelStyle::Luxury => "Luxury",
            TravelStyle::Budget => "Budget",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventType::Activity => "activity",
            EventType::Food => "food",
            EventType::Lodging => "lodging",
            EventType::Transport => "transport",
        };
        write!(f, "{}", s)
    }
}
