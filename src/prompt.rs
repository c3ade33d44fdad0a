//! Prompt construction for generation, chat and regeneration

use crate::models::{Budget, TripPlan, UserPreferences};
use crate::schema::UPDATE_ITINERARY;
use crate::Result;

/// Seed model turn that follows the generation prompt in chat history.
pub const INITIAL_PLAN_ACK: &str = "Here is your initial plan.";

/// Function result sent back after a chat edit is applied.
pub const CHAT_UPDATE_RESULT: &str = "Itinerary updated successfully on client.";

/// Function result sent back after a regeneration is applied.
pub const REGENERATE_UPDATE_RESULT: &str = "Itinerary updated successfully.";

/// Reply text when the model edited the plan without saying anything.
pub const DEFAULT_UPDATE_TEXT: &str = "I've updated your plan.";

fn budget_instruction(prefs: &UserPreferences) -> String {
    match prefs.budget() {
        Budget::Exact { amount, currency } => format!(
            "STRICT TOTAL BUDGET: {} {} for the ENTIRE party. You MUST keep the Total Cost below this number.",
            amount, currency
        ),
        Budget::Tier(tier) => format!("Budget Preference: {}.", tier),
    }
}

fn style_list(prefs: &UserPreferences) -> String {
    if prefs.style.is_empty() {
        return "No particular style".to_string();
    }
    prefs
        .style
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn audience(prefs: &UserPreferences) -> &'static str {
    if prefs.party_size.children > 0 {
        "families with children"
    } else {
        "adults"
    }
}

/// Build the grounded generation prompt
pub fn build_trip_prompt(prefs: &UserPreferences) -> String {
    let currency = prefs.currency();

    format!(
        r#"Act as an expert travel agent. Plan a detailed trip to {destination}.
Dates: {start} to {end} ({days} days).
Travel Party: {adults} Adults, {children} Children.
Styles: {styles}.
User Note: {note}.
{budget}

TASK:
1. Use Google Search to find REAL-TIME weather, up-to-date ticket prices, and opening hours for {destination}.
2. Select activities appropriate for {audience}.
3. Calculate the estimated Total Cost for the WHOLE party ({party} people) in {currency}.

OUTPUT FORMAT:
After gathering information, output the itinerary strictly as a JSON object with this shape:

{{
  "summary": string,
  "tips": string,                 // three sentences separated by periods
  "stats": {{
    "totalCost": number,          // total for everyone in {currency}
    "currency": "{currency}",
    "totalEvents": number,
    "weatherSummary": string,
    "durationDays": number
  }},
  "itinerary": [
    {{
      "day": number,              // 1-based, ascending
      "date": string,             // YYYY-MM-DD
      "theme": string,
      "events": [
        {{
          "id": string,           // UUID, unique across the whole plan
          "time": string,
          "activity": string,
          "locationName": string,
          "address": string,      // real address from search
          "phoneNumber": string,
          "website": string,
          "description": string,
          "costEstimate": number, // per person
          "currency": string,
          "transportMethod": string,
          "transportDuration": string,
          "type": "activity" | "food" | "lodging" | "transport",
          "status": "accepted"
        }}
      ]
    }}
  ]
}}

Ensure the JSON is valid and contains no comments. Wrap it in ```json code blocks."#,
        destination = prefs.destination.trim(),
        start = prefs.start_date,
        end = prefs.end_date,
        days = prefs.duration_days(),
        adults = prefs.party_size.adults,
        children = prefs.party_size.children,
        styles = style_list(prefs),
        note = prefs.prompt.trim(),
        budget = budget_instruction(prefs),
        audience = audience(prefs),
        party = prefs.party_size.total(),
        currency = currency,
    )
}

/// System instruction for the follow-up chat session
pub fn build_system_instruction(prefs: &UserPreferences) -> String {
    format!(
        r#"You are a smart travel assistant.
Context: the user is viewing a plan for {adults} adults and {children} children to {destination}.
Goal: refine the plan using '{tool}'.

Token saving rules:
1. Keep text responses concise.
2. Call '{tool}' immediately for any requested change, passing the FULL plan.
3. Only output text if asked a question.

Data rules:
1. Keep the plan valid against the '{tool}' schema.
2. Keep the ids of events you do not replace.
3. Use Google Search only when the user asks for new real-time information (like "is it raining today")."#,
        adults = prefs.party_size.adults,
        children = prefs.party_size.children,
        destination = prefs.destination.trim(),
        tool = UPDATE_ITINERARY,
    )
}

/// Snapshot of the plan the user is looking at, sent with every chat request
pub fn build_plan_context(plan: &TripPlan) -> Result<String> {
    let json = serde_json::to_string(plan)?;
    Ok(format!(
        r#"CURRENT ITINERARY (exactly what the user sees; events with status "rejected" were turned down by the user):
```json
{}
```
Any '{}' call must start from this plan."#,
        json, UPDATE_ITINERARY
    ))
}

/// Instruction asking for replacements of exactly the rejected events
pub fn build_regenerate_prompt(rejected_ids: &[String]) -> String {
    format!(
        r#"The user has rejected events with IDs: {ids}.
They are marked "rejected" in the CURRENT ITINERARY of your instructions.
Replace only these events with new activities appropriate for the party size and travel styles.
Keep every other event and its id unchanged, and keep the same number of days.
Use Google Search to make sure the new places are currently open and operating.
CRITICAL: include a specific address, price, and details for each new event.
Call '{tool}' with the full updated plan."#,
        ids = rejected_ids.join(", "),
        tool = UPDATE_ITINERARY,
    )
}
