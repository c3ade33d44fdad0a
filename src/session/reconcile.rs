//! Tool-call reconciliation
//!
//! Every function call the model makes is answered with a function response
//! before anything else is sent, one call at a time and in the order the model
//! listed them. `update_itinerary` arguments become the new plan. Calls past
//! the acknowledgement limit are still answered, with an error, in one closing
//! turn.

use serde_json::{json, Value};
use std::collections::VecDeque;
use tracing::{info, warn};

use crate::error::PlannerError;
use crate::model::{FunctionCall, FunctionResponse, GenerativeModel, ModelTurn, Part};
use crate::models::TripPlan;
use crate::schema::UPDATE_ITINERARY;
use crate::session::ChatSession;
use crate::Result;

/// Result of draining the tool calls of one turn.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    /// Latest non-empty text seen; acknowledgement replies win over the first turn.
    pub text: Option<String>,
    /// Plan from the last accepted `update_itinerary` call.
    pub updated_plan: Option<TripPlan>,
    pub acknowledgements: usize,
}

/// Interprets call arguments as a full replacement plan.
///
/// Review markers are local, so every incoming event starts out accepted.
pub fn plan_from_args(args: &Value) -> Result<TripPlan> {
    let mut plan: TripPlan = serde_json::from_value(args.clone()).map_err(|e| {
        PlannerError::Parse(format!("{} arguments are not a trip plan: {}", UPDATE_ITINERARY, e))
    })?;
    plan.sort_days();
    plan.accept_all();
    plan.validate()?;
    Ok(plan)
}

pub async fn reconcile_tool_calls(
    session: &mut ChatSession,
    model: &dyn GenerativeModel,
    turn: ModelTurn,
    result_message: &str,
    max_acknowledgements: usize,
) -> Result<Reconciled> {
    let mut text = turn.text();
    let mut pending: VecDeque<FunctionCall> = turn.function_calls().into();
    let mut updated_plan = None;
    let mut last_error = None;
    let mut acknowledgements = 0;

    while let Some(call) = pending.pop_front() {
        if acknowledgements >= max_acknowledgements {
            pending.push_front(call);
            break;
        }

        let response = if call.name == UPDATE_ITINERARY {
            match plan_from_args(&call.args) {
                Ok(plan) => {
                    info!(
                        trip_id = %session.trip_id(),
                        days = plan.itinerary.len(),
                        "Model replaced the itinerary"
                    );
                    updated_plan = Some(plan);
                    json!({ "result": result_message })
                }
                Err(e) => {
                    warn!(trip_id = %session.trip_id(), "Rejected {} call: {}", UPDATE_ITINERARY, e);
                    let payload = json!({ "error": e.to_string() });
                    last_error = Some(e);
                    payload
                }
            }
        } else {
            warn!(trip_id = %session.trip_id(), name = %call.name, "Model called an unknown function");
            json!({ "error": format!("Unknown function {}", call.name) })
        };

        let ack = FunctionResponse {
            id: call.id.clone(),
            name: call.name.clone(),
            response,
        };
        let ack_turn = session.send(model, vec![Part::function_response(ack)]).await?;
        acknowledgements += 1;

        if let Some(ack_text) = ack_turn.text() {
            text = Some(ack_text);
        }
        pending.extend(ack_turn.function_calls());
    }

    if !pending.is_empty() {
        warn!(
            trip_id = %session.trip_id(),
            dropped = pending.len(),
            "Tool acknowledgement limit reached"
        );

        let parts = pending
            .drain(..)
            .map(|call| {
                let message = format!("Call to {} skipped: too many tool calls in one turn", call.name);
                Part::function_response(FunctionResponse {
                    id: call.id,
                    name: call.name,
                    response: json!({ "error": message }),
                })
            })
            .collect();

        let closing = session.send(model, parts).await?;
        if !closing.function_calls().is_empty() {
            return Err(PlannerError::ToolRoundsExceeded(max_acknowledgements));
        }
        if let Some(closing_text) = closing.text() {
            text = Some(closing_text);
        }
    }

    if updated_plan.is_none() {
        if let Some(e) = last_error {
            return Err(e);
        }
    }

    Ok(Reconciled {
        text,
        updated_plan,
        acknowledgements,
    })
}
