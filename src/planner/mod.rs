//! Trip planner
//!
//! Owns the model handle and the per-trip chat sessions:
//! PREFERENCES → PROMPT → GROUNDED GENERATION → PLAN → CHAT / REGENERATE → PLAN

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::PlannerConfig;
use crate::error::PlannerError;
use crate::extract::parse_trip_plan;
use crate::model::{Content, GenerateRequest, GenerativeModel};
use crate::models::{ChatReply, GeneratedTrip, TripPlan, UserPreferences};
use crate::prompt::{
    build_plan_context, build_regenerate_prompt, build_system_instruction, build_trip_prompt,
    CHAT_UPDATE_RESULT, DEFAULT_UPDATE_TEXT, INITIAL_PLAN_ACK, REGENERATE_UPDATE_RESULT,
};
use crate::schema::{chat_tools, generation_tools};
use crate::session::{reconcile_tool_calls, ChatSession, SessionRegistry};
use crate::state::{merge_statuses, rejected_event_ids, StatusMergePolicy};
use crate::Result;

/// Planner settings independent of the model transport.
#[derive(Debug, Clone, Copy)]
pub struct PlannerSettings {
    pub max_tool_rounds: usize,
    pub status_merge: StatusMergePolicy,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            max_tool_rounds: 4,
            status_merge: StatusMergePolicy::Overwrite,
        }
    }
}

impl From<&PlannerConfig> for PlannerSettings {
    fn from(config: &PlannerConfig) -> Self {
        Self {
            max_tool_rounds: config.max_tool_rounds.max(1),
            status_merge: config.status_merge,
        }
    }
}

pub struct TripPlanner {
    model: Arc<dyn GenerativeModel>,
    sessions: SessionRegistry,
    settings: PlannerSettings,
}

impl TripPlanner {
    pub fn new(model: Arc<dyn GenerativeModel>, settings: PlannerSettings) -> Self {
        Self {
            model,
            sessions: SessionRegistry::new(),
            settings,
        }
    }

    pub fn settings(&self) -> PlannerSettings {
        self.settings
    }

    /// Generate a fresh plan and open the chat session keyed by its trip id.
    pub async fn generate_trip(&self, prefs: &UserPreferences) -> Result<GeneratedTrip> {
        prefs.validate()?;

        let trip_id = Uuid::new_v4();
        let prompt = build_trip_prompt(prefs);

        info!(
            %trip_id,
            destination = %prefs.destination,
            days = prefs.duration_days(),
            "Generating trip"
        );

        // Schema-constrained output cannot be combined with search grounding,
        // so the plan is requested as fenced JSON and scraped from the text.
        let request = GenerateRequest {
            system_instruction: None,
            contents: vec![Content::user_text(prompt.clone())],
            tools: generation_tools(),
        };

        let turn = self.model.generate(&request).await.map_err(|e| {
            error!(%trip_id, "Trip generation failed: {}", e);
            e
        })?;

        let text = turn.text().ok_or_else(|| {
            PlannerError::EmptyResponse("No content generated".to_string())
        })?;

        let mut plan = parse_trip_plan(&text)?;
        plan.sort_days();
        plan.accept_all();
        plan.validate()?;

        let session = ChatSession::new(
            trip_id,
            build_system_instruction(prefs),
            chat_tools(),
            vec![
                Content::user_text(prompt),
                Content::model_text(INITIAL_PLAN_ACK),
            ],
        );
        self.sessions.insert(session).await;

        info!(
            %trip_id,
            days = plan.itinerary.len(),
            events = plan.events().count(),
            "Trip generated"
        );

        Ok(GeneratedTrip { trip_id, plan })
    }

    /// Send a free-text message into the trip's session.
    ///
    /// `current_plan` is never modified; a model edit comes back as `updated_plan`.
    /// The session only records the turn when the whole exchange succeeded.
    pub async fn send_chat_message(
        &self,
        trip_id: Uuid,
        text: &str,
        current_plan: &TripPlan,
    ) -> Result<ChatReply> {
        let handle = self.sessions.get(trip_id).await?;
        let mut session = handle.lock().await;

        info!(%trip_id, "Chat message received");

        let mut draft = (*session).clone();
        draft.set_plan_context(build_plan_context(current_plan)?);

        let turn = draft.send_text(self.model.as_ref(), text).await?;
        let reconciled = reconcile_tool_calls(
            &mut draft,
            self.model.as_ref(),
            turn,
            CHAT_UPDATE_RESULT,
            self.settings.max_tool_rounds,
        )
        .await?;

        *session = draft;

        let updated_plan = reconciled
            .updated_plan
            .map(|plan| merge_statuses(current_plan, plan, &[], self.settings.status_merge));

        let text = match (reconciled.text, &updated_plan) {
            (Some(text), _) => text,
            (None, Some(_)) => DEFAULT_UPDATE_TEXT.to_string(),
            (None, None) => String::new(),
        };

        Ok(ChatReply { text, updated_plan })
    }

    /// Ask the model to replace `rejected_ids` and return the new plan.
    ///
    /// On any failure the caller keeps `current_plan` and the session is left
    /// as it was; nothing is merged partially.
    pub async fn update_trip(
        &self,
        trip_id: Uuid,
        current_plan: &TripPlan,
        rejected_ids: &[String],
    ) -> Result<TripPlan> {
        let handle = self.sessions.get(trip_id).await?;
        let mut session = handle.lock().await;

        info!(%trip_id, rejected = rejected_ids.len(), "Regenerating rejected events");

        let mut draft = (*session).clone();
        draft.set_plan_context(build_plan_context(current_plan)?);

        let prompt = build_regenerate_prompt(rejected_ids);
        let turn = draft.send_text(self.model.as_ref(), &prompt).await?;
        let reconciled = reconcile_tool_calls(
            &mut draft,
            self.model.as_ref(),
            turn,
            REGENERATE_UPDATE_RESULT,
            self.settings.max_tool_rounds,
        )
        .await?;

        let Some(plan) = reconciled.updated_plan else {
            warn!(%trip_id, "Model answered without updating the itinerary");
            return Err(PlannerError::NoToolInvocation(
                "AI did not provide an updated plan".to_string(),
            ));
        };

        if plan.itinerary.len() != current_plan.itinerary.len() {
            return Err(PlannerError::InvalidPlan(format!(
                "Regenerated plan has {} days, expected {}",
                plan.itinerary.len(),
                current_plan.itinerary.len()
            )));
        }

        let replaced: HashSet<&str> = rejected_ids.iter().map(String::as_str).collect();
        let dropped: Vec<&str> = current_plan
            .events()
            .map(|evt| evt.id.as_str())
            .filter(|id| !replaced.contains(id) && plan.find_event(id).is_none())
            .collect();
        if !dropped.is_empty() {
            warn!(%trip_id, dropped = ?dropped, "Regenerated plan lost events it was told to keep");
            return Err(PlannerError::InvalidPlan(format!(
                "Regenerated plan is missing events {}",
                dropped.join(", ")
            )));
        }

        *session = draft;

        Ok(merge_statuses(
            current_plan,
            plan,
            rejected_ids,
            self.settings.status_merge,
        ))
    }

    /// Regenerate every rejected event. Without rejections no call is made.
    pub async fn regenerate_rejected(&self, trip_id: Uuid, plan: &TripPlan) -> Result<TripPlan> {
        let rejected_ids = rejected_event_ids(plan);
        if rejected_ids.is_empty() {
            info!(%trip_id, "No rejected events to regenerate");
            return Ok(plan.clone());
        }

        self.update_trip(trip_id, plan, &rejected_ids).await
    }

    /// Discard the trip's session. Returns whether one existed.
    pub async fn end_session(&self, trip_id: Uuid) -> bool {
        let removed = self.sessions.remove(trip_id).await;
        if removed {
            info!(%trip_id, "Chat session discarded");
        }
        removed
    }

    pub async fn has_session(&self, trip_id: Uuid) -> bool {
        self.sessions.get(trip_id).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FunctionCall, ModelTurn, Part, ScriptedModel};
    use crate::models::fixtures::{hanoi_plan, hanoi_preferences};
    use crate::models::EventStatus;
    use crate::schema::UPDATE_ITINERARY;
    use crate::state::reject_event;

    fn planner(model: Arc<ScriptedModel>) -> TripPlanner {
        TripPlanner::new(model, PlannerSettings::default())
    }

    fn grounded_answer(plan: &TripPlan) -> String {
        format!(
            "Based on current search results, here is your trip.\n```json\n{}\n```\n[1] weather.example",
            serde_json::to_string_pretty(plan).unwrap()
        )
    }

    fn update_turn(plan: &TripPlan) -> ModelTurn {
        ModelTurn::from_parts(vec![Part::function_call(FunctionCall {
            id: Some("call-1".to_string()),
            name: UPDATE_ITINERARY.to_string(),
            args: serde_json::to_value(plan).unwrap(),
        })])
    }

    fn assert_every_call_answered(contents: &[Content]) {
        for (i, content) in contents.iter().enumerate() {
            let calls = content.parts.iter().filter(|p| p.function_call.is_some()).count();
            if calls == 0 {
                continue;
            }
            let answers = contents
                .get(i + 1)
                .map(|next| next.parts.iter().filter(|p| p.function_response.is_some()).count())
                .unwrap_or(0);
            assert_eq!(answers, calls, "unanswered function call at turn {}", i);
        }
    }

    async fn generated(model: &Arc<ScriptedModel>, planner: &TripPlanner) -> GeneratedTrip {
        model.push_text(grounded_answer(&hanoi_plan()));
        planner.generate_trip(&hanoi_preferences()).await.unwrap()
    }

    #[tokio::test]
    async fn test_generate_hanoi_trip() {
        let model = Arc::new(ScriptedModel::new());
        let planner = planner(model.clone());

        let trip = generated(&model, &planner).await;

        assert_eq!(trip.plan.stats.duration_days as i64, hanoi_preferences().duration_days());
        assert_eq!(trip.plan.itinerary.len(), 4);
        assert!(trip.plan.itinerary.iter().all(|d| !d.events.is_empty()));
        assert!(trip.plan.events().all(|e| e.status == EventStatus::Accepted));
        assert!(planner.has_session(trip.trip_id).await);

        let request = &model.requests()[0];
        assert!(request.uses_search());
        assert!(!request.tools.iter().any(|t| t.declares(UPDATE_ITINERARY)));
    }

    #[tokio::test]
    async fn test_generate_normalizes_order_and_status() {
        let mut messy = hanoi_plan();
        messy.itinerary.reverse();
        messy.itinerary[0].events[0].status = EventStatus::Rejected;

        let model = Arc::new(ScriptedModel::new());
        model.push_text(grounded_answer(&messy));
        let trip = planner(model).generate_trip(&hanoi_preferences()).await.unwrap();

        let days: Vec<u32> = trip.plan.itinerary.iter().map(|d| d.day).collect();
        assert_eq!(days, vec![1, 2, 3, 4]);
        assert!(trip.plan.events().all(|e| e.status == EventStatus::Accepted));
    }

    #[tokio::test]
    async fn test_generate_failures_are_typed_and_open_no_session() {
        let model = Arc::new(ScriptedModel::new());
        let planner = planner(model.clone());

        model.push_text("Sorry, I can't help with that.");
        assert!(matches!(
            planner.generate_trip(&hanoi_preferences()).await,
            Err(PlannerError::Parse(_))
        ));

        model.push_turn(ModelTurn::from_parts(vec![]));
        assert!(matches!(
            planner.generate_trip(&hanoi_preferences()).await,
            Err(PlannerError::EmptyResponse(_))
        ));

        let mut dup = hanoi_plan();
        dup.itinerary[1].events[1].id = "d1-e1".to_string();
        model.push_text(grounded_answer(&dup));
        assert!(matches!(
            planner.generate_trip(&hanoi_preferences()).await,
            Err(PlannerError::InvalidPlan(_))
        ));

        model.push_result(Err(PlannerError::Transport("timeout".into())));
        assert!(matches!(
            planner.generate_trip(&hanoi_preferences()).await,
            Err(PlannerError::Transport(_))
        ));

        assert!(planner.sessions.is_empty().await);
    }

    #[tokio::test]
    async fn test_invalid_preferences_skip_the_model() {
        let model = Arc::new(ScriptedModel::new());
        let mut prefs = hanoi_preferences();
        prefs.end_date = prefs.start_date.pred_opt().unwrap();

        let result = planner(model.clone()).generate_trip(&prefs).await;
        assert!(matches!(result, Err(PlannerError::InvalidPreferences(_))));
        assert_eq!(model.request_count(), 0);
    }

    #[tokio::test]
    async fn test_chat_without_session() {
        let model = Arc::new(ScriptedModel::new());
        let trip_id = Uuid::new_v4();

        let result = planner(model.clone())
            .send_chat_message(trip_id, "hello", &hanoi_plan())
            .await;

        match result {
            Err(e @ PlannerError::SessionNotInitialized(_)) => {
                assert!(e.user_message().contains("try again"));
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(model.request_count(), 0);
    }

    #[tokio::test]
    async fn test_chat_tool_call_updates_plan() {
        let model = Arc::new(ScriptedModel::new());
        let planner = planner(model.clone());
        let trip = generated(&model, &planner).await;

        let mut sushi = trip.plan.clone();
        sushi.itinerary[0].events[1].activity = "Sushi dinner".to_string();
        model.push_turn(update_turn(&sushi));
        model.push_text("Dinner is now sushi.");

        let reply = planner
            .send_chat_message(trip.trip_id, "change dinner to sushi", &trip.plan)
            .await
            .unwrap();

        assert_eq!(reply.text, "Dinner is now sushi.");
        assert_eq!(reply.updated_plan.unwrap(), sushi);

        let requests = model.requests();
        // generation, chat turn, one acknowledgement
        assert_eq!(requests.len(), 3);
        let ack = requests[2].contents.last().unwrap().parts[0]
            .function_response
            .clone()
            .unwrap();
        assert_eq!(ack.id.as_deref(), Some("call-1"));
        assert_eq!(ack.response["result"], CHAT_UPDATE_RESULT);
        // seeded history: prompt, ack, then the chat turn
        assert_eq!(requests[1].contents.len(), 3);
        assert_eq!(requests[1].contents[1].parts[0].text.as_deref(), Some(INITIAL_PLAN_ACK));
        let instruction = requests[1].system_instruction.as_deref().unwrap();
        assert!(instruction.contains("CURRENT ITINERARY"));
        assert!(instruction.contains("\"id\":\"d1-e2\""));
    }

    #[tokio::test]
    async fn test_chat_plain_text_and_default_text() {
        let model = Arc::new(ScriptedModel::new());
        let planner = planner(model.clone());
        let trip = generated(&model, &planner).await;

        model.push_text("Pho is best at breakfast.");
        let reply = planner
            .send_chat_message(trip.trip_id, "when to eat pho?", &trip.plan)
            .await
            .unwrap();
        assert_eq!(reply.text, "Pho is best at breakfast.");
        assert!(reply.updated_plan.is_none());

        model.push_turn(update_turn(&trip.plan));
        model.push_turn(ModelTurn::from_parts(vec![]));
        let reply = planner
            .send_chat_message(trip.trip_id, "shuffle day 2", &trip.plan)
            .await
            .unwrap();
        assert_eq!(reply.text, DEFAULT_UPDATE_TEXT);
        assert!(reply.updated_plan.is_some());
    }

    #[tokio::test]
    async fn test_regenerate_without_rejections_is_offline() {
        let model = Arc::new(ScriptedModel::new());
        let planner = planner(model.clone());
        let trip = generated(&model, &planner).await;

        let result = planner
            .regenerate_rejected(trip.trip_id, &trip.plan)
            .await
            .unwrap();

        assert_eq!(result, trip.plan);
        assert_eq!(model.request_count(), 1);
    }

    #[tokio::test]
    async fn test_regenerate_replaces_rejected_events() {
        let model = Arc::new(ScriptedModel::new());
        let planner = planner(model.clone());
        let trip = generated(&model, &planner).await;

        let current = reject_event(&reject_event(&trip.plan, "d1-e2"), "d3-e1");

        let mut replacement = trip.plan.clone();
        replacement.itinerary[0].events[1].id = "new-1".to_string();
        replacement.itinerary[0].events[1].activity = "Bun cha lunch".to_string();
        replacement.itinerary[2].events[0].id = "new-2".to_string();
        model.push_turn(update_turn(&replacement));
        model.push_text("Replaced two events.");

        let regenerated = planner
            .regenerate_rejected(trip.trip_id, &current)
            .await
            .unwrap();

        assert_eq!(regenerated.itinerary.len(), current.itinerary.len());
        assert!(regenerated.find_event("d1-e2").is_none());
        assert!(regenerated.find_event("d3-e1").is_none());
        assert!(rejected_event_ids(&regenerated).is_empty());
        for evt in current.events().filter(|e| e.status == EventStatus::Accepted) {
            assert!(regenerated.find_event(&evt.id).is_some());
        }

        let prompt = model.requests()[1].contents.last().unwrap().parts[0]
            .text
            .clone()
            .unwrap();
        assert!(prompt.contains("d1-e2, d3-e1"));
        let instruction = model.requests()[1].system_instruction.clone().unwrap();
        assert!(instruction.contains("\"status\":\"rejected\""));
    }

    #[tokio::test]
    async fn test_regenerate_without_tool_call_fails() {
        let model = Arc::new(ScriptedModel::new());
        let planner = planner(model.clone());
        let trip = generated(&model, &planner).await;
        let current = reject_event(&trip.plan, "d2-e1");

        model.push_text("Here are some ideas instead.");
        let result = planner.regenerate_rejected(trip.trip_id, &current).await;

        match result {
            Err(e @ PlannerError::NoToolInvocation(_)) => assert!(e.is_retryable()),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_regenerate_rejects_changed_day_count() {
        let model = Arc::new(ScriptedModel::new());
        let planner = planner(model.clone());
        let trip = generated(&model, &planner).await;
        let current = reject_event(&trip.plan, "d2-e1");

        let mut shorter = trip.plan.clone();
        shorter.itinerary.pop();
        model.push_turn(update_turn(&shorter));
        model.push_text("Done.");

        let result = planner.regenerate_rejected(trip.trip_id, &current).await;
        assert!(matches!(result, Err(PlannerError::InvalidPlan(_))));
    }

    #[tokio::test]
    async fn test_new_trip_gets_its_own_session() {
        let model = Arc::new(ScriptedModel::new());
        let planner = planner(model.clone());
        let first = generated(&model, &planner).await;
        let second = generated(&model, &planner).await;

        assert_ne!(first.trip_id, second.trip_id);
        assert!(planner.end_session(first.trip_id).await);
        assert!(!planner.has_session(first.trip_id).await);
        assert!(planner.has_session(second.trip_id).await);

        let result = planner
            .send_chat_message(first.trip_id, "hi", &first.plan)
            .await;
        assert!(matches!(result, Err(PlannerError::SessionNotInitialized(_))));
    }

    #[tokio::test]
    async fn test_preserve_rejected_policy_on_chat_edit() {
        let model = Arc::new(ScriptedModel::new());
        let planner = TripPlanner::new(
            model.clone(),
            PlannerSettings {
                max_tool_rounds: 4,
                status_merge: StatusMergePolicy::PreserveRejected,
            },
        );
        let trip = generated(&model, &planner).await;
        let current = reject_event(&trip.plan, "d4-e1");

        model.push_turn(update_turn(&trip.plan));
        model.push_text("Updated.");
        let reply = planner
            .send_chat_message(trip.trip_id, "make day 1 slower", &current)
            .await
            .unwrap();

        let updated = reply.updated_plan.unwrap();
        assert_eq!(updated.find_event("d4-e1").unwrap().status, EventStatus::Rejected);
    }

    #[tokio::test]
    async fn test_failed_acknowledgement_leaves_session_clean() {
        let model = Arc::new(ScriptedModel::new());
        let planner = planner(model.clone());
        let trip = generated(&model, &planner).await;

        model.push_turn(update_turn(&trip.plan));
        model.push_result(Err(PlannerError::Transport("reset".into())));
        let result = planner
            .send_chat_message(trip.trip_id, "swap lunch", &trip.plan)
            .await;
        assert!(matches!(result, Err(PlannerError::Transport(_))));

        model.push_text("Sure.");
        planner
            .send_chat_message(trip.trip_id, "try again", &trip.plan)
            .await
            .unwrap();

        let retry = model.requests().last().unwrap().clone();
        // prompt, seed ack, retry text
        assert_eq!(retry.contents.len(), 3);
        assert_every_call_answered(&retry.contents);
    }

    #[tokio::test]
    async fn test_tool_limit_still_answers_every_call() {
        let model = Arc::new(ScriptedModel::new());
        let planner = TripPlanner::new(
            model.clone(),
            PlannerSettings {
                max_tool_rounds: 1,
                status_merge: StatusMergePolicy::Overwrite,
            },
        );
        let trip = generated(&model, &planner).await;

        model.push_turn(update_turn(&trip.plan));
        model.push_turn(update_turn(&trip.plan));
        model.push_text("Done editing.");
        let reply = planner
            .send_chat_message(trip.trip_id, "tweak day 3", &trip.plan)
            .await
            .unwrap();
        assert_eq!(reply.text, "Done editing.");

        model.push_text("Anything else?");
        planner
            .send_chat_message(trip.trip_id, "thanks", &trip.plan)
            .await
            .unwrap();

        let last = model.requests().last().unwrap().clone();
        // seed (2), chat, call, ack, call, error answer, closing text, thanks
        assert_eq!(last.contents.len(), 9);
        assert_every_call_answered(&last.contents);
    }

    #[tokio::test]
    async fn test_regenerate_keeps_unrelated_event_ids() {
        let model = Arc::new(ScriptedModel::new());
        let planner = planner(model.clone());
        let trip = generated(&model, &planner).await;
        let current = reject_event(&trip.plan, "d1-e1");

        let mut renamed = trip.plan.clone();
        renamed.itinerary[0].events[0].id = "new-1".to_string();
        renamed.itinerary[3].events[1].id = "renamed".to_string();
        model.push_turn(update_turn(&renamed));
        model.push_text("Done.");

        match planner.regenerate_rejected(trip.trip_id, &current).await {
            Err(PlannerError::InvalidPlan(msg)) => assert!(msg.contains("d4-e2")),
            other => panic!("unexpected: {:?}", other),
        }

        // the failed exchange is not replayed
        model.push_text("Hello again.");
        planner
            .send_chat_message(trip.trip_id, "hi", &current)
            .await
            .unwrap();
        assert_eq!(model.requests().last().unwrap().contents.len(), 3);
    }
}
