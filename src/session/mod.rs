//! Chat sessions
//!
//! A session is the multi-turn conversation bound to one trip. It owns its
//! history and replays it on every request, so the provider stays stateless.
//! Sessions are keyed by trip id; each sits behind its own async mutex so a
//! trip never has two turns in flight while other trips proceed.
//!
//! Callers that need several requests to land together work on a clone and
//! write it back only when every request succeeded.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::error::PlannerError;
use crate::model::{Content, GenerateRequest, GenerativeModel, ModelTurn, Part, Tool};
use crate::Result;

pub mod reconcile;
pub use reconcile::{reconcile_tool_calls, Reconciled};

/// Conversation state for one trip
#[derive(Debug, Clone)]
pub struct ChatSession {
    trip_id: Uuid,
    system_instruction: String,
    tools: Vec<Tool>,
    history: Vec<Content>,
    plan_context: Option<String>,
}

impl ChatSession {
    pub fn new(
        trip_id: Uuid,
        system_instruction: String,
        tools: Vec<Tool>,
        history: Vec<Content>,
    ) -> Self {
        Self {
            trip_id,
            system_instruction,
            tools,
            history,
            plan_context: None,
        }
    }

    pub fn trip_id(&self) -> Uuid {
        self.trip_id
    }

    pub fn history(&self) -> &[Content] {
        &self.history
    }

    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    /// Plan snapshot appended to the system instruction of later requests.
    pub fn set_plan_context(&mut self, context: String) {
        self.plan_context = Some(context);
    }

    fn request_instruction(&self) -> String {
        match &self.plan_context {
            Some(context) => format!("{}\n\n{}", self.system_instruction, context),
            None => self.system_instruction.clone(),
        }
    }

    pub async fn send_text(
        &mut self,
        model: &dyn GenerativeModel,
        text: &str,
    ) -> Result<ModelTurn> {
        self.send(model, vec![Part::text(text)]).await
    }

    /// Sends one user turn. History only grows when the model answered.
    pub async fn send(&mut self, model: &dyn GenerativeModel, parts: Vec<Part>) -> Result<ModelTurn> {
        let user_turn = Content::user_parts(parts);

        let mut contents = self.history.clone();
        contents.push(user_turn.clone());

        let request = GenerateRequest {
            system_instruction: Some(self.request_instruction()),
            contents,
            tools: self.tools.clone(),
        };

        let turn = model.generate(&request).await?;

        self.history.push(user_turn);
        self.history.push(turn.content.clone());
        debug!(trip_id = %self.trip_id, turns = self.history.len(), "Session history extended");

        Ok(turn)
    }
}

/// Live sessions keyed by trip id
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Arc<Mutex<ChatSession>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session, replacing any previous one for the same trip.
    pub async fn insert(&self, session: ChatSession) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.trip_id(), Arc::new(Mutex::new(session)));
    }

    pub async fn get(&self, trip_id: Uuid) -> Result<Arc<Mutex<ChatSession>>> {
        let sessions = self.sessions.read().await;
        sessions
            .get(&trip_id)
            .cloned()
            .ok_or(PlannerError::SessionNotInitialized(trip_id))
    }

    pub async fn remove(&self, trip_id: Uuid) -> bool {
        let mut sessions = self.sessions.write().await;
        sessions.remove(&trip_id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
