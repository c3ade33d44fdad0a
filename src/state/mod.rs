//! Plan state layer
//!
//! Pure reducers over `TripPlan` plus storage for the current plan and chat
//! transcript of each trip. Currently in-memory only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use crate::error::PlannerError;
use crate::models::{ChatMessage, EventStatus, TripPlan, UserPreferences};
use crate::Result;

//
// ================= Reducers =================
//

fn with_status(plan: &TripPlan, event_id: &str, status: EventStatus) -> TripPlan {
    let mut next = plan.clone();
    for day in &mut next.itinerary {
        for evt in &mut day.events {
            if evt.id == event_id {
                evt.status = status;
            }
        }
    }
    next
}

/// Marks an event rejected. Unknown ids leave the plan as is.
pub fn reject_event(plan: &TripPlan, event_id: &str) -> TripPlan {
    with_status(plan, event_id, EventStatus::Rejected)
}

/// Marks an event accepted again. Unknown ids leave the plan as is.
pub fn restore_event(plan: &TripPlan, event_id: &str) -> TripPlan {
    with_status(plan, event_id, EventStatus::Accepted)
}

/// Rejected event ids in itinerary order.
pub fn rejected_event_ids(plan: &TripPlan) -> Vec<String> {
    plan.events()
        .filter(|evt| evt.status == EventStatus::Rejected)
        .map(|evt| evt.id.clone())
        .collect()
}

//
// ================= Status Merge =================
//

/// What happens to local review markers when the model replaces the plan.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StatusMergePolicy {
    /// Take the incoming plan; local markers on surviving events are dropped.
    #[default]
    Overwrite,
    /// Keep `rejected` on surviving events the model was not asked to replace.
    PreserveRejected,
}

impl FromStr for StatusMergePolicy {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "overwrite" => Ok(StatusMergePolicy::Overwrite),
            "preserve_rejected" | "preserve-rejected" => Ok(StatusMergePolicy::PreserveRejected),
            other => Err(PlannerError::Configuration(format!(
                "Unknown status merge policy: {}",
                other
            ))),
        }
    }
}

/// Applies `policy` to an incoming full-plan replacement.
///
/// Ids in `replaced` were handed to the model for replacement; if one comes
/// back still marked rejected it is flipped to accepted under either policy.
pub fn merge_statuses(
    previous: &TripPlan,
    mut incoming: TripPlan,
    replaced: &[String],
    policy: StatusMergePolicy,
) -> TripPlan {
    let replaced: HashSet<&str> = replaced.iter().map(String::as_str).collect();
    let locally_rejected: HashSet<&str> = previous
        .events()
        .filter(|evt| evt.status == EventStatus::Rejected)
        .map(|evt| evt.id.as_str())
        .collect();

    for day in &mut incoming.itinerary {
        for evt in &mut day.events {
            if replaced.contains(evt.id.as_str()) {
                if evt.status == EventStatus::Rejected {
                    evt.status = EventStatus::Accepted;
                }
            } else if policy == StatusMergePolicy::PreserveRejected
                && locally_rejected.contains(evt.id.as_str())
            {
                evt.status = EventStatus::Rejected;
            }
        }
    }

    incoming
}

//
// ================= Trip Store =================
//

/// Per-trip locks held across a load, a model call and the write back, so
/// edits to the same trip apply one after another.
#[derive(Default)]
pub struct TripLocks {
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl TripLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, trip_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.entry(trip_id).or_default().clone()
        };
        lock.lock_owned().await
    }

    pub async fn forget(&self, trip_id: Uuid) {
        self.locks.lock().await.remove(&trip_id);
    }
}

/// Everything the UI needs to resume a trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripRecord {
    pub trip_id: Uuid,
    pub preferences: UserPreferences,
    pub plan: TripPlan,
    pub messages: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TripRecord {
    pub fn new(trip_id: Uuid, preferences: UserPreferences, plan: TripPlan) -> Self {
        let now = Utc::now();
        Self {
            trip_id,
            preferences,
            plan,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Trait for trip state persistence
#[async_trait::async_trait]
pub trait TripStore: Send + Sync {
    async fn insert(&self, record: TripRecord) -> Result<()>;
    async fn load(&self, trip_id: Uuid) -> Result<Option<TripRecord>>;
    async fn replace_plan(&self, trip_id: Uuid, plan: TripPlan) -> Result<TripRecord>;
    async fn append_messages(&self, trip_id: Uuid, messages: Vec<ChatMessage>) -> Result<()>;
    async fn remove(&self, trip_id: Uuid) -> Result<bool>;
}

/// In-memory trip store
pub struct InMemoryTripStore {
    trips: Arc<RwLock<HashMap<Uuid, TripRecord>>>,
}

impl InMemoryTripStore {
    pub fn new() -> Self {
        Self {
            trips: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryTripStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl TripStore for InMemoryTripStore {
    async fn insert(&self, record: TripRecord) -> Result<()> {
        let mut trips = self.trips.write().await;
        trips.insert(record.trip_id, record);
        Ok(())
    }

    async fn load(&self, trip_id: Uuid) -> Result<Option<TripRecord>> {
        let trips = self.trips.read().await;
        Ok(trips.get(&trip_id).cloned())
    }

    async fn replace_plan(&self, trip_id: Uuid, plan: TripPlan) -> Result<TripRecord> {
        let mut trips = self.trips.write().await;
        let record = trips
            .get_mut(&trip_id)
            .ok_or(PlannerError::SessionNotInitialized(trip_id))?;

        record.plan = plan;
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    async fn append_messages(&self, trip_id: Uuid, messages: Vec<ChatMessage>) -> Result<()> {
        let mut trips = self.trips.write().await;
        let record = trips
            .get_mut(&trip_id)
            .ok_or(PlannerError::SessionNotInitialized(trip_id))?;

        record.messages.extend(messages);
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn remove(&self, trip_id: Uuid) -> Result<bool> {
        let mut trips = self.trips.write().await;
        Ok(trips.remove(&trip_id).is_some())
    }
}
