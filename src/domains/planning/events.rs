use crate::common::DomainEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlanningEvent {
    ConstraintRegistered {
        session_id: String,
        name: String,
        kind: String,
        timestamp: DateTime<Utc>,
    },
    ConstraintsReset {
        session_id: String,
        timestamp: DateTime<Utc>,
    },
    PlanningPrepared {
        session_id: String,
        planner: String,
        already_connected: bool,
        timestamp: DateTime<Utc>,
    },
    PlanningStepExecuted {
        session_id: String,
        step: usize,
        nodes: usize,
        components: usize,
        timestamp: DateTime<Utc>,
    },
    PlanningSolved {
        session_id: String,
        steps: usize,
        timestamp: DateTime<Utc>,
    },
    PlanningInterrupted {
        session_id: String,
        steps: usize,
        timestamp: DateTime<Utc>,
    },
    PlanningFailed {
        session_id: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    PathStored {
        session_id: String,
        path_id: usize,
        length: f64,
        origin: String,
        timestamp: DateTime<Utc>,
    },
    RoadmapCleared {
        session_id: String,
        timestamp: DateTime<Utc>,
    },
    RoadmapSaved {
        session_id: String,
        location: String,
        nodes: usize,
        timestamp: DateTime<Utc>,
    },
    RoadmapLoaded {
        session_id: String,
        location: String,
        nodes: usize,
        timestamp: DateTime<Utc>,
    },
}

impl DomainEvent for PlanningEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PlanningEvent::ConstraintRegistered { .. } => "ConstraintRegistered",
            PlanningEvent::ConstraintsReset { .. } => "ConstraintsReset",
            PlanningEvent::PlanningPrepared { .. } => "PlanningPrepared",
            PlanningEvent::PlanningStepExecuted { .. } => "PlanningStepExecuted",
            PlanningEvent::PlanningSolved { .. } => "PlanningSolved",
            PlanningEvent::PlanningInterrupted { .. } => "PlanningInterrupted",
            PlanningEvent::PlanningFailed { .. } => "PlanningFailed",
            PlanningEvent::PathStored { .. } => "PathStored",
            PlanningEvent::RoadmapCleared { .. } => "RoadmapCleared",
            PlanningEvent::RoadmapSaved { .. } => "RoadmapSaved",
            PlanningEvent::RoadmapLoaded { .. } => "RoadmapLoaded",
        }
    }

    fn session_id(&self) -> &str {
        match self {
            PlanningEvent::ConstraintRegistered { session_id, .. }
            | PlanningEvent::ConstraintsReset { session_id, .. }
            | PlanningEvent::PlanningPrepared { session_id, .. }
            | PlanningEvent::PlanningStepExecuted { session_id, .. }
            | PlanningEvent::PlanningSolved { session_id, .. }
            | PlanningEvent::PlanningInterrupted { session_id, .. }
            | PlanningEvent::PlanningFailed { session_id, .. }
            | PlanningEvent::PathStored { session_id, .. }
            | PlanningEvent::RoadmapCleared { session_id, .. }
            | PlanningEvent::RoadmapSaved { session_id, .. }
            | PlanningEvent::RoadmapLoaded { session_id, .. } => session_id,
        }
    }

    fn event_version(&self) -> u64 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PlanningEvent::ConstraintRegistered { timestamp, .. }
            | PlanningEvent::ConstraintsReset { timestamp, .. }
            | PlanningEvent::PlanningPrepared { timestamp, .. }
            | PlanningEvent::PlanningStepExecuted { timestamp, .. }
            | PlanningEvent::PlanningSolved { timestamp, .. }
            | PlanningEvent::PlanningInterrupted { timestamp, .. }
            | PlanningEvent::PlanningFailed { timestamp, .. }
            | PlanningEvent::PathStored { timestamp, .. }
            | PlanningEvent::RoadmapCleared { timestamp, .. }
            | PlanningEvent::RoadmapSaved { timestamp, .. }
            | PlanningEvent::RoadmapLoaded { timestamp, .. } => *timestamp,
        }
    }
}
