pub mod cancel;
pub mod controller;
pub mod events;
pub mod session;

pub use cancel::CancellationToken;
pub use controller::{PlanningController, PlanningState, StateHandle, StepReport};
pub use events::PlanningEvent;
pub use session::{AvailableKind, ProblemDefinition, ProblemSession, SessionServices, SessionSettings};
