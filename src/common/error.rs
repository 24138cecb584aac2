use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Name already registered: {name}")]
    DuplicateName { name: String },

    #[error("Unknown constraint: {name}")]
    UnknownConstraint { name: String },

    #[error("Unknown path id: {id}")]
    UnknownPath { id: usize },

    #[error("Unknown {kind} strategy: {name}")]
    UnknownStrategy { kind: &'static str, name: String },

    #[error("Unknown problem: {name}")]
    UnknownProblem { name: String },

    #[error("Unknown roadmap node: {id}")]
    UnknownNode { id: usize },

    #[error("Unknown roadmap edge: {id}")]
    UnknownEdge { id: usize },

    #[error("Unknown connected component: {id}")]
    UnknownComponent { id: i64 },

    #[error("Not configured: {reason}")]
    NotConfigured { reason: String },

    #[error("No active planning: call prepareSolveStepByStep first")]
    NoActivePlanning,

    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error("Invalid geometry: {reason}")]
    InvalidGeometry { reason: String },

    #[error("Length mismatch: {left} names for {right} priorities")]
    LengthMismatch { left: usize, right: usize },

    #[error("Validation failed: {reason}")]
    ValidationFailed { reason: String },

    #[error("I/O failure: {0}")]
    IoFailure(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl DomainError {
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        DomainError::InvalidArgument { reason: reason.into() }
    }

    pub fn invalid_geometry(reason: impl Into<String>) -> Self {
        DomainError::InvalidGeometry { reason: reason.into() }
    }

    pub fn not_configured(reason: impl Into<String>) -> Self {
        DomainError::NotConfigured { reason: reason.into() }
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(e: serde_json::Error) -> Self {
        DomainError::Serialization(e.to_string())
    }
}

impl From<bincode::Error> for DomainError {
    fn from(e: bincode::Error) -> Self {
        DomainError::Serialization(e.to_string())
    }
}

#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Event journal error: {0}")]
    Journal(String),

    #[error("Configuration error: {0}")]
    Configuration(#[from] anyhow::Error),
}

pub type DomainResult<T> = Result<T, DomainError>;
pub type ApplicationResult<T> = Result<T, ApplicationError>;
