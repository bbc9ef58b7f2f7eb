use ulid::Ulid;

use crate::model::Ms;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// A proposed range or query window with `start >= end`.
    InvalidInterval { start: Ms, end: Ms },
    InvalidDuration(f64),
    InvalidWorkingHours { start_hour: u32, end_hour: u32 },
    NotFound(Ulid),
    UnitNotFound(String),
    AlreadyExists(Ulid),
    Conflict(Ulid),
    LimitExceeded(&'static str),
    Store(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidInterval { start, end } => {
                write!(f, "invalid interval [{start}, {end}): start must be before end")
            }
            EngineError::InvalidDuration(hours) => {
                write!(f, "invalid duration: {hours} hours")
            }
            EngineError::InvalidWorkingHours {
                start_hour,
                end_hour,
            } => write!(f, "invalid working hours {start_hour}..{end_hour}"),
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::UnitNotFound(key) => write!(f, "organization unit not found: {key}"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::Conflict(id) => write!(f, "conflict with booking: {id}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::Store(e) => write!(f, "store error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl EngineError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::InvalidInterval { .. } => "invalid_interval",
            EngineError::InvalidDuration(_) => "invalid_duration",
            EngineError::InvalidWorkingHours { .. } => "invalid_working_hours",
            EngineError::NotFound(_) | EngineError::UnitNotFound(_) => "not_found",
            EngineError::AlreadyExists(_) => "already_exists",
            EngineError::Conflict(_) => "conflict",
            EngineError::LimitExceeded(_) => "limit_exceeded",
            EngineError::Store(_) => "store",
        }
    }
}
