use std::fmt;

/// Result type for deepq operations
pub type Result<T> = std::result::Result<T, DqnError>;

/// Main error type for the training core
#[derive(Debug, Clone, PartialEq)]
pub enum DqnError {
    /// Replay store sampled before it holds enough transitions
    InsufficientData {
        requested: usize,
        available: usize,
    },

    /// Environment adapter produced a malformed observation or reward
    Environment(String),

    /// Loss, Q-values or parameters became non-finite
    NumericInstability(String),

    /// Invalid dimensions for operations
    DimensionMismatch {
        expected: String,
        actual: String,
    },

    /// Invalid parameter value
    InvalidParameter {
        name: String,
        reason: String,
    },

    /// Action index outside the discrete action set
    InvalidAction {
        action: usize,
        num_actions: usize,
    },

    /// IO errors (file operations)
    Io(String),

    /// Serialization/deserialization errors
    Serialization(String),
}

impl fmt::Display for DqnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DqnError::InsufficientData { requested, available } => {
                write!(f, "Insufficient data: requested {} transitions, {} available", requested, available)
            }
            DqnError::Environment(msg) => write!(f, "Environment error: {}", msg),
            DqnError::NumericInstability(msg) => write!(f, "Numeric instability: {}", msg),
            DqnError::DimensionMismatch { expected, actual } => {
                write!(f, "Dimension mismatch: expected {}, got {}", expected, actual)
            }
            DqnError::InvalidParameter { name, reason } => {
                write!(f, "Invalid parameter '{}': {}", name, reason)
            }
            DqnError::InvalidAction { action, num_actions } => {
                write!(f, "Invalid action {}: must be less than {}", action, num_actions)
            }
            DqnError::Io(msg) => write!(f, "IO error: {}", msg),
            DqnError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for DqnError {}

impl From<std::io::Error> for DqnError {
    fn from(err: std::io::Error) -> Self {
        DqnError::Io(err.to_string())
    }
}

impl From<bincode::Error> for DqnError {
    fn from(err: bincode::Error) -> Self {
        DqnError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for DqnError {
    fn from(err: serde_json::Error) -> Self {
        DqnError::Serialization(err.to_string())
    }
}

impl DqnError {
    pub fn dimension_mismatch<S: Into<String>>(expected: S, actual: S) -> Self {
        DqnError::DimensionMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn invalid_parameter<S: Into<String>>(name: S, reason: S) -> Self {
        DqnError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Only an under-filled replay store is an expected, skippable condition.
    /// Everything else signals structural corruption and must reach the caller.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DqnError::InsufficientData { .. })
    }
}
