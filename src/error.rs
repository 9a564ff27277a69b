// src/error.rs
use thiserror::Error;

/// Failure conditions of trajectory calculation.
///
/// Every variant maps to a stable integer code (see [`OtgError::code`]) so
/// control loops can branch on it without matching on message text.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OtgError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("no profile reaches the target of DoF {dof} under its limits")]
    Unreachable { dof: usize },

    #[error("degenerate path: {0}")]
    DegeneratePath(String),

    #[error("no profile set reaches the targets at a common duration of {duration:.6}s")]
    SynchronizationInfeasible { duration: f64 },

    #[error("calculation took {elapsed_us:.1}us, exceeding the budget of {budget_us:.1}us")]
    ExecutionTimeExceeded { elapsed_us: f64, budget_us: f64 },

    #[error("trajectory duration of {duration:.1}s exceeds the maximum of {max:.1}s")]
    TrajectoryDuration { duration: f64, max: f64 },
}

impl OtgError {
    pub fn code(&self) -> i32 {
        match self {
            OtgError::InvalidInput(_) => -100,
            OtgError::TrajectoryDuration { .. } => -101,
            OtgError::DegeneratePath(_) => -102,
            OtgError::Unreachable { .. } => -110,
            OtgError::SynchronizationInfeasible { .. } => -111,
            OtgError::ExecutionTimeExceeded { .. } => -120,
        }
    }

    /// Re-tags a single-DoF error with the DoF it occurred in.
    pub(crate) fn for_dof(self, dof: usize) -> Self {
        match self {
            OtgError::Unreachable { .. } => OtgError::Unreachable { dof },
            OtgError::InvalidInput(msg) => OtgError::InvalidInput(format!("DoF {dof}: {msg}")),
            other => other,
        }
    }
}
