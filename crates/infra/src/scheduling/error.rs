//! Scheduler error types

use thiserror::Error;
use tutorlane_domain::TutorlaneError;

/// Scheduler-specific errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Scheduler is already running
    #[error("Scheduler already running")]
    AlreadyRunning,

    /// Failed to create scheduler
    #[error("Failed to create scheduler: {0}")]
    CreationFailed(String),

    /// Failed to start scheduler
    #[error("Failed to start scheduler: {0}")]
    StartFailed(String),

    /// Failed to stop scheduler
    #[error("Failed to stop scheduler: {0}")]
    StopFailed(String),

    /// Failed to register job
    #[error("Failed to register job: {0}")]
    JobRegistrationFailed(String),
}

impl From<SchedulerError> for TutorlaneError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::AlreadyRunning => TutorlaneError::InvalidInput(err.to_string()),
            _ => TutorlaneError::Internal(err.to_string()),
        }
    }
}

/// Result alias for scheduler operations
pub type SchedulerResult<T> = std::result::Result<T, SchedulerError>;
