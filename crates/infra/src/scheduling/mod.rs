//! Background scheduling.

pub mod error;
pub mod warmup;

pub use error::{SchedulerError, SchedulerResult};
pub use warmup::{CalendarWarmupScheduler, WarmupSchedulerConfig};
