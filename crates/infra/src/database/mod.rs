//! Database implementations of the persistence ports.

pub mod calendar_store;

pub use calendar_store::SqliteCalendarStore;
