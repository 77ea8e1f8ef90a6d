//! # Tutorlane Core
//!
//! Pure business logic of the calendar synchronization engine - no
//! infrastructure dependencies.
//!
//! This crate contains:
//! - Port/adapter interfaces (traits) for persistence, providers, and crypto
//! - The token manager, busy-window aggregator, and event mirror services
//! - The `CalendarEngine` facade consumed by booking and availability
//!   collaborators
//!
//! ## Architecture Principles
//! - Only depends on `tutorlane-domain`
//! - No database, HTTP, or crypto code
//! - All external dependencies via traits

pub mod calendar;

// Re-export specific items to avoid ambiguity
pub use calendar::availability::BusyWindowAggregator;
pub use calendar::engine::CalendarEngine;
pub use calendar::mirror::EventMirror;
pub use calendar::ports::{
    BookingLinkRepository, CalendarProviderApi, ConnectionRepository, EventCacheRepository,
    OAuthTokenExchanger, ProviderDirectory, TokenCipher,
};
pub use calendar::token::TokenManager;
