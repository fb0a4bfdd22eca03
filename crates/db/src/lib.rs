//! SQLite persistence for conversation session state.
//!
//! The hosted data service owns venues, players, sessions, and bookings; the
//! only thing persisted locally is each chat session's transcript and
//! accumulated slot dictionary, one row per session, rewritten after every
//! turn and deleted on reset.

pub mod connection;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, ping, DbPool};
pub use repositories::{
    InMemorySessionStateRepository, PersistedConversation, RepositoryError,
    SessionStateRepository, SqlSessionStateRepository,
};
