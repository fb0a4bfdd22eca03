//! Client for the hosted data service (a Parse-style REST backend).
//!
//! The service owns every persistent record (venues, player profiles, open
//! sessions, bookings); this crate issues queries and mutations against its
//! `/classes/{Class}` surface and decodes the loosely-typed rows into the
//! core domain types exactly once, at this boundary.
//!
//! The `MatchStore` trait is the seam the toolbox depends on: `BaasStore`
//! talks to the live service, `InMemoryMatchStore` backs tests, the CLI
//! chat REPL, and the demo dataset.

pub mod client;
pub mod query;
pub mod seed;
pub mod store;

pub use client::{BaasClient, BaasError};
pub use query::ParseQuery;
pub use seed::{demo_dataset, load_demo, SeedDataset, SeedSummary};
pub use store::{
    BaasStore, BookingWindow, InMemoryMatchStore, MatchStore, NewSession, PlayerFilters,
    SessionFilters, VenueFilters,
};
