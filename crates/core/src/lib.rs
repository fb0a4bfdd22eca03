//! Core domain for the MaBar matchmaking assistant.
//!
//! This crate holds everything that is deterministic about the assistant:
//! - Domain types: conversation messages, accumulated slot state, session
//!   cards, venue/player/session/booking records, agent decision shapes
//! - The Input Analyzer: tiered keyword/regex extraction over raw user text
//! - The presentation policy: a bounded rule loop that picks how search
//!   results are rendered (cards vs. text) without further model calls
//! - Layered configuration and the typed error taxonomy
//!
//! The hosted LLM and the hosted data service live behind traits in the
//! `mabar-agent` and `mabar-baas` crates; nothing in here performs I/O.

pub mod analyzer;
pub mod config;
pub mod domain;
pub mod errors;
pub mod presentation;

pub use analyzer::{InputAnalysis, InputAnalyzer, SearchIntent, TimeSlot, Urgency};
pub use domain::card::{CardPlayer, SessionCard};
pub use domain::context::{AccumulatedInfo, PriceRange, UserPreferences};
pub use domain::decision::{
    AssistantReply, InfoGatheringResult, Intent, PresentationFormat, PresenterReply,
    ToolboxAction, ToolboxResult,
};
pub use domain::message::{ConversationMessage, Role};
pub use domain::records::{
    AvailabilityCheck, Booking, CurrentUser, JoinOutcome, OpenSession, PlayerProfile,
    SessionStatus, Venue, VenueAddress, VenuePricing,
};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use presentation::{
    Complexity, FindingsSummary, PolicyOutcome, PresentationDecision, PresentationPolicy,
    TurnAnalysis,
};
