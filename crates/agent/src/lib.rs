//! Conversational orchestration for the MaBar matchmaking assistant.
//!
//! The pipeline for one user turn:
//! 1. **Intent shift check** - keyword heuristics decide whether the turn
//!    starts a fresh request (state wiped) or refines the current one
//! 2. **Logic agent** - one model call that extracts slots, accumulates them
//!    across turns, and picks a toolbox action once enough is known
//! 3. **Toolbox** - the requested query against the hosted data service,
//!    failures downgraded to in-band degraded results
//! 4. **Presentation policy** - deterministic rule loop choosing cards vs.
//!    text (no model call)
//! 5. **Presenter agent** - a second model call that turns raw results into
//!    user-facing text plus typed session cards, with a deterministic
//!    fallback when the model output cannot be decoded
//!
//! The model is strictly a translator here: it never creates bookings or
//! sessions itself, it only selects catalogued toolbox actions whose
//! parameters are re-validated before execution.
//!
//! Calls within a turn are strictly sequential; isolation across callers
//! comes from per-session state keyed by session id (see `conversation`).

pub mod conversation;
pub mod coordinator;
pub mod llm;
pub mod logic;
pub mod presenter;
pub mod toolbox;

pub use conversation::{ConversationState, SessionManager};
pub use coordinator::Coordinator;
pub use llm::{
    build_client, ChatRequest, Content, GeminiClient, LlmClient, LlmError, OllamaClient, Part,
    ScriptedLlmClient,
};
pub use logic::LogicAgent;
pub use presenter::{PresenterAgent, PresenterRequest};
pub use toolbox::Toolbox;
