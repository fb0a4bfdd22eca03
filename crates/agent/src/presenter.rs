use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use mabar_core::domain::card::{
    dedup_cards, CardPlayer, CreateNewCard, ExistingSessionCard, JoinConfirmationCard,
    NoAvailabilityCard, SessionCard, UserBookingCard,
};
use mabar_core::{
    AccumulatedInfo, AssistantReply, PresentationDecision, PresenterReply, ToolboxAction,
    ToolboxResult,
};

use crate::llm::{parse_model_json, ChatRequest, Content, LlmClient};

const SYSTEM_PROMPT: &str = r#"You are the presentation half of MaBar, a padel matchmaking assistant for Jakarta players. You turn raw database results into clear, friendly, actionable replies.

PRESENTATION PRINCIPLES:
1. Most important information first: venue, time, price, availability
2. A reply should be understood in three seconds
3. Show essentials, keep detail for follow-ups
4. At most 3-4 cards per reply; quality over quantity
5. Always give the user an obvious next step

CARD TYPES (closed set, use exactly these):
- "existing-session": a joinable session {venue, time, date, cost, players: [{name, skillLevel}], openSlots}
- "create-new": a bookable venue {venue, address, cost, suggestedTime, suggestedDate, message}
- "no-availability": nothing matched {message, searchedCriteria, alternatives}
- "user-booking": the user's own booking {venue, datetime, status, cost, court}
- "join-confirmation": a join acknowledgement {venue, sessionId, time, date, status}

TONE ADAPTATION:
- beginner: encouraging, explain more
- intermediate: balanced and direct
- advanced: dense information, quick actions

RESPONSE FORMAT (JSON only):
{
  "format": "cards|text|mixed",
  "message": "Contextual summary with clear next steps",
  "cards": [{"type": "create-new", "data": {"venue": "...", "address": "...", "cost": "..."}}],
  "reasoning": "one short sentence",
  "alternatives": []
}

When nothing matched, never reply with an empty result: offer alternatives
(different time, nearby areas, creating a new session) in a no-availability
card."#;

/// Input for one presentation pass.
#[derive(Clone, Debug)]
pub struct PresenterRequest {
    pub user_request: String,
    pub action: ToolboxAction,
    pub result: ToolboxResult,
    pub search_criteria: AccumulatedInfo,
    pub decision: Option<PresentationDecision>,
}

/// The user-facing half of the pipeline: one model call with the persona
/// prompt, strict card normalization on the way out, and a deterministic
/// fallback whenever the model call or its decoding fails. Decode failures
/// are never retried.
pub struct PresenterAgent {
    llm: Arc<dyn LlmClient>,
    max_cards: usize,
}

impl PresenterAgent {
    pub fn new(llm: Arc<dyn LlmClient>, max_cards: usize) -> Self {
        Self { llm, max_cards: max_cards.max(1) }
    }

    pub async fn present(&self, request: &PresenterRequest) -> AssistantReply {
        // Greeting and login prompts are fully deterministic; no model call.
        if request.result.needs_more_info
            || request.result.requires_auth
            || request.action == ToolboxAction::NeedMoreInfo
        {
            return self.format_simple_response(request);
        }

        let chat = ChatRequest::new(vec![
            Content::user(
                "You are the MaBar assistant. Transform raw data into a friendly reply. \
                 Respond only with JSON.",
            ),
            Content::model(SYSTEM_PROMPT),
            Content::user(build_task_prompt(request)),
        ]);

        let completion = match self.llm.generate(&chat).await {
            Ok(completion) => completion,
            Err(error) => {
                warn!(
                    event_name = "presenter.model_call.failed",
                    error = %error,
                    "presenter model call failed, using deterministic fallback"
                );
                return self.format_simple_response(request);
            }
        };

        match parse_model_json::<PresenterReply>(&completion) {
            Ok(reply) => self.finish_reply(reply, request),
            Err(error) => {
                warn!(
                    event_name = "presenter.reply.undecodable",
                    error = %error,
                    "presenter completion was not valid JSON, using deterministic fallback"
                );
                self.format_simple_response(request)
            }
        }
    }

    fn finish_reply(&self, reply: PresenterReply, request: &PresenterRequest) -> AssistantReply {
        let normalized = normalize_cards(reply.cards);
        let mut cards = dedup_cards(normalized);

        let limit = request
            .decision
            .as_ref()
            .filter(|decision| decision.max_items > 0)
            .map(|decision| decision.max_items)
            .unwrap_or(self.max_cards);
        cards.truncate(limit);

        // The never-say-no-results contract survives the model path too.
        if cards.is_empty() && !request.result.has_results() {
            cards.push(no_availability_card(request));
        }

        debug!(
            event_name = "presenter.reply.finished",
            format = ?reply.format,
            cards = cards.len(),
            "finished presenter reply"
        );

        AssistantReply {
            text: reply
                .message
                .unwrap_or_else(|| "Here is what I found for you:".to_string()),
            session_cards: cards,
            needs_more_info: reply.needs_more_info,
        }
    }

    /// Deterministic non-model path, also used as the fallback for every
    /// model failure. Zero-result requests always yield a `no-availability`
    /// card rather than an empty card list.
    pub fn format_simple_response(&self, request: &PresenterRequest) -> AssistantReply {
        let result = &request.result;

        if result.requires_auth {
            return AssistantReply::text_only(
                "Please log in first so I can look that up for your account.",
            );
        }

        if result.needs_more_info || request.action == ToolboxAction::NeedMoreInfo {
            let text = result
                .message
                .clone()
                .unwrap_or_else(|| greeting_for(request.search_criteria.skill_level.as_deref()));
            return AssistantReply { text, session_cards: Vec::new(), needs_more_info: false };
        }

        if let Some(join) = &result.join {
            let card = if join.joined {
                SessionCard::JoinConfirmation(JoinConfirmationCard {
                    venue: request.search_criteria.venue.clone().unwrap_or_default(),
                    session_id: join.session_id.clone(),
                    time: request.search_criteria.time.clone(),
                    date: request.search_criteria.date.clone(),
                    status: if join.converted_to_booking {
                        "confirmed".to_string()
                    } else {
                        "joined".to_string()
                    },
                })
            } else {
                SessionCard::no_availability(
                    join.reason.clone().unwrap_or_else(|| "Could not join the session".to_string()),
                )
            };
            let text = if join.joined {
                "You're in! I've added you to the session.".to_string()
            } else {
                "I couldn't add you to that session.".to_string()
            };
            return AssistantReply { text, session_cards: vec![card], needs_more_info: false };
        }

        if let Some(availability) = &result.availability {
            let (text, card) = if availability.is_available {
                (
                    "Good news, that slot is free:".to_string(),
                    SessionCard::CreateNew(CreateNewCard {
                        venue: request.search_criteria.venue.clone().unwrap_or_default(),
                        suggested_time: Some(availability.time.clone()),
                        suggested_date: Some(availability.date.clone()),
                        message: Some("Slot available - ready to book".to_string()),
                        ..CreateNewCard::default()
                    }),
                )
            } else {
                (
                    "That slot is already taken, but there are alternatives:".to_string(),
                    SessionCard::NoAvailability(NoAvailabilityCard {
                        message: format!(
                            "No courts free at {} on {}",
                            availability.time, availability.date
                        ),
                        alternatives: vec![
                            "Try a different time the same day".to_string(),
                            "Try a nearby venue".to_string(),
                        ],
                        ..NoAvailabilityCard::default()
                    }),
                )
            };
            return AssistantReply { text, session_cards: vec![card], needs_more_info: false };
        }

        if !result.has_results() {
            let text = if result.error.is_some() {
                "Sorry, the matchmaking service hiccupped. Would you like to try again?"
                    .to_string()
            } else {
                "Sorry, I couldn't find any matches for your request. Would you like to try \
                 different criteria?"
                    .to_string()
            };
            return AssistantReply {
                text,
                session_cards: vec![no_availability_card(request)],
                needs_more_info: false,
            };
        }

        let mut cards: Vec<SessionCard> = Vec::new();

        for venue in &result.venues {
            cards.push(SessionCard::CreateNew(CreateNewCard {
                venue: venue.name.clone(),
                address: Some(venue.display_address()),
                cost: Some(venue.display_cost()),
                ..CreateNewCard::default()
            }));
        }

        for session in &result.sessions {
            cards.push(SessionCard::ExistingSession(ExistingSessionCard {
                venue: session
                    .venue_name
                    .clone()
                    .unwrap_or_else(|| "Padel session".to_string()),
                time: Some(session.time_slot.clone()),
                date: Some(session.date.clone()),
                cost: Some(format!("Rp {} per person", session.price_per_player)),
                players: session
                    .current_players
                    .iter()
                    .map(|name| CardPlayer { name: name.clone(), skill_level: None })
                    .collect(),
                open_slots: Some(session.open_slots),
                skill_level: session.skill_level.clone(),
                session_id: Some(session.id.clone()),
            }));
        }

        if cards.is_empty() && !result.players.is_empty() {
            cards.push(SessionCard::ExistingSession(ExistingSessionCard {
                venue: "Available Players".to_string(),
                time: Some("Flexible".to_string()),
                cost: Some("To be shared".to_string()),
                players: result
                    .players
                    .iter()
                    .take(4)
                    .map(|player| CardPlayer {
                        name: player.name.clone(),
                        skill_level: Some(player.skill_level.clone()),
                    })
                    .collect(),
                open_slots: Some(4_u32.saturating_sub(result.players.len() as u32)),
                ..ExistingSessionCard::default()
            }));
        }

        for booking in &result.bookings {
            cards.push(SessionCard::UserBooking(UserBookingCard {
                venue: booking
                    .venue_name
                    .clone()
                    .unwrap_or_else(|| booking.venue_id.clone()),
                datetime: booking.start_time.map(|start| start.to_rfc3339()),
                status: Some(booking.status.clone()),
                cost: Some(format!("Rp {}", booking.price)),
                court: booking.court.clone(),
                players: booking.players.clone(),
            }));
        }

        let mut cards = dedup_cards(cards);
        cards.truncate(self.max_cards);

        let text = summary_text(result);
        AssistantReply { text, session_cards: cards, needs_more_info: false }
    }
}

fn build_task_prompt(request: &PresenterRequest) -> String {
    let skill_level = request
        .search_criteria
        .skill_level
        .as_deref()
        .unwrap_or("not specified");
    let decision_hint = request
        .decision
        .as_ref()
        .map(|decision| {
            format!(
                "\n**Presentation decision:** format={:?}, at most {} cards ({})",
                decision.format, decision.max_items, decision.reasoning
            )
        })
        .unwrap_or_default();

    format!(
        "**User's original request:** \"{}\"\n\n\
         **User skill level:** {skill_level} (adapt tone: beginner=encouraging, \
         intermediate=balanced, advanced=direct)\n\n\
         **Toolbox action performed:** {}\n\n\
         **Raw database results:**\n{}\n\n\
         **Search criteria used:**\n{}{decision_hint}\n\n\
         **Your task:** turn this raw data into a friendly, conversational reply with \
         appropriate session cards, in the exact JSON format from your instructions.",
        request.user_request,
        request.action.as_str(),
        serde_json::to_string_pretty(&request.result).unwrap_or_else(|_| "{}".to_string()),
        serde_json::to_string_pretty(&request.search_criteria)
            .unwrap_or_else(|_| "{}".to_string()),
    )
}

/// Coerce the model's loose card objects into the closed variant set;
/// anything that does not decode is dropped with a warning.
fn normalize_cards(raw_cards: Vec<Value>) -> Vec<SessionCard> {
    raw_cards
        .into_iter()
        .filter_map(|raw| match serde_json::from_value::<SessionCard>(raw) {
            Ok(card) => Some(card),
            Err(error) => {
                warn!(
                    event_name = "presenter.card.dropped",
                    error = %error,
                    "dropping card outside the closed variant set"
                );
                None
            }
        })
        .collect()
}

fn no_availability_card(request: &PresenterRequest) -> SessionCard {
    let message = if request.result.error.is_some() {
        "Service temporarily unavailable - please try again".to_string()
    } else {
        "No results found".to_string()
    };
    SessionCard::NoAvailability(NoAvailabilityCard {
        message,
        searched_criteria: summary_criteria(&request.search_criteria),
        alternatives: vec![
            "Try a different time".to_string(),
            "Try a nearby area".to_string(),
            "Create a new session and invite others".to_string(),
        ],
        next_best_option: None,
    })
}

fn summary_criteria(info: &AccumulatedInfo) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(location) = &info.location {
        parts.push(location.clone());
    }
    if let Some(slot) = info.time_slot.as_ref().or(info.time.as_ref()) {
        parts.push(slot.clone());
    }
    if let Some(skill) = &info.skill_level {
        parts.push(skill.clone());
    }
    (!parts.is_empty()).then(|| parts.join(", "))
}

fn greeting_for(skill_level: Option<&str>) -> String {
    match skill_level {
        Some("beginner") => {
            "Hey! I'm here to help you find great padel games. What's up?".to_string()
        }
        Some("intermediate") => "Hi there! Looking for courts or players today?".to_string(),
        Some("advanced") => "Hello! What can I find for you?".to_string(),
        _ => "Hi! What brings you here today?".to_string(),
    }
}

fn summary_text(result: &ToolboxResult) -> String {
    let mut kinds = Vec::new();
    if !result.venues.is_empty() {
        kinds.push(plural(result.venues.len(), "venue"));
    }
    if !result.sessions.is_empty() {
        kinds.push(plural(result.sessions.len(), "open session"));
    }
    if !result.players.is_empty() {
        kinds.push(plural(result.players.len(), "player"));
    }
    if !result.bookings.is_empty() {
        kinds.push(plural(result.bookings.len(), "booking"));
    }

    if kinds.is_empty() {
        "Here is what I found for you:".to_string()
    } else {
        format!("Perfect! I found {} that match your request:", kinds.join(" and "))
    }
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}
