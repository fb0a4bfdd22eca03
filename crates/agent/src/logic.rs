use std::sync::Arc;

use serde_json::json;
use tracing::{debug, warn};

use mabar_core::{AccumulatedInfo, ConversationMessage, InfoGatheringResult, ToolboxResult};

use crate::conversation::ConversationState;
use crate::llm::{parse_model_json, ChatRequest, Content, LlmClient};

/// Number of trailing history messages included in the model context.
const HISTORY_WINDOW: usize = 4;

const SYSTEM_PROMPT: &str = r#"You are the intent-understanding half of MaBar, a padel matchmaking assistant for Jakarta players.

YOUR ROLE: understand what the user wants and gather complete information for matchmaking.

CORE RESPONSIBILITIES:
1. ANALYZE the user's message to understand what they want
2. EXTRACT any session-related information (date, time, location, skill level, budget, players)
3. ACCUMULATE information across conversation turns
4. DECIDE when you have enough information to query the database
5. ASK one smart follow-up question when something essential is missing

INFORMATION REQUIREMENTS:
- find_venue: date/time + location (minimum)
- find_players: skill level + date/time (minimum)
- join_session: date/time + location OR skill level
- create_session: venue + date/time + organizer info

AVAILABLE TOOLBOX ACTIONS:
findVenues, findPlayers, findSessions, createSession, getVenueDetails,
checkVenueAvailability, getPersonalizedRecommendations, getUserBookings,
getBookingHistory, joinSession, needMoreInfo

RESPONSE FORMAT (JSON only):
{
  "intent": "find_venue|find_players|join_session|create_session|general_inquiry",
  "confidence": 0.8,
  "extractedInfo": {"date": "tomorrow", "location": "kedoya"},
  "accumulatedInfo": {"all": "info gathered so far"},
  "missingInfo": ["time", "skill_level"],
  "isComplete": false,
  "needsMoreInfo": true,
  "nextQuestion": "What time would you like to play?",
  "readyForToolbox": false,
  "toolboxAction": "findVenues",
  "toolboxParams": {"location": "kedoya"}
}

BE DECISIVE:
- Do not ask for everything at once
- Use the conversation context
- Recognize when the user changes intent
- Prefer searching and showing options over another round of questions"#;

/// The intent-understanding agent: one model call per turn, decoded
/// leniently, with a canned needs-more-info fallback on any decode failure.
pub struct LogicAgent {
    llm: Arc<dyn LlmClient>,
}

impl LogicAgent {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub async fn gather_required_info(
        &self,
        message: &str,
        state: &ConversationState,
    ) -> InfoGatheringResult {
        let prompt = build_context_prompt(message, state);
        let request = ChatRequest::new(vec![Content::user(format!("{SYSTEM_PROMPT}\n\n{prompt}"))]);

        let completion = match self.llm.generate(&request).await {
            Ok(completion) => completion,
            Err(error) => {
                warn!(
                    event_name = "logic.model_call.failed",
                    error = %error,
                    "logic model call failed, returning needs-more-info fallback"
                );
                return fallback_result(None);
            }
        };

        match parse_model_json::<InfoGatheringResult>(&completion) {
            Ok(decision) => {
                debug!(
                    event_name = "logic.decision.decoded",
                    intent = ?decision.intent,
                    ready_for_toolbox = decision.ready_for_toolbox,
                    "decoded logic decision"
                );
                decision
            }
            Err(error) => {
                warn!(
                    event_name = "logic.decision.undecodable",
                    error = %error,
                    "logic completion was not valid JSON, degrading to a question"
                );
                fallback_result(Some(completion))
            }
        }
    }

    /// True when the accumulated context already carries anything usable.
    /// Deliberately permissive: one filled slot is enough to search rather
    /// than keep questioning.
    pub fn has_minimum_required_info(info: &AccumulatedInfo) -> bool {
        !info.is_empty()
    }

    /// Should this message wipe the running conversation state?
    ///
    /// Empty history always counts as a fresh start. A message identical to
    /// the previous user turn never does (retry taps and double-sends must
    /// not wipe slots). Explicit restart phrases reset; refinement phrases
    /// keep the accumulated slots and merge.
    pub fn detect_new_intent(history: &[ConversationMessage], message: &str) -> bool {
        if history.is_empty() {
            return true;
        }

        let previous_user_message = history
            .iter()
            .rev()
            .find(|entry| entry.role == mabar_core::Role::User)
            .map(|entry| entry.text.as_str());
        if previous_user_message == Some(message) {
            return false;
        }

        let normalized = message.to_lowercase();
        const RESET_PHRASES: &[&str] =
            &["start over", "start again", "reset", "new search", "forget that", "never mind"];
        if RESET_PHRASES.iter().any(|phrase| normalized.contains(phrase)) {
            return true;
        }

        const REFINEMENT_PHRASES: &[&str] =
            &["what about", "how about", "actually", "instead", "also", "and "];
        if REFINEMENT_PHRASES.iter().any(|phrase| normalized.contains(phrase)) {
            return false;
        }

        false
    }

    /// Heuristic confidence in a toolbox result set: errors are near-zero,
    /// a handful of results is ideal, a flood is less trustworthy.
    pub fn result_confidence(result: &ToolboxResult) -> f32 {
        if result.error.is_some() {
            return 0.1;
        }
        match result.total_results {
            0 => 0.2,
            1..=10 => 0.9,
            _ => 0.7,
        }
    }
}

fn build_context_prompt(message: &str, state: &ConversationState) -> String {
    let history_window: Vec<_> = state
        .history()
        .iter()
        .rev()
        .take(HISTORY_WINDOW)
        .rev()
        .map(|entry| {
            json!({
                "role": match entry.role {
                    mabar_core::Role::User => "user",
                    mabar_core::Role::Model => "model",
                },
                "text": entry.text,
            })
        })
        .collect();

    format!(
        "Continue information gathering for padel matchmaking:\n\n\
         CURRENT MESSAGE: \"{message}\"\n\
         ACCUMULATED INFO: {}\n\
         CONVERSATION HISTORY: {}\n\n\
         Determine whether you need more info or are ready for a toolbox action. Respond with JSON.",
        serde_json::to_string(state.accumulated()).unwrap_or_else(|_| "{}".to_string()),
        serde_json::to_string(&history_window).unwrap_or_else(|_| "[]".to_string()),
    )
}

fn fallback_result(completion: Option<String>) -> InfoGatheringResult {
    let next_question = completion
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| "Could you tell me more about what you're looking for?".to_string());

    InfoGatheringResult {
        needs_more_info: true,
        next_question: Some(next_question),
        ..InfoGatheringResult::default()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mabar_core::{
        AccumulatedInfo, ConversationMessage, Intent, ToolboxAction, ToolboxResult, Venue,
    };

    use crate::conversation::ConversationState;
    use crate::llm::{LlmError, ScriptedLlmClient};

    use super::LogicAgent;

    #[tokio::test]
    async fn decodes_a_fenced_toolbox_decision() {
        let client = Arc::new(ScriptedLlmClient::replying(vec![
            "```json\n{\"intent\": \"find_venue\", \"readyForToolbox\": true, \
             \"needsMoreInfo\": false, \"toolboxAction\": \"findVenues\", \
             \"toolboxParams\": {\"location\": \"kedoya\"}}\n```",
        ]));
        let agent = LogicAgent::new(client.clone());

        let decision = agent
            .gather_required_info("courts in kedoya tomorrow", &ConversationState::default())
            .await;

        assert_eq!(decision.intent, Intent::FindVenue);
        assert!(decision.ready_for_toolbox);
        assert_eq!(decision.toolbox_action, Some(ToolboxAction::GetAvailableVenues));

        let requests = client.requests().await;
        assert_eq!(requests.len(), 1);
        let prompt = &requests[0].contents[0].parts[0].text;
        assert!(prompt.contains("CURRENT MESSAGE: \"courts in kedoya tomorrow\""));
        assert!(prompt.contains("ACCUMULATED INFO"));
    }

    #[tokio::test]
    async fn prose_completion_degrades_to_needs_more_info() {
        let client = Arc::new(ScriptedLlmClient::replying(vec![
            "Sure! What time would you like to play?",
        ]));
        let agent = LogicAgent::new(client);

        let decision = agent
            .gather_required_info("find me a game", &ConversationState::default())
            .await;

        assert!(decision.needs_more_info);
        assert!(!decision.ready_for_toolbox);
        assert_eq!(
            decision.next_question.as_deref(),
            Some("Sure! What time would you like to play?"),
            "the raw completion becomes the follow-up question"
        );
    }

    #[tokio::test]
    async fn transport_failure_degrades_to_canned_question() {
        let client = Arc::new(ScriptedLlmClient::with_replies(vec![Err(LlmError::Transport(
            "connection reset".to_string(),
        ))]));
        let agent = LogicAgent::new(client);

        let decision =
            agent.gather_required_info("hello", &ConversationState::default()).await;

        assert!(decision.needs_more_info);
        assert_eq!(
            decision.next_question.as_deref(),
            Some("Could you tell me more about what you're looking for?")
        );
    }

    #[test]
    fn new_intent_on_empty_history() {
        assert!(LogicAgent::detect_new_intent(&[], "anything at all"));
    }

    #[test]
    fn identical_repeat_of_previous_message_is_not_a_new_intent() {
        let history = vec![
            ConversationMessage::user("find courts in senayan"),
            ConversationMessage::model("What time?"),
        ];
        assert!(!LogicAgent::detect_new_intent(&history, "find courts in senayan"));
    }

    #[test]
    fn explicit_restart_phrases_reset_state() {
        let history = vec![ConversationMessage::user("find courts in senayan")];
        assert!(LogicAgent::detect_new_intent(&history, "let's start over"));
        assert!(LogicAgent::detect_new_intent(&history, "never mind, reset"));
    }

    #[test]
    fn refinement_phrases_keep_accumulated_state() {
        let history = vec![ConversationMessage::user("find courts in senayan")];
        assert!(!LogicAgent::detect_new_intent(&history, "what about kemang?"));
        assert!(!LogicAgent::detect_new_intent(&history, "actually make it 8 pm"));
    }

    #[test]
    fn minimum_info_is_any_single_filled_slot() {
        assert!(!LogicAgent::has_minimum_required_info(&AccumulatedInfo::default()));
        assert!(LogicAgent::has_minimum_required_info(&AccumulatedInfo {
            location: Some("Kemang".to_string()),
            ..AccumulatedInfo::default()
        }));
    }

    #[test]
    fn result_confidence_tiers() {
        let error = ToolboxResult::service_error("down");
        assert!((LogicAgent::result_confidence(&error) - 0.1).abs() < f32::EPSILON);

        let empty = ToolboxResult::default();
        assert!((LogicAgent::result_confidence(&empty) - 0.2).abs() < f32::EPSILON);

        let few = ToolboxResult {
            venues: vec![Venue::default(); 3],
            ..ToolboxResult::default()
        }
        .with_totals();
        assert!((LogicAgent::result_confidence(&few) - 0.9).abs() < f32::EPSILON);

        let many = ToolboxResult {
            venues: vec![Venue::default(); 15],
            ..ToolboxResult::default()
        }
        .with_totals();
        assert!((LogicAgent::result_confidence(&many) - 0.7).abs() < f32::EPSILON);
    }
}
