use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use mabar_baas::MatchStore;
use mabar_core::config::AssistantConfig;
use mabar_core::{
    AccumulatedInfo, AssistantReply, ConversationMessage, CurrentUser, FindingsSummary,
    InputAnalyzer, PresentationPolicy, ToolboxAction, TurnAnalysis,
};
use mabar_db::SessionStateRepository;

use crate::conversation::SessionManager;
use crate::llm::LlmClient;
use crate::logic::LogicAgent;
use crate::presenter::{PresenterAgent, PresenterRequest};
use crate::toolbox::Toolbox;

/// Sequences one conversational turn: intent-shift check, Logic call,
/// toolbox execution, presentation policy, Presenter call, state update.
/// Every stage is awaited in order; there is no cross-stage concurrency
/// within a turn, and isolation across turns comes from per-session state.
pub struct Coordinator {
    analyzer: InputAnalyzer,
    logic: LogicAgent,
    presenter: PresenterAgent,
    toolbox: Toolbox,
    sessions: SessionManager,
    policy: PresentationPolicy,
}

impl Coordinator {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        store: Arc<dyn MatchStore>,
        repository: Option<Arc<dyn SessionStateRepository>>,
        assistant: &AssistantConfig,
    ) -> Self {
        Self {
            analyzer: InputAnalyzer::new(),
            logic: LogicAgent::new(llm.clone()),
            presenter: PresenterAgent::new(llm, assistant.max_cards),
            toolbox: Toolbox::new(store, assistant.default_location.clone()),
            sessions: SessionManager::new(repository, assistant.max_history_messages),
            policy: PresentationPolicy::with_max_rounds(assistant.max_policy_rounds),
        }
    }

    pub async fn handle_turn(
        &self,
        session_id: &str,
        message: &str,
        user: Option<&CurrentUser>,
    ) -> AssistantReply {
        let started = std::time::Instant::now();
        let mut state = self.sessions.state(session_id).await;

        if !state.history().is_empty()
            && LogicAgent::detect_new_intent(state.history(), message)
        {
            info!(
                event_name = "turn.intent_shift.reset",
                session_id,
                "restart phrase detected, wiping conversation state"
            );
            state.reset();
        }

        state.push_user(message);

        // Rule-based pre-filter: confident analyzer guesses land in the slot
        // dictionary before the model sees the turn, so a model miss cannot
        // lose an unambiguous time or area mention.
        state.merge_info(self.prefilter(message));

        let decision = self.logic.gather_required_info(message, &state).await;
        state.merge_info(AccumulatedInfo::from_value(&decision.extracted_info));
        state.merge_info(AccumulatedInfo::from_value(&decision.accumulated_info));

        let reply = match decision.toolbox_action {
            Some(action) if decision.ready_for_toolbox => {
                self.search_and_present(message, action, &decision.toolbox_params, &state, user)
                    .await
            }
            _ => {
                // Clarifying turn. The reply is still a complete answer, so
                // the caller is not forced into a follow-up prompt.
                let text = decision.next_question.unwrap_or_else(|| {
                    "Happy to help you find a padel game - what do you have in mind?".to_string()
                });
                AssistantReply::text_only(text)
            }
        };

        state.push_model(&reply.text);
        self.sessions.update(session_id, state).await;

        info!(
            event_name = "turn.completed",
            session_id,
            duration_ms = started.elapsed().as_millis() as u64,
            cards = reply.session_cards.len(),
            "conversational turn completed"
        );
        reply
    }

    fn prefilter(&self, message: &str) -> AccumulatedInfo {
        let analysis = self.analyzer.analyze(message);
        let mut extracted = AccumulatedInfo::default();

        if analysis.time.confidence > 0.6 {
            extracted.time_slot =
                analysis.time.time_slot.map(|slot| slot.as_str().to_string());
        }
        if analysis.location.confidence > 0.5 {
            extracted.location = Some(analysis.location.location);
        }
        if analysis.skill_level.confidence > 0.7 {
            extracted.skill_level = Some(analysis.skill_level.skill_level);
        }
        if let Some(count) = analysis.player_count {
            extracted.players = Some(count);
        }
        if let Some(range) = analysis.pricing.price_range {
            extracted.price_range = Some(range);
        }

        extracted
    }

    async fn search_and_present(
        &self,
        message: &str,
        action: ToolboxAction,
        toolbox_params: &Value,
        state: &crate::conversation::ConversationState,
        user: Option<&CurrentUser>,
    ) -> AssistantReply {
        // Turn-level parameters: the accumulated slots, overridden by
        // whatever the model put in this turn's params.
        let mut search_criteria = state.accumulated().clone();
        search_criteria.merge(AccumulatedInfo::from_value(toolbox_params));

        let result = self
            .toolbox
            .execute(action, &search_criteria, toolbox_params, user)
            .await;

        let confidence = LogicAgent::result_confidence(&result);
        let findings = FindingsSummary::from_result(&result);
        let outcome = self
            .policy
            .decide(&findings, &TurnAnalysis::new(confidence, &search_criteria));

        info!(
            event_name = "turn.presentation.decided",
            action = action.as_str(),
            total_results = findings.total_results,
            complexity = ?outcome.complexity,
            format = ?outcome.decision.format,
            rounds = outcome.rounds.len(),
            agreed = outcome.agreed,
            "presentation decision made"
        );

        self.presenter
            .present(&PresenterRequest {
                user_request: message.to_string(),
                action,
                result,
                search_criteria,
                decision: Some(outcome.decision),
            })
            .await
    }

    /// Clears the session's in-memory state and its persisted entry.
    pub async fn reset_conversation(&self, session_id: &str) {
        self.sessions.reset(session_id).await;
        info!(event_name = "conversation.reset", session_id, "conversation state cleared");
    }

    /// Current transcript and slot dictionary, mainly for diagnostics.
    pub async fn conversation_state(
        &self,
        session_id: &str,
    ) -> (Vec<ConversationMessage>, AccumulatedInfo) {
        let state = self.sessions.state(session_id).await;
        (state.history().to_vec(), state.accumulated().clone())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use mabar_baas::InMemoryMatchStore;
    use mabar_core::config::AssistantConfig;
    use mabar_core::SessionCard;
    use mabar_db::InMemorySessionStateRepository;

    use crate::llm::ScriptedLlmClient;

    use super::Coordinator;

    fn assistant_config() -> AssistantConfig {
        AssistantConfig {
            max_history_messages: 20,
            max_policy_rounds: 3,
            max_cards: 3,
            default_location: "jakarta_area".to_string(),
        }
    }

    fn logic_ready_reply(location: &str) -> String {
        json!({
            "intent": "find_venue",
            "confidence": 0.9,
            "needsMoreInfo": false,
            "extractedInfo": {"location": location, "timeSlot": "evening_prime"},
            "readyForToolbox": true,
            "toolboxAction": "findVenues",
            "toolboxParams": {"location": location},
        })
        .to_string()
    }

    fn presenter_cards_reply() -> String {
        json!({
            "format": "cards",
            "message": "Found a great court for tonight:",
            "cards": [{"type": "create-new", "data": {
                "venue": "Senayan Padel Center",
                "address": "Senayan, Jakarta",
                "cost": "Rp 250.000/hour",
            }}],
        })
        .to_string()
    }

    async fn coordinator_with(replies: Vec<String>) -> Coordinator {
        let llm = Arc::new(ScriptedLlmClient::with_replies(
            replies.into_iter().map(Ok).collect(),
        ));
        let store = Arc::new(InMemoryMatchStore::with_demo_data().await);
        Coordinator::new(llm, store, None, &assistant_config())
    }

    #[tokio::test]
    async fn full_turn_runs_logic_toolbox_policy_and_presenter() {
        let coordinator =
            coordinator_with(vec![logic_ready_reply("Senayan"), presenter_cards_reply()]).await;

        let reply = coordinator
            .handle_turn("session-1", "courts in senayan tonight", None)
            .await;

        assert_eq!(reply.text, "Found a great court for tonight:");
        assert_eq!(reply.session_cards.len(), 1);
        assert!(matches!(reply.session_cards[0], SessionCard::CreateNew(_)));

        let (history, accumulated) = coordinator.conversation_state("session-1").await;
        assert_eq!(history.len(), 2, "user turn and model turn are recorded");
        assert_eq!(accumulated.location.as_deref(), Some("Senayan"));
        assert_eq!(accumulated.time_slot.as_deref(), Some("evening_prime"));
    }

    #[tokio::test]
    async fn clarifying_turn_returns_the_next_question_without_cards() {
        let logic_reply = json!({
            "needsMoreInfo": true,
            "nextQuestion": "What time would you like to play?",
            "readyForToolbox": false,
        })
        .to_string();

        let coordinator = coordinator_with(vec![logic_reply]).await;
        let reply = coordinator.handle_turn("session-1", "find me a game", None).await;

        assert_eq!(reply.text, "What time would you like to play?");
        assert!(reply.session_cards.is_empty());
        assert!(!reply.needs_more_info);
    }

    #[tokio::test]
    async fn restart_phrase_wipes_accumulated_state() {
        let coordinator = coordinator_with(vec![
            logic_ready_reply("Senayan"),
            presenter_cards_reply(),
            json!({
                "needsMoreInfo": true,
                "nextQuestion": "Sure, starting fresh. What are you looking for?",
                "readyForToolbox": false,
            })
            .to_string(),
        ])
        .await;

        coordinator
            .handle_turn("session-1", "courts in senayan tonight", None)
            .await;
        let (_, accumulated) = coordinator.conversation_state("session-1").await;
        assert!(accumulated.location.is_some());

        coordinator.handle_turn("session-1", "start over please", None).await;
        let (history, accumulated) = coordinator.conversation_state("session-1").await;
        assert!(accumulated.location.is_none(), "restart must wipe slots");
        assert_eq!(history.len(), 2, "only the fresh turn remains");
    }

    #[tokio::test]
    async fn model_failures_still_produce_a_presentable_reply() {
        // Logic decodes, presenter returns prose: deterministic fallback.
        let coordinator = coordinator_with(vec![
            logic_ready_reply("Senayan"),
            "Let me show you around!".to_string(),
        ])
        .await;

        let reply = coordinator
            .handle_turn("session-1", "courts in senayan tonight", None)
            .await;

        assert!(!reply.session_cards.is_empty());
    }

    #[tokio::test]
    async fn reset_clears_state_and_persisted_entry() {
        let repository = Arc::new(InMemorySessionStateRepository::default());
        let llm = Arc::new(ScriptedLlmClient::with_replies(vec![Ok(json!({
            "needsMoreInfo": true,
            "nextQuestion": "Where do you want to play?",
            "readyForToolbox": false,
        })
        .to_string())]));
        let store = Arc::new(InMemoryMatchStore::with_demo_data().await);
        let coordinator =
            Coordinator::new(llm, store, Some(repository.clone()), &assistant_config());

        coordinator.handle_turn("session-1", "hello", None).await;
        assert!(mabar_db::SessionStateRepository::load(repository.as_ref(), "session-1")
            .await
            .expect("load")
            .is_some());

        coordinator.reset_conversation("session-1").await;

        let (history, accumulated) = coordinator.conversation_state("session-1").await;
        assert!(history.is_empty());
        assert!(accumulated.is_empty());
        assert!(mabar_db::SessionStateRepository::load(repository.as_ref(), "session-1")
            .await
            .expect("load")
            .is_none());
    }

    #[tokio::test]
    async fn analyzer_prefilter_seeds_confident_slots_before_the_model() {
        let coordinator = coordinator_with(vec![json!({
            "needsMoreInfo": true,
            "nextQuestion": "Anything else I should know?",
            "readyForToolbox": false,
        })
        .to_string()])
        .await;

        coordinator
            .handle_turn("session-1", "weekend morning near kemang for 2 players", None)
            .await;

        let (_, accumulated) = coordinator.conversation_state("session-1").await;
        assert_eq!(accumulated.time_slot.as_deref(), Some("weekend_morning"));
        assert_eq!(accumulated.location.as_deref(), Some("Kemang"));
        assert_eq!(accumulated.players, Some(2));
        assert!(
            accumulated.skill_level.is_none(),
            "low-confidence skill guesses stay out of the slots"
        );
    }

    #[tokio::test]
    async fn sessions_do_not_leak_into_each_other() {
        let coordinator = coordinator_with(vec![
            logic_ready_reply("Senayan"),
            presenter_cards_reply(),
            json!({
                "needsMoreInfo": true,
                "nextQuestion": "Where would you like to play?",
                "readyForToolbox": false,
            })
            .to_string(),
        ])
        .await;

        coordinator
            .handle_turn("session-a", "courts in senayan tonight", None)
            .await;
        coordinator.handle_turn("session-b", "hello there", None).await;

        let (_, accumulated_b) = coordinator.conversation_state("session-b").await;
        assert!(
            accumulated_b.location.is_none(),
            "another session's slots must not be visible"
        );
    }
}
