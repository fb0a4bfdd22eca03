//! Presentation policy: decides how a turn's findings are rendered.
//!
//! Simple scenarios resolve immediately; everything else runs a bounded
//! propose/review loop between two rule tables (at most three rounds) and
//! falls back to conservative plain text when the round limit is hit. The
//! loop exists to vary response shape deterministically; it makes no model
//! calls and guarantees nothing beyond termination.

use serde::{Deserialize, Serialize};

use crate::domain::context::AccumulatedInfo;
use crate::domain::decision::{PresentationFormat, ToolboxResult};

pub const MAX_POLICY_ROUNDS: u8 = 3;

const CARD_LIMIT: usize = 3;
const VENUE_OVERLOAD: usize = 5;
const PLAYER_OVERLOAD: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Simple,
    Medium,
    Complex,
}

/// Shape of one turn's findings, reduced to what the policy needs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FindingsSummary {
    pub venue_count: usize,
    pub player_count: usize,
    pub session_count: usize,
    pub total_results: usize,
    pub has_error: bool,
}

impl FindingsSummary {
    pub fn from_result(result: &ToolboxResult) -> Self {
        Self {
            venue_count: result.venues.len(),
            player_count: result.players.len(),
            session_count: result.sessions.len(),
            total_results: result.total_results,
            has_error: result.error.is_some(),
        }
    }

    pub fn has_results(&self) -> bool {
        !self.has_error && self.total_results > 0
    }
}

/// Turn-level signals: decision confidence plus how rich the accumulated
/// context is.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TurnAnalysis {
    pub confidence: f32,
    pub context_slots: usize,
    pub has_location: bool,
    pub has_time: bool,
}

impl TurnAnalysis {
    pub fn new(confidence: f32, info: &AccumulatedInfo) -> Self {
        Self {
            confidence,
            context_slots: info.filled_slots(),
            has_location: info.has_location(),
            has_time: info.has_time(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PresentationDecision {
    pub format: PresentationFormat,
    pub max_items: usize,
    pub include_more_option: bool,
    pub reasoning: String,
}

impl PresentationDecision {
    fn cards(reasoning: &str) -> Self {
        Self {
            format: PresentationFormat::Cards,
            max_items: CARD_LIMIT,
            include_more_option: true,
            reasoning: reasoning.to_string(),
        }
    }

    fn text(reasoning: &str) -> Self {
        Self {
            format: PresentationFormat::Text,
            max_items: 0,
            include_more_option: false,
            reasoning: reasoning.to_string(),
        }
    }

    fn mixed(reasoning: &str) -> Self {
        Self {
            format: PresentationFormat::Mixed,
            max_items: CARD_LIMIT,
            include_more_option: false,
            reasoning: reasoning.to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalKind {
    ShowResultsWithCards,
    ShowResultsWithExplanation,
    ProvideAlternatives,
    SimplifyPresentation,
    GatherMoreInfo,
    Hybrid,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewConcern {
    TooManyOptions,
    InsufficientInfo,
}

/// One propose/review exchange, kept as an audit trail.
#[derive(Clone, Debug, PartialEq)]
pub struct PolicyRound {
    pub round: u8,
    pub proposal: ProposalKind,
    pub accepted: bool,
    pub concern: Option<ReviewConcern>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PolicyOutcome {
    pub decision: PresentationDecision,
    pub agreed: bool,
    pub complexity: Complexity,
    pub rounds: Vec<PolicyRound>,
}

#[derive(Clone, Copy, Debug)]
pub struct PresentationPolicy {
    max_rounds: u8,
}

impl Default for PresentationPolicy {
    fn default() -> Self {
        Self { max_rounds: MAX_POLICY_ROUNDS }
    }
}

impl PresentationPolicy {
    pub fn with_max_rounds(max_rounds: u8) -> Self {
        Self { max_rounds: max_rounds.max(1) }
    }

    pub fn assess_complexity(
        &self,
        findings: &FindingsSummary,
        analysis: &TurnAnalysis,
    ) -> Complexity {
        if findings.has_results() && analysis.confidence > 0.8 && analysis.context_slots >= 2 {
            return Complexity::Simple;
        }
        if !findings.has_results() || analysis.confidence < 0.4 || analysis.context_slots == 0 {
            return Complexity::Complex;
        }
        Complexity::Medium
    }

    pub fn decide(&self, findings: &FindingsSummary, analysis: &TurnAnalysis) -> PolicyOutcome {
        let complexity = self.assess_complexity(findings, analysis);

        if complexity == Complexity::Simple {
            let decision = if findings.has_results() {
                PresentationDecision::cards("clear results available")
            } else {
                PresentationDecision::text("no results, provide guidance")
            };
            return PolicyOutcome { decision, agreed: true, complexity, rounds: Vec::new() };
        }

        let mut rounds = Vec::new();
        let mut last_concern = None;

        for round in 1..=self.max_rounds {
            let proposal = propose(round, findings, analysis, last_concern);
            let review = review(proposal, findings, analysis);

            rounds.push(PolicyRound {
                round,
                proposal,
                accepted: review.decision.is_some(),
                concern: review.concern,
            });

            if let Some(decision) = review.decision {
                return PolicyOutcome { decision, agreed: true, complexity, rounds };
            }
            last_concern = review.concern;
        }

        // Round limit reached: conservative fallback, plain text.
        PolicyOutcome {
            decision: PresentationDecision::text(
                "round limit reached, applying conservative plain-text fallback",
            ),
            agreed: false,
            complexity,
            rounds,
        }
    }
}

struct Review {
    concern: Option<ReviewConcern>,
    decision: Option<PresentationDecision>,
}

fn propose(
    round: u8,
    findings: &FindingsSummary,
    analysis: &TurnAnalysis,
    last_concern: Option<ReviewConcern>,
) -> ProposalKind {
    if round == 1 {
        return if findings.has_results() && analysis.confidence > 0.7 {
            ProposalKind::ShowResultsWithCards
        } else if findings.has_results() {
            ProposalKind::ShowResultsWithExplanation
        } else {
            ProposalKind::ProvideAlternatives
        };
    }

    match last_concern {
        Some(ReviewConcern::TooManyOptions) => ProposalKind::SimplifyPresentation,
        Some(ReviewConcern::InsufficientInfo) => ProposalKind::GatherMoreInfo,
        None => ProposalKind::Hybrid,
    }
}

fn review(
    proposal: ProposalKind,
    findings: &FindingsSummary,
    analysis: &TurnAnalysis,
) -> Review {
    match proposal {
        ProposalKind::ShowResultsWithCards => {
            if findings.venue_count > VENUE_OVERLOAD || findings.player_count > PLAYER_OVERLOAD {
                Review { concern: Some(ReviewConcern::TooManyOptions), decision: None }
            } else if findings.has_results() {
                Review {
                    concern: None,
                    decision: Some(PresentationDecision::cards(
                        "good number of results for card presentation",
                    )),
                }
            } else {
                Review {
                    concern: None,
                    decision: Some(PresentationDecision::mixed("acceptable default approach")),
                }
            }
        }
        ProposalKind::ProvideAlternatives => {
            if !analysis.has_location && !analysis.has_time {
                Review { concern: Some(ReviewConcern::InsufficientInfo), decision: None }
            } else {
                Review {
                    concern: None,
                    decision: Some(PresentationDecision::text(
                        "meaningful alternatives possible with current context",
                    )),
                }
            }
        }
        ProposalKind::SimplifyPresentation => Review {
            concern: None,
            decision: Some(PresentationDecision {
                format: PresentationFormat::Text,
                max_items: 2,
                include_more_option: false,
                reasoning: "simplified after too-many-options review".to_string(),
            }),
        },
        ProposalKind::ShowResultsWithExplanation
        | ProposalKind::GatherMoreInfo
        | ProposalKind::Hybrid => Review {
            concern: None,
            decision: Some(PresentationDecision::mixed("adaptive approach for the scenario")),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::{
        Complexity, FindingsSummary, PresentationPolicy, ProposalKind, ReviewConcern,
        TurnAnalysis,
    };
    use crate::domain::decision::PresentationFormat;

    fn findings(venues: usize, players: usize, sessions: usize) -> FindingsSummary {
        FindingsSummary {
            venue_count: venues,
            player_count: players,
            session_count: sessions,
            total_results: venues + players + sessions,
            has_error: false,
        }
    }

    fn analysis(confidence: f32, slots: usize) -> TurnAnalysis {
        TurnAnalysis {
            confidence,
            context_slots: slots,
            has_location: slots > 0,
            has_time: slots > 1,
        }
    }

    #[test]
    fn rich_confident_turns_are_simple_and_resolve_immediately() {
        let policy = PresentationPolicy::default();
        let outcome = policy.decide(&findings(3, 2, 1), &analysis(0.9, 3));

        assert_eq!(outcome.complexity, Complexity::Simple);
        assert!(outcome.agreed);
        assert!(outcome.rounds.is_empty());
        assert_eq!(outcome.decision.format, PresentationFormat::Cards);
    }

    #[test]
    fn empty_findings_are_complex() {
        let policy = PresentationPolicy::default();
        let outcome = policy.decide(&findings(0, 0, 0), &analysis(0.9, 3));

        assert_eq!(outcome.complexity, Complexity::Complex);
        assert!(!outcome.rounds.is_empty());
    }

    #[test]
    fn medium_scenario_accepts_cards_in_one_round() {
        let policy = PresentationPolicy::default();
        let outcome = policy.decide(&findings(3, 0, 1), &analysis(0.75, 1));

        assert_eq!(outcome.complexity, Complexity::Medium);
        assert!(outcome.agreed);
        assert_eq!(outcome.rounds.len(), 1);
        assert_eq!(outcome.decision.format, PresentationFormat::Cards);
        assert_eq!(outcome.decision.max_items, 3);
    }

    #[test]
    fn overloaded_results_are_simplified_on_the_second_round() {
        let policy = PresentationPolicy::default();
        let outcome = policy.decide(&findings(12, 0, 0), &analysis(0.75, 1));

        assert!(outcome.agreed);
        assert_eq!(outcome.rounds.len(), 2);
        assert_eq!(outcome.rounds[0].proposal, ProposalKind::ShowResultsWithCards);
        assert_eq!(outcome.rounds[0].concern, Some(ReviewConcern::TooManyOptions));
        assert_eq!(outcome.rounds[1].proposal, ProposalKind::SimplifyPresentation);
        assert_eq!(outcome.decision.format, PresentationFormat::Text);
        assert_eq!(outcome.decision.max_items, 2);
    }

    #[test]
    fn no_results_with_some_context_offers_text_alternatives() {
        let policy = PresentationPolicy::default();
        let outcome = policy.decide(&findings(0, 0, 0), &analysis(0.6, 2));

        assert!(outcome.agreed);
        assert_eq!(outcome.decision.format, PresentationFormat::Text);
        assert_eq!(outcome.rounds[0].proposal, ProposalKind::ProvideAlternatives);
    }

    #[test]
    fn barren_context_recovers_via_gather_more_info() {
        let policy = PresentationPolicy::default();
        let outcome = policy.decide(
            &findings(0, 0, 0),
            &TurnAnalysis {
                confidence: 0.6,
                context_slots: 0,
                has_location: false,
                has_time: false,
            },
        );

        assert!(outcome.agreed);
        assert_eq!(outcome.rounds[0].concern, Some(ReviewConcern::InsufficientInfo));
        assert_eq!(outcome.rounds[1].proposal, ProposalKind::GatherMoreInfo);
        assert_eq!(outcome.decision.format, PresentationFormat::Mixed);
    }

    #[test]
    fn single_round_policy_falls_back_conservatively() {
        let policy = PresentationPolicy::with_max_rounds(1);
        let outcome = policy.decide(
            &findings(0, 0, 0),
            &TurnAnalysis {
                confidence: 0.6,
                context_slots: 0,
                has_location: false,
                has_time: false,
            },
        );

        assert!(!outcome.agreed);
        assert_eq!(outcome.rounds.len(), 1);
        assert_eq!(outcome.decision.format, PresentationFormat::Text);
        assert!(outcome.decision.reasoning.contains("round limit"));
    }
}
