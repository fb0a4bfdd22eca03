//! Decision shapes exchanged with the language model.
//!
//! The model's output is semi-structured text that claims to be JSON. These
//! types decode it leniently: every field has a default, enum-like strings
//! fall back instead of failing the whole envelope, and raw sub-objects stay
//! as `serde_json::Value` until a dedicated coercion validates them.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::domain::card::SessionCard;
use crate::domain::records::{
    AvailabilityCheck, Booking, JoinOutcome, OpenSession, PlayerProfile, Venue,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    FindVenue,
    FindPlayers,
    JoinSession,
    CreateSession,
    #[default]
    GeneralInquiry,
}

impl Intent {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "find_venue" | "findvenue" | "find_venues" => Self::FindVenue,
            "find_players" | "findplayers" => Self::FindPlayers,
            "join_session" | "joinsession" => Self::JoinSession,
            "create_session" | "createsession" => Self::CreateSession,
            _ => Self::GeneralInquiry,
        }
    }
}

fn de_intent<'de, D>(deserializer: D) -> Result<Intent, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().map(Intent::parse).unwrap_or_default())
}

/// The fixed catalogue of operations the Logic agent may request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolboxAction {
    GetAvailableVenues,
    GetAvailablePlayers,
    FindOpenSessions,
    CreateNewSession,
    GetVenueDetails,
    CheckVenueAvailability,
    GetPersonalizedRecommendations,
    GetUserBookings,
    GetBookingHistory,
    ModifyBooking,
    JoinSession,
    NeedMoreInfo,
}

impl ToolboxAction {
    /// Accepts both the catalogue names and the short aliases the model was
    /// prompted with ("findVenues", "findSessions", ...). Unknown names map
    /// to `None` so the caller can degrade instead of erroring.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized: String =
            raw.trim().chars().filter(|ch| ch.is_ascii_alphanumeric()).collect::<String>()
                .to_ascii_lowercase();
        match normalized.as_str() {
            "getavailablevenues" | "findvenues" | "findvenue" | "searchvenues" => {
                Some(Self::GetAvailableVenues)
            }
            "getavailableplayers" | "findplayers" | "searchplayers" => {
                Some(Self::GetAvailablePlayers)
            }
            "findopensessions" | "findsessions" | "searchsessions" => Some(Self::FindOpenSessions),
            "createnewsession" | "createsession" => Some(Self::CreateNewSession),
            "getvenuedetails" | "venuedetails" => Some(Self::GetVenueDetails),
            "checkvenueavailability" | "checkavailability" => Some(Self::CheckVenueAvailability),
            "getpersonalizedrecommendations" | "recommendations" => {
                Some(Self::GetPersonalizedRecommendations)
            }
            "getuserbookings" | "mybookings" => Some(Self::GetUserBookings),
            "getbookinghistory" | "bookinghistory" => Some(Self::GetBookingHistory),
            "modifybooking" => Some(Self::ModifyBooking),
            "joinsession" => Some(Self::JoinSession),
            "needmoreinfo" => Some(Self::NeedMoreInfo),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GetAvailableVenues => "get_available_venues",
            Self::GetAvailablePlayers => "get_available_players",
            Self::FindOpenSessions => "find_open_sessions",
            Self::CreateNewSession => "create_new_session",
            Self::GetVenueDetails => "get_venue_details",
            Self::CheckVenueAvailability => "check_venue_availability",
            Self::GetPersonalizedRecommendations => "get_personalized_recommendations",
            Self::GetUserBookings => "get_user_bookings",
            Self::GetBookingHistory => "get_booking_history",
            Self::ModifyBooking => "modify_booking",
            Self::JoinSession => "join_session",
            Self::NeedMoreInfo => "need_more_info",
        }
    }
}

fn de_toolbox_action<'de, D>(deserializer: D) -> Result<Option<ToolboxAction>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(ToolboxAction::parse))
}

fn default_true() -> bool {
    true
}

/// The Logic agent's decoded decision for one turn.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InfoGatheringResult {
    #[serde(deserialize_with = "de_intent")]
    pub intent: Intent,
    pub confidence: f32,
    #[serde(default = "default_true")]
    pub needs_more_info: bool,
    pub next_question: Option<String>,
    pub extracted_info: Value,
    pub accumulated_info: Value,
    pub missing_info: Vec<String>,
    pub is_complete: bool,
    pub ready_for_toolbox: bool,
    #[serde(deserialize_with = "de_toolbox_action")]
    pub toolbox_action: Option<ToolboxAction>,
    pub toolbox_params: Value,
}

impl Default for InfoGatheringResult {
    fn default() -> Self {
        Self {
            intent: Intent::GeneralInquiry,
            confidence: 0.5,
            needs_more_info: true,
            next_question: None,
            extracted_info: Value::Null,
            accumulated_info: Value::Null,
            missing_info: Vec::new(),
            is_complete: false,
            ready_for_toolbox: false,
            toolbox_action: None,
            toolbox_params: Value::Null,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentationFormat {
    Cards,
    Text,
    #[default]
    Mixed,
}

impl PresentationFormat {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "cards" => Self::Cards,
            "text" | "simple_text" | "text_with_suggestions" => Self::Text,
            _ => Self::Mixed,
        }
    }
}

fn de_format<'de, D>(deserializer: D) -> Result<PresentationFormat, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().map(PresentationFormat::parse).unwrap_or_default())
}

/// The Presenter agent's decoded reply, before card normalization.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PresenterReply {
    #[serde(deserialize_with = "de_format")]
    pub format: PresentationFormat,
    #[serde(alias = "text")]
    pub message: Option<String>,
    #[serde(alias = "sessionCards")]
    pub cards: Vec<Value>,
    pub reasoning: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<String>,
    pub needs_more_info: bool,
}

/// Denormalized bag of records fetched for one toolbox action. Failures are
/// carried in-band (`error`, `requires_auth`) rather than as typed errors, so
/// the presenter can always degrade to a user-facing message.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ToolboxResult {
    pub venues: Vec<Venue>,
    pub players: Vec<PlayerProfile>,
    pub sessions: Vec<OpenSession>,
    pub bookings: Vec<Booking>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venue_detail: Option<Venue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability: Option<AvailabilityCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join: Option<JoinOutcome>,
    pub total_results: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub requires_auth: bool,
    pub needs_more_info: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ToolboxResult {
    pub fn service_error(message: impl Into<String>) -> Self {
        Self { error: Some(message.into()), ..Self::default() }
    }

    pub fn auth_required() -> Self {
        Self {
            requires_auth: true,
            error: Some("Authentication required".to_string()),
            ..Self::default()
        }
    }

    pub fn need_more_info(message: Option<String>) -> Self {
        Self { needs_more_info: true, message, ..Self::default() }
    }

    /// Recompute `total_results` from the record collections.
    pub fn with_totals(mut self) -> Self {
        self.total_results = self.venues.len()
            + self.players.len()
            + self.sessions.len()
            + self.bookings.len();
        self
    }

    pub fn has_results(&self) -> bool {
        self.error.is_none() && self.total_results > 0
    }
}

/// The final user-facing reply for one conversational turn.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AssistantReply {
    pub text: String,
    pub session_cards: Vec<SessionCard>,
    pub needs_more_info: bool,
}

impl AssistantReply {
    pub fn text_only(text: impl Into<String>) -> Self {
        Self { text: text.into(), session_cards: Vec::new(), needs_more_info: false }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        InfoGatheringResult, Intent, PresentationFormat, PresenterReply, ToolboxAction,
        ToolboxResult,
    };
    use crate::domain::records::Venue;

    #[test]
    fn decodes_a_complete_logic_decision() {
        let decision: InfoGatheringResult = serde_json::from_value(json!({
            "intent": "find_venue",
            "confidence": 0.85,
            "needsMoreInfo": false,
            "extractedInfo": {"location": "kedoya"},
            "missingInfo": [],
            "isComplete": true,
            "readyForToolbox": true,
            "toolboxAction": "findVenues",
            "toolboxParams": {"location": "kedoya"},
        }))
        .expect("decision should decode");

        assert_eq!(decision.intent, Intent::FindVenue);
        assert!(!decision.needs_more_info);
        assert!(decision.ready_for_toolbox);
        assert_eq!(decision.toolbox_action, Some(ToolboxAction::GetAvailableVenues));
    }

    #[test]
    fn unknown_intent_and_action_fall_back_instead_of_failing() {
        let decision: InfoGatheringResult = serde_json::from_value(json!({
            "intent": "order_pizza",
            "toolboxAction": "launchRocket",
        }))
        .expect("lenient decode");

        assert_eq!(decision.intent, Intent::GeneralInquiry);
        assert_eq!(decision.toolbox_action, None);
        assert!(decision.needs_more_info, "needs_more_info defaults to true");
    }

    #[test]
    fn toolbox_action_aliases_cover_prompt_and_catalogue_names() {
        assert_eq!(ToolboxAction::parse("findVenues"), Some(ToolboxAction::GetAvailableVenues));
        assert_eq!(
            ToolboxAction::parse("get_available_venues"),
            Some(ToolboxAction::GetAvailableVenues)
        );
        assert_eq!(ToolboxAction::parse("findSessions"), Some(ToolboxAction::FindOpenSessions));
        assert_eq!(ToolboxAction::parse("needMoreInfo"), Some(ToolboxAction::NeedMoreInfo));
        assert_eq!(ToolboxAction::parse("doSomethingElse"), None);
    }

    #[test]
    fn presenter_reply_accepts_text_alias_and_unknown_format() {
        let reply: PresenterReply = serde_json::from_value(json!({
            "format": "interpretive_dance",
            "text": "Here are your options",
            "sessionCards": [{"type": "create-new", "data": {"venue": "A"}}],
        }))
        .expect("lenient decode");

        assert_eq!(reply.format, PresentationFormat::Mixed);
        assert_eq!(reply.message.as_deref(), Some("Here are your options"));
        assert_eq!(reply.cards.len(), 1);
    }

    #[test]
    fn toolbox_result_totals_and_error_paths() {
        let result = ToolboxResult {
            venues: vec![Venue::default(), Venue::default()],
            ..ToolboxResult::default()
        }
        .with_totals();
        assert_eq!(result.total_results, 2);
        assert!(result.has_results());

        let failed = ToolboxResult::service_error("store unreachable");
        assert!(!failed.has_results());
        assert!(failed.error.is_some());

        let unauthenticated = ToolboxResult::auth_required();
        assert!(unauthenticated.requires_auth);
    }
}
