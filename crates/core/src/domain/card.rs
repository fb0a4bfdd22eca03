use serde::{Deserialize, Serialize};

/// The closed set of presentation payloads a reply may carry. Anything the
/// model proposes outside this set is dropped during normalization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum SessionCard {
    ExistingSession(ExistingSessionCard),
    CreateNew(CreateNewCard),
    NoAvailability(NoAvailabilityCard),
    UserBooking(UserBookingCard),
    JoinConfirmation(JoinConfirmationCard),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CardPlayer {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill_level: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExistingSessionCard {
    pub venue: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub players: Vec<CardPlayer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_slots: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateNewCard {
    pub venue: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NoAvailabilityCard {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub searched_criteria: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_best_option: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserBookingCard {
    pub venue: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datetime: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub court: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub players: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JoinConfirmationCard {
    pub venue: String,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    pub status: String,
}

impl SessionCard {
    pub fn no_availability(message: impl Into<String>) -> Self {
        Self::NoAvailability(NoAvailabilityCard {
            message: message.into(),
            ..NoAvailabilityCard::default()
        })
    }

    /// Composite identity used to collapse near-identical venue offers:
    /// (venue, address, cost) after lowercasing and whitespace normalization.
    /// Cards without a venue identity (no-availability, join-confirmation)
    /// are never deduplicated.
    pub fn dedup_key(&self) -> Option<String> {
        match self {
            Self::CreateNew(card) => Some(composite_key(&[
                card.venue.as_str(),
                card.address.as_deref().unwrap_or(""),
                card.cost.as_deref().unwrap_or(""),
            ])),
            Self::ExistingSession(card) => Some(composite_key(&[
                card.venue.as_str(),
                card.date.as_deref().unwrap_or(""),
                card.time.as_deref().unwrap_or(""),
                card.cost.as_deref().unwrap_or(""),
            ])),
            Self::UserBooking(card) => Some(composite_key(&[
                card.venue.as_str(),
                card.datetime.as_deref().unwrap_or(""),
            ])),
            Self::NoAvailability(_) | Self::JoinConfirmation(_) => None,
        }
    }
}

fn composite_key(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|part| part.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("|")
}

/// Order-preserving dedup over the composite key; keyless cards pass through.
pub fn dedup_cards(cards: Vec<SessionCard>) -> Vec<SessionCard> {
    let mut seen = std::collections::HashSet::new();
    cards
        .into_iter()
        .filter(|card| match card.dedup_key() {
            Some(key) => seen.insert(key),
            None => true,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{dedup_cards, CreateNewCard, SessionCard};

    fn venue_card(venue: &str, address: &str, cost: &str) -> SessionCard {
        SessionCard::CreateNew(CreateNewCard {
            venue: venue.to_string(),
            address: Some(address.to_string()),
            cost: Some(cost.to_string()),
            ..CreateNewCard::default()
        })
    }

    #[test]
    fn serializes_with_kebab_case_type_tag() {
        let card = SessionCard::no_availability("No courts available");
        let wire = serde_json::to_value(&card).expect("serialize card");

        assert_eq!(wire["type"], "no-availability");
        assert_eq!(wire["data"]["message"], "No courts available");
    }

    #[test]
    fn identical_triples_collapse_regardless_of_case_and_whitespace() {
        let cards = vec![
            venue_card("Test Venue", "Senayan, Jakarta", "Rp100"),
            venue_card("test  venue", "senayan,  jakarta", "Rp100 "),
        ];

        assert_eq!(dedup_cards(cards).len(), 1);
    }

    #[test]
    fn differing_cost_stays_distinct_and_order_is_preserved() {
        let cards = vec![
            venue_card("Test Venue", "Senayan", "Rp100"),
            venue_card("Test Venue", "Senayan", "Rp100 "),
            venue_card("Test Venue", "Senayan", "Rp150"),
        ];

        let deduped = dedup_cards(cards);
        assert_eq!(deduped.len(), 2);
        assert!(matches!(
            &deduped[0],
            SessionCard::CreateNew(card) if card.cost.as_deref() == Some("Rp100")
        ));
    }

    #[test]
    fn keyless_cards_are_never_collapsed() {
        let cards = vec![
            SessionCard::no_availability("nothing"),
            SessionCard::no_availability("nothing"),
        ];

        assert_eq!(dedup_cards(cards).len(), 2);
    }
}
