//! Records owned by the hosted data service. Lifecycle (create/update/delete)
//! is delegated to that service; these shapes exist so its loosely-typed rows
//! are validated once at the client boundary and typed everywhere else.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VenueAddress {
    pub area: String,
    pub city: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VenuePricing {
    pub hourly_rate: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Venue {
    pub id: String,
    pub name: String,
    pub address: VenueAddress,
    pub pricing: VenuePricing,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub facilities: Vec<String>,
    pub rating: f32,
    pub court_count: u32,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Venue {
    pub fn display_address(&self) -> String {
        format!("{}, {}", self.address.area, self.address.city)
    }

    pub fn display_cost(&self) -> String {
        format!("Rp {}/hour", group_thousands(self.pricing.hourly_rate))
    }
}

/// Rupiah amounts are rendered with dot separators, the local convention.
pub(crate) fn group_thousands(amount: i64) -> String {
    let digits = amount.abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }
    if amount < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlayerProfile {
    pub id: String,
    pub name: String,
    pub skill_level: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub preferred_areas: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub playing_times: Vec<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Open,
    Full,
    Expired,
    Cancelled,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OpenSession {
    pub id: String,
    pub organizer_id: String,
    pub venue_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venue_name: Option<String>,
    pub date: String,
    pub time_slot: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub current_players: Vec<String>,
    pub max_players: u32,
    pub open_slots: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_type: Option<String>,
    pub status: SessionStatus,
    pub price_per_player: i64,
}

impl OpenSession {
    pub fn is_full(&self) -> bool {
        self.current_players.len() as u32 >= self.max_players
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Booking {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub venue_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venue_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub court: Option<String>,
    pub players: Vec<String>,
    pub status: String,
    pub price: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<String>,
}

/// The authenticated caller, when there is one. Operations that act on a
/// user's behalf degrade to a requires-auth result without it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl CurrentUser {
    /// Bookings reference players by username, falling back to email for
    /// records created before usernames were mandatory.
    pub fn roster_name(&self) -> &str {
        if !self.username.is_empty() {
            &self.username
        } else {
            self.email.as_deref().unwrap_or(&self.id)
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AvailabilityCheck {
    pub venue_id: String,
    pub date: String,
    pub time: String,
    pub is_available: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conflicting_bookings: Vec<Booking>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JoinOutcome {
    pub session_id: String,
    pub joined: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub converted_to_booking: bool,
}

#[cfg(test)]
mod tests {
    use super::{group_thousands, OpenSession, Venue, VenueAddress, VenuePricing};

    #[test]
    fn venue_display_helpers_format_address_and_cost() {
        let venue = Venue {
            name: "Jakarta Padel Center".to_string(),
            address: VenueAddress { area: "Senayan".to_string(), city: "Jakarta".to_string() },
            pricing: VenuePricing { hourly_rate: 175_000 },
            ..Venue::default()
        };

        assert_eq!(venue.display_address(), "Senayan, Jakarta");
        assert_eq!(venue.display_cost(), "Rp 175.000/hour");
    }

    #[test]
    fn thousands_grouping_handles_small_and_large_amounts() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(950), "950");
        assert_eq!(group_thousands(43_750), "43.750");
        assert_eq!(group_thousands(1_250_000), "1.250.000");
    }

    #[test]
    fn session_fullness_tracks_roster_size() {
        let mut session = OpenSession {
            current_players: vec!["ana".to_string(), "budi".to_string()],
            max_players: 4,
            ..OpenSession::default()
        };
        assert!(!session.is_full());

        session.current_players.push("citra".to_string());
        session.current_players.push("dewi".to_string());
        assert!(session.is_full());
    }
}
