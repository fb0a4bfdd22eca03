//! Deterministic demo dataset for manual testing and the `seed` CLI command.

use serde_json::json;

use mabar_core::{
    OpenSession, PlayerProfile, SessionStatus, Venue, VenueAddress, VenuePricing,
};

use crate::client::{BaasClient, BaasError};
use crate::store::InMemoryMatchStore;

#[derive(Clone, Debug, Default)]
pub struct SeedDataset {
    pub venues: Vec<Venue>,
    pub players: Vec<PlayerProfile>,
    pub sessions: Vec<OpenSession>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub venues: usize,
    pub players: usize,
    pub sessions: usize,
}

pub fn demo_dataset() -> SeedDataset {
    let venue = |id: &str, name: &str, area: &str, rate: i64, rating: f32| Venue {
        id: id.to_string(),
        name: name.to_string(),
        address: VenueAddress { area: area.to_string(), city: "Jakarta".to_string() },
        pricing: VenuePricing { hourly_rate: rate },
        facilities: vec!["Indoor".to_string(), "Parking".to_string()],
        rating,
        court_count: 2,
        is_active: true,
        description: None,
    };

    let player = |id: &str, name: &str, skill: &str, area: &str, time: &str| PlayerProfile {
        id: id.to_string(),
        name: name.to_string(),
        skill_level: skill.to_string(),
        preferred_areas: vec![area.to_string()],
        playing_times: vec![time.to_string()],
    };

    SeedDataset {
        venues: vec![
            venue("seed-venue-1", "Kedoya Padel Club", "Kedoya", 180_000, 4.3),
            venue("seed-venue-2", "Senayan Padel Center", "Senayan", 250_000, 4.7),
            venue("seed-venue-3", "Plaza Indonesia Padel", "Thamrin", 300_000, 4.8),
        ],
        players: vec![
            player("seed-player-1", "Maya Sari", "intermediate", "Senayan", "Evening (6-10 PM)"),
            player("seed-player-2", "Carlos Rodriguez", "advanced", "Kemang", "Evening (6-10 PM)"),
            player("seed-player-3", "Andi Pratama", "beginner", "Kedoya", "Morning (6 AM-12 PM)"),
        ],
        sessions: vec![OpenSession {
            id: "seed-session-1".to_string(),
            organizer_id: "seed-player-1".to_string(),
            venue_id: "seed-venue-2".to_string(),
            venue_name: Some("Senayan Padel Center".to_string()),
            date: "2025-06-07".to_string(),
            time_slot: "evening_prime".to_string(),
            start_time: None,
            end_time: None,
            current_players: vec!["Maya Sari".to_string(), "Carlos Rodriguez".to_string()],
            max_players: 4,
            open_slots: 2,
            skill_level: Some("intermediate".to_string()),
            game_type: Some("casual".to_string()),
            status: SessionStatus::Open,
            price_per_player: 62_500,
        }],
    }
}

impl InMemoryMatchStore {
    /// A store preloaded with the demo dataset.
    pub async fn with_demo_data() -> Self {
        let store = Self::new();
        let dataset = demo_dataset();
        store.insert_venues(dataset.venues).await;
        store.insert_players(dataset.players).await;
        store.insert_sessions(dataset.sessions).await;
        store
    }
}

/// Push the demo dataset into the hosted service.
pub async fn load_demo(client: &BaasClient) -> Result<SeedSummary, BaasError> {
    let dataset = demo_dataset();
    let mut summary = SeedSummary::default();

    for venue in &dataset.venues {
        client
            .create(
                "Venue",
                &json!({
                    "name": venue.name,
                    "address": {"area": venue.address.area, "city": venue.address.city},
                    "pricing": {"hourlyRate": venue.pricing.hourly_rate},
                    "facilities": venue.facilities,
                    "rating": venue.rating,
                    "courtCount": venue.court_count,
                    "isActive": venue.is_active,
                }),
            )
            .await?;
        summary.venues += 1;
    }

    for player in &dataset.players {
        client
            .create(
                "PlayerProfile",
                &json!({
                    "personalInfo": {"name": player.name},
                    "preferences": {
                        "skillLevel": player.skill_level,
                        "preferredAreas": player.preferred_areas,
                        "playingTimes": player.playing_times,
                    },
                    "status": "active",
                }),
            )
            .await?;
        summary.players += 1;
    }

    for session in &dataset.sessions {
        client
            .create(
                "Session",
                &json!({
                    "organizerId": session.organizer_id,
                    "venueId": session.venue_id,
                    "venueName": session.venue_name,
                    "date": session.date,
                    "timeSlot": session.time_slot,
                    "currentPlayers": session.current_players,
                    "maxPlayers": session.max_players,
                    "openSlots": session.open_slots,
                    "skillLevel": session.skill_level,
                    "gameType": session.game_type,
                    "status": "open",
                    "pricePerPlayer": session.price_per_player,
                }),
            )
            .await?;
        summary.sessions += 1;
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use crate::store::{InMemoryMatchStore, MatchStore, SessionFilters, VenueFilters};

    use super::demo_dataset;

    #[test]
    fn demo_dataset_is_internally_consistent() {
        let dataset = demo_dataset();

        assert_eq!(dataset.venues.len(), 3);
        assert_eq!(dataset.players.len(), 3);
        assert_eq!(dataset.sessions.len(), 1);

        let session = &dataset.sessions[0];
        assert!(dataset.venues.iter().any(|venue| venue.id == session.venue_id));
        assert_eq!(
            session.open_slots,
            session.max_players - session.current_players.len() as u32
        );
    }

    #[tokio::test]
    async fn preloaded_store_serves_the_demo_records() {
        let store = InMemoryMatchStore::with_demo_data().await;

        let venues = store
            .find_venues(&VenueFilters {
                location: Some("Senayan".to_string()),
                ..VenueFilters::default()
            })
            .await
            .expect("venues");
        assert_eq!(venues.len(), 1);
        assert_eq!(venues[0].name, "Senayan Padel Center");

        let sessions =
            store.find_open_sessions(&SessionFilters::default()).await.expect("sessions");
        assert_eq!(sessions.len(), 1);
    }
}
