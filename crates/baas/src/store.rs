use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::warn;

use mabar_core::{
    AvailabilityCheck, Booking, CurrentUser, JoinOutcome, OpenSession, PlayerProfile, PriceRange,
    SessionStatus, UserPreferences, Venue, VenueAddress, VenuePricing,
};

use crate::client::{BaasClient, BaasError};
use crate::query::{date_value, ParseQuery};

const QUERY_LIMIT: u32 = 20;
const BOOKING_LIMIT: u32 = 10;

/// Generic "whole city" location; filters carrying it skip area narrowing.
pub const CITY_WIDE: &str = "jakarta_area";

#[derive(Clone, Debug, Default, PartialEq)]
pub struct VenueFilters {
    pub location: Option<String>,
    pub price_range: Option<PriceRange>,
    pub facilities: Vec<String>,
    pub min_rating: Option<f32>,
    pub min_courts: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlayerFilters {
    pub skill_level: Option<String>,
    pub location: Option<String>,
    pub time: Option<String>,
    pub gender: Option<String>,
    pub game_type: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionFilters {
    pub skill_level: Option<String>,
    pub location: Option<String>,
    pub time_slot: Option<String>,
    pub date: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BookingWindow {
    Upcoming,
    History,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewSession {
    pub organizer_id: String,
    pub venue_id: String,
    pub venue_name: Option<String>,
    pub date: String,
    pub time_slot: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub organizer_name: String,
    pub max_players: u32,
    pub skill_level: Option<String>,
    pub game_type: Option<String>,
    pub price_per_player: i64,
}

/// The data-access seam the toolbox depends on.
#[async_trait]
pub trait MatchStore: Send + Sync {
    async fn find_venues(&self, filters: &VenueFilters) -> Result<Vec<Venue>, BaasError>;

    async fn find_players(&self, filters: &PlayerFilters)
        -> Result<Vec<PlayerProfile>, BaasError>;

    async fn find_open_sessions(
        &self,
        filters: &SessionFilters,
    ) -> Result<Vec<OpenSession>, BaasError>;

    async fn venue_details(
        &self,
        venue_id: Option<&str>,
        venue_name: Option<&str>,
    ) -> Result<Option<Venue>, BaasError>;

    async fn venue_availability(
        &self,
        venue_id: &str,
        date: &str,
        time: &str,
    ) -> Result<AvailabilityCheck, BaasError>;

    async fn player_profile(
        &self,
        user: &CurrentUser,
    ) -> Result<Option<UserPreferences>, BaasError>;

    async fn user_bookings(
        &self,
        user: &CurrentUser,
        window: BookingWindow,
    ) -> Result<Vec<Booking>, BaasError>;

    async fn create_session(&self, session: &NewSession) -> Result<OpenSession, BaasError>;

    async fn join_session(&self, session_id: &str, player: &str)
        -> Result<JoinOutcome, BaasError>;
}

// ---------------------------------------------------------------------------
// Wire rows: the service's loosely-typed objects, decoded once and defaulted
// the same way the chat surface expects them.
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DateField {
    Wrapped { iso: DateTime<Utc> },
    Plain(DateTime<Utc>),
}

impl DateField {
    fn into_datetime(self) -> DateTime<Utc> {
        match self {
            Self::Wrapped { iso } => iso,
            Self::Plain(datetime) => datetime,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct VenueRow {
    object_id: String,
    name: Option<String>,
    address: Option<VenueAddress>,
    pricing: Option<VenuePricing>,
    facilities: Vec<String>,
    rating: Option<f32>,
    court_count: Option<u32>,
    is_active: Option<bool>,
    description: Option<String>,
}

impl VenueRow {
    fn into_venue(self) -> Venue {
        Venue {
            id: self.object_id,
            name: self.name.unwrap_or_else(|| "Padel Court".to_string()),
            address: self.address.unwrap_or(VenueAddress {
                area: "Central".to_string(),
                city: "Jakarta".to_string(),
            }),
            pricing: self.pricing.unwrap_or(VenuePricing { hourly_rate: 175_000 }),
            facilities: self.facilities,
            rating: self.rating.unwrap_or(4.0),
            court_count: self.court_count.unwrap_or(1),
            is_active: self.is_active.unwrap_or(true),
            description: self.description,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PersonalInfo {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ProfilePreferences {
    skill_level: Option<String>,
    preferred_areas: Vec<String>,
    playing_times: Vec<String>,
    budget_range: Option<PriceRange>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PlayerProfileRow {
    object_id: String,
    personal_info: Option<PersonalInfo>,
    preferences: Option<ProfilePreferences>,
}

impl PlayerProfileRow {
    fn into_profile(self) -> PlayerProfile {
        let personal_info = self.personal_info.unwrap_or_default();
        let preferences = self.preferences.unwrap_or_default();
        PlayerProfile {
            id: self.object_id,
            name: personal_info.name.unwrap_or_else(|| "Player".to_string()),
            skill_level: preferences
                .skill_level
                .unwrap_or_else(|| "intermediate".to_string()),
            preferred_areas: preferences.preferred_areas,
            playing_times: preferences.playing_times,
        }
    }

    fn into_preferences(self) -> UserPreferences {
        let preferences = self.preferences.unwrap_or_default();
        UserPreferences {
            skill_level: preferences.skill_level,
            preferred_areas: preferences.preferred_areas,
            playing_times: preferences.playing_times,
            budget_range: preferences.budget_range,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SessionRow {
    object_id: String,
    organizer_id: String,
    venue_id: String,
    venue_name: Option<String>,
    date: String,
    time_slot: String,
    start_time: Option<DateField>,
    end_time: Option<DateField>,
    current_players: Vec<String>,
    max_players: Option<u32>,
    open_slots: Option<u32>,
    skill_level: Option<String>,
    game_type: Option<String>,
    status: Option<SessionStatus>,
    price_per_player: Option<i64>,
}

impl SessionRow {
    fn into_session(self) -> OpenSession {
        let max_players = self.max_players.unwrap_or(4);
        let roster = self.current_players.len() as u32;
        OpenSession {
            id: self.object_id,
            organizer_id: self.organizer_id,
            venue_id: self.venue_id,
            venue_name: self.venue_name,
            date: self.date,
            time_slot: self.time_slot,
            start_time: self.start_time.map(DateField::into_datetime),
            end_time: self.end_time.map(DateField::into_datetime),
            open_slots: self.open_slots.unwrap_or(max_players.saturating_sub(roster)),
            current_players: self.current_players,
            max_players,
            skill_level: self.skill_level,
            game_type: self.game_type,
            status: self.status.unwrap_or_default(),
            price_per_player: self.price_per_player.unwrap_or(0),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct BookingRow {
    object_id: String,
    title: Option<String>,
    venue_id: String,
    venue_name: Option<String>,
    start_time: Option<DateField>,
    end_time: Option<DateField>,
    court: Option<String>,
    players: Vec<String>,
    status: Option<String>,
    price: Option<i64>,
    payment_status: Option<String>,
}

impl BookingRow {
    fn into_booking(self) -> Booking {
        Booking {
            id: self.object_id,
            title: self.title,
            venue_id: self.venue_id,
            venue_name: self.venue_name,
            start_time: self.start_time.map(DateField::into_datetime),
            end_time: self.end_time.map(DateField::into_datetime),
            court: self.court,
            players: self.players,
            status: self.status.unwrap_or_else(|| "confirmed".to_string()),
            price: self.price.unwrap_or(0),
            payment_status: self.payment_status,
        }
    }
}

// ---------------------------------------------------------------------------
// Live implementation over the hosted service
// ---------------------------------------------------------------------------

pub struct BaasStore {
    client: BaasClient,
}

impl BaasStore {
    pub fn new(client: BaasClient) -> Self {
        Self { client }
    }

    fn venue_query(filters: &VenueFilters) -> ParseQuery {
        let mut query = ParseQuery::new("Venue").equal_to("isActive", true);

        if let Some(location) = filters.location.as_deref() {
            if !location.eq_ignore_ascii_case(CITY_WIDE)
                && !location.eq_ignore_ascii_case("jakarta")
            {
                let constraint = json!({"$regex": location, "$options": "i"});
                query = query.any_of(vec![
                    ("address.area", constraint.clone()),
                    ("address.city", constraint.clone()),
                    ("name", constraint),
                ]);
            }
        }

        if let Some(range) = &filters.price_range {
            query = query
                .greater_than_or_equal("pricing.hourlyRate", range.min)
                .less_than_or_equal("pricing.hourlyRate", range.max);
        }

        if !filters.facilities.is_empty() {
            query = query.contains_all("facilities", &filters.facilities);
        }

        if let Some(min_rating) = filters.min_rating {
            query = query.greater_than_or_equal("rating", min_rating as f64);
        }

        if let Some(min_courts) = filters.min_courts {
            query = query.greater_than_or_equal("courtCount", min_courts);
        }

        query.ascending("pricing.hourlyRate").limit(QUERY_LIMIT)
    }

    fn player_query(filters: &PlayerFilters) -> ParseQuery {
        let mut query = ParseQuery::new("PlayerProfile");

        if let Some(skill_level) = filters.skill_level.as_deref() {
            query = query.equal_to("preferences.skillLevel", skill_level.to_lowercase());
        }
        if let Some(location) = filters.location.as_deref() {
            if !location.eq_ignore_ascii_case(CITY_WIDE) {
                // Array equality on the service means "contains".
                query = query.equal_to("preferences.preferredAreas", location);
            }
        }
        if let Some(label) = filters.time.as_deref().and_then(playing_time_label) {
            query = query.equal_to("preferences.playingTimes", label);
        }
        if let Some(gender) = filters.gender.as_deref() {
            if !gender.eq_ignore_ascii_case("mixed") {
                query = query.equal_to("personalInfo.gender", gender);
            }
        }
        if let Some(game_type) = filters.game_type.as_deref() {
            query = query.equal_to("preferences.gameType", game_type);
        }

        query.limit(QUERY_LIMIT)
    }

    fn session_query(filters: &SessionFilters) -> ParseQuery {
        let mut query = ParseQuery::new("Session")
            .equal_to("status", "open")
            .greater_than("openSlots", 0);

        if let Some(skill_level) = filters.skill_level.as_deref() {
            query = query.equal_to("skillLevel", skill_level.to_lowercase());
        }
        if let Some(location) = filters.location.as_deref() {
            if !location.eq_ignore_ascii_case(CITY_WIDE) {
                query = query.matches("venueName", location);
            }
        }
        if let Some(time_slot) = filters.time_slot.as_deref() {
            query = query.equal_to("timeSlot", time_slot);
        }
        if let Some(date) = filters.date.as_deref() {
            query = query.equal_to("date", date);
        }

        query.ascending("startTime").limit(QUERY_LIMIT)
    }
}

/// Maps a free-form time hint onto the profile schema's playing-time labels.
fn playing_time_label(time: &str) -> Option<&'static str> {
    let normalized = time.to_lowercase();
    if normalized.contains("morning") {
        Some("Morning (6 AM-12 PM)")
    } else if normalized.contains("afternoon") {
        Some("Afternoon (12-6 PM)")
    } else if normalized.contains("evening") {
        Some("Evening (6-10 PM)")
    } else if normalized.contains("night") {
        Some("Night (10 PM-12 AM)")
    } else {
        None
    }
}

fn day_window(date: &str) -> Result<(DateTime<Utc>, DateTime<Utc>), BaasError> {
    let day = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| BaasError::InvalidInput(format!("unparseable date `{date}`")))?;
    let bounds = day
        .and_hms_opt(0, 0, 0)
        .zip(day.and_hms_opt(23, 59, 59))
        .ok_or_else(|| BaasError::InvalidInput(format!("unrepresentable date `{date}`")))?;
    Ok((Utc.from_utc_datetime(&bounds.0), Utc.from_utc_datetime(&bounds.1)))
}

#[async_trait]
impl MatchStore for BaasStore {
    async fn find_venues(&self, filters: &VenueFilters) -> Result<Vec<Venue>, BaasError> {
        let rows: Vec<VenueRow> = self.client.find(&Self::venue_query(filters)).await?;
        Ok(rows.into_iter().map(VenueRow::into_venue).collect())
    }

    async fn find_players(
        &self,
        filters: &PlayerFilters,
    ) -> Result<Vec<PlayerProfile>, BaasError> {
        let rows: Vec<PlayerProfileRow> = self.client.find(&Self::player_query(filters)).await?;
        Ok(rows.into_iter().map(PlayerProfileRow::into_profile).collect())
    }

    async fn find_open_sessions(
        &self,
        filters: &SessionFilters,
    ) -> Result<Vec<OpenSession>, BaasError> {
        let rows: Vec<SessionRow> = self.client.find(&Self::session_query(filters)).await?;
        Ok(rows.into_iter().map(SessionRow::into_session).collect())
    }

    async fn venue_details(
        &self,
        venue_id: Option<&str>,
        venue_name: Option<&str>,
    ) -> Result<Option<Venue>, BaasError> {
        if let Some(venue_id) = venue_id {
            let row: Option<VenueRow> = self.client.get("Venue", venue_id).await?;
            return Ok(row.map(VenueRow::into_venue));
        }

        let Some(venue_name) = venue_name else {
            return Err(BaasError::InvalidInput("venue id or name required".to_string()));
        };

        let query = ParseQuery::new("Venue").matches("name", venue_name);
        let row: Option<VenueRow> = self.client.first(&query).await?;
        Ok(row.map(VenueRow::into_venue))
    }

    async fn venue_availability(
        &self,
        venue_id: &str,
        date: &str,
        time: &str,
    ) -> Result<AvailabilityCheck, BaasError> {
        let (start_of_day, end_of_day) = day_window(date)?;

        let query = ParseQuery::new("Booking")
            .equal_to("venueId", venue_id)
            .equal_to("status", "confirmed")
            .greater_than_or_equal("startTime", date_value(start_of_day))
            .less_than_or_equal("startTime", date_value(end_of_day));

        let rows: Vec<BookingRow> = self.client.find(&query).await?;
        let conflicting_bookings: Vec<Booking> =
            rows.into_iter().map(BookingRow::into_booking).collect();

        Ok(AvailabilityCheck {
            venue_id: venue_id.to_string(),
            date: date.to_string(),
            time: time.to_string(),
            is_available: conflicting_bookings.is_empty(),
            conflicting_bookings,
        })
    }

    async fn player_profile(
        &self,
        user: &CurrentUser,
    ) -> Result<Option<UserPreferences>, BaasError> {
        let query = ParseQuery::new("PlayerProfile").equal_to("userId", user.id.clone());
        let row: Option<PlayerProfileRow> = self.client.first(&query).await?;
        Ok(row.map(PlayerProfileRow::into_preferences))
    }

    async fn user_bookings(
        &self,
        user: &CurrentUser,
        window: BookingWindow,
    ) -> Result<Vec<Booking>, BaasError> {
        let now = date_value(Utc::now());
        let roster_name = user.roster_name().to_string();

        let query = match window {
            BookingWindow::Upcoming => ParseQuery::new("Booking")
                .contains_all("players", &[roster_name])
                .equal_to("status", "confirmed")
                .greater_than("startTime", now)
                .ascending("startTime")
                .limit(BOOKING_LIMIT),
            BookingWindow::History => ParseQuery::new("Booking")
                .contains_all("players", &[roster_name])
                .less_than("startTime", now)
                .descending("startTime")
                .limit(BOOKING_LIMIT),
        };

        let rows: Vec<BookingRow> = self.client.find(&query).await?;
        Ok(rows.into_iter().map(BookingRow::into_booking).collect())
    }

    async fn create_session(&self, session: &NewSession) -> Result<OpenSession, BaasError> {
        let open_slots = session.max_players.saturating_sub(1);
        let mut body = json!({
            "organizerId": session.organizer_id,
            "venueId": session.venue_id,
            "date": session.date,
            "timeSlot": session.time_slot,
            "currentPlayers": [session.organizer_name],
            "maxPlayers": session.max_players,
            "openSlots": open_slots,
            "status": "open",
            "pricePerPlayer": session.price_per_player,
        });
        if let Some(venue_name) = &session.venue_name {
            body["venueName"] = json!(venue_name);
        }
        if let Some(skill_level) = &session.skill_level {
            body["skillLevel"] = json!(skill_level);
        }
        if let Some(game_type) = &session.game_type {
            body["gameType"] = json!(game_type);
        }
        if let Some(start_time) = session.start_time {
            body["startTime"] = date_value(start_time);
        }
        if let Some(end_time) = session.end_time {
            body["endTime"] = date_value(end_time);
        }

        let object_id = self.client.create("Session", &body).await?;

        Ok(OpenSession {
            id: object_id,
            organizer_id: session.organizer_id.clone(),
            venue_id: session.venue_id.clone(),
            venue_name: session.venue_name.clone(),
            date: session.date.clone(),
            time_slot: session.time_slot.clone(),
            start_time: session.start_time,
            end_time: session.end_time,
            current_players: vec![session.organizer_name.clone()],
            max_players: session.max_players,
            open_slots,
            skill_level: session.skill_level.clone(),
            game_type: session.game_type.clone(),
            status: SessionStatus::Open,
            price_per_player: session.price_per_player,
        })
    }

    async fn join_session(
        &self,
        session_id: &str,
        player: &str,
    ) -> Result<JoinOutcome, BaasError> {
        let row: Option<SessionRow> = self.client.get("Session", session_id).await?;
        let Some(row) = row else {
            return Ok(JoinOutcome {
                session_id: session_id.to_string(),
                joined: false,
                reason: Some("session not found".to_string()),
                converted_to_booking: false,
            });
        };
        let session = row.into_session();

        if session.current_players.iter().any(|name| name == player) {
            return Ok(JoinOutcome {
                session_id: session_id.to_string(),
                joined: false,
                reason: Some("player already in this session".to_string()),
                converted_to_booking: false,
            });
        }
        if session.is_full() || session.status != SessionStatus::Open {
            return Ok(JoinOutcome {
                session_id: session_id.to_string(),
                joined: false,
                reason: Some("session is already full".to_string()),
                converted_to_booking: false,
            });
        }

        let mut roster = session.current_players.clone();
        roster.push(player.to_string());
        let open_slots = session.max_players.saturating_sub(roster.len() as u32);
        let now_full = open_slots == 0;

        self.client
            .update(
                "Session",
                session_id,
                &json!({
                    "currentPlayers": roster,
                    "openSlots": open_slots,
                    "status": if now_full { "full" } else { "open" },
                }),
            )
            .await?;

        // The service offers no compare-and-swap; re-read and back out if a
        // concurrent join oversubscribed the roster.
        let verify: Option<SessionRow> = self.client.get("Session", session_id).await?;
        if let Some(verify) = verify {
            let verified = verify.into_session();
            if verified.current_players.len() as u32 > verified.max_players {
                warn!(
                    event_name = "session.join.capacity_conflict",
                    session_id, player, "roster oversubscribed, rolling back join"
                );
                let repaired: Vec<String> = verified
                    .current_players
                    .iter()
                    .filter(|name| name.as_str() != player)
                    .cloned()
                    .collect();
                let repaired_slots =
                    verified.max_players.saturating_sub(repaired.len() as u32);
                self.client
                    .update(
                        "Session",
                        session_id,
                        &json!({
                            "currentPlayers": repaired,
                            "openSlots": repaired_slots,
                            "status": if repaired_slots == 0 { "full" } else { "open" },
                        }),
                    )
                    .await?;
                return Ok(JoinOutcome {
                    session_id: session_id.to_string(),
                    joined: false,
                    reason: Some("session filled up while joining".to_string()),
                    converted_to_booking: false,
                });
            }
        }

        let mut converted_to_booking = false;
        if now_full {
            // Full sessions become confirmed bookings for the whole roster.
            let mut booking = json!({
                "title": "Padel session",
                "venueId": session.venue_id,
                "players": roster,
                "status": "confirmed",
                "price": session.price_per_player * session.max_players as i64,
                "paymentStatus": "pending",
            });
            if let Some(venue_name) = &session.venue_name {
                booking["venueName"] = json!(venue_name);
            }
            if let Some(start_time) = session.start_time {
                booking["startTime"] = date_value(start_time);
            }
            if let Some(end_time) = session.end_time {
                booking["endTime"] = date_value(end_time);
            }
            self.client.create("Booking", &booking).await?;
            converted_to_booking = true;
        }

        Ok(JoinOutcome {
            session_id: session_id.to_string(),
            joined: true,
            reason: None,
            converted_to_booking,
        })
    }
}

// ---------------------------------------------------------------------------
// In-memory implementation for tests, the chat REPL, and demo data
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemoryState {
    venues: Vec<Venue>,
    players: Vec<PlayerProfile>,
    sessions: Vec<OpenSession>,
    bookings: Vec<Booking>,
    preferences: std::collections::HashMap<String, UserPreferences>,
    next_id: u64,
    fail_with: Option<String>,
}

#[derive(Default)]
pub struct InMemoryMatchStore {
    state: RwLock<MemoryState>,
}

impl InMemoryMatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_venues(&self, venues: Vec<Venue>) {
        self.state.write().await.venues.extend(venues);
    }

    pub async fn insert_players(&self, players: Vec<PlayerProfile>) {
        self.state.write().await.players.extend(players);
    }

    pub async fn insert_sessions(&self, sessions: Vec<OpenSession>) {
        self.state.write().await.sessions.extend(sessions);
    }

    pub async fn insert_bookings(&self, bookings: Vec<Booking>) {
        self.state.write().await.bookings.extend(bookings);
    }

    pub async fn set_preferences(&self, user_id: &str, preferences: UserPreferences) {
        self.state.write().await.preferences.insert(user_id.to_string(), preferences);
    }

    /// Make every subsequent call fail, for exercising degraded paths.
    pub async fn fail_with(&self, message: &str) {
        self.state.write().await.fail_with = Some(message.to_string());
    }

    pub async fn session(&self, session_id: &str) -> Option<OpenSession> {
        self.state
            .read()
            .await
            .sessions
            .iter()
            .find(|session| session.id == session_id)
            .cloned()
    }

    pub async fn booking_count(&self) -> usize {
        self.state.read().await.bookings.len()
    }
}

fn check_failure(state: &MemoryState) -> Result<(), BaasError> {
    match &state.fail_with {
        Some(message) => Err(BaasError::InvalidInput(message.clone())),
        None => Ok(()),
    }
}

fn matches_location(haystacks: &[&str], location: &str) -> bool {
    let needle = location.to_lowercase();
    haystacks.iter().any(|haystack| haystack.to_lowercase().contains(&needle))
}

#[async_trait]
impl MatchStore for InMemoryMatchStore {
    async fn find_venues(&self, filters: &VenueFilters) -> Result<Vec<Venue>, BaasError> {
        let state = self.state.read().await;
        check_failure(&state)?;

        let mut venues: Vec<Venue> = state
            .venues
            .iter()
            .filter(|venue| venue.is_active)
            .filter(|venue| match filters.location.as_deref() {
                Some(location)
                    if !location.eq_ignore_ascii_case(CITY_WIDE)
                        && !location.eq_ignore_ascii_case("jakarta") =>
                {
                    matches_location(
                        &[
                            venue.address.area.as_str(),
                            venue.address.city.as_str(),
                            venue.name.as_str(),
                        ],
                        location,
                    )
                }
                _ => true,
            })
            .filter(|venue| match &filters.price_range {
                Some(range) => {
                    venue.pricing.hourly_rate >= range.min
                        && venue.pricing.hourly_rate <= range.max
                }
                None => true,
            })
            .filter(|venue| {
                filters.facilities.iter().all(|wanted| venue.facilities.contains(wanted))
            })
            .filter(|venue| filters.min_rating.map_or(true, |min| venue.rating >= min))
            .filter(|venue| filters.min_courts.map_or(true, |min| venue.court_count >= min))
            .cloned()
            .collect();

        venues.sort_by_key(|venue| venue.pricing.hourly_rate);
        venues.truncate(QUERY_LIMIT as usize);
        Ok(venues)
    }

    async fn find_players(
        &self,
        filters: &PlayerFilters,
    ) -> Result<Vec<PlayerProfile>, BaasError> {
        let state = self.state.read().await;
        check_failure(&state)?;

        let players: Vec<PlayerProfile> = state
            .players
            .iter()
            .filter(|player| match filters.skill_level.as_deref() {
                Some(skill) => player.skill_level.eq_ignore_ascii_case(skill),
                None => true,
            })
            .filter(|player| match filters.location.as_deref() {
                Some(location) if !location.eq_ignore_ascii_case(CITY_WIDE) => player
                    .preferred_areas
                    .iter()
                    .any(|area| area.eq_ignore_ascii_case(location)),
                _ => true,
            })
            .filter(|player| match filters.time.as_deref().and_then(playing_time_label) {
                Some(label) => player.playing_times.iter().any(|time| time == label),
                None => true,
            })
            .take(QUERY_LIMIT as usize)
            .cloned()
            .collect();

        Ok(players)
    }

    async fn find_open_sessions(
        &self,
        filters: &SessionFilters,
    ) -> Result<Vec<OpenSession>, BaasError> {
        let state = self.state.read().await;
        check_failure(&state)?;

        let sessions: Vec<OpenSession> = state
            .sessions
            .iter()
            .filter(|session| session.status == SessionStatus::Open && session.open_slots > 0)
            .filter(|session| match filters.skill_level.as_deref() {
                Some(skill) => session
                    .skill_level
                    .as_deref()
                    .map_or(false, |level| level.eq_ignore_ascii_case(skill)),
                None => true,
            })
            .filter(|session| match filters.location.as_deref() {
                Some(location) if !location.eq_ignore_ascii_case(CITY_WIDE) => session
                    .venue_name
                    .as_deref()
                    .map_or(false, |name| matches_location(&[name], location)),
                _ => true,
            })
            .filter(|session| match filters.time_slot.as_deref() {
                Some(time_slot) => session.time_slot == time_slot,
                None => true,
            })
            .filter(|session| match filters.date.as_deref() {
                Some(date) => session.date == date,
                None => true,
            })
            .take(QUERY_LIMIT as usize)
            .cloned()
            .collect();

        Ok(sessions)
    }

    async fn venue_details(
        &self,
        venue_id: Option<&str>,
        venue_name: Option<&str>,
    ) -> Result<Option<Venue>, BaasError> {
        let state = self.state.read().await;
        check_failure(&state)?;

        if venue_id.is_none() && venue_name.is_none() {
            return Err(BaasError::InvalidInput("venue id or name required".to_string()));
        }

        Ok(state
            .venues
            .iter()
            .find(|venue| {
                venue_id.map_or(false, |id| venue.id == id)
                    || venue_name.map_or(false, |name| {
                        venue.name.to_lowercase().contains(&name.to_lowercase())
                    })
            })
            .cloned())
    }

    async fn venue_availability(
        &self,
        venue_id: &str,
        date: &str,
        time: &str,
    ) -> Result<AvailabilityCheck, BaasError> {
        let state = self.state.read().await;
        check_failure(&state)?;
        let (start_of_day, end_of_day) = day_window(date)?;

        let conflicting_bookings: Vec<Booking> = state
            .bookings
            .iter()
            .filter(|booking| booking.venue_id == venue_id && booking.status == "confirmed")
            .filter(|booking| {
                booking.start_time.map_or(false, |start| {
                    start >= start_of_day && start <= end_of_day
                })
            })
            .cloned()
            .collect();

        Ok(AvailabilityCheck {
            venue_id: venue_id.to_string(),
            date: date.to_string(),
            time: time.to_string(),
            is_available: conflicting_bookings.is_empty(),
            conflicting_bookings,
        })
    }

    async fn player_profile(
        &self,
        user: &CurrentUser,
    ) -> Result<Option<UserPreferences>, BaasError> {
        let state = self.state.read().await;
        check_failure(&state)?;
        Ok(state.preferences.get(&user.id).cloned())
    }

    async fn user_bookings(
        &self,
        user: &CurrentUser,
        window: BookingWindow,
    ) -> Result<Vec<Booking>, BaasError> {
        let state = self.state.read().await;
        check_failure(&state)?;
        let now = Utc::now();
        let roster_name = user.roster_name();

        let mut bookings: Vec<Booking> = state
            .bookings
            .iter()
            .filter(|booking| booking.players.iter().any(|player| player == roster_name))
            .filter(|booking| match window {
                BookingWindow::Upcoming => {
                    booking.status == "confirmed"
                        && booking.start_time.map_or(false, |start| start > now)
                }
                BookingWindow::History => {
                    booking.start_time.map_or(false, |start| start < now)
                }
            })
            .cloned()
            .collect();

        bookings.sort_by_key(|booking| booking.start_time);
        if window == BookingWindow::History {
            bookings.reverse();
        }
        bookings.truncate(BOOKING_LIMIT as usize);
        Ok(bookings)
    }

    async fn create_session(&self, session: &NewSession) -> Result<OpenSession, BaasError> {
        let mut state = self.state.write().await;
        check_failure(&state)?;

        state.next_id += 1;
        let created = OpenSession {
            id: format!("session-{}", state.next_id),
            organizer_id: session.organizer_id.clone(),
            venue_id: session.venue_id.clone(),
            venue_name: session.venue_name.clone(),
            date: session.date.clone(),
            time_slot: session.time_slot.clone(),
            start_time: session.start_time,
            end_time: session.end_time,
            current_players: vec![session.organizer_name.clone()],
            max_players: session.max_players,
            open_slots: session.max_players.saturating_sub(1),
            skill_level: session.skill_level.clone(),
            game_type: session.game_type.clone(),
            status: SessionStatus::Open,
            price_per_player: session.price_per_player,
        };
        state.sessions.push(created.clone());
        Ok(created)
    }

    async fn join_session(
        &self,
        session_id: &str,
        player: &str,
    ) -> Result<JoinOutcome, BaasError> {
        let mut state = self.state.write().await;
        check_failure(&state)?;
        let state = &mut *state;

        let Some(session) =
            state.sessions.iter_mut().find(|session| session.id == session_id)
        else {
            return Ok(JoinOutcome {
                session_id: session_id.to_string(),
                joined: false,
                reason: Some("session not found".to_string()),
                converted_to_booking: false,
            });
        };

        if session.current_players.iter().any(|name| name == player) {
            return Ok(JoinOutcome {
                session_id: session_id.to_string(),
                joined: false,
                reason: Some("player already in this session".to_string()),
                converted_to_booking: false,
            });
        }
        if session.is_full() || session.status != SessionStatus::Open {
            return Ok(JoinOutcome {
                session_id: session_id.to_string(),
                joined: false,
                reason: Some("session is already full".to_string()),
                converted_to_booking: false,
            });
        }

        session.current_players.push(player.to_string());
        session.open_slots =
            session.max_players.saturating_sub(session.current_players.len() as u32);

        let mut converted_to_booking = false;
        if session.open_slots == 0 {
            session.status = SessionStatus::Full;
            let booking = Booking {
                id: format!("booking-{session_id}"),
                title: Some("Padel session".to_string()),
                venue_id: session.venue_id.clone(),
                venue_name: session.venue_name.clone(),
                start_time: session.start_time,
                end_time: session.end_time,
                court: None,
                players: session.current_players.clone(),
                status: "confirmed".to_string(),
                price: session.price_per_player * session.max_players as i64,
                payment_status: Some("pending".to_string()),
            };
            state.bookings.push(booking);
            converted_to_booking = true;
        }

        Ok(JoinOutcome {
            session_id: session_id.to_string(),
            joined: true,
            reason: None,
            converted_to_booking,
        })
    }
}
