use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use mabar_baas::{BookingWindow, MatchStore, PlayerFilters, SessionFilters, VenueFilters};
use mabar_core::{AccumulatedInfo, CurrentUser, ToolboxAction, ToolboxResult};

/// Executes catalogued data-access operations against the match store.
///
/// Failure policy: store exceptions are caught here and downgraded to an
/// error-bearing empty result; callers always get a `ToolboxResult` they can
/// present, never a typed error. Operations acting on a user's behalf
/// degrade to a requires-auth result when no user is attached.
pub struct Toolbox {
    store: Arc<dyn MatchStore>,
    default_location: String,
}

impl Toolbox {
    pub fn new(store: Arc<dyn MatchStore>, default_location: impl Into<String>) -> Self {
        Self { store, default_location: default_location.into() }
    }

    pub async fn execute(
        &self,
        action: ToolboxAction,
        info: &AccumulatedInfo,
        raw_params: &Value,
        user: Option<&CurrentUser>,
    ) -> ToolboxResult {
        info!(
            event_name = "toolbox.action.requested",
            action = action.as_str(),
            authenticated = user.is_some(),
            "executing toolbox action"
        );

        let result = match action {
            ToolboxAction::GetAvailableVenues => self.get_available_venues(info).await,
            ToolboxAction::GetAvailablePlayers => self.get_available_players(info).await,
            ToolboxAction::FindOpenSessions => self.find_open_sessions(info).await,
            ToolboxAction::CreateNewSession => self.create_new_session(info, user).await,
            ToolboxAction::GetVenueDetails => self.get_venue_details(info, raw_params).await,
            ToolboxAction::CheckVenueAvailability => {
                self.check_venue_availability(info, raw_params).await
            }
            ToolboxAction::GetPersonalizedRecommendations => {
                self.get_personalized_recommendations(info, user).await
            }
            ToolboxAction::GetUserBookings => {
                self.bookings_for(user, BookingWindow::Upcoming).await
            }
            ToolboxAction::GetBookingHistory => {
                self.bookings_for(user, BookingWindow::History).await
            }
            ToolboxAction::ModifyBooking => modify_booking_stub(),
            ToolboxAction::JoinSession => self.join_session(raw_params, user).await,
            ToolboxAction::NeedMoreInfo => {
                ToolboxResult::need_more_info(text_param(raw_params, &["message"]))
            }
        };

        if let Some(error) = &result.error {
            warn!(
                event_name = "toolbox.action.degraded",
                action = action.as_str(),
                error = %error,
                "toolbox action degraded to an error-bearing result"
            );
        }
        result
    }

    fn venue_filters(&self, info: &AccumulatedInfo) -> VenueFilters {
        VenueFilters {
            location: info
                .location
                .clone()
                .or_else(|| Some(self.default_location.clone())),
            price_range: info.price_range,
            ..VenueFilters::default()
        }
    }

    async fn get_available_venues(&self, info: &AccumulatedInfo) -> ToolboxResult {
        match self.store.find_venues(&self.venue_filters(info)).await {
            Ok(venues) => ToolboxResult { venues, ..ToolboxResult::default() }.with_totals(),
            Err(error) => ToolboxResult::service_error(error.to_string()),
        }
    }

    async fn get_available_players(&self, info: &AccumulatedInfo) -> ToolboxResult {
        let filters = PlayerFilters {
            skill_level: info.skill_level.clone(),
            location: info.location.clone(),
            time: info.time_slot.clone().or_else(|| info.time.clone()),
            gender: info.gender.clone(),
            game_type: info.game_type.clone(),
        };

        match self.store.find_players(&filters).await {
            Ok(players) => ToolboxResult { players, ..ToolboxResult::default() }.with_totals(),
            Err(error) => ToolboxResult::service_error(error.to_string()),
        }
    }

    async fn find_open_sessions(&self, info: &AccumulatedInfo) -> ToolboxResult {
        let filters = SessionFilters {
            skill_level: info.skill_level.clone(),
            location: info.location.clone(),
            time_slot: info.time_slot.clone().or_else(|| info.time.clone()),
            date: info.date.clone(),
        };

        match self.store.find_open_sessions(&filters).await {
            Ok(sessions) => {
                ToolboxResult { sessions, ..ToolboxResult::default() }.with_totals()
            }
            Err(error) => ToolboxResult::service_error(error.to_string()),
        }
    }

    /// Proposes venues for a new session; the session record itself is only
    /// created once the user confirms through the join flow.
    async fn create_new_session(
        &self,
        info: &AccumulatedInfo,
        user: Option<&CurrentUser>,
    ) -> ToolboxResult {
        if user.is_none() {
            return ToolboxResult::auth_required();
        }

        match self.store.find_venues(&self.venue_filters(info)).await {
            Ok(venues) => ToolboxResult {
                venues,
                message: Some("Ready to create a session with the details provided".to_string()),
                ..ToolboxResult::default()
            }
            .with_totals(),
            Err(error) => ToolboxResult::service_error(error.to_string()),
        }
    }

    async fn get_venue_details(&self, info: &AccumulatedInfo, raw_params: &Value) -> ToolboxResult {
        let venue_id = text_param(raw_params, &["venueId", "venue_id", "id"]);
        let venue_name =
            text_param(raw_params, &["venueName", "venue_name"]).or_else(|| info.venue.clone());

        if venue_id.is_none() && venue_name.is_none() {
            return ToolboxResult::service_error("Venue not specified");
        }

        match self
            .store
            .venue_details(venue_id.as_deref(), venue_name.as_deref())
            .await
        {
            Ok(Some(venue)) => ToolboxResult {
                venues: vec![venue.clone()],
                venue_detail: Some(venue),
                ..ToolboxResult::default()
            }
            .with_totals(),
            Ok(None) => ToolboxResult::service_error("Venue not found"),
            Err(error) => ToolboxResult::service_error(error.to_string()),
        }
    }

    async fn check_venue_availability(
        &self,
        info: &AccumulatedInfo,
        raw_params: &Value,
    ) -> ToolboxResult {
        let venue_id = text_param(raw_params, &["venueId", "venue_id", "id"]);
        let date = info.date.clone().or_else(|| text_param(raw_params, &["date"]));
        let time = info
            .time
            .clone()
            .or_else(|| info.time_slot.clone())
            .or_else(|| text_param(raw_params, &["time"]));

        let (Some(venue_id), Some(date), Some(time)) = (venue_id, date, time) else {
            return ToolboxResult::service_error("Missing venue, date, or time information");
        };

        match self.store.venue_availability(&venue_id, &date, &time).await {
            Ok(availability) => {
                ToolboxResult { availability: Some(availability), ..ToolboxResult::default() }
            }
            Err(error) => ToolboxResult::service_error(error.to_string()),
        }
    }

    /// Profile preferences override missing filters, then the comprehensive
    /// venue/player/session sweep runs with the personalized set.
    async fn get_personalized_recommendations(
        &self,
        info: &AccumulatedInfo,
        user: Option<&CurrentUser>,
    ) -> ToolboxResult {
        let Some(user) = user else {
            return ToolboxResult::auth_required();
        };

        let mut personalized = info.clone();
        match self.store.player_profile(user).await {
            Ok(Some(preferences)) => {
                if personalized.skill_level.is_none() {
                    personalized.skill_level = preferences.skill_level;
                }
                if personalized.location.is_none() {
                    personalized.location = preferences.preferred_areas.first().cloned();
                }
                if personalized.price_range.is_none() {
                    personalized.price_range = preferences.budget_range;
                }
            }
            Ok(None) => {}
            Err(error) => return ToolboxResult::service_error(error.to_string()),
        }

        self.comprehensive_search(&personalized).await
    }

    async fn comprehensive_search(&self, info: &AccumulatedInfo) -> ToolboxResult {
        let venue_filters = self.venue_filters(info);
        let player_filters = PlayerFilters {
            skill_level: info.skill_level.clone(),
            location: info.location.clone(),
            time: info.time_slot.clone().or_else(|| info.time.clone()),
            gender: info.gender.clone(),
            game_type: info.game_type.clone(),
        };
        let session_filters = SessionFilters {
            skill_level: info.skill_level.clone(),
            location: info.location.clone(),
            time_slot: info.time_slot.clone().or_else(|| info.time.clone()),
            date: info.date.clone(),
        };

        let (venues, players, sessions) = tokio::join!(
            self.store.find_venues(&venue_filters),
            self.store.find_players(&player_filters),
            self.store.find_open_sessions(&session_filters),
        );

        match (venues, players, sessions) {
            (Ok(venues), Ok(players), Ok(sessions)) => {
                ToolboxResult { venues, players, sessions, ..ToolboxResult::default() }
                    .with_totals()
            }
            (Err(error), ..) | (_, Err(error), _) | (.., Err(error)) => {
                ToolboxResult::service_error(error.to_string())
            }
        }
    }

    async fn bookings_for(
        &self,
        user: Option<&CurrentUser>,
        window: BookingWindow,
    ) -> ToolboxResult {
        let Some(user) = user else {
            return ToolboxResult::auth_required();
        };

        match self.store.user_bookings(user, window).await {
            Ok(bookings) => {
                ToolboxResult { bookings, ..ToolboxResult::default() }.with_totals()
            }
            Err(error) => ToolboxResult::service_error(error.to_string()),
        }
    }

    async fn join_session(&self, raw_params: &Value, user: Option<&CurrentUser>) -> ToolboxResult {
        let Some(user) = user else {
            return ToolboxResult::auth_required();
        };
        let Some(session_id) = text_param(raw_params, &["sessionId", "session_id", "id"]) else {
            return ToolboxResult::service_error("Session ID required");
        };

        match self.store.join_session(&session_id, user.roster_name()).await {
            Ok(outcome) => ToolboxResult { join: Some(outcome), ..ToolboxResult::default() },
            Err(error) => ToolboxResult::service_error(error.to_string()),
        }
    }
}

fn modify_booking_stub() -> ToolboxResult {
    ToolboxResult {
        message: Some("Booking modifications are not yet available through chat".to_string()),
        error: Some("Feature not implemented".to_string()),
        ..ToolboxResult::default()
    }
}

fn text_param(raw_params: &Value, keys: &[&str]) -> Option<String> {
    let map = raw_params.as_object()?;
    keys.iter()
        .find_map(|key| map.get(*key))
        .and_then(Value::as_str)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}
