use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: i64,
    pub max: i64,
}

/// The slot dictionary accumulated across conversation turns.
///
/// The model's extracted info arrives as loose JSON; `from_value` coerces the
/// known keys and drops everything else, so unvalidated fields never flow into
/// the toolbox. Merging is shallow: a newer filled slot overwrites an older
/// one, a missing slot leaves the old value alone.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AccumulatedInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_slot: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_range: Option<PriceRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub players: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urgency: Option<String>,
}

impl AccumulatedInfo {
    /// Coerce a loose JSON object into the known slot set. Accepts both
    /// camelCase (the model's output) and snake_case keys; non-string scalar
    /// values are stringified rather than rejected.
    pub fn from_value(value: &Value) -> Self {
        let Some(map) = value.as_object() else {
            return Self::default();
        };

        let text = |keys: &[&str]| -> Option<String> {
            keys.iter().find_map(|key| map.get(*key)).and_then(coerce_text)
        };

        let players = ["players", "playerCount", "player_count"]
            .iter()
            .find_map(|key| map.get(*key))
            .and_then(coerce_count);

        let price_range = ["priceRange", "price_range"]
            .iter()
            .find_map(|key| map.get(*key))
            .and_then(|raw| serde_json::from_value::<PriceRange>(raw.clone()).ok());

        Self {
            date: text(&["date"]),
            time: text(&["time"]),
            time_slot: text(&["timeSlot", "time_slot"]),
            location: text(&["location", "area"]),
            venue: text(&["venue", "venueName", "venue_name"]),
            skill_level: text(&["skillLevel", "skill_level", "skill"]),
            game_type: text(&["gameType", "game_type"]),
            budget: text(&["budget"]),
            price_range,
            players,
            gender: text(&["gender"]),
            urgency: text(&["urgency"]),
        }
    }

    /// Shallow merge: every filled slot of `newer` wins, last write takes the
    /// key. Unfilled slots in `newer` do not erase existing values.
    pub fn merge(&mut self, newer: AccumulatedInfo) {
        merge_slot(&mut self.date, newer.date);
        merge_slot(&mut self.time, newer.time);
        merge_slot(&mut self.time_slot, newer.time_slot);
        merge_slot(&mut self.location, newer.location);
        merge_slot(&mut self.venue, newer.venue);
        merge_slot(&mut self.skill_level, newer.skill_level);
        merge_slot(&mut self.game_type, newer.game_type);
        merge_slot(&mut self.budget, newer.budget);
        merge_slot(&mut self.price_range, newer.price_range);
        merge_slot(&mut self.players, newer.players);
        merge_slot(&mut self.gender, newer.gender);
        merge_slot(&mut self.urgency, newer.urgency);
    }

    pub fn filled_slots(&self) -> usize {
        usize::from(self.date.is_some())
            + usize::from(self.time.is_some())
            + usize::from(self.time_slot.is_some())
            + usize::from(self.location.is_some())
            + usize::from(self.venue.is_some())
            + usize::from(self.skill_level.is_some())
            + usize::from(self.game_type.is_some())
            + usize::from(self.budget.is_some())
            + usize::from(self.price_range.is_some())
            + usize::from(self.players.is_some())
            + usize::from(self.gender.is_some())
            + usize::from(self.urgency.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.filled_slots() == 0
    }

    pub fn has_time(&self) -> bool {
        self.date.is_some() || self.time.is_some() || self.time_slot.is_some()
    }

    pub fn has_location(&self) -> bool {
        self.location.is_some() || self.venue.is_some()
    }
}

fn merge_slot<T>(slot: &mut Option<T>, newer: Option<T>) {
    if newer.is_some() {
        *slot = newer;
    }
}

fn coerce_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn coerce_count(value: &Value) -> Option<u32> {
    match value {
        Value::Number(number) => number.as_u64().map(|count| count as u32),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Profile-derived preferences, merged into search filters for the
/// personalized-recommendation path.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserPreferences {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill_level: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub preferred_areas: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub playing_times: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_range: Option<PriceRange>,
}
