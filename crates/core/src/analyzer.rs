//! Deterministic pre-filter over raw user text.
//!
//! Tiered pattern tables map free text to best-effort guesses for time slot,
//! location, skill level, search intent, player count, urgency, and price
//! sensitivity. Confidence reflects which tier matched (complex phrase >
//! specific clock range > generic period > nothing); there is no failure
//! path, only low-confidence defaults. The analyzer is a cheap pre-filter
//! kept behind this narrow interface so a real classifier could replace it
//! without touching callers.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::context::PriceRange;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeSlot {
    WeekendMorning,
    WeekendAfternoon,
    WeekendEvening,
    WeekendAnytime,
    WeekdayAnytime,
    TomorrowMorning,
    TomorrowAfternoon,
    TomorrowEvening,
    TonightEarly,
    TonightPrime,
    AfterWork,
    LunchTime,
    MorningEarly,
    MorningLate,
    AfternoonEarly,
    AfternoonLate,
    EveningEarly,
    EveningPrime,
    Night,
    MorningGeneral,
    AfternoonGeneral,
    EveningGeneral,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimeRange {
    pub display: &'static str,
    pub range: &'static str,
    pub duration: &'static str,
}

impl TimeSlot {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WeekendMorning => "weekend_morning",
            Self::WeekendAfternoon => "weekend_afternoon",
            Self::WeekendEvening => "weekend_evening",
            Self::WeekendAnytime => "weekend_anytime",
            Self::WeekdayAnytime => "weekday_anytime",
            Self::TomorrowMorning => "tomorrow_morning",
            Self::TomorrowAfternoon => "tomorrow_afternoon",
            Self::TomorrowEvening => "tomorrow_evening",
            Self::TonightEarly => "tonight_early",
            Self::TonightPrime => "tonight_prime",
            Self::AfterWork => "after_work",
            Self::LunchTime => "lunch_time",
            Self::MorningEarly => "morning_early",
            Self::MorningLate => "morning_late",
            Self::AfternoonEarly => "afternoon_early",
            Self::AfternoonLate => "afternoon_late",
            Self::EveningEarly => "evening_early",
            Self::EveningPrime => "evening_prime",
            Self::Night => "night",
            Self::MorningGeneral => "morning_general",
            Self::AfternoonGeneral => "afternoon_general",
            Self::EveningGeneral => "evening_general",
        }
    }

    /// Display/search window for each slot. General periods carry a usable
    /// default window rather than forcing a clarifying question.
    pub fn time_range(&self) -> TimeRange {
        let (display, range, duration) = match self {
            Self::WeekendMorning => ("9-11 AM", "09:00-11:00", "2h"),
            Self::WeekendAfternoon => ("2-4 PM", "14:00-16:00", "2h"),
            Self::WeekendEvening => ("7-9 PM", "19:00-21:00", "2h"),
            Self::WeekendAnytime => ("Anytime (Sat-Sun)", "08:00-22:00", "flexible"),
            Self::WeekdayAnytime => ("Anytime (Mon-Fri)", "06:00-23:00", "flexible"),
            Self::TomorrowMorning => ("9-11 AM", "09:00-11:00", "2h"),
            Self::TomorrowAfternoon => ("2-4 PM", "14:00-16:00", "2h"),
            Self::TomorrowEvening => ("7-9 PM", "19:00-21:00", "2h"),
            Self::TonightEarly => ("6-7 PM", "18:00-19:00", "1h"),
            Self::TonightPrime => ("8-9 PM", "20:00-21:00", "1h"),
            Self::AfterWork => ("6-7 PM", "18:00-19:00", "1h"),
            Self::LunchTime => ("12-1 PM", "12:00-13:00", "1h"),
            Self::MorningEarly => ("7-9 AM", "07:00-09:00", "2h"),
            Self::MorningLate => ("9-11 AM", "09:00-11:00", "2h"),
            Self::AfternoonEarly => ("12-2 PM", "12:00-14:00", "2h"),
            Self::AfternoonLate => ("3-5 PM", "15:00-17:00", "2h"),
            Self::EveningEarly => ("6-7 PM", "18:00-19:00", "1h"),
            Self::EveningPrime => ("8-9 PM", "20:00-21:00", "1h"),
            Self::Night => ("9-11 PM", "21:00-23:00", "2h"),
            Self::MorningGeneral => ("9-11 AM", "09:00-11:00", "2h"),
            Self::AfternoonGeneral => ("2-4 PM", "14:00-16:00", "2h"),
            Self::EveningGeneral => ("7-9 PM", "19:00-21:00", "2h"),
        };
        TimeRange { display, range, duration }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TimeSlotGuess {
    pub time_slot: Option<TimeSlot>,
    pub confidence: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LocationGuess {
    pub location: String,
    pub confidence: f32,
    pub clarification: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SkillGuess {
    pub skill_level: String,
    pub confidence: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchIntent {
    Players,
    Courts,
    Both,
    Unclear,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Immediate,
    Flexible,
    Scheduled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSensitivity {
    Budget,
    Premium,
    Any,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PricingGuess {
    pub price_range: Option<PriceRange>,
    pub sensitivity: PriceSensitivity,
}

#[derive(Clone, Debug, PartialEq)]
pub struct InputAnalysis {
    pub time: TimeSlotGuess,
    pub location: LocationGuess,
    pub skill_level: SkillGuess,
    pub intent: SearchIntent,
    pub player_count: Option<u32>,
    pub urgency: Urgency,
    pub pricing: PricingGuess,
    pub input_length: usize,
    pub is_greeting: bool,
    pub is_help: bool,
}

pub const DEFAULT_LOCATION: &str = "jakarta_area";

pub struct InputAnalyzer {
    // Checked in tier order; the first hit wins, so broad weekend/weekday
    // forms sit after their period-specific variants.
    complex_time: Vec<(TimeSlot, Regex)>,
    smart_time: Vec<(TimeSlot, Regex)>,
    general_time: Vec<(TimeSlot, Regex)>,
    areas: Vec<(&'static str, Regex)>,
    jakarta: Regex,
    anywhere: Regex,
    skills: Vec<(&'static str, Regex)>,
    player_keywords: Regex,
    court_keywords: Regex,
    player_counts: Vec<(Regex, u32)>,
    immediate: Regex,
    flexible: Regex,
    budget: Regex,
    premium: Regex,
    explicit_price: Regex,
    greeting: Regex,
    help: Regex,
}

impl Default for InputAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl InputAnalyzer {
    pub fn new() -> Self {
        let table = |entries: &[(TimeSlot, &str)]| -> Vec<(TimeSlot, Regex)> {
            entries.iter().map(|(slot, pattern)| (*slot, compile(pattern))).collect()
        };

        Self {
            complex_time: table(&[
                (TimeSlot::WeekendMorning, r"\b(weekend\s*morning|saturday\s*morning|sunday\s*morning|weekend.*morning|morning.*weekend)\b"),
                (TimeSlot::WeekendAfternoon, r"\b(weekend\s*afternoon|saturday\s*afternoon|sunday\s*afternoon|weekend.*afternoon|afternoon.*weekend)\b"),
                (TimeSlot::WeekendEvening, r"\b(weekend\s*evening|saturday\s*evening|sunday\s*evening|weekend.*evening|evening.*weekend)\b"),
                (TimeSlot::WeekendAnytime, r"\b(weekend|this\s*weekend|saturday|sunday)\b"),
                (TimeSlot::WeekdayAnytime, r"\b(weekday|weekdays|monday|tuesday|wednesday|thursday|friday)\b"),
                (TimeSlot::TomorrowMorning, r"\b(tomorrow\s*morning|morning.*tomorrow)\b"),
                (TimeSlot::TomorrowAfternoon, r"\b(tomorrow\s*afternoon|afternoon.*tomorrow)\b"),
                (TimeSlot::TomorrowEvening, r"\b(tomorrow\s*evening|evening.*tomorrow)\b"),
                (TimeSlot::TonightEarly, r"\b(tonight.*early|early.*tonight|tonight.*6|tonight.*7)\b"),
                (TimeSlot::TonightPrime, r"\b(tonight|this\s*evening)\b"),
                (TimeSlot::AfterWork, r"\b(after\s*work|setelah\s*kerja|pulang\s*kerja)\b"),
                (TimeSlot::LunchTime, r"\b(lunch\s*time|makan\s*siang|siang\s*hari)\b"),
            ]),
            smart_time: table(&[
                (TimeSlot::MorningEarly, r"\b(early\s*morning|6\s*am|7\s*am|8\s*am)\b"),
                (TimeSlot::MorningLate, r"\b(late\s*morning|9\s*am|10\s*am|11\s*am)\b"),
                (TimeSlot::AfternoonEarly, r"\b(12\s*pm|1\s*pm|2\s*pm)\b"),
                (TimeSlot::AfternoonLate, r"\b(3\s*pm|4\s*pm|5\s*pm)\b"),
                (TimeSlot::EveningEarly, r"\b(6\s*pm|7\s*pm)\b"),
                (TimeSlot::EveningPrime, r"\b(8\s*pm|9\s*pm)\b"),
                (TimeSlot::Night, r"\b(10\s*pm|11\s*pm|late)\b"),
            ]),
            general_time: table(&[
                (TimeSlot::MorningGeneral, r"\b(morning|pagi)\b"),
                (TimeSlot::AfternoonGeneral, r"\b(afternoon|siang)\b"),
                (TimeSlot::EveningGeneral, r"\b(evening|sore|malam)\b"),
            ]),
            areas: vec![
                ("Jakarta Barat", compile(r"\b(jakarta barat|west jakarta|kebon jeruk|kedoya|grogol|cengkareng)\b")),
                ("Jakarta Selatan", compile(r"\b(jakarta selatan|south jakarta|pondok indah|kebayoran)\b")),
                ("Jakarta Pusat", compile(r"\b(jakarta pusat|central jakarta|menteng|tanah abang|gambir)\b")),
                ("Jakarta Timur", compile(r"\b(jakarta timur|east jakarta|rawamangun|cakung)\b")),
                ("Jakarta Utara", compile(r"\b(jakarta utara|north jakarta|ancol|sunter|pluit)\b")),
                ("Senayan", compile(r"\b(senayan|gelora|sudirman)\b")),
                ("Kemang", compile(r"\b(kemang|radio dalam|ampera)\b")),
                ("Kelapa Gading", compile(r"\b(kelapa gading|gading|mall of indonesia)\b")),
                ("Pondok Indah", compile(r"\b(pondok indah|pim|lebak bulus)\b")),
            ],
            jakarta: compile(r"\b(jakarta|jkt)\b"),
            anywhere: compile(r"\b(anywhere|any|wherever|doesn't matter)\b"),
            skills: vec![
                ("beginner", compile(r"\b(beginner|pemula|newbie|new|basic|learning|starter)\b")),
                ("intermediate", compile(r"\b(intermediate|menengah|medium|average|decent|okay|ok)\b")),
                ("advanced", compile(r"\b(advanced|expert|pro|professional|mahir|skilled|experienced)\b")),
            ],
            player_keywords: compile(r"\b(player|partner|teammate|friend|people|person|join|match me|find me a)\b"),
            court_keywords: compile(r"\b(court|venue|book|reserve|available|facility|place to play)\b"),
            player_counts: vec![
                (compile(r"\b(one|1)\s+(player|person|partner)\b"), 1),
                (compile(r"\b(two|2)\s+(players|people|partners)\b"), 2),
                (compile(r"\b(three|3)\s+(players|people|partners)\b"), 3),
                (compile(r"\b(four|4)\s+(players|people|partners)\b"), 4),
                (compile(r"\bfull\s+(game|match|court)\b"), 4),
                (compile(r"\bdoubles?\b"), 4),
            ],
            immediate: compile(r"\b(now|asap|immediately|urgent|right now|today)\b"),
            flexible: compile(r"\b(whenever|flexible|any time|doesn't matter when)\b"),
            budget: compile(r"\b(cheap|budget|affordable|murah|hemat|economical)\b"),
            premium: compile(r"\b(premium|expensive|luxury|high-end|best|top)\b"),
            explicit_price: compile(r"\b(\d+)(k)?\s*(rupiah|rp|ribu)?\b"),
            greeting: compile(r"\b(hi|hello|hey|halo|hai)\b"),
            help: compile(r"\b(help|bantuan|what can you do)\b"),
        }
    }

    pub fn analyze(&self, input: &str) -> InputAnalysis {
        let normalized = input.to_lowercase();
        InputAnalysis {
            time: self.analyze_time(&normalized),
            location: self.analyze_location(&normalized),
            skill_level: self.analyze_skill(&normalized),
            intent: self.detect_search_intent(&normalized),
            player_count: self.extract_player_count(&normalized),
            urgency: self.detect_urgency(&normalized),
            pricing: self.analyze_price_sensitivity(&normalized),
            input_length: input.trim().len(),
            is_greeting: self.greeting.is_match(&normalized),
            is_help: self.help.is_match(&normalized),
        }
    }

    pub fn analyze_time(&self, normalized: &str) -> TimeSlotGuess {
        for (slot, pattern) in &self.complex_time {
            if pattern.is_match(normalized) {
                return TimeSlotGuess { time_slot: Some(*slot), confidence: 0.9 };
            }
        }
        for (slot, pattern) in &self.smart_time {
            if pattern.is_match(normalized) {
                return TimeSlotGuess { time_slot: Some(*slot), confidence: 0.8 };
            }
        }
        for (slot, pattern) in &self.general_time {
            if pattern.is_match(normalized) {
                return TimeSlotGuess { time_slot: Some(*slot), confidence: 0.7 };
            }
        }
        TimeSlotGuess { time_slot: None, confidence: 0.1 }
    }

    pub fn analyze_location(&self, normalized: &str) -> LocationGuess {
        for (area, pattern) in &self.areas {
            if pattern.is_match(normalized) {
                return LocationGuess {
                    location: (*area).to_string(),
                    confidence: 0.9,
                    clarification: None,
                };
            }
        }

        if self.jakarta.is_match(normalized) {
            return LocationGuess {
                location: DEFAULT_LOCATION.to_string(),
                confidence: 0.7,
                clarification: Some(
                    "Which area of Jakarta do you prefer? (e.g., Senayan, Kemang, Kelapa Gading)"
                        .to_string(),
                ),
            };
        }

        if self.anywhere.is_match(normalized) {
            return LocationGuess {
                location: DEFAULT_LOCATION.to_string(),
                confidence: 0.8,
                clarification: None,
            };
        }

        LocationGuess {
            location: DEFAULT_LOCATION.to_string(),
            confidence: 0.5,
            clarification: Some("Which area would you prefer?".to_string()),
        }
    }

    pub fn analyze_skill(&self, normalized: &str) -> SkillGuess {
        for (skill, pattern) in &self.skills {
            if pattern.is_match(normalized) {
                return SkillGuess { skill_level: (*skill).to_string(), confidence: 0.9 };
            }
        }
        // Default assumption; low confidence keeps it out of search filters.
        SkillGuess { skill_level: "intermediate".to_string(), confidence: 0.3 }
    }

    pub fn detect_search_intent(&self, normalized: &str) -> SearchIntent {
        let wants_players = self.player_keywords.is_match(normalized);
        let wants_courts = self.court_keywords.is_match(normalized);
        match (wants_players, wants_courts) {
            (true, true) => SearchIntent::Both,
            (true, false) => SearchIntent::Players,
            (false, true) => SearchIntent::Courts,
            (false, false) => SearchIntent::Unclear,
        }
    }

    pub fn extract_player_count(&self, normalized: &str) -> Option<u32> {
        self.player_counts
            .iter()
            .find(|(pattern, _)| pattern.is_match(normalized))
            .map(|(_, count)| *count)
    }

    pub fn detect_urgency(&self, normalized: &str) -> Urgency {
        if self.immediate.is_match(normalized) {
            Urgency::Immediate
        } else if self.flexible.is_match(normalized) {
            Urgency::Flexible
        } else {
            Urgency::Scheduled
        }
    }

    pub fn analyze_price_sensitivity(&self, normalized: &str) -> PricingGuess {
        if self.budget.is_match(normalized) {
            return PricingGuess {
                price_range: Some(PriceRange { min: 0, max: 150_000 }),
                sensitivity: PriceSensitivity::Budget,
            };
        }

        if self.premium.is_match(normalized) {
            return PricingGuess {
                price_range: Some(PriceRange { min: 200_000, max: 500_000 }),
                sensitivity: PriceSensitivity::Premium,
            };
        }

        if let Some(captures) = self.explicit_price.captures(normalized) {
            if let Ok(amount) = captures[1].parse::<i64>() {
                let amount = if captures.get(2).is_some() { amount * 1_000 } else { amount };
                return PricingGuess {
                    price_range: Some(PriceRange {
                        min: amount * 8 / 10,
                        max: amount * 12 / 10,
                    }),
                    sensitivity: PriceSensitivity::Any,
                };
            }
        }

        PricingGuess { price_range: None, sensitivity: PriceSensitivity::Any }
    }
}

fn compile(pattern: &str) -> Regex {
    // Patterns are static; a malformed one is a programming error caught by
    // the constructor tests below.
    Regex::new(pattern).unwrap_or_else(|error| panic!("invalid analyzer pattern: {error}"))
}

#[cfg(test)]
mod tests {
    use super::{
        InputAnalyzer, PriceSensitivity, SearchIntent, TimeSlot, Urgency, DEFAULT_LOCATION,
    };

    #[test]
    fn complex_time_phrases_hit_the_top_tier() {
        let analyzer = InputAnalyzer::new();

        let cases = [
            ("any courts this weekend morning?", TimeSlot::WeekendMorning),
            ("tomorrow evening works for me", TimeSlot::TomorrowEvening),
            ("somewhere after work please", TimeSlot::AfterWork),
            ("tonight would be great", TimeSlot::TonightPrime),
        ];

        for (input, expected) in cases {
            let guess = analyzer.analyze(input).time;
            assert_eq!(guess.time_slot, Some(expected), "input: {input}");
            assert!(guess.confidence >= 0.9, "input: {input}");
        }
    }

    #[test]
    fn period_specific_weekend_beats_bare_weekend() {
        let analyzer = InputAnalyzer::new();
        assert_eq!(
            analyzer.analyze("saturday morning game").time.time_slot,
            Some(TimeSlot::WeekendMorning)
        );
        assert_eq!(
            analyzer.analyze("free on saturday").time.time_slot,
            Some(TimeSlot::WeekendAnytime)
        );
    }

    #[test]
    fn clock_ranges_and_generic_periods_use_lower_tiers() {
        let analyzer = InputAnalyzer::new();

        let smart = analyzer.analyze("can we play at 8 pm").time;
        assert_eq!(smart.time_slot, Some(TimeSlot::EveningPrime));
        assert!((smart.confidence - 0.8).abs() < f32::EPSILON);

        let general = analyzer.analyze("morning would suit me").time;
        assert_eq!(general.time_slot, Some(TimeSlot::MorningGeneral));
        assert!((general.confidence - 0.7).abs() < f32::EPSILON);

        let none = analyzer.analyze("looking for a padel game").time;
        assert_eq!(none.time_slot, None);
        assert!(none.confidence <= 0.1 + f32::EPSILON);
    }

    #[test]
    fn every_time_slot_maps_to_a_search_window() {
        let slots = [
            TimeSlot::WeekendMorning,
            TimeSlot::WeekendAnytime,
            TimeSlot::TonightPrime,
            TimeSlot::LunchTime,
            TimeSlot::Night,
            TimeSlot::EveningGeneral,
        ];
        for slot in slots {
            let range = slot.time_range();
            assert!(!range.display.is_empty());
            assert!(!range.range.is_empty());
        }
    }

    #[test]
    fn locations_resolve_specific_areas_then_fall_back() {
        let analyzer = InputAnalyzer::new();

        let specific = analyzer.analyze("courts near kemang tonight");
        assert_eq!(specific.location.location, "Kemang");
        assert!(specific.location.confidence >= 0.9);

        let generic = analyzer.analyze("somewhere in jakarta");
        assert_eq!(generic.location.location, DEFAULT_LOCATION);
        assert!(generic.location.clarification.is_some());

        let anywhere = analyzer.analyze("anywhere is fine");
        assert_eq!(anywhere.location.location, DEFAULT_LOCATION);
        assert!(anywhere.location.clarification.is_none());
    }

    #[test]
    fn skill_keywords_include_indonesian_synonyms() {
        let analyzer = InputAnalyzer::new();

        assert_eq!(analyzer.analyze("saya pemula").skill_level.skill_level, "beginner");
        assert_eq!(analyzer.analyze("an expert partner").skill_level.skill_level, "advanced");

        let fallback = analyzer.analyze("find me a game").skill_level;
        assert_eq!(fallback.skill_level, "intermediate");
        assert!(fallback.confidence <= 0.3 + f32::EPSILON);
    }

    #[test]
    fn search_intent_distinguishes_players_courts_and_both() {
        let analyzer = InputAnalyzer::new();

        assert_eq!(analyzer.analyze("find me a partner").intent, SearchIntent::Players);
        assert_eq!(analyzer.analyze("book a court").intent, SearchIntent::Courts);
        assert_eq!(
            analyzer.analyze("a partner and a court to book").intent,
            SearchIntent::Both
        );
        assert_eq!(analyzer.analyze("padel tomorrow").intent, SearchIntent::Unclear);
    }

    #[test]
    fn player_count_and_urgency_extraction() {
        let analyzer = InputAnalyzer::new();

        assert_eq!(analyzer.analyze("need 2 players").player_count, Some(2));
        assert_eq!(analyzer.analyze("doubles tonight").player_count, Some(4));
        assert_eq!(analyzer.analyze("a quiet game").player_count, None);

        assert_eq!(analyzer.analyze("right now please").urgency, Urgency::Immediate);
        assert_eq!(analyzer.analyze("whenever works").urgency, Urgency::Flexible);
        assert_eq!(analyzer.analyze("next saturday").urgency, Urgency::Scheduled);
    }

    #[test]
    fn price_sensitivity_tiers_and_explicit_amounts() {
        let analyzer = InputAnalyzer::new();

        let budget = analyzer.analyze("something murah").pricing;
        assert_eq!(budget.sensitivity, PriceSensitivity::Budget);
        assert_eq!(budget.price_range.map(|range| range.max), Some(150_000));

        let premium = analyzer.analyze("a premium court").pricing;
        assert_eq!(premium.sensitivity, PriceSensitivity::Premium);

        let explicit = analyzer.analyze("around 150k rupiah").pricing;
        let range = explicit.price_range.expect("explicit price should yield a band");
        assert_eq!(range.min, 120_000);
        assert_eq!(range.max, 180_000);
    }

    #[test]
    fn greeting_and_help_flags() {
        let analyzer = InputAnalyzer::new();

        assert!(analyzer.analyze("halo!").is_greeting);
        assert!(analyzer.analyze("what can you do").is_help);
        let plain = analyzer.analyze("find courts in senayan");
        assert!(!plain.is_greeting);
        assert!(!plain.is_help);
    }
}
