//! Static daily plans and performance-nutrition tips.

use chrono::{DateTime, Duration as ChronoDuration, Timelike, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanCategory {
    Nutrition,
    Fitness,
    MentalHealth,
}

impl PlanCategory {
    pub const ALL: [PlanCategory; 3] = [
        PlanCategory::Nutrition,
        PlanCategory::Fitness,
        PlanCategory::MentalHealth,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Nutrition => "nutrition",
            Self::Fitness => "fitness",
            Self::MentalHealth => "mental_health",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "nutrition" => Some(Self::Nutrition),
            "fitness" => Some(Self::Fitness),
            "mental_health" | "mental" => Some(Self::MentalHealth),
            _ => None,
        }
    }

    fn template(self) -> &'static [(i64, &'static str, &'static str)] {
        match self {
            Self::Nutrition => &[
                (0, "Breakfast", "Oatmeal with fruits and nuts"),
                (4, "Lunch", "Grilled chicken salad"),
                (8, "Dinner", "Salmon with vegetables"),
            ],
            Self::Fitness => &[
                (0, "Morning Workout", "30 min cardio + strength training"),
                (6, "Mobility", "15 min stretching routine"),
                (10, "Evening Walk", "20 min walking"),
            ],
            Self::MentalHealth => &[
                (0, "Morning Meditation", "10 min mindfulness practice"),
                (5, "Journaling", "Daily reflection and gratitude"),
                (9, "Evening Relaxation", "Breathing exercises"),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DayPart {
    Morning,
    Afternoon,
    Evening,
}

impl DayPart {
    pub fn of(t: DateTime<Utc>) -> Self {
        match t.hour() {
            5..=11 => Self::Morning,
            12..=16 => Self::Afternoon,
            _ => Self::Evening,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanItem {
    pub time: DateTime<Utc>,
    pub day_part: DayPart,
    pub title: &'static str,
    pub description: &'static str,
}

/// Plan items for a category, scheduled at fixed hour offsets from `start`.
pub fn plans_for(category: PlanCategory, start: DateTime<Utc>) -> Vec<PlanItem> {
    category
        .template()
        .iter()
        .map(|&(hours, title, description)| {
            let time = start + ChronoDuration::hours(hours);
            PlanItem {
                time,
                day_part: DayPart::of(time),
                title,
                description,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Recommendation {
    pub phase: &'static str,
    pub advice: &'static str,
    pub icon: &'static str,
}

pub const PERFORMANCE_RECOMMENDATIONS: [Recommendation; 4] = [
    Recommendation {
        phase: "Pre-Workout",
        advice: "Consume complex carbs 2-3 hours before",
        icon: "figure.run",
    },
    Recommendation {
        phase: "During Activity",
        advice: "Stay hydrated, electrolyte balance",
        icon: "drop.fill",
    },
    Recommendation {
        phase: "Post-Workout",
        advice: "Protein within 30 minutes",
        icon: "figure.cooldown",
    },
    Recommendation {
        phase: "Recovery",
        advice: "Balance macros for optimal recovery",
        icon: "heart.fill",
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_plans_offsets_and_day_parts() {
        let start = Utc.with_ymd_and_hms(2024, 11, 7, 9, 0, 0).unwrap();
        let plans = plans_for(PlanCategory::Nutrition, start);

        let titles: Vec<&str> = plans.iter().map(|p| p.title).collect();
        assert_eq!(titles, vec!["Breakfast", "Lunch", "Dinner"]);
        assert_eq!(plans[1].time, start + ChronoDuration::hours(4));
        assert_eq!(plans[0].day_part, DayPart::Morning);
        assert_eq!(plans[1].day_part, DayPart::Afternoon);
        assert_eq!(plans[2].day_part, DayPart::Evening);
    }

    #[test]
    fn test_parse_category() {
        for c in PlanCategory::ALL {
            assert!(!plans_for(c, Utc::now()).is_empty());
        }
        assert_eq!(PlanCategory::parse("mental_health"), Some(PlanCategory::MentalHealth));
        assert_eq!(PlanCategory::parse("sleep"), None);
    }
}
