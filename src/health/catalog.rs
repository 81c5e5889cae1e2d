//! Nutrients the app knows how to read, with their canonical units.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Nutrient {
    Carbs,
    Protein,
    Fats,
    Calories,
    Hydration,
}

impl Nutrient {
    pub const ALL: [Nutrient; 5] = [
        Nutrient::Carbs,
        Nutrient::Protein,
        Nutrient::Fats,
        Nutrient::Calories,
        Nutrient::Hydration,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Carbs => "carbs",
            Self::Protein => "protein",
            Self::Fats => "fats",
            Self::Calories => "calories",
            Self::Hydration => "hydration",
        }
    }

    /// Unit that stored amounts are expressed in.
    pub fn unit(self) -> &'static str {
        match self {
            Self::Carbs | Self::Protein | Self::Fats => "g",
            Self::Calories => "kcal",
            Self::Hydration => "L",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|n| n.name() == name)
    }

    /// Human-readable amount: grams and kcal without decimals, water in mL.
    pub fn format_amount(self, amount: f64) -> String {
        match self {
            Self::Carbs | Self::Protein | Self::Fats => format!("{:.0}g", amount),
            Self::Calories => format!("{:.0} kcal", amount),
            Self::Hydration => format!("{:.0} mL", amount * 1000.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for n in Nutrient::ALL {
            assert_eq!(Nutrient::from_name(n.name()), Some(n));
        }
        assert_eq!(Nutrient::from_name("sodium"), None);
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(Nutrient::Carbs.format_amount(65.4), "65g");
        assert_eq!(Nutrient::Calories.format_amount(1850.0), "1850 kcal");
        assert_eq!(Nutrient::Hydration.format_amount(1.25), "1250 mL");
    }
}
