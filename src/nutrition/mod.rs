//! Nutrition facts for a predicted food label.
//!
//! A `NutritionRecord` carries six fixed nutrients. Each one is either an
//! amount taken from the remote food database or `Unavailable` (rendered as
//! "N/A") when the database has no matching food or the food lacks that
//! nutrient. Transport and decoding failures are errors, not sentinels.

mod usda;

use anyhow::Result;
use serde::Deserialize;
use std::fmt;

pub use usda::{UsdaClient, UsdaConfig, DEFAULT_USDA_TIMEOUT, DEFAULT_USDA_URL};

/// Rendered form of a nutrient that could not be determined.
pub const UNAVAILABLE: &str = "N/A";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Nutrient {
    Calories,
    Carbohydrates,
    Protein,
    Fat,
    Fiber,
    Sugar,
}

impl Nutrient {
    pub const ALL: [Nutrient; 6] = [
        Nutrient::Calories,
        Nutrient::Carbohydrates,
        Nutrient::Protein,
        Nutrient::Fat,
        Nutrient::Fiber,
        Nutrient::Sugar,
    ];

    /// Parameter / field name.
    pub fn key(self) -> &'static str {
        match self {
            Nutrient::Calories => "calories",
            Nutrient::Carbohydrates => "carbohydrates",
            Nutrient::Protein => "protein",
            Nutrient::Fat => "fat",
            Nutrient::Fiber => "fiber",
            Nutrient::Sugar => "sugar",
        }
    }

    /// Exact `nutrientName` used by the food database.
    pub fn remote_name(self) -> &'static str {
        match self {
            Nutrient::Calories => "Energy",
            Nutrient::Carbohydrates => "Carbohydrate, by difference",
            Nutrient::Protein => "Protein",
            Nutrient::Fat => "Total lipid (fat)",
            Nutrient::Fiber => "Fiber, total dietary",
            Nutrient::Sugar => "Sugars, total including NLEA",
        }
    }

    /// Human-readable heading.
    pub fn title(self) -> &'static str {
        match self {
            Nutrient::Calories => "Calories",
            Nutrient::Carbohydrates => "Carbohydrates",
            Nutrient::Protein => "Protein",
            Nutrient::Fat => "Fat",
            Nutrient::Fiber => "Fiber",
            Nutrient::Sugar => "Sugar",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum NutrientValue {
    Amount(f64),
    #[default]
    Unavailable,
}

impl NutrientValue {
    pub fn amount(self) -> Option<f64> {
        match self {
            NutrientValue::Amount(value) => Some(value),
            NutrientValue::Unavailable => None,
        }
    }

    pub fn is_available(self) -> bool {
        matches!(self, NutrientValue::Amount(_))
    }
}

impl fmt::Display for NutrientValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NutrientValue::Amount(value) => write!(f, "{}", value),
            NutrientValue::Unavailable => f.write_str(UNAVAILABLE),
        }
    }
}

/// Six-field nutrient summary for one prediction.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NutritionRecord {
    pub calories: NutrientValue,
    pub carbohydrates: NutrientValue,
    pub protein: NutrientValue,
    pub fat: NutrientValue,
    pub fiber: NutrientValue,
    pub sugar: NutrientValue,
}

impl NutritionRecord {
    /// Every nutrient set to the sentinel.
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn get(&self, nutrient: Nutrient) -> NutrientValue {
        match nutrient {
            Nutrient::Calories => self.calories,
            Nutrient::Carbohydrates => self.carbohydrates,
            Nutrient::Protein => self.protein,
            Nutrient::Fat => self.fat,
            Nutrient::Fiber => self.fiber,
            Nutrient::Sugar => self.sugar,
        }
    }

    pub fn set(&mut self, nutrient: Nutrient, value: NutrientValue) {
        let slot = match nutrient {
            Nutrient::Calories => &mut self.calories,
            Nutrient::Carbohydrates => &mut self.carbohydrates,
            Nutrient::Protein => &mut self.protein,
            Nutrient::Fat => &mut self.fat,
            Nutrient::Fiber => &mut self.fiber,
            Nutrient::Sugar => &mut self.sugar,
        };
        *slot = value;
    }

    pub fn iter(&self) -> impl Iterator<Item = (Nutrient, NutrientValue)> + '_ {
        Nutrient::ALL
            .into_iter()
            .map(move |nutrient| (nutrient, self.get(nutrient)))
    }

    pub fn is_all_unavailable(&self) -> bool {
        self.iter().all(|(_, value)| !value.is_available())
    }
}

/// Nutrition database boundary.
pub trait NutritionLookup: Send + Sync {
    /// Look up the six nutrients for a food label. Labels the database does not
    /// know yield an all-`Unavailable` record, not an error.
    fn lookup(&self, food_label: &str) -> Result<NutritionRecord>;
}

/// Search response body (only the fields read here).
///
/// The database may send `null` for any of these fields; a missing or null
/// list reads as empty and a null name matches nothing.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct FoodSearchResponse {
    #[serde(default)]
    pub foods: Option<Vec<FoodEntry>>,
}

impl FoodSearchResponse {
    pub fn foods(&self) -> &[FoodEntry] {
        self.foods.as_deref().unwrap_or_default()
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct FoodEntry {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "foodNutrients", default)]
    pub food_nutrients: Option<Vec<FoodNutrient>>,
}

impl FoodEntry {
    pub fn nutrients(&self) -> &[FoodNutrient] {
        self.food_nutrients.as_deref().unwrap_or_default()
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct FoodNutrient {
    #[serde(rename = "nutrientName", default)]
    pub nutrient_name: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
}

/// Build a record from the first matching food of a search response.
pub fn record_from_response(response: &FoodSearchResponse) -> NutritionRecord {
    let Some(food) = response.foods().first() else {
        return NutritionRecord::unavailable();
    };
    let mut record = NutritionRecord::unavailable();
    for nutrient in Nutrient::ALL {
        record.set(
            nutrient,
            extract_nutrient(food.nutrients(), nutrient.remote_name()),
        );
    }
    record
}

/// Value of the first nutrient whose name matches exactly.
pub fn extract_nutrient(nutrients: &[FoodNutrient], name: &str) -> NutrientValue {
    nutrients
        .iter()
        .find(|nutrient| nutrient.nutrient_name.as_deref() == Some(name))
        .and_then(|nutrient| nutrient.value)
        .map(NutrientValue::Amount)
        .unwrap_or(NutrientValue::Unavailable)
}
