use crate::models::{round1, round_calories, FoodItem, FoodSource};
use crate::services::normalizer;

/// Calories assumed for each line of a user description. Several lines
/// usually describe components of one meal, so this sits below the
/// single-item default.
pub const DESCRIPTION_ITEM_CALORIES: f64 = 300.0;
pub const DESCRIPTION_ITEM_CONFIDENCE: f64 = 0.55;

/// Average-meal default used when nothing at all is known.
pub const GENERIC_ITEM_CALORIES: f64 = 400.0;
pub const GENERIC_ITEM_CONFIDENCE: f64 = 0.5;
pub const GENERIC_ITEM_NAME: &str = "食事(推定)";

/// Produce estimated items when the model output was unusable: one item per
/// non-empty description line, or a single generic meal. Never empty.
pub fn estimate_items(description: Option<&str>) -> Vec<FoodItem> {
    if let Some(text) = description {
        let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        if !lines.is_empty() {
            return lines
                .into_iter()
                .map(|line| {
                    fallback_item(
                        line.to_string(),
                        DESCRIPTION_ITEM_CALORIES,
                        DESCRIPTION_ITEM_CONFIDENCE,
                    )
                })
                .collect();
        }
    }

    vec![fallback_item(
        GENERIC_ITEM_NAME.to_string(),
        GENERIC_ITEM_CALORIES,
        GENERIC_ITEM_CONFIDENCE,
    )]
}

fn fallback_item(name: String, calories: f64, confidence: f64) -> FoodItem {
    let (protein, fat, carbs) = normalizer::macros_from_calories(calories);
    FoodItem {
        name,
        quantity: 100.0,
        unit: "g".to_string(),
        calories: round_calories(calories),
        protein: round1(protein),
        fat: round1(fat),
        carbs: round1(carbs),
        confidence,
        source: FoodSource::Fallback,
        food_code: None,
        matched_name: None,
    }
}
