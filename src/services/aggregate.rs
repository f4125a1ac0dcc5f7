use crate::config::DEFAULT_CONFIDENCE;
use crate::models::{round1, round2, FoodItem};

/// Sums and mean confidence over an item list.
#[derive(Debug, Clone, PartialEq)]
pub struct Totals {
    pub calories: f64,
    pub protein: f64,
    pub fat: f64,
    pub carbs: f64,
    pub overall_confidence: f64,
}

/// Recompute totals from scratch. Called after the initial parse and again
/// after enrichment; never cached.
pub fn totals(items: &[FoodItem]) -> Totals {
    let overall_confidence = if items.is_empty() {
        DEFAULT_CONFIDENCE
    } else {
        round2(items.iter().map(|i| i.confidence).sum::<f64>() / items.len() as f64)
    };

    Totals {
        calories: round1(items.iter().map(|i| i.calories).sum::<f64>()),
        protein: round1(items.iter().map(|i| i.protein).sum::<f64>()),
        fat: round1(items.iter().map(|i| i.fat).sum::<f64>()),
        carbs: round1(items.iter().map(|i| i.carbs).sum::<f64>()),
        overall_confidence,
    }
}
