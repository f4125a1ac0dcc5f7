use std::sync::Arc;

use futures_util::future::join_all;

use crate::config::ENRICHED_CONFIDENCE_FLOOR;
use crate::models::{round1, CompositionRecord, FoodItem, FoodSource};
use crate::services::composition::CompositionStore;

/// Ranked candidates requested per search term.
pub const MAX_CANDIDATES: u32 = 5;

/// Replaces AI-estimated macros with verified composition-database values.
///
/// Strictly best-effort: lookups for the items run concurrently, a store
/// failure or a miss leaves the item exactly as it was.
pub struct NutritionEnricher {
    store: Arc<dyn CompositionStore>,
}

impl NutritionEnricher {
    pub fn new(store: Arc<dyn CompositionStore>) -> Self {
        Self { store }
    }

    pub async fn enrich(&self, items: Vec<FoodItem>) -> Vec<FoodItem> {
        join_all(items.into_iter().map(|item| self.enrich_item(item))).await
    }

    async fn enrich_item(&self, item: FoodItem) -> FoodItem {
        // Already verified on a previous pass; re-scaling would corrupt it.
        if item.source == FoodSource::Database {
            return item;
        }

        for term in search_terms(&item.name) {
            match self.store.search_foods(&term, MAX_CANDIDATES).await {
                Ok(records) => {
                    if let Some(record) = records.into_iter().next() {
                        log::debug!(
                            "🔎 Matched \"{}\" to \"{}\" ({})",
                            item.name,
                            record.name,
                            record.food_code
                        );
                        return apply_record(item, &record);
                    }
                }
                Err(err) => {
                    log::warn!("⚠️ Composition lookup failed for \"{}\": {}", term, err);
                    return item;
                }
            }
        }
        item
    }
}

/// Ordered search terms for an item name: the raw trimmed name, the name
/// with any parenthetical suffix removed, the name with internal whitespace
/// stripped. First term with a hit wins.
fn search_terms(name: &str) -> Vec<String> {
    let trimmed = name.trim().to_string();
    let mut terms = Vec::new();
    if !trimmed.is_empty() {
        terms.push(trimmed.clone());
    }
    if let Some(stripped) = strip_parenthetical(&trimmed) {
        if !terms.contains(&stripped) {
            terms.push(stripped);
        }
    }
    let squashed: String = trimmed.split_whitespace().collect();
    if !squashed.is_empty() && !terms.contains(&squashed) {
        terms.push(squashed);
    }
    terms
}

fn strip_parenthetical(name: &str) -> Option<String> {
    let cut = name.find(|c| c == '(' || c == '（')?;
    let stripped = name[..cut].trim().to_string();
    if stripped.is_empty() {
        None
    } else {
        Some(stripped)
    }
}

fn apply_record(mut item: FoodItem, record: &CompositionRecord) -> FoodItem {
    let multiplier = if item.quantity > 0.0 {
        item.quantity / 100.0
    } else {
        1.0
    };

    item.calories = round1(record.energy_kcal * multiplier);
    item.protein = round1(record.protein_g * multiplier);
    item.fat = round1(record.fat_g * multiplier);
    item.carbs = round1(record.carbs_g * multiplier);
    // Verified data is trusted, but never below what the model already claimed.
    item.confidence = item.confidence.max(ENRICHED_CONFIDENCE_FLOOR);
    item.source = FoodSource::Database;
    item.food_code = Some(record.food_code.clone());
    item.matched_name = Some(record.name.clone());
    item
}
