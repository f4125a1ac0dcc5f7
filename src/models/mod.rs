use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// In-memory image asset ready to be sent to the vision provider.
///
/// Created once per upload attempt and discarded after the request is sent;
/// never persisted by this service.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub bytes: Vec<u8>,
    pub byte_size: usize,
    pub width: Option<u32>,   // unknown unless the preparer decodes pixels
    pub height: Option<u32>,
    pub mime_type: String,
    pub base64_data: String,
}

impl ProcessedImage {
    #[allow(dead_code)]
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64_data)
    }
}

/// Where a food item's numbers came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FoodSource {
    /// Estimated by the vision model.
    Model,
    /// Replaced with verified values from the composition database.
    Database,
    /// Synthesized because the model output was unusable.
    Fallback,
}

impl std::fmt::Display for FoodSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FoodSource::Model => "model",
            FoodSource::Database => "database",
            FoodSource::Fallback => "fallback",
        };
        write!(f, "{}", s)
    }
}

/// One recognized or estimated food entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodItem {
    pub name: String,
    pub quantity: f64,
    pub unit: String,  // grams unless the model says otherwise
    pub calories: f64,
    pub protein: f64,
    pub fat: f64,
    pub carbs: f64,
    pub confidence: f64,  // always in [0,1]
    pub source: FoodSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub food_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_name: Option<String>,
}

/// Final output of one analysis call. Never mutated after return; callers
/// that need to merge in extra data must build a new value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisionAnalysisResult {
    pub items: Vec<FoodItem>,  // never empty
    pub total_calories: f64,
    pub total_protein: f64,
    pub total_fat: f64,
    pub total_carbs: f64,
    pub overall_confidence: f64,
    pub provider: String,
    /// True when any non-model estimation path contributed.
    pub fallback: bool,
    pub analysis_id: String,
    pub processed_at: DateTime<Utc>,
}

/// One row of the external food composition database. Values are per 100
/// units (grams unless the source table says otherwise). Read-only here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositionRecord {
    pub food_code: String,
    pub name: String,
    pub energy_kcal: f64,
    pub protein_g: f64,
    pub fat_g: f64,
    pub carbs_g: f64,
}

pub fn round_calories(value: f64) -> f64 {
    value.round()
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
