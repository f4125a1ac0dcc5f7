use serde_json::Value;

use crate::config::{
    CARB_CALORIE_RATIO, CARB_KCAL_PER_GRAM, DEFAULT_CONFIDENCE, FAT_CALORIE_RATIO,
    FAT_KCAL_PER_GRAM, PROTEIN_CALORIE_RATIO, PROTEIN_KCAL_PER_GRAM,
};
use crate::models::{round1, round_calories, FoodItem, FoodSource};
use crate::services::fallback;

/// Outcome of normalizing one raw provider response.
#[derive(Debug)]
pub struct NormalizedResponse {
    pub items: Vec<FoodItem>,
    /// True when no usable item could be parsed and estimates were
    /// synthesized instead.
    pub used_fallback: bool,
}

const ITEM_ARRAY_KEYS: &[&str] = &["items", "foods"];
const NAME_KEYS: &[&str] = &["name", "food", "food_name", "label", "dish"];
const QUANTITY_KEYS: &[&str] = &["quantity", "amount", "grams", "portion"];
const UNIT_KEYS: &[&str] = &["unit", "units"];
const CALORIE_KEYS: &[&str] = &["calories", "calories_kcal", "kcal", "energy", "energy_kcal", "cal"];
const PROTEIN_KEYS: &[&str] = &["protein", "protein_g", "proteins"];
const FAT_KEYS: &[&str] = &["fat", "fat_g", "fats", "lipid"];
const CARB_KEYS: &[&str] = &["carbs", "carbohydrates", "carbs_g", "carbohydrate", "carb"];
const CONFIDENCE_KEYS: &[&str] = &["confidence", "score", "certainty"];
const NESTED_NUTRITION_KEYS: &[&str] = &["nutrition", "nutrients", "macros"];

/// Turn an opaque provider response into a non-empty item list.
///
/// Pure and deterministic: identical input always yields identical output.
/// Any response (`null`, prose, a half-broken JSON envelope) produces at
/// least one item; unusable responses degrade to estimates instead of
/// failing.
pub fn normalize_response(raw: &Value, description: Option<&str>) -> NormalizedResponse {
    let items = extract_items(raw);
    if items.is_empty() {
        log::warn!("⚠️ No usable items in vision response, estimating instead");
        return NormalizedResponse {
            items: fallback::estimate_items(description),
            used_fallback: true,
        };
    }
    NormalizedResponse {
        items,
        used_fallback: false,
    }
}

/// Grams of protein/fat/carbs assumed for a given calorie count when the
/// model omits the macro breakdown.
pub fn macros_from_calories(calories: f64) -> (f64, f64, f64) {
    (
        calories * PROTEIN_CALORIE_RATIO / PROTEIN_KCAL_PER_GRAM,
        calories * FAT_CALORIE_RATIO / FAT_KCAL_PER_GRAM,
        calories * CARB_CALORIE_RATIO / CARB_KCAL_PER_GRAM,
    )
}

fn extract_items(raw: &Value) -> Vec<FoodItem> {
    for text in candidate_texts(raw) {
        if let Some(values) = parse_item_array(&text) {
            let items: Vec<FoodItem> = values.iter().filter_map(normalize_item).collect();
            if !items.is_empty() {
                return items;
            }
        }
    }
    Vec::new()
}

/// Every place a provider is known to put generated text, in preference
/// order: Gemini candidates/parts, OpenAI-compatible choices, a bare string,
/// and finally the payload itself when it is already structured JSON.
fn candidate_texts(raw: &Value) -> Vec<String> {
    let mut texts = Vec::new();

    if let Some(candidates) = raw.get("candidates").and_then(Value::as_array) {
        for candidate in candidates {
            if let Some(parts) = candidate.pointer("/content/parts").and_then(Value::as_array) {
                for part in parts {
                    if let Some(text) = part.get("text").and_then(Value::as_str) {
                        texts.push(text.to_string());
                    }
                }
            }
        }
    }

    if let Some(choices) = raw.get("choices").and_then(Value::as_array) {
        for choice in choices {
            if let Some(text) = choice.pointer("/message/content").and_then(Value::as_str) {
                texts.push(text.to_string());
            }
        }
    }

    if let Some(text) = raw.as_str() {
        texts.push(text.to_string());
    }

    if texts.is_empty() && (raw.is_object() || raw.is_array()) {
        texts.push(raw.to_string());
    }

    texts
}

fn parse_item_array(text: &str) -> Option<Vec<Value>> {
    let payload = parse_json_lenient(text)?;
    locate_item_array(&payload)
}

/// Strict parse first; models sometimes wrap JSON in prose despite
/// instructions, so fall back to the first brace-delimited substring.
fn parse_json_lenient(text: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return Some(value);
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

fn locate_item_array(payload: &Value) -> Option<Vec<Value>> {
    if let Some(array) = payload.as_array() {
        return Some(array.clone());
    }
    for key in ITEM_ARRAY_KEYS {
        if let Some(array) = payload.get(key).and_then(Value::as_array) {
            return Some(array.clone());
        }
    }
    // A single bare item object still counts as a one-element list.
    if payload.is_object() && find_field(payload, NAME_KEYS).is_some() {
        return Some(vec![payload.clone()]);
    }
    None
}

/// Coerce one candidate object into a `FoodItem`.
///
/// Missing calories become 0 (the item survives); calories that are present
/// but unparsable drop the item; that is the only way an item is rejected.
fn normalize_item(raw: &Value) -> Option<FoodItem> {
    if !raw.is_object() {
        return None;
    }

    let calories = match find_field(raw, CALORIE_KEYS) {
        None => 0.0,
        Some(value) => match coerce_number(value) {
            Some(c) if c.is_finite() => c.max(0.0),
            _ => return None,
        },
    };

    let name = find_field(raw, NAME_KEYS)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("不明な食品")
        .to_string();

    let quantity = numeric_field(raw, QUANTITY_KEYS)
        .filter(|q| *q > 0.0)
        .unwrap_or(100.0);

    let unit = find_field(raw, UNIT_KEYS)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("g")
        .to_string();

    let (derived_protein, derived_fat, derived_carbs) = macros_from_calories(calories);
    let protein = numeric_field(raw, PROTEIN_KEYS)
        .map(|v| v.max(0.0))
        .unwrap_or(derived_protein);
    let fat = numeric_field(raw, FAT_KEYS)
        .map(|v| v.max(0.0))
        .unwrap_or(derived_fat);
    let carbs = numeric_field(raw, CARB_KEYS)
        .map(|v| v.max(0.0))
        .unwrap_or(derived_carbs);

    let confidence = normalize_confidence(numeric_field(raw, CONFIDENCE_KEYS));

    Some(FoodItem {
        name,
        quantity,
        unit,
        calories: round_calories(calories),
        protein: round1(protein),
        fat: round1(fat),
        carbs: round1(carbs),
        confidence,
        source: FoodSource::Model,
        food_code: None,
        matched_name: None,
    })
}

/// Values above 1 are taken as percentages; non-positive or missing values
/// get the default.
fn normalize_confidence(raw: Option<f64>) -> f64 {
    match raw {
        Some(v) if v > 1.0 => (v / 100.0).clamp(0.0, 1.0),
        Some(v) if v > 0.0 => v,
        _ => DEFAULT_CONFIDENCE,
    }
}

fn numeric_field(item: &Value, keys: &[&str]) -> Option<f64> {
    find_field(item, keys)
        .and_then(coerce_number)
        .filter(|v| v.is_finite())
}

/// Look a field up under any of its aliases, then inside nested nutrition
/// objects.
fn find_field<'a>(item: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    for key in keys {
        if let Some(value) = item.get(key) {
            return Some(value);
        }
    }
    for nested in NESTED_NUTRITION_KEYS {
        if let Some(object) = item.get(nested) {
            for key in keys {
                if let Some(value) = object.get(key) {
                    return Some(value);
                }
            }
        }
    }
    None
}

/// Numbers arrive as numbers, numeric strings with unit suffixes, or
/// `{value: ...}` carrier objects.
fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_numeric_text(s),
        Value::Object(map) => map.get("value").and_then(coerce_number),
        _ => None,
    }
}

fn parse_numeric_text(text: &str) -> Option<f64> {
    let kept: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-'))
        .collect();
    if kept.is_empty() {
        return None;
    }
    // "1,250" is a thousands separator, "12,5" a decimal comma.
    let normalized = if kept.contains(',') && !kept.contains('.') {
        let after = kept.rsplit(',').next().unwrap_or("");
        if after.len() == 3 {
            kept.replace(',', "")
        } else {
            kept.replace(',', ".")
        }
    } else {
        kept.replace(',', "")
    };
    normalized.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn gemini_envelope(text: &str) -> Value {
        json!({
            "candidates": [{
                "content": {
                    "parts": [{ "text": text }]
                },
                "finishReason": "STOP"
            }]
        })
    }

    #[test]
    fn test_well_formed_response() {
        let raw = gemini_envelope(
            r#"{"items":[{"name":"ご飯","quantity":150,"calories":250,"protein":4,"fat":0.5,"carbs":55,"confidence":90}]}"#,
        );

        let result = normalize_response(&raw, None);

        assert!(!result.used_fallback);
        assert_eq!(result.items.len(), 1);
        let item = &result.items[0];
        assert_eq!(item.name, "ご飯");
        assert_eq!(item.quantity, 150.0);
        assert_eq!(item.calories, 250.0);
        assert_eq!(item.protein, 4.0);
        assert_eq!(item.fat, 0.5);
        assert_eq!(item.carbs, 55.0);
        assert_eq!(item.confidence, 0.9);
        assert_eq!(item.source, FoodSource::Model);
    }

    #[test]
    fn test_json_wrapped_in_prose() {
        let raw = gemini_envelope(
            "はい、分析しました。\n```json\n{\"items\":[{\"name\":\"味噌汁\",\"calories\":60}]}\n```\nご確認ください。",
        );

        let result = normalize_response(&raw, None);

        assert!(!result.used_fallback);
        assert_eq!(result.items[0].name, "味噌汁");
        assert_eq!(result.items[0].calories, 60.0);
    }

    #[test]
    fn test_schema_drift_foods_key_and_aliases() {
        let raw = gemini_envelope(
            r#"{"foods":[{"food_name":"サラダ","calories_kcal":"120 kcal","amount":"80g","confidence":0.7}]}"#,
        );

        let result = normalize_response(&raw, None);

        let item = &result.items[0];
        assert_eq!(item.name, "サラダ");
        assert_eq!(item.calories, 120.0);
        assert_eq!(item.quantity, 80.0);
        assert_eq!(item.confidence, 0.7);
    }

    #[test]
    fn test_nested_nutrition_and_value_carrier() {
        let raw = gemini_envelope(
            r#"{"items":[{"name":"パン","nutrition":{"kcal":{"value":180},"protein":6}}]}"#,
        );

        let result = normalize_response(&raw, None);

        let item = &result.items[0];
        assert_eq!(item.calories, 180.0);
        assert_eq!(item.protein, 6.0);
    }

    #[test]
    fn test_openai_compatible_envelope() {
        let raw = json!({
            "choices": [{
                "message": { "content": r#"{"items":[{"name":"rice","calories":200}]}"# }
            }]
        });

        let result = normalize_response(&raw, None);

        assert!(!result.used_fallback);
        assert_eq!(result.items[0].calories, 200.0);
    }

    #[test]
    fn test_bare_payload_without_envelope() {
        let raw = json!({"items":[{"name":"うどん","calories":320}]});
        let result = normalize_response(&raw, None);
        assert_eq!(result.items[0].name, "うどん");
    }

    #[test]
    fn test_macro_derivation_from_calories() {
        let raw = gemini_envelope(r#"{"items":[{"name":"弁当","calories":200}]}"#);

        let items = normalize_response(&raw, None).items;
        let item = &items[0];

        // 15%/4, 25%/9, 60%/4 of 200 kcal
        assert_eq!(item.protein, 7.5);
        assert_eq!(item.fat, 5.6);
        assert_eq!(item.carbs, 30.0);
    }

    #[test]
    fn test_confidence_normalization() {
        let raw = gemini_envelope(
            r#"{"items":[
                {"name":"a","calories":100,"confidence":85},
                {"name":"b","calories":100,"confidence":-3},
                {"name":"c","calories":100,"confidence":250}
            ]}"#,
        );

        let items = normalize_response(&raw, None).items;

        assert_eq!(items[0].confidence, 0.85);
        assert_eq!(items[1].confidence, DEFAULT_CONFIDENCE);
        assert_eq!(items[2].confidence, 1.0);
    }

    #[test]
    fn test_missing_calories_kept_as_zero_unparsable_dropped() {
        let raw = gemini_envelope(
            r#"{"items":[
                {"name":"keep-me"},
                {"name":"drop-me","calories":"数値不明"}
            ]}"#,
        );

        let items = normalize_response(&raw, None).items;

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "keep-me");
        assert_eq!(items[0].calories, 0.0);
    }

    #[test]
    fn test_no_output_item_carries_negative_or_nan() {
        let raw = gemini_envelope(
            r#"{"items":[{"name":"x","calories":-50,"protein":-1,"fat":-2,"carbs":-3,"confidence":-1}]}"#,
        );

        let items = normalize_response(&raw, None).items;
        let item = &items[0];

        for v in [item.calories, item.protein, item.fat, item.carbs, item.confidence] {
            assert!(v >= 0.0);
            assert!(!v.is_nan());
        }
        assert!(item.confidence <= 1.0);
    }

    #[test]
    fn test_prose_response_falls_back_to_generic_item() {
        let raw = Value::String("I think this is rice and chicken".to_string());

        let result = normalize_response(&raw, None);

        assert!(result.used_fallback);
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].confidence, 0.5);
        assert_eq!(result.items[0].source, FoodSource::Fallback);
    }

    #[test]
    fn test_never_returns_zero_items() {
        for raw in [
            Value::Null,
            json!({}),
            json!({"items": []}),
            Value::String("not json at all".to_string()),
            gemini_envelope("まったく関係のない文章です。"),
        ] {
            let result = normalize_response(&raw, None);
            assert!(!result.items.is_empty(), "empty result for {:?}", raw);
            assert!(result.used_fallback);
        }
    }

    #[test]
    fn test_description_drives_fallback_items() {
        let raw = Value::Null;
        let result = normalize_response(&raw, Some("ご飯\n焼き魚\n"));

        assert!(result.used_fallback);
        assert_eq!(result.items.len(), 2);
        assert!(result.items.iter().all(|i| i.confidence == 0.55));
    }

    #[test]
    fn test_determinism() {
        let raw = gemini_envelope(r#"{"items":[{"name":"カレー","calories":700,"confidence":80}]}"#);

        let a = normalize_response(&raw, Some("カレー"));
        let b = normalize_response(&raw, Some("カレー"));

        assert_eq!(format!("{:?}", a.items), format!("{:?}", b.items));
    }

    #[test]
    fn test_numeric_text_parsing() {
        assert_eq!(parse_numeric_text("250 kcal"), Some(250.0));
        assert_eq!(parse_numeric_text("1,250"), Some(1250.0));
        assert_eq!(parse_numeric_text("12,5"), Some(12.5));
        assert_eq!(parse_numeric_text("約80g"), Some(80.0));
        assert_eq!(parse_numeric_text("unknown"), None);
    }
}
