use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;

use crate::config::AnalysisConfig;
use crate::error::VisionError;
use crate::models::{ProcessedImage, VisionAnalysisResult};
use crate::services::aggregate;
use crate::services::enricher::NutritionEnricher;
use crate::services::gemini::VisionProvider;
use crate::services::normalizer;
use crate::services::request::build_request;
use crate::services::retry::with_retry;

static ANALYSIS_SEQ: AtomicU64 = AtomicU64::new(0);

/// The food-image analysis pipeline.
///
/// Wires the request builder, the vision provider (with retry), the
/// normalizer, the optional composition-database enricher, and the
/// aggregator. Which provider/store implementations to use is decided by the
/// composition root, not here.
pub struct FoodAnalyzer {
    provider: Arc<dyn VisionProvider>,
    enricher: Option<NutritionEnricher>,
    config: AnalysisConfig,
}

impl FoodAnalyzer {
    pub fn new(
        provider: Arc<dyn VisionProvider>,
        enricher: Option<NutritionEnricher>,
        config: AnalysisConfig,
    ) -> Self {
        Self {
            provider,
            enricher,
            config,
        }
    }

    /// Analyze one food photo (plus optional free-text description).
    ///
    /// Provider failures propagate: a 4xx rejection immediately, a spent
    /// retry budget as `VisionError::Exhausted`. Everything after a
    /// successful call degrades instead of failing: unusable output becomes
    /// estimated items, a broken composition database is skipped.
    pub async fn analyze(
        &self,
        image: &ProcessedImage,
        description: Option<&str>,
    ) -> Result<VisionAnalysisResult, VisionError> {
        let request = build_request(image, description, &self.config);
        log::info!(
            "📸 Analyzing food image ({} bytes, {})",
            image.byte_size,
            image.mime_type
        );

        let raw = with_retry(
            &self.config.retry,
            |_| self.provider.analyze(&request),
            VisionError::is_retryable,
            |attempt, err| log::warn!("🔁 Vision attempt {} failed, retrying: {}", attempt, err),
        )
        .await
        .map_err(|err| {
            if err.is_retryable() {
                VisionError::Exhausted {
                    attempts: self.config.retry.max_attempts,
                    source: Box::new(err),
                }
            } else {
                err
            }
        })?;

        let normalized = normalizer::normalize_response(&raw, description);
        let fallback = normalized.used_fallback;

        let mut items = normalized.items;
        let mut totals = aggregate::totals(&items);

        if let Some(enricher) = &self.enricher {
            items = enricher.enrich(items).await;
            // enrichment may have rewritten items
            totals = aggregate::totals(&items);
        }
        let result = VisionAnalysisResult {
            total_calories: totals.calories,
            total_protein: totals.protein,
            total_fat: totals.fat,
            total_carbs: totals.carbs,
            overall_confidence: totals.overall_confidence,
            provider: self.provider.name().to_string(),
            fallback,
            analysis_id: next_analysis_id(),
            processed_at: Utc::now(),
            items,
        };

        log::info!(
            "✅ Analysis {} complete: {} item(s), {} kcal, confidence {:.2}{}",
            result.analysis_id,
            result.items.len(),
            result.total_calories,
            result.overall_confidence,
            if result.fallback { " (fallback)" } else { "" }
        );
        Ok(result)
    }
}

fn next_analysis_id() -> String {
    let seq = ANALYSIS_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("an-{}-{}", Utc::now().timestamp_millis(), seq)
}
