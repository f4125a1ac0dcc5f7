use std::env;
use std::time::Duration;

// Macro-ratio assumptions used when the model reports calories without a
// macro breakdown: protein 15% of calories at 4 kcal/g, fat 25% at 9 kcal/g,
// carbs 60% at 4 kcal/g. Deliberate approximation, kept as named constants.
pub const PROTEIN_CALORIE_RATIO: f64 = 0.15;
pub const FAT_CALORIE_RATIO: f64 = 0.25;
pub const CARB_CALORIE_RATIO: f64 = 0.60;
pub const PROTEIN_KCAL_PER_GRAM: f64 = 4.0;
pub const FAT_KCAL_PER_GRAM: f64 = 9.0;
pub const CARB_KCAL_PER_GRAM: f64 = 4.0;

/// Confidence assigned to items whose confidence is missing or non-positive.
pub const DEFAULT_CONFIDENCE: f64 = 0.6;

/// Items backed by a composition database match are at least this confident.
pub const ENRICHED_CONFIDENCE_FLOOR: f64 = 0.9;

/// Free-text descriptions are truncated to this many characters.
pub const MAX_DESCRIPTION_CHARS: usize = 500;

/// Upload size cap enforced by the image preparer.
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Bounded exponential backoff with jitter for provider calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    /// Upper bound of the random jitter added to each delay.
    pub jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        // Vision calls are expensive, so only one retry by default.
        Self {
            max_attempts: 2,
            base_delay_ms: 500,
            max_delay_ms: 4000,
            multiplier: 2.0,
            jitter_ms: 100,
        }
    }
}

impl RetryPolicy {
    /// Capped exponential delay before the given attempt, without jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.base_delay_ms as f64 * self.multiplier.powi(attempt.saturating_sub(1) as i32);
        Duration::from_millis(exp.min(self.max_delay_ms as f64) as u64)
    }
}

/// Generation parameters and retry policy for the vision pipeline.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            temperature: 0.2,
            max_output_tokens: 1024,
            timeout_secs: 20,
            retry: RetryPolicy::default(),
        }
    }
}

impl AnalysisConfig {
    /// Load configuration from environment, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            model: env::var("VISION_MODEL").unwrap_or(defaults.model),
            temperature: env_var_or("VISION_TEMPERATURE", "0.2")
                .parse()
                .unwrap_or(defaults.temperature),
            max_output_tokens: env_var_or("VISION_MAX_OUTPUT_TOKENS", "1024")
                .parse()
                .unwrap_or(defaults.max_output_tokens),
            timeout_secs: env_var_or("VISION_TIMEOUT_SECS", "20")
                .parse()
                .unwrap_or(defaults.timeout_secs),
            retry: RetryPolicy {
                max_attempts: env_var_or("VISION_MAX_ATTEMPTS", "2")
                    .parse()
                    .unwrap_or(defaults.retry.max_attempts),
                base_delay_ms: env_var_or("VISION_RETRY_BASE_DELAY_MS", "500")
                    .parse()
                    .unwrap_or(defaults.retry.base_delay_ms),
                max_delay_ms: env_var_or("VISION_RETRY_MAX_DELAY_MS", "4000")
                    .parse()
                    .unwrap_or(defaults.retry.max_delay_ms),
                multiplier: env_var_or("VISION_RETRY_MULTIPLIER", "2.0")
                    .parse()
                    .unwrap_or(defaults.retry.multiplier),
                jitter_ms: env_var_or("VISION_RETRY_JITTER_MS", "100")
                    .parse()
                    .unwrap_or(defaults.retry.jitter_ms),
            },
        }
    }
}

fn env_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_grows_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay_ms: 500,
            max_delay_ms: 4000,
            multiplier: 2.0,
            jitter_ms: 0,
        };

        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(2), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(4), Duration::from_millis(4000));
        // capped
        assert_eq!(policy.delay_for(5), Duration::from_millis(4000));
    }

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::default();
        assert_eq!(config.retry.max_attempts, 2);
        assert!(config.temperature < 0.5);  // deterministic-ish generation
        assert!((15..=25).contains(&config.timeout_secs));
    }
}
