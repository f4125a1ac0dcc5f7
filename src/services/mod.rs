pub mod aggregate;
pub mod composition; // food composition database (optional enrichment source)
pub mod enricher;
pub mod fallback;
pub mod gemini; // Gemini vision provider
pub mod image;
pub mod normalizer;
pub mod request;
pub mod retry;

pub use composition::{CompositionStore, PgCompositionStore};
pub use enricher::NutritionEnricher;
pub use gemini::{GeminiVisionClient, VisionProvider};
pub use image::{ImagePreparer, StandardImagePreparer};
