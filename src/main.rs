mod analyzer;
mod config;
mod error;
mod models;
#[cfg(feature = "server")]
mod server;
mod services;

use anyhow::Result;
use dotenv::dotenv;
use std::env;
use std::sync::Arc;

use analyzer::FoodAnalyzer;
use config::AnalysisConfig;
use services::{GeminiVisionClient, ImagePreparer, NutritionEnricher, PgCompositionStore, StandardImagePreparer};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger
    env_logger::init();

    // Load environment variables
    dotenv().ok();

    log::info!("🚀 Starting mealvision analysis service...");

    let gemini_api_key = env::var("GEMINI_API_KEY")
        .expect("GEMINI_API_KEY must be set in .env file");

    let analysis_config = AnalysisConfig::from_env();
    log::info!(
        "✅ Vision model: {} (timeout {}s, {} attempt(s))",
        analysis_config.model,
        analysis_config.timeout_secs,
        analysis_config.retry.max_attempts
    );

    let provider = Arc::new(GeminiVisionClient::new(
        gemini_api_key,
        analysis_config.model.clone(),
    ));

    // The composition database is optional; without it results keep the
    // model's own estimates.
    let enricher = match env::var("DATABASE_URL") {
        Ok(url) => match PgCompositionStore::connect(&url).await {
            Ok(store) => {
                log::info!("✅ Food composition database connected");
                Some(NutritionEnricher::new(Arc::new(store)))
            }
            Err(e) => {
                log::warn!("⚠️ Composition database unavailable, continuing without enrichment: {}", e);
                None
            }
        },
        Err(_) => {
            log::warn!("⚠️ DATABASE_URL not set, nutrition enrichment disabled");
            None
        }
    };

    let analyzer = Arc::new(FoodAnalyzer::new(provider, enricher, analysis_config));
    log::info!("✅ Analyzer initialized");

    let preparer: Arc<dyn ImagePreparer> = Arc::new(StandardImagePreparer::new());

    // One-shot mode: `mealvision <image-path> [description]`
    let args: Vec<String> = env::args().collect();
    if args.len() > 1 {
        let path = &args[1];
        let description = args.get(2).map(String::as_str);

        log::info!("📷 One-shot analysis of {}", path);
        let bytes = tokio::fs::read(path).await?;
        let image = preparer.prepare(bytes, None).await?;
        let result = analyzer.analyze(&image, description).await?;

        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    #[cfg(feature = "server")]
    {
        let addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let app = server::create_router(analyzer.clone(), preparer.clone());

        log::info!("🌐 HTTP server starting on {}", addr);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                log::error!("❌ HTTP server error: {}", e);
            }
        });
        log::info!("✅ HTTP server started");

        println!("\n📷 mealvision is running!");
        println!("🌐 POST http://{}/api/analyze", addr);
        println!("   multipart fields: image (file), description (optional text)");
        println!("\n🛑 Press Ctrl+C to stop\n");
    }

    #[cfg(not(feature = "server"))]
    println!("\n📷 mealvision built without the server feature - pass an image path to analyze\n");

    log::info!("🎉 Service is ready!");

    // Keep running
    tokio::signal::ctrl_c().await?;

    log::info!("🛑 Shutting down...");
    Ok(())
}
