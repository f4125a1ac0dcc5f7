use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::VisionError;
use crate::services::request::AnalysisRequest;

const API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Capability the pipeline needs from a vision backend: send one request,
/// return the raw response body. Which implementation to construct is the
/// composition root's decision.
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// Short identifier recorded in analysis results.
    fn name(&self) -> &str;

    /// Perform one analysis call. The returned value is the provider's
    /// response as-is; all schema assumptions live in the normalizer.
    async fn analyze(&self, request: &AnalysisRequest) -> Result<serde_json::Value, VisionError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    candidate_count: u32,
}

/// Google Gemini `generateContent` client.
pub struct GeminiVisionClient {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl GeminiVisionClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            client: reqwest::Client::new(),
        }
    }

    fn request_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            API_BASE_URL, self.model, self.api_key
        )
    }

    fn build_body(request: &AnalysisRequest) -> GeminiRequest {
        GeminiRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: request.instruction.clone(),
                    },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: request.image_mime.clone(),
                            data: request.image_base64.clone(),
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_output_tokens,
                candidate_count: 1,
            },
        }
    }
}

#[async_trait]
impl VisionProvider for GeminiVisionClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn analyze(&self, request: &AnalysisRequest) -> Result<serde_json::Value, VisionError> {
        let url = self.request_url();
        let body = Self::build_body(request);

        log::info!("🤖 Sending vision request to Gemini model: {}", self.model);

        let call = async {
            let response = self.client.post(&url).json(&body).send().await?;
            let status = response.status();
            let text = response.text().await?;

            if !status.is_success() {
                log::error!(
                    "❌ Gemini API error ({}): {}",
                    status,
                    truncate_for_log(&text)
                );
                return Err(VisionError::from_status(status.as_u16(), text));
            }

            log::debug!("📄 Raw Gemini response: {} bytes", text.len());
            // A non-JSON body still flows to the normalizer as a string.
            Ok(serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text)))
        };

        // Dropping the future cancels the in-flight request.
        match tokio::time::timeout(Duration::from_secs(request.timeout_secs), call).await {
            Ok(result) => result,
            Err(_) => {
                log::warn!("⏱ Gemini request timed out after {}s", request.timeout_secs);
                Err(VisionError::Timeout {
                    seconds: request.timeout_secs,
                })
            }
        }
    }
}

fn truncate_for_log(text: &str) -> String {
    text.chars().take(300).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::models::ProcessedImage;
    use crate::services::request::build_request;

    #[test]
    fn test_body_wire_format() {
        let image = ProcessedImage {
            bytes: vec![0xFF, 0xD8, 0xFF],
            byte_size: 3,
            width: None,
            height: None,
            mime_type: "image/jpeg".to_string(),
            base64_data: "/9j/".to_string(),
        };
        let request = build_request(&image, None, &AnalysisConfig::default());

        let body = GeminiVisionClient::build_body(&request);
        let json = serde_json::to_value(&body).unwrap();

        let parts = &json["contents"][0]["parts"];
        assert!(parts[0]["text"].as_str().unwrap().contains("\"items\""));
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[1]["inlineData"]["data"], "/9j/");
        assert_eq!(json["generationConfig"]["candidateCount"], 1);
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 1024);
    }

    #[test]
    fn test_request_url_carries_model() {
        let client = GeminiVisionClient::new("key".to_string(), "gemini-2.5-flash".to_string());
        assert!(client
            .request_url()
            .contains("/models/gemini-2.5-flash:generateContent"));
    }
}
