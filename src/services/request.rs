use crate::config::{AnalysisConfig, MAX_DESCRIPTION_CHARS};
use crate::models::ProcessedImage;

/// Provider-neutral analysis request. Built once per call, pure data.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub instruction: String,
    pub image_base64: String,
    pub image_mime: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub timeout_secs: u64,
}

// The output shape is pinned hard because everything downstream is cheaper
// when the model complies; the normalizer still survives when it doesn't.
const OUTPUT_SCHEMA_INSTRUCTION: &str = "\
あなたは食品栄養分析の専門家です。この食事の写真を注意深く分析してください。\n\
\n\
写真に写っている料理・食品をすべて特定し、それぞれについて量と栄養価を推定してください。\n\
\n\
回答は次のJSON形式のみで出力してください。説明文・マークダウン・コードブロックは一切不要です:\n\
{\"items\":[{\"name\":\"料理名\",\"quantity\":数値,\"unit\":\"g\",\"calories\":数値,\"protein\":数値,\"fat\":数値,\"carbs\":数値,\"confidence\":数値}]}\n\
\n\
- name: 料理名(日本語)\n\
- quantity: 推定量(グラム)\n\
- calories: 推定カロリー(kcal)\n\
- protein / fat / carbs: グラム単位\n\
- confidence: 認識の確信度(0から1)";

/// Build the model request from a prepared image and optional description.
///
/// Descriptions are trimmed and truncated to 500 characters before being
/// appended as user-supplied context.
pub fn build_request(
    image: &ProcessedImage,
    description: Option<&str>,
    config: &AnalysisConfig,
) -> AnalysisRequest {
    let mut instruction = String::from(OUTPUT_SCHEMA_INSTRUCTION);

    if let Some(desc) = description {
        let trimmed = desc.trim();
        if !trimmed.is_empty() {
            let truncated: String = trimmed.chars().take(MAX_DESCRIPTION_CHARS).collect();
            instruction.push_str("\n\nユーザーの補足説明:\n");
            instruction.push_str(&truncated);
        }
    }

    AnalysisRequest {
        instruction,
        image_base64: image.base64_data.clone(),
        image_mime: image.mime_type.clone(),
        temperature: config.temperature,
        max_output_tokens: config.max_output_tokens,
        timeout_secs: config.timeout_secs,
    }
}
