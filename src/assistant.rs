//! Optional AI consultant for teachers (`/ai <question>`).
//!
//! If `GEMINI_API_KEY` is set, questions are forwarded to the Gemini
//! `generateContent` endpoint with a short system instruction. Failures are
//! logged and answered with a fixed apology; they never reach the caller.

use serde_json::json;

use crate::core::config;

const SYSTEM_PROMPT: &str = "Siz o'qituvchilarga yordam beruvchi metodist-maslahatchisiz. \
     Dars ishlanmasi, ish reja va baholash bo'yicha qisqa, aniq javob bering. \
     O'zbek tilida yozing.";

/// Answer used when the model cannot be reached
pub const FALLBACK_ANSWER: &str = "⚠️ Hozircha javob bera olmayman. Birozdan so'ng qayta urinib ko'ring.";

/// Answer used when no API key is configured
pub const DISABLED_ANSWER: &str = "🤖 AI maslahatchi hozircha o'chirilgan.";

/// Whether an API key is configured.
pub fn is_enabled() -> bool {
    config::assistant::GEMINI_API_KEY.is_some()
}

fn endpoint(model: &str) -> String {
    format!(
        "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
        model
    )
}

/// Pulls the answer text out of a `generateContent` response.
fn extract_answer(response: &serde_json::Value) -> Option<String> {
    let parts = response
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
        .collect();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

async fn request_answer(api_key: &str, question: &str) -> Result<Option<String>, reqwest::Error> {
    let body = json!({
        "system_instruction": {"parts": [{"text": SYSTEM_PROMPT}]},
        "contents": [{"role": "user", "parts": [{"text": question}]}]
    });

    let client = reqwest::Client::builder().timeout(config::network::timeout()).build()?;
    let response = client
        .post(endpoint(config::assistant::GEMINI_MODEL.as_str()))
        .header("x-goog-api-key", api_key)
        .json(&body)
        .send()
        .await?;

    if !response.status().is_success() {
        log::warn!("assistant: API returned status {}", response.status());
        return Ok(None);
    }

    let json: serde_json::Value = response.json().await?;
    Ok(extract_answer(&json))
}

/// Asks the model; always returns something printable.
pub async fn ask(question: &str) -> String {
    let Some(api_key) = config::assistant::GEMINI_API_KEY.as_deref() else {
        return DISABLED_ANSWER.to_string();
    };

    match request_answer(api_key, question).await {
        Ok(Some(answer)) => answer,
        Ok(None) => FALLBACK_ANSWER.to_string(),
        Err(e) => {
            log::warn!("assistant: request failed: {}", e);
            FALLBACK_ANSWER.to_string()
        }
    }
}
