//! Google Gemini adapter (REST `generateContent`).

use serde::Deserialize;
use serde_json::json;

use super::{
    GenerationOutput, GenerationRequest, GenerationUsage, LlmClient, ProviderHandle,
    ReasoningParam, clean_llm_output, pricing,
};
use crate::core::http::LLM_TIMEOUT;
use crate::error::{Result, WxError};

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default, rename = "usageMetadata")]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default, rename = "promptFeedback")]
    prompt_feedback: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageMetadata {
    #[serde(default, rename = "promptTokenCount")]
    prompt_token_count: u64,
    #[serde(default, rename = "candidatesTokenCount")]
    candidates_token_count: u64,
}

/// Call `generateContent` with a system instruction and clean the result.
pub(super) async fn generate(
    client: &LlmClient,
    handle: &ProviderHandle,
    request: &GenerationRequest,
    api_key: &str,
) -> Result<GenerationOutput> {
    let mut generation_config = json!({
        "temperature": request.temperature,
        "maxOutputTokens": request.max_tokens,
    });
    if let Some(ReasoningParam::ThinkingLevel(level)) = handle.reasoning_param(request.reasoning) {
        generation_config["thinkingConfig"] = json!({ "thinkingLevel": level });
    }

    let body = json!({
        "system_instruction": { "parts": [{ "text": request.system_prompt }] },
        "contents": [{ "parts": [{ "text": request.prompt }] }],
        "generationConfig": generation_config,
    });

    let parsed = call(client, handle, api_key, &body).await?;
    let raw_text = first_text(&parsed);

    if raw_text.is_empty() {
        tracing::warn!(
            model = %handle.model,
            feedback = ?parsed.prompt_feedback,
            "Gemini response was empty or blocked"
        );
        return Err(WxError::GenerationEmpty {
            provider: handle.family.name().to_string(),
        });
    }

    let cleaned = clean_llm_output(&raw_text);
    let text = if cleaned.is_empty() { raw_text } else { cleaned };
    let usage = usage_of(&parsed);
    let cost_cents = usage.and_then(|u| pricing::cost_cents(&handle.model, u));
    Ok(GenerationOutput {
        text,
        usage,
        cost_cents,
    })
}

/// Impact-context lookup grounded through Google Search.
pub(super) async fn search_generate(
    client: &LlmClient,
    handle: &ProviderHandle,
    prompt: &str,
    api_key: &str,
) -> Result<GenerationOutput> {
    let body = json!({
        "contents": [{ "parts": [{ "text": prompt }] }],
        "tools": [{ "google_search": {} }],
        "generationConfig": {
            "temperature": 0.2,
            "maxOutputTokens": 15000,
        },
    });

    let parsed = call(client, handle, api_key, &body).await?;
    let text = first_text(&parsed);
    if text.is_empty() {
        return Err(WxError::GenerationEmpty {
            provider: handle.family.name().to_string(),
        });
    }

    let usage = usage_of(&parsed);
    let cost_cents = usage.and_then(|u| pricing::cost_cents(&handle.model, u));
    Ok(GenerationOutput {
        text,
        usage,
        cost_cents,
    })
}

async fn call(
    client: &LlmClient,
    handle: &ProviderHandle,
    api_key: &str,
    body: &serde_json::Value,
) -> Result<GenerateContentResponse> {
    let url = format!(
        "{}/models/{}:generateContent",
        client.base_url(handle.family),
        handle.model
    );

    let response = client
        .http()
        .post(&url)
        .header("x-goog-api-key", api_key)
        .json(body)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                WxError::GenerationTimeout {
                    provider: handle.family.name().to_string(),
                    seconds: LLM_TIMEOUT.as_secs(),
                }
            } else {
                WxError::GenerationApi {
                    provider: handle.family.name().to_string(),
                    status: None,
                    message: e.to_string(),
                }
            }
        })?;

    let status = response.status();
    if !status.is_success() {
        let message: String = response
            .text()
            .await
            .unwrap_or_default()
            .chars()
            .take(500)
            .collect();
        if status.as_u16() == 429 {
            return Err(WxError::RateLimited {
                provider: handle.family.name().to_string(),
                retry_after: None,
                message,
            });
        }
        return Err(WxError::GenerationApi {
            provider: handle.family.name().to_string(),
            status: Some(status.as_u16()),
            message,
        });
    }

    response.json().await.map_err(|e| WxError::GenerationApi {
        provider: handle.family.name().to_string(),
        status: None,
        message: format!("unparseable response: {e}"),
    })
}

fn first_text(response: &GenerateContentResponse) -> String {
    response
        .candidates
        .first()
        .and_then(|candidate| candidate.content.as_ref())
        .and_then(|content| content.parts.first())
        .and_then(|part| part.text.as_deref())
        .unwrap_or_default()
        .trim()
        .to_string()
}

fn usage_of(response: &GenerateContentResponse) -> Option<GenerationUsage> {
    response.usage_metadata.as_ref().map(|usage| GenerationUsage {
        input_tokens: usage.prompt_token_count,
        output_tokens: usage.candidates_token_count,
    })
}
