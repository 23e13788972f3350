//! OpenAI-compatible chat completions adapter.
//!
//! Serves both the OpenAI family and OpenRouter (same wire shape,
//! different base URL and reasoning parameter placement).

use serde::Deserialize;
use serde_json::json;

use super::{
    GenerationOutput, GenerationRequest, GenerationUsage, LlmClient, ProviderHandle,
    ReasoningParam, clean_llm_output, pricing,
};
use crate::core::http::LLM_TIMEOUT;
use crate::error::{Result, WxError};

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatResponseMessage>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// Call the chat completions endpoint and clean the result.
pub(super) async fn generate(
    client: &LlmClient,
    handle: &ProviderHandle,
    request: &GenerationRequest,
    api_key: &str,
) -> Result<GenerationOutput> {
    let url = format!("{}/chat/completions", client.base_url(handle.family));

    let mut body = json!({
        "model": handle.model,
        "messages": [
            { "role": "system", "content": request.system_prompt },
            { "role": "user", "content": request.prompt },
        ],
        "temperature": request.temperature,
        "max_tokens": request.max_tokens,
        "stream": false,
    });
    match handle.reasoning_param(request.reasoning) {
        Some(ReasoningParam::Effort(effort)) => {
            body["reasoning_effort"] = json!(effort);
        }
        Some(ReasoningParam::ExtraBodyEffort(effort)) => {
            body["reasoning"] = json!({ "effort": effort });
        }
        Some(ReasoningParam::ThinkingLevel(_)) | None => {}
    }

    let response = client
        .http()
        .post(&url)
        .bearer_auth(api_key)
        .json(&body)
        .send()
        .await
        .map_err(|e| classify_send_error(handle, &e))?;

    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(api_error(handle, status.as_u16(), &message));
    }

    let parsed: ChatResponse = response.json().await.map_err(|e| WxError::GenerationApi {
        provider: handle.family.name().to_string(),
        status: None,
        message: format!("unparseable response: {e}"),
    })?;

    let usage = parsed.usage.map(|u| GenerationUsage {
        input_tokens: u.prompt_tokens,
        output_tokens: u.completion_tokens,
    });

    let choice = parsed.choices.into_iter().next();
    let finish_reason = choice.as_ref().and_then(|c| c.finish_reason.clone());
    let raw_text = choice
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .unwrap_or_default();

    let cleaned = clean_llm_output(&raw_text);
    // Cleaning can swallow output that never reached a header; fall back
    // to the raw text rather than reporting an empty generation.
    let text = if cleaned.is_empty() {
        raw_text.trim().to_string()
    } else {
        cleaned
    };

    if text.is_empty() {
        tracing::warn!(
            provider = handle.family.name(),
            model = %handle.model,
            finish_reason = finish_reason.as_deref().unwrap_or("unknown"),
            "Response contained no usable text"
        );
        return Err(WxError::GenerationEmpty {
            provider: handle.family.name().to_string(),
        });
    }

    let cost_cents = usage.and_then(|u| pricing::cost_cents(&handle.model, u));
    Ok(GenerationOutput {
        text,
        usage,
        cost_cents,
    })
}

#[derive(Debug, Deserialize)]
struct ResponsesReply {
    #[serde(default)]
    output_text: Option<String>,
    #[serde(default)]
    output: Vec<ResponsesItem>,
    #[serde(default)]
    usage: Option<ResponsesUsage>,
}

#[derive(Debug, Deserialize)]
struct ResponsesItem {
    #[serde(default)]
    content: Vec<ResponsesContent>,
}

#[derive(Debug, Deserialize)]
struct ResponsesContent {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponsesUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

/// Impact-context lookup via the Responses API with the web-search tool.
pub(super) async fn search_generate(
    client: &LlmClient,
    handle: &ProviderHandle,
    prompt: &str,
    api_key: &str,
) -> Result<GenerationOutput> {
    let url = format!("{}/responses", client.base_url(handle.family));
    let body = json!({
        "model": handle.model,
        "input": prompt,
        "tools": [{ "type": "web_search" }],
    });

    let response = client
        .http()
        .post(&url)
        .bearer_auth(api_key)
        .json(&body)
        .send()
        .await
        .map_err(|e| classify_send_error(handle, &e))?;

    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(api_error(handle, status.as_u16(), &message));
    }

    let parsed: ResponsesReply = response.json().await.map_err(|e| WxError::GenerationApi {
        provider: handle.family.name().to_string(),
        status: None,
        message: format!("unparseable response: {e}"),
    })?;

    let text = parsed
        .output_text
        .filter(|t| !t.trim().is_empty())
        .or_else(|| {
            parsed
                .output
                .iter()
                .flat_map(|item| item.content.iter())
                .find_map(|content| content.text.clone())
        })
        .map(|t| t.trim().to_string())
        .unwrap_or_default();

    if text.is_empty() {
        return Err(WxError::GenerationEmpty {
            provider: handle.family.name().to_string(),
        });
    }

    let usage = parsed.usage.map(|u| GenerationUsage {
        input_tokens: u.input_tokens,
        output_tokens: u.output_tokens,
    });
    let cost_cents = usage.and_then(|u| pricing::cost_cents(&handle.model, u));
    Ok(GenerationOutput {
        text,
        usage,
        cost_cents,
    })
}

fn classify_send_error(handle: &ProviderHandle, error: &reqwest::Error) -> WxError {
    if error.is_timeout() {
        WxError::GenerationTimeout {
            provider: handle.family.name().to_string(),
            seconds: LLM_TIMEOUT.as_secs(),
        }
    } else {
        WxError::GenerationApi {
            provider: handle.family.name().to_string(),
            status: None,
            message: error.to_string(),
        }
    }
}

fn api_error(handle: &ProviderHandle, status: u16, message: &str) -> WxError {
    let truncated: String = message.chars().take(500).collect();
    if status == 429 {
        WxError::RateLimited {
            provider: handle.family.name().to_string(),
            retry_after: None,
            message: truncated,
        }
    } else {
        WxError::GenerationApi {
            provider: handle.family.name().to_string(),
            status: Some(status),
            message: truncated,
        }
    }
}
