use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::llm::AiError;

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Single text completion against the Anthropic messages API.
pub(super) async fn complete(
    http: &reqwest::Client,
    api_key: &str,
    model: &str,
    max_tokens: u32,
    timeout: Duration,
    prompt: &str,
) -> Result<String, AiError> {
    let start = std::time::Instant::now();

    let request = MessagesRequest {
        model,
        max_tokens,
        messages: vec![WireMessage {
            role: "user",
            content: prompt,
        }],
    };

    let response = http
        .post(MESSAGES_URL)
        .header("x-api-key", api_key)
        .header("anthropic-version", API_VERSION)
        .header("content-type", "application/json")
        .timeout(timeout)
        .json(&request)
        .send()
        .await
        .map_err(|e| AiError::Http(e.to_string()))?;

    let status = response.status();
    metrics::histogram!("ai.request.latency", "provider" => "anthropic")
        .record(start.elapsed().as_secs_f64());

    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(AiError::Auth(status.to_string()));
    }

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());
        return Err(AiError::RateLimited { retry_after });
    }

    if status.is_client_error() {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiError>(&body)
            .map(|e| e.error.message)
            .unwrap_or(body);
        return Err(AiError::Rejected(format!("{status}: {message}")));
    }

    if !status.is_success() {
        return Err(AiError::Http(format!("upstream {status}")));
    }

    let body: MessagesResponse = response
        .json()
        .await
        .map_err(|e| AiError::Parse(e.to_string()))?;

    let text: String = body
        .content
        .into_iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(text),
            ContentBlock::Other => None,
        })
        .collect::<Vec<_>>()
        .join("\n");

    Ok(text)
}
