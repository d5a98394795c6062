use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::llm::AiError;

const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Serialize)]
struct ChatRequest<'a> {
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
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Single chat completion against an OpenAI-compatible endpoint.
pub(super) async fn complete(
    http: &reqwest::Client,
    api_key: &str,
    model: &str,
    max_tokens: u32,
    timeout: Duration,
    prompt: &str,
) -> Result<String, AiError> {
    let start = std::time::Instant::now();

    let request = ChatRequest {
        model,
        max_tokens,
        messages: vec![WireMessage {
            role: "user",
            content: prompt,
        }],
    };

    let response = http
        .post(CHAT_COMPLETIONS_URL)
        .bearer_auth(api_key)
        .timeout(timeout)
        .json(&request)
        .send()
        .await
        .map_err(|e| AiError::Http(e.to_string()))?;

    let status = response.status();
    metrics::histogram!("ai.request.latency", "provider" => "openai")
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
        return Err(AiError::Rejected(format!("{status}: {body}")));
    }

    if !status.is_success() {
        return Err(AiError::Http(format!("upstream {status}")));
    }

    let body: ChatResponse = response
        .json()
        .await
        .map_err(|e| AiError::Parse(e.to_string()))?;

    body.choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| AiError::Parse("empty choices".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_response() {
        let json = r#"{
            "choices": [{"message": {"role": "assistant", "content": "Hi Marcus,"}}]
        }"#;
        let parsed: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("Hi Marcus,")
        );
    }
}
