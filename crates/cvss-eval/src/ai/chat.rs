//! Wire types shared by the OpenAI-compatible chat endpoints.

use super::CompletionRequest;
use crate::error::ProviderError;
use reqwest::blocking::Response;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ChatRequest {
    pub fn from_completion(model: Option<String>, request: &CompletionRequest) -> Self {
        Self {
            model,
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: request.system.clone(),
                },
                Message {
                    role: "user".to_string(),
                    content: request.user.clone(),
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Message {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    pub choices: Option<Vec<Choice>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Choice {
    pub message: Option<Message>,
}

impl ChatResponse {
    /// Content of the first choice's message.
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .as_ref()
            .and_then(|choices| choices.first())
            .and_then(|choice| choice.message.as_ref())
            .map(|msg| msg.content.as_str())
    }
}

/// Map a transport failure, keeping 429s retryable.
pub(crate) fn transport_error(service: &str, err: reqwest::Error) -> ProviderError {
    if err.status().is_some_and(|status| status.as_u16() == 429) {
        ProviderError::RateLimited(format!("{service}: {err}"))
    } else {
        ProviderError::from_message(format!("{service}: {err}"))
    }
}

/// Turn an HTTP response into the completion text.
pub(crate) fn read_completion(service: &str, response: Response) -> Result<String, ProviderError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        let message = format!("{service} API Error {status}: {body}");
        return Err(if status.as_u16() == 429 {
            ProviderError::RateLimited(message)
        } else {
            ProviderError::Request(message)
        });
    }

    let result: ChatResponse = response
        .json()
        .map_err(|err| ProviderError::Request(format!("{service}: invalid response body: {err}")))?;

    result
        .first_content()
        .map(str::to_string)
        .ok_or(ProviderError::EmptyResponse)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_response_structure() {
        let json = r#"{
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": "LOW | NETWORK | NONE | NONE | UNCHANGED | HIGH | HIGH | HIGH | CRITICAL"
                }
            }]
        }"#;

        let response: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            response.first_content(),
            Some("LOW | NETWORK | NONE | NONE | UNCHANGED | HIGH | HIGH | HIGH | CRITICAL")
        );
    }

    #[test]
    fn test_parse_response_with_empty_or_null_choices() {
        let response: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(response.first_content().is_none());

        let response: ChatResponse = serde_json::from_str(r#"{"choices": null}"#).unwrap();
        assert!(response.first_content().is_none());

        let response: ChatResponse =
            serde_json::from_str(r#"{"choices": [{"message": null}]}"#).unwrap();
        assert!(response.first_content().is_none());
    }

    #[test]
    fn test_parse_malformed_json() {
        let json = r#"{"choices": [{"message": "not an object"}]}"#;
        let result: Result<ChatResponse, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_request_carries_system_then_user() {
        let request = ChatRequest::from_completion(
            Some("gpt-4o".to_string()),
            &CompletionRequest {
                system: "sys".to_string(),
                user: "usr".to_string(),
                max_tokens: 1000,
                temperature: 0.2,
            },
        );
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-4o");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "usr");
        assert_eq!(json["max_tokens"], 1000);
    }

    #[test]
    fn test_request_without_model_omits_field() {
        let request = ChatRequest::from_completion(
            None,
            &CompletionRequest {
                system: String::new(),
                user: String::new(),
                max_tokens: 1,
                temperature: 0.0,
            },
        );
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("model").is_none());
    }
}
