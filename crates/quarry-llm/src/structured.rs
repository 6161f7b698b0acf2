use anyhow::{Context, Result, anyhow};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::types::Message;
use crate::ChatBackend;

const MAX_REPAIR_ATTEMPTS: usize = 1;

/// Extract JSON from text that may be wrapped in markdown code fences.
pub fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();
    if let Some(start) = trimmed.find("```json") {
        let after_fence = &trimmed[start + 7..];
        if let Some(end) = after_fence.find("```") {
            return after_fence[..end].trim();
        }
    }
    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        if let Some(end) = after_fence.find("```") {
            return after_fence[..end].trim();
        }
    }
    trimmed
}

/// Chat with the LLM, retrying once with error feedback on failure.
/// `label` is used for log messages (e.g. "Selection", "Generation").
/// `process` receives the raw text content and returns Ok(T) or Err to
/// trigger a repair.
async fn chat_with_repair<T>(
    backend: &impl ChatBackend,
    label: &str,
    messages: Vec<Message>,
    mut process: impl FnMut(&str) -> Result<T>,
) -> Result<T> {
    let mut messages = messages;
    let mut last_error: Option<String> = None;

    for attempt in 0..=MAX_REPAIR_ATTEMPTS {
        if let Some(ref err) = last_error {
            info!("Repair attempt {} for {} error: {}", attempt, label, err);
            messages.push(Message::user(format!(
                "Your previous output had an error: {}\n\nPlease fix the JSON and try again. Output ONLY the corrected JSON object.",
                err
            )));
        }

        let response = backend
            .chat(messages.clone())
            .await
            .context(format!("{} LLM call failed", label))?;

        let content = response
            .text()
            .ok_or_else(|| anyhow!("No response from {}", label.to_lowercase()))?
            .to_string();

        debug!("{} raw output (attempt {}): {}", label, attempt, content);

        messages.push(Message::assistant(&content));

        match process(&content) {
            Ok(result) => return Ok(result),
            Err(e) if attempt < MAX_REPAIR_ATTEMPTS => {
                last_error = Some(e.to_string());
            }
            Err(e) => return Err(e),
        }
    }

    Err(anyhow!("{} failed after repair attempts", label))
}

/// Request a structured object from the model: parse the (possibly
/// fenced) JSON in the reply, retrying once with the parse error fed
/// back.
pub async fn request_structured<T: DeserializeOwned>(
    backend: &impl ChatBackend,
    label: &str,
    messages: Vec<Message>,
) -> Result<T> {
    chat_with_repair(backend, label, messages, |content| {
        let json = extract_json(content);
        serde_json::from_str(json).with_context(|| format!("Failed to parse {} output as JSON", label))
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChatResponse, Choice};
    use serde::Deserialize;
    use std::sync::Mutex;

    /// Mock backend that returns a sequence of responses (for testing
    /// the repair pass).
    struct MockBackend {
        responses: Mutex<Vec<String>>,
        calls: Mutex<usize>,
    }

    impl MockBackend {
        fn new(responses: Vec<&str>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().map(String::from).collect()),
                calls: Mutex::new(0),
            }
        }

        fn call_count(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    impl ChatBackend for MockBackend {
        fn model_name(&self) -> &str {
            "mock"
        }

        async fn chat(&self, _messages: Vec<Message>) -> Result<ChatResponse> {
            *self.calls.lock().unwrap() += 1;
            let mut responses = self.responses.lock().unwrap();
            let text = if responses.is_empty() {
                "{}".to_string()
            } else {
                responses.remove(0)
            };
            Ok(ChatResponse {
                id: "mock".to_string(),
                choices: vec![Choice {
                    index: 0,
                    message: Message::assistant(&text),
                    finish_reason: Some("stop".to_string()),
                }],
                usage: None,
            })
        }
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Out {
        value: u32,
    }

    #[test]
    fn extract_json_plain() {
        let input = r#"{"value": 1}"#;
        assert_eq!(extract_json(input), input);
    }

    #[test]
    fn extract_json_code_fence() {
        let input = "```json\n{\"value\": 1}\n```";
        assert_eq!(extract_json(input), r#"{"value": 1}"#);
    }

    #[test]
    fn extract_json_plain_fence() {
        let input = "```\n{\"value\": 1}\n```";
        assert_eq!(extract_json(input), r#"{"value": 1}"#);
    }

    #[tokio::test]
    async fn structured_parses_first_attempt() {
        let backend = MockBackend::new(vec![r#"{"value": 5}"#]);
        let out: Out = request_structured(&backend, "Test", vec![Message::user("go")])
            .await
            .unwrap();
        assert_eq!(out, Out { value: 5 });
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn structured_repairs_once_then_succeeds() {
        let backend = MockBackend::new(vec!["not json at all", r#"{"value": 9}"#]);
        let out: Out = request_structured(&backend, "Test", vec![Message::user("go")])
            .await
            .unwrap();
        assert_eq!(out, Out { value: 9 });
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test]
    async fn structured_gives_up_after_repair() {
        let backend = MockBackend::new(vec!["garbage", "still garbage"]);
        let result: Result<Out> =
            request_structured(&backend, "Test", vec![Message::user("go")]).await;
        assert!(result.is_err());
        assert_eq!(backend.call_count(), 2);
    }
}
