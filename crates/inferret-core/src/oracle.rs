//! The oracle boundary.
//!
//! An [`Oracle`] answers one yes/no question about a code region. Every
//! oracle receives the same three-message prompt built by
//! [`OracleRequest::messages`] and must answer with the JSON envelope
//! `{"assertion": true}` or `{"assertion": false}`; [`parse_verdict`]
//! decodes that envelope.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::InferenceSpec;
use crate::error::OracleError;

/// Answers yes/no questions about a code payload.
///
/// Implementations must be stateless across calls: the executor calls
/// `ask` once per sample and sibling inferences call it concurrently.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Ask whether `request.assertion` holds for `request.code`.
    async fn ask(&self, request: &OracleRequest<'_>) -> Result<bool, OracleError>;
}

/// One sampling request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OracleRequest<'a> {
    pub tag: &'a str,
    pub code: &'a str,
    pub assertion: &'a str,
    pub model: &'a str,
    /// Zero means no explicit limit.
    pub max_tokens: u32,
    pub temperature: f64,
}

impl<'a> OracleRequest<'a> {
    pub fn new(spec: &'a InferenceSpec, code: &'a str) -> Self {
        Self {
            tag: &spec.tag,
            code,
            assertion: &spec.assertion,
            model: &spec.model,
            max_tokens: spec.max_tokens,
            temperature: spec.temperature,
        }
    }

    /// The chat prompt sent for this request.
    pub fn messages(&self) -> Vec<PromptMessage> {
        vec![
            PromptMessage::system(format!(
                "Here is a code block tagged as [{}]. Please analyze the following code: \n\n{}",
                self.tag, self.code
            )),
            PromptMessage::system(
                "Based on the code analysis, answer the following question with a JSON-formatted \
                 boolean response in the format: ```{\"assertion\": true}```.",
            ),
            PromptMessage::user(format!(
                "Is the following assertion about the code true? {}",
                self.assertion
            )),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct VerdictEnvelope {
    assertion: bool,
}

/// Decode an `{"assertion": <bool>}` envelope.
///
/// Surrounding whitespace and a single markdown code fence are tolerated;
/// anything else that is not exactly a boolean `assertion` field is an
/// [`OracleError::MalformedVerdict`].
pub fn parse_verdict(content: &str) -> Result<bool, OracleError> {
    let body = strip_code_fence(content.trim());
    serde_json::from_str::<VerdictEnvelope>(body)
        .map(|envelope| envelope.assertion)
        .map_err(|e| OracleError::MalformedVerdict {
            content: content.to_string(),
            reason: e.to_string(),
        })
}

fn strip_code_fence(text: &str) -> &str {
    let Some(inner) = text.strip_prefix("```") else {
        return text;
    };
    let Some(inner) = inner.strip_suffix("```") else {
        return text;
    };
    // Drop an optional language tag such as ```json.
    let inner = inner.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    inner.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> InferenceSpec {
        InferenceSpec {
            tag: "auth".to_string(),
            assertion: "the function validates input".to_string(),
            model: "gpt-4o".to_string(),
            count: 1,
            threshold: 1.0,
            max_tokens: 16,
            temperature: 0.3,
            line: 1,
        }
    }

    #[test]
    fn request_carries_spec_parameters() {
        let spec = spec();
        let request = OracleRequest::new(&spec, "fn check() {}\n");
        assert_eq!(request.tag, "auth");
        assert_eq!(request.model, "gpt-4o");
        assert_eq!(request.max_tokens, 16);
        assert_eq!(request.temperature, 0.3);
    }

    #[test]
    fn prompt_embeds_code_and_assertion() {
        let spec = spec();
        let messages = OracleRequest::new(&spec, "fn check() {}\n").messages();

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.contains("[auth]"));
        assert!(messages[0].content.ends_with("fn check() {}\n"));
        assert!(messages[1].content.contains("{\"assertion\": true}"));
        assert_eq!(messages[2].role, Role::User);
        assert!(messages[2].content.ends_with("the function validates input"));
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_value(PromptMessage::user("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "user", "content": "hi"}));
    }

    #[test]
    fn verdict_envelope_is_decoded() {
        assert_eq!(parse_verdict(r#"{"assertion": true}"#), Ok(true));
        assert_eq!(parse_verdict(" {\"assertion\":false}\n"), Ok(false));
        assert_eq!(parse_verdict("```json\n{\"assertion\": true}\n```"), Ok(true));
        assert_eq!(parse_verdict("```{\"assertion\": false}```"), Ok(false));
    }

    #[test]
    fn non_boolean_verdicts_are_rejected() {
        for content in [
            "",
            "true",
            r#"{"assertion": "true"}"#,
            r#"{"assertion": 1}"#,
            r#"{"answer": true}"#,
            "Yes, the function validates input.",
        ] {
            assert!(
                matches!(parse_verdict(content), Err(OracleError::MalformedVerdict { .. })),
                "accepted {content:?}"
            );
        }
    }
}
