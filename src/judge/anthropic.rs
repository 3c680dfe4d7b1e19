//! Anthropic-backed judge — calls the messages API for semantic
//! relevance scoring.
//!
//! One call per email. Prompt size is bounded (body capped), and any
//! response without a parseable numeric score is an `InvalidResponse`
//! error — never silently score zero.

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

use crate::error::JudgeError;
use crate::judge::{CaseContext, Judge, JudgmentResult};
use crate::record::EmailRecord;

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-sonnet-4-5";
const MAX_RESPONSE_TOKENS: u32 = 512;

/// Body chars included in the prompt. Long bodies carry their signal
/// early; the tail is mostly quoted thread history.
const BODY_PROMPT_CHARS: usize = 2000;

/// Judge backed by the Anthropic messages API.
pub struct AnthropicJudge {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
}

impl AnthropicJudge {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[async_trait::async_trait]
impl Judge for AnthropicJudge {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn judge(
        &self,
        email: &EmailRecord,
        context: &CaseContext,
    ) -> Result<JudgmentResult, JudgeError> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": MAX_RESPONSE_TOKENS,
            "system": build_system_prompt(context),
            "messages": [{"role": "user", "content": build_user_prompt(email)}],
        });

        let response = self
            .client
            .post(API_URL)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| JudgeError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .map(std::time::Duration::from_secs);
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, retry_after, text));
        }

        let payload: MessagesResponse = response
            .json()
            .await
            .map_err(|e| JudgeError::InvalidResponse(format!("response body: {e}")))?;

        let text = payload
            .content
            .iter()
            .find(|block| block.kind == "text")
            .map(|block| block.text.as_str())
            .ok_or_else(|| JudgeError::InvalidResponse("no text block in response".into()))?;

        debug!(sender = %email.sender_address, "Judge responded");
        parse_judgment(text)
    }
}

/// Map an HTTP error status onto the judge error taxonomy.
fn classify_status(
    status: StatusCode,
    retry_after: Option<std::time::Duration>,
    body: String,
) -> JudgeError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => JudgeError::AuthFailed,
        StatusCode::TOO_MANY_REQUESTS => JudgeError::RateLimited { retry_after },
        _ => JudgeError::Http {
            status: status.as_u16(),
            body,
        },
    }
}

// ── Prompt construction ─────────────────────────────────────────────

fn build_system_prompt(context: &CaseContext) -> String {
    let mut prompt = String::with_capacity(512);
    prompt.push_str(
        "You assist an attorney triaging emails for relevance in a document review.\n\
         Entities of interest (companies, domains, addresses):\n",
    );
    for entity in &context.entities {
        prompt.push_str("- ");
        prompt.push_str(entity);
        prompt.push('\n');
    }
    prompt.push_str("\nKeyword categories under review: ");
    prompt.push_str(&context.taxonomy);
    prompt.push_str(
        "\n\nRate the email's relevance to these entities and topics on a 0-100 scale:\n\
         - 80-100: directly discusses the entities and the core topics\n\
         - 50-79: discusses the topics or the entities substantively\n\
         - 20-49: tangential mention\n\
         - 0-19: unrelated\n\n\
         Respond with ONLY a JSON object:\n\
         {\"score\": 0, \"rationale\": \"one sentence\", \"confident\": true}\n\
         Set \"confident\" to false when the email is too fragmentary to assess.",
    );
    prompt
}

fn build_user_prompt(email: &EmailRecord) -> String {
    let mut prompt = String::with_capacity(1024);
    prompt.push_str(&format!(
        "Date: {}\n",
        email.timestamp.format("%Y-%m-%d %H:%M:%S")
    ));
    if email.sender_name.is_empty() {
        prompt.push_str(&format!("From: {}\n", email.sender_address));
    } else {
        prompt.push_str(&format!(
            "From: {} <{}>\n",
            email.sender_name, email.sender_address
        ));
    }
    prompt.push_str(&format!("To: {}\n", email.recipients.join("; ")));
    prompt.push_str(&format!("Subject: {}\n", email.subject));

    let preview: String = email.body.chars().take(BODY_PROMPT_CHARS).collect();
    prompt.push_str(&format!("\nBody:\n{preview}"));
    prompt
}

// ── Response parsing ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

/// The judgment object the model is asked to emit.
#[derive(Debug, Deserialize)]
struct JudgmentPayload {
    /// Required: a response lacking a numeric score is an error, not a
    /// zero.
    score: Option<f64>,
    #[serde(default)]
    rationale: String,
    #[serde(default = "default_confident")]
    confident: bool,
}

fn default_confident() -> bool {
    true
}

/// Parse the model's output into a `JudgmentResult`.
fn parse_judgment(raw: &str) -> Result<JudgmentResult, JudgeError> {
    let json_str = extract_json_object(raw);
    let payload: JudgmentPayload = serde_json::from_str(&json_str)
        .map_err(|e| JudgeError::InvalidResponse(format!("JSON parse error: {e}")))?;

    let score = payload
        .score
        .ok_or_else(|| JudgeError::InvalidResponse("missing score field".into()))?;
    if !score.is_finite() {
        return Err(JudgeError::InvalidResponse("non-finite score".into()));
    }

    Ok(JudgmentResult {
        score: (score.round().max(0.0) as u32).min(100),
        rationale: payload.rationale,
        confident: payload.confident,
    })
}

/// Extract a JSON object from model output (handles markdown wrapping).
fn extract_json_object(text: &str) -> String {
    let trimmed = text.trim();

    if trimmed.starts_with('{') {
        return trimmed.to_string();
    }

    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with('{') {
                return inner.to_string();
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && end > start
    {
        return trimmed[start..=end].to_string();
    }

    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn make_record() -> EmailRecord {
        EmailRecord {
            sender_name: "Jane Rep".into(),
            sender_address: "rep@healthleads.com".into(),
            recipients: vec!["owner@dmeco.com".into()],
            cc: vec![],
            subject: "Missing orders".into(),
            body: "x".repeat(5000),
            timestamp: Utc.with_ymd_and_hms(2019, 3, 14, 9, 30, 0).unwrap(),
            folder: "Inbox".into(),
            attachment_names: vec![],
        }
    }

    #[test]
    fn system_prompt_carries_case_context() {
        let context = CaseContext {
            entities: vec!["@healthleads.com".into(), "ABC Marketing".into()],
            taxonomy: "doctor_authorization (weight 3)".into(),
        };
        let prompt = build_system_prompt(&context);
        assert!(prompt.contains("@healthleads.com"));
        assert!(prompt.contains("ABC Marketing"));
        assert!(prompt.contains("doctor_authorization"));
        assert!(prompt.contains("0-100"));
    }

    #[test]
    fn user_prompt_is_bounded() {
        let prompt = build_user_prompt(&make_record());
        assert!(prompt.contains("From: Jane Rep <rep@healthleads.com>"));
        assert!(prompt.contains("Subject: Missing orders"));
        // 5000-char body capped to BODY_PROMPT_CHARS plus headers.
        assert!(prompt.len() < BODY_PROMPT_CHARS + 300);
    }

    #[test]
    fn parses_plain_json() {
        let result =
            parse_judgment(r#"{"score": 85, "rationale": "discusses orders", "confident": true}"#)
                .unwrap();
        assert_eq!(result.score, 85);
        assert_eq!(result.rationale, "discusses orders");
        assert!(result.confident);
    }

    #[test]
    fn parses_markdown_wrapped_json() {
        let raw = "Here is my assessment:\n```json\n{\"score\": 42, \"rationale\": \"tangential\"}\n```";
        let result = parse_judgment(raw).unwrap();
        assert_eq!(result.score, 42);
        assert!(result.confident); // defaults true when omitted
    }

    #[test]
    fn parses_embedded_object() {
        let raw = "Assessment: {\"score\": 10, \"rationale\": \"unrelated\"} done";
        assert_eq!(parse_judgment(raw).unwrap().score, 10);
    }

    #[test]
    fn missing_score_is_an_error_not_zero() {
        let err = parse_judgment(r#"{"rationale": "no idea"}"#).unwrap_err();
        assert!(matches!(err, JudgeError::InvalidResponse(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(parse_judgment("I cannot assess this email.").is_err());
    }

    #[test]
    fn out_of_range_scores_clamped() {
        assert_eq!(parse_judgment(r#"{"score": 150}"#).unwrap().score, 100);
        assert_eq!(parse_judgment(r#"{"score": -5}"#).unwrap().score, 0);
        assert_eq!(parse_judgment(r#"{"score": 87.6}"#).unwrap().score, 88);
    }

    #[test]
    fn status_classification() {
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, None, String::new()),
            JudgeError::AuthFailed
        ));
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, None, String::new()),
            JudgeError::RateLimited { .. }
        ));
        let server = classify_status(StatusCode::BAD_GATEWAY, None, "upstream".into());
        assert!(server.is_transient());
        let client = classify_status(StatusCode::BAD_REQUEST, None, "bad".into());
        assert!(!client.is_transient());
    }

    #[test]
    fn judge_is_enabled() {
        let judge = AnthropicJudge::new(SecretString::from("test-key")).with_model("test-model");
        assert!(judge.enabled());
        assert_eq!(judge.name(), "anthropic");
    }
}
