//! Review invoker: second, independent opinion on a cleaned question whose
//! extraction confidence is in the middle tier.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use super::error::AgentError;
use super::json_block::parse_agent_json;
use super::pacing::CancellationToken;
use super::traits::AgentClient;
use super::types::*;

/// Statements shorter than this are rejected without asking the agent.
const MIN_REVIEWABLE_CHARS: usize = 10;

const REVIEW_SYSTEM_PROMPT: &str = "\
You review public-exam questions that were reconstructed from corrupted HTML
and decide whether each one is complete and correct enough to publish.

APPROVE when the statement is grammatical and makes sense, poses a clear
assertion or question, the alternatives match the question type (Certo/Errado
or A-E), the text is not truncated, and no code, HTML or template remains.

REJECT when the text is truncated or incomplete, context is missing, the
alternatives make no sense, code or HTML is mixed in, or it is only a fragment.

Reply with ONLY one JSON object:
{\"approved\": true, \"confidence\": 0.95, \"reason\": \"short explanation\"}";

#[derive(Debug, Deserialize)]
struct ReviewReply {
    #[serde(default)]
    approved: serde_json::Value,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default)]
    reason: Option<String>,
}

fn format_alternatives(alternatives: &[Alternative]) -> String {
    alternatives
        .iter()
        .map(|a| format!("{}) {}", a.letter, a.text))
        .collect::<Vec<_>>()
        .join("\n")
}

pub struct ReviewInvoker {
    agent: Arc<dyn AgentClient>,
    model: String,
    timeout: Duration,
    cancel: CancellationToken,
}

impl ReviewInvoker {
    pub fn new(agent: Arc<dyn AgentClient>, config: &CleanupConfig) -> Self {
        Self {
            agent,
            model: config.model_name.clone(),
            timeout: config.review_timeout(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Review a cleaned statement and its alternatives.
    ///
    /// Unusable replies come back as a non-approved verdict; only transport
    /// failures, the deadline and cancellation are errors.
    pub async fn review(
        &self,
        content: &str,
        alternatives: &[Alternative],
    ) -> Result<ReviewVerdict, AgentError> {
        if content.trim().chars().count() < MIN_REVIEWABLE_CHARS {
            return Ok(ReviewVerdict::rejected(1.0, "Statement too short or empty"));
        }

        let prompt = format!(
            "Review this exam question:\n\nStatement:\n{content}\n\nAlternatives:\n{}",
            format_alternatives(alternatives)
        );

        let request = self.agent.generate(&self.model, REVIEW_SYSTEM_PROMPT, &prompt);
        let response = tokio::select! {
            _ = self.cancel.cancelled() => return Err(AgentError::Cancelled),
            outcome = tokio::time::timeout(self.timeout, request) => match outcome {
                Ok(result) => result?,
                Err(_) => return Err(AgentError::Timeout(self.timeout.as_millis() as u64, "review")),
            },
        };

        Ok(parse_verdict(&response))
    }
}

fn parse_verdict(response: &str) -> ReviewVerdict {
    if response.trim().is_empty() {
        return ReviewVerdict::rejected(0.0, "Empty response from review agent");
    }

    let reply: ReviewReply = match parse_agent_json(response) {
        Ok(reply) => reply,
        Err(e) => {
            tracing::warn!(error = %e, "Review response has no usable JSON");
            return ReviewVerdict::rejected(0.0, "Review response contains no valid JSON");
        }
    };

    let Some(approved) = reply.approved.as_bool() else {
        return ReviewVerdict::rejected(0.0, "Review response has no boolean verdict");
    };

    let confidence = reply.confidence.unwrap_or(0.0);
    if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
        tracing::warn!(confidence, "Review confidence outside [0, 1]");
        return ReviewVerdict::rejected(0.0, "Review confidence out of range");
    }

    ReviewVerdict {
        approved,
        confidence,
        reason: reply
            .reason
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| "No reason given".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ollama::MockAgentClient;

    const STATEMENT: &str = "A rotatividade é uma relação entre consumo e estoque médio.";

    fn alts() -> Vec<Alternative> {
        vec![
            Alternative { letter: "C".into(), text: "Certo".into() },
            Alternative { letter: "E".into(), text: "Errado".into() },
        ]
    }

    fn reviewer(mock: MockAgentClient) -> ReviewInvoker {
        ReviewInvoker::new(Arc::new(mock), &CleanupConfig::default())
    }

    #[tokio::test]
    async fn parses_approval() {
        let mock = MockAgentClient::new(r#"{"approved": true, "confidence": 0.9, "reason": "coerente"}"#);
        let verdict = reviewer(mock).review(STATEMENT, &alts()).await.unwrap();
        assert!(verdict.approved);
        assert_eq!(verdict.confidence, 0.9);
        assert_eq!(verdict.reason, "coerente");
    }

    #[tokio::test]
    async fn prompt_lists_alternatives() {
        let mock = MockAgentClient::with_responder(|_, prompt| {
            assert!(prompt.contains("C) Certo\nE) Errado"));
            Ok(r#"{"approved": false, "confidence": 0.5, "reason": "x"}"#.to_string())
        });
        let verdict = reviewer(mock).review(STATEMENT, &alts()).await.unwrap();
        assert!(!verdict.approved);
    }

    #[tokio::test]
    async fn short_statement_rejected_without_call() {
        let mock = Arc::new(MockAgentClient::new(r#"{"approved": true, "confidence": 1}"#));
        let invoker = ReviewInvoker::new(mock.clone(), &CleanupConfig::default());
        let verdict = invoker.review("curto", &alts()).await.unwrap();
        assert!(!verdict.approved);
        assert_eq!(verdict.confidence, 1.0);
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn non_boolean_verdict_is_rejection() {
        let mock = MockAgentClient::new(r#"{"approved": "yes", "confidence": 0.99}"#);
        let verdict = reviewer(mock).review(STATEMENT, &alts()).await.unwrap();
        assert!(!verdict.approved);
        assert_eq!(verdict.confidence, 0.0);
    }

    #[tokio::test]
    async fn out_of_range_confidence_is_rejection() {
        for reply in [
            r#"{"approved": true, "confidence": 85, "reason": "ok"}"#,
            r#"{"approved": true, "confidence": -0.2, "reason": "ok"}"#,
        ] {
            let verdict = reviewer(MockAgentClient::new(reply)).review(STATEMENT, &alts()).await.unwrap();
            assert!(!verdict.approved, "approved {reply}");
            assert_eq!(verdict.confidence, 0.0);
            assert_eq!(verdict.reason, "Review confidence out of range");
        }
    }

    #[tokio::test]
    async fn missing_fields_get_defaults() {
        let mock = MockAgentClient::new("```json\n{\"approved\": true}\n```");
        let verdict = reviewer(mock).review(STATEMENT, &alts()).await.unwrap();
        assert!(verdict.approved);
        assert_eq!(verdict.confidence, 0.0);
        assert_eq!(verdict.reason, "No reason given");
    }

    #[tokio::test]
    async fn empty_reply_is_rejection() {
        let verdict = reviewer(MockAgentClient::new("")).review(STATEMENT, &alts()).await.unwrap();
        assert!(!verdict.approved);
        assert!(verdict.reason.contains("Empty response"));
    }

    #[tokio::test]
    async fn transport_error_propagates() {
        let err = reviewer(MockAgentClient::failing("503"))
            .review(STATEMENT, &alts())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::HttpClient(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_review_times_out() {
        let mock = MockAgentClient::new(r#"{"approved": true, "confidence": 0.9}"#)
            .with_delay(Duration::from_secs(45));
        let err = reviewer(mock).review(STATEMENT, &alts()).await.unwrap_err();
        assert!(matches!(err, AgentError::Timeout(30_000, "review")));
    }
}
