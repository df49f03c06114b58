//! Extraction invoker: asks the extraction agent to rebuild clean question
//! content from polluted markup and maps its reply onto [`ExtractionResult`].
//!
//! Never returns an error. Timeouts, empty replies, missing JSON and mapping
//! failures all become `success = false` results.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use super::error::AgentError;
use super::json_block::parse_agent_json;
use super::pacing::CancellationToken;
use super::traits::AgentClient;
use super::types::*;

const TRUNCATION_MARKER: &str = "... [truncated]";

const EXTRACTION_SYSTEM_PROMPT: &str = "\
You extract clean exam-question content from corrupted HTML.

The HTML was captured from pages whose AngularJS templates were never rendered,
so the real question is mixed with template code.

IGNORE: HTML comments such as `<!-- ngIf: ... -->` and `<!-- ngRepeat: ... -->`,
attributes such as ng-if, ng-repeat, ng-click, ng-model, ng-class, tec-*, aria-*,
data-*, bindings such as vm.questao.* and {{...}}, framework classes, navigation
buttons, radio buttons and form labels.

EXTRACT:
1. The statement text, keeping paragraph breaks, without tags or attributes.
2. The alternatives: Certo/Errado as letters C and E, or A-E with their text.
3. Real image URLs (not data: URIs, not placeholders) as markdown `![Imagem](URL)`.

Reply with ONLY one JSON object:
{
  \"success\": true,
  \"content\": \"clean statement\",
  \"alternatives\": [{\"letter\": \"C\", \"text\": \"Certo\"}, {\"letter\": \"E\", \"text\": \"Errado\"}],
  \"images\": [\"url\"],
  \"content_type\": \"TRUE_FALSE\" or \"MULTIPLE_CHOICE\",
  \"confidence\": 0.95,
  \"notes\": \"remarks about the extraction\"
}

If no valid content can be extracted:
{\"success\": false, \"error\": \"what went wrong\", \"confidence\": 0}";

/// Wire shape of the extraction agent's JSON reply.
#[derive(Debug, Deserialize)]
struct ExtractionReply {
    success: bool,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    alternatives: Vec<Alternative>,
    #[serde(default)]
    images: Vec<String>,
    #[serde(default)]
    content_type: ContentType,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ExtractionReply {
    fn into_result(self) -> Result<ExtractionResult, String> {
        if !self.success {
            return Ok(ExtractionResult::failure(
                self.error.unwrap_or_else(|| "agent reported failure without a reason".to_string()),
            ));
        }
        let content = self
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| "success reply without content".to_string())?;
        let confidence = self
            .confidence
            .ok_or_else(|| "success reply without confidence".to_string())?;
        if !(0.0..=1.0).contains(&confidence) {
            return Err(format!("confidence out of range: {confidence}"));
        }
        Ok(ExtractionResult::extracted(
            content,
            confidence,
            self.alternatives,
            self.images,
            self.content_type,
            self.notes,
        ))
    }
}

/// Cut `raw` to at most `max_chars` characters, marking the cut.
pub fn truncate_input(raw: &str, max_chars: usize) -> String {
    match raw.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{TRUNCATION_MARKER}", &raw[..byte_idx]),
        None => raw.to_string(),
    }
}

pub struct ExtractionInvoker {
    agent: Arc<dyn AgentClient>,
    model: String,
    max_input_chars: usize,
    timeout: Duration,
    cancel: CancellationToken,
}

impl ExtractionInvoker {
    pub fn new(agent: Arc<dyn AgentClient>, config: &CleanupConfig) -> Self {
        Self {
            agent,
            model: config.model_name.clone(),
            max_input_chars: config.max_input_chars,
            timeout: config.extraction_timeout(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Reconstruct clean content from `raw_content`.
    pub async fn clean(&self, raw_content: &str) -> ExtractionResult {
        let input = truncate_input(raw_content, self.max_input_chars);
        let prompt = format!("Extract the clean content of this corrupted question:\n\n{input}");

        let response = match self.call(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "Extraction agent call failed");
                return ExtractionResult::failure(format!("Extraction agent failed: {e}"));
            }
        };

        let response = response.trim();
        if response.is_empty() {
            return ExtractionResult::failure("Empty response from extraction agent");
        }

        let reply: ExtractionReply = match parse_agent_json(response) {
            Ok(reply) => reply,
            Err(e) => {
                let preview: String = response.chars().take(200).collect();
                tracing::warn!(error = %e, preview = %preview, "Extraction response has no usable JSON");
                return ExtractionResult::failure(format!("Extraction response not usable: {e}"));
            }
        };

        reply.into_result().unwrap_or_else(|reason| {
            tracing::warn!(reason = %reason, "Extraction reply rejected");
            ExtractionResult::failure(format!("Extraction reply rejected: {reason}"))
        })
    }

    /// Agent call bounded by the stage deadline and the run's cancellation.
    /// The request future is dropped on either, aborting the transport call.
    async fn call(&self, prompt: &str) -> Result<String, AgentError> {
        let request = self.agent.generate(&self.model, EXTRACTION_SYSTEM_PROMPT, prompt);
        tokio::select! {
            _ = self.cancel.cancelled() => Err(AgentError::Cancelled),
            outcome = tokio::time::timeout(self.timeout, request) => match outcome {
                Ok(result) => result,
                Err(_) => Err(AgentError::Timeout(self.timeout.as_millis() as u64, "extraction")),
            },
        }
    }
}
