//! Deterministic content rules applied to an extraction before it may be
//! persisted.
//!
//! Every rule runs (no short-circuit) so the verdict lists all problems:
//! 1. Minimum confidence
//! 2. Minimum cleaned content length
//! 3. No residual template tokens
//! 4. Enough alternatives, each with text
//! 5. Images missing from the extraction only warn; the merger restores them

use super::images::extract_images;
use super::signature::residual_tokens;
use super::types::*;

pub struct ContentValidator {
    min_confidence: f32,
    min_content_chars: usize,
    min_alternatives: usize,
}

impl ContentValidator {
    pub fn new(min_confidence: f32, min_content_chars: usize, min_alternatives: usize) -> Self {
        Self {
            min_confidence,
            min_content_chars,
            min_alternatives,
        }
    }

    pub fn from_config(config: &CleanupConfig) -> Self {
        Self::new(
            config.validation_min_confidence,
            config.min_content_chars,
            config.min_alternatives,
        )
    }

    pub fn validate(&self, result: &ExtractionResult, original_raw: &str) -> ValidationVerdict {
        let mut violations = Vec::new();

        let confidence = result.confidence_or_zero();
        if confidence < self.min_confidence {
            violations.push(format!("Confidence too low: {confidence}"));
        }

        let content = result.content_str();
        let length = content.chars().count();
        if length < self.min_content_chars {
            violations.push(format!("Content too short: {length} characters"));
        }

        for token in residual_tokens(content) {
            violations.push(format!("Content still contains template markup: {token}"));
        }

        if result.alternatives.len() < self.min_alternatives {
            violations.push(format!(
                "Fewer than {} alternatives: {}",
                self.min_alternatives,
                result.alternatives.len()
            ));
        }
        for alt in &result.alternatives {
            if alt.text.trim().is_empty() {
                violations.push(format!("Alternative {} has no text", alt.letter));
            }
        }

        let original_images = extract_images(original_raw);
        let missing = original_images
            .iter()
            .filter(|url| !result.images.contains(url))
            .count();
        if missing > 0 {
            tracing::warn!(
                missing,
                original = original_images.len(),
                "Extraction omitted images from the original; they will be merged back"
            );
        }

        ValidationVerdict { violations }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alts(texts: &[(&str, &str)]) -> Vec<Alternative> {
        texts
            .iter()
            .map(|(l, t)| Alternative { letter: l.to_string(), text: t.to_string() })
            .collect()
    }

    fn good_result(confidence: f32) -> ExtractionResult {
        ExtractionResult::extracted(
            "Em relação à administração pública, julgue o item a seguir.".to_string(),
            confidence,
            alts(&[("C", "Certo"), ("E", "Errado")]),
            vec![],
            ContentType::TrueFalse,
            None,
        )
    }

    fn validator() -> ContentValidator {
        ContentValidator::from_config(&CleanupConfig::default())
    }

    #[test]
    fn accepts_clean_extraction() {
        let verdict = validator().validate(&good_result(0.95), "<p ng-if=\"x\">raw</p>");
        assert!(verdict.is_valid(), "violations: {:?}", verdict.violations);
    }

    #[test]
    fn accepts_confidence_exactly_at_threshold() {
        assert!(validator().validate(&good_result(0.70), "").is_valid());
    }

    #[test]
    fn rejects_low_confidence_citing_value() {
        let verdict = validator().validate(&good_result(0.5), "");
        assert_eq!(verdict.violations, vec!["Confidence too low: 0.5".to_string()]);
    }

    #[test]
    fn rejects_residual_token_even_at_high_confidence() {
        let mut result = good_result(0.99);
        result.content = Some("Julgue o item <div ng-if=\"vm.questao.x\"> com cuidado e atenção.".to_string());
        let verdict = validator().validate(&result, "");
        assert!(!verdict.is_valid());
        assert!(verdict.violations.iter().any(|v| v.ends_with("ng-if")));
        assert!(verdict.violations.iter().any(|v| v.ends_with("vm.questao")));
    }

    #[test]
    fn reports_every_violation() {
        let result = ExtractionResult::extracted(
            "curto".to_string(),
            0.4,
            alts(&[("A", "")]),
            vec![],
            ContentType::MultipleChoice,
            None,
        );
        let verdict = validator().validate(&result, "");
        assert_eq!(verdict.violations.len(), 4, "{:?}", verdict.violations);
        assert!(verdict.violations[1].contains("5 characters"));
        assert!(verdict.violations[3].contains("Alternative A"));
    }

    #[test]
    fn each_empty_alternative_named() {
        let mut result = good_result(0.95);
        result.alternatives = alts(&[("A", "um"), ("B", " "), ("C", "")]);
        let verdict = validator().validate(&result, "");
        assert_eq!(
            verdict.violations,
            vec!["Alternative B has no text".to_string(), "Alternative C has no text".to_string()]
        );
    }

    #[test]
    fn missing_images_do_not_invalidate() {
        let raw = r#"<img src="https://cdn.test/a.png"><img src="https://cdn.test/b.png">"#;
        let mut result = good_result(0.95);
        result.images = vec!["https://cdn.test/a.png".to_string()];
        assert!(validator().validate(&result, raw).is_valid());
    }

    #[test]
    fn failed_extraction_reports_missing_fields() {
        let verdict = validator().validate(&ExtractionResult::failure("x"), "");
        assert!(verdict.violations.iter().any(|v| v == "Confidence too low: 0"));
        assert!(verdict.violations.iter().any(|v| v == "Content too short: 0 characters"));
    }
}
