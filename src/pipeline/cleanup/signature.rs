//! Corruption signature: substrings left behind by unrendered AngularJS
//! templates in scraped question statements.

/// Tokens that put a record in the backlog.
pub const CORRUPTION_SIGNATURE: &[&str] = &["ng-if", "ng-repeat", "<!-- ngIf"];

/// Tokens that must not survive in cleaned content.
pub const RESIDUAL_TEMPLATE_TOKENS: &[&str] =
    &["ng-if", "ng-repeat", "ng-model", "vm.questao", "<!-- ngIf"];

/// True if `text` still carries the corruption signature.
///
/// Matching is ASCII case-insensitive, mirroring SQLite's `LIKE`, so a record
/// the detector lists is never skipped as "not corrupted" by the processor.
pub fn matches_signature(text: &str) -> bool {
    let lowered = text.to_ascii_lowercase();
    CORRUPTION_SIGNATURE
        .iter()
        .any(|token| lowered.contains(&token.to_ascii_lowercase()))
}

/// Residual template tokens found in `text`, in declaration order.
///
/// Same ASCII case folding as [`matches_signature`]: content that passes
/// here never lands back in the backlog.
pub fn residual_tokens(text: &str) -> Vec<&'static str> {
    let lowered = text.to_ascii_lowercase();
    RESIDUAL_TEMPLATE_TOKENS
        .iter()
        .copied()
        .filter(|token| lowered.contains(&token.to_ascii_lowercase()))
        .collect()
}
