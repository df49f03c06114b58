//! Image provenance: find image references in the original markup and make
//! sure none of them is dropped by the reconstruction.

use std::sync::LazyLock;

use regex::Regex;

static IMG_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<img[^>]+src=["']([^"']+)["'][^>]*>"#).expect("valid regex")
});

static IMAGE_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)https?://[^\s<>"']+\.(?:jpg|jpeg|png|gif|webp)"#).expect("valid regex")
});

/// Collect image URLs from raw markup.
///
/// Union of `<img src>` values (minus data URIs and placeholders) and bare
/// URLs ending in a common image extension. First-seen order, no duplicates.
pub fn extract_images(raw_html: &str) -> Vec<String> {
    let mut images: Vec<String> = Vec::new();

    for caps in IMG_TAG_RE.captures_iter(raw_html) {
        let url = &caps[1];
        if url.starts_with("data:") || url.contains("placeholder") {
            continue;
        }
        if !images.iter().any(|seen| seen == url) {
            images.push(url.to_string());
        }
    }

    for m in IMAGE_URL_RE.find_iter(raw_html) {
        let url = m.as_str();
        if !images.iter().any(|seen| seen == url) {
            images.push(url.to_string());
        }
    }

    images
}

/// Agent-reported images first, then original images not already present.
pub fn merge_images(ai_images: &[String], original_images: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(ai_images.len() + original_images.len());
    for url in ai_images.iter().chain(original_images) {
        if !url.is_empty() && !merged.contains(url) {
            merged.push(url.clone());
        }
    }
    merged
}

/// Append a markdown image reference for every URL missing from `content`.
pub fn embed_missing_images(content: &str, images: &[String]) -> String {
    let mut out = content.to_string();
    for url in images {
        if !out.contains(url.as_str()) {
            tracing::debug!(url = %url, "Embedding image missing from cleaned content");
            out.push_str(&format!("\n\n![Imagem]({url})"));
        }
    }
    out
}
