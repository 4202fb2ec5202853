//! Post-inference output cleanup.
//!
//! Strips model artifacts (reasoning blocks, unused tokens, markdown fences)
//! and isolates the JSON object the prompt asked for.

use std::sync::LazyLock;

use regex::Regex;

static THINK_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("valid regex"));

static UNUSED_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<unused\d+>").expect("valid regex"));

static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```(?:json|JSON)?").expect("valid regex"));

/// Strip model-specific artifacts from raw output.
///
/// Handles:
/// 1. `<think>...</think>` reasoning blocks
/// 2. `<unusedN>thought\n` prefixes and stray `<unusedN>` tokens
/// 3. Markdown code fences around the answer
pub fn sanitize_llm_output(raw: &str) -> String {
    let mut text = THINK_BLOCK_RE.replace_all(raw, "").to_string();

    // An unterminated reasoning block swallows the rest of the answer.
    if let Some(idx) = text.find("<think>") {
        text.truncate(idx);
    }

    if let Some(idx) = text.find("<unused") {
        if let Some(thought_offset) = text[idx..].find("thought\n") {
            text = text[idx + thought_offset + 8..].to_string();
        }
    }
    text = UNUSED_TOKEN_RE.replace_all(&text, "").to_string();
    text = FENCE_RE.replace_all(&text, "").to_string();

    text.trim().to_string()
}

/// Slice of `text` holding the first balanced top-level JSON object.
///
/// Braces inside string literals are ignored. Returns `None` when no
/// object opens or the first one never closes.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
