//! Moves inline `<script>` blocks out of a rendered view body so the layout
//! can emit them at its end. This is a text transform, not HTML parsing: a
//! `</script>` inside a string literal ends the block early.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SCRIPT_BLOCK: Regex = Regex::new(r"(?is)<script.*?>.*?</script>").unwrap();
}

/// Return `content` without its script blocks, and the blocks in order.
pub fn extract_scripts(content: &str) -> (String, Vec<String>) {
    let scripts: Vec<String> = SCRIPT_BLOCK
        .find_iter(content)
        .map(|m| m.as_str().to_string())
        .collect();
    if scripts.is_empty() {
        return (content.to_string(), scripts);
    }
    let stripped = SCRIPT_BLOCK.replace_all(content, "").into_owned();
    (stripped, scripts)
}
