//! Shared extraction helpers for reply parsing.

const REASONING_TAGS: [(&str, &str); 2] = [("<think>", "</think>"), ("<thinking>", "</thinking>")];

/// Position of the first ```` ```lang ```` fence at or after `from`.
///
/// Returns `(fence_start, content_start)`. The tag match is case-insensitive
/// and ends at whitespace, `{` or `[`, so content may start on the fence line
/// itself. Fences with other tags are skipped.
fn fence_open_after(text: &str, from: usize, lang: &str) -> Option<(usize, usize)> {
    let mut search_from = from;
    while let Some(offset) = text[search_from..].find("```") {
        let fence_start = search_from + offset;
        let after_backticks = fence_start + 3;
        let rest = &text[after_backticks..];
        let tag_len = rest
            .find(|c: char| c.is_whitespace() || c == '{' || c == '[')
            .unwrap_or(rest.len());

        if rest[..tag_len].eq_ignore_ascii_case(lang) {
            return Some((fence_start, after_backticks + tag_len));
        }

        search_from = after_backticks;
    }
    None
}

/// Earliest reasoning block opening at or after `from`: `(start, close_tag)`.
fn reasoning_open_after(text: &str, from: usize) -> Option<(usize, &'static str)> {
    REASONING_TAGS
        .iter()
        .filter_map(|(open, close)| text[from..].find(open).map(|i| (from + i, *close)))
        .min_by_key(|(start, _)| *start)
}

/// Byte offset where the content of the first ```` ```lang ```` fence begins.
///
/// Fences inside `<think>` or `<thinking>` blocks that come before the real
/// fence are skipped. The text is never modified, so tag or fence markers
/// inside the block's own content do not affect where it starts. An
/// unterminated reasoning block stops the skipping.
///
/// # Examples
///
/// ```
/// use llm_relay::output_parser::find_fence_content;
///
/// let reply = "<think>```json {\"draft\": 1}```</think>\n```json\n{\"a\": 1}\n```";
/// let start = find_fence_content(reply, "json").unwrap();
/// assert!(reply[start..].trim_start().starts_with("{\"a\""));
/// assert_eq!(find_fence_content("```yaml\na: 1\n```", "json"), None);
/// ```
pub fn find_fence_content(text: &str, lang: &str) -> Option<usize> {
    let mut from = 0;
    loop {
        let (fence_start, content_start) = fence_open_after(text, from, lang)?;
        match reasoning_open_after(text, from) {
            Some((think_start, close)) if think_start < fence_start => {
                match text[think_start..].find(close) {
                    Some(end) => from = think_start + end + close.len(),
                    None => return Some(content_start),
                }
            }
            _ => return Some(content_start),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(text: &str) -> Option<&str> {
        find_fence_content(text, "json").map(|i| text[i..].trim_start())
    }

    #[test]
    fn fence_with_newlines() {
        let reply = "Here:\n```json\n{\"response\": \"ok\"}\n```";
        assert_eq!(content(reply), Some("{\"response\": \"ok\"}\n```"));
    }

    #[test]
    fn fence_same_line() {
        assert_eq!(content("```json{\"a\": 1}```"), Some("{\"a\": 1}```"));
        assert_eq!(content("```json {\"a\": 1} ```"), Some("{\"a\": 1} ```"));
    }

    #[test]
    fn fence_tag_case_insensitive() {
        assert_eq!(content("```JSON\n{}\n```"), Some("{}\n```"));
    }

    #[test]
    fn fence_skips_other_languages() {
        let reply = "```python\nprint(1)\n```\nthen\n```json\n{\"b\": 2}\n```";
        assert_eq!(content(reply), Some("{\"b\": 2}\n```"));
    }

    #[test]
    fn fence_requires_exact_tag() {
        assert_eq!(content("```jsonc\n{}\n```"), None);
        assert_eq!(content("```\n{\"a\": 1}\n```"), None);
    }

    #[test]
    fn fence_inside_leading_reasoning_skipped() {
        let reply = "<think>```json {\"draft\": 1}```</think><thinking>```json{}```</thinking>\
                     ```json {\"final\": 2}```";
        assert_eq!(content(reply), Some("{\"final\": 2}```"));
    }

    #[test]
    fn reasoning_tag_after_fence_ignored() {
        let reply = "```json\n{\"r\": \"use <think> tags\"}\n```";
        assert_eq!(content(reply), Some("{\"r\": \"use <think> tags\"}\n```"));
    }

    #[test]
    fn unterminated_reasoning_does_not_hide_fence() {
        let reply = "<think>still going ```json\n{\"a\": 1}\n```";
        assert_eq!(content(reply), Some("{\"a\": 1}\n```"));
    }
}
