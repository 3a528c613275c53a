//! Composition of reference-count comments.

/// Largest comment the host's comment store accepts, in bytes.
pub const MAX_COMMENT_LEN: usize = 1023;

/// Cut `text` to at most [`MAX_COMMENT_LEN`] bytes on a character boundary.
pub fn truncate_comment(mut text: String) -> String {
    if text.len() > MAX_COMMENT_LEN {
        let mut end = MAX_COMMENT_LEN;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
    }
    text
}

/// `"{count} {existing}"`, or just `"{count}"` when there is no existing comment.
///
/// An empty existing comment is treated as absent.
pub fn prefix_count(count: usize, existing: Option<&str>) -> String {
    match existing {
        Some(text) if !text.is_empty() => truncate_comment(format!("{count} {text}")),
        _ => count.to_string(),
    }
}

/// `{count} "{decoded}"` for a string literal.
pub fn string_count(count: usize, decoded: &str) -> String {
    truncate_comment(format!("{count} \"{decoded}\""))
}
