//! String literal encoding, decoding and escaping shared by the bundled hosts.

use crate::model::StringType;

/// Longest Pascal literal payload a one-byte length prefix can describe.
pub const PASCAL_MAX_LEN: usize = u8::MAX as usize;

/// Encode `text` as it would be laid out in the binary, terminator or length
/// prefix included.
///
/// Pascal text longer than [`PASCAL_MAX_LEN`] bytes is cut at the last char
/// boundary that fits. Snapshot parsing rejects such literals, so only
/// direct builder calls reach the clamp.
pub fn encode(string_type: StringType, text: &str) -> Vec<u8> {
    match string_type {
        StringType::C => {
            let mut out = text.as_bytes().to_vec();
            out.push(0);
            out
        }
        StringType::Utf16Le => {
            let mut out: Vec<u8> = text.encode_utf16().flat_map(|unit| unit.to_le_bytes()).collect();
            out.extend_from_slice(&[0, 0]);
            out
        }
        StringType::Pascal => {
            let mut end = text.len().min(PASCAL_MAX_LEN);
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            let mut out = Vec::with_capacity(end + 1);
            out.push(end as u8);
            out.extend_from_slice(&text.as_bytes()[..end]);
            out
        }
    }
}

/// Text bytes of the literal, without terminator or length prefix.
fn payload(string_type: StringType, bytes: &[u8]) -> &[u8] {
    match string_type {
        StringType::C => {
            let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
            &bytes[..end]
        }
        StringType::Utf16Le => {
            let end = bytes
                .chunks_exact(2)
                .position(|pair| pair == [0, 0])
                .map(|units| units * 2)
                .unwrap_or(bytes.len() & !1);
            &bytes[..end]
        }
        StringType::Pascal => match bytes.split_first() {
            Some((len, rest)) => &rest[..(*len as usize).min(rest.len())],
            None => &[],
        },
    }
}

/// Maximum number of payload bytes that can be decoded from `bytes`.
pub fn max_length(string_type: StringType, bytes: &[u8]) -> usize {
    payload(string_type, bytes).len()
}

/// Decode up to `len` payload bytes without escaping.
pub fn decode_raw(string_type: StringType, bytes: &[u8], len: usize) -> String {
    let payload = payload(string_type, bytes);
    let take = &payload[..len.min(payload.len())];
    match string_type {
        StringType::C | StringType::Pascal => String::from_utf8_lossy(take).into_owned(),
        StringType::Utf16Le => {
            let (text, _had_errors) =
                encoding_rs::UTF_16LE.decode_without_bom_handling(&take[..take.len() & !1]);
            text.into_owned()
        }
    }
}

/// Decode up to `len` payload bytes and escape the result for display.
pub fn decode(string_type: StringType, bytes: &[u8], len: usize) -> String {
    escape(&decode_raw(string_type, bytes, len))
}

/// Escape control characters, quotes and backslashes.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            c if c.is_control() => out.push_str(&format!("\\x{:02X}", c as u32)),
            c => out.push(c),
        }
    }
    out
}
