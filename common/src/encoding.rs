//! RFC 3986 percent-encoding for query values.
//!
//! Unreserved characters (`A-Z a-z 0-9 - _ . ~`) are copied as-is; every
//! other byte becomes `%HH` with uppercase hex digits.

const HEX: &[u8; 16] = b"0123456789ABCDEF";

/// Result of a capacity-bounded encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub text: String,
    /// Number of input bytes represented in `text`.
    pub consumed: usize,
    /// Set when the capacity ran out before the whole input was encoded.
    pub truncated: bool,
}

pub fn is_unreserved(byte: u8) -> bool {
    matches!(byte, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~')
}

/// Encode `input` into at most `capacity` bytes, one of which is reserved for
/// a terminator.
///
/// Encoding only continues while at least four bytes of capacity remain, so
/// the output is never longer than `capacity - 1` and never ends in a partial
/// `%HH` triplet. When the input does not fit, the returned text is a prefix
/// of the full encoding and `truncated` is set.
pub fn encode_with_capacity(input: &[u8], capacity: usize) -> Encoded {
    let mut text = String::with_capacity(capacity.min(input.len().saturating_mul(3)));
    let mut consumed = 0;

    for &byte in input {
        if text.len() + 3 >= capacity {
            break;
        }
        push_encoded(&mut text, byte);
        consumed += 1;
    }

    Encoded {
        text,
        consumed,
        truncated: consumed < input.len(),
    }
}

/// Encode without a capacity bound.
pub fn encode(input: &[u8]) -> String {
    let mut text = String::with_capacity(input.len().saturating_mul(3));
    for &byte in input {
        push_encoded(&mut text, byte);
    }
    text
}

/// Reverse of [`encode`]. Returns `None` for a `%` not followed by two hex
/// digits or for any character outside the encoded alphabet.
pub fn decode(text: &str) -> Option<Vec<u8>> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hi = hex_value(*bytes.get(i + 1)?)?;
                let lo = hex_value(*bytes.get(i + 2)?)?;
                out.push((hi << 4) | lo);
                i += 3;
            }
            byte if is_unreserved(byte) => {
                out.push(byte);
                i += 1;
            }
            _ => return None,
        }
    }

    Some(out)
}

fn push_encoded(text: &mut String, byte: u8) {
    if is_unreserved(byte) {
        text.push(byte as char);
    } else {
        text.push('%');
        text.push(HEX[(byte >> 4) as usize] as char);
        text.push(HEX[(byte & 0x0F) as usize] as char);
    }
}

fn hex_value(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        b'a'..=b'f' => Some(digit - b'a' + 10),
        _ => None,
    }
}
