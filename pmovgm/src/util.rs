use crate::source::{ByteSource, read_full};

/// Reads a big-endian u32 at `offset`, `None` when the source is too short.
pub(crate) fn read_u32_be<S: ByteSource + ?Sized>(source: &S, offset: u64) -> Option<u32> {
    read_word(source, offset).map(u32::from_be_bytes)
}

/// Reads a little-endian u32 at `offset`, `None` when the source is too short.
pub(crate) fn read_u32_le<S: ByteSource + ?Sized>(source: &S, offset: u64) -> Option<u32> {
    read_word(source, offset).map(u32::from_le_bytes)
}

fn read_word<S: ByteSource + ?Sized>(source: &S, offset: u64) -> Option<[u8; 4]> {
    let mut word = [0u8; 4];
    match read_full(source, offset, &mut word) {
        Ok(4) => Some(word),
        _ => None,
    }
}

/// C `atol`: leading whitespace, optional sign, digits up to the first
/// non-digit. Returns 0 when there are no digits.
///
/// The result lands in a 32-bit loop field, so it wraps like a C `long`
/// stored into an `int32_t`.
pub(crate) fn parse_leading_int(text: &str) -> i32 {
    scan_int(text).map(|(value, _)| value as i32).unwrap_or(0)
}

/// Scans one integer off the front of `text`, returning it and the rest.
pub(crate) fn scan_int(text: &str) -> Option<(i64, &str)> {
    let trimmed = text.trim_start();
    let bytes = trimmed.as_bytes();
    let mut idx = 0;
    let negative = match bytes.first() {
        Some(b'-') => {
            idx += 1;
            true
        }
        Some(b'+') => {
            idx += 1;
            false
        }
        _ => false,
    };

    let digits_start = idx;
    let mut value: i64 = 0;
    while let Some(digit) = bytes.get(idx).filter(|b| b.is_ascii_digit()) {
        value = value.saturating_mul(10).saturating_add((digit - b'0') as i64);
        idx += 1;
    }
    if idx == digits_start {
        return None;
    }

    let value = if negative { -value } else { value };
    Some((value, &trimmed[idx..]))
}

/// `sscanf(text, "%d,%d")`: each integer is `None` if it could not be scanned.
pub(crate) fn scan_int_pair(text: &str) -> (Option<i32>, Option<i32>) {
    let Some((first, rest)) = scan_int(text) else {
        return (None, None);
    };
    let second = rest
        .strip_prefix(',')
        .and_then(scan_int)
        .map(|(v, _)| v as i32);
    (Some(first as i32), second)
}
