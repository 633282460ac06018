//! Human-readable size parsing (e.g., "10MB", "512KB").

use thiserror::Error;

/// Error parsing a size string.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid size '{input}': expected a form like '10MB', '512KB' or '1048576'")]
pub struct SizeParseError {
    input: String,
}

/// Parse a human-readable size into bytes.
///
/// Accepts bare byte counts and `K`/`KB`, `M`/`MB`, `G`/`GB` suffixes
/// (powers of 1024), case-insensitive, with optional whitespace before the
/// suffix.
///
/// ```
/// use zoomvault::config::parse_size;
///
/// assert_eq!(parse_size("10MB").unwrap(), 10 * 1024 * 1024);
/// assert_eq!(parse_size("512 kb").unwrap(), 512 * 1024);
/// assert_eq!(parse_size("4096").unwrap(), 4096);
/// ```
pub fn parse_size(input: &str) -> Result<u64, SizeParseError> {
    let err = || SizeParseError {
        input: input.to_string(),
    };

    let trimmed = input.trim();
    let upper = trimmed.to_ascii_uppercase();
    let without_b = upper.strip_suffix('B').unwrap_or(&upper);

    let (digits, multiplier) = match without_b.chars().last() {
        Some('K') => (&without_b[..without_b.len() - 1], 1024_u64),
        Some('M') => (&without_b[..without_b.len() - 1], 1024 * 1024),
        Some('G') => (&without_b[..without_b.len() - 1], 1024 * 1024 * 1024),
        Some(_) if upper.ends_with('B') => return Err(err()),
        Some(_) => (without_b, 1),
        None => return Err(err()),
    };

    let value: u64 = digits.trim().parse().map_err(|_| err())?;
    value.checked_mul(multiplier).ok_or_else(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffixes() {
        assert_eq!(parse_size("1K").unwrap(), 1024);
        assert_eq!(parse_size("1kb").unwrap(), 1024);
        assert_eq!(parse_size("3 M").unwrap(), 3 * 1024 * 1024);
        assert_eq!(parse_size("2GB").unwrap(), 2 * 1024 * 1024 * 1024);
    }

    #[test]
    fn test_bare_bytes() {
        assert_eq!(parse_size(" 1500 ").unwrap(), 1500);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse_size("").is_err());
        assert!(parse_size("MB").is_err());
        assert!(parse_size("12XB").is_err());
        assert!(parse_size("ten MB").is_err());
        assert!(parse_size("-5MB").is_err());
    }

    #[test]
    fn test_overflow_is_error() {
        assert!(parse_size("99999999999999999GB").is_err());
    }
}
