//! Binary layout of an encrypted tile.
//!
//! ```text
//! ┌──────────┬──────────────┬───────────────┬─────────────┬─────────────┬───────────┐
//! │ marker   │ clear prefix │ replace count │ encrypted   │ clear       │ index     │
//! │ u32 BE   │ index bytes  │ u32 LE        │ count bytes │ suffix      │ u32 LE    │
//! └──────────┴──────────────┴───────────────┴─────────────┴─────────────┴───────────┘
//! ```
//!
//! `index` lives in the last four bytes of the buffer. Offsets that run past
//! the buffer are rejected rather than truncated.

use bytes::Buf;

use crate::error::FormatError;

const WORD: usize = 4;

/// Borrowed view of the three sections of a container.
#[derive(Debug, PartialEq, Eq)]
pub struct ContainerParts<'a> {
    pub clear_prefix: &'a [u8],
    pub encrypted: &'a [u8],
    pub clear_suffix: &'a [u8],
}

/// Reads the leading big-endian marker, if the buffer is long enough.
pub fn read_marker(buffer: &[u8]) -> Option<u32> {
    let mut head = buffer.get(..WORD)?;
    Some(head.get_u32())
}

/// Splits a container into its sections.
///
/// The caller has already checked the marker.
pub fn split(buffer: &[u8]) -> Result<ContainerParts<'_>, FormatError> {
    let len = buffer.len();
    if len < 2 * WORD {
        return Err(FormatError::OffsetOutOfBounds {
            field: "trailing index",
            end: 2 * WORD,
            len,
        });
    }

    let mut tail = &buffer[len - WORD..];
    let index = tail.get_u32_le() as usize;
    // The trailing index word itself is not part of any section.
    let body_end = len - WORD;

    let prefix_end = checked_end(WORD, index, body_end, "clear prefix")?;
    let count_end = checked_end(prefix_end, WORD, body_end, "replace count")?;

    let mut count_bytes = &buffer[prefix_end..count_end];
    let replace_count = count_bytes.get_u32_le() as usize;
    let encrypted_end = checked_end(count_end, replace_count, body_end, "encrypted section")?;

    Ok(ContainerParts {
        clear_prefix: &buffer[WORD..prefix_end],
        encrypted: &buffer[count_end..encrypted_end],
        clear_suffix: &buffer[encrypted_end..body_end],
    })
}

fn checked_end(
    start: usize,
    length: usize,
    limit: usize,
    field: &'static str,
) -> Result<usize, FormatError> {
    match start.checked_add(length) {
        Some(end) if end <= limit => Ok(end),
        Some(end) => Err(FormatError::OffsetOutOfBounds {
            field,
            end,
            len: limit,
        }),
        None => Err(FormatError::OffsetOutOfBounds {
            field,
            end: usize::MAX,
            len: limit,
        }),
    }
}

/// Assembles a container from its sections. Used to build fixtures.
#[cfg(test)]
pub(crate) fn assemble(marker: u32, prefix: &[u8], encrypted: &[u8], suffix: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(prefix.len() + encrypted.len() + suffix.len() + 3 * WORD);
    out.extend_from_slice(&marker.to_be_bytes());
    out.extend_from_slice(prefix);
    out.extend_from_slice(&(encrypted.len() as u32).to_le_bytes());
    out.extend_from_slice(encrypted);
    out.extend_from_slice(suffix);
    out.extend_from_slice(&(prefix.len() as u32).to_le_bytes());
    out
}
