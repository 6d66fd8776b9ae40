//! Bounds-checked primitives over an encoded batch buffer.

use crate::error::{DecodeError, Result};
use crate::layout::{HEADER_SIZE, NO_STRING, STRING_PREFIX_SIZE};

pub(super) fn span(buf: &[u8], offset: usize, needed: usize) -> Result<&[u8]> {
	offset
		.checked_add(needed)
		.and_then(|end| buf.get(offset..end))
		.ok_or(DecodeError::OutOfBounds { offset, needed, len: buf.len() })
}

pub(super) fn read_i32(buf: &[u8], offset: usize) -> Result<i32> {
	let bytes = span(buf, offset, 4)?;
	Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Reads an offset or count, rejecting negative values.
pub(super) fn read_usize(buf: &[u8], offset: usize, field: &'static str) -> Result<usize> {
	let value = read_i32(buf, offset)?;
	usize::try_from(value).map_err(|_| DecodeError::Negative {
		field,
		value: value.into(),
	})
}

/// Resolves a string pointer into the trailing string region.
pub(super) fn read_string(buf: &[u8], pointer: i32) -> Result<Option<&str>> {
	if pointer == NO_STRING {
		return Ok(None);
	}
	let offset = usize::try_from(pointer).map_err(|_| DecodeError::Negative {
		field: "string pointer",
		value: pointer.into(),
	})?;
	let prefix = span(buf, offset, STRING_PREFIX_SIZE)?;
	let len = u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
	let bytes = span(buf, offset + STRING_PREFIX_SIZE, len)?;
	std::str::from_utf8(bytes).map(Some).map_err(|_| DecodeError::InvalidUtf8(offset))
}

/// Locates the section named by header slot `slot` and returns its
/// `(contents, count)` after checking that `count` records of `stride`
/// bytes fit in the buffer.
pub(super) fn section(buf: &[u8], slot: usize, stride: usize) -> Result<(usize, usize)> {
	span(buf, 0, HEADER_SIZE)?;
	let start = read_usize(buf, slot * 4, "section offset")?;
	let contents = read_usize(buf, start, "section contents")?;
	let count = read_usize(buf, start + 4, "section count")?;
	let needed = count.checked_mul(stride).ok_or(DecodeError::OutOfBounds {
		offset: contents,
		needed: usize::MAX,
		len: buf.len(),
	})?;
	span(buf, contents, needed)?;
	Ok((contents, count))
}
