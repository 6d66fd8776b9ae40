//! Field access over a structured (JSON) batch.

use serde_json::Value;

use crate::error::{DecodeError, Result};

pub(super) fn field<'a>(value: &'a Value, key: &'static str) -> Result<&'a Value> {
	value.get(key).ok_or(DecodeError::MissingField(key))
}

pub(super) fn int(value: &Value, key: &'static str) -> Result<i32> {
	field(value, key)?
		.as_i64()
		.and_then(|n| i32::try_from(n).ok())
		.ok_or(DecodeError::WrongType(key))
}

pub(super) fn count(value: &Value, key: &'static str) -> Result<usize> {
	let n = int(value, key)?;
	usize::try_from(n).map_err(|_| DecodeError::Negative { field: key, value: n.into() })
}

pub(super) fn array<'a>(value: &'a Value, key: &'static str) -> Result<&'a [Value]> {
	field(value, key)?.as_array().map(Vec::as_slice).ok_or(DecodeError::WrongType(key))
}

/// A missing key and an explicit `null` both read as `None`.
pub(super) fn optional_string<'a>(value: &'a Value, key: &'static str) -> Result<Option<&'a str>> {
	match value.get(key) {
		None | Some(Value::Null) => Ok(None),
		Some(Value::String(s)) => Ok(Some(s)),
		Some(_) => Err(DecodeError::WrongType(key)),
	}
}

/// Resolves an `{array, offset, count}` segment to the slice it covers.
pub(super) fn segment<'a>(value: &'a Value, key: &'static str) -> Result<&'a [Value]> {
	let segment = field(value, key)?;
	let items = array(segment, "array")?;
	let offset = count(segment, "offset")?;
	let len = count(segment, "count")?;
	offset
		.checked_add(len)
		.and_then(|end| items.get(offset..end))
		.ok_or(DecodeError::IndexOutOfRange {
			index: offset.saturating_add(len),
			count: items.len(),
		})
}
