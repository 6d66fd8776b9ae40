//! Error types for batch encoding and decoding.

use thiserror::Error;

use crate::FrameType;

/// Errors that abort encoding a batch. Encoding never emits a partial buffer.
#[derive(Debug, Error)]
pub enum EncodeError {
	/// A frame's subtree runs past the end of the reference frames.
	#[error("frame {index}: subtree length {subtree_length} out of bounds for {frame_count} reference frames")]
	SubtreeOutOfBounds { index: usize, subtree_length: i32, frame_count: usize },

	/// A component reference capture points outside the reference frames.
	#[error("frame {index}: parent frame index {parent_frame_index} out of bounds for {frame_count} reference frames")]
	ParentOutOfBounds { index: usize, parent_frame_index: i32, frame_count: usize },

	/// An edit points outside the reference frames.
	#[error("component {component_id}, edit {edit}: reference frame index {frame_index} out of bounds for {frame_count} reference frames")]
	ReferenceOutOfBounds {
		component_id: i32,
		edit: usize,
		frame_index: i32,
		frame_count: usize,
	},

	/// A remove-attribute edit carries no attribute name.
	#[error("component {component_id}, edit {edit}: remove-attribute edit without an attribute name")]
	MissingAttributeName { component_id: i32, edit: usize },

	/// The batch does not fit the `i32` offset space.
	#[error("encoded batch needs {0} bytes, beyond the i32 offset range")]
	TooLarge(usize),

	/// The emitter drifted from the measured layout.
	#[error("section `{section}` expected at byte {expected}, writer at {actual}")]
	LayoutMismatch { section: &'static str, expected: usize, actual: usize },

	/// A record referenced a string the measuring pass did not collect.
	#[error("string {0:?} missing from the string table")]
	MissingString(String),

	/// The structured form could not be serialized.
	#[error("structured encoding failed: {0}")]
	Json(#[from] serde_json::Error),
}

/// Errors raised while reading a received batch.
#[derive(Debug, Error)]
pub enum DecodeError {
	/// A read ran past the end of the buffer.
	#[error("read of {needed} bytes at offset {offset} exceeds buffer of {len} bytes")]
	OutOfBounds { offset: usize, needed: usize, len: usize },

	/// An array index is past its count.
	#[error("index {index} out of range for {count} entries")]
	IndexOutOfRange { index: usize, count: usize },

	/// An offset or count field is negative.
	#[error("field `{field}` holds negative value {value}")]
	Negative { field: &'static str, value: i64 },

	#[error("unknown frame type tag {0}")]
	UnknownFrameType(i32),

	#[error("unknown edit type tag {0}")]
	UnknownEditType(i32),

	/// The field is not defined for this frame kind.
	#[error("field `{field}` does not apply to {frame_type:?} frames")]
	FieldMismatch { field: &'static str, frame_type: FrameType },

	#[error("string at offset {0} is not valid UTF-8")]
	InvalidUtf8(usize),

	/// A structured batch lacks a required field.
	#[error("structured batch is missing field `{0}`")]
	MissingField(&'static str),

	/// A structured batch field has the wrong JSON type.
	#[error("structured batch field `{0}` has an unexpected type")]
	WrongType(&'static str),

	/// A structured payload could not be parsed.
	#[error("structured payload is not valid JSON: {0}")]
	Json(#[from] serde_json::Error),
}

/// Result type for decoding.
pub type Result<T> = std::result::Result<T, DecodeError>;
