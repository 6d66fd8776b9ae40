//! Format-agnostic reading of received render batches.
//!
//! [`RenderBatchReader`] exposes the same indexed views whether the payload
//! arrived in the binary layout or as structured JSON. Every accessor is
//! fallible: a truncated buffer, a dangling offset, or a field read against
//! the wrong frame kind yields a [`DecodeError`] rather than a panic.

mod binary;
mod structured;

use std::fmt;
use std::marker::PhantomData;

use bytes::Bytes;
use serde_json::Value;

use crate::error::{DecodeError, Result};
use crate::layout::{DIFF_ENTRY_SIZE, EDIT_SIZE, FRAME_SIZE, ID_SIZE};
use crate::{EditType, FrameType};

/// A received batch in either wire form.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchPayload {
	Binary(Bytes),
	Structured(Value),
}

/// Read-only access to one received batch.
#[derive(Debug, Clone)]
pub struct RenderBatchReader {
	payload: BatchPayload,
}

impl RenderBatchReader {
	pub fn new(payload: BatchPayload) -> Self {
		Self { payload }
	}

	pub fn from_bytes(bytes: Bytes) -> Self {
		Self::new(BatchPayload::Binary(bytes))
	}

	pub fn from_value(value: Value) -> Self {
		Self::new(BatchPayload::Structured(value))
	}

	/// Parses a structured payload from its JSON text.
	///
	/// # Errors
	///
	/// Returns [`DecodeError::Json`] when `json` is not valid JSON.
	pub fn from_json(json: &[u8]) -> Result<Self> {
		Ok(Self::from_value(serde_json::from_slice(json)?))
	}

	pub fn payload(&self) -> &BatchPayload {
		&self.payload
	}

	pub fn updated_components(&self) -> Result<ArrayView<'_, DiffView<'_>>> {
		self.section(0, "updatedComponents")
	}

	pub fn reference_frames(&self) -> Result<ArrayView<'_, FrameView<'_>>> {
		self.section(1, "referenceFrames")
	}

	pub fn disposed_component_ids(&self) -> Result<ArrayView<'_, i32>> {
		self.section(2, "disposedComponentIds")
	}

	pub fn disposed_event_handler_ids(&self) -> Result<ArrayView<'_, i32>> {
		self.section(3, "disposedEventHandlerIds")
	}

	fn section<'a, T: Record<'a>>(&'a self, slot: usize, key: &'static str) -> Result<ArrayView<'a, T>> {
		match &self.payload {
			BatchPayload::Binary(bytes) => {
				let (contents, count) = binary::section(bytes, slot, T::STRIDE)?;
				Ok(ArrayView::new(Source::Binary { buf: bytes, contents }, count))
			}
			BatchPayload::Structured(value) => {
				let items = structured::array(value, key)?;
				Ok(ArrayView::new(Source::Structured(items), items.len()))
			}
		}
	}
}

mod sealed {
	use serde_json::Value;

	use crate::error::Result;

	/// Location of one record inside a payload.
	#[derive(Debug, Clone, Copy)]
	pub enum Repr<'a> {
		Binary { buf: &'a [u8], offset: usize },
		Structured(&'a Value),
	}

	pub trait Record<'a>: Sized {
		/// Encoded size of one record in the binary layout.
		const STRIDE: usize;

		fn from_repr(repr: Repr<'a>) -> Result<Self>;
	}
}

use sealed::{Record, Repr};

#[derive(Debug, Clone, Copy)]
enum Source<'a> {
	Binary { buf: &'a [u8], contents: usize },
	Structured(&'a [Value]),
}

/// Indexed, lazily decoded view over one array of a batch.
pub struct ArrayView<'a, T> {
	source: Source<'a>,
	count: usize,
	_record: PhantomData<fn() -> T>,
}

impl<T> Clone for ArrayView<'_, T> {
	fn clone(&self) -> Self {
		*self
	}
}

impl<T> Copy for ArrayView<'_, T> {}

impl<T> fmt::Debug for ArrayView<'_, T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ArrayView").field("count", &self.count).finish_non_exhaustive()
	}
}

impl<'a, T: Record<'a>> ArrayView<'a, T> {
	fn new(source: Source<'a>, count: usize) -> Self {
		Self {
			source,
			count,
			_record: PhantomData,
		}
	}

	pub fn count(&self) -> usize {
		self.count
	}

	pub fn is_empty(&self) -> bool {
		self.count == 0
	}

	/// Decodes the record at `index`.
	///
	/// # Errors
	///
	/// [`DecodeError::IndexOutOfRange`] when `index >= count`, or any error
	/// decoding the record itself.
	pub fn get(&self, index: usize) -> Result<T> {
		if index >= self.count {
			return Err(DecodeError::IndexOutOfRange { index, count: self.count });
		}
		let repr = match self.source {
			Source::Binary { buf, contents } => Repr::Binary {
				buf,
				offset: contents + index * T::STRIDE,
			},
			Source::Structured(items) => Repr::Structured(&items[index]),
		};
		T::from_repr(repr)
	}

	pub fn iter(&self) -> impl Iterator<Item = Result<T>> + use<'a, T> {
		let view = *self;
		(0..view.count).map(move |index| view.get(index))
	}
}

/// Binary offset within a record paired with the structured key of the same field.
#[derive(Debug, Clone, Copy)]
struct Field {
	offset: usize,
	key: &'static str,
}

impl Field {
	const fn new(offset: usize, key: &'static str) -> Self {
		Self { offset, key }
	}
}

impl<'a> Repr<'a> {
	fn int(self, field: Field) -> Result<i32> {
		match self {
			Repr::Binary { buf, offset } => binary::read_i32(buf, offset + field.offset),
			Repr::Structured(value) => structured::int(value, field.key),
		}
	}

	fn optional_string(self, field: Field) -> Result<Option<&'a str>> {
		match self {
			Repr::Binary { buf, offset } => binary::read_string(buf, binary::read_i32(buf, offset + field.offset)?),
			Repr::Structured(value) => structured::optional_string(value, field.key),
		}
	}

	fn string(self, field: Field) -> Result<&'a str> {
		self.optional_string(field)?.ok_or(DecodeError::MissingField(field.key))
	}
}

impl<'a> Record<'a> for i32 {
	const STRIDE: usize = ID_SIZE;

	fn from_repr(repr: Repr<'a>) -> Result<Self> {
		match repr {
			Repr::Binary { buf, offset } => binary::read_i32(buf, offset),
			Repr::Structured(value) => value.as_i64().and_then(|n| i32::try_from(n).ok()).ok_or(DecodeError::WrongType("id")),
		}
	}
}

/// One entry of the updated-components array.
#[derive(Debug, Clone, Copy)]
pub struct DiffView<'a> {
	repr: Repr<'a>,
}

impl<'a> Record<'a> for DiffView<'a> {
	const STRIDE: usize = DIFF_ENTRY_SIZE;

	fn from_repr(repr: Repr<'a>) -> Result<Self> {
		Ok(Self { repr })
	}
}

impl<'a> DiffView<'a> {
	const COMPONENT_ID: Field = Field::new(0, "componentId");

	pub fn component_id(&self) -> Result<i32> {
		self.repr.int(Self::COMPONENT_ID)
	}

	/// The edits belonging to this component.
	pub fn edits(&self) -> Result<ArrayView<'a, EditView<'a>>> {
		match self.repr {
			Repr::Binary { buf, offset } => {
				let contents = binary::read_usize(buf, offset + 4, "edits contents")?;
				let start = binary::read_usize(buf, offset + 8, "edits slice start")?;
				let count = binary::read_usize(buf, offset + 12, "edits count")?;
				let first = start
					.checked_mul(EDIT_SIZE)
					.and_then(|rel| contents.checked_add(rel))
					.ok_or(DecodeError::OutOfBounds {
						offset: contents,
						needed: usize::MAX,
						len: buf.len(),
					})?;
				let needed = count.checked_mul(EDIT_SIZE).ok_or(DecodeError::OutOfBounds {
					offset: first,
					needed: usize::MAX,
					len: buf.len(),
				})?;
				binary::span(buf, first, needed)?;
				Ok(ArrayView::new(Source::Binary { buf, contents: first }, count))
			}
			Repr::Structured(value) => {
				let items = structured::segment(value, "edits")?;
				Ok(ArrayView::new(Source::Structured(items), items.len()))
			}
		}
	}
}

/// One edit record.
#[derive(Debug, Clone, Copy)]
pub struct EditView<'a> {
	repr: Repr<'a>,
}

impl<'a> Record<'a> for EditView<'a> {
	const STRIDE: usize = EDIT_SIZE;

	fn from_repr(repr: Repr<'a>) -> Result<Self> {
		Ok(Self { repr })
	}
}

impl<'a> EditView<'a> {
	const TYPE: Field = Field::new(0, "type");
	const SIBLING_INDEX: Field = Field::new(4, "siblingIndex");
	const REFERENCE_FRAME_INDEX: Field = Field::new(8, "referenceFrameIndex");
	const REMOVED_ATTRIBUTE_NAME: Field = Field::new(12, "removedAttributeName");

	pub fn edit_type(&self) -> Result<EditType> {
		let code = self.repr.int(Self::TYPE)?;
		EditType::from_code(code).ok_or(DecodeError::UnknownEditType(code))
	}

	pub fn sibling_index(&self) -> Result<i32> {
		self.repr.int(Self::SIBLING_INDEX)
	}

	pub fn reference_frame_index(&self) -> Result<i32> {
		self.repr.int(Self::REFERENCE_FRAME_INDEX)
	}

	pub fn removed_attribute_name(&self) -> Result<Option<&'a str>> {
		self.repr.optional_string(Self::REMOVED_ATTRIBUTE_NAME)
	}
}

/// One reference frame.
///
/// Field accessors only succeed for the frame kinds the field belongs to.
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
	repr: Repr<'a>,
}

impl<'a> Record<'a> for FrameView<'a> {
	const STRIDE: usize = FRAME_SIZE;

	fn from_repr(repr: Repr<'a>) -> Result<Self> {
		Ok(Self { repr })
	}
}

impl<'a> FrameView<'a> {
	const FRAME_TYPE: Field = Field::new(0, "frameType");
	const SUBTREE_LENGTH: Field = Field::new(4, "subtreeLength");
	const ELEMENT_NAME: Field = Field::new(8, "elementName");
	const TEXT_CONTENT: Field = Field::new(4, "textContent");
	const ATTRIBUTE_EVENT_HANDLER_ID: Field = Field::new(4, "attributeEventHandlerId");
	const ATTRIBUTE_NAME: Field = Field::new(8, "attributeName");
	const ATTRIBUTE_VALUE: Field = Field::new(12, "attributeValue");
	const COMPONENT_ID: Field = Field::new(8, "componentId");
	const ELEMENT_REFERENCE_CAPTURE_ID: Field = Field::new(4, "elementReferenceCaptureId");
	const COMPONENT_REFERENCE_CAPTURE: Field = Field::new(4, "componentReferenceCapture");

	pub fn frame_type(&self) -> Result<FrameType> {
		let code = self.repr.int(Self::FRAME_TYPE)?;
		FrameType::from_code(code).ok_or(DecodeError::UnknownFrameType(code))
	}

	fn expect(&self, field: &'static str, allowed: &[FrameType]) -> Result<()> {
		let frame_type = self.frame_type()?;
		if allowed.contains(&frame_type) {
			Ok(())
		} else {
			Err(DecodeError::FieldMismatch { field, frame_type })
		}
	}

	pub fn subtree_length(&self) -> Result<i32> {
		self.expect("subtreeLength", &[FrameType::Element, FrameType::Component, FrameType::Region])?;
		self.repr.int(Self::SUBTREE_LENGTH)
	}

	pub fn element_name(&self) -> Result<&'a str> {
		self.expect("elementName", &[FrameType::Element])?;
		self.repr.string(Self::ELEMENT_NAME)
	}

	pub fn text_content(&self) -> Result<&'a str> {
		self.expect("textContent", &[FrameType::Text])?;
		self.repr.string(Self::TEXT_CONTENT)
	}

	/// Nonzero when the attribute is an event handler.
	pub fn attribute_event_handler_id(&self) -> Result<i32> {
		self.expect("attributeEventHandlerId", &[FrameType::Attribute])?;
		self.repr.int(Self::ATTRIBUTE_EVENT_HANDLER_ID)
	}

	pub fn attribute_name(&self) -> Result<&'a str> {
		self.expect("attributeName", &[FrameType::Attribute])?;
		self.repr.string(Self::ATTRIBUTE_NAME)
	}

	pub fn attribute_value(&self) -> Result<Option<&'a str>> {
		self.expect("attributeValue", &[FrameType::Attribute])?;
		self.repr.optional_string(Self::ATTRIBUTE_VALUE)
	}

	pub fn component_id(&self) -> Result<i32> {
		self.expect("componentId", &[FrameType::Component])?;
		self.repr.int(Self::COMPONENT_ID)
	}

	pub fn element_reference_capture_id(&self) -> Result<&'a str> {
		self.expect("elementReferenceCaptureId", &[FrameType::ElementReferenceCapture])?;
		self.repr.string(Self::ELEMENT_REFERENCE_CAPTURE_ID)
	}

	/// Index of the parent frame the component reference belongs to.
	pub fn component_reference_capture_parent(&self) -> Result<i32> {
		self.expect("componentReferenceCapture", &[FrameType::ComponentReferenceCapture])?;
		self.repr.int(Self::COMPONENT_REFERENCE_CAPTURE)
	}
}

#[cfg(test)]
mod tests;
