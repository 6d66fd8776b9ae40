//! Binary layout of an encoded render batch.
//!
//! All integers are little-endian `i32`. Offsets are absolute byte positions
//! from the start of the buffer.
//!
//! ```text
//! header            4 x i32: updated components, reference frames,
//!                   disposed component ids, disposed event handler ids
//! updated comps     {contents, count} | count x diff entry | shared edit records
//!   diff entry      component_id | {edits contents, slice start, count}
//! reference frames  {contents, count} | count x 28-byte frame record
//! disposed comps    {contents, count} | count x i32
//! disposed handlers {contents, count} | count x i32
//! strings           u32 byte length | UTF-8 bytes, one per distinct string
//! ```
//!
//! String fields in records hold the absolute offset of their entry in the
//! string region, or [`NO_STRING`].

use std::collections::HashMap;

use crate::{EncodeError, Frame, RenderBatch};

pub const HEADER_SIZE: usize = 16;
pub const SECTION_HEADER_SIZE: usize = 8;
pub const SLICE_HEADER_SIZE: usize = 12;
pub const DIFF_ENTRY_SIZE: usize = 4 + SLICE_HEADER_SIZE;
pub const FRAME_SIZE: usize = 28;
pub const EDIT_SIZE: usize = 16;
pub const ID_SIZE: usize = 4;
pub const STRING_PREFIX_SIZE: usize = 4;

/// String pointer value meaning "absent".
pub const NO_STRING: i32 = -1;

/// Byte length of the updated-components section.
pub const fn updated_components_len(diff_count: usize, edit_count: usize) -> usize {
	SECTION_HEADER_SIZE + diff_count * DIFF_ENTRY_SIZE + edit_count * EDIT_SIZE
}

/// Byte length of the reference-frames section.
pub const fn reference_frames_len(frame_count: usize) -> usize {
	SECTION_HEADER_SIZE + frame_count * FRAME_SIZE
}

/// Byte length of an id section.
pub const fn ids_len(id_count: usize) -> usize {
	SECTION_HEADER_SIZE + id_count * ID_SIZE
}

/// Absolute offsets computed by the measuring pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchLayout {
	pub updated_components: usize,
	/// Start of the shared edit records inside the updated-components section.
	pub edits: usize,
	pub reference_frames: usize,
	pub disposed_component_ids: usize,
	pub disposed_event_handler_ids: usize,
	/// Start of the trailing string region.
	pub strings: usize,
}

impl BatchLayout {
	/// Computes section offsets from the batch's counts alone.
	pub fn measure(batch: &RenderBatch) -> Self {
		let diff_count = batch.updated_components().len();
		let updated_components = HEADER_SIZE;
		let edits = updated_components + SECTION_HEADER_SIZE + diff_count * DIFF_ENTRY_SIZE;
		let reference_frames = updated_components + updated_components_len(diff_count, batch.edit_count());
		let disposed_component_ids = reference_frames + reference_frames_len(batch.reference_frames().len());
		let disposed_event_handler_ids = disposed_component_ids + ids_len(batch.disposed_component_ids().len());
		let strings = disposed_event_handler_ids + ids_len(batch.disposed_event_handler_ids().len());

		Self {
			updated_components,
			edits,
			reference_frames,
			disposed_component_ids,
			disposed_event_handler_ids,
			strings,
		}
	}

	/// Header values in wire order.
	pub fn header(&self) -> [usize; 4] {
		[
			self.updated_components,
			self.reference_frames,
			self.disposed_component_ids,
			self.disposed_event_handler_ids,
		]
	}
}

/// Distinct strings of a batch in emission order, with their absolute offsets.
#[derive(Debug, Default)]
pub(crate) struct StringTable<'a> {
	entries: Vec<&'a str>,
	offsets: HashMap<&'a str, usize>,
	len: usize,
}

impl<'a> StringTable<'a> {
	/// Interns every string of `batch` in the order the emitter visits them.
	pub(crate) fn collect(batch: &'a RenderBatch) -> Self {
		let mut table = Self::default();
		for diff in batch.updated_components() {
			for edit in diff.edits.as_slice() {
				table.intern(edit.removed_attribute_name.as_deref());
			}
		}
		for frame in batch.reference_frames() {
			match frame {
				Frame::Element { element_name, .. } => table.intern(Some(element_name)),
				Frame::Text { text_content } => table.intern(Some(text_content)),
				Frame::Attribute { name, value, .. } => {
					table.intern(Some(name));
					table.intern(value.as_deref());
				}
				Frame::ElementReferenceCapture { capture_id } => table.intern(Some(capture_id)),
				Frame::Component { .. } | Frame::Region { .. } | Frame::ComponentReferenceCapture { .. } => {}
			}
		}
		table
	}

	fn intern(&mut self, value: Option<&'a str>) {
		let Some(value) = value else {
			return;
		};
		if self.offsets.contains_key(value) {
			return;
		}
		self.offsets.insert(value, self.len);
		self.entries.push(value);
		self.len += STRING_PREFIX_SIZE + value.len();
	}

	/// Total byte length of the string region.
	pub(crate) fn byte_len(&self) -> usize {
		self.len
	}

	pub(crate) fn entries(&self) -> &[&'a str] {
		&self.entries
	}

	/// Absolute pointer for `value` given the region start, or [`NO_STRING`].
	pub(crate) fn pointer(&self, region: usize, value: Option<&str>) -> Result<i32, EncodeError> {
		match value {
			None => Ok(NO_STRING),
			Some(value) => {
				let Some(relative) = self.offsets.get(value) else {
					return Err(EncodeError::MissingString(value.to_string()));
				};
				to_i32(region + relative)
			}
		}
	}
}

pub(crate) fn to_i32(value: usize) -> Result<i32, EncodeError> {
	i32::try_from(value).map_err(|_| EncodeError::TooLarge(value))
}
