//! Binary render batch encoder.

use bytes::{BufMut, Bytes, BytesMut};

use crate::layout::{BatchLayout, FRAME_SIZE, SECTION_HEADER_SIZE, StringTable, to_i32};
use crate::{EditType, EncodeError, Frame, RenderBatch};

/// Writes [`RenderBatch`]es in the binary layout described in [`crate::layout`].
///
/// The encoder keeps its scratch buffer between calls so a renderer that
/// flushes repeatedly does not reallocate for every batch.
#[derive(Debug, Default)]
pub struct BatchEncoder {
	buf: BytesMut,
}

impl BatchEncoder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Encodes `batch`.
	///
	/// The batch is validated and measured before anything is written, so a
	/// failure never leaves a partial buffer behind.
	///
	/// # Errors
	///
	/// Returns an [`EncodeError`] when the batch is internally inconsistent or
	/// too large for `i32` offsets.
	pub fn encode(&mut self, batch: &RenderBatch) -> Result<Bytes, EncodeError> {
		validate(batch)?;

		let layout = BatchLayout::measure(batch);
		let strings = StringTable::collect(batch);
		let total = layout.strings + strings.byte_len();
		to_i32(total)?;

		self.buf.clear();
		self.buf.reserve(total);
		let mut writer = Writer {
			buf: &mut self.buf,
			layout: &layout,
			strings: &strings,
		};

		for offset in layout.header() {
			writer.put(offset)?;
		}
		writer.updated_components(batch)?;
		writer.reference_frames(batch.reference_frames())?;
		writer.ids("disposed_component_ids", layout.disposed_component_ids, batch.disposed_component_ids())?;
		writer.ids("disposed_event_handler_ids", layout.disposed_event_handler_ids, batch.disposed_event_handler_ids())?;
		writer.strings()?;
		writer.expect_at("end", total)?;

		tracing::trace!(
			bytes = total,
			diffs = batch.updated_components().len(),
			frames = batch.reference_frames().len(),
			strings = strings.entries().len(),
			"wicket.batch.encode"
		);
		Ok(self.buf.split().freeze())
	}
}

struct Writer<'w, 'a> {
	buf: &'w mut BytesMut,
	layout: &'w BatchLayout,
	strings: &'w StringTable<'a>,
}

impl Writer<'_, '_> {
	fn put(&mut self, value: usize) -> Result<(), EncodeError> {
		self.buf.put_i32_le(to_i32(value)?);
		Ok(())
	}

	fn put_string(&mut self, value: Option<&str>) -> Result<(), EncodeError> {
		let pointer = self.strings.pointer(self.layout.strings, value)?;
		self.buf.put_i32_le(pointer);
		Ok(())
	}

	fn expect_at(&self, section: &'static str, expected: usize) -> Result<(), EncodeError> {
		let actual = self.buf.len();
		if actual != expected {
			return Err(EncodeError::LayoutMismatch { section, expected, actual });
		}
		Ok(())
	}

	fn updated_components(&mut self, batch: &RenderBatch) -> Result<(), EncodeError> {
		let layout = self.layout;
		self.expect_at("updated_components", layout.updated_components)?;

		let diffs = batch.updated_components();
		self.put(layout.updated_components + SECTION_HEADER_SIZE)?;
		self.put(diffs.len())?;

		let mut slice_start = 0;
		for diff in diffs {
			self.buf.put_i32_le(diff.component_id);
			self.put(layout.edits)?;
			self.put(slice_start)?;
			self.put(diff.edits.count())?;
			slice_start += diff.edits.count();
		}

		self.expect_at("edits", layout.edits)?;
		for diff in diffs {
			for edit in diff.edits.as_slice() {
				self.buf.put_i32_le(edit.edit_type.code());
				self.buf.put_i32_le(edit.sibling_index);
				self.buf.put_i32_le(edit.reference_frame_index);
				self.put_string(edit.removed_attribute_name.as_deref())?;
			}
		}
		Ok(())
	}

	fn reference_frames(&mut self, frames: &[Frame]) -> Result<(), EncodeError> {
		let section = self.layout.reference_frames;
		self.expect_at("reference_frames", section)?;
		self.put(section + SECTION_HEADER_SIZE)?;
		self.put(frames.len())?;

		for frame in frames {
			let start = self.buf.len();
			self.buf.put_i32_le(frame.frame_type().code());
			match frame {
				Frame::Element { subtree_length, element_name } => {
					self.buf.put_i32_le(*subtree_length);
					self.put_string(Some(element_name))?;
				}
				Frame::Text { text_content } => self.put_string(Some(text_content))?,
				Frame::Attribute { event_handler_id, name, value } => {
					self.buf.put_i32_le(*event_handler_id);
					self.put_string(Some(name))?;
					self.put_string(value.as_deref())?;
				}
				Frame::Component { subtree_length, component_id } => {
					self.buf.put_i32_le(*subtree_length);
					self.buf.put_i32_le(*component_id);
				}
				Frame::Region { subtree_length } => self.buf.put_i32_le(*subtree_length),
				Frame::ElementReferenceCapture { capture_id } => self.put_string(Some(capture_id))?,
				Frame::ComponentReferenceCapture { parent_frame_index } => self.buf.put_i32_le(*parent_frame_index),
			}
			let written = self.buf.len() - start;
			self.buf.put_bytes(0, FRAME_SIZE - written);
		}
		Ok(())
	}

	fn ids(&mut self, section: &'static str, offset: usize, ids: &[i32]) -> Result<(), EncodeError> {
		self.expect_at(section, offset)?;
		self.put(offset + SECTION_HEADER_SIZE)?;
		self.put(ids.len())?;
		for id in ids {
			self.buf.put_i32_le(*id);
		}
		Ok(())
	}

	fn strings(&mut self) -> Result<(), EncodeError> {
		self.expect_at("strings", self.layout.strings)?;
		let strings = self.strings;
		for value in strings.entries() {
			let len = u32::try_from(value.len()).map_err(|_| EncodeError::TooLarge(value.len()))?;
			self.buf.put_u32_le(len);
			self.buf.put_slice(value.as_bytes());
		}
		Ok(())
	}
}

/// Checks every cross-reference inside the batch.
pub(crate) fn validate(batch: &RenderBatch) -> Result<(), EncodeError> {
	let frames = batch.reference_frames();
	let frame_count = frames.len();

	for (index, frame) in frames.iter().enumerate() {
		if let Some(subtree_length) = frame.subtree_length() {
			let end = usize::try_from(subtree_length).ok().filter(|len| *len >= 1).map(|len| index + len);
			if end.is_none_or(|end| end > frame_count) {
				return Err(EncodeError::SubtreeOutOfBounds {
					index,
					subtree_length,
					frame_count,
				});
			}
		}
		if let Frame::ComponentReferenceCapture { parent_frame_index } = frame
			&& !in_bounds(*parent_frame_index, frame_count)
		{
			return Err(EncodeError::ParentOutOfBounds {
				index,
				parent_frame_index: *parent_frame_index,
				frame_count,
			});
		}
	}

	for diff in batch.updated_components() {
		for (edit_index, edit) in diff.edits.as_slice().iter().enumerate() {
			if edit.edit_type.references_frame() && !in_bounds(edit.reference_frame_index, frame_count) {
				return Err(EncodeError::ReferenceOutOfBounds {
					component_id: diff.component_id,
					edit: edit_index,
					frame_index: edit.reference_frame_index,
					frame_count,
				});
			}
			if edit.edit_type == EditType::RemoveAttribute && edit.removed_attribute_name.is_none() {
				return Err(EncodeError::MissingAttributeName {
					component_id: diff.component_id,
					edit: edit_index,
				});
			}
		}
	}
	Ok(())
}

fn in_bounds(index: i32, count: usize) -> bool {
	usize::try_from(index).is_ok_and(|index| index < count)
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use pretty_assertions::assert_eq;

	use super::*;
	use crate::layout::{DIFF_ENTRY_SIZE, EDIT_SIZE, HEADER_SIZE, ID_SIZE, NO_STRING};
	use crate::{ArraySegment, Edit, FrameType, RenderBatchReader};

	fn i32_at(bytes: &[u8], offset: usize) -> i32 {
		i32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
	}

	fn header(bytes: &[u8]) -> [i32; 4] {
		[i32_at(bytes, 0), i32_at(bytes, 4), i32_at(bytes, 8), i32_at(bytes, 12)]
	}

	#[test]
	fn header_offsets_follow_section_sizes() {
		let mut builder = RenderBatch::builder();
		for _ in 0..5 {
			builder.push_frame(Frame::Region { subtree_length: 1 });
		}
		builder.push_diff(1, vec![Edit::prepend_frame(0, 0)]);
		builder.push_diff(2, vec![Edit::step_in(0), Edit::step_out()]);
		builder.dispose_event_handler(11);
		let bytes = BatchEncoder::new().encode(&builder.build()).unwrap();

		let updated = HEADER_SIZE;
		let frames = updated + SECTION_HEADER_SIZE + 2 * DIFF_ENTRY_SIZE + 3 * EDIT_SIZE;
		let disposed_components = frames + SECTION_HEADER_SIZE + 5 * FRAME_SIZE;
		let disposed_handlers = disposed_components + SECTION_HEADER_SIZE;
		let offsets = header(&bytes);
		assert!(offsets.windows(2).all(|pair| pair[0] < pair[1]));
		assert_eq!(offsets, [updated as i32, frames as i32, disposed_components as i32, disposed_handlers as i32]);
		assert_eq!(bytes.len(), disposed_handlers + SECTION_HEADER_SIZE + ID_SIZE);

		assert_eq!(i32_at(&bytes, disposed_components + 4), 0);
		assert_eq!(i32_at(&bytes, disposed_handlers + 4), 1);
		assert_eq!(i32_at(&bytes, disposed_handlers + SECTION_HEADER_SIZE), 11);
	}

	#[test]
	fn diff_entries_address_the_shared_edit_region() {
		let mut builder = RenderBatch::builder();
		builder.push_frame(Frame::text("a"));
		builder.push_diff(7, vec![Edit::step_in(0), Edit::step_out()]);
		builder.push_diff(8, vec![Edit::update_text(0, 0)]);
		let bytes = BatchEncoder::new().encode(&builder.build()).unwrap();

		let edits = HEADER_SIZE + SECTION_HEADER_SIZE + 2 * DIFF_ENTRY_SIZE;
		let second = HEADER_SIZE + SECTION_HEADER_SIZE + DIFF_ENTRY_SIZE;
		assert_eq!(i32_at(&bytes, second), 8);
		assert_eq!(i32_at(&bytes, second + 4), edits as i32);
		assert_eq!(i32_at(&bytes, second + 8), 2);
		assert_eq!(i32_at(&bytes, second + 12), 1);

		let third_edit = edits + 2 * EDIT_SIZE;
		assert_eq!(i32_at(&bytes, third_edit), EditType::UpdateText.code());
		assert_eq!(i32_at(&bytes, third_edit + 12), NO_STRING);
	}

	#[test]
	fn text_and_element_frames_read_back() {
		let mut builder = RenderBatch::builder();
		builder.push_frame(Frame::text("hello"));
		builder.push_frame(Frame::element(3, "div"));
		builder.push_frame(Frame::attribute("class", "x"));
		builder.push_frame(Frame::text("hello"));
		let batch = builder.build();
		let bytes = BatchEncoder::new().encode(&batch).unwrap();

		let reader = RenderBatchReader::from_bytes(bytes);
		let frames = reader.reference_frames().unwrap();
		assert_eq!(frames.count(), 4);

		let text = frames.get(0).unwrap();
		assert_eq!(text.frame_type().unwrap(), FrameType::Text);
		assert_eq!(text.text_content().unwrap(), "hello");

		let element = frames.get(1).unwrap();
		assert_eq!(element.frame_type().unwrap(), FrameType::Element);
		assert_eq!(element.subtree_length().unwrap(), 3);
		assert_eq!(element.element_name().unwrap(), "div");
		assert!(element.text_content().is_err());

		let attribute = frames.get(2).unwrap();
		assert_eq!(attribute.attribute_name().unwrap(), "class");
		assert_eq!(attribute.attribute_value().unwrap().as_deref(), Some("x"));
	}

	#[test]
	fn repeated_strings_are_stored_once() {
		let mut builder = RenderBatch::builder();
		builder.push_frame(Frame::text("same"));
		builder.push_frame(Frame::text("same"));
		let bytes = BatchEncoder::new().encode(&builder.build()).unwrap();

		let strings = HEADER_SIZE + SECTION_HEADER_SIZE + (SECTION_HEADER_SIZE + 2 * FRAME_SIZE) + 2 * SECTION_HEADER_SIZE;
		assert_eq!(bytes.len(), strings + 4 + 4);
		let frames = i32_at(&bytes, 4) as usize + SECTION_HEADER_SIZE;
		assert_eq!(i32_at(&bytes, frames + 4), strings as i32);
		assert_eq!(i32_at(&bytes, frames + FRAME_SIZE + 4), strings as i32);
	}

	#[test]
	fn segment_edits_are_written_from_their_offset() {
		let shared: Arc<[Edit]> = vec![Edit::remove_frame(9), Edit::remove_frame(1), Edit::remove_frame(2)].into();
		let mut builder = RenderBatch::builder();
		builder.push_diff(1, ArraySegment::new(shared, 1..3));
		let bytes = BatchEncoder::new().encode(&builder.build()).unwrap();

		let reader = RenderBatchReader::from_bytes(bytes);
		let diff = reader.updated_components().unwrap().get(0).unwrap();
		let siblings: Vec<i32> = diff.edits().unwrap().iter().map(|edit| edit.unwrap().sibling_index().unwrap()).collect();
		assert_eq!(siblings, vec![1, 2]);
	}

	#[test]
	fn encoder_reuses_its_buffer_between_batches() {
		let mut encoder = BatchEncoder::new();
		let first = encoder.encode(&RenderBatch::default()).unwrap();
		let mut builder = RenderBatch::builder();
		builder.dispose_component(4);
		let second = encoder.encode(&builder.build()).unwrap();

		assert_eq!(first.len(), 48);
		assert_eq!(second.len(), 52);
		assert_eq!(header(&first), [16, 24, 32, 40]);
	}

	#[test]
	fn subtree_past_the_end_is_rejected() {
		let mut builder = RenderBatch::builder();
		builder.push_frame(Frame::element(2, "div"));
		let err = BatchEncoder::new().encode(&builder.build()).unwrap_err();
		assert!(matches!(err, EncodeError::SubtreeOutOfBounds { index: 0, subtree_length: 2, frame_count: 1 }));
	}

	#[test]
	fn zero_subtree_is_rejected() {
		let mut builder = RenderBatch::builder();
		builder.push_frame(Frame::Region { subtree_length: 0 });
		let err = BatchEncoder::new().encode(&builder.build()).unwrap_err();
		assert!(matches!(err, EncodeError::SubtreeOutOfBounds { .. }));
	}

	#[test]
	fn dangling_references_are_rejected() {
		let mut builder = RenderBatch::builder();
		builder.push_frame(Frame::text("x"));
		builder.push_diff(5, vec![Edit::step_in(0), Edit::prepend_frame(0, 3)]);
		let err = BatchEncoder::new().encode(&builder.build()).unwrap_err();
		assert!(matches!(
			err,
			EncodeError::ReferenceOutOfBounds {
				component_id: 5,
				edit: 1,
				frame_index: 3,
				frame_count: 1
			}
		));

		let mut builder = RenderBatch::builder();
		builder.push_frame(Frame::ComponentReferenceCapture { parent_frame_index: -1 });
		let err = BatchEncoder::new().encode(&builder.build()).unwrap_err();
		assert!(matches!(err, EncodeError::ParentOutOfBounds { index: 0, .. }));
	}

	#[test]
	fn remove_attribute_needs_a_name() {
		let mut edit = Edit::remove_attribute(0, "class");
		edit.removed_attribute_name = None;
		let mut builder = RenderBatch::builder();
		builder.push_diff(3, vec![edit]);
		let err = BatchEncoder::new().encode(&builder.build()).unwrap_err();
		assert!(matches!(err, EncodeError::MissingAttributeName { component_id: 3, edit: 0 }));
	}
}
