//! Render batch data model.
//!
//! A [`RenderBatch`] is produced once per flush by a [`RenderBatchBuilder`]
//! and is immutable afterwards. The serde form is the structured payload a
//! [`RenderBatchReader`](crate::RenderBatchReader) can read in place of the
//! binary one: camelCase fields, integer `frameType`/`type` tags, and edit
//! slices as `{array, offset, count}`.

use std::ops::Range;
use std::sync::Arc;

use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};

/// Kind of a [`Frame`], with its wire tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameType {
	Element,
	Text,
	Attribute,
	Component,
	Region,
	ElementReferenceCapture,
	ComponentReferenceCapture,
}

impl FrameType {
	/// Returns the wire tag.
	pub const fn code(self) -> i32 {
		match self {
			Self::Element => 1,
			Self::Text => 2,
			Self::Attribute => 3,
			Self::Component => 4,
			Self::Region => 5,
			Self::ElementReferenceCapture => 6,
			Self::ComponentReferenceCapture => 7,
		}
	}

	/// Parses a wire tag.
	pub const fn from_code(code: i32) -> Option<Self> {
		Some(match code {
			1 => Self::Element,
			2 => Self::Text,
			3 => Self::Attribute,
			4 => Self::Component,
			5 => Self::Region,
			6 => Self::ElementReferenceCapture,
			7 => Self::ComponentReferenceCapture,
			_ => return None,
		})
	}
}

/// Kind of an [`Edit`], with its wire tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditType {
	PrependFrame,
	RemoveFrame,
	SetAttribute,
	RemoveAttribute,
	UpdateText,
	StepIn,
	StepOut,
}

impl EditType {
	/// Returns the wire tag.
	pub const fn code(self) -> i32 {
		match self {
			Self::PrependFrame => 1,
			Self::RemoveFrame => 2,
			Self::SetAttribute => 3,
			Self::RemoveAttribute => 4,
			Self::UpdateText => 5,
			Self::StepIn => 6,
			Self::StepOut => 7,
		}
	}

	/// Parses a wire tag.
	pub const fn from_code(code: i32) -> Option<Self> {
		Some(match code {
			1 => Self::PrependFrame,
			2 => Self::RemoveFrame,
			3 => Self::SetAttribute,
			4 => Self::RemoveAttribute,
			5 => Self::UpdateText,
			6 => Self::StepIn,
			7 => Self::StepOut,
			_ => return None,
		})
	}

	/// Returns true when the edit points into the batch's reference frames.
	pub const fn references_frame(self) -> bool {
		matches!(self, Self::PrependFrame | Self::SetAttribute | Self::UpdateText)
	}
}

impl Serialize for FrameType {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_i32(self.code())
	}
}

impl Serialize for EditType {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_i32(self.code())
	}
}

/// One record of the flattened render tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
	/// `subtree_length` counts this frame plus its descendants.
	Element { subtree_length: i32, element_name: String },
	Text { text_content: String },
	/// `event_handler_id` is 0 for plain attributes.
	Attribute {
		event_handler_id: i32,
		name: String,
		value: Option<String>,
	},
	Component { subtree_length: i32, component_id: i32 },
	Region { subtree_length: i32 },
	ElementReferenceCapture { capture_id: String },
	ComponentReferenceCapture { parent_frame_index: i32 },
}

impl Frame {
	pub fn element(subtree_length: i32, element_name: impl Into<String>) -> Self {
		Self::Element {
			subtree_length,
			element_name: element_name.into(),
		}
	}

	pub fn text(text_content: impl Into<String>) -> Self {
		Self::Text {
			text_content: text_content.into(),
		}
	}

	pub fn attribute(name: impl Into<String>, value: impl Into<String>) -> Self {
		Self::Attribute {
			event_handler_id: 0,
			name: name.into(),
			value: Some(value.into()),
		}
	}

	pub fn event_handler(event_handler_id: i32, name: impl Into<String>) -> Self {
		Self::Attribute {
			event_handler_id,
			name: name.into(),
			value: None,
		}
	}

	pub fn frame_type(&self) -> FrameType {
		match self {
			Self::Element { .. } => FrameType::Element,
			Self::Text { .. } => FrameType::Text,
			Self::Attribute { .. } => FrameType::Attribute,
			Self::Component { .. } => FrameType::Component,
			Self::Region { .. } => FrameType::Region,
			Self::ElementReferenceCapture { .. } => FrameType::ElementReferenceCapture,
			Self::ComponentReferenceCapture { .. } => FrameType::ComponentReferenceCapture,
		}
	}

	/// Returns the subtree length for frame kinds that span descendants.
	pub fn subtree_length(&self) -> Option<i32> {
		match self {
			Self::Element { subtree_length, .. } | Self::Component { subtree_length, .. } | Self::Region { subtree_length } => Some(*subtree_length),
			_ => None,
		}
	}
}

impl Serialize for Frame {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let mut map = serializer.serialize_map(None)?;
		map.serialize_entry("frameType", &self.frame_type())?;
		match self {
			Self::Element { subtree_length, element_name } => {
				map.serialize_entry("subtreeLength", subtree_length)?;
				map.serialize_entry("elementName", element_name)?;
			}
			Self::Text { text_content } => {
				map.serialize_entry("textContent", text_content)?;
			}
			Self::Attribute { event_handler_id, name, value } => {
				map.serialize_entry("attributeEventHandlerId", event_handler_id)?;
				map.serialize_entry("attributeName", name)?;
				map.serialize_entry("attributeValue", value)?;
			}
			Self::Component { subtree_length, component_id } => {
				map.serialize_entry("subtreeLength", subtree_length)?;
				map.serialize_entry("componentId", component_id)?;
			}
			Self::Region { subtree_length } => {
				map.serialize_entry("subtreeLength", subtree_length)?;
			}
			Self::ElementReferenceCapture { capture_id } => {
				map.serialize_entry("elementReferenceCaptureId", capture_id)?;
			}
			Self::ComponentReferenceCapture { parent_frame_index } => {
				map.serialize_entry("componentReferenceCapture", parent_frame_index)?;
			}
		}
		map.end()
	}
}

/// One structural change against the previous tree state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Edit {
	#[serde(rename = "type")]
	pub edit_type: EditType,
	pub sibling_index: i32,
	/// Index into the batch's reference frames; doubles as the new tree index.
	pub reference_frame_index: i32,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub removed_attribute_name: Option<String>,
}

impl Edit {
	fn new(edit_type: EditType, sibling_index: i32, reference_frame_index: i32) -> Self {
		Self {
			edit_type,
			sibling_index,
			reference_frame_index,
			removed_attribute_name: None,
		}
	}

	pub fn prepend_frame(sibling_index: i32, reference_frame_index: i32) -> Self {
		Self::new(EditType::PrependFrame, sibling_index, reference_frame_index)
	}

	pub fn remove_frame(sibling_index: i32) -> Self {
		Self::new(EditType::RemoveFrame, sibling_index, 0)
	}

	pub fn set_attribute(sibling_index: i32, reference_frame_index: i32) -> Self {
		Self::new(EditType::SetAttribute, sibling_index, reference_frame_index)
	}

	pub fn remove_attribute(sibling_index: i32, name: impl Into<String>) -> Self {
		Self {
			removed_attribute_name: Some(name.into()),
			..Self::new(EditType::RemoveAttribute, sibling_index, 0)
		}
	}

	pub fn update_text(sibling_index: i32, reference_frame_index: i32) -> Self {
		Self::new(EditType::UpdateText, sibling_index, reference_frame_index)
	}

	pub fn step_in(sibling_index: i32) -> Self {
		Self::new(EditType::StepIn, sibling_index, 0)
	}

	pub fn step_out() -> Self {
		Self::new(EditType::StepOut, 0, 0)
	}
}

/// A sub-range of a shared, reference-counted array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArraySegment<T> {
	array: Arc<[T]>,
	offset: usize,
	count: usize,
}

impl<T> ArraySegment<T> {
	/// Creates a segment over `range` of `array`.
	///
	/// # Panics
	///
	/// Panics if `range` is not within `array`.
	pub fn new(array: Arc<[T]>, range: Range<usize>) -> Self {
		assert!(range.start <= range.end && range.end <= array.len(), "segment {range:?} out of bounds for array of {}", array.len());
		Self {
			array,
			offset: range.start,
			count: range.end - range.start,
		}
	}

	pub fn offset(&self) -> usize {
		self.offset
	}

	pub fn count(&self) -> usize {
		self.count
	}

	pub fn is_empty(&self) -> bool {
		self.count == 0
	}

	pub fn as_slice(&self) -> &[T] {
		&self.array[self.offset..self.offset + self.count]
	}

	/// Returns the whole backing array.
	pub fn array(&self) -> &[T] {
		&self.array
	}
}

impl<T> From<Vec<T>> for ArraySegment<T> {
	fn from(items: Vec<T>) -> Self {
		let count = items.len();
		Self {
			array: items.into(),
			offset: 0,
			count,
		}
	}
}

impl<T: Serialize> Serialize for ArraySegment<T> {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let mut state = serializer.serialize_struct("ArraySegment", 3)?;
		state.serialize_field("array", &*self.array)?;
		state.serialize_field("offset", &self.offset)?;
		state.serialize_field("count", &self.count)?;
		state.end()
	}
}

/// Edits for one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentDiff {
	pub component_id: i32,
	pub edits: ArraySegment<Edit>,
}

/// One flush worth of UI-tree mutations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderBatch {
	updated_components: Vec<ComponentDiff>,
	reference_frames: Vec<Frame>,
	disposed_component_ids: Vec<i32>,
	disposed_event_handler_ids: Vec<i32>,
}

impl RenderBatch {
	pub fn builder() -> RenderBatchBuilder {
		RenderBatchBuilder::default()
	}

	pub fn updated_components(&self) -> &[ComponentDiff] {
		&self.updated_components
	}

	pub fn reference_frames(&self) -> &[Frame] {
		&self.reference_frames
	}

	pub fn disposed_component_ids(&self) -> &[i32] {
		&self.disposed_component_ids
	}

	pub fn disposed_event_handler_ids(&self) -> &[i32] {
		&self.disposed_event_handler_ids
	}

	/// Total number of edits across all diffs.
	pub fn edit_count(&self) -> usize {
		self.updated_components.iter().map(|diff| diff.edits.count()).sum()
	}

	/// True when no section holds anything.
	pub fn is_empty(&self) -> bool {
		self.updated_components.is_empty()
			&& self.reference_frames.is_empty()
			&& self.disposed_component_ids.is_empty()
			&& self.disposed_event_handler_ids.is_empty()
	}
}

/// Append-only builder for a [`RenderBatch`].
#[derive(Debug, Default)]
pub struct RenderBatchBuilder {
	batch: RenderBatch,
}

impl RenderBatchBuilder {
	/// Appends a reference frame and returns its index.
	///
	/// Returns `None`, leaving the batch unchanged, once frame indices no
	/// longer fit in an `i32`.
	pub fn push_frame(&mut self, frame: Frame) -> Option<i32> {
		let index = frame_index(self.batch.reference_frames.len())?;
		self.batch.reference_frames.push(frame);
		Some(index)
	}

	pub fn push_diff(&mut self, component_id: i32, edits: impl Into<ArraySegment<Edit>>) -> &mut Self {
		self.batch.updated_components.push(ComponentDiff {
			component_id,
			edits: edits.into(),
		});
		self
	}

	pub fn dispose_component(&mut self, component_id: i32) -> &mut Self {
		self.batch.disposed_component_ids.push(component_id);
		self
	}

	pub fn dispose_event_handler(&mut self, event_handler_id: i32) -> &mut Self {
		self.batch.disposed_event_handler_ids.push(event_handler_id);
		self
	}

	pub fn build(self) -> RenderBatch {
		self.batch
	}
}

fn frame_index(len: usize) -> Option<i32> {
	i32::try_from(len).ok()
}
