use pretty_assertions::assert_eq;
use serde_json::json;

use super::*;
use crate::{BatchEncoder, Edit, Frame, RenderBatch};

fn sample() -> RenderBatch {
	let mut builder = RenderBatch::builder();
	builder.push_frame(Frame::element(3, "button"));
	builder.push_frame(Frame::event_handler(12, "onclick"));
	builder.push_frame(Frame::text("Click"));
	builder.push_frame(Frame::Component {
		subtree_length: 1,
		component_id: 40,
	});
	builder.push_frame(Frame::ElementReferenceCapture {
		capture_id: "ref-1".to_string(),
	});
	builder.push_frame(Frame::ComponentReferenceCapture { parent_frame_index: 3 });
	builder.push_diff(1, vec![Edit::prepend_frame(0, 0), Edit::remove_attribute(1, "disabled")]);
	builder.push_diff(2, vec![Edit::step_in(0), Edit::update_text(0, 2), Edit::step_out()]);
	builder.dispose_component(17);
	builder.dispose_event_handler(5).dispose_event_handler(6);
	builder.build()
}

fn readers(batch: &RenderBatch) -> [RenderBatchReader; 2] {
	let binary = BatchEncoder::new().encode(batch).unwrap();
	let structured = serde_json::to_value(batch).unwrap();
	[RenderBatchReader::from_bytes(binary), RenderBatchReader::from_value(structured)]
}

/// Flattens everything a reader exposes into comparable text.
fn describe(reader: &RenderBatchReader) -> Vec<String> {
	let mut out = Vec::new();
	for diff in reader.updated_components().unwrap().iter() {
		let diff = diff.unwrap();
		out.push(format!("diff {}", diff.component_id().unwrap()));
		for edit in diff.edits().unwrap().iter() {
			let edit = edit.unwrap();
			out.push(format!(
				"  {:?} sibling={} ref={} removed={:?}",
				edit.edit_type().unwrap(),
				edit.sibling_index().unwrap(),
				edit.reference_frame_index().unwrap(),
				edit.removed_attribute_name().unwrap(),
			));
		}
	}
	for frame in reader.reference_frames().unwrap().iter() {
		let frame = frame.unwrap();
		let line = match frame.frame_type().unwrap() {
			FrameType::Element => format!("element {} {}", frame.element_name().unwrap(), frame.subtree_length().unwrap()),
			FrameType::Text => format!("text {}", frame.text_content().unwrap()),
			FrameType::Attribute => format!(
				"attribute {} handler={} value={:?}",
				frame.attribute_name().unwrap(),
				frame.attribute_event_handler_id().unwrap(),
				frame.attribute_value().unwrap(),
			),
			FrameType::Component => format!("component {} {}", frame.component_id().unwrap(), frame.subtree_length().unwrap()),
			FrameType::Region => format!("region {}", frame.subtree_length().unwrap()),
			FrameType::ElementReferenceCapture => format!("element ref {}", frame.element_reference_capture_id().unwrap()),
			FrameType::ComponentReferenceCapture => format!("component ref {}", frame.component_reference_capture_parent().unwrap()),
		};
		out.push(line);
	}
	let ids = |view: ArrayView<'_, i32>| view.iter().map(|id| id.unwrap().to_string()).collect::<Vec<_>>().join(",");
	out.push(format!("disposed components [{}]", ids(reader.disposed_component_ids().unwrap())));
	out.push(format!("disposed handlers [{}]", ids(reader.disposed_event_handler_ids().unwrap())));
	out
}

#[test]
fn both_forms_expose_the_same_batch() {
	let [binary, structured] = readers(&sample());
	let expected = vec![
		"diff 1",
		"  PrependFrame sibling=0 ref=0 removed=None",
		"  RemoveAttribute sibling=1 ref=0 removed=Some(\"disabled\")",
		"diff 2",
		"  StepIn sibling=0 ref=0 removed=None",
		"  UpdateText sibling=0 ref=2 removed=None",
		"  StepOut sibling=0 ref=0 removed=None",
		"element button 3",
		"attribute onclick handler=12 value=None",
		"text Click",
		"component 40 1",
		"element ref ref-1",
		"component ref 3",
		"disposed components [17]",
		"disposed handlers [5,6]",
	];
	assert_eq!(describe(&binary), expected);
	assert_eq!(describe(&structured), expected);
}

#[test]
fn empty_batch_reads_as_empty_arrays() {
	for reader in readers(&RenderBatch::default()) {
		assert!(reader.updated_components().unwrap().is_empty());
		assert!(reader.reference_frames().unwrap().is_empty());
		assert_eq!(reader.disposed_component_ids().unwrap().count(), 0);
		assert_eq!(reader.disposed_event_handler_ids().unwrap().count(), 0);
	}
}

#[test]
fn fields_are_checked_against_the_frame_kind() {
	for reader in readers(&sample()) {
		let text = reader.reference_frames().unwrap().get(2).unwrap();
		assert!(matches!(
			text.element_name(),
			Err(DecodeError::FieldMismatch {
				field: "elementName",
				frame_type: FrameType::Text
			})
		));
		assert!(matches!(text.subtree_length(), Err(DecodeError::FieldMismatch { .. })));
	}
}

#[test]
fn index_past_count_is_an_error() {
	for reader in readers(&sample()) {
		let frames = reader.reference_frames().unwrap();
		assert!(matches!(frames.get(6), Err(DecodeError::IndexOutOfRange { index: 6, count: 6 })));
	}
}

#[test]
fn truncated_buffer_is_rejected() {
	let bytes = BatchEncoder::new().encode(&sample()).unwrap();
	let reader = RenderBatchReader::from_bytes(bytes.slice(..40));
	assert!(matches!(reader.reference_frames(), Err(DecodeError::OutOfBounds { .. })));

	let reader = RenderBatchReader::from_bytes(bytes.slice(..8));
	assert!(matches!(reader.updated_components(), Err(DecodeError::OutOfBounds { .. })));
}

#[test]
fn unknown_tags_are_reported() {
	let reader = RenderBatchReader::from_value(json!({
		"updatedComponents": [{"componentId": 1, "edits": {"array": [{"type": 42, "siblingIndex": 0, "referenceFrameIndex": 0}], "offset": 0, "count": 1}}],
		"referenceFrames": [{"frameType": 9}],
		"disposedComponentIds": [],
		"disposedEventHandlerIds": []
	}));
	let frame = reader.reference_frames().unwrap().get(0).unwrap();
	assert!(matches!(frame.frame_type(), Err(DecodeError::UnknownFrameType(9))));
	assert!(matches!(frame.text_content(), Err(DecodeError::UnknownFrameType(9))));

	let diff = reader.updated_components().unwrap().get(0).unwrap();
	let edit = diff.edits().unwrap().get(0).unwrap();
	assert!(matches!(edit.edit_type(), Err(DecodeError::UnknownEditType(42))));
}

#[test]
fn structured_payload_missing_a_section_is_rejected() {
	let reader = RenderBatchReader::from_json(br#"{"referenceFrames": []}"#).unwrap();
	assert!(reader.reference_frames().unwrap().is_empty());
	assert!(matches!(reader.updated_components(), Err(DecodeError::MissingField("updatedComponents"))));
	assert!(matches!(RenderBatchReader::from_json(b"{"), Err(DecodeError::Json(_))));
}
