//! Render batches: the unit of UI-tree mutation sent from a circuit to its client.
//!
//! * [`RenderBatch`] and its parts: the in-memory model built once per flush
//! * [`BatchEncoder`]: writes the compact binary layout (see [`layout`])
//! * [`RenderBatchReader`]: reads either wire form through one indexed API
//! * [`BatchFormat`] / [`ClientEnvironment`]: explicit format selection

mod encode;
pub mod error;
mod format;
pub mod layout;
mod model;
mod read;

pub use encode::BatchEncoder;
pub use error::{DecodeError, EncodeError};
pub use format::{BatchFormat, ClientEnvironment};
pub use model::{ArraySegment, ComponentDiff, Edit, EditType, Frame, FrameType, RenderBatch, RenderBatchBuilder};
pub use read::{ArrayView, BatchPayload, DiffView, EditView, FrameView, RenderBatchReader};
