//! Wire format selection shared by the encoding and receiving sides.

use bytes::Bytes;
use serde::Deserialize;

use crate::encode::validate;
use crate::{BatchEncoder, DecodeError, EncodeError, RenderBatch, RenderBatchReader};

/// How render batches travel over the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchFormat {
	#[default]
	Binary,
	Structured,
}

impl BatchFormat {
	/// Encodes `batch` in this format.
	///
	/// # Errors
	///
	/// Both formats reject a batch whose internal references do not resolve.
	pub fn encode(self, encoder: &mut BatchEncoder, batch: &RenderBatch) -> Result<Bytes, EncodeError> {
		match self {
			Self::Binary => encoder.encode(batch),
			Self::Structured => {
				validate(batch)?;
				Ok(serde_json::to_vec(batch)?.into())
			}
		}
	}
}

/// Receiving-side configuration, passed explicitly to whoever decodes batches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientEnvironment {
	pub batch_format: BatchFormat,
}

impl ClientEnvironment {
	pub fn new(batch_format: BatchFormat) -> Self {
		Self { batch_format }
	}

	/// Wraps a received payload in a reader for the configured format.
	///
	/// # Errors
	///
	/// Returns [`DecodeError::Json`] when a structured payload does not parse.
	pub fn read_batch(&self, payload: Bytes) -> Result<RenderBatchReader, DecodeError> {
		match self.batch_format {
			BatchFormat::Binary => Ok(RenderBatchReader::from_bytes(payload)),
			BatchFormat::Structured => RenderBatchReader::from_json(&payload),
		}
	}
}
