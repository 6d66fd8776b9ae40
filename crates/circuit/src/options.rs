//! Circuit configuration.

use serde::Deserialize;
use wicket_batch::BatchFormat;

use crate::CircuitError;

const DEFAULT_MAX_BATCH_BYTES: usize = 16 * 1024 * 1024;

/// Per-circuit settings.
///
/// Every field has a default, so an empty document is valid:
///
/// ```toml
/// renderer_id = 0
/// batch_format = "binary"   # or "structured"
/// max_batch_bytes = 16777216
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CircuitOptions {
	/// Target id stamped on every `JS.RenderBatch`.
	pub renderer_id: i32,
	pub batch_format: BatchFormat,
	/// Largest encoded batch the renderer will send.
	pub max_batch_bytes: usize,
}

impl Default for CircuitOptions {
	fn default() -> Self {
		Self {
			renderer_id: 0,
			batch_format: BatchFormat::default(),
			max_batch_bytes: DEFAULT_MAX_BATCH_BYTES,
		}
	}
}

impl CircuitOptions {
	/// Parses and validates options from TOML text.
	///
	/// # Errors
	///
	/// [`CircuitError::Toml`] for malformed text or unknown keys,
	/// [`CircuitError::InvalidOptions`] for out-of-range values.
	pub fn from_toml_str(text: &str) -> Result<Self, CircuitError> {
		let options: Self = toml::from_str(text)?;
		options.validate()?;
		Ok(options)
	}

	/// Checks value ranges.
	///
	/// # Errors
	///
	/// Returns [`CircuitError::InvalidOptions`] naming the offending field.
	pub fn validate(&self) -> Result<(), CircuitError> {
		if self.renderer_id < 0 {
			return Err(CircuitError::InvalidOptions(format!("renderer_id must be non-negative, got {}", self.renderer_id)));
		}
		if self.max_batch_bytes == 0 || i32::try_from(self.max_batch_bytes).is_err() {
			return Err(CircuitError::InvalidOptions(format!(
				"max_batch_bytes must be between 1 and {}, got {}",
				i32::MAX,
				self.max_batch_bytes
			)));
		}
		Ok(())
	}
}
