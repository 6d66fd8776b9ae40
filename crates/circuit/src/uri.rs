//! Start URIs supplied by `StartCircuit`.

use url::Url;
use wicket_rpc::HubRequest;

use crate::CircuitError;

/// The page URI and application base URI a circuit was started with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitUris {
	uri: Url,
	base: Url,
}

impl CircuitUris {
	/// Parses both URIs and checks that `uri_absolute` lies under `base_uri_absolute`.
	///
	/// # Errors
	///
	/// Returns [`CircuitError::InvalidUri`] naming the offending URI.
	pub fn parse(uri_absolute: &str, base_uri_absolute: &str) -> Result<Self, CircuitError> {
		let parse = |text: &str| {
			Url::parse(text).map_err(|err| CircuitError::InvalidUri {
				uri: text.to_string(),
				reason: err.to_string(),
			})
		};
		let uri = parse(uri_absolute)?;
		let base = parse(base_uri_absolute)?;

		if !uri.as_str().starts_with(base.as_str()) {
			return Err(CircuitError::InvalidUri {
				uri: uri_absolute.to_string(),
				reason: format!("not within base URI {base}"),
			});
		}
		Ok(Self { uri, base })
	}

	/// Extracts and parses the URIs of a `StartCircuit` request.
	///
	/// # Errors
	///
	/// [`CircuitError::InvalidUri`] for bad URIs; any other request kind is
	/// rejected the same way.
	pub fn from_request(request: &HubRequest) -> Result<Self, CircuitError> {
		match request {
			HubRequest::StartCircuit {
				uri_absolute,
				base_uri_absolute,
			} => Self::parse(uri_absolute, base_uri_absolute),
			other => Err(CircuitError::InvalidUri {
				uri: String::new(),
				reason: format!("{} carries no start URIs", other.method_name()),
			}),
		}
	}

	pub fn uri(&self) -> &Url {
		&self.uri
	}

	pub fn base(&self) -> &Url {
		&self.base
	}

	/// The page URI relative to the base, without a leading slash.
	pub fn relative(&self) -> &str {
		&self.uri.as_str()[self.base.as_str().len()..]
	}
}
