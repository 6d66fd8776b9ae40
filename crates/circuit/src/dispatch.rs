//! Inbound JS interop: resolving `BeginInvokeDotNetFromJS` calls to host methods.

use std::collections::HashMap;

use crate::InteropError;

/// Resolves and runs a host method invoked from client script.
///
/// Always called on the circuit's logical thread. `Ok(Some(json))` is the
/// method's JSON result, `Ok(None)` means no result.
pub trait InteropDispatcher: Send + Sync {
	fn invoke(&self, assembly_name: &str, method_identifier: &str, args_json: &str) -> Result<Option<String>, InteropError>;
}

type Method = Box<dyn Fn(&str) -> Result<Option<String>, InteropError> + Send + Sync>;

/// An [`InteropDispatcher`] over an explicit table of methods.
#[derive(Default)]
pub struct MethodRegistry {
	methods: HashMap<(String, String), Method>,
}

impl MethodRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers `method` under `assembly_name` and `method_identifier`,
	/// replacing any earlier registration.
	pub fn register(
		&mut self,
		assembly_name: impl Into<String>,
		method_identifier: impl Into<String>,
		method: impl Fn(&str) -> Result<Option<String>, InteropError> + Send + Sync + 'static,
	) -> &mut Self {
		self.methods.insert((assembly_name.into(), method_identifier.into()), Box::new(method));
		self
	}
}

impl InteropDispatcher for MethodRegistry {
	fn invoke(&self, assembly_name: &str, method_identifier: &str, args_json: &str) -> Result<Option<String>, InteropError> {
		let key = (assembly_name.to_string(), method_identifier.to_string());
		let Some(method) = self.methods.get(&key) else {
			return Err(InteropError::UnknownMethod {
				assembly: key.0,
				method: key.1,
			});
		};
		method(args_json)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn registered_methods_are_found_by_assembly_and_identifier() {
		let mut registry = MethodRegistry::new();
		registry.register("App", "Echo", |args| Ok(Some(args.to_string())));

		assert_eq!(registry.invoke("App", "Echo", "[1]"), Ok(Some("[1]".to_string())));
		assert_eq!(
			registry.invoke("Other", "Echo", "[]"),
			Err(InteropError::UnknownMethod {
				assembly: "Other".into(),
				method: "Echo".into()
			})
		);
	}
}
