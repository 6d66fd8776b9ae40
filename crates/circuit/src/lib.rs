//! Per-client circuits.
//!
//! A [`Circuit`] is the server side of one connected client: it owns a
//! [`SerializedContext`](wicket_worker::SerializedContext) and runs both the
//! [`RemoteRenderer`]'s flushes and inbound interop calls on it, so the two
//! never interleave.

mod circuit;
mod dispatch;
pub mod error;
mod ids;
mod js_runtime;
mod options;
mod renderer;
mod uri;

pub use circuit::Circuit;
pub use dispatch::{InteropDispatcher, MethodRegistry};
pub use error::{CircuitError, InteropError, RenderError, Result};
pub use ids::IdAllocator;
pub use js_runtime::{END_INVOKE_DOTNET, RemoteJsRuntime};
pub use options::CircuitOptions;
pub use renderer::RemoteRenderer;
pub use uri::CircuitUris;
