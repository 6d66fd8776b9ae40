//! Message-level contract between a circuit host and its remote client.
//!
//! The transport itself lives elsewhere; this crate only fixes what crosses it:
//! * [`HubRequest`]: calls the client makes into the host
//! * [`ClientMessage`]: calls the host makes into the client
//! * [`ClientProxy`]: the outbound seam a transport implements
//! * [`CounterIdGen`]: sequential ids for correlating calls

#![warn(missing_docs)]

pub mod error;
pub mod protocol;
pub mod proxy;

pub use error::{Result, TransportError};
pub use protocol::{ClientMessage, CounterIdGen, HubRequest};
pub use proxy::{ChannelProxy, ClientProxy};
