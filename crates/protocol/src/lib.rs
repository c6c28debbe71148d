//! Wire types exchanged between a pad tree and the remote renderer.
//!
//! Inbound traffic is a list of [`SnapshotEntry`] records describing what
//! a pad should contain. Outbound traffic is a small set of text messages
//! (see [`Outbound`]) and the [`WebPadOptions`] records used to persist
//! the visual state of pads on the server.

mod error;
mod outbound;
mod snapshot;
mod web_options;

pub use error::ProtocolError;
pub use outbound::*;
pub use snapshot::*;
pub use web_options::*;
