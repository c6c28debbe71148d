//! Pad painter: the canvas and sub-pad drawing tree.
//!
//! A [`PadPainter`] owns the painters of its primitives in a [`Registry`],
//! serializes structural work through its [`DrawQueue`] and keeps itself in
//! sync with server snapshots. Everything runs on one thread; async work is
//! driven by the `smol::LocalExecutor` held in the shared [`PaintContext`].

pub mod bridge;
pub mod colors;
pub mod context;
pub mod fonts;
pub mod geometry;
pub mod pad;
pub mod painter;
pub mod queue;
pub mod registry;
pub mod style;
pub mod sync;

#[cfg(test)]
pub(crate) mod test_support;

use pad_model::OptionsError;
use protocol::ProtocolError;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

pub use bridge::{
    ButtonAction, ButtonOutcome, MenuCommand, MenuEntry, OptionsScope, PadEdit, PadEvent,
    PadEventReason,
};
pub use colors::{ColorTable, PadColors};
pub use context::{PadConfig, PaintContext};
pub use fonts::FontRegistry;
pub use geometry::SurfaceMode;
pub use pad::{Lifecycle, PadPainter, SpecialObject};
pub use painter::{
    AttributesUsed, CanvasHost, DrawDispatcher, Drawn, FrameRanges, ObjectPainter, Transport,
};
pub use queue::{DrawKind, DrawQueue, DrawTurn};
pub use registry::{EntryKey, PainterHandle, Registry, RegistryEntry, RemoveTarget, Removal};
pub use style::StyleStore;

/// Boxed future that is not `Send`, used for recursion through the pad tree.
pub type LocalBoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

#[derive(Debug)]
pub enum PadError {
    /// Operation only valid on the root pad.
    NotCanvas(String),
    /// Pad was already cleaned up.
    Disposed(String),
    /// Pad payload could not be decoded.
    BadPayload(String),
    Options(OptionsError),
    Protocol(ProtocolError),
}

impl fmt::Display for PadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PadError::NotCanvas(name) => write!(f, "Pad {} is not a canvas", name),
            PadError::Disposed(name) => write!(f, "Pad {} was already disposed", name),
            PadError::BadPayload(msg) => write!(f, "Invalid pad payload: {}", msg),
            PadError::Options(err) => write!(f, "Draw option error: {}", err),
            PadError::Protocol(err) => write!(f, "Protocol error: {}", err),
        }
    }
}

impl std::error::Error for PadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PadError::Options(err) => Some(err),
            PadError::Protocol(err) => Some(err),
            _ => None,
        }
    }
}

impl From<OptionsError> for PadError {
    fn from(err: OptionsError) -> Self {
        PadError::Options(err)
    }
}

impl From<ProtocolError> for PadError {
    fn from(err: ProtocolError) -> Self {
        PadError::Protocol(err)
    }
}

impl From<serde_json::Error> for PadError {
    fn from(err: serde_json::Error) -> Self {
        PadError::BadPayload(err.to_string())
    }
}
