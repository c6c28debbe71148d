//! Plain data types for pads and the objects drawn inside them.
//!
//! Nothing here knows about drawing or async: these are the attribute
//! records exchanged with the server, the coordinate types used by the
//! pad geometry, and the draw-option decoder.

pub mod attributes;
pub mod coords;
pub mod draw_options;
mod ids;
mod object;

pub use attributes::{PadAttributes, PrimitiveList, K_IS_GRAYSCALE};
pub use coords::{Margins, NdcRect, PixelRect};
pub use draw_options::{parse_division, DrawOptions, OptionsError, PadOptions, PadTweak};
pub use ids::{PadId, SnapId};
pub use object::{class_names, SnapObject};
