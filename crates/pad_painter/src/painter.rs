//! Collaborator traits implemented outside of the pad painter.

use crate::pad::PadPainter;
use crate::queue::DrawKind;
use crate::LocalBoxFuture;
use glam::Vec2;
use pad_model::{PixelRect, SnapObject};
use protocol::{SaveRequest, WebObjectOptions};
use std::rc::Rc;

/// Painter of a single non-pad primitive (histogram, graph, legend...).
///
/// Painters are owned by the pad registry and shared through `Rc`, so
/// mutable state lives behind interior mutability.
pub trait ObjectPainter {
    fn object(&self) -> Option<Rc<SnapObject>>;

    fn class_name(&self) -> String {
        self.object().map(|obj| obj.typename.clone()).unwrap_or_default()
    }

    fn object_name(&self) -> String {
        self.object().map(|obj| obj.name.clone()).unwrap_or_default()
    }

    fn draw_option(&self) -> String {
        String::new()
    }

    /// Take a new version of the drawn object. Returns false when nothing
    /// visible changed and the redraw can be skipped.
    fn update_object(&self, object: &SnapObject, option: &str) -> bool;

    fn redraw(self: Rc<Self>, kind: DrawKind) -> LocalBoxFuture<'static, ()>;

    fn cleanup(&self);

    fn need_redraw_by_resize(&self) -> bool {
        false
    }

    /// Whether this painter becomes the pad's main painter when added
    /// to a pad without one.
    fn claims_main(&self) -> bool {
        false
    }

    fn is_frame(&self) -> bool {
        false
    }

    fn reset_zoom(&self) {}

    /// Axis ranges, only provided by frame painters.
    fn frame_ranges(&self) -> Option<FrameRanges> {
        None
    }

    /// False for painters that draw nothing of their own (legend building
    /// skips them).
    fn draws_content(&self) -> bool {
        true
    }

    /// Label used for legends and menus.
    fn item_name(&self) -> Option<String> {
        None
    }

    fn attributes_used(&self) -> AttributesUsed {
        AttributesUsed::default()
    }

    /// Cached palette must be rebuilt, e.g. after a grayscale toggle.
    fn reset_palette(&self) {}

    /// Handle a toolbar button. `None` means the action is not handled.
    fn click_button(self: Rc<Self>, _action: &str) -> Option<LocalBoxFuture<'static, ()>> {
        None
    }

    /// Add painter-specific state to the options reported to the server.
    fn fill_web_options(&self, _options: &mut WebObjectOptions) {}
}

/// Which attribute sets a painter actually draws with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AttributesUsed {
    pub line: bool,
    pub fill: bool,
    pub marker: bool,
}

impl AttributesUsed {
    /// Legend entry option such as `"lf"`, `"l"` when nothing is used.
    pub fn legend_option(&self) -> String {
        let mut opt = String::new();
        if self.line {
            opt.push('l');
        }
        if self.fill {
            opt.push('f');
        }
        if self.marker {
            opt.push('p');
        }
        if opt.is_empty() {
            opt.push('l');
        }
        opt
    }
}

/// Axis state of a frame painter.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameRanges {
    pub ranges_set: bool,
    pub logx: i32,
    pub logy: i32,
    pub scale_xmin: f64,
    pub scale_xmax: f64,
    pub scale_ymin: f64,
    pub scale_ymax: f64,
    pub scale_zmin: Option<f64>,
    pub scale_zmax: Option<f64>,
    pub zoom_x: Option<(f64, f64)>,
    pub zoom_y: Option<(f64, f64)>,
    pub zoom_z: Option<(f64, f64)>,
    /// Frame area relative to the pad origin.
    pub frame_rect: PixelRect,
}

/// Result of drawing an object: its painter plus the secondary painters
/// derived from it, keyed by their secondary id.
pub struct Drawn {
    pub painter: Rc<dyn ObjectPainter>,
    pub secondaries: Vec<(String, Drawn)>,
}

impl Drawn {
    pub fn new(painter: Rc<dyn ObjectPainter>) -> Self {
        Self {
            painter,
            secondaries: Vec::new(),
        }
    }

    pub fn with_secondary(mut self, key: impl Into<String>, drawn: Drawn) -> Self {
        self.secondaries.push((key.into(), drawn));
        self
    }
}

/// Creates painters for objects by type.
pub trait DrawDispatcher {
    fn draw_object(
        &self,
        pad: &Rc<PadPainter>,
        object: Rc<SnapObject>,
        option: &str,
    ) -> LocalBoxFuture<'static, Option<Drawn>>;
}

/// Ordered message channel to the remote peer.
pub trait Transport {
    /// Whether `credits` messages can be accepted right now.
    fn can_send(&self, credits: usize) -> bool;

    fn send(&self, message: &str);
}

/// Element hosting the canvas surface.
pub trait CanvasHost {
    /// Current size of the hosting element, `None` if unknown.
    fn measure(&self) -> Option<Vec2>;

    /// Toggle full-viewport display of the canvas. Returns false when the
    /// host cannot enlarge.
    fn enlarge(&self, _on: bool) -> bool {
        false
    }

    /// Produce an image for a save request.
    fn export(&self, _request: &SaveRequest) {}

    /// Attach drag and resize handling to a pad.
    fn attach_interactive(&self, _pad: &str, _rect: PixelRect) {}
}
