//! Coordinate types for pad geometry.
//!
//! Two spaces are kept apart at the type level:
//!
//! - **NDC**: fractions in `[0, 1]` relative to the parent pad, with the
//!   y axis pointing up (ROOT convention).
//! - **Pixels**: absolute position inside the canvas surface, with the y
//!   axis pointing down (surface convention).

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Normalized rectangle of a pad inside its parent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NdcRect {
    pub xlow: f64,
    pub ylow: f64,
    pub width: f64,
    pub height: f64,
}

impl Default for NdcRect {
    fn default() -> Self {
        Self::FULL
    }
}

impl NdcRect {
    /// The whole parent area.
    pub const FULL: NdcRect = NdcRect {
        xlow: 0.0,
        ylow: 0.0,
        width: 1.0,
        height: 1.0,
    };

    pub fn new(xlow: f64, ylow: f64, width: f64, height: f64) -> Self {
        Self {
            xlow,
            ylow,
            width,
            height,
        }
    }

    /// Map into the pixel rect of the parent.
    ///
    /// Width and height are rounded first; the y origin is measured from
    /// the top so the bottom edge of the pad lands on `ylow`.
    pub fn to_pixels(&self, parent: PixelRect) -> PixelRect {
        let w = (self.width * parent.size.x as f64).round();
        let h = (self.height * parent.size.y as f64).round();
        let x = (self.xlow * parent.size.x as f64).round();
        let y = (parent.size.y as f64 * (1.0 - self.ylow)).round() - h;

        PixelRect {
            origin: parent.origin + Vec2::new(x as f32, y as f32),
            size: Vec2::new(w as f32, h as f32),
        }
    }

    /// Inverse of [`NdcRect::to_pixels`], used when reporting pad
    /// positions back to the server.
    pub fn from_pixels(rect: PixelRect, parent: PixelRect) -> Self {
        let pw = if parent.size.x > 0.0 { parent.size.x as f64 } else { 1.0 };
        let ph = if parent.size.y > 0.0 { parent.size.y as f64 } else { 1.0 };
        let local = rect.origin - parent.origin;
        let xlow = local.x as f64 / pw;
        let ylow = 1.0 - (local.y as f64 + rect.size.y as f64) / ph;
        Self {
            xlow,
            ylow,
            width: rect.size.x as f64 / pw,
            height: rect.size.y as f64 / ph,
        }
    }

    pub fn xup(&self) -> f64 {
        self.xlow + self.width
    }

    pub fn yup(&self) -> f64 {
        self.ylow + self.height
    }
}

/// Pixel rectangle inside the canvas surface.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PixelRect {
    pub origin: Vec2,
    pub size: Vec2,
}

impl PixelRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            origin: Vec2::new(x, y),
            size: Vec2::new(width, height),
        }
    }

    /// Rect at the surface origin.
    pub fn from_size(size: Vec2) -> Self {
        Self {
            origin: Vec2::ZERO,
            size,
        }
    }

    pub fn x(&self) -> f32 {
        self.origin.x
    }

    pub fn y(&self) -> f32 {
        self.origin.y
    }

    pub fn width(&self) -> f32 {
        self.size.x
    }

    pub fn height(&self) -> f32 {
        self.size.y
    }

    pub fn is_empty(&self) -> bool {
        self.size.x <= 0.0 || self.size.y <= 0.0
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.origin.x
            && point.y >= self.origin.y
            && point.x <= self.origin.x + self.size.x
            && point.y <= self.origin.y + self.size.y
    }
}

/// Pad margins as fractions of the pad size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub left: f64,
    pub right: f64,
    pub bottom: f64,
    pub top: f64,
}

impl Default for Margins {
    fn default() -> Self {
        Self {
            left: 0.1,
            right: 0.1,
            bottom: 0.1,
            top: 0.1,
        }
    }
}

impl Margins {
    pub const ZERO: Margins = Margins {
        left: 0.0,
        right: 0.0,
        bottom: 0.0,
        top: 0.0,
    };

    /// Pixel area left for the frame once margins are applied.
    pub fn inner_size(&self, size: Vec2) -> Vec2 {
        Vec2::new(
            size.x * (1.0 - self.left - self.right) as f32,
            size.y * (1.0 - self.bottom - self.top) as f32,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quarter_pad_in_canvas_flips_y() {
        let canvas = PixelRect::from_size(Vec2::new(800.0, 600.0));
        let rect = NdcRect::new(0.0, 0.0, 0.5, 0.5).to_pixels(canvas);

        assert_eq!(rect.size, Vec2::new(400.0, 300.0));
        // Bottom-left quarter: top edge sits half way down the canvas
        assert_eq!(rect.origin, Vec2::new(0.0, 300.0));
    }

    #[test]
    fn nested_pad_is_offset_by_parent_origin() {
        let parent = PixelRect::new(400.0, 0.0, 400.0, 300.0);
        let rect = NdcRect::new(0.5, 0.5, 0.5, 0.5).to_pixels(parent);

        assert_eq!(rect, PixelRect::new(600.0, 0.0, 200.0, 150.0));
    }

    #[test]
    fn from_pixels_inverts_to_pixels() {
        let canvas = PixelRect::from_size(Vec2::new(1000.0, 500.0));
        let ndc = NdcRect::new(0.1, 0.2, 0.4, 0.6);
        let back = NdcRect::from_pixels(ndc.to_pixels(canvas), canvas);

        assert!((back.xlow - 0.1).abs() < 1e-6);
        assert!((back.ylow - 0.2).abs() < 1e-6);
        assert!((back.width - 0.4).abs() < 1e-6);
        assert!((back.height - 0.6).abs() < 1e-6);
    }

    #[test]
    fn margins_shrink_inner_area() {
        let inner = Margins::default().inner_size(Vec2::new(200.0, 100.0));
        assert_eq!(inner, Vec2::new(160.0, 80.0));
    }
}
