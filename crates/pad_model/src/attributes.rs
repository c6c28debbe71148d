//! Pad attributes in ROOT's JSON layout.

use crate::coords::{Margins, NdcRect};
use crate::object::SnapObject;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status bit marking a grayscale canvas.
pub const K_IS_GRAYSCALE: u32 = 1 << 22;

/// Ordered primitives of a pad as stored in a `TList`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PrimitiveList {
    #[serde(default)]
    pub arr: Vec<SnapObject>,
    #[serde(default)]
    pub opt: Vec<String>,
}

impl PrimitiveList {
    pub fn len(&self) -> usize {
        self.arr.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arr.is_empty()
    }

    pub fn push(&mut self, object: SnapObject, option: impl Into<String>) {
        self.arr.push(object);
        self.opt.push(option.into());
    }

    pub fn clear(&mut self) {
        self.arr.clear();
        self.opt.clear();
    }

    /// Object and draw option at `index`; missing options read as empty.
    pub fn get(&self, index: usize) -> Option<(&SnapObject, &str)> {
        let object = self.arr.get(index)?;
        let option = self.opt.get(index).map(String::as_str).unwrap_or("");
        Some((object, option))
    }
}

/// Visual state of a pad or canvas.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PadAttributes {
    #[serde(rename = "_typename")]
    pub typename: String,
    #[serde(rename = "fName")]
    pub name: String,
    #[serde(rename = "fTitle")]
    pub title: String,
    #[serde(rename = "fNumber")]
    pub number: i32,
    #[serde(rename = "fBits")]
    pub bits: u32,

    #[serde(rename = "fAbsXlowNDC")]
    pub abs_xlow_ndc: f64,
    #[serde(rename = "fAbsYlowNDC")]
    pub abs_ylow_ndc: f64,
    #[serde(rename = "fAbsWNDC")]
    pub abs_w_ndc: f64,
    #[serde(rename = "fAbsHNDC")]
    pub abs_h_ndc: f64,

    #[serde(rename = "fLeftMargin")]
    pub left_margin: f64,
    #[serde(rename = "fRightMargin")]
    pub right_margin: f64,
    #[serde(rename = "fBottomMargin")]
    pub bottom_margin: f64,
    #[serde(rename = "fTopMargin")]
    pub top_margin: f64,

    #[serde(rename = "fLogx")]
    pub logx: i32,
    #[serde(rename = "fLogy")]
    pub logy: i32,
    #[serde(rename = "fLogz")]
    pub logz: i32,
    #[serde(rename = "fLogv", skip_serializing_if = "Option::is_none")]
    pub logv: Option<i32>,
    #[serde(rename = "fGridx")]
    pub gridx: i32,
    #[serde(rename = "fGridy")]
    pub gridy: i32,
    #[serde(rename = "fTickx")]
    pub tickx: i32,
    #[serde(rename = "fTicky")]
    pub ticky: i32,

    #[serde(rename = "fUxmin")]
    pub uxmin: f64,
    #[serde(rename = "fUxmax")]
    pub uxmax: f64,
    #[serde(rename = "fUymin")]
    pub uymin: f64,
    #[serde(rename = "fUymax")]
    pub uymax: f64,
    #[serde(rename = "fX1")]
    pub x1: f64,
    #[serde(rename = "fX2")]
    pub x2: f64,
    #[serde(rename = "fY1")]
    pub y1: f64,
    #[serde(rename = "fY2")]
    pub y2: f64,

    #[serde(rename = "fFillColor")]
    pub fill_color: i32,
    #[serde(rename = "fFillStyle")]
    pub fill_style: i32,
    #[serde(rename = "fLineColor")]
    pub line_color: i32,
    #[serde(rename = "fLineStyle")]
    pub line_style: i32,
    #[serde(rename = "fLineWidth")]
    pub line_width: i32,
    #[serde(rename = "fBorderMode")]
    pub border_mode: i32,
    #[serde(rename = "fBorderSize")]
    pub border_size: i32,

    #[serde(rename = "fPhi")]
    pub phi: f64,
    #[serde(rename = "fTheta")]
    pub theta: f64,
    #[serde(rename = "fEditable")]
    pub editable: bool,

    /// Canvas width in pixels, zero for sub-pads.
    #[serde(rename = "fCw")]
    pub cw: u32,
    /// Canvas height in pixels, zero for sub-pads.
    #[serde(rename = "fCh")]
    pub ch: u32,

    #[serde(rename = "fExecs", skip_serializing_if = "Option::is_none")]
    pub execs: Option<Value>,
    #[serde(rename = "fPrimitives", skip_serializing_if = "Option::is_none")]
    pub primitives: Option<PrimitiveList>,
}

impl Default for PadAttributes {
    fn default() -> Self {
        let margins = Margins::default();
        Self {
            typename: "TPad".to_string(),
            name: String::new(),
            title: String::new(),
            number: 0,
            bits: 0,
            abs_xlow_ndc: 0.0,
            abs_ylow_ndc: 0.0,
            abs_w_ndc: 1.0,
            abs_h_ndc: 1.0,
            left_margin: margins.left,
            right_margin: margins.right,
            bottom_margin: margins.bottom,
            top_margin: margins.top,
            logx: 0,
            logy: 0,
            logz: 0,
            logv: None,
            gridx: 0,
            gridy: 0,
            tickx: 0,
            ticky: 0,
            uxmin: 0.0,
            uxmax: 1.0,
            uymin: 0.0,
            uymax: 1.0,
            x1: 0.0,
            x2: 1.0,
            y1: 0.0,
            y2: 1.0,
            fill_color: 0,
            fill_style: 1001,
            line_color: 1,
            line_style: 1,
            line_width: 1,
            border_mode: 0,
            border_size: 2,
            phi: 30.0,
            theta: 30.0,
            editable: true,
            cw: 0,
            ch: 0,
            execs: None,
            primitives: None,
        }
    }
}

impl PadAttributes {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Canvas attributes with a declared pixel size.
    pub fn canvas(name: impl Into<String>, cw: u32, ch: u32) -> Self {
        Self {
            typename: "TCanvas".to_string(),
            name: name.into(),
            cw,
            ch,
            ..Default::default()
        }
    }

    /// Decode pad attributes from an object payload.
    pub fn from_object(object: &SnapObject) -> serde_json::Result<Self> {
        serde_json::from_value(object.to_value())
    }

    pub fn ndc(&self) -> NdcRect {
        NdcRect::new(
            self.abs_xlow_ndc,
            self.abs_ylow_ndc,
            self.abs_w_ndc,
            self.abs_h_ndc,
        )
    }

    pub fn set_ndc(&mut self, rect: NdcRect) {
        self.abs_xlow_ndc = rect.xlow;
        self.abs_ylow_ndc = rect.ylow;
        self.abs_w_ndc = rect.width;
        self.abs_h_ndc = rect.height;
    }

    pub fn margins(&self) -> Margins {
        Margins {
            left: self.left_margin,
            right: self.right_margin,
            bottom: self.bottom_margin,
            top: self.top_margin,
        }
    }

    pub fn set_margins(&mut self, margins: Margins) {
        self.left_margin = margins.left;
        self.right_margin = margins.right;
        self.bottom_margin = margins.bottom;
        self.top_margin = margins.top;
    }

    pub fn test_bit(&self, bit: u32) -> bool {
        self.bits & bit != 0
    }

    pub fn set_bit(&mut self, bit: u32, on: bool) {
        if on {
            self.bits |= bit;
        } else {
            self.bits &= !bit;
        }
    }

    pub fn invert_bit(&mut self, bit: u32) {
        self.bits ^= bit;
    }

    pub fn is_grayscale(&self) -> bool {
        self.test_bit(K_IS_GRAYSCALE)
    }

    /// Log scale of the y axis, `fLogv` overrides `fLogy` when present.
    pub fn effective_logy(&self) -> i32 {
        self.logv.unwrap_or(self.logy)
    }

    /// Number of exec entries attached to the pad.
    pub fn execs_count(&self) -> usize {
        self.execs
            .as_ref()
            .and_then(|execs| execs.get("arr"))
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn is_default_range(&self) -> bool {
        self.x1 == 0.0 && self.x2 == 1.0 && self.y1 == 0.0 && self.y2 == 1.0
    }

    /// Copy the visual attributes of `other` while keeping identity,
    /// canvas size and primitives.
    pub fn update_from(&mut self, other: &PadAttributes) {
        self.bits = other.bits;
        self.title = other.title.clone();

        self.gridx = other.gridx;
        self.gridy = other.gridy;
        self.tickx = other.tickx;
        self.ticky = other.ticky;
        self.logx = other.logx;
        self.logy = other.logy;
        self.logz = other.logz;
        self.logv = other.logv;

        self.uxmin = other.uxmin;
        self.uxmax = other.uxmax;
        self.uymin = other.uymin;
        self.uymax = other.uymax;
        self.x1 = other.x1;
        self.x2 = other.x2;
        self.y1 = other.y1;
        self.y2 = other.y2;

        self.set_ndc(other.ndc());
        self.set_margins(other.margins());

        self.fill_color = other.fill_color;
        self.fill_style = other.fill_style;
        self.line_color = other.line_color;
        self.line_style = other.line_style;
        self.line_width = other.line_width;
        self.border_mode = other.border_mode;
        self.border_size = other.border_size;

        self.phi = other.phi;
        self.theta = other.theta;
        self.editable = other.editable;
        self.execs = other.execs.clone();
    }

    /// Attributes of the sub-pads created by splitting this pad into an
    /// `nx` by `ny` grid, numbered from 1 row by row from the top.
    ///
    /// With `ny == 0` the grid is chosen close to square for `nx` pads.
    /// Returns an empty list when fewer than two pads would be created.
    pub fn divide(&self, nx: u32, ny: u32, margin: f64) -> Vec<PadAttributes> {
        let (nx, ny) = if ny == 0 {
            let n = nx;
            let side = (n as f64).sqrt().round().max(1.0) as u32;
            let cols = if side * side < n { side + 1 } else { side };
            (cols, side)
        } else {
            (nx, ny)
        };
        if nx * ny < 2 {
            return Vec::new();
        }

        let dx = 1.0 / nx as f64;
        let dy = 1.0 / ny as f64;
        let mut pads = Vec::with_capacity((nx * ny) as usize);
        let mut number = 0;
        for iy in 0..ny {
            let y2 = 1.0 - iy as f64 * dy - margin;
            let y1 = (y2 - dy + 2.0 * margin).max(0.0);
            for ix in 0..nx {
                let x1 = ix as f64 * dx + margin;
                let x2 = x1 + dx - 2.0 * margin;
                number += 1;

                let mut pad = PadAttributes::new(format!("{}_{}", self.name, number));
                pad.number = number as i32;
                pad.set_ndc(NdcRect::new(x1, y1, x2 - x1, y2 - y1));
                pad.fill_color = self.fill_color;
                pad.fill_style = self.fill_style;
                pad.line_color = self.line_color;
                pad.border_mode = self.border_mode;
                pad.border_size = self.border_size;
                pad.set_margins(self.margins());
                pads.push(pad);
            }
        }
        pads
    }

    /// Snapshot-shaped payload of the pad, as stored in a parent's
    /// primitive list.
    pub fn to_object(&self) -> SnapObject {
        serde_json::to_value(self)
            .ok()
            .and_then(|value| SnapObject::from_value(value).ok())
            .unwrap_or_else(|| SnapObject::new(self.typename.clone(), self.name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_root_field_names() {
        let pad: PadAttributes = serde_json::from_value(json!({
            "_typename": "TPad",
            "fName": "c1_1",
            "fAbsXlowNDC": 0.01,
            "fAbsYlowNDC": 0.51,
            "fAbsWNDC": 0.48,
            "fAbsHNDC": 0.48,
            "fLogy": 1,
            "fGridx": 1,
        }))
        .unwrap();

        assert_eq!(pad.name, "c1_1");
        assert_eq!(pad.ndc(), NdcRect::new(0.01, 0.51, 0.48, 0.48));
        assert_eq!(pad.logy, 1);
        assert_eq!(pad.gridx, 1);
        // Unspecified fields keep ROOT defaults
        assert_eq!(pad.left_margin, 0.1);
        assert!(pad.editable);
    }

    #[test]
    fn logv_overrides_logy() {
        let mut pad = PadAttributes::new("p");
        pad.logy = 1;
        assert_eq!(pad.effective_logy(), 1);
        pad.logv = Some(0);
        assert_eq!(pad.effective_logy(), 0);
    }

    #[test]
    fn grayscale_bit_toggles() {
        let mut pad = PadAttributes::canvas("c1", 800, 600);
        assert!(!pad.is_grayscale());
        pad.invert_bit(K_IS_GRAYSCALE);
        assert!(pad.is_grayscale());
        pad.set_bit(K_IS_GRAYSCALE, false);
        assert!(!pad.is_grayscale());
    }

    #[test]
    fn update_keeps_identity_and_canvas_size() {
        let mut canvas = PadAttributes::canvas("c1", 800, 600);
        let mut incoming = PadAttributes::canvas("other", 10, 10);
        incoming.gridy = 1;
        incoming.top_margin = 0.3;

        canvas.update_from(&incoming);

        assert_eq!(canvas.name, "c1");
        assert_eq!((canvas.cw, canvas.ch), (800, 600));
        assert_eq!(canvas.gridy, 1);
        assert_eq!(canvas.top_margin, 0.3);
    }

    #[test]
    fn divide_lays_out_rows_from_top() {
        let parent = PadAttributes::canvas("c1", 800, 600);
        let pads = parent.divide(2, 2, 0.01);

        assert_eq!(pads.len(), 4);
        assert_eq!(pads[0].name, "c1_1");
        assert_eq!(pads[3].number, 4);

        let first = pads[0].ndc();
        assert!((first.xlow - 0.01).abs() < 1e-9);
        assert!((first.yup() - 0.99).abs() < 1e-9);
        assert!((first.width - 0.48).abs() < 1e-9);

        let last = pads[3].ndc();
        assert!((last.xlow - 0.51).abs() < 1e-9);
        assert!((last.ylow - 0.01).abs() < 1e-9);
    }

    #[test]
    fn divide_by_count_picks_near_square_grid() {
        let parent = PadAttributes::new("p");
        assert_eq!(parent.divide(3, 0, 0.01).len(), 4);
        assert_eq!(parent.divide(5, 0, 0.01).len(), 6);
        assert!(parent.divide(1, 0, 0.01).is_empty());
        assert!(parent.divide(1, 1, 0.01).is_empty());
    }

    #[test]
    fn to_object_round_trips_identity() {
        let mut pad = PadAttributes::new("c1_2");
        pad.gridx = 1;
        let object = pad.to_object();
        assert!(object.is_pad());
        assert_eq!(object.name, "c1_2");
        assert_eq!(PadAttributes::from_object(&object).unwrap().gridx, 1);
    }

    #[test]
    fn execs_are_counted() {
        let mut pad = PadAttributes::new("p");
        assert_eq!(pad.execs_count(), 0);
        pad.execs = Some(json!({ "_typename": "TList", "arr": [{}, {}] }));
        assert_eq!(pad.execs_count(), 2);
    }
}
