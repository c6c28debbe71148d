//! Visual state of pads reported back to the server.

use crate::ProtocolError;
use pad_model::{PadAttributes, SnapId};
use serde::{Deserialize, Serialize};

fn web_pad_typename() -> String {
    "TWebPadOptions".to_string()
}

fn web_object_typename() -> String {
    "TWebObjectOptions".to_string()
}

/// Draw option and custom state of one primitive.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WebObjectOptions {
    #[serde(rename = "_typename", default = "web_object_typename")]
    pub typename: String,
    pub snapid: String,
    pub opt: String,
    #[serde(default)]
    pub fcust: String,
    #[serde(default)]
    pub fopt: Vec<f64>,
}

impl WebObjectOptions {
    pub fn new(snap_id: &SnapId, opt: impl Into<String>) -> Self {
        Self {
            typename: web_object_typename(),
            snapid: snap_id.to_string(),
            opt: opt.into(),
            fcust: String::new(),
            fopt: Vec::new(),
        }
    }
}

/// Axis ranges of the pad's frame, in user and pad coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PadRanges {
    pub ranges: bool,
    pub ux1: f64,
    pub ux2: f64,
    pub uy1: f64,
    pub uy2: f64,
    pub uz1: f64,
    pub uz2: f64,
    pub px1: f64,
    pub px2: f64,
    pub py1: f64,
    pub py2: f64,
    pub zx1: f64,
    pub zx2: f64,
    pub zy1: f64,
    pub zy2: f64,
    pub zz1: f64,
    pub zz2: f64,
}

/// `TWebPadOptions` record for a single pad.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WebPadOptions {
    #[serde(rename = "_typename", default = "web_pad_typename")]
    pub typename: String,
    pub snapid: String,
    pub active: bool,
    pub cw: u32,
    pub ch: u32,
    /// Window geometry, only filled for the canvas.
    pub w: Vec<i32>,
    pub bits: u32,
    pub primitives: Vec<WebObjectOptions>,
    pub logx: i32,
    pub logy: i32,
    pub logz: i32,
    pub gridx: i32,
    pub gridy: i32,
    pub tickx: i32,
    pub ticky: i32,
    pub mleft: f64,
    pub mright: f64,
    pub mtop: f64,
    pub mbottom: f64,
    pub xlow: f64,
    pub ylow: f64,
    pub xup: f64,
    pub yup: f64,
    pub phi: f64,
    pub theta: f64,
    #[serde(flatten)]
    pub ranges: PadRanges,
}

impl WebPadOptions {
    /// Options seeded from pad attributes; position and ranges are left
    /// at their defaults for the caller to fill in.
    pub fn from_pad(snap_id: &SnapId, active: bool, pad: &PadAttributes) -> Self {
        let (phi, theta) = if pad.phi != 30.0 || pad.theta != 30.0 {
            (pad.phi, pad.theta)
        } else {
            (0.0, 0.0)
        };
        Self {
            typename: web_pad_typename(),
            snapid: snap_id.to_string(),
            active,
            cw: 0,
            ch: 0,
            w: Vec::new(),
            bits: 0,
            primitives: Vec::new(),
            logx: pad.logx,
            logy: pad.logy,
            logz: pad.logz,
            gridx: pad.gridx,
            gridy: pad.gridy,
            tickx: pad.tickx,
            ticky: pad.ticky,
            mleft: pad.left_margin,
            mright: pad.right_margin,
            mtop: pad.top_margin,
            mbottom: pad.bottom_margin,
            xlow: 0.0,
            ylow: 0.0,
            xup: 1.0,
            yup: 1.0,
            phi,
            theta,
            ranges: PadRanges::default(),
        }
    }
}

/// Serialize a list of pad options the way the server expects them.
pub fn encode_pad_options(options: &[WebPadOptions]) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(options)?)
}

pub fn decode_pad_options(json: &str) -> Result<Vec<WebPadOptions>, ProtocolError> {
    Ok(serde_json::from_str(json)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pad_options_use_flat_layout() {
        let mut pad = PadAttributes::new("c1_1");
        pad.logy = 1;
        let mut opts = WebPadOptions::from_pad(&SnapId::from("9"), true, &pad);
        opts.ranges.ux2 = 10.0;
        opts.primitives.push(WebObjectOptions::new(&SnapId::from("10"), "hist"));

        let json = serde_json::to_value(&opts).unwrap();
        assert_eq!(json["_typename"], "TWebPadOptions");
        assert_eq!(json["snapid"], "9");
        assert_eq!(json["logy"], 1);
        assert_eq!(json["ux2"], 10.0);
        assert_eq!(json["primitives"][0]["_typename"], "TWebObjectOptions");
        assert_eq!(json["primitives"][0]["opt"], "hist");
    }

    #[test]
    fn default_view_angles_are_zeroed() {
        let pad = PadAttributes::new("p");
        let opts = WebPadOptions::from_pad(&SnapId::from("1"), false, &pad);
        assert_eq!((opts.phi, opts.theta), (0.0, 0.0));

        let mut pad = PadAttributes::new("p");
        pad.phi = 45.0;
        let opts = WebPadOptions::from_pad(&SnapId::from("1"), false, &pad);
        assert_eq!((opts.phi, opts.theta), (45.0, 30.0));
    }

    #[test]
    fn options_list_decodes_back() {
        let pad = PadAttributes::canvas("c1", 800, 600);
        let list = vec![WebPadOptions::from_pad(&SnapId::from("1"), true, &pad)];
        let json = encode_pad_options(&list).unwrap();
        let back = decode_pad_options(&json).unwrap();
        assert_eq!(back, list);
    }
}
