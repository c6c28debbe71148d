//! Draw-option string decoding.

use crate::attributes::{PadAttributes, K_IS_GRAYSCALE};
use crate::object::{class_names, SnapObject};
use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum OptionsError {
    InvalidDivision(String),
    ZeroDivision,
}

impl fmt::Display for OptionsError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OptionsError::InvalidDivision(arg) => write!(f, "Invalid pad division: {}", arg),
            OptionsError::ZeroDivision => write!(f, "Pad division needs at least one column"),
        }
    }
}

impl std::error::Error for OptionsError {}

/// Upper-cased option string that is consumed as flags are checked.
#[derive(Debug, Clone, Default)]
pub struct DrawOptions {
    opt: String,
    part: String,
}

impl DrawOptions {
    pub fn new(opt: &str) -> Self {
        Self {
            opt: opt.trim().to_uppercase(),
            part: String::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.opt.is_empty()
    }

    /// Remaining unconsumed text.
    pub fn remain(&self) -> &str {
        &self.opt
    }

    /// Remove the first occurrence of `name` and report whether it was there.
    pub fn check(&mut self, name: &str) -> bool {
        self.check_inner(name, false)
    }

    /// Like [`DrawOptions::check`] but also consumes the text following the
    /// flag up to the next separator, available via [`DrawOptions::part`].
    pub fn check_part(&mut self, name: &str) -> bool {
        self.check_inner(name, true)
    }

    fn check_inner(&mut self, name: &str, postpart: bool) -> bool {
        let Some(pos) = self.opt.find(name) else {
            return false;
        };
        let mut end = pos + name.len();
        self.part.clear();
        if postpart {
            let rest = &self.opt[end..];
            let len = rest
                .find(|c: char| c == ' ' || c == ',' || c == ';')
                .unwrap_or(rest.len());
            self.part = rest[..len].to_string();
            end += len;
        }
        self.opt.replace_range(pos..end, "");
        true
    }

    pub fn part(&self) -> &str {
        &self.part
    }

    pub fn part_as_int(&self, offset: i32, default: i32) -> i32 {
        self.part
            .parse::<i32>()
            .map(|value| value + offset)
            .unwrap_or(default)
    }
}

/// Single attribute change applied to a pad and its nested pads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PadTweak {
    NoMargins,
    White,
    LogX(i32),
    LogY(i32),
    LogZ(i32),
    LogV,
    LogAll(i32),
    GridX,
    GridY,
    TickX,
    TickY,
}

impl PadTweak {
    pub fn apply(&self, pad: &mut PadAttributes) {
        match *self {
            PadTweak::NoMargins => {
                pad.left_margin = 0.0;
                pad.right_margin = 0.0;
                pad.bottom_margin = 0.0;
                pad.top_margin = 0.0;
            }
            PadTweak::White => pad.fill_color = 0,
            PadTweak::LogX(kind) => {
                pad.logx = kind;
                pad.uxmin = 0.0;
                pad.uxmax = 1.0;
                pad.x1 = 0.0;
                pad.x2 = 1.0;
            }
            PadTweak::LogY(kind) => {
                pad.logy = kind;
                pad.uymin = 0.0;
                pad.uymax = 1.0;
                pad.y1 = 0.0;
                pad.y2 = 1.0;
            }
            PadTweak::LogZ(kind) => pad.logz = kind,
            PadTweak::LogV => pad.logv = Some(1),
            PadTweak::LogAll(kind) => {
                pad.logx = kind;
                pad.logy = kind;
                pad.logz = kind;
            }
            PadTweak::GridX => pad.gridx = 1,
            PadTweak::GridY => pad.gridy = 1,
            PadTweak::TickX => pad.tickx = 1,
            PadTweak::TickY => pad.ticky = 1,
        }
    }

    /// Same change on a raw pad payload nested in a primitive list.
    fn apply_fields(&self, fields: &mut Map<String, Value>) {
        let mut set = |key: &str, value: Value| {
            fields.insert(key.to_string(), value);
        };
        match *self {
            PadTweak::NoMargins => {
                for key in ["fLeftMargin", "fRightMargin", "fBottomMargin", "fTopMargin"] {
                    set(key, Value::from(0.0));
                }
            }
            PadTweak::White => set("fFillColor", Value::from(0)),
            PadTweak::LogX(kind) => {
                set("fLogx", Value::from(kind));
                set("fUxmin", Value::from(0.0));
                set("fUxmax", Value::from(1.0));
                set("fX1", Value::from(0.0));
                set("fX2", Value::from(1.0));
            }
            PadTweak::LogY(kind) => {
                set("fLogy", Value::from(kind));
                set("fUymin", Value::from(0.0));
                set("fUymax", Value::from(1.0));
                set("fY1", Value::from(0.0));
                set("fY2", Value::from(1.0));
            }
            PadTweak::LogZ(kind) => set("fLogz", Value::from(kind)),
            PadTweak::LogV => set("fLogv", Value::from(1)),
            PadTweak::LogAll(kind) => {
                set("fLogx", Value::from(kind));
                set("fLogy", Value::from(kind));
                set("fLogz", Value::from(kind));
            }
            PadTweak::GridX => set("fGridx", Value::from(1)),
            PadTweak::GridY => set("fGridy", Value::from(1)),
            PadTweak::TickX => set("fTickx", Value::from(1)),
            PadTweak::TickY => set("fTicky", Value::from(1)),
        }
    }

    fn apply_nested(&self, object: &mut SnapObject) {
        if !object.is(class_names::PAD) {
            return;
        }
        self.apply_fields(&mut object.fields);
        if let Some(Value::Object(list)) = object.fields.get_mut("fPrimitives") {
            if let Some(Value::Array(items)) = list.get_mut("arr") {
                for item in items.iter_mut() {
                    if let Ok(mut nested) = SnapObject::from_value(item.clone()) {
                        self.apply_nested(&mut nested);
                        *item = nested.to_value();
                    }
                }
            }
        }
    }
}

/// Pad-level options decoded from a draw-option string.
#[derive(Debug, Clone, PartialEq)]
pub struct PadOptions {
    pub global_colors: bool,
    pub local_colors: bool,
    pub ignore_palette: bool,
    pub create_palette: i32,
    pub rotate_frame: bool,
    pub fix_frame: bool,
    pub fix_size: bool,
    pub no_zoom_x: bool,
    pub no_zoom_y: bool,
    pub grayscale: bool,
    pub tweaks: Vec<PadTweak>,
    /// Original option string, kept for web options.
    pub source: String,
}

impl Default for PadOptions {
    fn default() -> Self {
        Self {
            global_colors: true,
            local_colors: false,
            ignore_palette: false,
            create_palette: 0,
            rotate_frame: false,
            fix_frame: false,
            fix_size: false,
            no_zoom_x: false,
            no_zoom_y: false,
            grayscale: false,
            tweaks: Vec::new(),
            source: String::new(),
        }
    }
}

impl PadOptions {
    /// Flags are checked in a fixed order; longer names come before their
    /// prefixes so `LOGX` is not eaten by `LOG`.
    pub fn decode(opt: &str) -> Self {
        let mut d = DrawOptions::new(opt);
        let mut res = PadOptions {
            source: opt.to_string(),
            ..Default::default()
        };

        if d.check("NOCOLORS") || d.check("NOCOL") {
            res.global_colors = false;
            res.local_colors = false;
        }
        if d.check("LCOLORS") || d.check("LCOL") {
            res.global_colors = false;
            res.local_colors = true;
        }
        if d.check("NOPALETTE") || d.check("NOPAL") {
            res.ignore_palette = true;
        }
        res.rotate_frame = d.check("ROTATE");
        res.fix_frame = d.check("FIXFRAME");
        res.fix_size = d.check("FIXSIZE");
        if d.check_part("CP") {
            res.create_palette = d.part_as_int(0, 0);
        }
        res.no_zoom_x = d.check("NOZOOMX");
        res.no_zoom_y = d.check("NOZOOMY");
        res.grayscale = d.check("GRAYSCALE");

        let table: [(&str, PadTweak); 20] = [
            ("NOMARGINS", PadTweak::NoMargins),
            ("WHITE", PadTweak::White),
            ("LOG2X", PadTweak::LogX(2)),
            ("LOGX", PadTweak::LogX(1)),
            ("LOG2Y", PadTweak::LogY(2)),
            ("LOGY", PadTweak::LogY(1)),
            ("LOG2Z", PadTweak::LogZ(2)),
            ("LOGZ", PadTweak::LogZ(1)),
            ("LOGV", PadTweak::LogV),
            ("LOG2", PadTweak::LogAll(2)),
            ("LOG", PadTweak::LogAll(1)),
            ("LNX", PadTweak::LogX(3)),
            ("LNY", PadTweak::LogY(3)),
            ("LN", PadTweak::LogAll(3)),
            ("GRIDX", PadTweak::GridX),
            ("GRIDY", PadTweak::GridY),
            ("GRID", PadTweak::GridX),
            ("TICKX", PadTweak::TickX),
            ("TICKY", PadTweak::TickY),
            ("TICK", PadTweak::TickX),
        ];
        for (name, tweak) in table {
            if d.check(name) {
                res.tweaks.push(tweak);
                // GRID and TICK set both axes
                match name {
                    "GRID" => res.tweaks.push(PadTweak::GridY),
                    "TICK" => res.tweaks.push(PadTweak::TickY),
                    _ => {}
                }
            }
        }

        res
    }

    /// Apply attribute changes to the pad and every nested pad in its
    /// primitive list. `is_canvas` gates the canvas-only flags.
    pub fn apply(&self, pad: &mut PadAttributes, is_canvas: bool) {
        if self.grayscale {
            pad.set_bit(K_IS_GRAYSCALE, true);
        }
        for tweak in &self.tweaks {
            tweak.apply(pad);
            if let Some(primitives) = pad.primitives.as_mut() {
                for object in primitives.arr.iter_mut() {
                    tweak.apply_nested(object);
                }
            }
        }
        if !is_canvas && self.fix_size {
            log::debug!("FIXSIZE ignored for sub-pad {}", pad.name);
        }
    }
}

/// Parse a division argument such as `"2"` or `"2x3"`.
pub fn parse_division(arg: &str) -> Result<(u32, u32), OptionsError> {
    let invalid = || OptionsError::InvalidDivision(arg.to_string());
    let mut parts = arg.trim().split(|c| c == 'x' || c == 'X');
    let nx = parts
        .next()
        .ok_or_else(invalid)?
        .trim()
        .parse::<u32>()
        .map_err(|_| invalid())?;
    let ny = match parts.next() {
        Some(part) => part.trim().parse::<u32>().map_err(|_| invalid())?,
        None => 0,
    };
    if parts.next().is_some() {
        return Err(invalid());
    }
    if nx == 0 {
        return Err(OptionsError::ZeroDivision);
    }
    Ok((nx, ny))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn check_consumes_flag_and_part() {
        let mut d = DrawOptions::new("logx;cp50,grid");
        assert!(d.check("LOGX"));
        assert!(!d.check("LOGX"));
        assert!(d.check_part("CP"));
        assert_eq!(d.part(), "50");
        assert_eq!(d.part_as_int(1, 0), 51);
        assert_eq!(d.remain(), ";,GRID");
    }

    #[test]
    fn decode_color_flags() {
        let opts = PadOptions::decode("lcol nopal");
        assert!(!opts.global_colors);
        assert!(opts.local_colors);
        assert!(opts.ignore_palette);

        let opts = PadOptions::decode("");
        assert!(opts.global_colors);
        assert_eq!(opts.create_palette, 0);
    }

    #[test]
    fn specific_log_flags_win_over_generic() {
        let opts = PadOptions::decode("logx");
        assert_eq!(opts.tweaks, vec![PadTweak::LogX(1)]);

        let opts = PadOptions::decode("log");
        assert_eq!(opts.tweaks, vec![PadTweak::LogAll(1)]);
    }

    #[test]
    fn apply_reaches_nested_pads() {
        let mut canvas = PadAttributes::canvas("c1", 800, 600);
        let mut primitives = crate::PrimitiveList::default();
        primitives.push(
            SnapObject::new("TPad", "c1_1").with_field("fGridx", json!(0)),
            "",
        );
        primitives.push(SnapObject::new("TH1F", "h"), "hist");
        canvas.primitives = Some(primitives);

        PadOptions::decode("grid;nomargins").apply(&mut canvas, true);

        assert_eq!((canvas.gridx, canvas.gridy), (1, 1));
        assert_eq!(canvas.left_margin, 0.0);
        let list = canvas.primitives.as_ref().unwrap();
        assert_eq!(list.arr[0].field("fGridy"), Some(&json!(1)));
        assert_eq!(list.arr[0].field("fTopMargin"), Some(&json!(0.0)));
        assert!(list.arr[1].field("fGridy").is_none());
    }

    #[test]
    fn grayscale_sets_bit() {
        let mut canvas = PadAttributes::canvas("c1", 800, 600);
        PadOptions::decode("grayscale").apply(&mut canvas, true);
        assert!(canvas.is_grayscale());
    }

    #[test]
    fn division_parsing() {
        assert_eq!(parse_division("3"), Ok((3, 0)));
        assert_eq!(parse_division("2x4"), Ok((2, 4)));
        assert_eq!(parse_division("0x2"), Err(OptionsError::ZeroDivision));
        assert!(matches!(
            parse_division("ax2"),
            Err(OptionsError::InvalidDivision(_))
        ));
    }
}
