//! Snapshot records describing the desired content of a pad.

use crate::ProtocolError;
use pad_model::{class_names, SnapId, SnapObject};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::Display;

/// Draw option that tells the client to skip an entry.
pub const IGNORE_DRAWING: &str = "__ignore_drawing__";

/// Kind tag of a snapshot entry, numbered as on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SnapshotKind {
    #[default]
    None,
    Object,
    Svg,
    SubPad,
    Colors,
    Style,
    Font,
}

impl TryFrom<u8> for SnapshotKind {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::None,
            1 => Self::Object,
            2 => Self::Svg,
            3 => Self::SubPad,
            4 => Self::Colors,
            5 => Self::Style,
            6 => Self::Font,
            other => return Err(ProtocolError::UnknownKind(other)),
        })
    }
}

impl From<SnapshotKind> for u8 {
    fn from(kind: SnapshotKind) -> Self {
        match kind {
            SnapshotKind::None => 0,
            SnapshotKind::Object => 1,
            SnapshotKind::Svg => 2,
            SnapshotKind::SubPad => 3,
            SnapshotKind::Colors => 4,
            SnapshotKind::Style => 5,
            SnapshotKind::Font => 6,
        }
    }
}

impl SnapshotKind {
    /// Kinds that only change shared tables and never own a painter.
    pub fn is_special(self) -> bool {
        matches!(self, Self::Colors | Self::Style | Self::Font)
    }

    /// Kinds that are matched against existing painters.
    pub fn is_graphical(self) -> bool {
        matches!(self, Self::Object | Self::Svg | Self::SubPad)
    }
}

/// One record of a pad snapshot.
///
/// For [`SnapshotKind::SubPad`] entries (and the top-level canvas entry)
/// the payload holds the pad attributes and `primitives` holds the
/// nested records.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    #[serde(rename = "fKind", default)]
    pub kind: SnapshotKind,
    #[serde(rename = "fObjectID", default, deserialize_with = "object_id")]
    pub object_id: SnapId,
    #[serde(rename = "fSnapshot", default)]
    pub payload: SnapObject,
    #[serde(rename = "fOption", default)]
    pub option: String,
    #[serde(rename = "fReadOnly", default, skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
    #[serde(rename = "fActive", default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(rename = "fHasExecs", default, skip_serializing_if = "Option::is_none")]
    pub has_execs: Option<bool>,
    #[serde(rename = "fPrimitives", default, skip_serializing_if = "Option::is_none")]
    pub primitives: Option<Vec<SnapshotEntry>>,
    #[serde(rename = "fWithoutPrimitives", default, skip_serializing_if = "is_false")]
    pub without_primitives: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Object ids arrive either as strings or as plain numbers.
fn object_id<'de, D>(deserializer: D) -> Result<SnapId, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(id) => Ok(SnapId::from(id)),
        Value::Number(id) => Ok(SnapId::from(id.to_string())),
        Value::Null => Ok(SnapId::default()),
        other => Err(serde::de::Error::custom(format!(
            "object id must be string or number, got {}",
            other
        ))),
    }
}

impl SnapshotEntry {
    pub fn new(kind: SnapshotKind, object_id: impl Into<SnapId>, payload: SnapObject) -> Self {
        Self {
            kind,
            object_id: object_id.into(),
            payload,
            ..Default::default()
        }
    }

    pub fn object(object_id: impl Into<SnapId>, payload: SnapObject, option: &str) -> Self {
        Self {
            option: option.to_string(),
            ..Self::new(SnapshotKind::Object, object_id, payload)
        }
    }

    pub fn svg(object_id: impl Into<SnapId>, payload: SnapObject) -> Self {
        Self::new(SnapshotKind::Svg, object_id, payload)
    }

    pub fn sub_pad(
        object_id: impl Into<SnapId>,
        pad: SnapObject,
        primitives: Vec<SnapshotEntry>,
    ) -> Self {
        Self {
            primitives: Some(primitives),
            ..Self::new(SnapshotKind::SubPad, object_id, pad)
        }
    }

    pub fn style(style: SnapObject) -> Self {
        Self::new(SnapshotKind::Style, "", style)
    }

    /// Color table entry, `oper` is `"idx:r,g,b;..."` and `buf` the
    /// optional palette as color indexes.
    pub fn colors(oper: &str, buf: Option<Vec<f64>>) -> Self {
        let mut payload = SnapObject::new(class_names::WEB_SNAPSHOT, "")
            .with_field("fOper", Value::from(oper));
        if let Some(buf) = buf {
            payload = payload.with_field("fBuf", Value::from(buf));
        }
        Self::new(SnapshotKind::Colors, "", payload)
    }

    /// Font registration, `oper` is `"id:name:format:data"`.
    pub fn font(oper: &str) -> Self {
        let payload = SnapObject::new(class_names::WEB_SNAPSHOT, "")
            .with_field("fOper", Value::from(oper));
        Self::new(SnapshotKind::Font, "", payload)
    }

    pub fn with_option(mut self, option: &str) -> Self {
        self.option = option.to_string();
        self
    }

    pub fn with_flags(mut self, active: bool, read_only: bool, has_execs: bool) -> Self {
        self.active = Some(active);
        self.read_only = Some(read_only);
        self.has_execs = Some(has_execs);
        self
    }

    pub fn is_ignored(&self) -> bool {
        self.option == IGNORE_DRAWING
    }

    pub fn primitives(&self) -> &[SnapshotEntry] {
        self.primitives.as_deref().unwrap_or(&[])
    }

    pub fn from_json(json: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode the color table carried by a [`SnapshotKind::Colors`] entry.
    pub fn color_table(&self) -> Result<ColorTable, ProtocolError> {
        let oper = self.payload.str_field("fOper").unwrap_or("");
        let colors = decode_web_colors(oper)?;
        let palette = self
            .payload
            .field("fBuf")
            .and_then(Value::as_array)
            .map(|buf| {
                buf.iter()
                    .filter_map(Value::as_f64)
                    .map(|v| v.round() as u32)
                    .collect()
            });
        Ok(ColorTable { colors, palette })
    }

    /// Decode the font descriptor carried by a [`SnapshotKind::Font`] entry.
    pub fn font_spec(&self) -> Result<FontSpec, ProtocolError> {
        FontSpec::parse(self.payload.str_field("fOper").unwrap_or(""))
    }
}

/// One decoded color definition.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorEntry {
    pub index: u32,
    pub rgb: [u8; 3],
    pub alpha: Option<f32>,
}

/// Colors and optional palette indexes from a color-table snapshot.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ColorTable {
    pub colors: Vec<ColorEntry>,
    pub palette: Option<Vec<u32>>,
}

/// Decode `"idx:r,g,b[,a];idx:r,g,b;..."`. Empty items are skipped.
pub fn decode_web_colors(oper: &str) -> Result<Vec<ColorEntry>, ProtocolError> {
    let malformed = |item: &str| ProtocolError::MalformedColors(item.to_string());
    let mut colors = Vec::new();
    for item in oper.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        let (index, rgb) = item.split_once(':').ok_or_else(|| malformed(item))?;
        let index = index.trim().parse::<u32>().map_err(|_| malformed(item))?;
        let parts: Vec<&str> = rgb.split(',').map(str::trim).collect();
        if parts.len() != 3 && parts.len() != 4 {
            return Err(malformed(item));
        }
        let mut channels = [0u8; 3];
        for (channel, part) in channels.iter_mut().zip(&parts) {
            *channel = part.parse::<u8>().map_err(|_| malformed(item))?;
        }
        let alpha = match parts.get(3) {
            Some(a) => Some(a.parse::<f32>().map_err(|_| malformed(item))?),
            None => None,
        };
        colors.push(ColorEntry {
            index,
            rgb: channels,
            alpha,
        });
    }
    Ok(colors)
}

/// Custom font registration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FontSpec {
    pub id: i32,
    pub name: String,
    pub format: String,
    pub data: String,
}

impl FontSpec {
    pub fn parse(oper: &str) -> Result<Self, ProtocolError> {
        let mut parts = oper.splitn(4, ':');
        let id = parts
            .next()
            .and_then(|id| id.trim().parse::<i32>().ok())
            .ok_or_else(|| ProtocolError::MalformedFont(oper.to_string()))?;
        let name = parts.next().unwrap_or("").to_string();
        if name.is_empty() {
            return Err(ProtocolError::MalformedFont(oper.to_string()));
        }
        Ok(Self {
            id,
            name,
            format: parts.next().unwrap_or("").to_string(),
            data: parts.next().unwrap_or("").to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_serializes_as_number() {
        let entry = SnapshotEntry::object("12", SnapObject::new("TH1F", "h"), "hist");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["fKind"], json!(1));
        assert_eq!(json["fObjectID"], json!("12"));
        assert_eq!(json["fOption"], json!("hist"));
        assert!(json.get("fPrimitives").is_none());
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = SnapshotEntry::from_json(r#"{"fKind": 9}"#).unwrap_err();
        assert!(err.to_string().contains("9"));
    }

    #[test]
    fn canvas_snapshot_parses_nested_primitives() {
        let entry: SnapshotEntry = serde_json::from_value(json!({
            "fKind": 3,
            "fObjectID": 5,
            "fSnapshot": { "_typename": "TCanvas", "fName": "c1", "fCw": 800, "fCh": 600 },
            "fActive": true,
            "fPrimitives": [
                { "fKind": 5, "fSnapshot": { "_typename": "TStyle", "fOptStat": 0 } },
                { "fKind": 1, "fObjectID": "7", "fSnapshot": { "_typename": "TH1F", "fName": "hpx" }, "fOption": "" },
            ]
        }))
        .unwrap();

        assert_eq!(entry.kind, SnapshotKind::SubPad);
        assert_eq!(entry.object_id.as_str(), "5");
        assert_eq!(entry.active, Some(true));
        assert_eq!(entry.primitives().len(), 2);
        assert_eq!(entry.primitives()[0].kind, SnapshotKind::Style);
        assert!(entry.primitives()[0].kind.is_special());
        assert!(entry.primitives()[1].kind.is_graphical());
    }

    #[test]
    fn color_table_decodes_palette() {
        let entry = SnapshotEntry::colors("0:255,255,255;1:0,0,0;2:255,0,0,0.5", Some(vec![2.0, 1.2]));
        let table = entry.color_table().unwrap();

        assert_eq!(table.colors.len(), 3);
        assert_eq!(table.colors[2].rgb, [255, 0, 0]);
        assert_eq!(table.colors[2].alpha, Some(0.5));
        assert_eq!(table.palette, Some(vec![2, 1]));
    }

    #[test]
    fn malformed_colors_are_reported() {
        assert!(matches!(
            decode_web_colors("1:0,0"),
            Err(ProtocolError::MalformedColors(_))
        ));
        assert!(decode_web_colors("").unwrap().is_empty());
    }

    #[test]
    fn font_descriptor_splits_on_first_three_colons() {
        let spec = FontSpec::parse("17:MyFont:woff2:data:with:colons").unwrap();
        assert_eq!(spec.id, 17);
        assert_eq!(spec.name, "MyFont");
        assert_eq!(spec.format, "woff2");
        assert_eq!(spec.data, "data:with:colons");

        assert!(FontSpec::parse("x:MyFont").is_err());
    }
}
