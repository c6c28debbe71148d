use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// ROOT class names the pad painter treats specially.
pub mod class_names {
    pub const PAD: &str = "TPad";
    pub const CANVAS: &str = "TCanvas";
    pub const FRAME: &str = "TFrame";
    pub const STYLE: &str = "TStyle";
    pub const OBJ_ARRAY: &str = "TObjArray";
    pub const COLOR: &str = "TColor";
    pub const LEGEND: &str = "TLegend";
    pub const LEGEND_ENTRY: &str = "TLegendEntry";
    pub const HSTACK: &str = "THStack";
    pub const MULTI_GRAPH: &str = "TMultiGraph";
    pub const BUTTON: &str = "TButton";
    pub const LIST: &str = "TList";
    pub const WEB_SNAPSHOT: &str = "TWebSnapshot";
}

/// Opaque object payload as delivered by the server or a file.
///
/// Only the class name and object name are interpreted by the pad
/// painter; everything else is passed through to object painters.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapObject {
    #[serde(rename = "_typename", default)]
    pub typename: String,
    #[serde(rename = "fName", default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl SnapObject {
    pub fn new(typename: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            typename: typename.into(),
            name: name.into(),
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn is(&self, typename: &str) -> bool {
        self.typename == typename
    }

    pub fn is_pad(&self) -> bool {
        self.is(class_names::PAD) || self.is(class_names::CANVAS)
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn f64_field(&self, key: &str) -> Option<f64> {
        self.field(key).and_then(Value::as_f64)
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.field(key).and_then(Value::as_str)
    }

    /// Array stored under `arr` (TList / TObjArray layout).
    pub fn items(&self) -> &[Value] {
        self.field("arr")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_fields_are_kept() {
        let obj: SnapObject = serde_json::from_value(json!({
            "_typename": "TH1F",
            "fName": "hpx",
            "fEntries": 25000,
        }))
        .unwrap();

        assert_eq!(obj.typename, "TH1F");
        assert_eq!(obj.name, "hpx");
        assert_eq!(obj.f64_field("fEntries"), Some(25000.0));
        assert_eq!(obj.to_value()["fEntries"], json!(25000));
    }

    #[test]
    fn items_reads_list_layout() {
        let obj = SnapObject::new(class_names::OBJ_ARRAY, "ListOfColors")
            .with_field("arr", json!([{ "_typename": "TColor" }]));

        assert_eq!(obj.items().len(), 1);
        assert!(SnapObject::new("TH1F", "h").items().is_empty());
    }
}
