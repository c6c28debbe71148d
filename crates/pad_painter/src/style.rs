use pad_model::{PadAttributes, SnapObject};
use serde_json::{json, Map, Value};

/// Process-wide style record (`TStyle` fields by their ROOT names).
///
/// Only written while the issuing pad holds the head of its draw queue.
#[derive(Clone, Debug, PartialEq)]
pub struct StyleStore {
    fields: Map<String, Value>,
}

impl Default for StyleStore {
    fn default() -> Self {
        let defaults = json!({
            "fOptStat": 1111,
            "fOptTitle": 1,
            "fOptFit": 0,
            "fOptDate": 0,
            "fOptFile": 0,
            "fOptLogx": 0,
            "fOptLogy": 0,
            "fOptLogz": 0,
            "fPadGridX": false,
            "fPadGridY": false,
            "fPadTickX": 0,
            "fPadTickY": 0,
            "fDateX": 0.01,
            "fDateY": 0.01,
            "fCanvasColor": 0,
            "fPadColor": 0,
        });
        let fields = match defaults {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self { fields }
    }
}

impl StyleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy every field of a style object over the current values.
    pub fn merge(&mut self, style: &SnapObject) {
        for (key, value) in &style.fields {
            self.fields.insert(key.clone(), value.clone());
        }
        if !style.name.is_empty() {
            self.fields
                .insert("fName".to_string(), Value::from(style.name.clone()));
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn f64(&self, key: &str) -> Option<f64> {
        let value = self.get(key)?;
        value
            .as_f64()
            .or_else(|| value.as_bool().map(|flag| if flag { 1.0 } else { 0.0 }))
    }

    pub fn i32(&self, key: &str) -> Option<i32> {
        self.f64(key).map(|value| value.round() as i32)
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.fields.insert(key.to_string(), value.into());
    }

    /// Store grid, tick and log settings of a pad as style defaults.
    pub fn save_pad(&mut self, pad: &PadAttributes, is_canvas: bool) {
        let color_key = if is_canvas { "fCanvasColor" } else { "fPadColor" };
        self.set(color_key, pad.fill_color);
        self.set("fPadGridX", pad.gridx != 0);
        self.set("fPadGridY", pad.gridy != 0);
        self.set("fPadTickX", pad.tickx);
        self.set("fPadTickY", pad.ticky);
        self.set("fOptLogx", pad.logx);
        self.set("fOptLogy", pad.logy);
        self.set("fOptLogz", pad.logz);
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}
