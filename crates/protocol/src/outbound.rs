//! Text messages sent from the pad tree to the remote peer.
//!
//! Every message is `PREFIX:payload`. The prefix selects the handler on
//! the server side; payloads are either plain text or JSON.

use crate::{decode_pad_options, encode_pad_options, ProtocolError, WebPadOptions};
use pad_model::SnapId;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Mouse interaction kinds forwarded to pads with execs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PadEventKind {
    Move,
    Click,
    Dblclick,
}

/// Image formats a pad can be exported to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
    Svg,
    Webp,
    Pdf,
    Json,
}

/// Export request produced by the snapshot buttons and the "Save as" menu.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SaveRequest {
    pub format: ImageFormat,
    /// Empty for the whole canvas.
    #[serde(default)]
    pub snapid: String,
    pub filename: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Outbound {
    /// `EVENT:[padid,kind,x,y,targetid]`, all elements as strings.
    Event {
        pad: SnapId,
        kind: PadEventKind,
        x: f64,
        y: f64,
        target: Option<SnapId>,
    },
    /// `OBJEXEC:<snapid>:<exec>`
    ObjExec { snap_id: SnapId, exec: String },
    /// `RESIZED:` followed by the canvas options.
    Resized(Vec<WebPadOptions>),
    /// `OPTIONS6:` followed by the options of the whole pad tree.
    Options(Vec<WebPadOptions>),
    /// `SAVE:` followed by a JSON export request.
    Save(SaveRequest),
}

impl Outbound {
    pub fn obj_exec(snap_id: &SnapId, exec: impl Into<String>) -> Self {
        Self::ObjExec {
            snap_id: snap_id.clone(),
            exec: exec.into(),
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Event { .. } => "EVENT",
            Self::ObjExec { .. } => "OBJEXEC",
            Self::Resized(_) => "RESIZED",
            Self::Options(_) => "OPTIONS6",
            Self::Save(_) => "SAVE",
        }
    }

    /// Number of transport slots the message needs; events are only
    /// sent when the channel has room for two.
    pub fn credits(&self) -> usize {
        match self {
            Self::Event { .. } => 2,
            _ => 1,
        }
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        let payload = match self {
            Self::Event {
                pad,
                kind,
                x,
                y,
                target,
            } => serde_json::to_string(&[
                pad.to_string(),
                kind.to_string(),
                x.to_string(),
                y.to_string(),
                target.as_ref().map(SnapId::to_string).unwrap_or_default(),
            ])?,
            Self::ObjExec { snap_id, exec } => format!("{}:{}", snap_id, exec),
            Self::Resized(options) | Self::Options(options) => encode_pad_options(options)?,
            Self::Save(request) => serde_json::to_string(request)?,
        };
        Ok(format!("{}:{}", self.prefix(), payload))
    }

    pub fn decode(message: &str) -> Result<Self, ProtocolError> {
        let malformed = || ProtocolError::MalformedMessage(message.to_string());
        let (prefix, payload) = message.split_once(':').ok_or_else(malformed)?;
        match prefix {
            "EVENT" => {
                let fields: Vec<String> = serde_json::from_str(payload)?;
                let [pad, kind, x, y, target] = <[String; 5]>::try_from(fields).map_err(|_| malformed())?;
                Ok(Self::Event {
                    pad: SnapId::from(pad),
                    kind: kind.parse().map_err(|_| malformed())?,
                    x: x.parse().map_err(|_| malformed())?,
                    y: y.parse().map_err(|_| malformed())?,
                    target: (!target.is_empty()).then(|| SnapId::from(target)),
                })
            }
            "OBJEXEC" => {
                let (snap_id, exec) = payload.split_once(':').ok_or_else(malformed)?;
                Ok(Self::ObjExec {
                    snap_id: SnapId::from(snap_id),
                    exec: exec.to_string(),
                })
            }
            "RESIZED" => Ok(Self::Resized(decode_pad_options(payload)?)),
            "OPTIONS6" => Ok(Self::Options(decode_pad_options(payload)?)),
            "SAVE" => Ok(Self::Save(serde_json::from_str(payload)?)),
            _ => Err(malformed()),
        }
    }
}
