/// Error type for decoding or encoding protocol records.
#[derive(Debug)]
pub enum ProtocolError {
    Json(serde_json::Error),
    UnknownKind(u8),
    MalformedMessage(String),
    MalformedColors(String),
    MalformedFont(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(err) => write!(f, "JSON error: {}", err),
            Self::UnknownKind(kind) => write!(f, "Unknown snapshot kind: {}", kind),
            Self::MalformedMessage(msg) => write!(f, "Malformed message: {}", msg),
            Self::MalformedColors(msg) => write!(f, "Malformed color table: {}", msg),
            Self::MalformedFont(msg) => write!(f, "Malformed font descriptor: {}", msg),
        }
    }
}

impl std::error::Error for ProtocolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}
