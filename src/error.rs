use std::fmt;
use wasm_bindgen::JsValue;

/// Errors that can reach the mount boundary. Everything that happens inside
/// a running frame degrades instead of failing.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// A DOM lookup or call failed (missing canvas, listener install, ...).
    Dom(String),
    /// The Web Audio graph could not be built.
    Audio(String),
    /// Pixel data did not match the declared texture size.
    Texture(String),
    /// Host supplied configuration was malformed or out of range.
    Config(String),
    /// Grid rows were empty or ragged.
    Map(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Dom(msg) => write!(f, "dom: {}", msg),
            Error::Audio(msg) => write!(f, "audio: {}", msg),
            Error::Texture(msg) => write!(f, "texture: {}", msg),
            Error::Config(msg) => write!(f, "config: {}", msg),
            Error::Map(msg) => write!(f, "map: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

fn describe(value: &JsValue) -> String {
    value
        .as_string()
        .unwrap_or_else(|| format!("{:?}", value))
}

impl From<JsValue> for Error {
    fn from(value: JsValue) -> Self {
        Error::Dom(describe(&value))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<Error> for JsValue {
    fn from(err: Error) -> Self {
        JsValue::from_str(&err.to_string())
    }
}

/// Tags a browser failure as an audio one.
pub(crate) fn audio_err(value: JsValue) -> Error {
    Error::Audio(describe(&value))
}
