use thiserror::Error;

/// Errors produced while decoding a buffer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerdeErr {
    /// Not enough bytes left in the buffer
    #[error("Buffer under-run: needed {needed} bytes but only {available} remain")]
    UnderRun { needed: usize, available: usize },

    /// String payload was not valid UTF-8
    #[error("String payload is not valid UTF-8")]
    InvalidUtf8,

    /// Integer read does not correspond to a known enum variant
    #[error("Value {value} is not a valid variant of {type_name}")]
    InvalidEnumValue { type_name: &'static str, value: u16 },
}
