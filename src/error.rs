/// Crate-level error type for the repet source separation library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid parameter value.
    #[error("invalid parameter `{name}`: got {value}, {reason}")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    /// Audio data is empty when a non-empty signal was required.
    #[error("audio signal is empty")]
    EmptyAudio,

    /// The signal is shorter than one analysis window.
    #[error("audio signal has {samples} samples but one analysis window needs {window_length}")]
    SignalTooShort {
        samples: usize,
        window_length: usize,
    },

    /// A required dimension is zero or invalid.
    #[error("invalid size for `{name}`: {value} ({reason})")]
    InvalidSize {
        name: &'static str,
        value: usize,
        reason: &'static str,
    },

    /// Input array has incorrect shape for the operation.
    #[error("shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: String, got: String },

    /// The repetition search found nothing within the configured ranges.
    #[error("no repeating structure: {0}")]
    DegenerateStructure(String),

    /// A separation result contains NaN or infinite samples.
    #[error("separation produced non-finite values")]
    NonFiniteOutput,
}

/// Convenience Result type for repet operations.
pub type Result<T> = std::result::Result<T, Error>;
