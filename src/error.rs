use std::fmt::{Display, Formatter};

/// Errors returned by the fingerprinting engine.
///
/// Silence, too-short audio and audio without loud enough peaks are not errors:
/// they produce an empty [Fingerprint](crate::Fingerprint).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FingerprintError {
    /// The caller supplied a sample rate, sample or option the engine cannot work with.
    InvalidInput(String),
}

impl FingerprintError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        FingerprintError::InvalidInput(msg.into())
    }
}

impl Display for FingerprintError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FingerprintError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
        }
    }
}

impl std::error::Error for FingerprintError {}

#[cfg(test)]
mod tests {
    use crate::error::FingerprintError;

    #[test]
    fn display() {
        let err = FingerprintError::invalid("sample rate must be positive");
        assert_eq!(err.to_string(), "Invalid input: sample rate must be positive");
    }
}
