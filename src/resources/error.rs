//! Residency error types

use crate::backend::BackendError;
use thiserror::Error;

/// Errors surfaced by textures and the resource cache
#[derive(Error, Debug)]
pub enum ResidencyError {
    /// The file is missing or not a supported image format
    #[error("Failed to decode texture '{path}': {source}")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },
    /// An operation was requested out of order
    #[error("Precondition failed: {0}")]
    Precondition(String),
    /// A device allocation or creation call failed
    #[error("Device resource error: {0}")]
    DeviceResource(#[from] BackendError),
    #[error("No device context bound")]
    ContextUnbound,
    #[error("Device context no longer alive")]
    ContextExpired,
    #[error("No display registry bound")]
    DisplayUnavailable,
}

pub type ResidencyResult<T> = Result<T, ResidencyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ResidencyError::Precondition("texture not loaded to CPU".into());
        assert_eq!(err.to_string(), "Precondition failed: texture not loaded to CPU");

        let err: ResidencyError = BackendError::OutOfMemory.into();
        assert_eq!(err.to_string(), "Device resource error: Out of memory");
    }
}
