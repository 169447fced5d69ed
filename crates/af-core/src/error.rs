use thiserror::Error;

/// Errors originating from the core module.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Invalid configuration value or structure.
    #[error("Configuration invalide : {0}")]
    Config(String),

    /// The symbol table does not have exactly one symbol per level.
    #[error("Table de symboles invalide : {actual} symboles pour {expected} niveaux")]
    SymbolTableMismatch {
        /// Configured level count.
        expected: usize,
        /// Number of symbols supplied.
        actual: usize,
    },

    /// Invalid width/height dimensions.
    #[error("Dimensions invalides : {width}×{height}")]
    InvalidDimensions {
        /// Width value.
        width: u32,
        /// Height value.
        height: u32,
    },
}

/// Errors raised while acquiring or enumerating capture devices.
///
/// Only acquisition failures surface to the caller; per-frame problems are
/// absorbed by the pipeline.
#[derive(Error, Debug)]
pub enum CaptureError {
    /// The capture stack is missing or unusable (no ffmpeg, unsupported platform).
    #[error("Capture indisponible : {0}")]
    Unavailable(String),

    /// The OS refused access to the camera.
    #[error("Accès caméra refusé")]
    PermissionDenied,

    /// No device matches the requested id.
    #[error("Caméra introuvable : {0}")]
    DeviceNotFound(String),

    /// The stream opened but could not deliver frames.
    #[error("Flux caméra interrompu : {0}")]
    StreamFailed(String),

    /// Underlying I/O failure while talking to the capture process.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_mismatch_message_names_both_counts() {
        let msg = CoreError::SymbolTableMismatch {
            expected: 5,
            actual: 3,
        }
        .to_string();
        assert!(msg.contains('5'));
        assert!(msg.contains('3'));
    }

    #[test]
    fn io_errors_convert_into_capture_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "ffmpeg");
        let err: CaptureError = io.into();
        assert!(matches!(err, CaptureError::Io(_)));
    }
}
