use crate::mpv::MpvLoadError;

/// Errors raised by the engine and the playback service.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Load(#[from] MpvLoadError),

    #[error("mpv_create returned a null handle")]
    CreateFailed,

    #[error("{call} failed: {message} (code {code})")]
    Api {
        call: &'static str,
        code: i32,
        message: String,
    },

    #[error("argument contains an interior NUL byte: {0:?}")]
    InteriorNul(String),

    #[error("failed to spawn engine event thread: {0}")]
    Thread(#[from] std::io::Error),

    #[error("playback service is closed")]
    Closed,
}
