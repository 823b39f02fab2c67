use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("No stream is open")]
    NoStreamLoaded,

    #[error("No playback position has been reported yet")]
    NoPosition,

    #[error("Invalid effect value: {0}")]
    InvalidEffect(String),

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Sequence error: {0}")]
    Sequence(#[from] core_sequence::SequenceError),

    #[error("Settings error: {0}")]
    Settings(#[from] core_settings::SettingsError),

    #[error("Player or resolver error: {0}")]
    Bridge(#[from] bridge_traits::BridgeError),
}

pub type Result<T> = std::result::Result<T, ServiceError>;
