/// Audio output errors
use thiserror::Error;

/// Result type for audio output operations
pub type Result<T> = std::result::Result<T, AudioOutputError>;

/// Audio output errors
#[derive(Debug, Error)]
pub enum AudioOutputError {
    /// Device not found
    #[error("Audio device not found")]
    DeviceNotFound,

    /// A named device is no longer present
    #[error("Audio device not found: {0}")]
    NamedDeviceNotFound(String),

    /// Device enumeration failed
    #[error("Device enumeration failed: {0}")]
    EnumerationFailed(String),

    /// Querying a device's configuration failed
    #[error("Device info query failed: {0}")]
    DeviceInfoFailed(String),

    /// Failed to build output stream
    #[error("Failed to build output stream: {0}")]
    StreamBuildError(String),

    /// Failed to play stream
    #[error("Failed to play stream: {0}")]
    PlayError(String),

    /// Failed to pause stream
    #[error("Failed to pause stream: {0}")]
    PauseError(String),

    /// Invalid volume level
    #[error("Invalid volume: {0}. Must be between 0.0 and 1.0")]
    InvalidVolume(f32),

    /// Invalid pan position
    #[error("Invalid pan: {0}. Must be between -1.0 and 1.0")]
    InvalidPan(f32),

    /// Sample rate conversion error
    #[error("Sample rate conversion error: {0}")]
    ResampleError(String),

    /// The audio thread has shut down
    #[error("Audio thread is not running")]
    EngineStopped,
}

impl From<cpal::BuildStreamError> for AudioOutputError {
    fn from(err: cpal::BuildStreamError) -> Self {
        AudioOutputError::StreamBuildError(err.to_string())
    }
}

impl From<cpal::PlayStreamError> for AudioOutputError {
    fn from(err: cpal::PlayStreamError) -> Self {
        AudioOutputError::PlayError(err.to_string())
    }
}

impl From<cpal::PauseStreamError> for AudioOutputError {
    fn from(err: cpal::PauseStreamError) -> Self {
        AudioOutputError::PauseError(err.to_string())
    }
}

impl From<cpal::DefaultStreamConfigError> for AudioOutputError {
    fn from(err: cpal::DefaultStreamConfigError) -> Self {
        AudioOutputError::DeviceInfoFailed(err.to_string())
    }
}

impl From<cpal::DevicesError> for AudioOutputError {
    fn from(err: cpal::DevicesError) -> Self {
        AudioOutputError::EnumerationFailed(err.to_string())
    }
}

impl From<rubato::ResamplerConstructionError> for AudioOutputError {
    fn from(err: rubato::ResamplerConstructionError) -> Self {
        AudioOutputError::ResampleError(err.to_string())
    }
}

impl From<rubato::ResampleError> for AudioOutputError {
    fn from(err: rubato::ResampleError) -> Self {
        AudioOutputError::ResampleError(err.to_string())
    }
}
