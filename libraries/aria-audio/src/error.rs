/// Decode-pipeline errors
use aria_core::TrackLoadError;
use thiserror::Error;

/// Result type alias using `AudioError`
pub type Result<T> = std::result::Result<T, AudioError>;

#[derive(Debug, Error)]
pub enum AudioError {
    /// Fatal-to-load failure; aborts the track load
    #[error(transparent)]
    Load(#[from] TrackLoadError),

    /// A single packet failed to decode. Recoverable: the caller logs and
    /// skips to the next packet.
    #[error("decode error: {0}")]
    Decode(String),

    /// A seek within the stream failed
    #[error("seek error: {0}")]
    Seek(String),

    /// Packet read failed for a reason other than end of stream
    #[error("packet read error: {0}")]
    PacketRead(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
