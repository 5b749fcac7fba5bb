/// Track-load error taxonomy
///
/// Every variant is fatal to the track load: the load is aborted and a
/// single user-visible error naming the file is surfaced. Recoverable
/// per-packet decode errors are not represented here; they are logged and
/// skipped inside the decode loop.
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackLoadError {
    /// The container was opened but contains no audio stream
    #[error("no audio stream found in file: {path}")]
    NoAudioStream { path: PathBuf },

    /// The file is DRM-protected and cannot be played
    #[error("file is DRM-protected: {path}")]
    ProtectedContent { path: PathBuf },

    /// The container could not be opened or probed
    #[error("failed to open '{path}': {reason}")]
    OpenFailed { path: PathBuf, reason: String },

    /// A codec for the audio stream could not be initialized
    #[error("failed to initialize decoder for '{path}': {reason}")]
    DecoderInit { path: PathBuf, reason: String },

    /// The container reports the track as not playable
    #[error("track is not playable: {path}")]
    NotPlayable { path: PathBuf },
}

impl TrackLoadError {
    /// The offending file, for display by the UI layer.
    pub fn path(&self) -> &Path {
        match self {
            Self::NoAudioStream { path }
            | Self::ProtectedContent { path }
            | Self::OpenFailed { path, .. }
            | Self::DecoderInit { path, .. }
            | Self::NotPlayable { path } => path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_carries_offending_path() {
        let err = TrackLoadError::NoAudioStream {
            path: PathBuf::from("/music/broken.mka"),
        };
        assert_eq!(err.path(), Path::new("/music/broken.mka"));
        assert!(err.to_string().contains("/music/broken.mka"));
    }

    #[test]
    fn display_names_the_reason() {
        let err = TrackLoadError::DecoderInit {
            path: PathBuf::from("/music/a.opus"),
            reason: "unsupported codec".into(),
        };
        assert!(err.to_string().contains("unsupported codec"));
    }
}
