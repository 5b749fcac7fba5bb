//! Aria Player Core
//!
//! Shared value types and contracts for the playback pipeline:
//! - Sample/stream format descriptors and the canonical playback format
//!   (32-bit float, non-interleaved)
//! - The planar PCM buffer type handed from the decode pipeline to the
//!   output engine
//! - The track-load error taxonomy surfaced to the UI layer
//! - The render observer contract for tapping rendered audio
//! - Persisted-state value types (device preference)

mod buffer;
mod error;
mod format;
mod observer;
mod persist;

pub use buffer::CanonicalBuffer;
pub use error::TrackLoadError;
pub use format::{ChannelLayout, FormatDescriptor, SampleFormat, SampleKind};
pub use observer::RenderObserver;
pub use persist::DevicePersistentState;
