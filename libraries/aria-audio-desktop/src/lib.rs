//! Desktop playback sink using CPAL
//!
//! This crate owns the output side of the player: device enumeration and
//! selection, the playback engine with its dedicated audio thread, sample
//! rate conversion to the device rate, and render observer dispatch.
//!
//! # Architecture
//!
//! A dedicated audio thread owns the CPAL `Stream`; the control domain
//! communicates with it over a bounded command channel, so the stream
//! never has to cross threads. Canonical planar buffers are scheduled
//! FIFO into the engine, which runs the effects chain, applies volume and
//! pan, and interleaves into the device callback.
//!
//! # Example
//!
//! ```no_run
//! use aria_audio_desktop::PlaybackEngine;
//! use aria_core::CanonicalBuffer;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = PlaybackEngine::new()?;
//!
//! // Schedule one second of silence.
//! let buffer = CanonicalBuffer::silence(2, 44100, 44100);
//! engine.schedule(buffer)?;
//!
//! engine.set_volume(0.5)?;
//! engine.pause();
//! engine.resume();
//! engine.stop();
//! # Ok(())
//! # }
//! ```

mod device;
mod engine;
mod error;
mod observer;
mod resample;

pub use device::{
    default_output_device, list_output_devices, match_remembered, DeviceInfo,
    VISUALIZATION_ANALYSIS_BUFFER_SIZE,
};
pub use engine::PlaybackEngine;
pub use error::{AudioOutputError, Result};
pub use resample::{Resampler, ResamplingQuality};
