//! Aria Player Audio
//!
//! The decode half of the playback pipeline, plus the effects graph:
//! - Container probing and packet reading via Symphonia
//! - Packet decoding with drain/flush semantics and a conversion worker pool
//! - A decoded-frame model with sample-accurate, metadata-only truncation
//!   for precise seek and loop boundaries
//! - Conversion of arbitrary source sample formats to the canonical
//!   playback format (32-bit float, planar)
//! - A decode session that composes the above into a schedulable stream of
//!   canonical buffers, with the seek/loop policy on top
//! - The effects graph: native units, hosted units, and the per-unit
//!   activation state machine

mod convert;
mod decoder;
pub mod effects;
mod error;
mod frame;
mod pool;
mod reader;
mod session;

pub use convert::SampleConverter;
pub use decoder::PacketDecoder;
pub use error::{AudioError, Result};
pub use frame::Frame;
pub use pool::{decode_thread_count, ConversionPool};
pub use reader::{Packet, StreamReader, TimeBase};
pub use session::DecodeSession;
