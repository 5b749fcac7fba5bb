/// Sample and stream format descriptors
use serde::{Deserialize, Serialize};

/// Numeric type of a single PCM sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleKind {
    /// Unsigned 8-bit integer (centered at 128)
    Unsigned8,
    /// Signed 16-bit integer
    Signed16,
    /// Signed 24-bit integer (stored in 32 bits)
    Signed24,
    /// Signed 32-bit integer
    Signed32,
    /// 32-bit float
    Float32,
    /// 64-bit float
    Float64,
}

impl SampleKind {
    /// Storage size of one sample, in bytes
    pub fn size_bytes(&self) -> usize {
        match self {
            Self::Unsigned8 => 1,
            Self::Signed16 => 2,
            Self::Signed24 | Self::Signed32 | Self::Float32 => 4,
            Self::Float64 => 8,
        }
    }

    /// Whether samples are floating point (as opposed to integer)
    pub fn is_float(&self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }
}

/// PCM sample format: numeric kind plus channel packing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SampleFormat {
    /// Numeric sample type
    pub kind: SampleKind,
    /// Channels packed together per sample (interleaved) vs. one buffer
    /// per channel (planar)
    pub interleaved: bool,
}

impl SampleFormat {
    /// The canonical playback format: 32-bit float, non-interleaved.
    /// Everything scheduled into the output engine must be in this format.
    pub const CANONICAL: Self = Self {
        kind: SampleKind::Float32,
        interleaved: false,
    };

    pub fn planar(kind: SampleKind) -> Self {
        Self {
            kind,
            interleaved: false,
        }
    }

    pub fn is_planar(&self) -> bool {
        !self.interleaved
    }

    /// True unless this format already equals the canonical playback format.
    pub fn needs_conversion(&self) -> bool {
        *self != Self::CANONICAL
    }
}

/// Physical / spatial arrangement of audio channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelLayout {
    Mono,
    Stereo,
    Quad,
    FiveOne,
    SevenOne,
    /// Unrecognized layout, identified only by channel count
    Other(u16),
}

impl ChannelLayout {
    pub fn from_channel_count(count: u16) -> Self {
        match count {
            1 => Self::Mono,
            2 => Self::Stereo,
            4 => Self::Quad,
            6 => Self::FiveOne,
            8 => Self::SevenOne,
            n => Self::Other(n),
        }
    }

    pub fn channel_count(&self) -> u16 {
        match self {
            Self::Mono => 1,
            Self::Stereo => 2,
            Self::Quad => 4,
            Self::FiveOne => 6,
            Self::SevenOne => 8,
            Self::Other(n) => *n,
        }
    }
}

/// Immutable description of a stream's (or frame's) PCM format.
///
/// Constructed once from a stream or a decoded frame and never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatDescriptor {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Channel arrangement
    pub channel_layout: ChannelLayout,
    /// Sample format
    pub sample_format: SampleFormat,
}

impl FormatDescriptor {
    pub fn new(sample_rate: u32, channel_layout: ChannelLayout, sample_format: SampleFormat) -> Self {
        Self {
            sample_rate,
            channel_layout,
            sample_format,
        }
    }

    /// The canonical playback format at a given rate and layout.
    pub fn canonical(sample_rate: u32, channel_layout: ChannelLayout) -> Self {
        Self::new(sample_rate, channel_layout, SampleFormat::CANONICAL)
    }

    pub fn channel_count(&self) -> u16 {
        self.channel_layout.channel_count()
    }

    /// Whether samples in this format must pass through the sample
    /// converter before playback.
    pub fn needs_conversion(&self) -> bool {
        self.sample_format.needs_conversion()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_format_needs_no_conversion() {
        let desc = FormatDescriptor::canonical(44100, ChannelLayout::Stereo);
        assert!(!desc.needs_conversion());
        assert!(desc.sample_format.is_planar());
    }

    #[test]
    fn non_canonical_formats_need_conversion() {
        let s16 = FormatDescriptor::new(
            44100,
            ChannelLayout::Stereo,
            SampleFormat::planar(SampleKind::Signed16),
        );
        assert!(s16.needs_conversion());

        let interleaved_f32 = FormatDescriptor::new(
            44100,
            ChannelLayout::Stereo,
            SampleFormat {
                kind: SampleKind::Float32,
                interleaved: true,
            },
        );
        assert!(interleaved_f32.needs_conversion());
    }

    #[test]
    fn channel_layout_round_trip() {
        for count in [1u16, 2, 4, 6, 8, 3, 5, 7, 16] {
            assert_eq!(
                ChannelLayout::from_channel_count(count).channel_count(),
                count
            );
        }
    }

    #[test]
    fn sample_sizes() {
        assert_eq!(SampleKind::Unsigned8.size_bytes(), 1);
        assert_eq!(SampleKind::Signed16.size_bytes(), 2);
        assert_eq!(SampleKind::Signed24.size_bytes(), 4);
        assert_eq!(SampleKind::Float64.size_bytes(), 8);
        assert!(SampleKind::Float32.is_float());
        assert!(!SampleKind::Signed32.is_float());
    }
}
