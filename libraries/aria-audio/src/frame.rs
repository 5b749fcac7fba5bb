/// Decoded-frame model with sample-accurate truncation
use aria_core::{ChannelLayout, FormatDescriptor, SampleFormat, SampleKind};
use symphonia::core::audio::{AudioBufferRef, Signal};

/// Per-channel sample planes in the frame's source format.
///
/// Narrower and unsigned source formats are widened to the nearest stored
/// type at construction (an exact mapping); the descriptor records the
/// stored kind.
#[derive(Debug, Clone)]
pub(crate) enum FrameData {
    U8(Vec<Vec<u8>>),
    S16(Vec<Vec<i16>>),
    S24(Vec<Vec<i32>>),
    S32(Vec<Vec<i32>>),
    F32(Vec<Vec<f32>>),
    F64(Vec<Vec<f64>>),
}

impl FrameData {
    fn kind(&self) -> SampleKind {
        match self {
            Self::U8(_) => SampleKind::Unsigned8,
            Self::S16(_) => SampleKind::Signed16,
            Self::S24(_) => SampleKind::Signed24,
            Self::S32(_) => SampleKind::Signed32,
            Self::F32(_) => SampleKind::Float32,
            Self::F64(_) => SampleKind::Float64,
        }
    }

    fn channel_count(&self) -> usize {
        match self {
            Self::U8(p) => p.len(),
            Self::S16(p) => p.len(),
            Self::S24(p) | Self::S32(p) => p.len(),
            Self::F32(p) => p.len(),
            Self::F64(p) => p.len(),
        }
    }
}

/// One decoded PCM frame.
///
/// Truncation (`keep_first_n` / `keep_last_n`) is a pure metadata
/// adjustment: the sample planes are never copied or shrunk, the converter
/// simply reads the effective window `[first_sample_index,
/// first_sample_index + sample_count)`.
#[derive(Debug, Clone)]
pub struct Frame {
    pub(crate) data: FrameData,
    descriptor: FormatDescriptor,
    /// Samples per channel as decoded
    actual: usize,
    /// Effective sample count after truncation, if truncated
    truncated: Option<usize>,
    /// Index of the first effective sample (non-zero only after
    /// `keep_last_n`)
    first_sample: usize,
    /// Best-effort timestamp, in stream time-base units
    timestamp: i64,
    /// Presentation timestamp, in stream time-base units
    pts: i64,
    /// Start time in seconds; set by the decode session when frames need
    /// timestamps (segment loops). Negative when unset.
    pub(crate) start_seconds: f64,
    /// End time in seconds; see `start_seconds`.
    pub(crate) end_seconds: f64,
}

impl Frame {
    /// Copy a decoded Symphonia buffer into an owned frame.
    pub(crate) fn from_decoded(decoded: &AudioBufferRef<'_>, pts: i64) -> Self {
        let channels = decoded.spec().channels.count();
        let sample_rate = decoded.spec().rate;
        let frames = decoded.frames();

        let data = match decoded {
            AudioBufferRef::U8(buf) => {
                FrameData::U8((0..channels).map(|c| buf.chan(c).to_vec()).collect())
            }
            AudioBufferRef::S8(buf) => FrameData::S16(
                (0..channels)
                    .map(|c| buf.chan(c).iter().map(|s| i16::from(*s) << 8).collect())
                    .collect(),
            ),
            AudioBufferRef::U16(buf) => FrameData::S16(
                (0..channels)
                    .map(|c| {
                        buf.chan(c)
                            .iter()
                            .map(|s| (i32::from(*s) - 32768) as i16)
                            .collect()
                    })
                    .collect(),
            ),
            AudioBufferRef::S16(buf) => {
                FrameData::S16((0..channels).map(|c| buf.chan(c).to_vec()).collect())
            }
            AudioBufferRef::U24(buf) => FrameData::S24(
                (0..channels)
                    .map(|c| {
                        buf.chan(c)
                            .iter()
                            .map(|s| s.inner() as i32 - 8_388_608)
                            .collect()
                    })
                    .collect(),
            ),
            AudioBufferRef::S24(buf) => FrameData::S24(
                (0..channels)
                    .map(|c| buf.chan(c).iter().map(|s| s.inner()).collect())
                    .collect(),
            ),
            AudioBufferRef::U32(buf) => FrameData::S32(
                (0..channels)
                    .map(|c| {
                        buf.chan(c)
                            .iter()
                            .map(|s| (i64::from(*s) - 2_147_483_648) as i32)
                            .collect()
                    })
                    .collect(),
            ),
            AudioBufferRef::S32(buf) => {
                FrameData::S32((0..channels).map(|c| buf.chan(c).to_vec()).collect())
            }
            AudioBufferRef::F32(buf) => {
                FrameData::F32((0..channels).map(|c| buf.chan(c).to_vec()).collect())
            }
            AudioBufferRef::F64(buf) => {
                FrameData::F64((0..channels).map(|c| buf.chan(c).to_vec()).collect())
            }
        };

        let descriptor = FormatDescriptor::new(
            sample_rate,
            ChannelLayout::from_channel_count(channels as u16),
            SampleFormat::planar(data.kind()),
        );

        Self {
            data,
            descriptor,
            actual: frames,
            truncated: None,
            first_sample: 0,
            timestamp: pts,
            pts,
            start_seconds: -1.0,
            end_seconds: -1.0,
        }
    }

    /// Build a frame directly from canonical-format planes. Used in tests
    /// and by synthetic sources.
    pub fn from_planes_f32(planes: Vec<Vec<f32>>, sample_rate: u32, pts: i64) -> Self {
        let actual = planes.first().map_or(0, Vec::len);
        let channels = planes.len() as u16;
        Self {
            data: FrameData::F32(planes),
            descriptor: FormatDescriptor::canonical(
                sample_rate,
                ChannelLayout::from_channel_count(channels),
            ),
            actual,
            truncated: None,
            first_sample: 0,
            timestamp: pts,
            pts,
            start_seconds: -1.0,
            end_seconds: -1.0,
        }
    }

    pub fn descriptor(&self) -> &FormatDescriptor {
        &self.descriptor
    }

    pub fn channel_count(&self) -> usize {
        self.data.channel_count()
    }

    pub fn sample_rate(&self) -> u32 {
        self.descriptor.sample_rate
    }

    /// Effective number of samples per channel: the truncated count if
    /// truncation has occurred, the decoded count otherwise.
    pub fn sample_count(&self) -> usize {
        self.truncated.unwrap_or(self.actual)
    }

    /// Samples per channel as decoded, ignoring truncation.
    pub fn actual_sample_count(&self) -> usize {
        self.actual
    }

    /// Index of the first effective sample. Non-zero only after
    /// `keep_last_n`.
    pub fn first_sample_index(&self) -> usize {
        self.first_sample
    }

    pub fn pts(&self) -> i64 {
        self.pts
    }

    /// Best-effort timestamp, used to restore presentation order when
    /// frames are converted concurrently.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn start_seconds(&self) -> f64 {
        self.start_seconds
    }

    pub fn end_seconds(&self) -> f64 {
        self.end_seconds
    }

    /// Stamp this frame with its position on the track timeline.
    pub(crate) fn set_times(&mut self, start_seconds: f64, end_seconds: f64) {
        self.start_seconds = start_seconds;
        self.end_seconds = end_seconds;
    }

    /// Restrict this frame to its first `count` samples. Used when a frame
    /// overruns a loop or seek end boundary.
    ///
    /// A no-op unless `count` is strictly less than the decoded sample
    /// count.
    pub fn keep_first_n(&mut self, count: usize) {
        if count < self.actual {
            self.first_sample = 0;
            self.truncated = Some(count);
        }
    }

    /// Restrict this frame to its last `count` samples, advancing the
    /// first-sample offset accordingly. Used when a frame starts before a
    /// seek target but its tail is in range.
    ///
    /// A no-op unless `count` is strictly less than the decoded sample
    /// count.
    pub fn keep_last_n(&mut self, count: usize) {
        if count < self.actual {
            self.first_sample = self.actual - count;
            self.truncated = Some(count);
        }
    }
}
