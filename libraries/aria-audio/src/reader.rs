/// Container probing and packet reading
use crate::error::{AudioError, Result};
use aria_core::{ChannelLayout, FormatDescriptor, SampleFormat, SampleKind, TrackLoadError};
use std::path::{Path, PathBuf};
use std::time::Duration;
use symphonia::core::codecs::{CodecParameters, CODEC_TYPE_NULL};
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo, Track};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::Time;

/// Rational multiplier converting stream tick counts to seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBase {
    pub numer: u32,
    pub denom: u32,
}

impl TimeBase {
    pub fn to_seconds(&self, ticks: i64) -> f64 {
        ticks as f64 * f64::from(self.numer) / f64::from(self.denom)
    }
}

/// One compressed data unit read from the container.
///
/// Owned exclusively by the reader until handed to the decoder; consumed
/// by decoding. A packet belongs to exactly one stream index.
pub struct Packet {
    pub(crate) inner: symphonia::core::formats::Packet,
}

impl Packet {
    /// Index of the stream this packet belongs to
    pub fn stream_index(&self) -> u32 {
        self.inner.track_id()
    }

    /// Presentation timestamp, in stream time-base units
    pub fn pts(&self) -> i64 {
        self.inner.ts() as i64
    }

    /// Duration, in stream time-base units
    pub fn duration(&self) -> u64 {
        self.inner.dur()
    }

    /// Size of the compressed payload, in bytes
    pub fn byte_size(&self) -> usize {
        self.inner.buf().len()
    }
}

/// Opens a media container and exposes its single audio stream.
///
/// Owns the underlying container handle until dropped.
pub struct StreamReader {
    format: Box<dyn FormatReader>,
    track_id: u32,
    codec_params: CodecParameters,
    path: PathBuf,
    sample_rate: u32,
    channel_layout: ChannelLayout,
    time_base: Option<TimeBase>,
    duration: Option<Duration>,
}

impl StreamReader {
    /// Open the container at `path` and locate its audio stream.
    ///
    /// Fails with `NoAudioStream` if the container holds no decodable
    /// audio stream, and with `ProtectedContent` for DRM-protected files.
    pub fn open(path: &Path) -> std::result::Result<Self, TrackLoadError> {
        // Protected iTunes containers cannot be decoded; reject up front.
        if path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("m4p"))
        {
            return Err(TrackLoadError::ProtectedContent {
                path: path.to_path_buf(),
            });
        }

        let file = std::fs::File::open(path).map_err(|e| TrackLoadError::OpenFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| TrackLoadError::OpenFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let format = probed.format;

        let track = select_audio_track(format.tracks(), path)?;

        let codec_params = track.codec_params.clone();
        let track_id = track.id;

        let sample_rate = codec_params.sample_rate.unwrap_or(44100);
        let channels = codec_params
            .channels
            .map(|c| c.count() as u16)
            .unwrap_or(2);

        let time_base = codec_params.time_base.map(|tb| TimeBase {
            numer: tb.numer,
            denom: tb.denom,
        });

        // Headerless raw streams report no frame count; duration is then
        // absent, never zero.
        let duration = codec_params
            .n_frames
            .map(|n| Duration::from_secs_f64(n as f64 / f64::from(sample_rate)));

        Ok(Self {
            format,
            track_id,
            codec_params,
            path: path.to_path_buf(),
            sample_rate,
            channel_layout: ChannelLayout::from_channel_count(channels),
            time_base,
            duration,
        })
    }

    /// Read the next packet for the audio stream.
    ///
    /// Packets belonging to other streams are skipped. Returns `None` at
    /// end of stream.
    pub fn read_packet(&mut self) -> Result<Option<Packet>> {
        use symphonia::core::errors::Error;

        loop {
            match self.format.next_packet() {
                Ok(packet) => {
                    if packet.track_id() != self.track_id {
                        continue;
                    }
                    return Ok(Some(Packet { inner: packet }));
                }
                Err(Error::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Ok(None);
                }
                Err(e) => return Err(AudioError::PacketRead(e.to_string())),
            }
        }
    }

    /// Seek the container to approximately `seconds`, landing at or before
    /// the target. Returns the actual position reached, in seconds.
    ///
    /// The decoder's buffers must be flushed before calling this.
    pub fn seek(&mut self, seconds: f64) -> Result<f64> {
        let whole = seconds.floor();
        let time = Time::new(whole as u64, seconds - whole);

        let seeked_to = self
            .format
            .seek(
                SeekMode::Coarse,
                SeekTo::Time {
                    time,
                    track_id: Some(self.track_id),
                },
            )
            .map_err(|e| AudioError::Seek(e.to_string()))?;

        Ok(self.ticks_to_seconds(seeked_to.actual_ts as i64))
    }

    /// Convert a stream timestamp to seconds, using the stream's time base
    /// when known and assuming sample-count timestamps otherwise.
    pub fn ticks_to_seconds(&self, ticks: i64) -> f64 {
        match self.time_base {
            Some(tb) => tb.to_seconds(ticks),
            None => ticks as f64 / f64::from(self.sample_rate),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> u16 {
        self.channel_layout.channel_count()
    }

    pub fn channel_layout(&self) -> ChannelLayout {
        self.channel_layout
    }

    pub fn time_base(&self) -> Option<TimeBase> {
        self.time_base
    }

    /// Stream duration. Absent for headerless raw streams.
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Best-effort format descriptor from the codec parameters. The
    /// authoritative descriptor for decoded samples lives on each frame.
    pub fn format_descriptor(&self) -> FormatDescriptor {
        FormatDescriptor::new(
            self.sample_rate,
            self.channel_layout,
            SampleFormat::planar(stream_sample_kind(&self.codec_params)),
        )
    }

    pub(crate) fn codec_params(&self) -> &CodecParameters {
        &self.codec_params
    }
}

/// Pick the first decodable audio track. A container with no tracks has
/// no audio stream; one whose tracks all carry an unknown codec is not
/// playable.
fn select_audio_track<'a>(
    tracks: &'a [Track],
    path: &Path,
) -> std::result::Result<&'a Track, TrackLoadError> {
    if tracks.is_empty() {
        return Err(TrackLoadError::NoAudioStream {
            path: path.to_path_buf(),
        });
    }
    tracks
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| TrackLoadError::NotPlayable {
            path: path.to_path_buf(),
        })
}

/// Sample kind declared by the codec parameters. PCM codecs often leave
/// `sample_format` unset; the bit depth still identifies the integer kind.
fn stream_sample_kind(params: &CodecParameters) -> SampleKind {
    match params.sample_format {
        Some(symphonia::core::sample::SampleFormat::U8)
        | Some(symphonia::core::sample::SampleFormat::S8) => SampleKind::Unsigned8,
        Some(symphonia::core::sample::SampleFormat::U16)
        | Some(symphonia::core::sample::SampleFormat::S16) => SampleKind::Signed16,
        Some(symphonia::core::sample::SampleFormat::U24)
        | Some(symphonia::core::sample::SampleFormat::S24) => SampleKind::Signed24,
        Some(symphonia::core::sample::SampleFormat::U32)
        | Some(symphonia::core::sample::SampleFormat::S32) => SampleKind::Signed32,
        Some(symphonia::core::sample::SampleFormat::F64) => SampleKind::Float64,
        Some(symphonia::core::sample::SampleFormat::F32) => SampleKind::Float32,
        None => match params.bits_per_sample {
            Some(8) => SampleKind::Unsigned8,
            Some(16) => SampleKind::Signed16,
            Some(24) => SampleKind::Signed24,
            Some(32) => SampleKind::Signed32,
            _ => SampleKind::Float32,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_base_converts_ticks() {
        let tb = TimeBase {
            numer: 1,
            denom: 44100,
        };
        assert!((tb.to_seconds(44100) - 1.0).abs() < 1e-12);
        assert!((tb.to_seconds(22050) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn track_selection_distinguishes_absent_from_unplayable() {
        use symphonia::core::codecs::CODEC_TYPE_FLAC;

        let path = Path::new("/music/a.mka");

        let Err(err) = select_audio_track(&[], path) else {
            panic!("no tracks must mean no audio stream");
        };
        assert!(matches!(err, TrackLoadError::NoAudioStream { .. }));

        // Tracks exist but none carries a decodable codec.
        let null_track = Track::new(0, CodecParameters::new());
        let Err(err) = select_audio_track(std::slice::from_ref(&null_track), path) else {
            panic!("null-codec tracks must be unplayable");
        };
        assert!(matches!(err, TrackLoadError::NotPlayable { .. }));

        let mut params = CodecParameters::new();
        params.for_codec(CODEC_TYPE_FLAC);
        let tracks = [null_track, Track::new(1, params)];
        let selected = select_audio_track(&tracks, path).unwrap();
        assert_eq!(selected.id, 1);
    }

    #[test]
    fn integer_streams_without_sample_format_report_their_bit_depth() {
        let mut params = CodecParameters::new();
        assert_eq!(stream_sample_kind(&params), SampleKind::Float32);

        params.with_bits_per_sample(24);
        assert_eq!(stream_sample_kind(&params), SampleKind::Signed24);

        params.with_bits_per_sample(16);
        assert_eq!(stream_sample_kind(&params), SampleKind::Signed16);

        // An explicit sample format wins over the bit depth.
        params.with_sample_format(symphonia::core::sample::SampleFormat::F32);
        assert_eq!(stream_sample_kind(&params), SampleKind::Float32);
    }

    #[test]
    fn missing_file_is_open_failed() {
        let Err(err) = StreamReader::open(Path::new("/nonexistent/track.flac")) else {
            panic!("open should fail for a missing file");
        };
        assert!(matches!(err, TrackLoadError::OpenFailed { .. }));
        assert_eq!(err.path(), Path::new("/nonexistent/track.flac"));
    }

    #[test]
    fn protected_extension_is_rejected_before_probing() {
        let Err(err) = StreamReader::open(Path::new("/music/song.m4p")) else {
            panic!("protected content must not open");
        };
        assert!(matches!(err, TrackLoadError::ProtectedContent { .. }));
    }
}
