/// Decode session: reader + decoder + conversion, with seek/loop policy
use crate::decoder::PacketDecoder;
use crate::error::Result;
use crate::frame::Frame;
use crate::pool::ConversionPool;
use crate::reader::{Packet, StreamReader};
use aria_core::{CanonicalBuffer, FormatDescriptor, TrackLoadError};
use std::collections::VecDeque;
use std::path::Path;

/// The maximum difference between a requested seek position and the actual
/// position the container seek lands on that is tolerated without trimming
/// samples from the first usable packet.
const SEEK_POSITION_TOLERANCE: f64 = 0.01;

/// Consecutive packet-read failures before the session is declared
/// fatally errored.
const MAX_CONSECUTIVE_READ_ERRORS: u32 = 5;

/// Drives one open track through the decode pipeline.
///
/// Called from the decode domain in regular intervals to produce chunks of
/// canonical-format PCM for scheduling. Never touched by the render
/// thread.
pub struct DecodeSession {
    reader: StreamReader,
    decoder: PacketDecoder,
    pool: ConversionPool,
    /// Overflow frames decoded but not yet accepted by a buffer. When a
    /// decode call fills its buffer mid-packet, the excess frames wait
    /// here for the next call.
    frame_queue: VecDeque<Frame>,
    eof: bool,
    fatal_error: bool,
    end_of_loop: bool,
    /// End of the active segment loop, in seconds. While set, decoded
    /// frames carry start/end timestamps and are truncated at the
    /// boundary.
    loop_end: Option<f64>,
    consecutive_read_errors: u32,
}

impl DecodeSession {
    /// Open a track for decoding. Fatal-to-load failures surface here,
    /// before any decoding starts.
    pub fn open(path: &Path) -> std::result::Result<Self, TrackLoadError> {
        let reader = StreamReader::open(path)?;
        let decoder = PacketDecoder::new(&reader)?;

        Ok(Self {
            reader,
            decoder,
            pool: ConversionPool::new(),
            frame_queue: VecDeque::new(),
            eof: false,
            fatal_error: false,
            end_of_loop: false,
            loop_end: None,
            consecutive_read_errors: 0,
        })
    }

    pub fn duration(&self) -> Option<std::time::Duration> {
        self.reader.duration()
    }

    pub fn sample_rate(&self) -> u32 {
        self.reader.sample_rate()
    }

    pub fn channel_count(&self) -> u16 {
        self.reader.channel_count()
    }

    pub fn format_descriptor(&self) -> FormatDescriptor {
        self.reader.format_descriptor()
    }

    pub fn eof(&self) -> bool {
        self.eof
    }

    pub fn fatal_error(&self) -> bool {
        self.fatal_error
    }

    pub fn end_of_loop(&self) -> bool {
        self.end_of_loop
    }

    /// Activate or clear a segment loop ending at `end_seconds`. While a
    /// loop is active, frames are timestamped and truncated at the
    /// boundary.
    pub fn set_loop_end(&mut self, end_seconds: Option<f64>) {
        self.loop_end = end_seconds;
        self.end_of_loop = false;
    }

    /// Decode up to `max_samples` samples per channel into a canonical
    /// buffer.
    ///
    /// Returns fewer samples near end-of-stream, and may return slightly
    /// more on the terminal buffer: reaching EOF drains the decoder's
    /// internal buffers, and those tail frames are always accepted.
    /// Returns `None` once the stream (or the active loop) is exhausted,
    /// or when a fatal error cut the session short with nothing decoded.
    pub fn decode(&mut self, max_samples: usize) -> Option<CanonicalBuffer> {
        if self.fatal_error || self.end_of_loop {
            return None;
        }
        if self.eof && self.frame_queue.is_empty() {
            return None;
        }

        let mut batch: Vec<Frame> = Vec::new();
        let mut total = 0usize;

        while !self.eof && !self.end_of_loop {
            match self.next_frame() {
                Ok(Some(())) => {
                    self.consecutive_read_errors = 0;

                    // Peek before accepting: a frame that would overflow
                    // the buffer stays queued for the next call.
                    let Some(front) = self.frame_queue.front() else {
                        continue;
                    };
                    if total + front.sample_count() > max_samples {
                        break;
                    }
                    if let Some(mut frame) = self.frame_queue.pop_front() {
                        self.truncate_at_loop_end(&mut frame);
                        total += frame.sample_count();
                        batch.push(frame);
                    }
                }
                Ok(None) => {
                    self.eof = true;
                }
                Err(e) => {
                    tracing::warn!(
                        path = %self.reader.path().display(),
                        error = %e,
                        "decode error, skipping packet"
                    );
                    self.consecutive_read_errors += 1;
                    if self.consecutive_read_errors >= MAX_CONSECUTIVE_READ_ERRORS {
                        self.fatal_error = true;
                        return if total > 0 {
                            Some(self.assemble(batch))
                        } else {
                            None
                        };
                    }
                }
            }
        }

        if self.eof {
            // Drain both the overflow queue and the decoder's internal
            // buffers. Terminal frames are never rejected.
            let mut terminal: Vec<Frame> = self.frame_queue.drain(..).collect();
            terminal.extend(self.decoder.drain());
            for mut frame in terminal {
                self.truncate_at_loop_end(&mut frame);
                batch.push(frame);
            }
        }

        if batch.is_empty() {
            None
        } else {
            Some(self.assemble(batch))
        }
    }

    /// Seek to a position in seconds.
    ///
    /// Flushes decoder state first, then corrects for the container's
    /// coarse seek granularity: packets landing before the target are
    /// decoded-and-dropped (all but the last), and the last pre-target
    /// packet's frames are tail-trimmed so scheduling resumes within one
    /// frame of the target. A seek past end-of-stream just sets EOF.
    pub fn seek(&mut self, time: f64) -> Result<()> {
        // Stale buffered frames must not bleed into the new position.
        self.decoder.flush_buffers();
        self.frame_queue.clear();
        self.end_of_loop = false;

        if let Some(duration) = self.reader.duration() {
            if time >= duration.as_secs_f64() {
                self.eof = true;
                return Ok(());
            }
        }

        self.reader.seek(time)?;

        // Container seeks land on a keyframe at or before the target.
        // Read ahead until a packet starts past the target, so we know
        // exactly which packets straddle it.
        let mut packets: Vec<(Packet, f64)> = Vec::new();
        let mut last_timestamp = -1.0f64;

        while last_timestamp < time {
            match self.reader.read_packet()? {
                Some(packet) => {
                    last_timestamp = self.reader.ticks_to_seconds(packet.pts());
                    packets.push((packet, last_timestamp));
                }
                None => {
                    self.eof = true;
                    return Ok(());
                }
            }
        }

        // The read loop above guarantees the last packet satisfies this.
        let first_after = match packets.iter().position(|(_, ts)| *ts >= time) {
            Some(i) => i,
            None => {
                self.eof = false;
                return Ok(());
            }
        };
        let first_usable = first_after.saturating_sub(1);
        let first_usable_ts = packets[first_usable].1;
        let first_after_ts = packets[first_after].1;
        let usable_count = packets.len() - first_usable;

        let mut pre_target = Vec::new();
        let mut usable = Vec::new();
        for (i, (packet, _)) in packets.into_iter().enumerate() {
            if i < first_usable {
                pre_target.push(packet);
            } else {
                usable.push(packet);
            }
        }

        // Pre-target packets prime the codec state; their output is not
        // wanted.
        for packet in pre_target {
            if let Err(e) = self.decoder.decode_and_drop(packet) {
                tracing::warn!(
                    path = %self.reader.path().display(),
                    error = %e,
                    "decode error while skipping packets after seek"
                );
            }
        }

        let mut first_usable_frames = true;
        for packet in usable {
            let mut frames = match self.decoder.decode(packet) {
                Ok(frames) => frames,
                Err(e) => {
                    tracing::warn!(
                        path = %self.reader.path().display(),
                        error = %e,
                        "decode error while skipping packets after seek"
                    );
                    continue;
                }
            };

            if self.loop_end.is_some() {
                self.stamp_frames(&mut frames);
            }

            // Some packets span a second or more; when the first usable
            // one starts noticeably before the target, keep only its
            // tail.
            if first_usable_frames
                && usable_count > 1
                && time - first_usable_ts > SEEK_POSITION_TOLERANCE
            {
                let keep =
                    ((first_after_ts - time) * f64::from(self.reader.sample_rate())) as usize;
                if let Some(frame) = frames.first_mut() {
                    frame.keep_last_n(keep);
                }
            }
            first_usable_frames = false;

            self.frame_queue.extend(frames);
        }

        self.eof = false;
        Ok(())
    }

    /// Playback stopped; discard everything queued.
    pub fn stop(&mut self) {
        self.frame_queue.clear();
    }

    /// Decode packets until at least one frame sits in the queue.
    /// `Ok(None)` signals end-of-stream.
    fn next_frame(&mut self) -> Result<Option<()>> {
        while self.frame_queue.is_empty() {
            let packet = match self.reader.read_packet()? {
                Some(p) => p,
                None => return Ok(None),
            };

            let mut frames = self.decoder.decode(packet)?;
            if self.loop_end.is_some() {
                self.stamp_frames(&mut frames);
            }
            self.frame_queue.extend(frames);
        }
        Ok(Some(()))
    }

    /// Assign start/end second timestamps to all frames decoded from one
    /// packet: the first from its PTS, successors chained from their
    /// predecessor's end.
    fn stamp_frames(&self, frames: &mut [Frame]) {
        let rate = f64::from(self.reader.sample_rate());
        let mut start = match frames.first() {
            Some(f) => self.reader.ticks_to_seconds(f.pts()),
            None => return,
        };
        for frame in frames {
            let end = start + frame.actual_sample_count() as f64 / rate;
            frame.set_times(start, end);
            start = end;
        }
    }

    /// When a segment loop is active, trim any frame crossing the loop
    /// boundary and flag end-of-loop.
    fn truncate_at_loop_end(&mut self, frame: &mut Frame) {
        let Some(loop_end) = self.loop_end else {
            return;
        };
        if frame.start_seconds() < 0.0 {
            return;
        }
        if frame.end_seconds() >= loop_end {
            self.end_of_loop = true;
            let rate = f64::from(self.reader.sample_rate());
            let keep = ((loop_end - frame.start_seconds()) * rate).max(0.0) as usize;
            frame.keep_first_n(keep);
        }
    }

    /// Convert a batch of frames and concatenate them, in order, into one
    /// canonical buffer.
    fn assemble(&self, batch: Vec<Frame>) -> CanonicalBuffer {
        let sample_rate = self.reader.sample_rate();
        let channels = usize::from(self.reader.channel_count());
        // The PTS marks the start of the whole packet; a trimmed first
        // frame actually begins first_sample_index samples later.
        let start = batch.first().map_or(-1.0, |f| {
            let base = if f.start_seconds() >= 0.0 {
                f.start_seconds()
            } else {
                self.reader.ticks_to_seconds(f.pts())
            };
            base + f.first_sample_index() as f64 / f64::from(sample_rate)
        });

        let mut planes: Vec<Vec<f32>> = vec![Vec::new(); channels];
        for converted in self.pool.convert_batch(batch) {
            for (plane, chunk) in planes.iter_mut().zip(converted) {
                plane.extend_from_slice(&chunk);
            }
        }

        let mut buffer = CanonicalBuffer::new(planes, sample_rate);
        buffer.start_seconds = start;
        buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn write_test_wav(path: &Path, seconds: f64) {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        let total = (44100.0 * seconds) as usize;
        for i in 0..total {
            let t = i as f32 / 44100.0;
            let s = ((t * 220.0 * std::f32::consts::TAU).sin() * 0.4 * 32767.0) as i16;
            writer.write_sample(s).unwrap();
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn open_reports_stream_properties() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_test_wav(&path, 1.0);

        let session = DecodeSession::open(&path).unwrap();
        assert_eq!(session.sample_rate(), 44100);
        assert_eq!(session.channel_count(), 2);
        assert!(!session.eof());
        assert!(!session.fatal_error());
    }

    #[test]
    fn decode_respects_max_samples_until_terminal_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_test_wav(&path, 1.0);

        let mut session = DecodeSession::open(&path).unwrap();
        let mut total = 0usize;
        let mut buffers = 0usize;
        while let Some(buffer) = session.decode(4096) {
            if !session.eof() {
                assert!(buffer.frames() <= 4096);
            }
            assert_eq!(buffer.channel_count(), 2);
            total += buffer.frames();
            buffers += 1;
        }
        assert!(session.eof());
        assert_eq!(total, 44100);
        assert!(buffers >= 44100 / 4096);
        assert!(session.decode(4096).is_none());
    }

    #[test]
    fn loop_end_truncates_at_the_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_test_wav(&path, 1.0);

        let mut session = DecodeSession::open(&path).unwrap();
        session.set_loop_end(Some(0.5));

        let mut total = 0usize;
        while let Some(buffer) = session.decode(4096) {
            total += buffer.frames();
        }
        assert!(session.end_of_loop());
        // Within one frame of the 0.5s boundary.
        let target = (0.5 * 44100.0) as usize;
        assert!(total <= target);
        assert!(total >= target.saturating_sub(4096));
    }

    #[test]
    fn stop_discards_queued_frames() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_test_wav(&path, 1.0);

        let mut session = DecodeSession::open(&path).unwrap();
        let _ = session.decode(1024);
        session.stop();
        assert!(session.frame_queue.is_empty());
    }

    #[test]
    fn seek_past_duration_sets_eof() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_test_wav(&path, 1.0);

        let mut session = DecodeSession::open(&path).unwrap();
        session.seek(5.0).unwrap();
        assert!(session.eof());
    }

    #[test]
    fn seek_lands_within_one_buffer_of_target() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_test_wav(&path, 2.0);

        let mut session = DecodeSession::open(&path).unwrap();
        session.seek(1.0).unwrap();
        assert!(!session.eof());

        let buffer = session.decode(4096).unwrap();
        // First scheduled samples start at or after target minus one
        // buffer's duration.
        if buffer.start_seconds >= 0.0 {
            assert!(buffer.start_seconds >= 1.0 - buffer.duration_seconds());
        }

        let mut total = buffer.frames();
        while let Some(b) = session.decode(4096) {
            total += b.frames();
        }
        // Roughly one second of audio remains after the seek.
        assert!((total as f64 / 44100.0 - 1.0).abs() < 0.2);
    }

    #[test]
    fn reported_start_accounts_for_the_trimmed_first_packet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_test_wav(&path, 2.0);

        // A target well inside a packet, so the first usable packet is
        // keep_last_n-trimmed down to the target.
        let target = 1.2345;
        let mut session = DecodeSession::open(&path).unwrap();
        session.seek(target).unwrap();

        let buffer = session.decode(4096).unwrap();
        assert!(buffer.start_seconds >= 0.0);
        // The start must describe the first sample actually present, not
        // the untrimmed packet PTS before it.
        assert!(
            (buffer.start_seconds - target).abs() <= SEEK_POSITION_TOLERANCE + 1.0 / 44100.0,
            "start {} vs target {target}",
            buffer.start_seconds
        );
    }
}
