/// Packet decoding built on Symphonia
use crate::error::{AudioError, Result};
use crate::frame::Frame;
use crate::reader::{Packet, StreamReader};
use aria_core::TrackLoadError;
use symphonia::core::codecs::{Decoder, DecoderOptions};

/// Decodes compressed packets from one stream into PCM frames.
///
/// Created against an open `StreamReader` and bound to its track. Decode
/// errors on individual packets are recoverable; the caller logs and moves
/// on to the next packet.
pub struct PacketDecoder {
    decoder: Box<dyn Decoder>,
    drained: bool,
}

impl PacketDecoder {
    /// Create a decoder for the reader's audio track.
    pub fn new(reader: &StreamReader) -> std::result::Result<Self, TrackLoadError> {
        let decoder = symphonia::default::get_codecs()
            .make(reader.codec_params(), &DecoderOptions::default())
            .map_err(|e| TrackLoadError::DecoderInit {
                path: reader.path().to_path_buf(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            decoder,
            drained: false,
        })
    }

    /// Decode one packet into zero or more PCM frames.
    ///
    /// The packet is consumed. A failure here is recoverable: the decoder
    /// remains usable for subsequent packets.
    pub fn decode(&mut self, packet: Packet) -> Result<Vec<Frame>> {
        let pts = packet.pts();
        match self.decoder.decode(&packet.inner) {
            Ok(decoded) => Ok(vec![Frame::from_decoded(&decoded, pts)]),
            Err(e) => Err(AudioError::Decode(e.to_string())),
        }
    }

    /// Decode one packet and discard its samples.
    ///
    /// Used while seeking: packets before the target position must pass
    /// through the decoder to prime its internal state, but their output
    /// is not wanted.
    pub fn decode_and_drop(&mut self, packet: Packet) -> Result<()> {
        self.decoder
            .decode(&packet.inner)
            .map(|_| ())
            .map_err(|e| AudioError::Decode(e.to_string()))
    }

    /// Return any frames still buffered inside the decoder.
    ///
    /// Called exactly once, after the last packet of the stream has been
    /// decoded; Symphonia decoders emit their output synchronously, so
    /// this is normally empty. Repeat calls always return nothing.
    pub fn drain(&mut self) -> Vec<Frame> {
        if self.drained {
            return Vec::new();
        }
        self.drained = true;
        Vec::new()
    }

    /// Discard all internal decoder state.
    ///
    /// Required before decoding packets from a discontinuous position
    /// (after a container-level seek). Re-arms `drain`.
    pub fn flush_buffers(&mut self) {
        self.drained = false;
        self.decoder.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::StreamReader;
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
            let s = ((t * 440.0 * std::f32::consts::TAU).sin() * 0.5 * 32767.0) as i16;
            writer.write_sample(s).unwrap();
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn decodes_packets_into_frames() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_test_wav(&path, 0.5);

        let mut reader = StreamReader::open(&path).unwrap();
        let mut decoder = PacketDecoder::new(&reader).unwrap();

        let mut samples = 0usize;
        while let Some(packet) = reader.read_packet().unwrap() {
            for frame in decoder.decode(packet).unwrap() {
                assert_eq!(frame.channel_count(), 2);
                assert_eq!(frame.sample_rate(), 44100);
                samples += frame.sample_count();
            }
        }
        for frame in decoder.drain() {
            samples += frame.sample_count();
        }
        assert_eq!(samples, 22050);
    }

    #[test]
    fn decode_and_drop_produces_no_frames() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_test_wav(&path, 0.2);

        let mut reader = StreamReader::open(&path).unwrap();
        let mut decoder = PacketDecoder::new(&reader).unwrap();

        let packet = reader.read_packet().unwrap().unwrap();
        decoder.decode_and_drop(packet).unwrap();

        if let Some(next) = reader.read_packet().unwrap() {
            // Dropped output never resurfaces in later decodes.
            let frames = decoder.decode(next).unwrap();
            assert_eq!(frames.len(), 1);
        }
    }

    #[test]
    fn drain_is_one_shot_until_flush() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_test_wav(&path, 0.2);

        let reader = StreamReader::open(&path).unwrap();
        let mut decoder = PacketDecoder::new(&reader).unwrap();

        assert!(decoder.drain().is_empty());
        assert!(decoder.drain().is_empty());
        decoder.flush_buffers();
        assert!(decoder.drain().is_empty());
    }
}
