/// Planar PCM buffer in the canonical playback format
///
/// Samples are 32-bit float in [-1.0, 1.0], one plane per channel
/// (non-interleaved), all planes the same length.
#[derive(Debug, Clone)]
pub struct CanonicalBuffer {
    /// One `Vec<f32>` per channel
    pub planes: Vec<Vec<f32>>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Start time of the first sample, in seconds from the beginning of
    /// the track. Negative when unknown.
    pub start_seconds: f64,
}

impl CanonicalBuffer {
    pub fn new(planes: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        Self {
            planes,
            sample_rate,
            start_seconds: -1.0,
        }
    }

    /// Create a buffer of silence with the given shape.
    pub fn silence(channels: usize, frames: usize, sample_rate: u32) -> Self {
        Self::new(vec![vec![0.0; frames]; channels], sample_rate)
    }

    pub fn channel_count(&self) -> usize {
        self.planes.len()
    }

    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        self.planes.first().map_or(0, Vec::len)
    }

    pub fn duration_seconds(&self) -> f64 {
        self.frames() as f64 / f64::from(self.sample_rate)
    }

    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_shape() {
        let buf = CanonicalBuffer::silence(2, 512, 44100);
        assert_eq!(buf.channel_count(), 2);
        assert_eq!(buf.frames(), 512);
        assert!(buf.planes.iter().flatten().all(|s| *s == 0.0));
    }

    #[test]
    fn duration_from_frames_and_rate() {
        let buf = CanonicalBuffer::silence(2, 44100, 44100);
        assert!((buf.duration_seconds() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_buffer() {
        let buf = CanonicalBuffer::new(Vec::new(), 48000);
        assert!(buf.is_empty());
        assert_eq!(buf.frames(), 0);
    }
}
