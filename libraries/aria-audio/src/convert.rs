/// Conversion of decoded frames to the canonical playback format
///
/// Output layout and sample rate always equal the input's; only the sample
/// format changes, to 32-bit float planar. Integer samples use symmetric
/// scaling (divide by 2^(N-1)) so the [-1.0, 1.0] range is symmetric.
use crate::frame::{Frame, FrameData};
use aria_core::FormatDescriptor;

/// Converts frames of one stream to canonical planar f32.
///
/// `convert_into` performs no allocation; output planes are caller-owned
/// and caller-sized.
#[derive(Debug, Clone, Copy)]
pub struct SampleConverter {
    channels: usize,
}

impl SampleConverter {
    /// Construct for a stream with the given source format.
    pub fn new(descriptor: &FormatDescriptor) -> Self {
        Self {
            channels: descriptor.channel_count() as usize,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels
    }

    /// Write the frame's effective sample window into `out` starting at
    /// plane offset `at`.
    ///
    /// Each output plane must already hold at least
    /// `at + frame.sample_count()` samples; no allocation is performed.
    /// Frames already in the canonical format are copied verbatim.
    pub fn convert_into(&self, frame: &Frame, out: &mut [Vec<f32>], at: usize) {
        let count = frame.sample_count();
        let first = frame.first_sample_index();
        let window = first..first + count;

        match &frame.data {
            FrameData::F32(planes) => {
                // Canonical bypass: byte-for-byte copy of the window.
                for (ch, plane) in planes.iter().enumerate().take(out.len()) {
                    out[ch][at..at + count].copy_from_slice(&plane[window.clone()]);
                }
            }
            FrameData::F64(planes) => {
                for (ch, plane) in planes.iter().enumerate().take(out.len()) {
                    for (dst, src) in out[ch][at..at + count].iter_mut().zip(&plane[window.clone()])
                    {
                        *dst = (*src as f32).clamp(-1.0, 1.0);
                    }
                }
            }
            FrameData::U8(planes) => {
                for (ch, plane) in planes.iter().enumerate().take(out.len()) {
                    for (dst, src) in out[ch][at..at + count].iter_mut().zip(&plane[window.clone()])
                    {
                        *dst = (f32::from(*src) / f32::from(u8::MAX)) * 2.0 - 1.0;
                    }
                }
            }
            FrameData::S16(planes) => {
                for (ch, plane) in planes.iter().enumerate().take(out.len()) {
                    for (dst, src) in out[ch][at..at + count].iter_mut().zip(&plane[window.clone()])
                    {
                        *dst = f32::from(*src) / 32768.0;
                    }
                }
            }
            FrameData::S24(planes) => {
                for (ch, plane) in planes.iter().enumerate().take(out.len()) {
                    for (dst, src) in out[ch][at..at + count].iter_mut().zip(&plane[window.clone()])
                    {
                        *dst = *src as f32 / 8_388_608.0;
                    }
                }
            }
            FrameData::S32(planes) => {
                for (ch, plane) in planes.iter().enumerate().take(out.len()) {
                    for (dst, src) in out[ch][at..at + count].iter_mut().zip(&plane[window.clone()])
                    {
                        *dst = *src as f32 / 2_147_483_648.0;
                    }
                }
            }
        }
    }

    /// Convert one frame into freshly allocated planes sized to its
    /// effective window. Decode-domain convenience; the render path uses
    /// `convert_into` with reused buffers.
    pub fn convert_frame(&self, frame: &Frame) -> Vec<Vec<f32>> {
        let count = frame.sample_count();
        let mut out = vec![vec![0.0f32; count]; frame.channel_count()];
        self.convert_into(frame, &mut out, 0);
        out
    }
}
