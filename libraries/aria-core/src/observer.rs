/// Render observer contract
///
/// Implemented by consumers of the rendered signal (e.g. a visualizer).
/// The playback engine dispatches all three callbacks off the real-time
/// render thread, on a dedicated dispatch thread, so implementations may
/// allocate and block without affecting playback.
pub trait RenderObserver: Send {
    /// A buffer has been rendered to the output device.
    ///
    /// `planes` holds the post-effects samples in the canonical planar
    /// format; `frame_count` is the number of samples per plane.
    fn rendered(&mut self, frame_count: usize, planes: &[Vec<f32>]);

    /// The output device changed (e.g. headphones plugged in).
    fn device_changed(&mut self, new_buffer_size: usize, new_sample_rate: u32);

    /// The output device's sample rate changed.
    fn sample_rate_changed(&mut self, new_sample_rate: u32);
}
