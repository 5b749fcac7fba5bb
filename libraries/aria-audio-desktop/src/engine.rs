// aria-audio-desktop/src/engine.rs
//
// Playback engine with a dedicated audio thread that owns the cpal stream.
// The control domain talks to the audio thread over a bounded command
// channel, so the cpal Stream never has to cross threads.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{BufferSize, Stream, StreamConfig};
use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{debug, error};

use aria_audio::effects::{EffectsGraph, GraphChangeListener};
use aria_core::{CanonicalBuffer, RenderObserver};

use crate::device::{self, DeviceInfo, VISUALIZATION_ANALYSIS_BUFFER_SIZE};
use crate::error::{AudioOutputError, Result};
use crate::observer::{ObserverSlot, ObserverTap, RenderEvent};
use crate::resample::{Resampler, ResamplingQuality};

/// Capacity of the scheduled-buffer queue. `schedule` blocks when the
/// render path is this far behind, which paces the decode loop.
const BUFFER_QUEUE_CAPACITY: usize = 8;

/// Commands sent to the audio thread
enum EngineCommand {
    /// Switch to a different output device (`None` selects the default)
    SetDevice(Option<String>),
    /// Rebuild the stream with a new sample rate or buffer size
    SetConfig {
        sample_rate: Option<u32>,
        buffer_size: Option<u32>,
    },
    /// Shutdown the audio thread
    Shutdown,
}

/// State shared between the control domain and the render callback
struct EngineShared {
    /// Volume (f32 bits, 0.0 to 1.0)
    volume: AtomicU32,
    /// Pan (f32 bits, -1.0 to 1.0)
    pan: AtomicU32,
    /// User pause
    paused: AtomicBool,
    /// Closed while the effects chain is being restructured
    render_gate: Arc<AtomicBool>,
    /// Whether an output stream is currently running
    stream_active: AtomicBool,
    /// Active device sample rate (Hz); 0 before the first stream is built
    device_sample_rate: AtomicU32,
    device_channels: AtomicU32,
    /// Requested fixed buffer size in frames; 0 means device default
    device_buffer_size: AtomicU32,
    graph: Mutex<EffectsGraph>,
    tap: Mutex<ObserverTap>,
}

/// Closes the render gate around structural chain mutations. The render
/// callback outputs silence while the gate is closed, so it never observes
/// a chain mid-mutation and never contends on a lock.
struct RenderGate(Arc<AtomicBool>);

impl GraphChangeListener for RenderGate {
    fn pre_change(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }

    fn post_change(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Desktop playback engine.
///
/// Owns the effects graph and a dedicated audio thread. Canonical buffers
/// are scheduled FIFO; the render callback pulls them, runs the active
/// effect units, applies volume and pan, and interleaves to the device.
pub struct PlaybackEngine {
    command_tx: Sender<EngineCommand>,
    buffer_tx: Sender<CanonicalBuffer>,
    /// Control-side handle on the queue, used to drain on stop
    buffer_rx: Receiver<CanonicalBuffer>,
    shared: Arc<EngineShared>,
    slot: ObserverSlot,
    resampler: Mutex<Option<Resampler>>,
    resampling_quality: ResamplingQuality,
    audio_thread: Option<JoinHandle<()>>,
}

impl PlaybackEngine {
    /// Create an engine on the system default output device.
    pub fn new() -> Result<Self> {
        Self::with_device(None)
    }

    /// Create an engine on a named output device.
    pub fn with_device(device_name: Option<&str>) -> Result<Self> {
        // Fail early if the device is missing; the audio thread re-resolves
        // it by name when building the stream.
        device::find_device_by_name(device_name)?;

        let render_gate = Arc::new(AtomicBool::new(false));
        let mut graph = EffectsGraph::new();
        graph.set_change_listener(Box::new(RenderGate(Arc::clone(&render_gate))));

        let shared = Arc::new(EngineShared {
            volume: AtomicU32::new(1.0f32.to_bits()),
            pan: AtomicU32::new(0.0f32.to_bits()),
            paused: AtomicBool::new(false),
            render_gate,
            stream_active: AtomicBool::new(false),
            device_sample_rate: AtomicU32::new(0),
            device_channels: AtomicU32::new(0),
            device_buffer_size: AtomicU32::new(0),
            graph: Mutex::new(graph),
            tap: Mutex::new(ObserverTap::new()),
        });

        let (command_tx, command_rx) = bounded::<EngineCommand>(32);
        let (buffer_tx, buffer_rx) = bounded::<CanonicalBuffer>(BUFFER_QUEUE_CAPACITY);

        let shared_clone = Arc::clone(&shared);
        let rx_clone = buffer_rx.clone();
        let initial = device_name.map(str::to_string);
        let audio_thread = thread::Builder::new()
            .name("aria-audio-output".to_string())
            .spawn(move || audio_thread_run(shared_clone, command_rx, rx_clone, initial))
            .map_err(|e| AudioOutputError::StreamBuildError(e.to_string()))?;

        Ok(Self {
            command_tx,
            buffer_tx,
            buffer_rx,
            shared,
            slot: ObserverSlot::new(),
            resampler: Mutex::new(None),
            resampling_quality: ResamplingQuality::default(),
            audio_thread: Some(audio_thread),
        })
    }

    /// Schedule a canonical buffer for rendering. Applies the time stretch
    /// unit (which changes the buffer length) and converts to the device
    /// sample rate before enqueueing. Blocks when the queue is full.
    pub fn schedule(&self, buffer: CanonicalBuffer) -> Result<()> {
        if buffer.is_empty() {
            return Ok(());
        }

        let buffer = {
            let mut graph = self.shared.graph.lock().unwrap();
            if graph.time_stretch.state.is_active() {
                graph.time_stretch.stretch(buffer)
            } else {
                buffer
            }
        };

        let device_rate = self.shared.device_sample_rate.load(Ordering::Relaxed);
        let buffer = if device_rate != 0 && buffer.sample_rate != device_rate {
            self.resample_to(buffer, device_rate)?
        } else {
            buffer
        };

        self.buffer_tx
            .send(buffer)
            .map_err(|_| AudioOutputError::EngineStopped)
    }

    /// Flush the resampler tail at the end of a track and schedule it.
    pub fn finish_track(&self) -> Result<()> {
        let tail = {
            let mut guard = self.resampler.lock().unwrap();
            match guard.take() {
                Some(mut resampler) => {
                    let rate = resampler.output_rate();
                    Some((resampler.flush()?, rate))
                }
                None => None,
            }
        };

        if let Some((planes, rate)) = tail {
            if planes.first().is_some_and(|p| !p.is_empty()) {
                self.buffer_tx
                    .send(CanonicalBuffer::new(planes, rate))
                    .map_err(|_| AudioOutputError::EngineStopped)?;
            }
        }

        Ok(())
    }

    /// Drop all scheduled buffers and reset the resampler.
    pub fn stop(&self) {
        while self.buffer_rx.try_recv().is_ok() {}
        *self.resampler.lock().unwrap() = None;
    }

    pub fn pause(&self) {
        self.shared.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.shared.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::SeqCst)
    }

    pub fn set_volume(&self, volume: f32) -> Result<()> {
        if !(0.0..=1.0).contains(&volume) {
            return Err(AudioOutputError::InvalidVolume(volume));
        }
        self.shared.volume.store(volume.to_bits(), Ordering::SeqCst);
        Ok(())
    }

    pub fn volume(&self) -> f32 {
        f32::from_bits(self.shared.volume.load(Ordering::SeqCst))
    }

    pub fn set_pan(&self, pan: f32) -> Result<()> {
        if !(-1.0..=1.0).contains(&pan) {
            return Err(AudioOutputError::InvalidPan(pan));
        }
        self.shared.pan.store(pan.to_bits(), Ordering::SeqCst);
        Ok(())
    }

    pub fn pan(&self) -> f32 {
        f32::from_bits(self.shared.pan.load(Ordering::SeqCst))
    }

    /// Enumerate output devices.
    pub fn output_devices(&self) -> Result<Vec<DeviceInfo>> {
        device::list_output_devices()
    }

    /// Switch the output device. The render path is torn down and rebuilt
    /// on the audio thread; the effects graph is untouched. Observers get a
    /// device-changed notification once the new stream is running.
    pub fn set_output_device(&self, name: Option<&str>) -> Result<()> {
        self.command_tx
            .send(EngineCommand::SetDevice(name.map(str::to_string)))
            .map_err(|_| AudioOutputError::EngineStopped)
    }

    /// Request a sample rate on the active device.
    pub fn set_device_sample_rate(&self, sample_rate: u32) -> Result<()> {
        self.command_tx
            .send(EngineCommand::SetConfig {
                sample_rate: Some(sample_rate),
                buffer_size: None,
            })
            .map_err(|_| AudioOutputError::EngineStopped)
    }

    /// Request a fixed buffer size on the active device.
    pub fn set_device_buffer_size(&self, buffer_size: u32) -> Result<()> {
        self.command_tx
            .send(EngineCommand::SetConfig {
                sample_rate: None,
                buffer_size: Some(buffer_size),
            })
            .map_err(|_| AudioOutputError::EngineStopped)
    }

    /// Sample rate of the active device (0 before the stream is up).
    pub fn device_sample_rate(&self) -> u32 {
        self.shared.device_sample_rate.load(Ordering::SeqCst)
    }

    /// Run `f` against the effects graph under its lock.
    pub fn with_graph<R>(&self, f: impl FnOnce(&mut EffectsGraph) -> R) -> R {
        let mut graph = self.shared.graph.lock().unwrap();
        f(&mut graph)
    }

    pub fn resampling_quality(&self) -> ResamplingQuality {
        self.resampling_quality
    }

    /// Set the resampling quality. Takes effect on the next rate change.
    pub fn set_resampling_quality(&mut self, quality: ResamplingQuality) {
        if quality != self.resampling_quality {
            self.resampling_quality = quality;
            *self.resampler.lock().unwrap() = None;
        }
    }

    /// Register a render observer, replacing any previous one. With no
    /// running output stream this is a silent no-op. The device is switched
    /// to the analysis buffer size while an observer is attached.
    pub fn register_render_observer(&mut self, observer: Box<dyn RenderObserver>) {
        if !self.shared.stream_active.load(Ordering::SeqCst) {
            debug!("render observer registration ignored: no output stream");
            return;
        }

        let channels = self.shared.device_channels.load(Ordering::SeqCst) as usize;
        let (tx, pool) = self.slot.install(observer, channels.max(1));
        {
            let mut tap = self.shared.tap.lock().unwrap();
            tap.tx = Some(tx);
            tap.pool = Some(pool);
            tap.enabled = true;
        }
        let _ = self.set_device_buffer_size(VISUALIZATION_ANALYSIS_BUFFER_SIZE);
    }

    /// Remove the registered observer and restore the default buffer size.
    pub fn remove_render_observer(&mut self) {
        {
            let mut tap = self.shared.tap.lock().unwrap();
            tap.tx = None;
            tap.pool = None;
            tap.enabled = false;
        }
        self.slot.clear();
        let _ = self.command_tx.send(EngineCommand::SetConfig {
            sample_rate: None,
            buffer_size: Some(0),
        });
    }

    /// Stop delivering post-render buffers. Device and sample rate
    /// notifications keep flowing.
    pub fn pause_render_observation(&self) {
        self.shared.tap.lock().unwrap().enabled = false;
    }

    pub fn resume_render_observation(&self) {
        self.shared.tap.lock().unwrap().enabled = true;
    }

    fn resample_to(&self, buffer: CanonicalBuffer, out_rate: u32) -> Result<CanonicalBuffer> {
        let mut guard = self.resampler.lock().unwrap();

        let needs_new = match guard.as_ref() {
            Some(r) => {
                r.input_rate() != buffer.sample_rate
                    || r.output_rate() != out_rate
                    || r.channels() != buffer.channel_count()
            }
            None => true,
        };
        if needs_new {
            *guard = Some(Resampler::new(
                buffer.sample_rate,
                out_rate,
                buffer.channel_count(),
                self.resampling_quality,
            )?);
        }
        let Some(resampler) = guard.as_mut() else {
            return Ok(buffer);
        };

        let planes = resampler.process(&buffer.planes)?;
        let mut out = CanonicalBuffer::new(planes, out_rate);
        out.start_seconds = buffer.start_seconds;
        Ok(out)
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        let _ = self.command_tx.send(EngineCommand::Shutdown);
        if let Some(handle) = self.audio_thread.take() {
            let _ = handle.join();
        }
        if let Ok(mut tap) = self.shared.tap.lock() {
            tap.tx = None;
            tap.enabled = false;
        }
        self.slot.clear();
    }
}

/// Audio thread main loop. Owns the cpal Stream for its whole lifetime.
fn audio_thread_run(
    shared: Arc<EngineShared>,
    command_rx: Receiver<EngineCommand>,
    buffer_rx: Receiver<CanonicalBuffer>,
    initial_device: Option<String>,
) {
    let mut device_name = initial_device;
    let mut sample_rate_override: Option<u32> = None;
    let mut buffer_size_override: Option<u32> = None;

    let mut stream = match build_stream(
        device_name.as_deref(),
        sample_rate_override,
        buffer_size_override,
        &shared,
        &buffer_rx,
    ) {
        Ok(s) => Some(s),
        Err(e) => {
            error!("failed to open output stream: {e}");
            None
        }
    };

    while let Ok(cmd) = command_rx.recv() {
        match cmd {
            EngineCommand::SetDevice(name) => {
                let old_rate = shared.device_sample_rate.load(Ordering::SeqCst);
                drop(stream.take());
                shared.stream_active.store(false, Ordering::SeqCst);
                device_name = name;
                // Rate and size overrides were per-device requests.
                sample_rate_override = None;
                buffer_size_override = None;

                match build_stream(
                    device_name.as_deref(),
                    sample_rate_override,
                    buffer_size_override,
                    &shared,
                    &buffer_rx,
                ) {
                    Ok(s) => {
                        stream = Some(s);
                        let new_rate = shared.device_sample_rate.load(Ordering::SeqCst);
                        let buffer_size =
                            shared.device_buffer_size.load(Ordering::SeqCst) as usize;
                        if let Ok(tap) = shared.tap.lock() {
                            tap.send(RenderEvent::DeviceChanged {
                                buffer_size,
                                sample_rate: new_rate,
                            });
                            if new_rate != old_rate {
                                tap.send(RenderEvent::SampleRateChanged {
                                    sample_rate: new_rate,
                                });
                            }
                        }
                    }
                    Err(e) => error!("failed to switch output device: {e}"),
                }
            }
            EngineCommand::SetConfig {
                sample_rate,
                buffer_size,
            } => {
                let old_rate = shared.device_sample_rate.load(Ordering::SeqCst);
                if let Some(rate) = sample_rate {
                    sample_rate_override = Some(rate);
                }
                if let Some(size) = buffer_size {
                    // Zero restores the device default.
                    buffer_size_override = (size != 0).then_some(size);
                }
                drop(stream.take());
                shared.stream_active.store(false, Ordering::SeqCst);

                match build_stream(
                    device_name.as_deref(),
                    sample_rate_override,
                    buffer_size_override,
                    &shared,
                    &buffer_rx,
                ) {
                    Ok(s) => {
                        stream = Some(s);
                        let new_rate = shared.device_sample_rate.load(Ordering::SeqCst);
                        if new_rate != old_rate {
                            if let Ok(tap) = shared.tap.lock() {
                                tap.send(RenderEvent::SampleRateChanged {
                                    sample_rate: new_rate,
                                });
                            }
                        }
                    }
                    Err(e) => error!("failed to reconfigure output stream: {e}"),
                }
            }
            EngineCommand::Shutdown => {
                drop(stream.take());
                break;
            }
        }
    }

    shared.stream_active.store(false, Ordering::SeqCst);
}

/// Build and start an output stream on the named device.
fn build_stream(
    device_name: Option<&str>,
    sample_rate_override: Option<u32>,
    buffer_size_override: Option<u32>,
    shared: &Arc<EngineShared>,
    buffer_rx: &Receiver<CanonicalBuffer>,
) -> Result<Stream> {
    let device = device::find_device_by_name(device_name)?;
    let default_config = device.default_output_config()?;

    let channels = default_config.channels();
    let sample_rate = sample_rate_override.unwrap_or(default_config.sample_rate());
    let config = StreamConfig {
        channels,
        sample_rate,
        buffer_size: buffer_size_override.map_or(BufferSize::Default, BufferSize::Fixed),
    };

    let shared_cb = Arc::clone(shared);
    let rx = buffer_rx.clone();
    let channel_count = channels as usize;

    // Build rate-dependent effect state here, in the control domain,
    // so the render callback never allocates for it.
    if let Ok(mut graph) = shared.graph.lock() {
        graph.prepare(channel_count, sample_rate);
    }

    let mut cursor: Option<(CanonicalBuffer, usize)> = None;
    let mut scratch: Vec<Vec<f32>> = Vec::new();

    let stream = device.build_output_stream(
        &config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            fill_output(data, channel_count, &shared_cb, &rx, &mut cursor, &mut scratch);
        },
        |err| error!("audio stream error: {err}"),
        None,
    )?;
    stream.play()?;

    shared
        .device_sample_rate
        .store(sample_rate, Ordering::SeqCst);
    shared
        .device_channels
        .store(u32::from(channels), Ordering::SeqCst);
    shared
        .device_buffer_size
        .store(buffer_size_override.unwrap_or(0), Ordering::SeqCst);
    shared.stream_active.store(true, Ordering::SeqCst);

    Ok(stream)
}

/// Per-channel gains for a pan position in [-1, 1]. Gains never exceed
/// unity; panning attenuates the far channel.
fn pan_gains(pan: f32) -> (f32, f32) {
    ((1.0 - pan).min(1.0), (1.0 + pan).min(1.0))
}

/// Render callback body. Pulls scheduled buffers FIFO, runs the effects
/// chain, applies volume and pan, and interleaves into `output`.
fn fill_output(
    output: &mut [f32],
    channels: usize,
    shared: &EngineShared,
    buffer_rx: &Receiver<CanonicalBuffer>,
    cursor: &mut Option<(CanonicalBuffer, usize)>,
    scratch: &mut Vec<Vec<f32>>,
) {
    output.fill(0.0);
    if channels == 0 {
        return;
    }
    if shared.paused.load(Ordering::Relaxed) || shared.render_gate.load(Ordering::Relaxed) {
        return;
    }

    // The control domain briefly holds the graph while editing it. Render
    // silence this cycle, leaving the queue intact for the next callback;
    // the dry signal must never reach the device.
    let Ok(mut graph) = shared.graph.try_lock() else {
        return;
    };

    let frames = output.len() / channels;
    if scratch.len() != channels {
        scratch.resize_with(channels, Vec::new);
    }
    for plane in scratch.iter_mut() {
        plane.clear();
        plane.resize(frames, 0.0);
    }

    // Pull scheduled buffers, preserving FIFO order across callbacks.
    let mut filled = 0;
    while filled < frames {
        if cursor.is_none() {
            match buffer_rx.try_recv() {
                Ok(buffer) => {
                    if buffer.is_empty() {
                        continue;
                    }
                    *cursor = Some((buffer, 0));
                }
                Err(_) => break,
            }
        }
        let Some((buffer, pos)) = cursor.as_mut() else {
            break;
        };

        let take = (buffer.frames() - *pos).min(frames - filled);
        for (ch, plane) in scratch.iter_mut().enumerate() {
            let src = &buffer.planes[ch.min(buffer.planes.len() - 1)];
            plane[filled..filled + take].copy_from_slice(&src[*pos..*pos + take]);
        }
        *pos += take;
        filled += take;
        if *pos >= buffer.frames() {
            *cursor = None;
        }
    }

    if filled == 0 {
        return;
    }

    let sample_rate = shared.device_sample_rate.load(Ordering::Relaxed);
    graph.process(scratch, sample_rate);

    let volume = f32::from_bits(shared.volume.load(Ordering::Relaxed));
    let pan = f32::from_bits(shared.pan.load(Ordering::Relaxed));
    let (left_gain, right_gain) = pan_gains(pan);
    for (ch, plane) in scratch.iter_mut().enumerate() {
        let gain = if channels >= 2 && ch == 0 {
            volume * left_gain
        } else if channels >= 2 && ch == 1 {
            volume * right_gain
        } else {
            volume
        };
        for sample in plane.iter_mut() {
            *sample *= gain;
        }
    }

    for frame_idx in 0..frames {
        for (ch, plane) in scratch.iter().enumerate() {
            output[frame_idx * channels + ch] = plane[frame_idx];
        }
    }

    // Hand the post-render buffer to the dispatch queue, through the
    // recycled pool. Never blocks, never allocates.
    if let Ok(tap) = shared.tap.try_lock() {
        tap.send_rendered(frames, scratch);
    }
}
