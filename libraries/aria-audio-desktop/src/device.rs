// aria-audio-desktop/src/device.rs
//
// Output device enumeration and selection

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::SupportedBufferSize;
use serde::{Deserialize, Serialize};

use aria_core::DevicePersistentState;

use crate::error::{AudioOutputError, Result};

/// Render buffer size requested while a visualization observer is attached.
/// Analysis windows (FFT) want a fixed power-of-two frame count.
pub const VISUALIZATION_ANALYSIS_BUFFER_SIZE: u32 = 2048;

/// Information about an audio output device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Device name (human-readable)
    pub name: String,

    /// Stable identifier for persistence. The host API exposes no separate
    /// unique id, so this is derived from the name.
    pub uid: String,

    /// Is this the system default output device?
    pub is_default: bool,

    /// Native sample rate (Hz)
    pub sample_rate: u32,

    /// Number of output channels
    pub channels: u16,

    /// Supported sample rates (min, max)
    pub sample_rate_range: Option<(u32, u32)>,

    /// Supported buffer sizes in frames (min, max)
    pub buffer_size_range: Option<(u32, u32)>,
}

impl DeviceInfo {
    /// Value to remember across launches for best-effort re-selection.
    pub fn persistent_state(&self) -> DevicePersistentState {
        DevicePersistentState {
            name: self.name.clone(),
            uid: self.uid.clone(),
        }
    }
}

/// Enumerate all output devices on the default host
pub fn list_output_devices() -> Result<Vec<DeviceInfo>> {
    let host = cpal::default_host();

    let default_device = host.default_output_device();
    let default_name = default_device.as_ref().and_then(|d| d.name().ok());

    let devices = host.output_devices()?;

    let mut device_list = Vec::new();

    for device in devices {
        if let Ok(name) = device.name() {
            if let Ok(config) = device.default_output_config() {
                let is_default = Some(&name) == default_name.as_ref();
                device_list.push(describe(&device, name, is_default, &config));
            }
        }
    }

    sort_devices(&mut device_list);

    Ok(device_list)
}

/// Get information about the system default output device
pub fn default_output_device() -> Result<DeviceInfo> {
    let host = cpal::default_host();

    let device = host
        .default_output_device()
        .ok_or(AudioOutputError::DeviceNotFound)?;

    let name = device
        .name()
        .map_err(|e| AudioOutputError::DeviceInfoFailed(e.to_string()))?;

    let config = device.default_output_config()?;

    Ok(describe(&device, name, true, &config))
}

/// Resolve a device handle by name; `None` selects the system default.
pub(crate) fn find_device_by_name(name: Option<&str>) -> Result<cpal::Device> {
    let host = cpal::default_host();

    let Some(name) = name else {
        return host
            .default_output_device()
            .ok_or(AudioOutputError::DeviceNotFound);
    };

    for device in host.output_devices()? {
        if device.name().is_ok_and(|n| n == name) {
            return Ok(device);
        }
    }

    Err(AudioOutputError::NamedDeviceNotFound(name.to_string()))
}

/// Match a remembered device against the current device list. Tries the
/// unique id first, then falls back to the name. Returns `None` when the
/// device is gone; callers should fall back to the system default.
pub fn match_remembered<'a>(
    devices: &'a [DeviceInfo],
    remembered: &DevicePersistentState,
) -> Option<&'a DeviceInfo> {
    devices
        .iter()
        .find(|d| d.uid == remembered.uid)
        .or_else(|| devices.iter().find(|d| d.name == remembered.name))
}

fn describe(
    device: &cpal::Device,
    name: String,
    is_default: bool,
    config: &cpal::SupportedStreamConfig,
) -> DeviceInfo {
    let sample_rate = config.sample_rate();
    let channels = config.channels();

    let buffer_size_range = match config.buffer_size() {
        SupportedBufferSize::Range { min, max } => Some((*min, *max)),
        SupportedBufferSize::Unknown => None,
    };

    let sample_rate_range = device
        .supported_output_configs()
        .ok()
        .and_then(|mut configs| {
            configs
                .next()
                .map(|c| (c.min_sample_rate(), c.max_sample_rate()))
        });

    DeviceInfo {
        uid: name.clone(),
        name,
        is_default,
        sample_rate,
        channels,
        sample_rate_range,
        buffer_size_range,
    }
}

/// Sort: default first, then alphabetically
fn sort_devices(devices: &mut [DeviceInfo]) {
    devices.sort_by(|a, b| match (a.is_default, b.is_default) {
        (true, false) => std::cmp::Ordering::Less,
        (false, true) => std::cmp::Ordering::Greater,
        _ => a.name.cmp(&b.name),
    });
}
