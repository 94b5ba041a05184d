use cpal::traits::{DeviceTrait, HostTrait};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInfo {
    pub id: cpal::HostId,
    pub name: String,
    pub is_default: bool,
}

impl fmt::Display for HostInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, if self.is_default { "default" } else { "available" })
    }
}

/// Capabilities of one output device, flattened across its supported ranges.
#[derive(Clone, Debug)]
pub struct DeviceInfo {
    pub name: String,
    pub host_id: cpal::HostId,
    pub is_default: bool,

    pub supported_sample_rates: Vec<u32>,
    pub min_sample_rate: u32,
    pub max_sample_rate: u32,
    pub default_sample_rate: u32,

    pub supported_channels: Vec<u16>,
    pub max_channels: u16,
    pub default_channels: u16,

    pub supported_sample_formats: Vec<cpal::SampleFormat>,
    pub default_sample_format: cpal::SampleFormat,

    /// Smallest and largest buffer the device reports, if it reports one.
    pub buffer_size_range: Option<(u32, u32)>,

    pub(crate) device_index: usize,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}ch @ {}Hz{}]",
            self.name,
            self.default_channels,
            self.default_sample_rate,
            if self.is_default { " (default)" } else { "" }
        )
    }
}

pub type EnumResult<T> = Result<T, EnumError>;

#[derive(Debug)]
pub enum EnumError {
    NoDevicesFound,
    DeviceNotFound(String),
    QueryFailed(String),
    InvalidDeviceIndex(usize),
}

impl fmt::Display for EnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoDevicesFound => write!(f, "No audio output devices found"),
            Self::DeviceNotFound(name) => write!(f, "Device not found: {}", name),
            Self::QueryFailed(msg) => write!(f, "Device query failed: {}", msg),
            Self::InvalidDeviceIndex(idx) => write!(f, "Invalid device index: {}", idx),
        }
    }
}

impl std::error::Error for EnumError {}

const COMMON_RATES: [u32; 11] = [
    8000, 11025, 16000, 22050, 32000, 44100, 48000, 88200, 96000, 176400, 192000,
];

/// Output devices of every host cpal was compiled with.
pub struct DeviceEnumerator {
    devices: Vec<(cpal::Device, DeviceInfo)>,
}

impl DeviceEnumerator {
    pub fn new() -> EnumResult<Self> {
        let hosts = Self::enumerate_hosts();
        let devices = Self::scan_output_devices(&hosts)?;
        Ok(Self { devices })
    }

    pub fn enumerate_hosts() -> Vec<HostInfo> {
        let default_host_id = cpal::default_host().id();
        cpal::available_hosts()
            .into_iter()
            .map(|id| HostInfo {
                id,
                name: id.name().to_string(),
                is_default: id == default_host_id,
            })
            .collect()
    }

    fn scan_output_devices(hosts: &[HostInfo]) -> EnumResult<Vec<(cpal::Device, DeviceInfo)>> {
        let mut all_devices = Vec::new();

        for host_info in hosts {
            let Ok(host) = cpal::host_from_id(host_info.id) else {
                continue;
            };
            let default_name = host.default_output_device().and_then(|d| d.name().ok());

            let Ok(devices) = host.output_devices() else {
                continue;
            };
            for device in devices {
                let is_default = host_info.is_default
                    && default_name.is_some()
                    && device.name().ok() == default_name;

                if let Ok(info) = Self::query_device_info(&device, host_info.id, is_default, all_devices.len()) {
                    all_devices.push((device, info));
                }
            }
        }

        if all_devices.is_empty() {
            return Err(EnumError::NoDevicesFound);
        }
        Ok(all_devices)
    }

    fn query_device_info(
        device: &cpal::Device,
        host_id: cpal::HostId,
        is_default: bool,
        device_index: usize,
    ) -> EnumResult<DeviceInfo> {
        let name = device
            .name()
            .map_err(|e| EnumError::QueryFailed(format!("Failed to get device name: {}", e)))?;

        let default_config = device
            .default_output_config()
            .map_err(|e| EnumError::QueryFailed(format!("Failed to get default config: {}", e)))?;

        let configs = device
            .supported_output_configs()
            .map_err(|e| EnumError::QueryFailed(format!("Failed to get supported configs: {}", e)))?;

        let mut sample_rates = BTreeSet::new();
        let mut min_sample_rate = u32::MAX;
        let mut max_sample_rate = 0u32;
        let mut channels = BTreeSet::new();
        let mut sample_formats = Vec::new();
        let mut buffer_size_range: Option<(u32, u32)> = None;

        for range in configs {
            let min_sr = range.min_sample_rate().0;
            let max_sr = range.max_sample_rate().0;
            min_sample_rate = min_sample_rate.min(min_sr);
            max_sample_rate = max_sample_rate.max(max_sr);
            sample_rates.extend(COMMON_RATES.iter().copied().filter(|r| (min_sr..=max_sr).contains(r)));

            channels.insert(range.channels());

            let format = range.sample_format();
            if !sample_formats.contains(&format) {
                sample_formats.push(format);
            }

            if let cpal::SupportedBufferSize::Range { min, max } = range.buffer_size() {
                buffer_size_range = Some(match buffer_size_range {
                    Some((lo, hi)) => (lo.min(*min), hi.max(*max)),
                    None => (*min, *max),
                });
            }
        }

        if max_sample_rate == 0 {
            return Err(EnumError::QueryFailed(format!("{} reports no output configurations", name)));
        }

        let supported_channels: Vec<u16> = channels.into_iter().collect();
        let max_channels = supported_channels.last().copied().unwrap_or(0);

        Ok(DeviceInfo {
            name,
            host_id,
            is_default,
            supported_sample_rates: sample_rates.into_iter().collect(),
            min_sample_rate,
            max_sample_rate,
            default_sample_rate: default_config.sample_rate().0,
            supported_channels,
            max_channels,
            default_channels: default_config.channels(),
            supported_sample_formats: sample_formats,
            default_sample_format: default_config.sample_format(),
            buffer_size_range,
            device_index,
        })
    }

    pub fn output_devices(&self) -> Vec<&DeviceInfo> {
        self.devices.iter().map(|(_, info)| info).collect()
    }

    /// The default host's default output device, else the first one found.
    pub fn default_output_device(&self) -> EnumResult<&DeviceInfo> {
        let mut infos = self.devices.iter().map(|(_, info)| info);
        infos
            .clone()
            .find(|info| info.is_default)
            .or_else(|| infos.next())
            .ok_or(EnumError::NoDevicesFound)
    }

    /// Find a device by name (case-insensitive, exact match first, then partial)
    pub fn find_device_by_name(&self, name: &str) -> EnumResult<&DeviceInfo> {
        find_by_name(self.devices.iter().map(|(_, info)| info), name)
    }

    /// Select a device and return the actual cpal device handle
    pub fn select_device(&self, device_info: &DeviceInfo) -> EnumResult<&cpal::Device> {
        self.devices
            .iter()
            .find(|(_, info)| info.device_index == device_info.device_index)
            .map(|(device, _)| device)
            .ok_or(EnumError::InvalidDeviceIndex(device_info.device_index))
    }
}

pub(crate) fn find_by_name<'a>(
    mut devices: impl Iterator<Item = &'a DeviceInfo> + Clone,
    name: &str,
) -> EnumResult<&'a DeviceInfo> {
    let name_lower = name.to_lowercase();
    devices
        .clone()
        .find(|info| info.name.to_lowercase() == name_lower)
        .or_else(|| devices.find(|info| info.name.to_lowercase().contains(&name_lower)))
        .ok_or_else(|| EnumError::DeviceNotFound(name.to_string()))
}

#[cfg(test)]
pub(crate) fn test_device(name: &str) -> DeviceInfo {
    DeviceInfo {
        name: name.to_string(),
        host_id: cpal::default_host().id(),
        is_default: false,
        supported_sample_rates: vec![44100, 48000, 96000],
        min_sample_rate: 44100,
        max_sample_rate: 96000,
        default_sample_rate: 48000,
        supported_channels: vec![2, 6],
        max_channels: 6,
        default_channels: 2,
        supported_sample_formats: vec![cpal::SampleFormat::F32, cpal::SampleFormat::I16],
        default_sample_format: cpal::SampleFormat::F32,
        buffer_size_range: Some((64, 2048)),
        device_index: 0,
    }
}
