//! Output device enumeration and lookup
//!
//! Devices are listed from every available cpal host so a name from the
//! config file can be matched regardless of backend.

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::HostId;

use super::error::{AudioError, AudioResult};

/// Sample rates reported to users when a device supports a range
const COMMON_SAMPLE_RATES: [u32; 4] = [44100, 48000, 88200, 96000];

/// An output device as shown to users
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDevice {
    /// Device name, used as `output_device` in the config
    pub name: String,
    /// Host backend name (e.g. "ALSA", "CoreAudio")
    pub host: String,
    /// Whether this is its host's default device
    pub is_default: bool,
    /// Common sample rates the device supports
    pub sample_rates: Vec<u32>,
}

impl std::fmt::Display for OutputDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.host, self.name)?;
        if self.is_default {
            write!(f, " (default)")?;
        }
        Ok(())
    }
}

fn host_name(host_id: HostId) -> String {
    let name = format!("{:?}", host_id);
    match name.as_str() {
        "Alsa" => "ALSA".to_string(),
        "Jack" => "JACK".to_string(),
        "Wasapi" => "WASAPI".to_string(),
        _ => name,
    }
}

/// List output devices from all hosts, defaults first
pub fn list_output_devices() -> AudioResult<Vec<OutputDevice>> {
    let mut devices = Vec::new();

    for host_id in cpal::available_hosts() {
        let host = match cpal::host_from_id(host_id) {
            Ok(h) => h,
            Err(e) => {
                log::debug!("Could not initialize host {:?}: {}", host_id, e);
                continue;
            }
        };
        let host_label = host_name(host_id);
        let default_name = host.default_output_device().and_then(|d| d.name().ok());

        let outputs = match host.output_devices() {
            Ok(d) => d,
            Err(e) => {
                log::debug!("Could not enumerate devices for {:?}: {}", host_id, e);
                continue;
            }
        };

        for device in outputs {
            let Ok(name) = device.name() else { continue };
            let Ok(configs) = device.supported_output_configs() else { continue };

            let mut sample_rates = Vec::new();
            for config in configs {
                for rate in COMMON_SAMPLE_RATES {
                    if (config.min_sample_rate().0..=config.max_sample_rate().0).contains(&rate)
                        && !sample_rates.contains(&rate)
                    {
                        sample_rates.push(rate);
                    }
                }
            }
            sample_rates.sort_unstable();

            devices.push(OutputDevice {
                is_default: default_name.as_ref() == Some(&name),
                name,
                host: host_label.clone(),
                sample_rates,
            });
        }
    }

    if devices.is_empty() {
        return Err(AudioError::NoDevices);
    }

    devices.sort_by(|a, b| {
        b.is_default
            .cmp(&a.is_default)
            .then_with(|| a.host.cmp(&b.host))
            .then_with(|| a.name.cmp(&b.name))
    });
    log::debug!("Enumerated {} output devices", devices.len());
    Ok(devices)
}

/// Find an output device by name, or the default device for `None`
pub fn find_output_device(name: Option<&str>) -> AudioResult<cpal::Device> {
    let Some(name) = name else {
        return cpal::default_host()
            .default_output_device()
            .ok_or_else(|| AudioError::NoDefaultDevice("No default output device".to_string()));
    };

    for host_id in cpal::available_hosts() {
        let Ok(host) = cpal::host_from_id(host_id) else { continue };
        let Ok(mut outputs) = host.output_devices() else { continue };
        if let Some(device) = outputs.find(|d| d.name().ok().as_deref() == Some(name)) {
            return Ok(device);
        }
    }

    Err(AudioError::DeviceNotFound(name.to_string()))
}
