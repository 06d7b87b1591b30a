//! CPAL device lookup
//!
//! Devices are addressed by their display name; `None` means the host's
//! default device for that direction.

use cpal::traits::{DeviceTrait, HostTrait};
use std::fmt;
use tracing::{debug, info};
use trieq_core::domain::audio::{AudioError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Input => write!(f, "input"),
            Direction::Output => write!(f, "output"),
        }
    }
}

#[allow(deprecated)]
fn device_name(device: &cpal::Device) -> String {
    device
        .name()
        .unwrap_or_else(|_| "Unknown Device".to_string())
}

fn devices_for(host: &cpal::Host, direction: Direction) -> Result<Vec<cpal::Device>> {
    let devices: Vec<cpal::Device> = match direction {
        Direction::Input => host
            .input_devices()
            .map_err(|e| AudioError::OsError(e.to_string()))?
            .collect(),
        Direction::Output => host
            .output_devices()
            .map_err(|e| AudioError::OsError(e.to_string()))?
            .collect(),
    };
    Ok(devices)
}

/// Resolve a device by name, or the default device when `name` is `None`
pub fn find_device(host: &cpal::Host, direction: Direction, name: Option<&str>) -> Result<cpal::Device> {
    let device = match name {
        Some(name) => devices_for(host, direction)?
            .into_iter()
            .find(|d| device_name(d) == name)
            .ok_or_else(|| AudioError::DeviceNotFound(name.to_string()))?,
        None => match direction {
            Direction::Input => host.default_input_device(),
            Direction::Output => host.default_output_device(),
        }
        .ok_or_else(|| AudioError::DeviceNotFound(format!("No default {direction} device")))?,
    };

    debug!(%direction, name = %device_name(&device), "Resolved audio device");
    Ok(device)
}

/// Names of every device usable in `direction` on the default host
pub fn device_names(direction: Direction) -> Result<Vec<String>> {
    let host = cpal::default_host();
    debug!("Using audio host: {:?}", host.id());

    let names: Vec<String> = devices_for(&host, direction)?
        .iter()
        .map(device_name)
        .collect();

    info!(%direction, count = names.len(), "Enumerated audio devices");
    Ok(names)
}

pub(crate) fn name_of(device: &cpal::Device) -> String {
    device_name(device)
}
