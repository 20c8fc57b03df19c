use cpal::traits::{DeviceTrait, HostTrait};
use cpal::Device;

fn get_host() -> cpal::Host {
    cpal::default_host()
}

/// Finds the input device with the given name, or the host default.
pub fn get_or_default_input(device_name: Option<String>) -> anyhow::Result<Device> {
    let host = get_host();
    tracing::debug!("Host: {:?}", host.id());

    let target = match device_name {
        Some(name) => name,
        None => {
            return host
                .default_input_device()
                .ok_or_else(|| anyhow::anyhow!("No default input device"));
        }
    };

    for device in host.input_devices()? {
        if device.name().is_ok_and(|name| name == target) {
            return Ok(device);
        }
    }
    Err(anyhow::anyhow!("No input device named {:?}", target))
}

/// Finds the output device with the given name, or the host default.
pub fn get_or_default_output(device_name: Option<String>) -> anyhow::Result<Device> {
    let host = get_host();

    let target = match device_name {
        Some(name) => name,
        None => {
            return host
                .default_output_device()
                .ok_or_else(|| anyhow::anyhow!("No default output device"));
        }
    };

    for device in host.output_devices()? {
        if device.name().is_ok_and(|name| name == target) {
            return Ok(device);
        }
    }
    Err(anyhow::anyhow!("No output device named {:?}", target))
}

/// Lists input devices with their default configs, one per line.
pub fn list_inputs() -> anyhow::Result<String> {
    let host = get_host();
    let default_name = host
        .default_input_device()
        .and_then(|d| d.name().ok())
        .unwrap_or_default();

    let mut lines: Vec<String> = Vec::new();
    for device in host.input_devices()? {
        let name = device.name()?;
        let config = device.default_input_config()?;
        let mut line = format!(" * {}({}ch, {}hz)", name, config.channels(), config.sample_rate().0);
        if name == default_name {
            line.push_str(" [default]");
        }
        lines.push(line);
    }
    Ok(lines.join("\n"))
}

/// Lists output devices with their default configs, one per line.
pub fn list_outputs() -> anyhow::Result<String> {
    let host = get_host();
    let default_name = host
        .default_output_device()
        .and_then(|d| d.name().ok())
        .unwrap_or_default();

    let mut lines: Vec<String> = Vec::new();
    for device in host.output_devices()? {
        let name = device.name()?;
        let config = device.default_output_config()?;
        let mut line = format!(" * {}({}ch, {}hz)", name, config.channels(), config.sample_rate().0);
        if name == default_name {
            line.push_str(" [default]");
        }
        lines.push(line);
    }
    Ok(lines.join("\n"))
}
