use cpal::traits::{DeviceTrait, HostTrait};
use cpal::Device;

fn get_host() -> cpal::Host {
    cpal::default_host()
}

/// Resolve an input device by name, or fall back to the host default.
pub fn get_or_default_input(device_name: Option<String>) -> anyhow::Result<Device> {
    let host = get_host();
    tracing::debug!("Host: {:?}", host.id());

    let Some(target) = device_name else {
        return host
            .default_input_device()
            .ok_or_else(|| anyhow::anyhow!("no default input device"));
    };

    let mut input_devices = host.input_devices()?;
    input_devices
        .find(|d| d.name().is_ok_and(|name| name == target))
        .ok_or_else(|| anyhow::anyhow!("no input device named {target:?}"))
}

/// Resolve an output device by name, or fall back to the host default.
pub fn get_or_default_output(device_name: Option<String>) -> anyhow::Result<Device> {
    let host = get_host();

    let Some(target) = device_name else {
        return host
            .default_output_device()
            .ok_or_else(|| anyhow::anyhow!("no default output device"));
    };

    let mut output_devices = host.output_devices()?;
    output_devices
        .find(|d| d.name().is_ok_and(|name| name == target))
        .ok_or_else(|| anyhow::anyhow!("no output device named {target:?}"))
}

/// One line per input device, with channel count and sample rate.
pub fn list_inputs() -> anyhow::Result<String> {
    let host = get_host();
    let default_name = host
        .default_input_device()
        .and_then(|d| d.name().ok())
        .unwrap_or_default();

    let mut lines: Vec<String> = Vec::new();
    for device in host.input_devices()? {
        let name = device.name()?;
        let cfg = device.default_input_config()?;
        let mut line = format!(" * {}({}ch, {}hz)", name, cfg.channels(), cfg.sample_rate().0);
        if name == default_name {
            line.push_str(" [default]");
        }
        lines.push(line);
    }
    Ok(lines.join("\n"))
}

/// One line per output device, with channel count and sample rate.
pub fn list_outputs() -> anyhow::Result<String> {
    let host = get_host();
    let default_name = host
        .default_output_device()
        .and_then(|d| d.name().ok())
        .unwrap_or_default();

    let mut lines: Vec<String> = Vec::new();
    for device in host.output_devices()? {
        let name = device.name()?;
        let cfg = device.default_output_config()?;
        let mut line = format!(" * {}({}ch, {}hz)", name, cfg.channels(), cfg.sample_rate().0);
        if name == default_name {
            line.push_str(" [default]");
        }
        lines.push(line);
    }
    Ok(lines.join("\n"))
}
