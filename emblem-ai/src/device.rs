//! Where the estimator runs.
//!
//! The network is a few thousand weights, so CPU is the default. A GPU is
//! only worth asking for when scoring large offline batches; any GPU that
//! fails to open falls back to CPU rather than failing the run.

use candle_core::Device;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DevicePreference {
    #[default]
    CpuOnly,
    /// First CUDA device, then Metal (with the `metal` feature), then CPU.
    GpuPreferred,
    Cuda(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown device '{0}' (expected cpu, gpu or cuda:N)")]
pub struct UnknownDevice(String);

impl FromStr for DevicePreference {
    type Err = UnknownDevice;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" => Ok(Self::CpuOnly),
            "gpu" | "auto" => Ok(Self::GpuPreferred),
            "cuda" => Ok(Self::Cuda(0)),
            other => other
                .strip_prefix("cuda:")
                .and_then(|n| n.parse().ok())
                .map(Self::Cuda)
                .ok_or_else(|| UnknownDevice(s.to_string())),
        }
    }
}

impl fmt::Display for DevicePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CpuOnly => write!(f, "cpu"),
            Self::GpuPreferred => write!(f, "gpu"),
            Self::Cuda(n) => write!(f, "cuda:{}", n),
        }
    }
}

fn cuda_or_cpu(ordinal: usize) -> Device {
    match Device::new_cuda(ordinal) {
        Ok(device) => device,
        Err(e) => {
            log::warn!("CUDA:{} unavailable ({}), scoring on CPU", ordinal, e);
            Device::Cpu
        }
    }
}

/// Open the device for `pref`. Never fails: CPU is the last resort.
pub fn select_device(pref: DevicePreference) -> Device {
    let device = match pref {
        DevicePreference::CpuOnly => Device::Cpu,
        DevicePreference::Cuda(ordinal) => cuda_or_cpu(ordinal),
        DevicePreference::GpuPreferred => match Device::new_cuda(0) {
            Ok(device) => device,
            #[cfg(feature = "metal")]
            Err(_) => Device::new_metal(0).unwrap_or(Device::Cpu),
            #[cfg(not(feature = "metal"))]
            Err(_) => Device::Cpu,
        },
    };
    log::debug!("Estimator device for '{}': {}", pref, device_info(&device));
    device
}

pub fn device_info(device: &Device) -> &'static str {
    match device {
        Device::Cpu => "CPU",
        Device::Cuda(_) => "CUDA",
        Device::Metal(_) => "Metal",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_preferences() {
        assert_eq!("cpu".parse(), Ok(DevicePreference::CpuOnly));
        assert_eq!("GPU".parse(), Ok(DevicePreference::GpuPreferred));
        assert_eq!("cuda".parse(), Ok(DevicePreference::Cuda(0)));
        assert_eq!("cuda:2".parse(), Ok(DevicePreference::Cuda(2)));
        assert!("cuda:x".parse::<DevicePreference>().is_err());
        assert!("tpu".parse::<DevicePreference>().is_err());
        assert_eq!(DevicePreference::Cuda(1).to_string(), "cuda:1");
    }

    #[test]
    fn test_cpu_only_returns_cpu() {
        let device = select_device(DevicePreference::CpuOnly);
        assert!(matches!(device, Device::Cpu));
        assert_eq!(device_info(&device), "CPU");
    }

    #[test]
    fn test_gpu_preferred_falls_back() {
        let device = select_device(DevicePreference::GpuPreferred);
        assert!(!device_info(&device).is_empty());
    }
}
