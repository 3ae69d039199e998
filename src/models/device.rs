use candle_core::Device;
use tracing::{debug, info, warn};

type Backend = (&'static str, fn() -> candle_core::Result<Device>);

/// GPU backends compiled into this build, in order of preference.
const BACKENDS: &[Backend] = &[
    #[cfg(feature = "metal")]
    ("metal", metal),
    #[cfg(feature = "cuda")]
    ("cuda", cuda),
];

#[cfg(feature = "metal")]
fn metal() -> candle_core::Result<Device> {
    Device::new_metal(0)
}

#[cfg(feature = "cuda")]
fn cuda() -> candle_core::Result<Device> {
    Device::new_cuda(0)
}

/// Training device: the first compiled GPU backend that initializes, else CPU.
pub fn select_device() -> Device {
    for (backend, open) in BACKENDS {
        match open() {
            Ok(device) => {
                info!(backend, "Training on GPU");
                return device;
            }
            Err(e) => warn!(backend, error = %e, "GPU backend unavailable"),
        }
    }

    if BACKENDS.is_empty() {
        debug!("No GPU backend compiled, training on CPU");
    } else {
        warn!("Falling back to CPU device");
    }
    Device::Cpu
}
