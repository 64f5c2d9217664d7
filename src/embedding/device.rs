//! Device selection (CPU / Metal / CUDA).

use candle_core::Device;
use tracing::debug;
#[cfg(any(feature = "metal", feature = "cuda"))]
use tracing::warn;

/// Picks the compute device for the embedder.
///
/// GPU backends are tried only when their feature is compiled in; any
/// failure degrades to CPU, which always works. Embedding a single short
/// prompt is cheap enough that CPU is an acceptable floor.
pub fn select_device() -> Device {
    #[cfg(feature = "metal")]
    match Device::new_metal(0) {
        Ok(device) => {
            debug!("embedder on Metal");
            return device;
        }
        Err(e) => warn!(error = %e, "Metal unavailable, falling back"),
    }

    #[cfg(feature = "cuda")]
    match Device::new_cuda(0) {
        Ok(device) => {
            debug!("embedder on CUDA");
            return device;
        }
        Err(e) => warn!(error = %e, "CUDA unavailable, falling back"),
    }

    debug!("embedder on CPU");
    Device::Cpu
}
