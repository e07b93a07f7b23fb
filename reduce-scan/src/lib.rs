//! Host and device implementations of sum-reduction and inclusive scan,
//! plus the timing model used to compare them.

use thiserror::Error;

pub mod config;
pub mod device;
pub mod host;
pub mod kernels;
pub mod sample;
pub mod timing;
pub mod verify;

pub use config::Config;
pub use device::{DeviceContext, DeviceJob};
pub use kernels::{Algorithm, Kernel, GROUP_SIZE};
pub use timing::{Bandwidth, TimingSample};

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unable to find a compute platform")]
    NoPlatform,

    #[error("No GPU device available on platform {platform}")]
    NoGpuDevice { platform: String },

    #[error("Kernel compilation failed: {0}")]
    Compile(String),

    /// Any other failure reported by the compute backend.
    #[error(
        "Device error in {op}: {message}\n\
         See the wgpu error reference to understand what it means:\n\
         https://docs.rs/wgpu/0.20/wgpu/enum.Error.html"
    )]
    Device { op: &'static str, message: String },

    #[error("Invalid value at index {index}: {observed}, expected: {expected}")]
    Mismatch {
        index: usize,
        observed: f32,
        expected: f32,
    },

    #[error("Result length {observed} does not match expected length {expected}")]
    LengthMismatch { observed: usize, expected: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Output error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
