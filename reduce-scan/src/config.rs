use std::path::PathBuf;

use wgpu::Backends;

use crate::{Error, Result};

/// Elements per benchmark in the default run (10 * 1024 * 1024).
pub const DEFAULT_N: usize = 10 * 1024 * 1024;
pub const DEFAULT_SEED: u64 = 42;

pub const ENV_N: &str = "REDUCE_SCAN_N";
pub const ENV_SEED: &str = "REDUCE_SCAN_SEED";
pub const ENV_JSON: &str = "REDUCE_SCAN_JSON";
pub const ENV_BACKEND: &str = "WGPU_BACKEND";

#[derive(Debug, Clone)]
pub struct Config {
    pub n: usize,
    pub seed: u64,
    /// Optional path of a JSON report written after the table.
    pub json: Option<PathBuf>,
    pub backends: Backends,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            n: DEFAULT_N,
            seed: DEFAULT_SEED,
            json: None,
            backends: Backends::all(),
        }
    }
}

impl Config {
    /// Defaults overridden by `REDUCE_SCAN_*` and `WGPU_BACKEND`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_N) {
            config.n = raw.trim().parse().map_err(|_| {
                Error::InvalidConfig(format!("{ENV_N} must be a positive integer, got {raw:?}"))
            })?;
        }
        if let Some(raw) = lookup(ENV_SEED) {
            config.seed = raw.trim().parse().map_err(|_| {
                Error::InvalidConfig(format!("{ENV_SEED} must be an unsigned integer, got {raw:?}"))
            })?;
        }
        if let Some(raw) = lookup(ENV_JSON) {
            if !raw.is_empty() {
                config.json = Some(PathBuf::from(raw));
            }
        }
        if let Some(raw) = lookup(ENV_BACKEND) {
            config.backends = wgpu::util::parse_backends_from_comma_list(&raw);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validate_len(self.n)?;

        if self.backends.is_empty() {
            return Err(Error::InvalidConfig(format!(
                "{ENV_BACKEND} does not name any known backend"
            )));
        }

        Ok(())
    }
}

/// Kernels index elements with 32-bit integers.
pub(crate) fn validate_len(n: usize) -> Result<()> {
    if n == 0 {
        return Err(Error::InvalidConfig("element count must be non-zero".into()));
    }
    if n > u32::MAX as usize {
        return Err(Error::InvalidConfig(format!(
            "element count {n} exceeds the 32-bit kernel index range"
        )));
    }
    Ok(())
}
