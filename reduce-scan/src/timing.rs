//! Timestamps, phase breakdowns and the bandwidth traffic model.

use std::time::Duration;

use serde::Serialize;

pub use quanta::Instant;

/// Elements counted per input element: two reads and one write.
pub const TRAFFIC_FACTOR: usize = 3;

pub fn now() -> Instant {
    Instant::now()
}

/// Bytes charged to an algorithm over `n` elements, independent of what
/// was actually transferred.
pub fn traffic_bytes(n: usize) -> usize {
    TRAFFIC_FACTOR * n * std::mem::size_of::<f32>()
}

/// GB/s for `n` elements over `elapsed`, measured at microsecond
/// resolution. Zero when the interval is under one microsecond.
pub fn bandwidth(n: usize, elapsed: Duration) -> f64 {
    let us = elapsed.as_micros();
    if us == 0 {
        return 0.0;
    }
    (traffic_bytes(n) as f64 * 1e-9) / (us as f64 * 1e-6)
}

/// Per-phase durations of one benchmark.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TimingSample {
    pub host: Duration,
    pub device_total: Duration,
    pub device_copy_in: Duration,
    pub device_kernel: Duration,
    pub device_copy_out: Duration,
}

impl TimingSample {
    /// Phases from the five timestamps taken around a benchmark:
    /// host run `t0..t1`, copy-in `t1..t2`, kernel `t2..t3`, copy-out `t3..t4`.
    pub fn from_timestamps([t0, t1, t2, t3, t4]: [Instant; 5]) -> Self {
        Self {
            host: t1.duration_since(t0),
            device_total: t4.duration_since(t1),
            device_copy_in: t2.duration_since(t1),
            device_kernel: t3.duration_since(t2),
            device_copy_out: t4.duration_since(t3),
        }
    }

    /// Column order of the printed table.
    pub fn columns(&self) -> [Duration; 5] {
        [
            self.host,
            self.device_total,
            self.device_copy_in,
            self.device_kernel,
            self.device_copy_out,
        ]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Bandwidth {
    pub host_gbps: f64,
    pub device_gbps: f64,
}

impl Bandwidth {
    /// Host bandwidth over the host phase, device bandwidth over the kernel phase.
    pub fn for_sample(n: usize, sample: &TimingSample) -> Self {
        Self {
            host_gbps: bandwidth(n, sample.host),
            device_gbps: bandwidth(n, sample.device_kernel),
        }
    }
}
