//! Agreement checks between host and device results.

use tracing::debug;

use crate::{Error, Result};

/// Absolute tolerance for summation results. Covers the accumulation error
/// of ten million single-precision adds in different orders.
pub const SUM_TOLERANCE: f32 = 1e3;

pub fn check_sum(observed: f32, expected: f32) -> Result<()> {
    check_element(0, observed, expected)
}

/// Every element of a scan must match within [`SUM_TOLERANCE`]; reports the
/// first index that does not.
pub fn check_scan(observed: &[f32], expected: &[f32]) -> Result<()> {
    if observed.len() != expected.len() {
        return Err(Error::LengthMismatch {
            observed: observed.len(),
            expected: expected.len(),
        });
    }
    for (index, (&o, &e)) in observed.iter().zip(expected).enumerate() {
        check_element(index, o, e)?;
    }
    debug!(len = observed.len(), "scan_verified");
    Ok(())
}

fn check_element(index: usize, observed: f32, expected: f32) -> Result<()> {
    // NaN on either side fails the comparison.
    if (expected - observed).abs() <= SUM_TOLERANCE {
        Ok(())
    } else {
        Err(Error::Mismatch {
            index,
            observed,
            expected,
        })
    }
}
