use reduce_scan::sample::random_vector;
use reduce_scan::timing::now;
use reduce_scan::verify::check_scan;
use reduce_scan::{host, Algorithm, DeviceContext, Result, TimingSample};
use tracing::{info, info_span};

use crate::harness::BenchRow;

/// Inclusive prefix sum of `n` random floats on the host and on the device.
/// Every element of the device result is checked against the host result.
pub fn profile_scan_inclusive(n: usize, seed: u64, ctx: &DeviceContext) -> Result<BenchRow> {
    let _span = info_span!("profile_scan_inclusive", n, seed).entered();
    let data = random_vector(n, seed);
    let mut expected = data.clone();

    let t0 = now();
    host::scan_inclusive(&mut expected);
    let t1 = now();
    let job = ctx.copy_in(&data, Algorithm::ScanInclusive)?;
    let t2 = now();
    ctx.run(&job)?;
    let t3 = now();
    let result = ctx.copy_out(&job)?;
    let t4 = now();

    check_scan(&result, &expected)?;
    info!(total = expected.last().copied().unwrap_or_default(), "scan verified");

    let timing = TimingSample::from_timestamps([t0, t1, t2, t3, t4]);
    Ok(BenchRow::new(Algorithm::ScanInclusive.name(), n, timing))
}
