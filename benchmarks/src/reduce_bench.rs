use reduce_scan::sample::random_vector;
use reduce_scan::timing::now;
use reduce_scan::verify::check_sum;
use reduce_scan::{host, Algorithm, DeviceContext, Result, TimingSample};
use tracing::{info, info_span};

use crate::harness::BenchRow;

/// Sum `n` random floats on the host and on the device, then compare.
/// A mismatch aborts the run.
pub fn profile_reduce(n: usize, seed: u64, ctx: &DeviceContext) -> Result<BenchRow> {
    let _span = info_span!("profile_reduce", n, seed).entered();
    let data = random_vector(n, seed);

    let t0 = now();
    let expected = host::reduce(&data);
    let t1 = now();
    let job = ctx.copy_in(&data, Algorithm::Reduce)?;
    let t2 = now();
    ctx.run(&job)?;
    let t3 = now();
    let partials = ctx.copy_out(&job)?;
    let t4 = now();

    let sum = partials.first().copied().unwrap_or(f32::NAN);
    check_sum(sum, expected)?;
    info!(sum, expected, groups = job.groups(), "reduce verified");

    let timing = TimingSample::from_timestamps([t0, t1, t2, t3, t4]);
    Ok(BenchRow::new(Algorithm::Reduce.name(), n, timing))
}
