//! Device-backed tests. Each test returns early when the machine exposes no
//! GPU-class adapter.

use reduce_scan::sample::random_vector;
use reduce_scan::verify::{check_scan, check_sum, SUM_TOLERANCE};
use reduce_scan::{host, Algorithm, Config, DeviceContext, Error, GROUP_SIZE};

fn context() -> Option<DeviceContext> {
    match DeviceContext::new(Config::default().backends) {
        Ok(ctx) => Some(ctx),
        Err(e @ (Error::NoPlatform | Error::NoGpuDevice { .. })) => {
            eprintln!("SKIP: {e}");
            None
        }
        Err(e) => panic!("device bootstrap failed: {e}"),
    }
}

#[test]
fn test_reduce_single_group() {
    let Some(ctx) = context() else { return };
    let data: Vec<f32> = (0..GROUP_SIZE).map(|i| i as f32).collect();
    let sum = ctx.reduce(&data).unwrap();
    assert_eq!(sum, (GROUP_SIZE * (GROUP_SIZE - 1) / 2) as f32);
}

#[test]
fn test_reduce_matches_host_across_sizes() {
    let Some(ctx) = context() else { return };
    for n in [128usize, 128 * 1000, 1024 * 1024, 10 * 1024 * 1024] {
        let data = random_vector(n, 42);
        let expected = host::reduce(&data);
        let observed = ctx.reduce(&data).unwrap();
        assert!(
            (observed - expected).abs() <= SUM_TOLERANCE,
            "n={n}: device {observed}, host {expected}"
        );
    }
}

#[test]
fn test_reduce_remainder_group() {
    let Some(ctx) = context() else { return };
    for n in [1usize, 127, 129, 1000, 100_003] {
        let data = vec![1.0f32; n];
        assert_eq!(ctx.reduce(&data).unwrap(), n as f32, "n={n}");
    }
}

#[test]
fn test_reduce_fixed_seed_scenario() {
    let Some(ctx) = context() else { return };
    let n = 1024 * 1024;
    let first = host::reduce(&random_vector(n, 7));
    let second = host::reduce(&random_vector(n, 7));
    assert_eq!(first.to_bits(), second.to_bits());

    let device = ctx.reduce(&random_vector(n, 7)).unwrap();
    check_sum(device, first).unwrap();
}

#[test]
fn test_partials_keep_group_sums() {
    let Some(ctx) = context() else { return };
    let groups = 4;
    let data: Vec<f32> = (0..groups * GROUP_SIZE)
        .map(|i| (i / GROUP_SIZE + 1) as f32)
        .collect();

    let job = ctx.copy_in(&data, Algorithm::Reduce).unwrap();
    assert_eq!(job.groups(), groups);
    ctx.run(&job).unwrap();
    let partials = ctx.copy_out(&job).unwrap();

    assert_eq!(partials.len(), groups);
    // Slot 0 is overwritten with the grand total; the rest keep their group sum.
    let total: f32 = (1..=groups).map(|g| (g * GROUP_SIZE) as f32).sum();
    assert_eq!(partials[0], total);
    for (g, &p) in partials.iter().enumerate().skip(1) {
        assert_eq!(p, ((g + 1) * GROUP_SIZE) as f32);
    }
}

#[test]
fn test_scan_integer_input_is_exact() {
    let Some(ctx) = context() else { return };
    for n in [5usize, 128, 300, 4096 + 17] {
        let data: Vec<f32> = (0..n).map(|i| (i % 5) as f32).collect();
        let scanned = ctx.scan_inclusive(&data).unwrap();
        assert_eq!(scanned.len(), n);
        let mut running = 0.0f32;
        for (i, (&x, &s)) in data.iter().zip(&scanned).enumerate() {
            running += x;
            assert_eq!(s, running, "n={n} index {i}");
        }
    }
}

#[test]
fn test_scan_matches_host_random() {
    let Some(ctx) = context() else { return };
    let data = random_vector(1024 * 1024 + 3, 11);
    let mut expected = data.clone();
    host::scan_inclusive(&mut expected);
    let observed = ctx.scan_inclusive(&data).unwrap();
    check_scan(&observed, &expected).unwrap();
}

#[test]
fn test_zero_length_is_rejected() {
    let Some(ctx) = context() else { return };
    assert!(matches!(
        ctx.copy_in(&[], Algorithm::Reduce),
        Err(Error::InvalidConfig(_))
    ));
}
