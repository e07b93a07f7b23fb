mod harness;
mod reduce_bench;
mod scan_bench;

use std::io::Write;
use std::process::ExitCode;

use reduce_scan::{Config, DeviceContext};
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_filter(
                    EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| EnvFilter::new("off")),
                ),
        )
        .init();

    exit_code(run())
}

fn exit_code(result: reduce_scan::Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "benchmark run failed");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> reduce_scan::Result<()> {
    let config = Config::from_env()?;
    info!(n = config.n, seed = config.seed, backends = ?config.backends, "configuration loaded");

    let ctx = DeviceContext::new(config.backends)?;
    eprintln!("Platform name: {}", ctx.platform_name());
    eprintln!("Device name: {}", ctx.device_name());

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    harness::print_column_names(&mut out)?;

    let mut rows = Vec::new();

    let row = reduce_bench::profile_reduce(config.n, config.seed, &ctx)?;
    harness::print_row(&mut out, &row)?;
    rows.push(row);

    let row = scan_bench::profile_scan_inclusive(config.n, config.seed, &ctx)?;
    harness::print_row(&mut out, &row)?;
    rows.push(row);

    out.flush()?;

    if let Some(path) = &config.json {
        harness::write_json(path, &rows)?;
        info!(path = %path.display(), rows = rows.len(), "report written");
    }

    Ok(())
}
