use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use reduce_scan::{Bandwidth, TimingSample};
use serde::Serialize;

const NAME_W: usize = 19;
const COL_W: usize = 20;

const COLUMNS: [&str; 7] = [
    "host",
    "device total",
    "device copy-in",
    "device kernel",
    "device copy-out",
    "host bandwidth",
    "device bandwidth",
];

#[derive(Debug, Clone, Serialize)]
pub struct BenchRow {
    pub name: String,
    pub n: usize,
    pub timing: TimingSample,
    pub bandwidth: Bandwidth,
}

impl BenchRow {
    pub fn new(name: &str, n: usize, timing: TimingSample) -> Self {
        Self {
            name: name.to_string(),
            n,
            timing,
            bandwidth: Bandwidth::for_sample(n, &timing),
        }
    }
}

fn time_cell(d: Duration) -> String {
    format!("{}us", d.as_micros())
}

fn bandwidth_cell(gbps: f64) -> String {
    format!("{:.2}GB/s", gbps)
}

pub fn print_column_names(out: &mut impl Write) -> io::Result<()> {
    write!(out, "{:>name_w$}", "function", name_w = NAME_W)?;
    for column in COLUMNS {
        write!(out, "{:>col_w$}", column, col_w = COL_W)?;
    }
    writeln!(out)
}

pub fn print_row(out: &mut impl Write, row: &BenchRow) -> io::Result<()> {
    write!(out, "{:>name_w$}", row.name, name_w = NAME_W)?;
    for d in row.timing.columns() {
        write!(out, "{:>col_w$}", time_cell(d), col_w = COL_W)?;
    }
    for gbps in [row.bandwidth.host_gbps, row.bandwidth.device_gbps] {
        write!(out, "{:>col_w$}", bandwidth_cell(gbps), col_w = COL_W)?;
    }
    writeln!(out)
}

/// Write all rows as pretty JSON.
pub fn write_json(path: &Path, rows: &[BenchRow]) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, rows)?;
    writeln!(writer)?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row() -> BenchRow {
        let timing = TimingSample {
            host: Duration::from_micros(4200),
            device_total: Duration::from_micros(9000),
            device_copy_in: Duration::from_micros(6000),
            device_kernel: Duration::from_micros(1000),
            device_copy_out: Duration::from_micros(2000),
        };
        BenchRow::new("reduce", 1_000_000, timing)
    }

    fn render(row: &BenchRow) -> Vec<u8> {
        let mut out = Vec::new();
        print_row(&mut out, row).unwrap();
        out
    }

    #[test]
    fn formatting_twice_is_identical() {
        let row = sample_row();
        assert_eq!(render(&row), render(&row));
    }

    #[test]
    fn row_cells_are_fixed_width() {
        let line = String::from_utf8(render(&sample_row())).unwrap();
        let line = line.trim_end_matches('\n');
        assert_eq!(line.len(), NAME_W + 7 * COL_W);
        assert_eq!(&line[..NAME_W], format!("{:>19}", "reduce"));
        assert!(line.contains("4200us"));
        assert!(line.contains("9000us"));
        // 12 MB over the 1000 us kernel phase.
        assert!(line.ends_with("12.00GB/s"));
    }

    #[test]
    fn header_lines_up_with_rows() {
        let mut out = Vec::new();
        print_column_names(&mut out).unwrap();
        let header = String::from_utf8(out).unwrap();
        assert_eq!(header.trim_end_matches('\n').len(), NAME_W + 7 * COL_W);
        assert!(header.trim_start().starts_with("function"));
        assert!(header.trim_end().ends_with("device bandwidth"));
    }

    #[test]
    fn zero_duration_prints_zero() {
        let row = BenchRow::new("scan-inclusive", 128, TimingSample::default());
        let line = String::from_utf8(render(&row)).unwrap();
        assert!(line.contains("0us"));
        assert!(line.trim_end().ends_with("0.00GB/s"));
    }

    #[test]
    fn json_report_round_trips_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        write_json(&path, &[sample_row()]).unwrap();

        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed[0]["name"], "reduce");
        assert_eq!(parsed[0]["n"], 1_000_000);
        let device_gbps = parsed[0]["bandwidth"]["device_gbps"].as_f64().unwrap();
        assert!((device_gbps - 12.0).abs() < 1e-9);
        assert!(parsed[0].get("verified").is_none());
    }
}
