use std::io::Write;

use globalping_api::{Measurement, MeasurementKind, ProbeResult};

use crate::renderer::probe_header;
use crate::{Context, Printer, ViewError};

/// `--latency` output: header plus timing lines per probe, all on stdout.
pub(crate) fn write_latency(
    printer: &mut Printer,
    ctx: &Context,
    measurement: &Measurement,
) -> Result<(), ViewError> {
    for (index, result) in measurement.results.iter().enumerate() {
        if index > 0 {
            writeln!(printer.out())?;
        }
        let header = printer.bold(&probe_header(&result.probe));
        writeln!(printer.out(), "{header}")?;
        for (label, value) in latency_lines(ctx.cmd, &result.result)? {
            let label = printer.bold(&format!("{label}:"));
            writeln!(printer.out(), "{label} {value}")?;
        }
    }
    printer.flush()?;
    Ok(())
}

fn latency_lines(
    kind: MeasurementKind,
    result: &ProbeResult,
) -> Result<Vec<(&'static str, String)>, ViewError> {
    let mut lines = Vec::new();
    match kind {
        MeasurementKind::Ping => {
            let stats = result.stats.clone().unwrap_or_default();
            push_ms(&mut lines, "Min", stats.min, 2);
            push_ms(&mut lines, "Max", stats.max, 2);
            push_ms(&mut lines, "Avg", stats.avg, 2);
        }
        MeasurementKind::Dns => {
            let timings = result.dns_timings().unwrap_or_default();
            push_ms(&mut lines, "Total", timings.total, 0);
        }
        MeasurementKind::Http => {
            let timings = result.http_timings().unwrap_or_default();
            push_ms(&mut lines, "Total", timings.total, 0);
            push_ms(&mut lines, "Download", timings.download, 0);
            push_ms(&mut lines, "First byte", timings.first_byte, 0);
            push_ms(&mut lines, "DNS", timings.dns, 0);
            push_ms(&mut lines, "TLS", timings.tls, 0);
            push_ms(&mut lines, "TCP", timings.tcp, 0);
        }
        MeasurementKind::Traceroute | MeasurementKind::Mtr => {
            return Err(ViewError::LatencyUnsupported(kind));
        }
    }
    Ok(lines)
}

fn push_ms(
    lines: &mut Vec<(&'static str, String)>,
    label: &'static str,
    value: Option<f64>,
    precision: usize,
) {
    let rendered = match value {
        Some(value) => format!("{value:.precision$} ms"),
        None => "N/A".to_string(),
    };
    lines.push((label, rendered));
}
