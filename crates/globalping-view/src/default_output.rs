use std::io::{self, Write};

use chrono::SecondsFormat;
use globalping_api::{HttpTlsCertificate, Measurement, MeasurementKind, ProbeMeasurement};

use crate::renderer::probe_header;
use crate::{Context, Printer};

/// Final output: probe headers on stderr, command output on stdout.
pub(crate) fn write_default(
    printer: &mut Printer,
    ctx: &Context,
    measurement: &Measurement,
) -> io::Result<()> {
    for (index, result) in measurement.results.iter().enumerate() {
        if index > 0 {
            writeln!(printer.out())?;
        }
        let header = printer.bold(&probe_header(&result.probe));
        writeln!(printer.err(), "{header}")?;
        printer.err().flush()?;

        if ctx.cmd != MeasurementKind::Http {
            writeln!(printer.out(), "{}", result.result.raw_output.trim())?;
            continue;
        }
        if ctx.is_http_head() {
            writeln!(printer.out(), "{}", http_headers(result).trim())?;
            continue;
        }
        if ctx.full {
            write_http_preamble(printer, result)?;
        }
        writeln!(printer.out(), "{}", http_body(result).trim())?;
    }
    printer.flush()
}

fn write_http_preamble(printer: &mut Printer, result: &ProbeMeasurement) -> io::Result<()> {
    if let Some(tls) = &result.result.tls {
        for line in tls_lines(tls) {
            writeln!(printer.err(), "{line}")?;
        }
        writeln!(printer.err())?;
    }
    let status_line = result.result.raw_output.lines().next().unwrap_or_default();
    let status_line = printer.bold(status_line.trim());
    writeln!(printer.err(), "{status_line}")?;
    let headers = http_headers(result);
    let headers = headers.trim();
    if !headers.is_empty() {
        writeln!(printer.err(), "{headers}")?;
    }
    writeln!(printer.err())?;
    printer.err().flush()
}

pub(crate) fn tls_lines(tls: &HttpTlsCertificate) -> Vec<String> {
    let mut lines = vec![format!("{}/{}", tls.protocol, tls.cipher_name)];
    if let Some(error) = tls.error.as_deref().filter(|error| !error.is_empty()) {
        lines.push(format!("Error: {error}"));
    }
    lines.push(format!(
        "Subject: {}; {}",
        tls.subject.common_name, tls.subject.alternative_name
    ));
    lines.push(format!(
        "Issuer: {}; {}; {}",
        tls.issuer.common_name, tls.issuer.organization, tls.issuer.country
    ));
    lines.push(format!(
        "Validity: {}; {}",
        tls.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        tls.expires_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    ));
    lines.push(format!("Serial number: {}", tls.serial_number));
    lines.push(format!("Fingerprint: {}", tls.fingerprint256));
    if let Some(key_type) = tls.key_type.as_deref() {
        let bits = tls.key_bits.map(|bits| bits.to_string()).unwrap_or_default();
        lines.push(format!("Key type: {key_type}{bits}"));
    }
    lines
}

fn http_headers(result: &ProbeMeasurement) -> &str {
    result
        .result
        .raw_headers
        .as_deref()
        .unwrap_or(result.result.raw_output.as_str())
}

fn http_body(result: &ProbeMeasurement) -> &str {
    result
        .result
        .raw_body
        .as_deref()
        .unwrap_or(result.result.raw_output.as_str())
}
