use std::io::{self, Write};

use globalping_api::{Measurement, MeasurementKind, ProbeDetails, ProbeStatus};
use thiserror::Error;
use tracing::debug;

use crate::default_output::write_default;
use crate::latency_output::write_latency;
use crate::{Context, LiveArea, Printer, TerminalSize};

const MAX_LIVE_LINES_PER_PROBE: usize = 10;

#[derive(Debug, Error)]
pub enum ViewError {
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
    #[error("failed to encode measurement as json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("latency output is not supported for the {0} command")]
    LatencyUnsupported(MeasurementKind),
    #[error("{0}")]
    ConflictingOptions(String),
}

/// Receives every frame of a measurement run.
///
/// Live frames (`is_final == false`) carry all probes accumulated so far in
/// arrival order. Exactly one final frame closes the run.
pub trait FrameRenderer: Send {
    fn render_frame(
        &mut self,
        ctx: &Context,
        measurement: &Measurement,
        is_final: bool,
    ) -> Result<(), ViewError>;
}

/// `> City (State), Country, Continent, Network (ASN)`.
pub fn probe_header(probe: &ProbeDetails) -> String {
    let state = probe
        .state
        .as_deref()
        .filter(|state| !state.is_empty())
        .map(|state| format!(" ({state})"))
        .unwrap_or_default();
    format!(
        "> {}{state}, {}, {}, {} (AS{})",
        probe.city, probe.country, probe.continent, probe.network, probe.asn
    )
}

/// Renders frames to a [`Printer`].
pub struct TerminalRenderer {
    printer: Printer,
    live: LiveArea,
}

impl TerminalRenderer {
    pub fn new(printer: Printer) -> Self {
        Self {
            printer,
            live: LiveArea::new(),
        }
    }

    /// Draws live frames for a fixed terminal size instead of querying it.
    pub fn with_terminal_size(mut self, size: TerminalSize) -> Self {
        self.live = LiveArea::with_size(size);
        self
    }

    fn live_lines(&self, measurement: &Measurement) -> Vec<String> {
        let mut lines = Vec::new();
        for result in &measurement.results {
            lines.push(self.printer.bold(&probe_header(&result.probe)));
            let output = result.result.raw_output.trim_end();
            let output_lines = output.lines().collect::<Vec<_>>();
            let skip = output_lines.len().saturating_sub(MAX_LIVE_LINES_PER_PROBE);
            lines.extend(output_lines[skip..].iter().map(|line| line.to_string()));
            if result.result.status == ProbeStatus::InProgress {
                lines.push(self.printer.dim("..."));
            }
        }
        lines
    }

    fn render_final(&mut self, ctx: &Context, measurement: &Measurement) -> Result<(), ViewError> {
        if ctx.to_json {
            let json = serde_json::to_string_pretty(measurement)?;
            writeln!(self.printer.out(), "{json}")?;
        } else if ctx.to_latency {
            write_latency(&mut self.printer, ctx, measurement)?;
        } else {
            write_default(&mut self.printer, ctx, measurement)?;
        }
        if ctx.share && !measurement.id.is_empty() {
            writeln!(
                self.printer.err(),
                "> View the results online: {}",
                ctx.share_link(&measurement.id)
            )?;
        }
        self.printer.flush()?;
        Ok(())
    }
}

impl FrameRenderer for TerminalRenderer {
    fn render_frame(
        &mut self,
        ctx: &Context,
        measurement: &Measurement,
        is_final: bool,
    ) -> Result<(), ViewError> {
        if !is_final {
            if !ctx.shows_live_frames() {
                return Ok(());
            }
            let lines = self.live_lines(measurement);
            debug!(lines = lines.len(), "drawing live frame");
            let output = self.live.redraw(lines);
            write!(self.printer.err(), "{output}")?;
            self.printer.err().flush()?;
            return Ok(());
        }

        let clear = self.live.clear();
        if !clear.is_empty() {
            write!(self.printer.err(), "{clear}")?;
        }
        self.render_final(ctx, measurement)
    }
}
