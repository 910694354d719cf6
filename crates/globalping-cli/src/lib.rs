//! CLI argument models for the Globalping binary.
//!
//! Exposes the clap command tree (global flags, measurement flags and the
//! per-command option sets) plus the translation of a parsed measurement
//! command into a render `Context` and a submission payload.

pub mod cli_args;
pub mod cli_types;
pub mod measurement_request;

pub use cli_args::{
    AuthCommand, Cli, Command, DnsArgs, HttpArgs, MeasurementFlags, MtrArgs, PingArgs,
    TargetArgs, TracerouteArgs,
};
pub use cli_types::*;
pub use measurement_request::{build_measurement, MeasurementInvocation};
