use clap::Args;

use super::parse_positive_usize;
use crate::{CliDnsProtocol, CliDnsType, CliHttpMethod, CliHttpProtocol, CliTraceProtocol};

/// Target plus the optional trailing `from <locations>` words.
#[derive(Debug, Clone, Args)]
pub struct TargetArgs {
    #[arg(
        value_name = "TARGET",
        num_args = 1..,
        required = true,
        help = "Target host, optionally followed by `from <locations>`"
    )]
    pub target: Vec<String>,
}

/// Flags shared by every measurement command.
#[derive(Debug, Clone, Args)]
#[command(next_help_heading = "Global Measurement Flags")]
pub struct MeasurementFlags {
    #[arg(
        long,
        short = 'F',
        default_value = "world",
        help = "specify the probe locations as a comma-separated list; you may use: names of continents, regions, countries, US states, cities, or networks; [@1 | first, @2 ... @-2, @-1 | last | previous] to run with the probes from previous measurements in this session; an ID of a previous measurement to run with its probes"
    )]
    pub from: String,

    #[arg(
        long,
        short = 'L',
        default_value_t = 1,
        value_parser = parse_positive_usize,
        help = "define the number of probes to use"
    )]
    pub limit: usize,

    #[arg(long, short = 'J', default_value_t = false, help = "output results in JSON format")]
    pub json: bool,

    #[arg(
        long,
        default_value_t = false,
        help = "output only the latency stats; applicable only to dns, http, and ping commands"
    )]
    pub latency: bool,

    #[arg(
        long,
        default_value_t = false,
        help = "print a link at the end of the results to visualize them online"
    )]
    pub share: bool,

    #[arg(
        long,
        short = '4',
        default_value_t = false,
        conflicts_with = "ipv6",
        help = "resolve names to IPv4 addresses"
    )]
    pub ipv4: bool,

    #[arg(long, short = '6', default_value_t = false, help = "resolve names to IPv6 addresses")]
    pub ipv6: bool,
}

#[derive(Debug, Clone, Args)]
pub struct PingArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    #[arg(
        long,
        value_parser = clap::value_parser!(u8).range(1..=16),
        help = "specify the number of ICMP packets to send"
    )]
    pub packets: Option<u8>,

    #[command(flatten)]
    pub measurement: MeasurementFlags,
}

#[derive(Debug, Clone, Args)]
pub struct TracerouteArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    #[arg(long, value_enum, ignore_case = true, help = "specify the protocol to use")]
    pub protocol: Option<CliTraceProtocol>,

    #[arg(long, help = "specify the port to use; applicable only for the TCP protocol")]
    pub port: Option<u16>,

    #[command(flatten)]
    pub measurement: MeasurementFlags,
}

#[derive(Debug, Clone, Args)]
pub struct DnsArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    #[arg(
        long = "type",
        value_enum,
        ignore_case = true,
        help = "specify the type of DNS query to perform"
    )]
    pub query_type: Option<CliDnsType>,

    #[arg(long, help = "specify the hostname or IP address of the name server to use")]
    pub resolver: Option<String>,

    #[arg(long, value_enum, ignore_case = true, help = "specify the protocol to use")]
    pub protocol: Option<CliDnsProtocol>,

    #[arg(long, help = "specify the port to use")]
    pub port: Option<u16>,

    #[arg(
        long,
        default_value_t = false,
        help = "toggle tracing of the delegation path from the root servers"
    )]
    pub trace: bool,

    #[command(flatten)]
    pub measurement: MeasurementFlags,
}

#[derive(Debug, Clone, Args)]
pub struct MtrArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    #[arg(long, value_enum, ignore_case = true, help = "specify the protocol to use")]
    pub protocol: Option<CliTraceProtocol>,

    #[arg(long, help = "specify the port to use; applicable only for the TCP protocol")]
    pub port: Option<u16>,

    #[arg(
        long,
        value_parser = clap::value_parser!(u8).range(1..=16),
        help = "specify the number of packets to send to each hop"
    )]
    pub packets: Option<u8>,

    #[command(flatten)]
    pub measurement: MeasurementFlags,
}

#[derive(Debug, Clone, Args)]
pub struct HttpArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    #[arg(long, value_enum, ignore_case = true, help = "specify the HTTP method to use")]
    pub method: Option<CliHttpMethod>,

    #[arg(long, help = "specify the Host header to add to the request")]
    pub host: Option<String>,

    #[arg(long, help = "specify the URL path to request")]
    pub path: Option<String>,

    #[arg(long, help = "specify the query string to add to the request")]
    pub query: Option<String>,

    #[arg(
        long,
        short = 'H',
        value_name = "NAME: VALUE",
        help = "specify a request header; may be repeated"
    )]
    pub header: Vec<String>,

    #[arg(long, help = "specify the hostname or IP address of the name server to use")]
    pub resolver: Option<String>,

    #[arg(long, value_enum, ignore_case = true, help = "specify the protocol to use")]
    pub protocol: Option<CliHttpProtocol>,

    #[arg(long, help = "specify the port to use")]
    pub port: Option<u16>,

    #[arg(
        long,
        default_value_t = false,
        help = "print the TLS details, status line and headers in addition to the body"
    )]
    pub full: bool,

    #[command(flatten)]
    pub measurement: MeasurementFlags,
}
