use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};

mod measurement_flags;

pub use measurement_flags::{
    DnsArgs, HttpArgs, MeasurementFlags, MtrArgs, PingArgs, TargetArgs, TracerouteArgs,
};

fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Parser)]
#[command(
    name = "globalping",
    about = "A global network of probes to perform network tests such as ping, traceroute, and DNS resolution",
    version
)]
pub struct Cli {
    #[arg(
        long,
        short = 'C',
        global = true,
        default_value_t = false,
        help = "disable real-time terminal updates and colors, suitable for CI and scripting"
    )]
    pub ci: bool,

    #[arg(
        long = "api-url",
        env = "GLOBALPING_API_URL",
        global = true,
        default_value = "https://api.globalping.io/v1",
        help = "Base URL of the measurement API"
    )]
    pub api_url: String,

    #[arg(
        long = "auth-url",
        env = "GLOBALPING_AUTH_URL",
        global = true,
        default_value = "https://auth.globalping.io",
        help = "Base URL of the authorization server"
    )]
    pub auth_url: String,

    #[arg(
        long = "share-url",
        env = "GLOBALPING_SHARE_URL",
        global = true,
        default_value = "https://globalping.io",
        help = "Base URL used for --share links"
    )]
    pub share_url: String,

    #[arg(
        long = "api-interval-ms",
        env = "GLOBALPING_API_INTERVAL",
        global = true,
        default_value_t = 500,
        value_parser = parse_positive_u64,
        help = "Minimum delay between two polls of the same measurement"
    )]
    pub api_interval_ms: u64,

    #[arg(
        long,
        env = "GLOBALPING_PROFILE",
        global = true,
        help = "Profile file holding the stored access token [default: <config dir>/globalping/profile.json]"
    )]
    pub profile: Option<PathBuf>,

    #[arg(
        long = "request-timeout-ms",
        global = true,
        default_value_t = 30_000,
        value_parser = parse_positive_u64,
        help = "Timeout for a single API request"
    )]
    pub request_timeout_ms: u64,

    #[arg(
        long = "max-retries",
        global = true,
        default_value_t = 2,
        help = "Retries for transient API failures"
    )]
    pub max_retries: usize,

    #[arg(
        long = "token",
        env = "GLOBALPING_TOKEN",
        global = true,
        hide = true,
        hide_env_values = true,
        help = "Access token used as-is and never persisted"
    )]
    pub token: Option<String>,

    #[arg(
        long = "auth-client-id",
        env = "GLOBALPING_AUTH_CLIENT_ID",
        global = true,
        hide = true
    )]
    pub auth_client_id: Option<String>,

    #[arg(
        long = "auth-client-secret",
        env = "GLOBALPING_AUTH_CLIENT_SECRET",
        global = true,
        hide = true,
        hide_env_values = true
    )]
    pub auth_client_secret: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// `--profile`, or `globalping/profile.json` under the user config directory.
    pub fn profile_path(&self) -> Result<PathBuf> {
        match &self.profile {
            Some(path) => Ok(path.clone()),
            None => default_profile_path(dirs::config_dir()),
        }
    }
}

fn default_profile_path(config_dir: Option<PathBuf>) -> Result<PathBuf> {
    let config_dir = config_dir
        .ok_or_else(|| anyhow!("could not determine the user config directory; pass --profile"))?;
    Ok(config_dir.join("globalping").join("profile.json"))
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a ping test
    Ping(PingArgs),
    /// Run a traceroute test
    Traceroute(TracerouteArgs),
    /// Resolve a DNS record similarly to dig
    Dns(DnsArgs),
    /// Run an MTR test, similar to traceroute
    Mtr(MtrArgs),
    /// Perform a HEAD, GET, or OPTIONS request to a host
    Http(HttpArgs),
    /// Authenticate with the Globalping API
    Auth {
        #[command(subcommand)]
        command: AuthCommand,
    },
    /// Show your current rate limits
    Limits,
    /// Start an interactive session sharing one measurement history
    Shell,
    /// List the measurements run in this session
    History,
    /// Display the version of your installed Globalping CLI
    Version,
    /// Join the community by hosting a Globalping probe in Docker
    InstallProbe,
}

#[derive(Debug, Subcommand)]
pub enum AuthCommand {
    /// Log in with your Globalping account in the browser
    Login {
        #[arg(
            long = "with-token",
            default_value_t = false,
            help = "read the token from stdin instead of starting the browser flow"
        )]
        with_token: bool,
    },
    /// Show whether a token is stored and when it expires
    Status,
    /// Revoke the stored token and clear the profile
    Logout,
}
