use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{bail, Context as _, Result};
use globalping_api::{
    MeasurementCreate, MeasurementKind, MeasurementOptions, QueryOptions, RequestOptions,
};
use globalping_view::Context;
use url::Url;

use crate::{Cli, Command, CliHttpMethod, HttpArgs, MeasurementFlags, TargetArgs};

/// Render context and submission payload for one measurement command.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementInvocation {
    pub ctx: Context,
    pub request: MeasurementCreate,
}

/// Translates a parsed measurement command; `None` for auxiliary commands.
///
/// Locations and limit in the payload are placeholders: the session
/// replaces them once the `from` expression has been resolved.
pub fn build_measurement(cli: &Cli) -> Result<Option<MeasurementInvocation>> {
    let invocation = match &cli.command {
        Command::Ping(args) => {
            let (ctx, mut options) =
                start(cli, MeasurementKind::Ping, &args.target, &args.measurement)?;
            options.packets = args.packets;
            finish(ctx, options)
        }
        Command::Traceroute(args) => {
            let (ctx, mut options) =
                start(cli, MeasurementKind::Traceroute, &args.target, &args.measurement)?;
            options.protocol = args.protocol.map(|protocol| protocol.as_wire().to_string());
            options.port = args.port;
            finish(ctx, options)
        }
        Command::Dns(args) => {
            let (ctx, mut options) =
                start(cli, MeasurementKind::Dns, &args.target, &args.measurement)?;
            options.query = args.query_type.map(|kind| QueryOptions {
                kind: kind.as_wire().to_string(),
            });
            options.resolver = args.resolver.clone();
            options.protocol = args.protocol.map(|protocol| protocol.as_wire().to_string());
            options.port = args.port;
            options.trace = args.trace.then_some(true);
            finish(ctx, options)
        }
        Command::Mtr(args) => {
            let (ctx, mut options) =
                start(cli, MeasurementKind::Mtr, &args.target, &args.measurement)?;
            options.protocol = args.protocol.map(|protocol| protocol.as_wire().to_string());
            options.port = args.port;
            options.packets = args.packets;
            finish(ctx, options)
        }
        Command::Http(args) => build_http(cli, args)?,
        _ => return Ok(None),
    };
    Ok(Some(invocation))
}

fn start(
    cli: &Cli,
    kind: MeasurementKind,
    target: &TargetArgs,
    flags: &MeasurementFlags,
) -> Result<(Context, MeasurementOptions)> {
    let (target, from) = split_target(&target.target, &flags.from)?;
    let mut ctx = Context::new(kind, target);
    ctx.from = from;
    ctx.limit = flags.limit;
    ctx.ci_mode = cli.ci;
    ctx.to_json = flags.json;
    ctx.to_latency = flags.latency;
    ctx.share = flags.share;
    ctx.ipv4 = flags.ipv4;
    ctx.ipv6 = flags.ipv6;
    ctx.api_min_interval = Duration::from_millis(cli.api_interval_ms);
    ctx.share_url = cli.share_url.clone();

    let options = MeasurementOptions {
        ip_version: if flags.ipv4 {
            Some(4)
        } else if flags.ipv6 {
            Some(6)
        } else {
            None
        },
        ..MeasurementOptions::default()
    };
    Ok((ctx, options))
}

fn finish(ctx: Context, options: MeasurementOptions) -> MeasurementInvocation {
    let mut request = MeasurementCreate::new(ctx.cmd, ctx.target.clone());
    request.in_progress_updates = !ctx.ci_mode;
    request.limit = Some(ctx.limit);
    request.measurement_options = (options != MeasurementOptions::default()).then_some(options);
    MeasurementInvocation { ctx, request }
}

fn build_http(cli: &Cli, args: &HttpArgs) -> Result<MeasurementInvocation> {
    let (mut ctx, mut options) =
        start(cli, MeasurementKind::Http, &args.target, &args.measurement)?;
    let parsed = parse_http_target(&ctx.target)?;
    let method = args.method.unwrap_or(CliHttpMethod::Get).as_wire();

    ctx.target = parsed.host.clone();
    ctx.full = args.full;
    ctx.http_method = Some(method.to_string());

    options.request = Some(RequestOptions {
        method: Some(method.to_string()),
        host: args.host.clone().or(parsed.explicit_host),
        path: args.path.clone().or(parsed.path),
        query: args.query.clone().or(parsed.query),
        headers: parse_headers(&args.header)?,
    });
    options.resolver = args.resolver.clone();
    options.protocol = args
        .protocol
        .map(|protocol| protocol.as_wire().to_string())
        .or(parsed.protocol.map(str::to_string));
    options.port = args.port.or(parsed.port);
    Ok(finish(ctx, options))
}

/// Splits `TARGET [from LOCATION...]`; the positional form wins over `--from`.
fn split_target(words: &[String], flag_from: &str) -> Result<(String, String)> {
    let Some((target, rest)) = words.split_first() else {
        bail!("a measurement target is required");
    };
    let Some((keyword, locations)) = rest.split_first() else {
        return Ok((target.clone(), flag_from.to_string()));
    };
    if !keyword.eq_ignore_ascii_case("from") {
        bail!("unexpected argument '{keyword}'; use `from <locations>` to select probes");
    }
    let locations = locations.join(" ");
    if locations.trim().is_empty() {
        bail!("`from` must be followed by at least one location");
    }
    Ok((target.clone(), locations))
}

#[derive(Debug, Default, PartialEq)]
struct HttpTarget {
    host: String,
    explicit_host: Option<String>,
    path: Option<String>,
    query: Option<String>,
    protocol: Option<&'static str>,
    port: Option<u16>,
}

fn parse_http_target(target: &str) -> Result<HttpTarget> {
    let has_scheme = target.contains("://");
    if !has_scheme && !target.contains(['/', '?']) {
        return Ok(HttpTarget {
            host: target.to_string(),
            ..HttpTarget::default()
        });
    }

    let candidate = if has_scheme {
        target.to_string()
    } else {
        format!("http://{target}")
    };
    let url = Url::parse(&candidate).with_context(|| format!("invalid http target '{target}'"))?;
    let protocol = match (has_scheme, url.scheme()) {
        (false, _) => None,
        (true, "http") => Some("HTTP"),
        (true, "https") => Some("HTTPS"),
        (true, other) => bail!("unsupported scheme '{other}' in http target '{target}'"),
    };
    let host = url
        .host_str()
        .map(|host| host.trim_start_matches('[').trim_end_matches(']'))
        .filter(|host| !host.is_empty())
        .with_context(|| format!("http target '{target}' has no host"))?
        .to_string();

    Ok(HttpTarget {
        explicit_host: Some(host.clone()),
        host,
        path: Some(url.path().to_string()).filter(|path| path != "/"),
        query: url.query().map(str::to_string),
        protocol,
        port: url.port(),
    })
}

fn parse_headers(raw: &[String]) -> Result<BTreeMap<String, String>> {
    let mut headers = BTreeMap::new();
    for header in raw {
        let Some((name, value)) = header.split_once(':') else {
            bail!("invalid header '{header}'; expected `Name: value`");
        };
        let name = name.trim();
        if name.is_empty() {
            bail!("invalid header '{header}'; the name is empty");
        }
        headers.insert(name.to_string(), value.trim().to_string());
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use globalping_api::MeasurementKind;

    use super::{build_measurement, parse_http_target, split_target, MeasurementInvocation};
    use crate::Cli;

    fn invocation(args: &[&str]) -> MeasurementInvocation {
        let cli = Cli::try_parse_from(std::iter::once("globalping").chain(args.iter().copied()))
            .expect("arguments should parse");
        build_measurement(&cli)
            .expect("measurement should build")
            .expect("measurement command")
    }

    fn words(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn positional_from_overrides_the_flag() {
        let (target, from) =
            split_target(&words(&["example.com", "from", "Berlin,", "Paris"]), "world")
                .expect("split");
        assert_eq!(target, "example.com");
        assert_eq!(from, "Berlin, Paris");

        let (_, from) = split_target(&words(&["example.com"]), "last").expect("split");
        assert_eq!(from, "last");
    }

    #[test]
    fn stray_words_after_target_are_rejected() {
        assert!(split_target(&words(&["example.com", "Berlin"]), "world").is_err());
        assert!(split_target(&words(&["example.com", "from"]), "world").is_err());
    }

    #[test]
    fn ping_builds_context_and_payload() {
        let built = invocation(&[
            "ping", "example.com", "from", "@1", "--packets", "3", "-L", "2", "-4", "--share",
        ]);
        assert_eq!(built.ctx.cmd, MeasurementKind::Ping);
        assert_eq!(built.ctx.from, "@1");
        assert_eq!(built.ctx.limit, 2);
        assert!(built.ctx.share);
        assert!(built.ctx.ipv4);
        assert!(built.request.in_progress_updates);
        let options = built.request.measurement_options.expect("options");
        assert_eq!(options.packets, Some(3));
        assert_eq!(options.ip_version, Some(4));
    }

    #[test]
    fn ci_mode_disables_in_progress_updates() {
        let built = invocation(&["--ci", "traceroute", "example.com"]);
        assert!(built.ctx.ci_mode);
        assert!(!built.request.in_progress_updates);
        assert_eq!(built.request.measurement_options, None);
    }

    #[test]
    fn dns_options_use_wire_names() {
        let built = invocation(&[
            "dns", "example.com", "--type", "mx", "--protocol", "tcp", "--resolver", "1.1.1.1",
            "--trace",
        ]);
        let options = built.request.measurement_options.expect("options");
        assert_eq!(options.query.expect("query").kind, "MX");
        assert_eq!(options.protocol.as_deref(), Some("TCP"));
        assert_eq!(options.resolver.as_deref(), Some("1.1.1.1"));
        assert_eq!(options.trace, Some(true));
    }

    #[test]
    fn http_url_target_is_split_and_flags_win() {
        let built = invocation(&[
            "http",
            "https://example.com:8443/status?verbose=1",
            "--path",
            "/health",
            "-H",
            "X-Test: yes",
            "--full",
        ]);
        assert_eq!(built.ctx.target, "example.com");
        assert_eq!(built.request.target, "example.com");
        assert!(built.ctx.full);
        assert_eq!(built.ctx.http_method.as_deref(), Some("GET"));

        let options = built.request.measurement_options.expect("options");
        assert_eq!(options.protocol.as_deref(), Some("HTTPS"));
        assert_eq!(options.port, Some(8443));
        let request = options.request.expect("request options");
        assert_eq!(request.method.as_deref(), Some("GET"));
        assert_eq!(request.path.as_deref(), Some("/health"));
        assert_eq!(request.query.as_deref(), Some("verbose=1"));
        assert_eq!(request.headers.get("X-Test").map(String::as_str), Some("yes"));
    }

    #[test]
    fn http_head_is_carried_into_the_context() {
        let built = invocation(&["http", "example.com", "--method", "HEAD"]);
        assert!(built.ctx.is_http_head());
        assert_eq!(built.ctx.target, "example.com");
    }

    #[test]
    fn http_rejects_headers_without_separator() {
        let cli = Cli::try_parse_from(["globalping", "http", "example.com", "-H", "broken"])
            .expect("arguments should parse");
        assert!(build_measurement(&cli).is_err());
    }

    #[test]
    fn bare_host_and_path_targets_parse_without_scheme() {
        let parsed = parse_http_target("example.com").expect("host");
        assert_eq!(parsed.host, "example.com");
        assert_eq!(parsed.path, None);

        let parsed = parse_http_target("example.com/docs").expect("path");
        assert_eq!(parsed.host, "example.com");
        assert_eq!(parsed.path.as_deref(), Some("/docs"));
        assert_eq!(parsed.protocol, None);

        assert!(parse_http_target("ftp://example.com/file").is_err());
    }

    #[test]
    fn auxiliary_commands_build_nothing() {
        let cli = Cli::try_parse_from(["globalping", "limits"]).expect("parse");
        assert!(build_measurement(&cli).expect("build").is_none());
    }
}
