use anyhow::{Context, Result};
use globalping_api::{GlobalpingClient, LimitsResponse};

pub(crate) async fn execute_limits_command(client: &GlobalpingClient) -> Result<()> {
    let limits = client
        .limits()
        .await
        .context("failed to fetch rate limits")?;
    print!("{}", render_limits(&limits));
    Ok(())
}

fn render_limits(limits: &LimitsResponse) -> String {
    let create = limits.create_limit();
    let authentication = if create.kind == "user" {
        "token"
    } else {
        "IP address"
    };
    let mut rendered = format!("Authentication: {authentication}\n\nCreating measurements:\n");
    rendered.push_str(&format!(
        " - {} tests per hour\n - {} consumed, {} remaining\n",
        create.limit,
        create.limit - create.remaining,
        create.remaining
    ));
    if create.reset > 0 {
        rendered.push_str(&format!(" - resets in {}\n", format_seconds(create.reset)));
    }
    if let Some(credits) = &limits.credits {
        rendered.push_str(&format!(
            "\nCredits:\n - {} credits remaining (may be used to create measurements above the hourly limits)\n",
            credits.remaining
        ));
    }
    rendered
}

fn format_seconds(seconds: i64) -> String {
    match seconds {
        s if s < 60 => format!("{s} {}", plural(s, "second")),
        s if s < 3600 => {
            let minutes = s / 60;
            format!("{minutes} {}", plural(minutes, "minute"))
        }
        s => {
            let hours = s / 3600;
            format!("{hours} {}", plural(hours, "hour"))
        }
    }
}

fn plural(count: i64, noun: &str) -> String {
    if count == 1 {
        noun.to_string()
    } else {
        format!("{noun}s")
    }
}
