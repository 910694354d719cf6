use std::io::Write;
use std::process::Stdio;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

pub(crate) const PROBE_IMAGE: &str = "ghcr.io/jsdelivr/globalping-probe";
pub(crate) const PROBE_CONTAINER: &str = "globalping-probe";

#[async_trait]
/// Runs external programs; returns whether they exited successfully.
pub(crate) trait CommandRunner: Send + Sync {
    async fn succeeds(&self, program: &str, args: &[&str]) -> Result<bool>;
}

pub(crate) struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn succeeds(&self, program: &str, args: &[&str]) -> Result<bool> {
        let status = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .status()
            .await;
        match status {
            Ok(status) => Ok(status.success()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                debug!(program, "program not found");
                Ok(false)
            }
            Err(error) => Err(error).with_context(|| format!("failed to run {program}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InstallOutcome {
    Started,
    Cancelled,
}

pub(crate) async fn execute_install_probe() -> Result<()> {
    let mut input = BufReader::new(tokio::io::stdin());
    let mut out = std::io::stdout();
    install_probe(&SystemRunner, &mut input, &mut out).await?;
    Ok(())
}

/// Checks Docker, asks for confirmation on `input`, then starts the probe
/// container. Falls back to `sudo` on Linux when plain `docker` is refused.
pub(crate) async fn install_probe(
    runner: &dyn CommandRunner,
    input: &mut (dyn AsyncBufRead + Unpin + Send),
    out: &mut (dyn Write + Send),
) -> Result<InstallOutcome> {
    let use_sudo = if runner.succeeds("docker", &["info"]).await? {
        false
    } else if cfg!(target_os = "linux") && runner.succeeds("sudo", &["docker", "info"]).await? {
        true
    } else {
        bail!("docker info command failed; make sure Docker is installed and running");
    };

    writeln!(
        out,
        "The Globalping platform is a community powered project and relies on individuals like yourself to host our probes and make them accessible to everyone else."
    )?;
    write!(
        out,
        "Please confirm to pull and run our Docker container ({PROBE_IMAGE}) [Y/n] "
    )?;
    out.flush()?;

    let mut answer = String::new();
    input
        .read_line(&mut answer)
        .await
        .context("failed to read confirmation")?;
    if !matches!(answer.trim(), "" | "y" | "Y" | "yes" | "Yes") {
        writeln!(out, "Installation cancelled.")?;
        return Ok(InstallOutcome::Cancelled);
    }

    let run_args = [
        "run",
        "-d",
        "--log-driver",
        "local",
        "--network",
        "host",
        "--restart=always",
        "--name",
        PROBE_CONTAINER,
        PROBE_IMAGE,
    ];
    let started = if use_sudo {
        let mut args = vec!["docker"];
        args.extend(run_args);
        runner.succeeds("sudo", &args).await?
    } else {
        runner.succeeds("docker", &run_args).await?
    };
    if !started {
        bail!("failed to start the {PROBE_CONTAINER} container");
    }
    writeln!(
        out,
        "The Globalping probe started successfully. Thank you for joining our community!"
    )?;
    Ok(InstallOutcome::Started)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use anyhow::Result;
    use async_trait::async_trait;

    use super::{install_probe, CommandRunner, InstallOutcome, PROBE_IMAGE};

    struct ScriptedRunner {
        docker_available: bool,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedRunner {
        fn new(docker_available: bool) -> Self {
            Self {
                docker_available,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().expect("calls").clone()
        }
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn succeeds(&self, program: &str, args: &[&str]) -> Result<bool> {
            self.calls
                .lock()
                .expect("calls")
                .push(format!("{program} {}", args.join(" ")));
            Ok(self.docker_available)
        }
    }

    #[tokio::test]
    async fn confirmed_install_starts_the_container() {
        let runner = ScriptedRunner::new(true);
        let mut input: &[u8] = b"\n";
        let mut out = Vec::new();

        let outcome = install_probe(&runner, &mut input, &mut out)
            .await
            .expect("install");

        assert_eq!(outcome, InstallOutcome::Started);
        let calls = runner.calls();
        assert_eq!(calls[0], "docker info");
        assert_eq!(
            calls[1],
            format!(
                "docker run -d --log-driver local --network host --restart=always --name globalping-probe {PROBE_IMAGE}"
            )
        );
        let printed = String::from_utf8(out).expect("utf8");
        assert!(printed.contains("[Y/n]"));
        assert!(printed.contains("started successfully"));
    }

    #[tokio::test]
    async fn declined_install_runs_nothing() {
        let runner = ScriptedRunner::new(true);
        let mut input: &[u8] = b"n\n";
        let mut out = Vec::new();

        let outcome = install_probe(&runner, &mut input, &mut out)
            .await
            .expect("install");

        assert_eq!(outcome, InstallOutcome::Cancelled);
        assert_eq!(runner.calls(), ["docker info"]);
        assert!(String::from_utf8(out)
            .expect("utf8")
            .ends_with("Installation cancelled.\n"));
    }

    #[tokio::test]
    async fn missing_docker_is_an_error() {
        let runner = ScriptedRunner::new(false);
        let mut input: &[u8] = b"y\n";
        let mut out = Vec::new();

        let error = install_probe(&runner, &mut input, &mut out)
            .await
            .expect_err("no docker");

        assert!(error.to_string().contains("docker info command failed"));
        assert!(out.is_empty());
    }
}
