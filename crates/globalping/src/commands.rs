use std::io::Write;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use globalping_api::{ClientConfig, GlobalpingClient, Token, DEFAULT_SWEEP_INTERVAL};
use globalping_cli::{build_measurement, Cli, Command, MeasurementInvocation};
use globalping_orchestrator::{CooperativeCancellationToken, MeasurementSession};
use globalping_session::SessionHistory;
use globalping_view::{Printer, TerminalRenderer};
use tracing::debug;

use crate::auth_commands::execute_auth_command;
use crate::install_probe::execute_install_probe;
use crate::interrupt::spawn_interrupt_listener;
use crate::limits_command::execute_limits_command;
use crate::profile::ProfileStore;
use crate::shell::run_shell;

pub(crate) fn version_line() -> String {
    format!("Globalping CLI v{}", env!("CARGO_PKG_VERSION"))
}

/// Process-wide state: one API client and one measurement session.
pub(crate) struct App {
    pub(crate) ci: bool,
    pub(crate) share_url: String,
    pub(crate) api_interval_ms: u64,
    pub(crate) env_token: bool,
    pub(crate) profile: Arc<ProfileStore>,
    pub(crate) client: Arc<GlobalpingClient>,
    session: MeasurementSession,
}

impl App {
    pub(crate) fn from_cli(cli: &Cli) -> Result<Self> {
        let profile = Arc::new(ProfileStore::new(cli.profile_path()?));
        let env_token = cli
            .token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty());
        let token = match env_token {
            Some(token) => Some(Token::pinned(token)),
            None => profile.load()?,
        };

        let mut config = ClientConfig {
            api_url: cli.api_url.clone(),
            auth_url: cli.auth_url.clone(),
            request_timeout_ms: cli.request_timeout_ms,
            max_retries: cli.max_retries,
            ..ClientConfig::default()
        };
        if let Some(client_id) = &cli.auth_client_id {
            config.auth_client_id = client_id.clone();
        }
        if let Some(client_secret) = &cli.auth_client_secret {
            config.auth_client_secret = client_secret.clone();
        }

        let client = Arc::new(
            GlobalpingClient::new(config, token)
                .context("failed to build api client")?
                .with_token_observer(profile.clone())
                .with_cache_sweeper(DEFAULT_SWEEP_INTERVAL),
        );
        let session = MeasurementSession::new(client.clone());
        Ok(Self {
            ci: cli.ci,
            share_url: cli.share_url.clone(),
            api_interval_ms: cli.api_interval_ms,
            env_token: env_token.is_some(),
            profile,
            client,
            session,
        })
    }

    pub(crate) fn history(&self) -> &SessionHistory {
        self.session.history()
    }

    pub(crate) async fn execute(&mut self, cli: &Cli) -> Result<()> {
        match &cli.command {
            Command::Auth { command } => execute_auth_command(self, command).await,
            Command::Limits => execute_limits_command(&self.client).await,
            Command::History => write_history(&mut std::io::stdout(), self.history()),
            Command::Version => {
                println!("{}", version_line());
                Ok(())
            }
            Command::InstallProbe => execute_install_probe().await,
            Command::Shell => bail!("the interactive shell is already running"),
            _ => match build_measurement(cli)? {
                Some(invocation) => self.run_measurement(invocation).await,
                None => Ok(()),
            },
        }
    }

    async fn run_measurement(&mut self, invocation: MeasurementInvocation) -> Result<()> {
        let MeasurementInvocation { ctx, request } = invocation;
        let mut printer = Printer::stdio();
        if ctx.ci_mode {
            printer.disable_styling();
        }
        let mut renderer = TerminalRenderer::new(printer);

        let cancellation = CooperativeCancellationToken::new();
        let listener = spawn_interrupt_listener(cancellation.clone());
        let result = self
            .session
            .run(&ctx, request, &mut renderer, &cancellation)
            .await;
        listener.abort();

        let measurement = result?;
        debug!(id = %measurement.id, probes = measurement.results.len(), "measurement finished");
        Ok(())
    }
}

pub(crate) async fn run_cli(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Version => {
            println!("{}", version_line());
            return Ok(());
        }
        Command::InstallProbe => return execute_install_probe().await,
        _ => {}
    }
    let mut app = App::from_cli(&cli)?;
    match cli.command {
        Command::Shell => run_shell(&mut app).await,
        _ => app.execute(&cli).await,
    }
}

/// Lists session records oldest first with their `@N` reference.
pub(crate) fn write_history(out: &mut dyn Write, history: &SessionHistory) -> Result<()> {
    if history.is_empty() {
        writeln!(out, "No measurements in this session.")?;
        return Ok(());
    }
    for (index, record) in history.iter().enumerate() {
        let probes = record.probes.len();
        let noun = if probes == 1 { "probe" } else { "probes" };
        writeln!(out, "@{}\t{}\t{probes} {noun}", index + 1, record.id)?;
    }
    Ok(())
}
