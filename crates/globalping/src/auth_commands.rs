use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, SecondsFormat};
use globalping_api::{generate_state, GlobalpingClient, PkcePair, Token};
use globalping_cli::AuthCommand;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::commands::App;
use crate::oauth_callback::CallbackServer;

const BROWSER_LOGIN_TIMEOUT: Duration = Duration::from_secs(300);

pub(crate) async fn execute_auth_command(app: &mut App, command: &AuthCommand) -> Result<()> {
    match command {
        AuthCommand::Login { with_token } => {
            if app.env_token {
                bail!("GLOBALPING_TOKEN is set; unset it before storing a token");
            }
            let token = if *with_token {
                Token::pinned(read_token_from_stdin().await?)
            } else {
                browser_login(&app.client, BROWSER_LOGIN_TIMEOUT, |url| {
                    eprintln!("Please visit the following URL to authenticate:\n{url}\n");
                })
                .await?
            };
            app.profile.save(Some(&token))?;
            app.client.set_token(Some(token)).await;
            println!("Logged in successfully.");
            Ok(())
        }
        AuthCommand::Status => {
            let token = if app.env_token {
                None
            } else {
                app.profile.load()?
            };
            println!("{}", auth_status_line(app.env_token, token.as_ref()));
            Ok(())
        }
        AuthCommand::Logout => {
            if app.env_token {
                bail!("the token comes from GLOBALPING_TOKEN; unset the variable to log out");
            }
            let Some(token) = app.profile.load()? else {
                println!("You are not logged in.");
                return Ok(());
            };
            if let Some(refresh_token) = token.refresh_token.as_deref() {
                if let Err(error) = app.client.revoke_token(refresh_token).await {
                    warn!(%error, "failed to revoke refresh token");
                }
            }
            app.profile.save(None)?;
            app.client.set_token(None).await;
            println!("You are now logged out.");
            Ok(())
        }
    }
}

/// Runs the PKCE authorization-code flow against a loopback redirect.
///
/// `show_url` receives the page the user must open; the returned token
/// carries a refresh token and is not pinned.
pub(crate) async fn browser_login(
    client: &GlobalpingClient,
    timeout: Duration,
    show_url: impl FnOnce(&str),
) -> Result<Token> {
    let server = CallbackServer::bind().await?;
    let redirect_uri = server.redirect_uri();
    let pkce = PkcePair::generate();
    let state = generate_state();
    let url = client.authorization_url(&redirect_uri, &pkce, &state)?;
    show_url(&url);

    let code = server.wait_for_code(&state, timeout).await?;
    let token = client
        .exchange_authorization_code(&code, &pkce.verifier, &redirect_uri)
        .await
        .context("failed to exchange the authorization code")?;
    info!(expiry_unix = token.expiry_unix, "browser login completed");
    Ok(token)
}

async fn read_token_from_stdin() -> Result<String> {
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("failed to read token from stdin")?;
    let token = line.trim();
    if token.is_empty() {
        bail!("no token was provided on stdin");
    }
    Ok(token.to_string())
}

fn auth_status_line(env_token: bool, token: Option<&Token>) -> String {
    if env_token {
        return "Logged in with the token from GLOBALPING_TOKEN.".to_string();
    }
    let Some(token) = token else {
        return "Not logged in.".to_string();
    };
    if token.is_pinned() {
        return "Logged in with a token that does not expire.".to_string();
    }
    let expiry = i64::try_from(token.expiry_unix)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|expiry| expiry.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| token.expiry_unix.to_string());
    if token.refresh_token.is_some() {
        format!("Logged in. Access token expires at {expiry} and is refreshed automatically.")
    } else {
        format!("Logged in. Access token expires at {expiry}.")
    }
}
