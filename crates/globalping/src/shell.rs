use anyhow::{anyhow, Context, Result};
use clap::Parser;
use globalping_cli::Cli;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::commands::App;
use crate::report_error;

const SHELL_PROMPT: &str = "globalping> ";

#[derive(Debug, PartialEq, Eq)]
enum ShellInput {
    Empty,
    Exit,
    Args(Vec<String>),
}

/// Interactive prompt; every line shares the session history of `app`.
pub(crate) async fn run_shell(app: &mut App) -> Result<()> {
    let mut editor = DefaultEditor::new().context("failed to initialize interactive editor")?;
    println!("{}", crate::commands::version_line());
    println!("Type a measurement command such as `ping example.com from last`, `history` or `exit`.");

    loop {
        let readline = tokio::task::block_in_place(|| editor.readline(SHELL_PROMPT));
        let line = match readline {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(error) => return Err(anyhow!("failed to read interactive input: {error}")),
        };

        let args = match parse_shell_line(&line) {
            Ok(ShellInput::Empty) => continue,
            Ok(ShellInput::Exit) => break,
            Ok(ShellInput::Args(args)) => args,
            Err(error) => {
                report_error(&error);
                continue;
            }
        };
        let _ = editor.add_history_entry(line.trim());

        let mut cli = match Cli::try_parse_from(std::iter::once("globalping".to_string()).chain(args)) {
            Ok(cli) => cli,
            Err(error) => {
                let _ = error.print();
                continue;
            }
        };
        cli.ci |= app.ci;
        cli.share_url = app.share_url.clone();
        cli.api_interval_ms = app.api_interval_ms;

        if let Err(error) = app.execute(&cli).await {
            report_error(&error);
        }
    }
    Ok(())
}

fn parse_shell_line(line: &str) -> Result<ShellInput> {
    let mut words = shell_words::split(line.trim())
        .map_err(|error| anyhow!("failed to parse input: {error}"))?;
    if words.first().is_some_and(|word| word == "globalping") {
        words.remove(0);
    }
    Ok(match words.first().map(String::as_str) {
        None => ShellInput::Empty,
        Some("exit" | "quit") => ShellInput::Exit,
        Some(_) => ShellInput::Args(words),
    })
}

#[cfg(test)]
mod tests {
    use super::{parse_shell_line, ShellInput};

    #[test]
    fn blank_and_exit_lines_are_recognized() {
        assert_eq!(parse_shell_line("   ").expect("blank"), ShellInput::Empty);
        assert_eq!(parse_shell_line("exit").expect("exit"), ShellInput::Exit);
        assert_eq!(parse_shell_line("quit").expect("quit"), ShellInput::Exit);
        assert_eq!(parse_shell_line("globalping").expect("bare"), ShellInput::Empty);
    }

    #[test]
    fn lines_are_split_like_a_shell() {
        assert_eq!(
            parse_shell_line("globalping http example.com -H 'X-Test: yes' from \"New York\"")
                .expect("line"),
            ShellInput::Args(vec![
                "http".to_string(),
                "example.com".to_string(),
                "-H".to_string(),
                "X-Test: yes".to_string(),
                "from".to_string(),
                "New York".to_string(),
            ])
        );
        assert!(parse_shell_line("ping 'unterminated").is_err());
    }
}
