//! Interactive command - A prompt that outlives recoverable faults
//!
//! Each selection runs under `catch_unwind`, which plays the part of an
//! engine's topmost exception handler: the panic hook and the log see the
//! fault, and the prompt comes back. Native faults still end the process.

use std::io::Write;
use std::panic::{catch_unwind, AssertUnwindSafe};

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::error;

use crashlab_core::domain::{panic_message, FaultError};
use crashlab_faults::catalog::{self, FaultAction, FaultArgs};
use crashlab_faults::dispatch;

use crate::app::{AppContext, Session};
use crate::output::{get_formatter, OutputFormatter};

/// Arguments for the interactive subcommand
#[derive(Debug, clap::Args)]
pub struct InteractiveCommand {}

/// One parsed prompt line
#[derive(Debug)]
enum Input {
    Quit,
    List,
    Help,
    Run(&'static FaultAction, FaultArgs),
    Unknown(String),
    Empty,
}

/// Parses `<index|key> [seconds]`, `list`, `help` or `quit`.
fn parse_line(line: &str) -> Input {
    let mut words = line.split_whitespace();
    let Some(first) = words.next() else {
        return Input::Empty;
    };

    match first {
        "q" | "quit" | "exit" => return Input::Quit,
        "l" | "list" => return Input::List,
        "h" | "help" | "?" => return Input::Help,
        _ => {}
    }

    let action = match first.parse::<usize>() {
        Ok(index) => index
            .checked_sub(1)
            .and_then(|i| catalog::actions().get(i)),
        Err(_) => dispatch::resolve(first),
    };
    let Some(action) = action else {
        return Input::Unknown(first.to_string());
    };

    match words.next().map(str::parse::<u64>) {
        None => Input::Run(action, FaultArgs::default()),
        Some(Ok(seconds)) => Input::Run(action, FaultArgs::with_seconds(seconds)),
        Some(Err(_)) => Input::Unknown(line.trim().to_string()),
    }
}

fn print_menu() {
    for (index, action) in catalog::actions().iter().enumerate() {
        println!("{:>3}  {:<30} {}", index + 1, action.key, action.label);
    }
}

impl InteractiveCommand {
    pub async fn execute(&self, app: &AppContext) -> Result<()> {
        let formatter = get_formatter(app.format);
        let session = Session::launch(app)?;
        let interactive = !app.format.is_json();

        if interactive {
            print_menu();
            println!();
            println!("Enter an action number or key (optionally followed by seconds), 'list' or 'quit'.");
        }

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            if interactive {
                print!("crashlab> ");
                std::io::stdout().flush()?;
            }
            let Some(line) = lines.next_line().await? else {
                break;
            };

            match parse_line(&line) {
                Input::Quit => break,
                Input::Empty => {}
                Input::List => print_menu(),
                Input::Help => {
                    formatter.info("<number|key> [seconds]  run an action");
                    formatter.info("list                    show the catalog");
                    formatter.info("quit                    leave the session");
                }
                Input::Unknown(text) => formatter.warn(&format!("Unknown action '{text}'")),
                Input::Run(action, args) => {
                    run_guarded(&session, action, &args, formatter.as_ref(), app)
                }
            }
        }
        Ok(())
    }
}

/// Invokes `action`, reporting an escaped fault instead of unwinding further.
fn run_guarded(
    session: &Session,
    action: &FaultAction,
    args: &FaultArgs,
    formatter: &dyn OutputFormatter,
    app: &AppContext,
) {
    let outcome = catch_unwind(AssertUnwindSafe(|| action.invoke(&session.faults, args)));

    let (returned, fault) = match &outcome {
        Ok(()) => (true, None),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!("Unhandled fault in {}: {message}", action.key);
            let kind = FaultError::from_payload(payload.as_ref()).map(FaultError::kind);
            (false, Some((kind, message)))
        }
    };

    if app.format.is_json() {
        let (kind, message) = fault.unzip();
        formatter.print_json(&serde_json::json!({
            "action": action.key,
            "returned": returned,
            "fault_kind": kind.flatten(),
            "message": message,
        }));
    } else if let Some((_, message)) = fault {
        formatter.warn(&format!("{} raised: {message}", action.key));
    } else {
        formatter.success(&format!("{} returned", action.key));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_key(input: Input) -> Option<(&'static str, FaultArgs)> {
        match input {
            Input::Run(action, args) => Some((action.key, args)),
            _ => None,
        }
    }

    #[test]
    fn test_parse_index_and_key() {
        let first = catalog::actions()[0].key;
        assert_eq!(run_key(parse_line("1")), Some((first, FaultArgs::default())));
        assert_eq!(
            run_key(parse_line("  managed_null_ref ")),
            Some(("managed_null_ref", FaultArgs::default()))
        );
    }

    #[test]
    fn test_parse_seconds_and_alias() {
        assert_eq!(
            run_key(parse_line("desktop_hang 3")),
            Some(("desktop_hang", FaultArgs::with_seconds(3)))
        );
        assert_eq!(
            run_key(parse_line("managed_exception")),
            Some(("managed_unhandled", FaultArgs::default()))
        );
    }

    #[test]
    fn test_parse_commands_and_errors() {
        assert!(matches!(parse_line(""), Input::Empty));
        assert!(matches!(parse_line("quit"), Input::Quit));
        assert!(matches!(parse_line("list"), Input::List));
        assert!(matches!(parse_line("0"), Input::Unknown(ref s) if s == "0"));
        assert!(matches!(parse_line("999"), Input::Unknown(ref s) if s == "999"));
        assert!(matches!(
            parse_line("desktop_hang soon"),
            Input::Unknown(ref s) if s == "desktop_hang soon"
        ));
    }
}
