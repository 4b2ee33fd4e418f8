pub mod application;
pub mod domain;
pub mod infrastructure;

use application::bootstrap::bootstrap_workspace;
use application::commands::{
    complete_task_impl, get_countdown_status_impl, get_history_impl, set_notifications_enabled_impl,
    start_ticker_impl, AppState, CompleteTaskResponse, CountdownStatusResponse,
    NotificationSettingResponse,
};
use application::countdown_controller::CountdownView;
use application::history::HistorySnapshot;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

const WORKSPACE_ENV: &str = "TASKLY_WORKSPACE";

#[derive(Parser)]
#[command(name = "taskly", version, about = "Recurring task countdown with local reminders")]
struct Cli {
    /// Workspace directory holding config, state and logs
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the workspace layout and print its paths
    Bootstrap,
    /// Print the current countdown as JSON
    Status,
    /// Print completion history, newest first
    History,
    /// Grant or revoke reminder notifications
    Notifications {
        #[arg(value_enum)]
        setting: Toggle,
    },
    /// Live countdown; type `done`, `history` or `quit`
    Watch,
}

#[derive(Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

#[derive(Debug, Serialize)]
struct BootstrapResponse {
    workspace_root: String,
    database_path: String,
}

fn resolve_workspace_root(root: Option<PathBuf>) -> Result<PathBuf, String> {
    if let Some(path) = root {
        return Ok(path);
    }
    if let Some(path) = std::env::var_os(WORKSPACE_ENV).filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    std::env::current_dir().map_err(|error| error.to_string())
}

fn bootstrap(workspace_root: PathBuf) -> Result<BootstrapResponse, String> {
    let result = bootstrap_workspace(&workspace_root).map_err(|error| error.to_string())?;
    Ok(BootstrapResponse {
        workspace_root: result.workspace_root.display().to_string(),
        database_path: result.database_path.display().to_string(),
    })
}

fn countdown_status(state: &AppState) -> Result<CountdownStatusResponse, String> {
    get_countdown_status_impl(state).map_err(|error| state.command_error("countdown_status", &error))
}

async fn complete_task(state: &AppState) -> Result<CompleteTaskResponse, String> {
    complete_task_impl(state)
        .await
        .map_err(|error| state.command_error("complete_task", &error))
}

fn history(state: &AppState) -> Result<HistorySnapshot, String> {
    get_history_impl(state).map_err(|error| state.command_error("history", &error))
}

fn set_notifications(state: &AppState, enabled: bool) -> Result<NotificationSettingResponse, String> {
    set_notifications_enabled_impl(state, enabled)
        .map_err(|error| state.command_error("set_notifications_enabled", &error))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let formatted = serde_json::to_string_pretty(value).map_err(|error| error.to_string())?;
    println!("{formatted}");
    Ok(())
}

fn render_view(view: CountdownView, task_label: &str) -> String {
    let response = CountdownStatusResponse::from_view(view, task_label);
    match response.headline {
        None => "Loading...".to_string(),
        Some(headline) => format!(
            "{headline} {} days {} hours {} minutes {} seconds",
            response.days, response.hours, response.minutes, response.seconds
        ),
    }
}

async fn watch(state: &AppState) -> Result<(), String> {
    let ticker = start_ticker_impl(state).map_err(|error| state.command_error("watch", &error))?;
    let task_label = state.config().task_label.clone();
    let mut updates = ticker.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Commands: done | history | quit");
    let initial = *updates.borrow_and_update();
    println!("{}", render_view(initial, &task_label));

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = *updates.borrow_and_update();
                println!("{}", render_view(view, &task_label));
            }
            line = lines.next_line() => {
                match line.map_err(|error| error.to_string())? {
                    None => break,
                    Some(input) => match input.trim() {
                        "done" => match complete_task(state).await {
                            Ok(response) => {
                                if let Some(warning) = &response.warning {
                                    println!("{warning}");
                                }
                                println!("Marked done ({} completions)", response.history_length);
                            }
                            Err(error) => println!("Could not record completion: {error}"),
                        },
                        "history" => println!("{}", history(state)?.render()),
                        "quit" | "exit" => break,
                        "" => {}
                        other => println!("Unknown command '{other}'"),
                    },
                }
            }
        }
    }

    ticker.stop();
    info!("[TICK] watch session closed");
    Ok(())
}

async fn dispatch(cli: Cli) -> Result<(), String> {
    let workspace_root = resolve_workspace_root(cli.root)?;
    if let Commands::Bootstrap = cli.command {
        return print_json(&bootstrap(workspace_root)?);
    }

    let state = AppState::new(workspace_root).map_err(|error| error.to_string())?;
    match cli.command {
        Commands::Bootstrap => Ok(()),
        Commands::Status => print_json(&countdown_status(&state)?),
        Commands::History => {
            println!("{}", history(&state)?.render());
            Ok(())
        }
        Commands::Notifications { setting } => {
            print_json(&set_notifications(&state, matches!(setting, Toggle::On))?)
        }
        Commands::Watch => watch(&state).await,
    }
}

pub fn run() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime.block_on(dispatch(cli)),
        Err(error) => Err(format!("failed to start runtime: {error}")),
    };

    if let Err(error) = result {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{CountdownStatus, DurationParts};

    #[test]
    fn cli_parses_watch_with_root() {
        let cli = Cli::try_parse_from(["taskly", "--root", "/tmp/taskly", "watch"]).expect("parse");
        assert_eq!(cli.root, Some(PathBuf::from("/tmp/taskly")));
        assert!(matches!(cli.command, Commands::Watch));
    }

    #[test]
    fn cli_rejects_unknown_toggle() {
        assert!(Cli::try_parse_from(["taskly", "notifications", "maybe"]).is_err());
    }

    #[test]
    fn explicit_root_wins() {
        let root = resolve_workspace_root(Some(PathBuf::from("/srv/taskly"))).expect("resolve");
        assert_eq!(root, PathBuf::from("/srv/taskly"));
    }

    #[test]
    fn render_view_shows_all_units() {
        let view = CountdownView::Ready(CountdownStatus {
            is_overdue: true,
            distance: DurationParts {
                days: 1,
                hours: 2,
                minutes: 3,
                seconds: 4,
            },
        });
        assert_eq!(
            render_view(view, "Car wash"),
            "Car wash overdue by 1 days 2 hours 3 minutes 4 seconds"
        );
        assert_eq!(render_view(CountdownView::Loading, "Car wash"), "Loading...");
    }
}
