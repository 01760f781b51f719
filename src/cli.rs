use anyhow::{bail, Context, Result};
use futures::future::join_all;
use std::sync::Arc;

use crate::config::{self, AppConfig};
use crate::server::{self, AppState};
use crate::sync::dispatch::start_watchers;
use crate::model::board::WriteOutcome;
use crate::sync::log::ActivityLog;
use crate::sync::mark::{mark_item, MarkOutcome};
use crate::sync::policy::{Bounded, FixedInterval};
use crate::sync::watch::{spawn_status_watch, WatchState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Serve,
    Sync {
        max_polls: Option<u32>,
    },
    Watch(String),
    Mark(String),
    History {
        issue: Option<String>,
        limit: Option<usize>,
    },
    Help,
}

/// Parse CLI args (without the program name) into a command.
///
/// Supported forms:
///   donesync [serve]
///   donesync sync [--max-polls 30]
///   donesync watch KT-1
///   donesync mark Test Project 1
///   donesync history [KT-1] [-n 20]
pub fn parse_args(args: &[String]) -> Result<Command> {
    let Some(first) = args.first() else {
        return Ok(Command::Serve);
    };
    let rest = &args[1..];

    match first.as_str() {
        "serve" => Ok(Command::Serve),
        "sync" => parse_sync_args(rest),
        "watch" => match rest {
            [key] => Ok(Command::Watch(key.clone())),
            [] => bail!("Usage: donesync watch <ISSUE-KEY>"),
            _ => bail!("watch takes exactly one issue key"),
        },
        "mark" => {
            let name = rest.join(" ");
            if name.trim().is_empty() {
                bail!("Usage: donesync mark <ITEM NAME>");
            }
            Ok(Command::Mark(name))
        }
        "history" => parse_history_args(rest),
        "help" | "-h" | "--help" => Ok(Command::Help),
        other => bail!("Unknown command: {other}\n\nRun `donesync help` for usage."),
    }
}

fn parse_sync_args(args: &[String]) -> Result<Command> {
    match args {
        [] => Ok(Command::Sync { max_polls: None }),
        [flag, value] if flag == "--max-polls" => {
            let max_polls: u32 = value
                .parse()
                .with_context(|| format!("Invalid poll count: {value}"))?;
            if max_polls == 0 {
                bail!("--max-polls must be at least 1");
            }
            Ok(Command::Sync {
                max_polls: Some(max_polls),
            })
        }
        [flag] if flag == "--max-polls" => bail!("Missing value for --max-polls flag"),
        _ => bail!("Usage: donesync sync [--max-polls <N>]"),
    }
}

fn parse_history_args(args: &[String]) -> Result<Command> {
    let mut issue = None;
    let mut limit = None;
    let mut i = 0;

    while i < args.len() {
        match args[i].as_str() {
            "-n" | "--limit" => {
                i += 1;
                let value = args.get(i).context("Missing value for -n/--limit flag")?;
                limit = Some(
                    value
                        .parse()
                        .with_context(|| format!("Invalid limit: {value}"))?,
                );
            }
            key if issue.is_none() => issue = Some(key.to_string()),
            extra => bail!("Unexpected argument: {extra}"),
        }
        i += 1;
    }

    Ok(Command::History { issue, limit })
}

pub async fn run(command: Command) -> Result<()> {
    match command {
        Command::Help => {
            print_help();
            Ok(())
        }
        Command::History { issue, limit } => {
            print_history(&ActivityLog::default_location(), issue.as_deref(), limit);
            Ok(())
        }
        Command::Serve => {
            let config = config::load_config()?;
            let ctx = config.sync_context()?;
            let state = Arc::new(AppState::new(
                ctx,
                config.board_id()?,
                config.watch.status_interval(),
            ));
            server::serve(state, &config.server.bind).await
        }
        Command::Sync { max_polls } => run_sync(&config::load_config()?, max_polls).await,
        Command::Watch(key) => {
            let config = config::load_config()?;
            let issues = Arc::new(config.jira_client()?);
            let mut handle = spawn_status_watch(
                issues,
                key,
                Arc::new(FixedInterval::new(config.watch.status_interval())),
                ActivityLog::default_location(),
            );
            tokio::select! {
                report = handle.join() => {
                    if let Some(report) = report {
                        println!(
                            "{}: last status '{}' after {} poll(s)",
                            report.issue_key,
                            report.last_status.as_deref().unwrap_or("unknown"),
                            report.polls
                        );
                        if let Some(err) = report.error {
                            bail!("Watcher stopped: {err}");
                        }
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    handle.cancel();
                    println!("\nWatcher stopped by user.");
                }
            }
            Ok(())
        }
        Command::Mark(name) => run_mark(&config::load_config()?, &name).await,
    }
}

/// Dispatches once and waits until every watcher finishes or Ctrl-C.
async fn run_sync(config: &AppConfig, max_polls: Option<u32>) -> Result<()> {
    let mut ctx = config.sync_context()?;
    if let Some(max_polls) = max_polls {
        ctx = ctx.with_policy(Arc::new(Bounded::new(max_polls, config.watch.interval())));
    }
    let board_id = config.board_id()?;
    let dispatch = start_watchers(&ctx, &board_id)
        .await
        .context("Failed to list board items")?;

    println!("Started {} watcher(s):", dispatch.summary.count);
    for target in &dispatch.summary.targets {
        println!("  {} -> {} ({})", target.issue_key, target.item_name, target.item_id);
    }
    if dispatch.handles.is_empty() {
        return Ok(());
    }

    let mut handles = dispatch.handles;
    tokio::select! {
        reports = join_all(handles.iter_mut().map(|h| h.join())) => {
            for report in reports.into_iter().flatten() {
                let outcome = match (report.state, &report.completion, &report.error) {
                    (WatchState::Done, Some(c), _) => format!("{c:?}"),
                    (state, _, Some(err)) => format!("{state:?} ({err})"),
                    (state, _, None) => format!("{state:?}"),
                };
                println!(
                    "  {} after {} poll(s): {outcome}",
                    report.target.issue_key, report.polls
                );
            }
        }
        _ = tokio::signal::ctrl_c() => {
            for handle in &handles {
                handle.cancel();
            }
            println!("\nStopped watching.");
        }
    }
    Ok(())
}

/// Finds a board item by name across the search boards and marks it.
async fn run_mark(config: &AppConfig, name: &str) -> Result<()> {
    let board = config.monday_client()?;
    let boards = config.search_boards()?;
    let outcome = mark_item(
        &board,
        &config.allow_list,
        &boards,
        name,
        &config.watch.status_label,
    )
    .await
    .context("Failed to mark board item")?;

    match outcome {
        MarkOutcome::NotFound => bail!("Item '{name}' not found"),
        MarkOutcome::NotAllowed(found) => {
            bail!("'{}' is not in the allow-list; nothing written", found.item.name)
        }
        MarkOutcome::Marked { found, outcome } => {
            println!("Item ID for '{}': {}", found.item.name, found.item.id);
            match outcome {
                WriteOutcome::Applied {
                    item_name,
                    status_text,
                } => println!(
                    "Updated '{item_name}' to {}",
                    status_text.as_deref().unwrap_or(&config.watch.status_label)
                ),
                WriteOutcome::Rejected(errors) => {
                    bail!("monday.com rejected the update: {}", errors.join("; "))
                }
            }
        }
    }
    Ok(())
}

fn print_history(log: &ActivityLog, issue: Option<&str>, limit: Option<usize>) {
    let events = log.read_events(issue, limit.or(Some(50)));
    if events.is_empty() {
        println!("No sync activity recorded.");
        return;
    }
    for e in events {
        let item = e.item_name.as_deref().unwrap_or("-");
        match e.message {
            Some(msg) => println!("{} {:<8} {:<15} {item}: {msg}", e.timestamp, e.issue_key, e.event),
            None => println!("{} {:<8} {:<15} {item}", e.timestamp, e.issue_key, e.event),
        }
    }
}

pub fn print_help() {
    println!("donesync — mark board items up to date when their Jira issues are done\n");
    println!("USAGE:");
    println!("  donesync                  Serve the HTTP API (same as `serve`)");
    println!("  donesync sync             Watch every allow-listed board item until done");
    println!("    --max-polls <N>         Give up on an item after N polls");
    println!("  donesync watch <KEY>      Print status changes of one issue");
    println!("  donesync mark <NAME>      Mark one allow-listed board item, found by name");
    println!("  donesync history [KEY]    Show recorded sync activity");
    println!();
    println!("HISTORY OPTIONS:");
    println!("  -n, --limit <N>  Show at most N events (default 50)");
    println!();
    println!("CONFIG:");
    println!("  ~/.donesync/config.toml (override with DONESYNC_CONFIG)");
}
