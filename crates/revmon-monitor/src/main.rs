use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use revmon_lifecycle::{CommandOutcome, HttpReviewCommands};
use revmon_monitor::{
    load_config, load_frames, load_records, render_entries, render_status, replay,
    ReviewMonitor,
};
use revmon_stream::ChannelTransport;
use std::path::PathBuf;
use std::sync::Arc;

const DEFAULT_API: &str = "http://127.0.0.1:3000";

fn records_arg(required: bool) -> Arg {
    Arg::new("records")
        .long("records")
        .required(required)
        .value_parser(value_parser!(PathBuf))
        .help("JSON file with the attempt's execution records")
}

fn json_arg() -> Arg {
    Arg::new("json")
        .long("json")
        .action(ArgAction::SetTrue)
        .help("Output as JSON")
}

fn attempt_arg() -> Arg {
    Arg::new("attempt")
        .long("attempt")
        .required(true)
        .help("Task attempt id")
}

fn cli() -> Command {
    Command::new("revmon")
        .version(revmon_monitor::VERSION)
        .about("Review monitor: review status and review log replay")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Review config (TOML); defaults apply when omitted"),
        )
        .arg(
            Arg::new("api")
                .long("api")
                .global(true)
                .default_value(DEFAULT_API)
                .help("Backend base URL for review commands"),
        )
        .subcommand(
            Command::new("status")
                .about("Derive the review status from execution records")
                .arg(records_arg(true))
                .arg(
                    Arg::new("skipped")
                        .long("skipped")
                        .action(ArgAction::SetTrue)
                        .help("Apply a local skip"),
                )
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("replay")
                .about("Replay a recorded review log stream")
                .arg(records_arg(true))
                .arg(
                    Arg::new("logs")
                        .long("logs")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Recorded wire frames, one per line"),
                )
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("start")
                .about("Ask the backend to start a review")
                .arg(attempt_arg())
                .arg(records_arg(false)),
        )
        .subcommand(
            Command::new("retry")
                .about("Ask the backend to retry a failed review")
                .arg(attempt_arg())
                .arg(records_arg(true)),
        )
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

type Monitor = ReviewMonitor<ChannelTransport, HttpReviewCommands>;

async fn monitor_for(matches: &ArgMatches, attempt: &str) -> anyhow::Result<Monitor> {
    let config = load_config(matches.get_one::<PathBuf>("config").map(PathBuf::as_path))?;
    let api = matches
        .get_one::<String>("api")
        .map_or(DEFAULT_API, String::as_str);
    let monitor = ReviewMonitor::new(
        config,
        Arc::new(ChannelTransport::default()),
        HttpReviewCommands::new(api),
    );
    monitor.bind_attempt(Some(attempt.to_string())).await?;
    Ok(monitor)
}

fn required_path<'a>(matches: &'a ArgMatches, id: &str) -> anyhow::Result<&'a PathBuf> {
    matches
        .get_one::<PathBuf>(id)
        .with_context(|| format!("--{id} is required"))
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_status(matches: &ArgMatches) -> anyhow::Result<()> {
    let records = load_records(required_path(matches, "records")?)?;
    let monitor = monitor_for(matches, "local").await?;
    if matches.get_flag("skipped") {
        monitor.skip_review().await?;
    }
    monitor.update_records(records).await?;

    let snapshot = monitor.snapshot();
    if matches.get_flag("json") {
        print_json(&snapshot)
    } else {
        print!(
            "{}",
            render_status(&snapshot, monitor.controller().config().max_retries)
        );
        Ok(())
    }
}

async fn run_replay(matches: &ArgMatches) -> anyhow::Result<()> {
    let records = load_records(required_path(matches, "records")?)?;
    let frames = load_frames(required_path(matches, "logs")?)?;
    let monitor = monitor_for(matches, "local").await?;

    let report = replay(&monitor, records, &frames).await?;
    if matches.get_flag("json") {
        return print_json(&report);
    }

    print!(
        "{}",
        render_status(&report.snapshot, monitor.controller().config().max_retries)
    );
    if report.entries.is_empty() {
        println!("(no review logs)");
    } else {
        println!();
        print!("{}", render_entries(&report.entries));
    }
    for warning in &report.warnings {
        eprintln!("warning: {warning}");
    }
    if let Some(failure) = &report.failure {
        eprintln!("stream failed: {failure}");
    }
    Ok(())
}

async fn run_command(matches: &ArgMatches, retry: bool) -> anyhow::Result<()> {
    let attempt = matches
        .get_one::<String>("attempt")
        .context("--attempt is required")?;
    let monitor = monitor_for(matches, attempt).await?;
    if let Some(path) = matches.get_one::<PathBuf>("records") {
        monitor.update_records(load_records(path)?).await?;
    }

    let outcome = if retry {
        monitor.retry_review().await?
    } else {
        monitor.start_review().await?
    };

    let snapshot = monitor.snapshot();
    match outcome {
        CommandOutcome::Sent => {
            println!("review {} requested for {attempt}", if retry { "retry" } else { "start" });
            Ok(())
        }
        CommandOutcome::Ignored => {
            anyhow::bail!("nothing to do: review is {}", snapshot.execution.status)
        }
        CommandOutcome::BudgetExceeded | CommandOutcome::Failed => {
            anyhow::bail!(snapshot.error.unwrap_or_else(|| "review command failed".to_string()))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let matches = cli().get_matches();

    match matches.subcommand() {
        Some(("status", sub)) => run_status(sub).await,
        Some(("replay", sub)) => run_replay(sub).await,
        Some(("start", sub)) => run_command(sub, false).await,
        Some(("retry", sub)) => run_command(sub, true).await,
        _ => {
            cli().print_help()?;
            Ok(())
        }
    }
}
