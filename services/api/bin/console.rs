//! Terminal front end for a single conversation.
//!
//! Lines typed on stdin are commands (`/start`, `/theme`, `/pause`, `/quit`) or
//! human messages. Turns are printed as they are appended.

use anyhow::Context;
use clap::Parser;
use duologue_api::{config::Config, state::build_boundary};
use duologue_core::{
    Phase, SchedulerHandle, SessionEvent, Speaker, Turn, TurnExecutor, TurnScheduler,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(version, about = "Watch ChatGPT and Gemini talk to each other")]
struct Args {
    /// Theme to start the conversation with right away.
    #[arg(short, long)]
    theme: Option<String>,
}

enum Input {
    Start(Option<String>),
    Theme(String),
    Pause,
    Quit,
    Message(String),
}

fn parse_input(line: &str) -> Option<Input> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };
    let input = match command {
        "/start" if rest.is_empty() => Input::Start(None),
        "/start" => Input::Start(Some(rest.to_string())),
        "/theme" => Input::Theme(rest.to_string()),
        "/pause" => Input::Pause,
        "/quit" | "/exit" => Input::Quit,
        _ => Input::Message(line.to_string()),
    };
    Some(input)
}

fn label(role: Speaker) -> &'static str {
    match role {
        Speaker::User => "You",
        Speaker::ChatGpt => "ChatGPT",
        Speaker::Gemini => "Gemini",
        Speaker::System => "--",
    }
}

fn print_turn(turn: &Turn) {
    println!("{:>8}: {}", label(turn.role), turn.content);
}

async fn dispatch(scheduler: &SchedulerHandle, input: Input) -> anyhow::Result<bool> {
    match input {
        Input::Start(Some(theme)) => scheduler.start(theme).await?,
        Input::Start(None) => {
            let theme = scheduler.snapshot().await?.theme;
            scheduler.start(theme).await?
        }
        Input::Theme(theme) => scheduler.set_theme(theme).await?,
        Input::Pause => scheduler.toggle_pause().await?,
        Input::Quit => return Ok(false),
        Input::Message(text) => scheduler.submit(text).await?,
    }
    Ok(true)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::from_env().context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    let boundary = Arc::new(build_boundary(&config));
    let missing = boundary.check_capabilities().missing_env_vars();
    if !missing.is_empty() {
        warn!(?missing, "Set {} in .env.", missing.join(" and "));
    }

    let executor: Arc<dyn TurnExecutor> = boundary;
    let (scheduler, mut events, scheduler_task) = TurnScheduler::spawn(config.scheduler, executor);

    if let Some(theme) = args.theme {
        scheduler.start(theme).await?;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let Some(input) = parse_input(&line) else { continue };
                if !dispatch(&scheduler, input).await? {
                    break;
                }
            },
            Some(event) = events.recv() => match event {
                SessionEvent::TurnAppended(turn) => print_turn(&turn),
                SessionEvent::Thinking { speaker } => {
                    println!("{:>8}  ...", label(speaker.into()));
                }
                SessionEvent::ThinkingCleared => {}
                SessionEvent::PhaseChanged(phase @ (Phase::Paused | Phase::Idle)) => {
                    info!(?phase, "Conversation halted.");
                }
                SessionEvent::PhaseChanged(_) => {}
            },
            else => break,
        }
    }

    drop(scheduler);
    scheduler_task.abort();
    Ok(())
}
