mod command;

use anyhow::Context;
use rustyline::error::ReadlineError;
use std::io::{self, Write};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use command::Command;
use uigen_core::config::AgentCfg;
use uigen_core::io::events::{self, AgentEvent};
use uigen_core::routing::InboundPart;
use uigen_core::schema;
use uigen_core::session::new_session_id;
use uigen_core::types::{ResponsePart, SessionMode};
use uigen_core::UiAgent;
use uigen_llm::provider::LlmProvider;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cfg = AgentCfg::from_env();
    let provider = uigen_llm::http::from_env()
        .context("no model configured: set UIGEN_LLM_MODEL and UIGEN_LLM_API_KEY")?;
    tracing::info!(provider = provider.name(), model = provider.model(), "model provider ready");

    let mut mode = if std::env::args().any(|a| a == "--text") { SessionMode::TextOnly } else { SessionMode::Ui };
    let agent = UiAgent::new(Arc::new(provider), cfg);
    if !agent.ui_available()
        && let Err(e) = schema::global()
    {
        eprintln!("warning: UI schema unavailable ({e}); UI turns will fail");
    }

    println!("uigen: describe a UI, or /help for commands (mode: {})", mode.as_str());

    let (line_tx, mut line_rx) = mpsc::unbounded_channel::<InputEvent>();
    let (ready_tx, ready_rx) = std::sync::mpsc::channel::<()>();
    spawn_input_thread(line_tx, ready_rx);

    let mut session_id = new_session_id();
    loop {
        request_next_prompt(&ready_tx);
        let Some(input) = line_rx.recv().await else {
            break;
        };
        let line = match input {
            InputEvent::Line(line) => line,
            InputEvent::Interrupted | InputEvent::Eof => break,
            InputEvent::Error(err) => {
                eprintln!("input error: {err}");
                break;
            }
        };
        let Some(command) = command::parse(&line) else {
            continue;
        };

        match command {
            Command::Send(parts) => run_turn(&agent, &session_id, &parts, mode).await?,
            Command::Mode(next) => {
                mode = next;
                println!("mode: {}", mode.as_str());
            }
            Command::NewSession => {
                session_id = new_session_id();
                println!("new session {session_id}");
            }
            Command::Config => {
                for (key, value, description) in agent.config().to_entries() {
                    println!("  {key:<24} {value:<24} {description}");
                }
            }
            Command::Help => println!("{}", command::HELP),
            Command::Quit => break,
            Command::Invalid(msg) => eprintln!("{msg}"),
        }
    }
    drop(ready_tx);
    println!();
    Ok(())
}

/// Logs go to stderr; `UIGEN_LOG_JSON=1` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let json = std::env::var("UIGEN_LOG_JSON").is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_target(true).with_writer(io::stderr)).init();
    } else {
        registry.with(fmt::layer().with_target(false).with_writer(io::stderr)).init();
    }
}

/// Drive one turn, printing events as they arrive. Ctrl-C cancels the turn.
async fn run_turn(agent: &UiAgent, session_id: &str, parts: &[InboundPart], mode: SessionMode) -> anyhow::Result<()> {
    let (tx, mut rx) = events::channel(agent.config().event_buffer);
    let cancel = CancellationToken::new();

    let turn = agent.handle_turn(session_id, parts, mode, &tx, &cancel);
    tokio::pin!(turn);

    let outcome = loop {
        tokio::select! {
            outcome = &mut turn => break outcome,
            Some(event) = rx.recv() => print_event(&event)?,
            _ = tokio::signal::ctrl_c(), if !cancel.is_cancelled() => {
                clear_current_line()?;
                println!("cancelling...");
                cancel.cancel();
            }
        }
    };
    for event in events::drain(&mut rx) {
        print_event(&event)?;
    }
    tracing::debug!(
        state = outcome.state.as_str(),
        attempts = outcome.attempts,
        ui_messages = outcome.ui_messages().len(),
        "turn done"
    );
    if outcome.state.is_final() {
        println!("(task {}; /new starts a fresh session)", outcome.state.as_str());
    }
    Ok(())
}

fn print_event(event: &AgentEvent) -> anyhow::Result<()> {
    match event {
        AgentEvent::Working { progress_text } => {
            print!("\r{progress_text}");
            io::stdout().flush()?;
        }
        AgentEvent::Terminal { state, narrative, parts } => {
            clear_current_line()?;
            println!("[{}] {narrative}", state.as_str());
            for data in parts.iter().filter_map(ResponsePart::as_data) {
                let kind = schema::message_kind(data).unwrap_or("message");
                println!("--- {kind}");
                println!("{}", serde_json::to_string_pretty(data)?);
            }
        }
    }
    Ok(())
}

fn clear_current_line() -> anyhow::Result<()> {
    print!("\r\x1b[2K");
    io::stdout().flush()?;
    Ok(())
}

fn request_next_prompt(ready_tx: &std::sync::mpsc::Sender<()>) {
    let _ = ready_tx.send(());
}

fn spawn_input_thread(line_tx: mpsc::UnboundedSender<InputEvent>, ready_rx: std::sync::mpsc::Receiver<()>) {
    std::thread::spawn(move || {
        let mut editor = match rustyline::DefaultEditor::new() {
            Ok(editor) => editor,
            Err(e) => {
                let _ = line_tx.send(InputEvent::Error(e.to_string()));
                return;
            }
        };

        while ready_rx.recv().is_ok() {
            match editor.readline("you> ") {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        let _ = editor.add_history_entry(line.as_str());
                    }
                    if line_tx.send(InputEvent::Line(line)).is_err() {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    let _ = line_tx.send(InputEvent::Interrupted);
                    break;
                }
                Err(ReadlineError::Eof) => {
                    let _ = line_tx.send(InputEvent::Eof);
                    break;
                }
                Err(e) => {
                    let _ = line_tx.send(InputEvent::Error(e.to_string()));
                    break;
                }
            }
        }
    });
}

enum InputEvent {
    Line(String),
    Interrupted,
    Eof,
    Error(String),
}
