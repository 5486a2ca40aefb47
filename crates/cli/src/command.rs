use serde_json::{Value, json};
use uigen_core::routing::{ActionEvent, InboundPart};
use uigen_core::types::SessionMode;

pub const HELP: &str = "\
commands:
  <text>                     describe the UI you want
  /action <name> [json]      send a client action, e.g. /action submit_form {\"name\":\"Ada\"}
  /mode ui|text              switch between UI and text-only answers
  /new                       start a new session
  /config                    show agent configuration
  /help                      show this help
  /quit                      exit";

/// One parsed REPL line.
#[derive(Debug, PartialEq)]
pub enum Command {
    Send(Vec<InboundPart>),
    Mode(SessionMode),
    NewSession,
    Config,
    Help,
    Quit,
    Invalid(String),
}

/// Parse a REPL line. Blank lines give `None`.
pub fn parse(line: &str) -> Option<Command> {
    let text = line.trim();
    if text.is_empty() {
        return None;
    }
    let Some(rest) = text.strip_prefix('/') else {
        return Some(Command::Send(vec![InboundPart::text(text)]));
    };

    let (name, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    let args = args.trim();
    let command = match name {
        "q" | "quit" | "exit" => Command::Quit,
        "help" | "h" => Command::Help,
        "config" => Command::Config,
        "new" => Command::NewSession,
        "mode" => match SessionMode::parse(args) {
            Some(mode) => Command::Mode(mode),
            None => Command::Invalid(format!("unknown mode '{args}' (expected ui or text)")),
        },
        "action" => parse_action(args),
        other => Command::Invalid(format!("unknown command '/{other}' (try /help)")),
    };
    Some(command)
}

fn parse_action(args: &str) -> Command {
    let (name, context) = args.split_once(char::is_whitespace).unwrap_or((args, ""));
    if name.is_empty() {
        return Command::Invalid("usage: /action <name> [json]".into());
    }
    let context: Value = match context.trim() {
        "" => json!({}),
        raw => match serde_json::from_str(raw) {
            Ok(v @ Value::Object(_)) => v,
            Ok(_) => return Command::Invalid("action context must be a JSON object".into()),
            Err(e) => return Command::Invalid(format!("invalid action context: {e}")),
        },
    };
    match ActionEvent::from_json(&json!({ "actionName": name, "context": context })) {
        Some(event) => Command::Send(vec![InboundPart::Action(event)]),
        None => Command::Invalid("invalid action".into()),
    }
}
