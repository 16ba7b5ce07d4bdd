//! fiefdom-runner: headless driver for the fiefdom simulation core.
//!
//! Usage:
//!   fiefdom-runner --seed 12345 --db world.db --data-dir ./data
//!
//! Reads one JSON command per line on stdin and writes one JSON reply per
//! line on stdout:
//!   {"type":"establish","owner_id":1,"name":"Ashford","x":10,"y":-4}
//!   {"type":"action","kind":"build","fiefdom_id":1,"character_id":1,"payload":{...}}
//!   {"type":"validate","kind":"build","fiefdom_id":1,"character_id":1,"payload":{...}}
//!   {"type":"state","fiefdom_id":1}
//!   {"type":"sweep","since":1700000000}
//!   {"type":"actions"}
//!   {"type":"quit"}

use anyhow::{Context, Result};
use fiefdom_core::{
    action::ActionContext,
    clock::SystemClock,
    config::GameConfig,
    engine::GameEngine,
    store::GameStore,
    types::{CharacterId, FiefdomId, Timestamp},
};
use serde_json::{json, Value};
use std::env;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    Establish {
        owner_id: CharacterId,
        name:     String,
        #[serde(default)]
        x: i64,
        #[serde(default)]
        y: i64,
    },
    Action {
        kind:         String,
        fiefdom_id:   FiefdomId,
        character_id: CharacterId,
        #[serde(default)]
        payload:      Value,
        #[serde(default)]
        request_id:   Option<String>,
    },
    Validate {
        kind:         String,
        fiefdom_id:   FiefdomId,
        character_id: CharacterId,
        #[serde(default)]
        payload:      Value,
    },
    State {
        fiefdom_id: FiefdomId,
    },
    Sweep {
        since: Timestamp,
    },
    Actions,
    Quit,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let db = string_arg(&args, "--db").unwrap_or(":memory:");
    let data_dir = string_arg(&args, "--data-dir").unwrap_or("./data");

    let config = GameConfig::load(data_dir)
        .with_context(|| format!("loading configuration from {data_dir}"))?;
    let store = if db == ":memory:" { GameStore::in_memory()? } else { GameStore::open(db)? };
    let engine = GameEngine::build(store, config, Arc::new(SystemClock), seed)?;

    log::info!(
        "fiefdom-runner started at {} (seed {seed}, db {db})",
        chrono::Utc::now().to_rfc3339()
    );
    run_ipc_loop(&engine)
}

fn run_ipc_loop(engine: &GameEngine) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<IpcCommand>(&buffer) {
            Ok(IpcCommand::Quit) => break,
            Ok(cmd) => handle_command(engine, cmd).unwrap_or_else(|e| json!({ "error": e.to_string() })),
            Err(e) => json!({ "error": e.to_string() }),
        };
        writeln!(stdout, "{reply}")?;
        stdout.flush()?;
    }
    Ok(())
}

fn handle_command(engine: &GameEngine, cmd: IpcCommand) -> Result<Value> {
    let reply = match cmd {
        IpcCommand::Establish { owner_id, name, x, y } => {
            let fiefdom_id = engine.establish_fiefdom(owner_id, &name, x, y)?;
            json!({ "fiefdom_id": fiefdom_id })
        }
        IpcCommand::Action { kind, fiefdom_id, character_id, payload, request_id } => {
            let mut ctx = ActionContext::new(fiefdom_id, character_id).with_origin("stdin");
            if let Some(request_id) = request_id {
                ctx = ctx.with_request_id(request_id);
            }
            let result = engine.validate_and_execute(&kind, &payload, &ctx);
            json!({ "request_id": ctx.request_id, "result": result })
        }
        IpcCommand::Validate { kind, fiefdom_id, character_id, payload } => {
            let ctx = ActionContext::new(fiefdom_id, character_id).with_origin("stdin");
            serde_json::to_value(engine.validate(&kind, &payload, &ctx))?
        }
        IpcCommand::State { fiefdom_id } => serde_json::to_value(engine.fiefdom_snapshot(fiefdom_id)?)?,
        IpcCommand::Sweep { since } => serde_json::to_value(engine.update_state_since(since, None)?)?,
        IpcCommand::Actions => {
            let kinds: Vec<Value> = engine
                .registry()
                .registered_types()
                .into_iter()
                .map(|kind| json!({ "kind": kind, "description": engine.registry().description(kind) }))
                .collect();
            Value::Array(kinds)
        }
        IpcCommand::Quit => Value::Null,
    };
    Ok(reply)
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

fn string_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}
