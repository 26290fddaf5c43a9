use std::cell::RefCell;
use std::io::{BufRead, Write};
use std::rc::Rc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;
use tokio::task::LocalSet;
use tracing::{info, warn};

use presensid::ipc::{self, HostBackend, HostBridge};
use presensid::time::SystemClock;

/// Attendance sidecar for the school portal shell. Speaks line-delimited
/// JSON on stdio; schedule fetches and status writes go back to the host as
/// `backend.*` requests on the same pipe.
#[derive(Parser, Debug)]
#[command(name = "presensid", version)]
struct Args {
    /// Milliseconds a confirmed write settles before the reconciling reload
    #[arg(long, default_value_t = 600)]
    settle_ms: u64,

    /// Increase log verbosity (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn setup_tracing(verbose: u8) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        })
    });
    // stdout carries the protocol; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    setup_tracing(args.verbose);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;
    let local = LocalSet::new();
    local.block_on(&runtime, run(args))
}

async fn run(args: Args) -> anyhow::Result<()> {
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
    let (in_tx, mut in_rx) = mpsc::unbounded_channel::<String>();

    // Writer task owns stdout. Responses, events and bridge requests leave
    // through one channel, so lines keep the order they were produced in.
    let writer = tokio::task::spawn_local(async move {
        let mut stdout = std::io::stdout();
        while let Some(line) = out_rx.recv().await {
            if writeln!(stdout, "{line}")
                .and_then(|_| stdout.flush())
                .is_err()
            {
                break;
            }
        }
    });

    // Blocking reader thread; the runtime only ever sees whole lines.
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if in_tx.send(line).is_err() {
                break;
            }
        }
    });

    let bridge = Rc::new(HostBridge::new(out_tx.clone()));
    let state = Rc::new(ipc::AppState {
        backend: Rc::new(HostBackend::new(bridge.clone())),
        clock: Rc::new(SystemClock),
        dashboard: RefCell::new(None),
        outbox: out_tx,
        settle_delay: Duration::from_millis(args.settle_ms),
    });

    info!(settle_ms = args.settle_ms, "attendance sidecar ready");

    while let Some(line) = in_rx.recv().await {
        if line.trim().is_empty() {
            continue;
        }
        let value: serde_json::Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply with an id; report and move on.
                let reply = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = state.outbox.send(reply.to_string());
                continue;
            }
        };

        // Host answers to our backend.* calls come back on the same pipe.
        if value.get("method").is_none() {
            if !bridge.resolve(&value) {
                warn!("dropping a line that is neither a request nor a pending answer");
            }
            continue;
        }

        let req: ipc::Request = match serde_json::from_value(value) {
            Ok(v) => v,
            Err(e) => {
                let reply = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = state.outbox.send(reply.to_string());
                continue;
            }
        };

        // Each request runs as its own task so slow backend round trips
        // never block the read loop that delivers their answers.
        let state = state.clone();
        tokio::task::spawn_local(async move {
            let resp = ipc::handle_request(&state, req).await;
            let _ = state.outbox.send(resp.to_string());
        });
    }

    // Stdin is gone. Fail outstanding host calls so in-flight tasks finish,
    // then let the writer drain whatever is still queued.
    bridge.close();
    drop(bridge);
    drop(state);
    let _ = writer.await;
    Ok(())
}
