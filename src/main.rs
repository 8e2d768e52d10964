//! Interactive TUI dashboard for watching the health of a Neo node pool.
//!
//! This binary keeps a node pool running with its diagnostic sampler and shows
//! what the pool has learned about every node. Features include:
//! - Live per-node status, latency, height lag and pending requests
//! - Switching the current node by policy (default, fastest, highest)
//! - Manual and batched calls through the current or a selected node
//! - Per-node latency trends fed by every completed call

mod app;
mod env;
mod rpc;
mod ui;

use std::time::Duration;

use app::{App, AppEvent, Target};
use color_eyre::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use env::{build_pool_from_env, init_tracing_from_env};
use neo_node_pool::SelectionPolicy;
use rpc::spawn_rpc_call;
use tokio::sync::{broadcast::error::TryRecvError, mpsc};
use ui::draw_ui;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing_from_env()?;

    let (pool, cfg) = build_pool_from_env()?;
    let mut app = App::new(pool, &cfg);

    let mut terminal = ratatui::init();
    terminal.clear()?;

    let result = run_app(&mut terminal, &mut app).await;

    ratatui::restore();

    result
}

async fn run_app(terminal: &mut ratatui::DefaultTerminal, app: &mut App) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<AppEvent>();
    let mut pool_events = app.pool.subscribe();

    loop {
        while let Ok(ev) = rx.try_recv() {
            match ev {
                AppEvent::RpcFinished {
                    endpoint,
                    latency_ms,
                    ok,
                    message,
                } => {
                    app.set_last_result(endpoint, latency_ms, ok, message);
                }
            }
        }

        loop {
            match pool_events.try_recv() {
                Ok(event) => app.record_event(&event),
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "dashboard fell behind on pool events");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }

        app.refresh_nodes();
        terminal.draw(|frame| draw_ui(frame, app))?;

        if app.should_run_call() {
            spawn_rpc_call(app, Target::Current, tx.clone());
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        if crossterm::event::poll(Duration::from_millis(50))? {
            if let Event::Key(KeyEvent {
                code,
                kind: KeyEventKind::Press,
                ..
            }) = event::read()?
            {
                match code {
                    KeyCode::Char('q') => break,
                    KeyCode::Up => app.prev_node(),
                    KeyCode::Down => app.next_node(),
                    KeyCode::Char('m') => app.toggle_method(),
                    KeyCode::Char('r') => {
                        spawn_rpc_call(app, Target::Current, tx.clone());
                    }
                    KeyCode::Char(' ') => {
                        spawn_rpc_call(app, Target::Selected, tx.clone());
                    }
                    KeyCode::Char('d') => app.apply_policy(SelectionPolicy::Default),
                    KeyCode::Char('f') => app.apply_policy(SelectionPolicy::Fastest),
                    KeyCode::Char('h') => app.apply_policy(SelectionPolicy::Highest),
                    KeyCode::Char('b') => {
                        app.toggle_batch_mode();
                    }
                    KeyCode::Char('[') | KeyCode::Char(',') => {
                        app.decrease_batch_count();
                    }
                    KeyCode::Char(']') | KeyCode::Char('.') | KeyCode::Char('/') => {
                        app.increase_batch_count();
                    }
                    KeyCode::Char('s') => {
                        app.reset_stats();
                    }
                    _ => {}
                }
            }
        }
    }

    Ok(())
}
