use std::io;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{DisableFocusChange, EnableFocusChange, EventStream},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tracing::info;

use super::events::AppEvent;
use super::{input_handler, App};
use crate::session::SessionHandle;
use crate::ui;

/// Interactive remote. Returns once the user quits.
pub async fn run(session: SessionHandle, app: App) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableFocusChange)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, app, &session).await;

    // Restore the terminal even when the loop failed.
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), DisableFocusChange, LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    mut app: App,
    session: &SessionHandle,
) -> Result<()> {
    let (tx, mut rx) = mpsc::channel(100);

    // 1. Input Event Task
    let tx_input = tx.clone();
    tokio::spawn(async move {
        let mut reader = EventStream::new();
        while let Some(Ok(event)) = reader.next().await {
            if tx_input.send(AppEvent::Input(event)).await.is_err() {
                break;
            }
        }
    });

    // 2. Session Snapshot Task
    let tx_state = tx.clone();
    let mut snapshots = session.watch();
    tokio::spawn(async move {
        loop {
            let snapshot = snapshots.borrow_and_update().clone();
            if tx_state.send(AppEvent::SessionUpdate(snapshot)).await.is_err() {
                break;
            }
            if snapshots.changed().await.is_err() {
                break;
            }
        }
    });

    // 3. Session Notice Task
    let tx_notice = tx.clone();
    let mut notices = session.events();
    tokio::spawn(async move {
        loop {
            match notices.recv().await {
                Ok(event) => {
                    if tx_notice.send(AppEvent::Notice(event)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    // 4. Redraw Tick Task (toast expiry)
    let tx_tick = tx.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(250));
        loop {
            interval.tick().await;
            if tx_tick.send(AppEvent::Tick).await.is_err() {
                break;
            }
        }
    });
    drop(tx);

    // Being on screen is being in the foreground.
    session.connect();
    info!("remote started");

    while app.is_running {
        terminal.draw(|f| ui::ui(f, &mut app))?;

        let Some(event) = rx.recv().await else {
            break;
        };
        match event {
            AppEvent::Input(event) => input_handler::handle_event(event, &mut app, session),
            AppEvent::SessionUpdate(snapshot) => app.apply_snapshot(snapshot),
            AppEvent::Notice(notice) => app.apply_event(notice),
            AppEvent::Tick => app.on_tick(),
        }
    }

    session.disconnect();
    info!("remote closed");
    Ok(())
}
