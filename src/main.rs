use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::timeout;
use tracing::{info, Level};

use nowplaying_remote::app::cli::{Args, Command};
use nowplaying_remote::app::config::{AppConfig, PersistentState};
use nowplaying_remote::app::{self, App};
use nowplaying_remote::player;
use nowplaying_remote::session::{
    AccessToken, ConnectionState, ForwardSeek, SessionController, SessionError, SessionEvent,
    SessionHandle, SessionSnapshot,
};
use nowplaying_remote::ui::theme::load_current_theme;
use nowplaying_remote::ui::utils::format_time;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const STATE_TIMEOUT: Duration = Duration::from_secs(5);
const SETTLE_TIMEOUT: Duration = Duration::from_secs(3);

fn init_logging(verbose: u8) -> tracing_appender::non_blocking::WorkerGuard {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    // The terminal belongs to the remote, so logs go to a file.
    let appender = tracing_appender::rolling::never(AppConfig::get_config_dir(), "nowplaying.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_ansi(false)
        .with_max_level(level)
        .init();
    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    human_panic::setup_panic!();
    let args = Args::parse();

    if args.generate_config {
        print!("{}", AppConfig::default_config_toml());
        return Ok(());
    }

    let _log_guard = init_logging(args.verbose);
    let (config, mut state) = AppConfig::load();
    let command = args.command.clone().unwrap_or(Command::Remote);

    // Performance Optimization: Global HTTP Client (Reused)
    let client = reqwest::Client::builder()
        .user_agent(concat!("nowplaying-remote/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_default();

    let provider = player::get_provider(args.offline, config.web_api_config(), client);

    let token = if args.offline {
        Some(AccessToken::new("offline"))
    } else {
        state.usable_token()
    };
    let mut session_config = config.session_config(token);
    if let Command::Seek { clamp: true, .. } = command {
        session_config.forward_seek = ForwardSeek::ClampToDuration;
    }

    info!(provider = provider.name(), ?command, "starting");
    let (session, task) = SessionController::spawn(session_config, provider.clone());

    let result = match command {
        Command::Authorize => authorize(&session).await,
        Command::Callback { url } => callback(&session, &url, &mut state, args.offline).await,
        Command::Status => status(&session).await,
        Command::Play => one_shot(&session, SessionHandle::play).await,
        Command::Pause => one_shot(&session, SessionHandle::pause).await,
        Command::Next => one_shot(&session, SessionHandle::skip_to_next).await,
        Command::Prev => one_shot(&session, SessionHandle::skip_to_previous).await,
        Command::Seek { delta_secs, .. } => one_shot(&session, |s| s.seek_relative(delta_secs)).await,
        Command::Remote => {
            let app = App::new(&config, provider.name(), load_current_theme());
            app::remote::run(session.clone(), app).await
        }
    };

    session.shutdown();
    let _ = task.await;
    result
}

/// First notice `pick` accepts. Lagged receivers keep going.
async fn next_event<T>(
    events: &mut broadcast::Receiver<SessionEvent>,
    mut pick: impl FnMut(SessionEvent) -> Option<Result<T>>,
) -> Result<T> {
    loop {
        match events.recv().await {
            Ok(event) => {
                if let Some(outcome) = pick(event) {
                    return outcome;
                }
            }
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => bail!("session stopped unexpectedly"),
        }
    }
}

async fn authorize(session: &SessionHandle) -> Result<()> {
    let mut events = session.events();
    session.authorize();

    let url = timeout(
        STATE_TIMEOUT,
        next_event(&mut events, |event| match event {
            SessionEvent::AuthorizationStarted { url } => Some(Ok(url)),
            SessionEvent::Failure(e) => Some(Err(e.into())),
            _ => None,
        }),
    )
    .await
    .context("authorization did not start")??;

    println!("Open this link and approve access:\n\n  {}\n", url);
    println!("Then run: nowplaying callback '<the URL you were redirected to>'");
    Ok(())
}

async fn callback(
    session: &SessionHandle,
    url: &str,
    state: &mut PersistentState,
    offline: bool,
) -> Result<()> {
    let mut events = session.events();
    session.complete_authorization(url);

    let token = timeout(
        STATE_TIMEOUT,
        next_event(&mut events, |event| match event {
            SessionEvent::Authorized(token) => Some(Ok(token)),
            SessionEvent::Failure(e @ SessionError::AuthorizationFailed(_)) => Some(Err(e.into())),
            _ => None,
        }),
    )
    .await
    .context("no answer from the session")??;

    if !offline {
        state.store_token(token);
        state.save().context("saving token to state.toml")?;
    }
    println!("Authorized.");
    Ok(())
}

/// Connects and waits for `Connected`, failing on the first error.
async fn connect(session: &SessionHandle) -> Result<()> {
    if !session.snapshot().has_token {
        bail!("not authorized yet, run `nowplaying authorize` first");
    }

    let mut events = session.events();
    let mut snapshots = session.watch();
    session.connect();

    let wait = async {
        loop {
            tokio::select! {
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        bail!("session stopped");
                    }
                    if snapshots.borrow_and_update().connection == ConnectionState::Connected {
                        return Ok(());
                    }
                }
                event = events.recv() => match event {
                    Ok(SessionEvent::Failure(e)) => return Err(anyhow::Error::from(e)),
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => bail!("session stopped"),
                },
            }
        }
    };
    timeout(CONNECT_TIMEOUT, wait).await.context("timed out connecting")?
}

async fn wait_for_track(session: &SessionHandle) -> Option<SessionSnapshot> {
    let mut snapshots = session.watch();
    let wait = snapshots.wait_for(|s| s.now_playing.is_some());
    let snapshot = match timeout(STATE_TIMEOUT, wait).await {
        Ok(Ok(snapshot)) => Some(snapshot.clone()),
        _ => None,
    };
    snapshot
}

fn print_snapshot(snapshot: &SessionSnapshot) {
    match &snapshot.now_playing {
        Some(np) => println!(
            "{} {} - {}  {} / {}",
            if np.is_paused { "⏸" } else { "▶" },
            np.title,
            np.artist,
            format_time(np.position_secs),
            format_time(np.duration_secs)
        ),
        None => println!("Nothing playing"),
    }
}

async fn status(session: &SessionHandle) -> Result<()> {
    connect(session).await?;
    match wait_for_track(session).await {
        Some(snapshot) => print_snapshot(&snapshot),
        None => println!("Nothing playing"),
    }
    Ok(())
}

/// Sends one command and reports the first visible outcome.
async fn one_shot(session: &SessionHandle, send: impl FnOnce(&SessionHandle)) -> Result<()> {
    connect(session).await?;
    let before = wait_for_track(session).await;

    let mut events = session.events();
    let mut snapshots = session.watch();
    snapshots.borrow_and_update();
    send(session);

    let settle = async {
        loop {
            tokio::select! {
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        return Ok(None);
                    }
                    let now = snapshots.borrow_and_update().clone();
                    if track_moved(before.as_ref(), &now) {
                        return Ok(Some(now));
                    }
                }
                event = events.recv() => match event {
                    Ok(SessionEvent::Failure(e)) => return Err(anyhow::Error::from(e)),
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => return Ok::<_, anyhow::Error>(None),
                },
            }
        }
    };

    match timeout(SETTLE_TIMEOUT, settle).await {
        Ok(Ok(Some(snapshot))) => print_snapshot(&snapshot),
        Ok(Ok(None)) | Err(_) => println!("Sent."),
        Ok(Err(e)) => return Err(e),
    }
    Ok(())
}

/// Anything beyond the local ticker's one-second steps counts as the command landing.
fn track_moved(before: Option<&SessionSnapshot>, now: &SessionSnapshot) -> bool {
    let (Some(a), Some(b)) = (
        before.and_then(|s| s.now_playing.as_ref()),
        now.now_playing.as_ref(),
    ) else {
        return now.now_playing.is_some();
    };
    a.track_id != b.track_id
        || a.is_paused != b.is_paused
        || a.position_secs.abs_diff(b.position_secs) > 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use nowplaying_remote::player::{MockProvider, PlayerState};
    use nowplaying_remote::session::SessionConfig;

    fn offline_session(mock: &MockProvider) -> SessionHandle {
        let config = SessionConfig {
            access_token: Some(AccessToken::new("offline")),
            ..SessionConfig::default()
        };
        let (handle, _task) = SessionController::spawn(config, Arc::new(mock.clone()));
        handle
    }

    fn paused(id: &str, position_ms: u64) -> PlayerState {
        PlayerState {
            track_id: id.to_string(),
            title: id.to_string(),
            artist: "Band".to_string(),
            duration_ms: 100_000,
            position_ms,
            is_paused: true,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_track_after_connect() {
        let mock = MockProvider::with_tracks(vec![paused("a", 12_000)]);
        let session = offline_session(&mock);

        connect(&session).await.unwrap();
        let snapshot = wait_for_track(&session).await.expect("track");
        let np = snapshot.now_playing.unwrap();
        assert_eq!(np.track_id, "a");
        assert_eq!(np.position_secs, 12);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_track_gives_up_without_playback() {
        let session = offline_session(&MockProvider::new());

        connect(&session).await.unwrap();
        assert!(wait_for_track(&session).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_needs_a_token() {
        let (session, _task) =
            SessionController::spawn(SessionConfig::default(), Arc::new(MockProvider::demo()));
        assert!(connect(&session).await.is_err());
    }

    #[test]
    fn test_track_moved() {
        let before = SessionSnapshot {
            now_playing: Some(nowplaying_remote::session::NowPlaying {
                track_id: "a".to_string(),
                title: "a".to_string(),
                artist: "b".to_string(),
                duration_secs: 100,
                position_secs: 10,
                is_paused: false,
                artwork: None,
            }),
            ..SessionSnapshot::default()
        };
        let mut ticked = before.clone();
        if let Some(np) = ticked.now_playing.as_mut() {
            np.position_secs = 11;
        }
        assert!(!track_moved(Some(&before), &ticked));

        let mut paused = before.clone();
        if let Some(np) = paused.now_playing.as_mut() {
            np.is_paused = true;
        }
        assert!(track_moved(Some(&before), &paused));
        assert!(track_moved(None, &before));
    }
}
