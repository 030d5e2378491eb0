use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use image::DynamicImage;
use reqwest::Url;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::auth::{AccessToken, AuthorizationCallback};
use super::error::SessionError;
use super::state::{
    seek_target_ms, Artwork, ConnectionState, ForwardSeek, Session, SessionSnapshot,
};
use crate::player::{
    EventSink, PlaybackProvider, PlayerCommand, PlayerState, ProviderEvent, ProviderResult,
};

const NOTICE_CAPACITY: usize = 32;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Edge length requested for cover images.
    pub artwork_size: u32,
    pub forward_seek: ForwardSeek,
    pub tick_period: Duration,
    /// Token recovered from an earlier run.
    pub access_token: Option<AccessToken>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            artwork_size: 300,
            forward_seek: ForwardSeek::default(),
            tick_period: Duration::from_secs(1),
            access_token: None,
        }
    }
}

/// One-off notices for observers, alongside the continuously published snapshot.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    AuthorizationStarted { url: Url },
    Authorized(AccessToken),
    Failure(SessionError),
}

enum Request {
    Authorize,
    CompleteAuthorization(String),
    Connect,
    Disconnect,
    Command(PlayerCommand),
    SeekRelative(i64),
    Shutdown,
}

enum Completion {
    Connect {
        epoch: u64,
        result: ProviderResult<()>,
    },
    Subscribe {
        epoch: u64,
        result: ProviderResult<()>,
    },
    Command {
        epoch: u64,
        command: PlayerCommand,
        result: ProviderResult<()>,
    },
    SeekState {
        epoch: u64,
        delta_secs: i64,
        result: ProviderResult<PlayerState>,
    },
    Artwork {
        track_id: String,
        result: ProviderResult<DynamicImage>,
    },
}

/// Cloneable front door to a running [`SessionController`].
///
/// Every method returns immediately; outcomes show up in the snapshot
/// stream and the event channel.
#[derive(Clone)]
pub struct SessionHandle {
    requests: mpsc::UnboundedSender<Request>,
    snapshot: watch::Receiver<SessionSnapshot>,
    notices: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    fn send(&self, request: Request) {
        if self.requests.send(request).is_err() {
            debug!("session controller is gone, request dropped");
        }
    }

    pub fn authorize(&self) {
        self.send(Request::Authorize);
    }

    pub fn complete_authorization(&self, callback_url: impl Into<String>) {
        self.send(Request::CompleteAuthorization(callback_url.into()));
    }

    pub fn connect(&self) {
        self.send(Request::Connect);
    }

    pub fn disconnect(&self) {
        self.send(Request::Disconnect);
    }

    pub fn play(&self) {
        self.send(Request::Command(PlayerCommand::Resume));
    }

    pub fn pause(&self) {
        self.send(Request::Command(PlayerCommand::Pause));
    }

    pub fn skip_to_next(&self) {
        self.send(Request::Command(PlayerCommand::SkipNext));
    }

    pub fn skip_to_previous(&self) {
        self.send(Request::Command(PlayerCommand::SkipPrevious));
    }

    pub fn seek_relative(&self, delta_secs: i64) {
        self.send(Request::SeekRelative(delta_secs));
    }

    pub fn shutdown(&self) {
        self.send(Request::Shutdown);
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }

    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.notices.subscribe()
    }
}

/// Owns the session. Host requests, provider events and completions of
/// provider calls are all funnelled into one task and applied in order.
pub struct SessionController {
    session: Session,
    config: SessionConfig,
    provider: Arc<dyn PlaybackProvider>,
    requests: mpsc::UnboundedReceiver<Request>,
    sink: EventSink,
    events: mpsc::UnboundedReceiver<ProviderEvent>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions: mpsc::UnboundedReceiver<Completion>,
    ticker: Option<Interval>,
    snapshot: watch::Sender<SessionSnapshot>,
    notices: broadcast::Sender<SessionEvent>,
}

impl SessionController {
    pub fn new(config: SessionConfig, provider: Arc<dyn PlaybackProvider>) -> (Self, SessionHandle) {
        let (requests_tx, requests) = mpsc::unbounded_channel();
        let (events_tx, events) = mpsc::unbounded_channel();
        let (completions_tx, completions) = mpsc::unbounded_channel();

        let session = Session::new(config.access_token.clone());
        let (snapshot_tx, snapshot_rx) = watch::channel(session.snapshot());
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);

        let handle = SessionHandle {
            requests: requests_tx,
            snapshot: snapshot_rx,
            notices: notices.clone(),
        };

        let controller = Self {
            session,
            config,
            provider,
            requests,
            sink: EventSink::new(events_tx),
            events,
            completions_tx,
            completions,
            ticker: None,
            snapshot: snapshot_tx,
            notices,
        };

        (controller, handle)
    }

    /// Builds a controller and runs it on the current tokio runtime.
    pub fn spawn(config: SessionConfig, provider: Arc<dyn PlaybackProvider>) -> (SessionHandle, JoinHandle<()>) {
        let (controller, handle) = Self::new(config, provider);
        let task = tokio::spawn(controller.run());
        (handle, task)
    }

    pub async fn run(mut self) {
        info!(provider = self.provider.name(), "session controller started");

        loop {
            tokio::select! {
                request = self.requests.recv() => match request {
                    Some(Request::Shutdown) | None => break,
                    Some(request) => self.handle_request(request),
                },
                Some(event) = self.events.recv() => self.dispatch(event),
                Some(done) = self.completions.recv() => self.handle_completion(done),
                _ = next_tick(&mut self.ticker) => self.on_tick(),
            }
        }

        self.teardown();
    }

    fn handle_request(&mut self, request: Request) {
        match request {
            Request::Authorize => self.authorize(),
            Request::CompleteAuthorization(raw) => self.complete_authorization(&raw),
            Request::Connect => self.connect(),
            Request::Disconnect => self.disconnect(),
            Request::Command(command) => self.command(command),
            Request::SeekRelative(delta_secs) => self.seek_relative(delta_secs),
            Request::Shutdown => {}
        }
    }

    fn authorize(&mut self) {
        match self.provider.authorize() {
            Ok(url) => {
                info!(%url, "authorization started");
                self.notify(SessionEvent::AuthorizationStarted { url });
            }
            Err(e) => self.fail(SessionError::AuthorizationFailed(e.to_string())),
        }
    }

    fn complete_authorization(&mut self, raw: &str) {
        let url = match Url::parse(raw) {
            Ok(url) => url,
            Err(e) => {
                self.fail(SessionError::AuthorizationFailed(format!("invalid callback url: {}", e)));
                return;
            }
        };

        match self.provider.parse_authorization_callback(&url) {
            AuthorizationCallback::Token(token) => {
                info!("access token received");
                self.session.store_token(token.clone());
                self.publish();
                self.notify(SessionEvent::Authorized(token));
                self.connect();
            }
            AuthorizationCallback::Error(description) => {
                self.fail(SessionError::AuthorizationFailed(description));
            }
        }
    }

    fn connect(&mut self) {
        let Some((epoch, token)) = self.session.begin_connect() else {
            debug!(
                connection = ?self.session.connection(),
                has_token = self.session.access_token().is_some(),
                "connect skipped"
            );
            return;
        };

        info!(epoch, "connecting");
        self.publish();

        let fut = self.provider.connect(token);
        self.spawn_completion(async move {
            Completion::Connect {
                epoch,
                result: fut.await,
            }
        });
    }

    fn disconnect(&mut self) {
        if !self.session.begin_disconnect() {
            debug!("disconnect skipped, not connected");
            return;
        }
        info!("disconnecting");
        self.provider.disconnect();
        self.publish();
    }

    fn command(&mut self, command: PlayerCommand) {
        if !self.session.is_connected() {
            debug!(%command, "command ignored, not connected");
            return;
        }

        debug!(%command, "sending command");
        let epoch = self.session.epoch();
        let fut = self.provider.command(command);
        self.spawn_completion(async move {
            Completion::Command {
                epoch,
                command,
                result: fut.await,
            }
        });
    }

    fn seek_relative(&mut self, delta_secs: i64) {
        if !self.session.is_connected() {
            debug!(delta_secs, "seek ignored, not connected");
            return;
        }

        let epoch = self.session.epoch();
        let fut = self.provider.player_state();
        self.spawn_completion(async move {
            Completion::SeekState {
                epoch,
                delta_secs,
                result: fut.await,
            }
        });
    }

    /// Single entry point for everything the provider reports.
    fn dispatch(&mut self, event: ProviderEvent) {
        match event {
            ProviderEvent::ConnectionEstablished => {
                if !self.session.mark_connected() {
                    debug!("connection established outside of a connect attempt, ignored");
                    return;
                }
                info!("connected");

                let epoch = self.session.epoch();
                let fut = self.provider.subscribe(self.sink.clone());
                self.spawn_completion(async move {
                    Completion::Subscribe {
                        epoch,
                        result: fut.await,
                    }
                });
                self.publish();
            }
            ProviderEvent::ConnectionFailed(reason) => {
                warn!(%reason, "connection attempt failed");
                self.session.mark_disconnected();
                self.fail(SessionError::ConnectionFailed(reason));
            }
            ProviderEvent::Disconnected(reason) => {
                if self.session.connection() == ConnectionState::Disconnected {
                    debug!("disconnect notice while already disconnected");
                    return;
                }
                self.session.mark_disconnected();
                match reason {
                    Some(reason) => {
                        warn!(%reason, "connection lost");
                        self.fail(SessionError::ConnectionFailed(reason));
                    }
                    None => {
                        info!("remote closed the connection");
                        self.publish();
                    }
                }
            }
            ProviderEvent::PlayerStateChanged(state) => self.on_player_state_changed(state),
        }
    }

    fn on_player_state_changed(&mut self, state: PlayerState) {
        if !self.session.is_connected() {
            debug!(track = %state.track_id, "player state while disconnected, ignored");
            return;
        }

        debug!(track = %state.track_id, paused = state.is_paused, position_ms = state.position_ms, "player state changed");
        let update = self.session.apply_player_state(&state);

        // Restart on every event so ticks stay in phase with the fresh position.
        let period = self.config.tick_period;
        self.ticker = update.ticker_running.then(|| start_ticker(period));

        if let Some(track_id) = update.fetch_artwork {
            self.fetch_artwork(track_id);
        }
        self.publish();
    }

    fn fetch_artwork(&mut self, track_id: String) {
        let fut = self.provider.fetch_artwork(&track_id, self.config.artwork_size);
        self.spawn_completion(async move {
            Completion::Artwork {
                track_id,
                result: fut.await,
            }
        });
    }

    fn on_artwork_fetched(&mut self, track_id: String, image: DynamicImage) {
        if self.session.apply_artwork(Artwork::new(track_id.clone(), image)) {
            debug!(track = %track_id, "artwork applied");
            self.publish();
        } else {
            debug!(track = %track_id, "stale artwork discarded");
        }
    }

    fn handle_completion(&mut self, done: Completion) {
        match done {
            Completion::Connect { epoch, result } => {
                if epoch != self.session.epoch()
                    || self.session.connection() != ConnectionState::Connecting
                {
                    debug!(epoch, "stale connect result dropped");
                    return;
                }
                let event = match result {
                    Ok(()) => ProviderEvent::ConnectionEstablished,
                    Err(e) => ProviderEvent::ConnectionFailed(e.to_string()),
                };
                self.dispatch(event);
            }
            Completion::Subscribe { epoch, result } => {
                if let Err(e) = result {
                    if self.is_current(epoch) {
                        warn!(error = %e, "subscribing to player state failed");
                    }
                }
            }
            Completion::Command {
                epoch,
                command,
                result,
            } => match result {
                Ok(()) => debug!(%command, "command acknowledged"),
                Err(e) if self.is_current(epoch) => {
                    error!(%command, error = %e, "command failed");
                    self.fail(SessionError::CommandFailed {
                        command: command.to_string(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => debug!(%command, error = %e, "late command failure dropped"),
            },
            Completion::SeekState {
                epoch,
                delta_secs,
                result,
            } => {
                if !self.is_current(epoch) {
                    debug!(delta_secs, "stale seek dropped");
                    return;
                }
                match result {
                    Ok(state) => {
                        let position_ms = seek_target_ms(
                            state.position_ms,
                            delta_secs,
                            state.duration_ms,
                            self.config.forward_seek,
                        );
                        self.command(PlayerCommand::Seek { position_ms });
                    }
                    Err(e) => {
                        warn!(delta_secs, error = %e, "seek abandoned");
                        self.fail(SessionError::StateFetchFailed(e.to_string()));
                    }
                }
            }
            Completion::Artwork { track_id, result } => match result {
                Ok(image) => self.on_artwork_fetched(track_id, image),
                Err(e) => warn!(track = %track_id, error = %e, "artwork fetch failed"),
            },
        }
    }

    fn on_tick(&mut self) {
        if self.session.tick() {
            self.publish();
        }
    }

    fn is_current(&self, epoch: u64) -> bool {
        epoch == self.session.epoch() && self.session.is_connected()
    }

    fn spawn_completion<F>(&self, fut: F)
    where
        F: Future<Output = Completion> + Send + 'static,
    {
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(fut.await);
        });
    }

    fn publish(&self) {
        self.snapshot.send_replace(self.session.snapshot());
    }

    fn notify(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.notices.send(event);
    }

    fn fail(&mut self, error: SessionError) {
        self.session.set_last_error(error.clone());
        self.publish();
        self.notify(SessionEvent::Failure(error));
    }

    fn teardown(&mut self) {
        self.ticker = None;
        if self.session.begin_disconnect() {
            self.provider.disconnect();
            self.publish();
        }
        info!("session controller stopped");
    }
}

fn start_ticker(period: Duration) -> Interval {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
