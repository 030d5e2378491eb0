//! In-memory provider. Drives the offline mode of the binary and the tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{self, BoxFuture, FutureExt};
use image::{DynamicImage, ImageBuffer, Rgb};
use reqwest::Url;
use tokio::sync::Notify;
use tokio::time::Instant;

use super::error::{ProviderError, ProviderResult};
use super::traits::{EventSink, PlaybackProvider, PlayerCommand, PlayerState, ProviderEvent};
use crate::session::auth::AccessToken;

/// A call as seen by the provider, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    Authorize,
    Connect,
    Subscribe,
    Disconnect,
    Command(PlayerCommand),
    PlayerState,
    FetchArtwork(String),
}

#[derive(Default)]
struct Inner {
    calls: Vec<ProviderCall>,
    sink: Option<EventSink>,
    tracks: Vec<PlayerState>,
    current: usize,
    position_ms: u64,
    is_paused: bool,
    playing_since: Option<Instant>,
    connect_error: Option<String>,
    command_error: Option<String>,
    state_error: Option<String>,
    artwork_gates: HashMap<String, Arc<Notify>>,
}

impl Inner {
    fn position_now(&self) -> u64 {
        let played = self
            .playing_since
            .map(|since| since.elapsed().as_millis() as u64)
            .unwrap_or(0);
        self.position_ms + played
    }

    fn current_state(&self) -> Option<PlayerState> {
        let track = self.tracks.get(self.current)?;
        Some(PlayerState {
            position_ms: self.position_now(),
            is_paused: self.is_paused,
            ..track.clone()
        })
    }

    fn load(&mut self, index: usize, position_ms: u64) {
        self.current = index;
        self.position_ms = position_ms;
        self.playing_since = (!self.is_paused).then(Instant::now);
    }

    fn emit_current(&self) {
        if let (Some(sink), Some(state)) = (&self.sink, self.current_state()) {
            sink.send(ProviderEvent::PlayerStateChanged(state));
        }
    }

    /// Moves the simulated player the way a real service would.
    fn apply(&mut self, command: PlayerCommand) {
        let count = self.tracks.len();
        match command {
            PlayerCommand::Resume if self.is_paused => {
                self.is_paused = false;
                self.playing_since = Some(Instant::now());
            }
            PlayerCommand::Pause if !self.is_paused => {
                self.position_ms = self.position_now();
                self.is_paused = true;
                self.playing_since = None;
            }
            PlayerCommand::SkipNext if count > 0 => self.load((self.current + 1) % count, 0),
            PlayerCommand::SkipPrevious if count > 0 => self.load((self.current + count - 1) % count, 0),
            PlayerCommand::Seek { position_ms } => {
                let duration = self.tracks.get(self.current).map(|t| t.duration_ms).unwrap_or(0);
                if count > 0 && duration > 0 && position_ms >= duration {
                    self.load((self.current + 1) % count, 0);
                } else {
                    self.load(self.current, position_ms);
                }
            }
            _ => return,
        }
        self.emit_current();
    }
}

/// Scriptable [`PlaybackProvider`] that keeps everything in memory.
#[derive(Clone, Default)]
pub struct MockProvider {
    inner: Arc<Mutex<Inner>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider with a looping playlist. The first entry's position and
    /// paused flag are the starting point.
    pub fn with_tracks(tracks: Vec<PlayerState>) -> Self {
        let provider = Self::new();
        {
            let mut inner = provider.lock();
            if let Some(first) = tracks.first() {
                inner.is_paused = first.is_paused;
                inner.position_ms = first.position_ms;
                inner.playing_since = (!first.is_paused).then(Instant::now);
            }
            inner.tracks = tracks;
        }
        provider
    }

    /// A three-track playlist for offline use.
    pub fn demo() -> Self {
        let track = |id: &str, title: &str, artist: &str, secs: u64| PlayerState {
            track_id: format!("mock:track:{}", id),
            title: title.to_string(),
            artist: artist.to_string(),
            duration_ms: secs * 1000,
            position_ms: 0,
            is_paused: false,
        };
        Self::with_tracks(vec![
            track("1", "Night Drive", "The Offline Band", 214),
            track("2", "Loopback", "Localhost", 187),
            track("3", "No Signal", "Airplane Mode", 242),
        ])
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the playlist with a single track in the given state.
    pub fn set_player_state(&self, state: PlayerState) {
        let mut inner = self.lock();
        inner.is_paused = state.is_paused;
        inner.tracks = vec![state.clone()];
        inner.load(0, state.position_ms);
    }

    pub fn set_connect_error(&self, reason: Option<&str>) {
        self.lock().connect_error = reason.map(str::to_string);
    }

    pub fn set_command_error(&self, reason: Option<&str>) {
        self.lock().command_error = reason.map(str::to_string);
    }

    pub fn set_state_error(&self, reason: Option<&str>) {
        self.lock().state_error = reason.map(str::to_string);
    }

    /// Artwork fetches for `track_id` stay pending until [`release_artwork`](Self::release_artwork).
    pub fn hold_artwork(&self, track_id: &str) {
        self.lock()
            .artwork_gates
            .insert(track_id.to_string(), Arc::new(Notify::new()));
    }

    pub fn release_artwork(&self, track_id: &str) {
        if let Some(gate) = self.lock().artwork_gates.remove(track_id) {
            gate.notify_waiters();
            gate.notify_one();
        }
    }

    /// Pushes an event at the subscribed session. False if nobody subscribed.
    pub fn emit(&self, event: ProviderEvent) -> bool {
        match &self.lock().sink {
            Some(sink) => sink.send(event),
            None => false,
        }
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        self.lock().calls.clone()
    }

    pub fn count(&self, call: &ProviderCall) -> usize {
        self.lock().calls.iter().filter(|c| *c == call).count()
    }

    fn record(&self, call: ProviderCall) -> MutexGuard<'_, Inner> {
        let mut inner = self.lock();
        inner.calls.push(call);
        inner
    }
}

impl PlaybackProvider for MockProvider {
    fn name(&self) -> &str {
        "offline"
    }

    fn authorize(&self) -> ProviderResult<Url> {
        drop(self.record(ProviderCall::Authorize));
        Url::parse("nowplaying-offline://authorize#access_token=offline")
            .map_err(|e| ProviderError::InvalidConfig(e.to_string()))
    }

    fn connect(&self, _token: AccessToken) -> BoxFuture<'static, ProviderResult<()>> {
        let inner = self.record(ProviderCall::Connect);
        let result = match &inner.connect_error {
            Some(reason) => Err(ProviderError::Rejected(reason.clone())),
            None => Ok(()),
        };
        future::ready(result).boxed()
    }

    fn subscribe(&self, sink: EventSink) -> BoxFuture<'static, ProviderResult<()>> {
        let mut inner = self.record(ProviderCall::Subscribe);
        inner.sink = Some(sink);
        inner.emit_current();
        future::ready(Ok(())).boxed()
    }

    fn disconnect(&self) {
        self.record(ProviderCall::Disconnect).sink = None;
    }

    fn command(&self, command: PlayerCommand) -> BoxFuture<'static, ProviderResult<()>> {
        let mut inner = self.record(ProviderCall::Command(command));
        let result = match &inner.command_error {
            Some(reason) => Err(ProviderError::Rejected(reason.clone())),
            None => {
                inner.apply(command);
                Ok(())
            }
        };
        future::ready(result).boxed()
    }

    fn player_state(&self) -> BoxFuture<'static, ProviderResult<PlayerState>> {
        let inner = self.record(ProviderCall::PlayerState);
        let result = match &inner.state_error {
            Some(reason) => Err(ProviderError::Rejected(reason.clone())),
            None => inner.current_state().ok_or(ProviderError::NoActivePlayback),
        };
        future::ready(result).boxed()
    }

    fn fetch_artwork(&self, track_id: &str, size: u32) -> BoxFuture<'static, ProviderResult<DynamicImage>> {
        let inner = self.record(ProviderCall::FetchArtwork(track_id.to_string()));
        let gate = inner.artwork_gates.get(track_id).cloned();
        drop(inner);

        let image = placeholder_art(track_id, size.clamp(1, 64));
        async move {
            if let Some(gate) = gate {
                gate.notified().await;
            }
            Ok(image)
        }
        .boxed()
    }
}

/// Solid square whose colour is derived from the track id.
fn placeholder_art(track_id: &str, size: u32) -> DynamicImage {
    let hash = track_id
        .bytes()
        .fold(0x811c_9dc5u32, |h, b| (h ^ b as u32).wrapping_mul(0x0100_0193));
    let [r, g, b, _] = hash.to_le_bytes();
    DynamicImage::ImageRgb8(ImageBuffer::from_pixel(size, size, Rgb([r, g, b])))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paused(track: &str, position_ms: u64, duration_ms: u64) -> PlayerState {
        PlayerState {
            track_id: track.to_string(),
            title: track.to_string(),
            artist: "A".to_string(),
            duration_ms,
            position_ms,
            is_paused: true,
        }
    }

    #[tokio::test]
    async fn test_commands_move_simulated_player() {
        let mock = MockProvider::with_tracks(vec![paused("a", 1_000, 10_000), paused("b", 0, 10_000)]);

        mock.command(PlayerCommand::SkipNext).await.unwrap();
        let state = mock.player_state().await.unwrap();
        assert_eq!(state.track_id, "b");
        assert_eq!(state.position_ms, 0);

        mock.command(PlayerCommand::Seek { position_ms: 4_000 }).await.unwrap();
        assert_eq!(mock.player_state().await.unwrap().position_ms, 4_000);

        // Seeking past the end advances like the real service does.
        mock.command(PlayerCommand::Seek { position_ms: 20_000 }).await.unwrap();
        assert_eq!(mock.player_state().await.unwrap().track_id, "a");
    }

    #[tokio::test]
    async fn test_command_error_leaves_state_alone() {
        let mock = MockProvider::with_tracks(vec![paused("a", 1_000, 10_000)]);
        mock.set_command_error(Some("busy"));
        assert!(mock.command(PlayerCommand::Resume).await.is_err());
        assert!(mock.player_state().await.unwrap().is_paused);
        assert_eq!(mock.count(&ProviderCall::Command(PlayerCommand::Resume)), 1);
    }

    #[tokio::test]
    async fn test_empty_provider_has_no_playback() {
        let mock = MockProvider::new();
        assert!(matches!(
            mock.player_state().await,
            Err(ProviderError::NoActivePlayback)
        ));
    }

    #[test]
    fn test_placeholder_art_is_stable_per_track() {
        let a1 = placeholder_art("a", 4);
        let a2 = placeholder_art("a", 4);
        let b = placeholder_art("b", 4);
        assert_eq!(a1.as_bytes(), a2.as_bytes());
        assert_ne!(a1.as_bytes(), b.as_bytes());
    }
}
