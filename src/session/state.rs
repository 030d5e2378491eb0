use std::fmt;
use std::sync::Arc;

use image::{DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};

use super::auth::AccessToken;
use super::error::SessionError;
use crate::player::PlayerState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// What a forward seek does when the target lands past the end of the track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForwardSeek {
    /// Hand the overshoot to the provider, which usually advances to the next track.
    #[default]
    Unclamped,
    ClampToDuration,
}

/// Cover image tagged with the track it was fetched for.
#[derive(Clone)]
pub struct Artwork {
    track_id: String,
    image: Arc<DynamicImage>,
}

impl Artwork {
    pub fn new(track_id: impl Into<String>, image: DynamicImage) -> Self {
        Self {
            track_id: track_id.into(),
            image: Arc::new(image),
        }
    }

    pub fn track_id(&self) -> &str {
        &self.track_id
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }
}

impl fmt::Debug for Artwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (w, h) = self.image.dimensions();
        f.debug_struct("Artwork")
            .field("track_id", &self.track_id)
            .field("size", &format_args!("{}x{}", w, h))
            .finish()
    }
}

/// The published view of the current track.
#[derive(Debug, Clone)]
pub struct NowPlaying {
    pub track_id: String,
    pub title: String,
    pub artist: String,
    /// Zero when the provider does not know the length.
    pub duration_secs: u64,
    pub position_secs: u64,
    pub is_paused: bool,
    pub artwork: Option<Artwork>,
}

impl NowPlaying {
    fn from_player_state(state: &PlayerState) -> Self {
        Self {
            track_id: state.track_id.clone(),
            title: state.title.clone(),
            artist: state.artist.clone(),
            duration_secs: state.duration_ms / 1000,
            position_secs: state.position_ms / 1000,
            is_paused: state.is_paused,
            artwork: None,
        }
    }
}

/// Everything observers get to see, published after every mutation.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    pub has_token: bool,
    pub connection: ConnectionState,
    pub now_playing: Option<NowPlaying>,
    pub last_error: Option<SessionError>,
}

/// Side effects the owner has to carry out after a player-state update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateUpdate {
    pub ticker_running: bool,
    /// Track whose artwork should be fetched, if it is not held already.
    pub fetch_artwork: Option<String>,
}

/// Connection, token and now-playing bookkeeping for one session.
///
/// Purely synchronous; the controller task is its only writer.
#[derive(Debug, Default)]
pub struct Session {
    access_token: Option<AccessToken>,
    connection: ConnectionState,
    now_playing: Option<NowPlaying>,
    epoch: u64,
    last_error: Option<SessionError>,
}

impl Session {
    pub fn new(access_token: Option<AccessToken>) -> Self {
        Self {
            access_token,
            ..Self::default()
        }
    }

    pub fn access_token(&self) -> Option<&AccessToken> {
        self.access_token.as_ref()
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionState::Connected
    }

    pub fn now_playing(&self) -> Option<&NowPlaying> {
        self.now_playing.as_ref()
    }

    /// Bumped by every connection attempt. Completions carrying an older
    /// value belong to a connection that no longer exists.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn last_error(&self) -> Option<&SessionError> {
        self.last_error.as_ref()
    }

    pub fn set_last_error(&mut self, error: SessionError) {
        self.last_error = Some(error);
    }

    pub fn store_token(&mut self, token: AccessToken) {
        self.access_token = Some(token);
    }

    /// Moves to `Connecting` and returns the token to connect with, or `None`
    /// when there is no token or a connection is already pending/established.
    pub fn begin_connect(&mut self) -> Option<(u64, AccessToken)> {
        if self.connection != ConnectionState::Disconnected {
            return None;
        }
        let token = self.access_token.clone()?;
        self.connection = ConnectionState::Connecting;
        self.epoch += 1;
        Some((self.epoch, token))
    }

    /// Returns true if this moved the session into `Connected`.
    pub fn mark_connected(&mut self) -> bool {
        if self.connection == ConnectionState::Connecting {
            self.connection = ConnectionState::Connected;
            true
        } else {
            false
        }
    }

    pub fn mark_disconnected(&mut self) {
        self.connection = ConnectionState::Disconnected;
    }

    /// Returns true if there was a live connection to tear down.
    pub fn begin_disconnect(&mut self) -> bool {
        if self.is_connected() {
            self.connection = ConnectionState::Disconnected;
            true
        } else {
            false
        }
    }

    pub fn apply_player_state(&mut self, state: &PlayerState) -> StateUpdate {
        let mut next = NowPlaying::from_player_state(state);
        if let Some(prev) = self.now_playing.take() {
            if prev.track_id == next.track_id {
                next.artwork = prev.artwork;
            }
        }

        let fetch_artwork = next.artwork.is_none().then(|| next.track_id.clone());
        let ticker_running = !next.is_paused;
        self.now_playing = Some(next);

        StateUpdate {
            ticker_running,
            fetch_artwork,
        }
    }

    pub fn ticker_should_run(&self) -> bool {
        self.now_playing.as_ref().is_some_and(|np| !np.is_paused)
    }

    /// One second of local interpolation. Returns true if the position moved.
    pub fn tick(&mut self) -> bool {
        let Some(np) = self.now_playing.as_mut() else {
            return false;
        };
        if np.is_paused {
            return false;
        }
        if np.duration_secs > 0 && np.position_secs >= np.duration_secs {
            return false;
        }
        np.position_secs += 1;
        true
    }

    /// Attaches artwork to the current track. Results for any other track are
    /// stale and dropped.
    pub fn apply_artwork(&mut self, artwork: Artwork) -> bool {
        match self.now_playing.as_mut() {
            Some(np) if np.track_id == artwork.track_id => {
                np.artwork = Some(artwork);
                true
            }
            _ => false,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            has_token: self.access_token.is_some(),
            connection: self.connection,
            now_playing: self.now_playing.clone(),
            last_error: self.last_error.clone(),
        }
    }
}

/// Target of a relative seek, never below zero.
pub fn seek_target_ms(position_ms: u64, delta_secs: i64, duration_ms: u64, policy: ForwardSeek) -> u64 {
    let delta_ms = delta_secs.saturating_mul(1000);
    let target = if delta_ms.is_negative() {
        position_ms.saturating_sub(delta_ms.unsigned_abs())
    } else {
        position_ms.saturating_add(delta_ms as u64)
    };

    match policy {
        ForwardSeek::ClampToDuration if duration_ms > 0 && delta_ms > 0 => target.min(duration_ms),
        _ => target,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(track: &str, position_ms: u64, duration_ms: u64, is_paused: bool) -> PlayerState {
        PlayerState {
            track_id: track.to_string(),
            title: format!("{} title", track),
            artist: "Artist".to_string(),
            duration_ms,
            position_ms,
            is_paused,
        }
    }

    fn connected() -> Session {
        let mut session = Session::new(Some(AccessToken::new("t")));
        session.begin_connect();
        session.mark_connected();
        session
    }

    #[test]
    fn test_connect_requires_token() {
        let mut session = Session::new(None);
        assert!(session.begin_connect().is_none());
        assert_eq!(session.connection(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_connect_is_idempotent_while_pending() {
        let mut session = Session::new(Some(AccessToken::new("t")));
        let first = session.begin_connect();
        assert_eq!(first.map(|(epoch, _)| epoch), Some(1));
        assert!(session.begin_connect().is_none());
        assert_eq!(session.connection(), ConnectionState::Connecting);

        assert!(session.mark_connected());
        assert!(session.begin_connect().is_none());
        assert_eq!(session.epoch(), 1);
    }

    #[test]
    fn test_disconnect_keeps_token() {
        let mut session = connected();
        assert!(session.begin_disconnect());
        assert!(!session.begin_disconnect());
        assert!(session.access_token().is_some());
        assert_eq!(session.begin_connect().map(|(epoch, _)| epoch), Some(2));
    }

    #[test]
    fn test_established_only_counts_while_connecting() {
        let mut session = Session::new(Some(AccessToken::new("t")));
        assert!(!session.mark_connected());
        assert_eq!(session.connection(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_ticker_follows_latest_paused_flag() {
        let mut session = connected();
        let events = [false, true, true, false, false, true];
        for (i, paused) in events.iter().enumerate() {
            let update = session.apply_player_state(&state("a", i as u64 * 1000, 60_000, *paused));
            assert_eq!(update.ticker_running, !paused);
            assert_eq!(session.ticker_should_run(), !paused);
            assert_eq!(session.now_playing().unwrap().is_paused, *paused);
        }
    }

    #[test]
    fn test_tick_advances_and_clamps_at_duration() {
        for (p, d, n) in [(0u64, 10u64, 3u64), (8, 10, 5), (10, 10, 1), (0, 3, 100)] {
            let mut session = connected();
            session.apply_player_state(&state("a", p * 1000, d * 1000, false));
            for _ in 0..n {
                session.tick();
            }
            assert_eq!(session.now_playing().unwrap().position_secs, (p + n).min(d));
        }
    }

    #[test]
    fn test_tick_unbounded_without_duration() {
        let mut session = connected();
        session.apply_player_state(&state("a", 5_000, 0, false));
        for _ in 0..20 {
            assert!(session.tick());
        }
        assert_eq!(session.now_playing().unwrap().position_secs, 25);
    }

    #[test]
    fn test_tick_does_nothing_while_paused() {
        let mut session = connected();
        session.apply_player_state(&state("a", 5_000, 60_000, true));
        assert!(!session.tick());
        assert_eq!(session.now_playing().unwrap().position_secs, 5);
    }

    #[test]
    fn test_positions_truncate_to_seconds() {
        let mut session = connected();
        session.apply_player_state(&state("a", 12_999, 180_500, true));
        let np = session.now_playing().unwrap();
        assert_eq!(np.position_secs, 12);
        assert_eq!(np.duration_secs, 180);
    }

    #[test]
    fn test_stale_artwork_is_discarded() {
        let mut session = connected();
        let update = session.apply_player_state(&state("a", 0, 60_000, false));
        assert_eq!(update.fetch_artwork.as_deref(), Some("a"));
        session.apply_player_state(&state("b", 0, 60_000, false));

        assert!(!session.apply_artwork(Artwork::new("a", DynamicImage::new_rgb8(2, 2))));
        assert!(session.now_playing().unwrap().artwork.is_none());

        assert!(session.apply_artwork(Artwork::new("b", DynamicImage::new_rgb8(2, 2))));
        assert_eq!(
            session.now_playing().unwrap().artwork.as_ref().map(Artwork::track_id),
            Some("b")
        );
    }

    #[test]
    fn test_same_track_keeps_artwork() {
        let mut session = connected();
        session.apply_player_state(&state("a", 0, 60_000, false));
        session.apply_artwork(Artwork::new("a", DynamicImage::new_rgb8(2, 2)));

        let update = session.apply_player_state(&state("a", 30_000, 60_000, true));
        assert_eq!(update.fetch_artwork, None);
        assert!(session.now_playing().unwrap().artwork.is_some());

        let update = session.apply_player_state(&state("b", 0, 60_000, true));
        assert_eq!(update.fetch_artwork.as_deref(), Some("b"));
        assert!(session.now_playing().unwrap().artwork.is_none());
    }

    #[test]
    fn test_seek_backward_clamps_at_zero() {
        assert_eq!(seek_target_ms(5_000, -15, 200_000, ForwardSeek::Unclamped), 0);
        assert_eq!(seek_target_ms(20_000, -15, 200_000, ForwardSeek::Unclamped), 5_000);
    }

    #[test]
    fn test_seek_forward_unclamped_overshoots() {
        let d = 200_000;
        assert_eq!(seek_target_ms(d - 5_000, 15, d, ForwardSeek::Unclamped), d + 10_000);
    }

    #[test]
    fn test_seek_forward_clamped_to_duration() {
        let d = 200_000;
        assert_eq!(seek_target_ms(d - 5_000, 15, d, ForwardSeek::ClampToDuration), d);
        // Unknown duration leaves nothing to clamp against.
        assert_eq!(seek_target_ms(5_000, 15, 0, ForwardSeek::ClampToDuration), 20_000);
    }
}
