use std::fmt;

use futures::future::BoxFuture;
use image::DynamicImage;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::error::ProviderResult;
use crate::session::auth::{self, AccessToken, AuthorizationCallback};

/// Authoritative player state as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerState {
    pub track_id: String,
    pub title: String,
    pub artist: String,
    pub duration_ms: u64,
    pub position_ms: u64,
    pub is_paused: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerCommand {
    Resume,
    Pause,
    SkipNext,
    SkipPrevious,
    Seek { position_ms: u64 },
}

impl fmt::Display for PlayerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resume => f.write_str("resume"),
            Self::Pause => f.write_str("pause"),
            Self::SkipNext => f.write_str("skip next"),
            Self::SkipPrevious => f.write_str("skip previous"),
            Self::Seek { position_ms } => write!(f, "seek to {}ms", position_ms),
        }
    }
}

/// Everything a provider pushes at the session without being asked.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    ConnectionEstablished,
    ConnectionFailed(String),
    /// `None` is a clean remote hang-up.
    Disconnected(Option<String>),
    PlayerStateChanged(PlayerState),
}

/// The session's inbox for provider events. Cheap to clone.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<ProviderEvent>,
}

impl EventSink {
    pub fn new(tx: mpsc::UnboundedSender<ProviderEvent>) -> Self {
        Self { tx }
    }

    /// Returns false once the session is gone.
    pub fn send(&self, event: ProviderEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// The unified interface for a remote playback service 🎵
///
/// Methods returning a future must not block: the session spawns the
/// future and feeds its output back into its own event loop.
pub trait PlaybackProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Starts the external authorization flow and returns the URL the user has to open.
    fn authorize(&self) -> ProviderResult<Url>;

    fn parse_authorization_callback(&self, url: &Url) -> AuthorizationCallback {
        auth::parse_callback(url)
    }

    fn connect(&self, token: AccessToken) -> BoxFuture<'static, ProviderResult<()>>;

    /// Begin pushing `PlayerStateChanged` / `Disconnected` events into `sink`.
    fn subscribe(&self, sink: EventSink) -> BoxFuture<'static, ProviderResult<()>>;

    fn disconnect(&self);

    fn command(&self, command: PlayerCommand) -> BoxFuture<'static, ProviderResult<()>>;

    fn player_state(&self) -> BoxFuture<'static, ProviderResult<PlayerState>>;

    fn fetch_artwork(
        &self,
        track_id: &str,
        size: u32,
    ) -> BoxFuture<'static, ProviderResult<DynamicImage>>;
}
