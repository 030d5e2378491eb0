pub mod auth;
pub mod controller;
pub mod error;
pub mod state;

pub use auth::{AccessToken, AuthorizationCallback};
pub use controller::{SessionConfig, SessionController, SessionEvent, SessionHandle};
pub use error::SessionError;
pub use state::{
    seek_target_ms, Artwork, ConnectionState, ForwardSeek, NowPlaying, Session, SessionSnapshot,
};
