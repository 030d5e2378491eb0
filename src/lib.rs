pub mod app;
pub mod artwork;
pub mod player;
pub mod session;
pub mod ui;

pub use player::{MockProvider, PlaybackProvider, WebApiProvider};
pub use session::{SessionConfig, SessionController, SessionEvent, SessionHandle, SessionSnapshot};
