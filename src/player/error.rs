use thiserror::Error;

/// Failures reported by a [`PlaybackProvider`](super::PlaybackProvider).
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("access token rejected")]
    Unauthorized,
    #[error("not connected")]
    NotConnected,
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("no active playback")]
    NoActivePlayback,
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type ProviderResult<T> = Result<T, ProviderError>;
