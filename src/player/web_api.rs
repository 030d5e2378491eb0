//! Spotify Web API backed provider.
//!
//! There is no push channel in the Web API, so the subscription is a poll
//! loop that only forwards states a client could not have predicted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use futures::future::{self, BoxFuture, FutureExt};
use image::DynamicImage;
use reqwest::header::CONTENT_LENGTH;
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::error::{ProviderError, ProviderResult};
use super::traits::{EventSink, PlaybackProvider, PlayerCommand, PlayerState, ProviderEvent};
use crate::artwork::ArtworkRenderer;
use crate::session::auth::AccessToken;

pub const DEFAULT_ACCOUNTS_URL: &str = "https://accounts.spotify.com";
pub const DEFAULT_API_URL: &str = "https://api.spotify.com/v1";
const SCOPES: &str = "user-read-playback-state user-modify-playback-state";

/// Position drift beyond which a polled state counts as a change.
const DRIFT_TOLERANCE_MS: u64 = 2_000;
/// Consecutive poll failures before the connection is declared lost.
const MAX_POLL_FAILURES: u32 = 3;
/// Cover URLs kept before the cache starts over.
const MAX_COVER_URLS: usize = 16;

#[derive(Debug, Clone)]
pub struct WebApiConfig {
    pub client_id: String,
    pub redirect_uri: String,
    pub accounts_url: String,
    pub api_url: String,
    pub poll_interval: Duration,
}

impl Default for WebApiConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            redirect_uri: "nowplaying://callback".to_string(),
            accounts_url: DEFAULT_ACCOUNTS_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            poll_interval: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CurrentlyPlaying {
    #[serde(default)]
    is_playing: bool,
    progress_ms: Option<u64>,
    item: Option<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    uri: String,
    name: String,
    #[serde(default)]
    duration_ms: u64,
    #[serde(default)]
    artists: Vec<Artist>,
    album: Option<Album>,
}

#[derive(Debug, Deserialize)]
struct Artist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Album {
    #[serde(default)]
    images: Vec<ImageRef>,
}

#[derive(Debug, Clone, Deserialize)]
struct ImageRef {
    url: String,
    width: Option<u32>,
}

impl TryFrom<CurrentlyPlaying> for PlayerState {
    type Error = ProviderError;

    fn try_from(current: CurrentlyPlaying) -> Result<Self, Self::Error> {
        let item = current.item.ok_or(ProviderError::NoActivePlayback)?;
        let artist = item
            .artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        Ok(PlayerState {
            track_id: item.uri,
            title: item.name,
            artist,
            duration_ms: item.duration_ms,
            position_ms: current.progress_ms.unwrap_or(0),
            is_paused: !current.is_playing,
        })
    }
}

fn pick_largest(images: &[ImageRef]) -> Option<&ImageRef> {
    images.iter().max_by_key(|img| img.width.unwrap_or(0))
}

/// `spotify:track:abc` → `abc`
fn track_id_from_uri(uri: &str) -> Option<&str> {
    let mut parts = uri.split(':');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(_), Some("track"), Some(id), None) if !id.is_empty() => Some(id),
        _ => None,
    }
}

/// Decides whether a polled state should be forwarded to the session.
fn is_news(last: Option<&(PlayerState, Instant)>, state: &PlayerState, now: Instant) -> bool {
    let Some((prev, seen_at)) = last else {
        return true;
    };
    if prev.track_id != state.track_id || prev.is_paused != state.is_paused {
        return true;
    }
    let expected = if prev.is_paused {
        prev.position_ms
    } else {
        prev.position_ms + now.duration_since(*seen_at).as_millis() as u64
    };
    expected.abs_diff(state.position_ms) > DRIFT_TOLERANCE_MS
}

/// Largest cover per track uri, filled by every `/me/player` read so artwork
/// needs no extra track lookup.
#[derive(Clone, Default)]
struct CoverUrls(Arc<Mutex<HashMap<String, String>>>);

impl CoverUrls {
    fn remember(&self, current: &CurrentlyPlaying) {
        let Some(item) = &current.item else {
            return;
        };
        let Some(image) = item.album.as_ref().and_then(|a| pick_largest(&a.images)) else {
            return;
        };
        let mut urls = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if urls.len() >= MAX_COVER_URLS && !urls.contains_key(&item.uri) {
            urls.clear();
        }
        urls.insert(item.uri.clone(), image.url.clone());
    }

    fn get(&self, track_id: &str) -> Option<String> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(track_id)
            .cloned()
    }
}

/// Thin authenticated HTTP layer, cloned into every spawned request.
#[derive(Clone)]
struct Api {
    client: Client,
    base: String,
    token: Arc<RwLock<Option<AccessToken>>>,
    covers: CoverUrls,
}

impl Api {
    fn bearer(&self) -> ProviderResult<String> {
        let guard = self.token.read().unwrap_or_else(PoisonError::into_inner);
        guard
            .as_ref()
            .map(|t| t.secret().to_string())
            .ok_or(ProviderError::NotConnected)
    }

    async fn request(&self, method: Method, path: &str) -> ProviderResult<reqwest::Response> {
        let bearer = self.bearer()?;
        let url = format!("{}{}", self.base, path);
        let mut builder = self.client.request(method.clone(), &url).bearer_auth(bearer);
        if method == Method::PUT || method == Method::POST {
            builder = builder.header(CONTENT_LENGTH, 0);
        }

        let resp = builder.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::UNAUTHORIZED => ProviderError::Unauthorized,
            StatusCode::FORBIDDEN => ProviderError::Rejected(body),
            StatusCode::NOT_FOUND => ProviderError::NoActivePlayback,
            _ => ProviderError::Status {
                status: status.as_u16(),
                body,
            },
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ProviderResult<Option<T>> {
        let resp = self.request(Method::GET, path).await?;
        if resp.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }

    async fn player_state(&self) -> ProviderResult<PlayerState> {
        let current = self
            .get_json::<CurrentlyPlaying>("/me/player")
            .await?
            .ok_or(ProviderError::NoActivePlayback)?;
        self.covers.remember(&current);
        current.try_into()
    }

    /// Cover URL from the last player read, else a `/tracks/{id}` lookup.
    async fn cover_url(&self, uri: &str) -> ProviderResult<String> {
        if let Some(url) = self.covers.get(uri) {
            return Ok(url);
        }
        let id = track_id_from_uri(uri)
            .ok_or_else(|| ProviderError::InvalidResponse(format!("not a track uri: {}", uri)))?;
        let item: Item = self
            .get_json(&format!("/tracks/{}", id))
            .await?
            .ok_or_else(|| ProviderError::InvalidResponse("empty track response".to_string()))?;
        item.album
            .as_ref()
            .and_then(|album| pick_largest(&album.images))
            .map(|image| image.url.clone())
            .ok_or_else(|| ProviderError::InvalidResponse("track has no album art".to_string()))
    }
}

async fn poll_player_state(api: Api, sink: EventSink, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    let mut last: Option<(PlayerState, Instant)> = None;
    let mut failures = 0;

    loop {
        ticker.tick().await;
        if sink.is_closed() {
            break;
        }

        match api.player_state().await {
            Ok(state) => {
                failures = 0;
                let now = Instant::now();
                if is_news(last.as_ref(), &state, now) {
                    if !sink.send(ProviderEvent::PlayerStateChanged(state.clone())) {
                        break;
                    }
                    last = Some((state, now));
                }
            }
            Err(ProviderError::NoActivePlayback) => {
                failures = 0;
            }
            Err(ProviderError::Unauthorized) => {
                sink.send(ProviderEvent::Disconnected(Some(
                    ProviderError::Unauthorized.to_string(),
                )));
                break;
            }
            Err(e) => {
                failures += 1;
                warn!(error = %e, failures, "player state poll failed");
                if failures >= MAX_POLL_FAILURES {
                    sink.send(ProviderEvent::Disconnected(Some(e.to_string())));
                    break;
                }
            }
        }
    }
    debug!("player state polling stopped");
}

pub struct WebApiProvider {
    config: WebApiConfig,
    api: Api,
    artwork: Arc<ArtworkRenderer>,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl WebApiProvider {
    pub fn new(config: WebApiConfig, client: Client) -> Self {
        let api = Api {
            client: client.clone(),
            base: config.api_url.trim_end_matches('/').to_string(),
            token: Arc::new(RwLock::new(None)),
            covers: CoverUrls::default(),
        };
        Self {
            config,
            api,
            artwork: Arc::new(ArtworkRenderer::new(client)),
            poller: Mutex::new(None),
        }
    }

    fn stop_polling(&self) {
        let mut poller = self.poller.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = poller.take() {
            task.abort();
        }
    }
}

impl Drop for WebApiProvider {
    fn drop(&mut self) {
        self.stop_polling();
    }
}

impl PlaybackProvider for WebApiProvider {
    fn name(&self) -> &str {
        "spotify-web-api"
    }

    /// Implicit-grant URL: the redirect carries `access_token` in its fragment.
    /// Spotify has been retiring this grant, so apps registered after the
    /// cut-off may be refused here and need a token obtained elsewhere,
    /// handed in through `callback`.
    fn authorize(&self) -> ProviderResult<Url> {
        if self.config.client_id.is_empty() {
            return Err(ProviderError::InvalidConfig(
                "client_id is not set in config.toml".to_string(),
            ));
        }
        let base = format!("{}/authorize", self.config.accounts_url.trim_end_matches('/'));
        Url::parse_with_params(
            &base,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("response_type", "token"),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("scope", SCOPES),
            ],
        )
        .map_err(|e| ProviderError::InvalidConfig(e.to_string()))
    }

    fn connect(&self, token: AccessToken) -> BoxFuture<'static, ProviderResult<()>> {
        *self.api.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token);
        let api = self.api.clone();
        async move {
            api.request(Method::GET, "/me").await?;
            Ok(())
        }
        .boxed()
    }

    fn subscribe(&self, sink: EventSink) -> BoxFuture<'static, ProviderResult<()>> {
        self.stop_polling();
        let task = tokio::spawn(poll_player_state(
            self.api.clone(),
            sink,
            self.config.poll_interval,
        ));
        *self.poller.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);
        future::ready(Ok(())).boxed()
    }

    fn disconnect(&self) {
        self.stop_polling();
        *self.api.token.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn command(&self, command: PlayerCommand) -> BoxFuture<'static, ProviderResult<()>> {
        let (method, path) = match command {
            PlayerCommand::Resume => (Method::PUT, "/me/player/play".to_string()),
            PlayerCommand::Pause => (Method::PUT, "/me/player/pause".to_string()),
            PlayerCommand::SkipNext => (Method::POST, "/me/player/next".to_string()),
            PlayerCommand::SkipPrevious => (Method::POST, "/me/player/previous".to_string()),
            PlayerCommand::Seek { position_ms } => (
                Method::PUT,
                format!("/me/player/seek?position_ms={}", position_ms),
            ),
        };
        let api = self.api.clone();
        async move {
            api.request(method, &path).await?;
            Ok(())
        }
        .boxed()
    }

    fn player_state(&self) -> BoxFuture<'static, ProviderResult<PlayerState>> {
        let api = self.api.clone();
        async move { api.player_state().await }.boxed()
    }

    fn fetch_artwork(&self, track_id: &str, size: u32) -> BoxFuture<'static, ProviderResult<DynamicImage>> {
        let api = self.api.clone();
        let artwork = self.artwork.clone();
        let uri = track_id.to_string();
        async move {
            let url = api.cover_url(&uri).await?;
            let img = artwork.fetch_image(&url).await?;
            Ok(ArtworkRenderer::fit(&img, size))
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(track: &str, position_ms: u64, is_paused: bool) -> PlayerState {
        PlayerState {
            track_id: track.to_string(),
            title: "t".to_string(),
            artist: "a".to_string(),
            duration_ms: 200_000,
            position_ms,
            is_paused,
        }
    }

    #[test]
    fn test_parse_currently_playing() {
        let body = r#"{
            "is_playing": true,
            "progress_ms": 42000,
            "item": {
                "uri": "spotify:track:6rqhFgbbKwnb9MLmUQDhG6",
                "id": "6rqhFgbbKwnb9MLmUQDhG6",
                "name": "Speak to Me",
                "duration_ms": 90000,
                "artists": [{"name": "Pink Floyd"}, {"name": "Guest"}],
                "album": {"images": [
                    {"url": "https://i.scdn.co/small", "width": 64, "height": 64},
                    {"url": "https://i.scdn.co/large", "width": 640, "height": 640}
                ]}
            }
        }"#;
        let current: CurrentlyPlaying = serde_json::from_str(body).unwrap();
        let images = current.item.as_ref().unwrap().album.as_ref().unwrap().images.clone();
        let state = PlayerState::try_from(current).unwrap();

        assert_eq!(state.track_id, "spotify:track:6rqhFgbbKwnb9MLmUQDhG6");
        assert_eq!(state.title, "Speak to Me");
        assert_eq!(state.artist, "Pink Floyd, Guest");
        assert_eq!(state.duration_ms, 90_000);
        assert_eq!(state.position_ms, 42_000);
        assert!(!state.is_paused);
        assert_eq!(pick_largest(&images).unwrap().url, "https://i.scdn.co/large");
    }

    fn playing(uri: &str, cover: Option<&str>) -> CurrentlyPlaying {
        let album = match cover {
            Some(url) => format!(r#"{{"images": [{{"url": "{}", "width": 300}}]}}"#, url),
            None => r#"{"images": []}"#.to_string(),
        };
        let body = format!(
            r#"{{"is_playing": true, "item": {{"uri": "{}", "name": "n", "album": {}}}}}"#,
            uri, album
        );
        serde_json::from_str(&body).unwrap()
    }

    #[test]
    fn test_cover_url_comes_from_player_read() {
        let covers = CoverUrls::default();
        covers.remember(&playing("spotify:track:a", Some("https://i.scdn.co/a")));
        covers.remember(&playing("spotify:track:b", None));

        assert_eq!(covers.get("spotify:track:a").as_deref(), Some("https://i.scdn.co/a"));
        assert_eq!(covers.get("spotify:track:b"), None);
    }

    #[tokio::test]
    async fn test_cached_cover_skips_track_lookup() {
        // No token: any HTTP request would fail with NotConnected.
        let provider = WebApiProvider::new(WebApiConfig::default(), Client::new());
        provider
            .api
            .covers
            .remember(&playing("spotify:track:a", Some("https://i.scdn.co/a")));

        assert_eq!(
            provider.api.cover_url("spotify:track:a").await.unwrap(),
            "https://i.scdn.co/a"
        );
        assert!(matches!(
            provider.api.cover_url("spotify:track:zzz").await,
            Err(ProviderError::NotConnected)
        ));
    }

    #[test]
    fn test_cover_cache_stays_bounded() {
        let covers = CoverUrls::default();
        for i in 0..=MAX_COVER_URLS {
            let uri = format!("spotify:track:{}", i);
            covers.remember(&playing(&uri, Some("https://i.scdn.co/x")));
        }
        assert!(covers.0.lock().unwrap().len() <= MAX_COVER_URLS);
        assert!(covers.get(&format!("spotify:track:{}", MAX_COVER_URLS)).is_some());
    }

    #[test]
    fn test_no_item_means_no_playback() {
        let current: CurrentlyPlaying = serde_json::from_str(r#"{"is_playing": false, "item": null}"#).unwrap();
        assert!(matches!(
            PlayerState::try_from(current),
            Err(ProviderError::NoActivePlayback)
        ));
    }

    #[test]
    fn test_track_id_from_uri() {
        assert_eq!(track_id_from_uri("spotify:track:abc"), Some("abc"));
        assert_eq!(track_id_from_uri("spotify:episode:abc"), None);
        assert_eq!(track_id_from_uri("spotify:track:"), None);
        assert_eq!(track_id_from_uri("abc"), None);
    }

    #[test]
    fn test_authorize_url() {
        let provider = WebApiProvider::new(
            WebApiConfig {
                client_id: "cid".to_string(),
                ..WebApiConfig::default()
            },
            Client::new(),
        );
        let url = provider.authorize().unwrap();
        assert_eq!(url.host_str(), Some("accounts.spotify.com"));
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("client_id".to_string(), "cid".to_string())));
        assert!(pairs.contains(&("response_type".to_string(), "token".to_string())));
        assert!(pairs.contains(&("redirect_uri".to_string(), "nowplaying://callback".to_string())));
    }

    #[test]
    fn test_authorize_requires_client_id() {
        let provider = WebApiProvider::new(WebApiConfig::default(), Client::new());
        assert!(matches!(provider.authorize(), Err(ProviderError::InvalidConfig(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_is_news() {
        let t0 = Instant::now();
        let playing = (state("a", 10_000, false), t0);

        assert!(is_news(None, &state("a", 0, true), t0));

        tokio::time::advance(Duration::from_secs(5)).await;
        let now = Instant::now();
        // On schedule: expected 15s.
        assert!(!is_news(Some(&playing), &state("a", 15_500, false), now));
        // Drifted: someone seeked.
        assert!(is_news(Some(&playing), &state("a", 60_000, false), now));
        assert!(is_news(Some(&playing), &state("b", 15_000, false), now));
        assert!(is_news(Some(&playing), &state("a", 15_000, true), now));

        let paused = (state("a", 10_000, true), t0);
        assert!(!is_news(Some(&paused), &state("a", 10_000, true), now));
    }
}
