use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::app::keys::KeyConfig;
use crate::player::web_api::{WebApiConfig, DEFAULT_ACCOUNTS_URL, DEFAULT_API_URL};
use crate::session::{AccessToken, ForwardSeek, SessionConfig};

/// User-editable configuration (ReadOnly by App after load)
/// stored in `config.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default)]
    pub spotify: SpotifyConfig,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub keys: KeyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyConfig {
    /// From the Spotify developer dashboard. Required for `authorize`.
    #[serde(default)]
    pub client_id: String,
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    #[serde(default = "default_accounts_url")]
    pub accounts_url: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    #[serde(default = "default_artwork_size")]
    pub artwork_size: u32,
    #[serde(default = "default_seek_step")]
    pub seek_step_secs: i64,
    #[serde(default)]
    pub forward_seek: ForwardSeek,
    /// Disconnect when the terminal loses focus, like a phone app going to the background.
    #[serde(default)]
    pub disconnect_on_blur: bool,
}

fn default_redirect_uri() -> String {
    "nowplaying://callback".to_string()
}

fn default_accounts_url() -> String {
    DEFAULT_ACCOUNTS_URL.to_string()
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_artwork_size() -> u32 {
    300
}

fn default_seek_step() -> i64 {
    15
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            redirect_uri: default_redirect_uri(),
            accounts_url: default_accounts_url(),
            api_url: default_api_url(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            artwork_size: default_artwork_size(),
            seek_step_secs: default_seek_step(),
            forward_seek: ForwardSeek::default(),
            disconnect_on_blur: false,
        }
    }
}

impl UserConfig {
    pub fn web_api_config(&self) -> WebApiConfig {
        WebApiConfig {
            client_id: self.spotify.client_id.clone(),
            redirect_uri: self.spotify.redirect_uri.clone(),
            accounts_url: self.spotify.accounts_url.clone(),
            api_url: self.spotify.api_url.clone(),
            // Anything faster gets rate limited.
            poll_interval: Duration::from_millis(self.spotify.poll_interval_ms.max(250)),
        }
    }

    pub fn session_config(&self, access_token: Option<AccessToken>) -> SessionConfig {
        SessionConfig {
            artwork_size: self.session.artwork_size.max(1),
            forward_seek: self.session.forward_seek,
            access_token,
            ..SessionConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: UserConfig = toml::from_str(
            r#"
            [spotify]
            client_id = "abc"

            [session]
            forward_seek = "clamp_to_duration"
            "#,
        )
        .unwrap();

        assert_eq!(config.spotify.client_id, "abc");
        assert_eq!(config.spotify.redirect_uri, "nowplaying://callback");
        assert_eq!(config.session.seek_step_secs, 15);
        assert_eq!(config.session.forward_seek, ForwardSeek::ClampToDuration);
        assert_eq!(config.keys.quit, "q");
    }

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let text = toml::to_string_pretty(&UserConfig::default()).unwrap();
        let back: UserConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.session.artwork_size, 300);
        assert_eq!(back.session.forward_seek, ForwardSeek::Unclamped);
    }

    #[test]
    fn test_poll_interval_has_a_floor() {
        let mut config = UserConfig::default();
        config.spotify.poll_interval_ms = 10;
        assert_eq!(config.web_api_config().poll_interval, Duration::from_millis(250));
    }
}
