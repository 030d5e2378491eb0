use std::fs;
use std::path::PathBuf;

use tracing::warn;

pub mod persistence;
pub mod user;

pub use persistence::PersistentState;
pub use user::{SessionSettings, SpotifyConfig, UserConfig};

pub struct AppConfig;

impl AppConfig {
    pub fn get_config_dir() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let xdg_dir = home.join(".config").join("nowplaying");

        // Ensure it exists
        if !xdg_dir.exists() {
            let _ = std::fs::create_dir_all(&xdg_dir);
        }

        xdg_dir
    }

    pub fn get_config_path() -> PathBuf {
        Self::get_config_dir().join("config.toml")
    }

    pub fn get_state_path() -> PathBuf {
        Self::get_config_dir().join("state.toml")
    }

    pub fn default_config_toml() -> String {
        toml::to_string_pretty(&UserConfig::default()).unwrap_or_default()
    }

    /// Load both. Missing or unreadable files fall back to defaults.
    pub fn load() -> (UserConfig, PersistentState) {
        let config_path = Self::get_config_path();
        let state_path = Self::get_state_path();

        let user_config = if config_path.exists() {
            match fs::read_to_string(&config_path) {
                Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
                    warn!(path = %config_path.display(), error = %e, "invalid config, using defaults");
                    UserConfig::default()
                }),
                Err(_) => UserConfig::default(),
            }
        } else {
            // Create default config.toml if missing
            let _ = fs::write(&config_path, Self::default_config_toml());
            UserConfig::default()
        };

        let state = if state_path.exists() {
            match fs::read_to_string(&state_path) {
                Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
                    warn!(path = %state_path.display(), error = %e, "invalid state file, ignoring");
                    PersistentState::default()
                }),
                Err(_) => PersistentState::default(),
            }
        } else {
            PersistentState::default()
        };

        (user_config, state)
    }
}
