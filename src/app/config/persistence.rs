use serde::{Deserialize, Serialize};
use std::fs;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::session::AccessToken;

/// Automatically saved session state
/// stored in `state.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistentState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<AccessToken>,
    /// Unix seconds at which the token was stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_saved_at: Option<u64>,
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl PersistentState {
    pub fn store_token(&mut self, token: AccessToken) {
        self.access_token = Some(token);
        self.token_saved_at = Some(unix_now());
    }

    /// The stored token, unless its announced lifetime is over.
    pub fn usable_token(&self) -> Option<AccessToken> {
        self.usable_token_at(unix_now())
    }

    fn usable_token_at(&self, now: u64) -> Option<AccessToken> {
        let token = self.access_token.as_ref()?;
        match (token.expires_in(), self.token_saved_at) {
            (Some(lifetime), Some(saved_at)) if saved_at.saturating_add(lifetime) <= now => None,
            _ => Some(token.clone()),
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let path = super::AppConfig::get_state_path();
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}
