use std::time::{Duration, Instant};

use super::config::UserConfig;
use super::keys::KeyConfig;
use crate::artwork::{AsciiArtLine, ArtworkRenderer};
use crate::session::{ConnectionState, SessionEvent, SessionSnapshot};
use crate::ui::theme::Theme;

const TOAST_DURATION: Duration = Duration::from_millis(2500);

pub struct Toast {
    pub message: String,
    pub start_time: Instant,
    pub deadline: Instant,
}

/// Rendered cover, reused until the track or the width changes.
pub struct ArtCache {
    pub track_id: String,
    pub cols: u32,
    pub lines: Vec<AsciiArtLine>,
}

/// Everything the remote view needs, rebuilt from session snapshots.
pub struct App {
    pub is_running: bool,
    pub snapshot: SessionSnapshot,
    pub keys: KeyConfig,
    pub theme: Theme,
    pub seek_step_secs: i64,
    pub disconnect_on_blur: bool,
    pub provider_name: String,
    /// Last authorization URL handed out, shown until a token arrives.
    pub auth_url: Option<String>,
    pub toast: Option<Toast>,
    pub art_cache: Option<ArtCache>,
}

impl App {
    pub fn new(config: &UserConfig, provider_name: &str, theme: Theme) -> Self {
        Self {
            is_running: true,
            snapshot: SessionSnapshot::default(),
            keys: config.keys.clone(),
            theme,
            seek_step_secs: config.session.seek_step_secs,
            disconnect_on_blur: config.session.disconnect_on_blur,
            provider_name: provider_name.to_string(),
            auth_url: None,
            toast: None,
            art_cache: None,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.snapshot
            .now_playing
            .as_ref()
            .map(|np| np.is_paused)
            .unwrap_or(true)
    }

    pub fn is_connected(&self) -> bool {
        self.snapshot.connection == ConnectionState::Connected
    }

    pub fn apply_snapshot(&mut self, snapshot: SessionSnapshot) {
        if snapshot.has_token {
            self.auth_url = None;
        }
        self.snapshot = snapshot;
    }

    pub fn apply_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::AuthorizationStarted { url } => {
                self.auth_url = Some(url.to_string());
                self.show_toast("🔑 Open the authorization link");
            }
            SessionEvent::Authorized(_) => self.show_toast("🔓 Authorized"),
            SessionEvent::Failure(error) => self.show_toast(&format!("⚠ {}", error)),
        }
    }

    pub fn show_toast(&mut self, message: &str) {
        let now = Instant::now();
        let deadline = now + TOAST_DURATION;

        if let Some(ref mut current) = self.toast {
            // Keep start_time so a rapid update does not restart the entrance.
            current.message = message.to_string();
            current.deadline = deadline;
        } else {
            self.toast = Some(Toast {
                message: message.to_string(),
                start_time: now,
                deadline,
            });
        }
    }

    /// Half-block lines for the current cover at `cols` wide, or `None`
    /// while no artwork is held.
    pub fn art_lines(&mut self, cols: u32) -> Option<&[AsciiArtLine]> {
        let artwork = self.snapshot.now_playing.as_ref()?.artwork.as_ref()?;
        let fresh = self
            .art_cache
            .as_ref()
            .is_some_and(|c| c.cols == cols && c.track_id == artwork.track_id());
        if !fresh {
            self.art_cache = Some(ArtCache {
                track_id: artwork.track_id().to_string(),
                cols,
                lines: ArtworkRenderer::render_to_lines(artwork.image(), cols, cols / 2),
            });
        }
        self.art_cache.as_ref().map(|c| c.lines.as_slice())
    }

    /// Called every tick to update state
    pub fn on_tick(&mut self) {
        if let Some(ref toast) = self.toast {
            if Instant::now() > toast.deadline {
                self.toast = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Artwork, NowPlaying, SessionError};

    fn app() -> App {
        App::new(&UserConfig::default(), "offline", Theme::default())
    }

    #[test]
    fn test_initial_state() {
        let app = app();
        assert!(app.is_running);
        assert!(app.is_paused());
        assert!(!app.is_connected());
        assert_eq!(app.seek_step_secs, 15);
    }

    #[test]
    fn test_failure_shows_toast() {
        let mut app = app();
        app.apply_event(SessionEvent::Failure(SessionError::AuthorizationFailed(
            "access_denied".to_string(),
        )));
        let toast = app.toast.as_ref().unwrap();
        assert!(toast.message.contains("access_denied"));
    }

    fn with_art(app: &mut App, track_id: &str) {
        let image = image::DynamicImage::new_rgb8(8, 8);
        app.apply_snapshot(SessionSnapshot {
            now_playing: Some(NowPlaying {
                track_id: track_id.to_string(),
                title: "t".to_string(),
                artist: "a".to_string(),
                duration_secs: 100,
                position_secs: 0,
                is_paused: false,
                artwork: Some(Artwork::new(track_id, image)),
            }),
            ..SessionSnapshot::default()
        });
    }

    #[test]
    fn test_art_lines_reused_across_frames() {
        let mut app = app();
        assert!(app.art_lines(10).is_none());

        with_art(&mut app, "a");
        let first = app.art_lines(10).unwrap().as_ptr();
        assert_eq!(app.art_lines(10).unwrap().len(), 5);

        // A position tick keeps the same cover.
        with_art(&mut app, "a");
        assert_eq!(app.art_lines(10).unwrap().as_ptr(), first);

        assert_eq!(app.art_lines(6).unwrap().len(), 3);
        assert_eq!(app.art_cache.as_ref().unwrap().cols, 6);

        with_art(&mut app, "b");
        app.art_lines(6);
        assert_eq!(app.art_cache.as_ref().unwrap().track_id, "b");
    }

    #[test]
    fn test_token_clears_auth_url() {
        let mut app = app();
        app.auth_url = Some("https://accounts.example/authorize".to_string());
        app.apply_snapshot(SessionSnapshot {
            has_token: true,
            ..SessionSnapshot::default()
        });
        assert!(app.auth_url.is_none());
    }
}
