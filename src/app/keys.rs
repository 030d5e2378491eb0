use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyConfig {
    pub quit: String,
    pub play_pause: String,
    pub next_track: String,
    pub prev_track: String,

    // Seek
    pub seek_forward: String,
    pub seek_forward_alt: String,
    pub seek_backward: String,
    pub seek_backward_alt: String,

    // Session
    pub connect: String,
    pub disconnect: String,
    pub authorize: String,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            quit: "q".to_string(),
            play_pause: "Space".to_string(),
            next_track: "n".to_string(),
            prev_track: "p".to_string(),

            seek_forward: "l".to_string(),
            seek_forward_alt: "Right".to_string(),
            seek_backward: "h".to_string(),
            seek_backward_alt: "Left".to_string(),

            connect: "c".to_string(),
            disconnect: "d".to_string(),
            authorize: "a".to_string(),
        }
    }
}

impl KeyConfig {
    pub fn matches(&self, event: KeyEvent, key_str: &str) -> bool {
        match key_str {
            "Space" => event.code == KeyCode::Char(' '),
            "Enter" => event.code == KeyCode::Enter,
            "Backspace" => event.code == KeyCode::Backspace,
            "Esc" => event.code == KeyCode::Esc,
            "Tab" => event.code == KeyCode::Tab,
            "BackTab" => event.code == KeyCode::BackTab,
            "Up" => event.code == KeyCode::Up,
            "Down" => event.code == KeyCode::Down,
            "Left" => event.code == KeyCode::Left,
            "Right" => event.code == KeyCode::Right,
            s if s.chars().count() == 1 => {
                if let Some(ch) = s.chars().next() {
                    // Check for shift modifier if char is uppercase
                    if ch.is_uppercase() {
                        event.code == KeyCode::Char(ch)
                            || (event.code == KeyCode::Char(ch.to_ascii_lowercase())
                                && event.modifiers.contains(KeyModifiers::SHIFT))
                    } else {
                        event.code == KeyCode::Char(ch)
                    }
                } else {
                    false
                }
            }
            _ => false,
        }
    }

    // Helper for UI display
    pub fn display(&self, key_str: &str) -> String {
        match key_str {
            "Up" => "↑".to_string(),
            "Down" => "↓".to_string(),
            "Left" => "←".to_string(),
            "Right" => "→".to_string(),
            "BackTab" => "S-Tab".to_string(),
            "Backspace" => "Bksp".to_string(),
            _ => key_str.to_string(),
        }
    }

    /// One-line cheat sheet for the footer.
    pub fn hints(&self) -> String {
        format!(
            "{} play/pause  {}/{} prev/next  {}/{} seek  {} connect  {} disconnect  {} authorize  {} quit",
            self.display(&self.play_pause),
            self.display(&self.prev_track),
            self.display(&self.next_track),
            self.display(&self.seek_backward_alt),
            self.display(&self.seek_forward_alt),
            self.display(&self.connect),
            self.display(&self.disconnect),
            self.display(&self.authorize),
            self.display(&self.quit),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_named_and_char_keys() {
        let keys = KeyConfig::default();
        assert!(keys.matches(key(KeyCode::Char(' ')), &keys.play_pause));
        assert!(keys.matches(key(KeyCode::Right), &keys.seek_forward_alt));
        assert!(keys.matches(key(KeyCode::Char('n')), &keys.next_track));
        assert!(!keys.matches(key(KeyCode::Char('N')), &keys.next_track));
    }

    #[test]
    fn test_uppercase_binding_accepts_shift() {
        let keys = KeyConfig::default();
        let shifted = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::SHIFT);
        assert!(keys.matches(shifted, "Q"));
        assert!(keys.matches(key(KeyCode::Char('Q')), "Q"));
    }

    #[test]
    fn test_partial_keys_table() {
        let keys: KeyConfig = toml::from_str(r#"quit = "x""#).unwrap();
        assert_eq!(keys.quit, "x");
        assert_eq!(keys.play_pause, "Space");
    }
}
