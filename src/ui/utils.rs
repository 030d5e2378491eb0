/// Safely truncate string to max characters, appending "…" if truncated 🛡️
pub fn truncate(s: &str, max_width: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() > max_width {
        chars
            .into_iter()
            .take(max_width.saturating_sub(1))
            .collect::<String>()
            + "…"
    } else {
        s.to_string()
    }
}

/// `mm:ss`, switching to `h:mm:ss` past the hour.
pub fn format_time(secs: u64) -> String {
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{:02}:{:02}", m, s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a longer title", 6), "a lon…");
        assert_eq!(truncate("ñandú ñandú", 5), "ñand…");
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0), "00:00");
        assert_eq!(format_time(75), "01:15");
        assert_eq!(format_time(3725), "1:02:05");
    }
}
