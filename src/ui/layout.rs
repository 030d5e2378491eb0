use ratatui::layout::{Constraint, Direction, Layout, Rect};

pub struct MainLayout {
    pub body_area: Rect,
    pub footer_area: Rect,
}

pub fn get_main_layout(area: Rect) -> MainLayout {
    // Footer needs 1 line at the bottom always.
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),    // Body
            Constraint::Length(1), // Footer
        ])
        .split(area);

    MainLayout {
        body_area: chunks[0],
        footer_area: chunks[1],
    }
}

pub struct CardLayout {
    pub art: Rect,
    pub info: Rect,
    pub gauge: Rect,
    pub time: Rect,
}

/// Splits the inside of the now-playing card. Artwork is dropped first when
/// the terminal is short.
pub fn get_card_layout(area: Rect) -> CardLayout {
    let art_height = if area.height >= 12 {
        area.height - 6
    } else {
        0
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(art_height),
            Constraint::Length(3), // Title, artist, connection
            Constraint::Length(1), // Gauge
            Constraint::Length(1), // Time
        ])
        .split(area);

    CardLayout {
        art: chunks[0],
        info: chunks[1],
        gauge: chunks[2],
        time: chunks[3],
    }
}
