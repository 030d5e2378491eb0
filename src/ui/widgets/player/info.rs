use crate::app::App;
use crate::session::ConnectionState;
use crate::ui::utils::truncate;
use ratatui::{
    layout::{Alignment, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

pub fn render(f: &mut Frame, area: Rect, app: &mut App) {
    let theme = &app.theme;
    let width = area.width as usize;

    let (title, artist) = match &app.snapshot.now_playing {
        Some(np) => (np.title.as_str(), np.artist.as_str()),
        None => ("—", ""),
    };

    let (state_label, state_color) = match app.snapshot.connection {
        ConnectionState::Connected => ("● connected", theme.green),
        ConnectionState::Connecting => ("◌ connecting", theme.yellow),
        ConnectionState::Disconnected if app.snapshot.has_token => ("○ disconnected", theme.overlay),
        ConnectionState::Disconnected => ("○ not authorized", theme.red),
    };

    let lines = vec![
        Line::from(Span::styled(
            truncate(title, width),
            Style::default().fg(theme.text).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(truncate(artist, width), Style::default().fg(theme.magenta))),
        Line::from(vec![
            Span::styled(state_label, Style::default().fg(state_color)),
            Span::styled(format!("  {}", app.provider_name), Style::default().fg(theme.overlay)),
        ]),
    ];

    f.render_widget(Paragraph::new(lines).alignment(Alignment::Center), area);
}
