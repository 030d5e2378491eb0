use crate::app::App;
use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, BorderType, Borders, Clear, Paragraph},
    Frame,
};

pub fn render(f: &mut Frame, app: &App) {
    let Some(ref toast) = app.toast else {
        return;
    };
    let theme = &app.theme;
    let area = f.area();

    let width = (toast.message.chars().count() as u16 + 4).min(area.width.saturating_sub(2));
    let height = 3;
    let x = area.width.saturating_sub(width + 1); // Top-right fixed
    let visible_area = Rect::new(x, 1, width, height).intersection(area);
    if visible_area.is_empty() {
        return;
    }

    f.render_widget(Clear, visible_area);
    let p = Paragraph::new(toast.message.as_str())
        .alignment(Alignment::Center)
        .style(
            Style::default()
                .fg(theme.text)
                .bg(Color::Reset)
                .add_modifier(Modifier::BOLD),
        )
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(theme.magenta)),
        );
    f.render_widget(p, visible_area);
}
