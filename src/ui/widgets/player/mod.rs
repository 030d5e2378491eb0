use crate::app::App;
use crate::ui::layout;
use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders},
    Frame,
};

pub mod art;
pub mod info;
pub mod progress;

pub fn render(f: &mut Frame, area: Rect, app: &mut App) {
    let theme = &app.theme;

    // --- MUSIC CARD ---
    let title = Line::from(vec![Span::styled(
        " Now Playing ",
        Style::default().fg(theme.blue).add_modifier(Modifier::BOLD),
    )]);

    let music_block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .title(title)
        .title_alignment(Alignment::Left)
        .border_style(Style::default().fg(theme.blue))
        .style(Style::default().bg(Color::Reset));

    let inner = music_block.inner(area);
    f.render_widget(music_block, area);

    let card = layout::get_card_layout(inner);
    art::render(f, card.art, app);
    info::render(f, card.info, app);
    progress::render_progress(f, card.gauge, app);
    progress::render_time(f, card.time, app);
}
