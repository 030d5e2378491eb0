use crate::app::App;
use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Paragraph},
    Frame,
};

pub fn render(f: &mut Frame, area: Rect, app: &mut App) {
    if area.height < 1 || area.width < 1 {
        return;
    }

    // Terminal cells are about twice as tall as wide, so a square cover
    // is `2 * rows` columns across.
    let rows = area.height as u32;
    let cols = (rows * 2).min(area.width as u32);

    if let Some(art) = app.art_lines(cols) {
        let lines: Vec<Line> = art
            .iter()
            .map(|(chars, colors)| {
                let spans: Vec<Span> = chars
                    .chars()
                    .zip(colors)
                    .map(|(ch, &(tr, tg, tb, br, bg, bb))| {
                        Span::styled(
                            ch.to_string(),
                            Style::default()
                                .fg(Color::Rgb(tr, tg, tb))
                                .bg(Color::Rgb(br, bg, bb)),
                        )
                    })
                    .collect();
                Line::from(spans)
            })
            .collect();

        let p = Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(Block::default().style(Style::default().bg(Color::Reset)));
        f.render_widget(p, area);
        return;
    }

    let pad = "\n".repeat((area.height / 2).saturating_sub(1) as usize);
    let text = match app.snapshot.now_playing {
        Some(_) => format!("{}♪\nLoading art…", pad),
        None => format!("{}♪\nNothing playing", pad),
    };
    let p = Paragraph::new(text)
        .alignment(Alignment::Center)
        .block(Block::default().style(Style::default().fg(app.theme.overlay).bg(Color::Reset)));
    f.render_widget(p, area);
}
