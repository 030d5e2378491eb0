use crate::app::App;
use crate::ui::utils::format_time;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Paragraph},
    Frame,
};

/// Filled cells of a `width`-wide gauge.
pub fn occupied_cells(position_secs: u64, duration_secs: u64, width: usize) -> usize {
    if duration_secs == 0 {
        return 0;
    }
    let ratio = (position_secs as f64 / duration_secs as f64).clamp(0.0, 1.0);
    (width as f64 * ratio) as usize
}

pub fn render_progress(f: &mut Frame, area: Rect, app: &mut App) {
    let theme = &app.theme;

    let Some(track) = &app.snapshot.now_playing else {
        return;
    };

    let gauge_area_rect = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(10),
            Constraint::Percentage(80),
            Constraint::Percentage(10),
        ])
        .split(area)[1];

    let width = gauge_area_rect.width as usize;
    let occupied_width = occupied_cells(track.position_secs, track.duration_secs, width);
    let fill_style = Style::default().fg(theme.magenta);
    let empty_style = Style::default().fg(theme.surface);

    let mut bar_spans: Vec<Span> = Vec::with_capacity(width);
    for i in 0..width {
        if i < occupied_width {
            if i == occupied_width.saturating_sub(1) {
                // Playhead knob
                bar_spans.push(Span::styled("●", fill_style));
            } else {
                bar_spans.push(Span::styled("━", fill_style));
            }
        } else {
            bar_spans.push(Span::styled("─", empty_style));
        }
    }

    let gauge_p = Paragraph::new(Line::from(bar_spans))
        .alignment(Alignment::Left)
        .block(Block::default().style(Style::default().bg(Color::Reset)));
    f.render_widget(gauge_p, gauge_area_rect);
}

pub fn render_time(f: &mut Frame, area: Rect, app: &mut App) {
    let theme = &app.theme;
    if let Some(track) = &app.snapshot.now_playing {
        let icon = if track.is_paused { "⏸" } else { "▶" };
        let time_str = format!(
            "{}  {} / {}",
            icon,
            format_time(track.position_secs),
            format_time(track.duration_secs)
        );
        let time_label = Paragraph::new(time_str)
            .alignment(Alignment::Center)
            .style(Style::default().fg(theme.overlay));
        f.render_widget(time_label, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_occupied_cells() {
        assert_eq!(occupied_cells(0, 100, 40), 0);
        assert_eq!(occupied_cells(50, 100, 40), 20);
        assert_eq!(occupied_cells(100, 100, 40), 40);
        // Overshoot and unknown duration stay inside the gauge.
        assert_eq!(occupied_cells(150, 100, 40), 40);
        assert_eq!(occupied_cells(50, 0, 40), 0);
    }
}
