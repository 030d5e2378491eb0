pub mod layout;
pub mod theme;
pub mod utils;
pub mod widgets;

pub use theme::Theme;

use crate::app::App;
use ratatui::{
    layout::Alignment,
    style::Style,
    widgets::Paragraph,
    Frame,
};

pub fn ui(f: &mut Frame, app: &mut App) {
    let area = f.area();

    // 1. Layout
    let main_layout = layout::get_main_layout(area);

    // 2. Music Card
    widgets::player::render(f, main_layout.body_area, app);

    // 3. Footer: the pending authorization link wins over key hints
    let footer = match &app.auth_url {
        Some(url) => Paragraph::new(format!("Open: {}", url)).style(Style::default().fg(app.theme.yellow)),
        None => Paragraph::new(utils::truncate(&app.keys.hints(), area.width as usize))
            .style(Style::default().fg(app.theme.overlay)),
    };
    f.render_widget(footer.alignment(Alignment::Center), main_layout.footer_area);

    // 4. Toast
    widgets::toast::render(f, app);
}
