use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    text::Line,
    widgets::Paragraph,
    Frame,
};

use super::styles;
use crate::app::Page;

pub fn render_page(frame: &mut Frame, page: Page, area: Rect) {
    match page {
        Page::Overview => render_overview(frame, area),
    }
}

/// Placeholder page: a single centered label.
fn render_overview(frame: &mut Frame, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(1),
            Constraint::Fill(1),
        ])
        .split(area);

    let text = Paragraph::new(Line::styled(Page::Overview.title(), styles::text_style()))
        .alignment(Alignment::Center);
    frame.render_widget(text, rows[1]);
}

pub fn render_not_found(frame: &mut Frame, location: &str, area: Rect) {
    let text = Paragraph::new(Line::styled(
        format!("No page at {}", location),
        styles::error_style(),
    ))
    .alignment(Alignment::Center);
    frame.render_widget(text, area);
}
