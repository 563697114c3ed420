use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::app::App;

use super::pages::{render_not_found, render_page};
use super::styles;

/// Draw the layout chrome around whichever page the current route resolves to.
pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2), // Title bar
            Constraint::Min(3),    // Routed content
            Constraint::Length(1), // Status bar
        ])
        .split(frame.area());

    render_title_bar(frame, app, chunks[0]);
    match app.current_page() {
        Some(page) => render_page(frame, page, chunks[1]),
        None => render_not_found(frame, &app.location, chunks[1]),
    }
    render_status_bar(frame, app, chunks[2]);
}

fn render_title_bar(frame: &mut Frame, app: &App, area: Rect) {
    let page_title = app.current_page().map(|page| page.title()).unwrap_or("Not found");
    let title_line = Line::from(vec![
        Span::styled("  Trombone", styles::title_style()),
        Span::styled(format!("  {}", page_title), styles::muted_style()),
    ]);

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    frame.render_widget(Paragraph::new(title_line).block(block), area);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![
        Span::styled(" API: ", styles::muted_style()),
        Span::raw(app.api_label()),
    ];
    if let Some(ref message) = app.status_message {
        spans.push(Span::styled(format!("  {}", message), styles::muted_style()));
    }
    spans.push(Span::styled("  [r] refresh  [q] quit", styles::muted_style()));

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
