use ratatui::Frame;
use ratatui::layout::{Constraint, Flex, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::Span;
use ratatui::widgets::{Block, Borders, Clear, Row, Table};

use crate::system::tree::SortKey;
use crate::ui::theme::Theme;

/// Centered overlay listing keybinds and the available sort columns.
pub fn render(frame: &mut Frame, area: Rect, entries: &[(String, &str)], theme: &Theme) {
    let sort_line = SortKey::ALL
        .iter()
        .map(|k| k.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let width = 48u16.min(area.width.saturating_sub(4));
    // Entries, one sort line, borders.
    let height = (entries.len() as u16 + 3).min(area.height.saturating_sub(2));
    let overlay = centered_rect(width, height, area);

    frame.render_widget(Clear, overlay);

    let key_style = Style::default()
        .fg(theme.pill_key_fg)
        .bg(theme.pill_key_bg)
        .add_modifier(Modifier::BOLD);
    let mut rows: Vec<Row> = entries
        .iter()
        .map(|(key, desc)| {
            Row::new(vec![
                Span::styled(format!("{key:>10} "), key_style),
                Span::styled(format!(" {desc}"), Style::default().fg(theme.pill_desc_fg)),
            ])
        })
        .collect();
    rows.push(Row::new(vec![
        Span::styled(format!("{:>10} ", "sort"), key_style),
        Span::styled(format!(" {sort_line}"), Style::default().fg(theme.text_secondary)),
    ]));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.overlay_border))
        .title(Span::styled(
            " Keybinds ",
            Style::default()
                .fg(theme.accent)
                .add_modifier(Modifier::BOLD),
        ));
    let table = Table::new(rows, [Constraint::Length(11), Constraint::Min(10)])
        .column_spacing(0)
        .block(block)
        .style(Style::default().bg(theme.surface_bg));
    frame.render_widget(table, overlay);
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let [vert] = Layout::vertical([Constraint::Length(height)])
        .flex(Flex::Center)
        .areas(area);
    let [horiz] = Layout::horizontal([Constraint::Length(width)])
        .flex(Flex::Center)
        .areas(vert);
    horiz
}
