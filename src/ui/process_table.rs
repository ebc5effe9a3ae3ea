use ratatui::Frame;
use ratatui::layout::{Constraint, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Cell, Row, Table, TableState};

use crate::format::{format_bytes, truncate_unicode};
use crate::system::process::ProcessRecord;
use crate::system::tree::SortKey;
use crate::ui::theme::Theme;

/// What the process box shows in its title.
pub struct TableHeader {
    pub sort_key: SortKey,
    pub reversed: bool,
    pub tree: bool,
    pub filter: String,
    pub shown: usize,
    pub total: usize,
}

/// Tree prefix for one row: indentation, then the branch marker.
pub fn tree_prefix(record: &ProcessRecord) -> String {
    if record.depth == 0 && !record.has_children {
        return String::new();
    }
    let mut prefix = "  ".repeat(record.depth.saturating_sub(1));
    if record.depth > 0 {
        prefix.push_str(if record.is_last_sibling {
            "\u{2514}\u{2500}"
        } else {
            "\u{251c}\u{2500}"
        });
    }
    if record.has_children {
        prefix.push_str(if record.collapsed { "[+]" } else { "[-]" });
    }
    prefix
}

pub fn render(
    frame: &mut Frame,
    area: Rect,
    processes: &[ProcessRecord],
    selected: usize,
    header: &TableHeader,
    theme: &Theme,
) {
    let direction = if header.reversed { "\u{2191}" } else { "\u{2193}" };
    let mut title = format!(" {} {direction}", header.sort_key);
    if header.tree {
        title.push_str(" tree");
    }
    if !header.filter.is_empty() {
        title.push_str(&format!(" filter:{}", header.filter));
    }
    title.push_str(&format!(" {}/{} ", header.shown, header.total));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(theme.overlay_border))
        .title(Span::styled(
            title,
            Style::default()
                .fg(theme.text_secondary)
                .add_modifier(Modifier::BOLD),
        ));

    let name_width = usize::from(area.width).saturating_sub(48).max(8);
    let rows = processes.iter().map(|p| {
        let name = truncate_unicode(&format!("{}{}", tree_prefix(p), p.name), name_width);
        Row::new(vec![
            Cell::from(format!("{:>7}", p.pid)),
            Cell::from(name),
            Cell::from(truncate_unicode(&p.user, 10)),
            Cell::from(format!("{:>4}", p.threads)),
            Cell::from(format!("{:>10}", format_bytes(p.memory))),
            Cell::from(Line::from(Span::styled(
                format!("{:>6.1}", p.cpu_percent),
                Style::default().fg(theme.heat(p.cpu_percent)),
            ))),
        ])
    });

    let widths = [
        Constraint::Length(7),
        Constraint::Min(8),
        Constraint::Length(10),
        Constraint::Length(4),
        Constraint::Length(10),
        Constraint::Length(6),
    ];
    let table = Table::new(rows, widths)
        .header(
            Row::new(vec!["    Pid", "Program", "User", "Thr", "    Memory", " Cpu%"])
                .style(Style::default().fg(theme.text_secondary).add_modifier(Modifier::BOLD)),
        )
        .block(block)
        .row_highlight_style(Style::default().bg(theme.selection_bg));

    let mut state = TableState::default().with_selected((!processes.is_empty()).then_some(selected));
    frame.render_stateful_widget(table, area, &mut state);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes() {
        let mut root = ProcessRecord::new(1, 0, "init");
        assert_eq!(tree_prefix(&root), "");
        root.has_children = true;
        assert_eq!(tree_prefix(&root), "[-]");
        root.collapsed = true;
        assert_eq!(tree_prefix(&root), "[+]");

        let mut child = ProcessRecord::new(2, 1, "sh");
        child.depth = 2;
        assert_eq!(tree_prefix(&child), "  \u{251c}\u{2500}");
        child.is_last_sibling = true;
        assert_eq!(tree_prefix(&child), "  \u{2514}\u{2500}");
    }
}
