use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Paragraph, Sparkline};

use crate::format::truncate_unicode;
use crate::system::detail::DetailView;
use crate::ui::theme::Theme;

pub fn render(frame: &mut Frame, area: Rect, detail: &DetailView, theme: &Theme) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(theme.overlay_border))
        .title(Span::styled(
            format!(" {} ({}) ", detail.entry.name, detail.pid),
            Style::default()
                .fg(theme.text_primary)
                .add_modifier(Modifier::BOLD),
        ));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let rows = Layout::vertical([Constraint::Length(8), Constraint::Min(0)]).split(inner);
    let width = usize::from(inner.width).saturating_sub(11);
    let command = if detail.entry.command.is_empty() {
        "(none)".to_string()
    } else {
        truncate_unicode(&detail.entry.command, width)
    };

    let lines = vec![
        detail_line("Status", detail.status.clone(), theme),
        detail_line("Elapsed", detail.elapsed.clone(), theme),
        detail_line("Parent", detail.parent.clone(), theme),
        detail_line("User", detail.entry.user.clone(), theme),
        detail_line("Memory", detail.memory.clone(), theme),
        detail_line(
            "IO r/w",
            format!("{} / {}", detail.io_read, detail.io_write),
            theme,
        ),
        detail_line("Threads", detail.entry.threads.to_string(), theme),
        detail_line("Cmd", command, theme),
    ];
    frame.render_widget(Paragraph::new(lines), rows[0]);

    let data: Vec<u64> = detail.cpu_percent.iter().copied().collect();
    let sparkline = Sparkline::default()
        .data(&data)
        .max(100)
        .style(Style::default().fg(theme.heat(detail.entry.cpu_percent)));
    frame.render_widget(sparkline, rows[1]);
}

fn detail_line(label: &str, value: String, theme: &Theme) -> Line<'static> {
    Line::from(vec![
        Span::styled(
            format!(" {label:<9}"),
            Style::default()
                .fg(theme.pill_key_bg)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(value),
    ])
}
