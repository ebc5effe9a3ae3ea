use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Gauge, Paragraph, Sparkline};

use crate::format::{format_bytes, format_rate};
use crate::system::snapshot::{MemField, NetDirection, Snapshots};
use crate::ui::theme::Theme;

pub fn render(frame: &mut Frame, area: Rect, snapshots: &Snapshots, theme: &Theme) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(35),
            Constraint::Percentage(30),
            Constraint::Percentage(35),
        ])
        .split(area);

    render_cpu(frame, chunks[0], snapshots, theme);
    render_mem(frame, chunks[1], snapshots, theme);
    render_net(frame, chunks[2], snapshots, theme);
}

fn block<'a>(title: String, theme: &Theme) -> Block<'a> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(theme.overlay_border))
        .title(Span::styled(
            title,
            Style::default()
                .fg(theme.text_secondary)
                .add_modifier(Modifier::BOLD),
        ))
}

fn render_cpu(frame: &mut Frame, area: Rect, snapshots: &Snapshots, theme: &Theme) {
    let cpu = &snapshots.cpu;
    let mut title = format!(" CPU {}% ", cpu.latest_total());
    if let Some(freq) = &cpu.frequency {
        title.push_str(&format!("{freq} "));
    }
    if let Some(temp) = &cpu.temperature
        && let Some(package) = temp.package.back()
    {
        title.push_str(&format!("{package}\u{b0}C "));
    }
    if let Some(battery) = &cpu.battery {
        title.push_str(&format!("BAT {}% ", battery.percent));
    }

    let block = block(title, theme);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let rows = Layout::vertical([Constraint::Length(1), Constraint::Min(0)]).split(inner);
    let [l1, l5, l15] = cpu.load_avg;
    let load = Line::from(vec![
        Span::styled("load ", Style::default().fg(theme.text_secondary)),
        Span::styled(
            format!("{l1:.2} {l5:.2} {l15:.2}"),
            Style::default().fg(theme.text_primary),
        ),
        Span::styled(
            format!("  cores {}", cpu.core_count()),
            Style::default().fg(theme.text_secondary),
        ),
    ]);
    frame.render_widget(Paragraph::new(load), rows[0]);

    let data: Vec<u64> = cpu.total.iter().copied().collect();
    let sparkline = Sparkline::default()
        .data(&data)
        .max(100)
        .style(Style::default().fg(theme.heat(cpu.latest_total() as f64)));
    frame.render_widget(sparkline, rows[1]);
}

fn render_mem(frame: &mut Frame, area: Rect, snapshots: &Snapshots, theme: &Theme) {
    let mem = &snapshots.mem;
    let block = block(" MEM ".to_string(), theme);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let rows = Layout::vertical([Constraint::Length(1), Constraint::Min(0)]).split(inner);
    let used = mem.latest_percent(MemField::Used);
    let gauge = Gauge::default()
        .gauge_style(
            Style::default()
                .fg(theme.gauge_filled)
                .bg(theme.gauge_unfilled),
        )
        .percent(used.min(100) as u16)
        .label(format!(
            "{}/{} ({used}%)",
            format_bytes(mem.used),
            format_bytes(mem.total)
        ));
    frame.render_widget(gauge, rows[0]);

    let mut lines = vec![Line::from(Span::styled(
        format!(
            "swap {}/{}",
            format_bytes(mem.swap_used),
            format_bytes(mem.swap_total)
        ),
        Style::default().fg(theme.text_secondary),
    ))];
    for mount in &mem.disks_order {
        let Some(disk) = mem.disks.get(mount) else {
            continue;
        };
        lines.push(Line::from(vec![
            Span::styled(
                format!("{:<8} ", disk.name),
                Style::default().fg(theme.text_primary),
            ),
            Span::styled(
                format!("{:>3}% ", disk.used_percent),
                Style::default().fg(theme.heat(disk.used_percent as f64)),
            ),
            Span::styled(
                format!("{} free", format_bytes(disk.free)),
                Style::default().fg(theme.text_secondary),
            ),
        ]));
    }
    frame.render_widget(Paragraph::new(lines), rows[1]);
}

fn render_net(frame: &mut Frame, area: Rect, snapshots: &Snapshots, theme: &Theme) {
    let net = &snapshots.net;
    let title = if net.interface.is_empty() {
        " NET ".to_string()
    } else {
        format!(" NET {} ", net.interface)
    };
    let block = block(title, theme);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let direction = |arrow: &str, dir: &NetDirection, color: Color| {
        Line::from(vec![
            Span::styled(format!("{arrow} "), Style::default().fg(color)),
            Span::styled(
                format!("{:>12}", format_rate(dir.stat.speed)),
                Style::default().fg(theme.text_primary),
            ),
            Span::styled(
                format!(
                    "  top {}  total {}",
                    format_rate(dir.stat.top),
                    format_bytes(dir.stat.total)
                ),
                Style::default().fg(theme.text_secondary),
            ),
        ])
    };
    let mut lines = vec![
        direction("\u{25bc}", &net.download, theme.download),
        direction("\u{25b2}", &net.upload, theme.upload),
    ];
    if let Some(address) = &net.address {
        lines.push(Line::from(Span::styled(
            address.clone(),
            Style::default().fg(theme.text_secondary),
        )));
    }
    frame.render_widget(Paragraph::new(lines), inner);
}
