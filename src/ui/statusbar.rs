use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use crate::app::{InputMode, ResolvedKeybinds, key_label};
use crate::ui::theme::Theme;

pub fn render(
    frame: &mut Frame,
    area: Rect,
    input_mode: InputMode,
    filter_text: &str,
    status_message: Option<&(String, std::time::Instant)>,
    keybinds: &ResolvedKeybinds,
    theme: &Theme,
) {
    let bg_style = Style::default().bg(theme.statusbar_bg);

    // Status message takes priority
    if let Some((msg, _)) = status_message {
        let line = Line::from(Span::styled(
            format!(" {msg}"),
            Style::default()
                .fg(theme.status_ok)
                .add_modifier(Modifier::BOLD),
        ));
        frame.render_widget(Paragraph::new(line).style(bg_style), area);
        return;
    }

    let line = match input_mode {
        InputMode::Filter => {
            let mut spans = vec![
                Span::styled(
                    " filter ",
                    Style::default()
                        .fg(theme.pill_key_fg)
                        .bg(theme.pill_key_bg)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::styled(
                    format!(" {filter_text}"),
                    Style::default().fg(theme.pill_desc_fg),
                ),
                Span::styled("\u{2588}", Style::default().fg(theme.pill_key_bg)),
            ];
            if filter_text.starts_with('!') && filter_text.len() > 1 {
                spans.push(Span::styled(
                    " regex",
                    Style::default().fg(theme.text_secondary),
                ));
            }
            spans.extend(pill_spans("Esc".into(), "Cancel", theme));
            spans.extend(pill_spans("Enter".into(), "Apply", theme));
            Line::from(spans)
        }
        InputMode::Help => Line::from(pill_spans("Esc".into(), "Close help", theme)),
        InputMode::Normal => {
            let mut spans = Vec::new();
            if !filter_text.is_empty() {
                spans.push(Span::styled(
                    format!(" Filter: {filter_text} "),
                    Style::default()
                        .fg(theme.pill_key_bg)
                        .add_modifier(Modifier::BOLD),
                ));
                spans.extend(pill_spans("Esc".into(), "Clear", theme));
            }
            spans.extend(pill_spans(key_label(keybinds.quit), "Quit", theme));
            spans.extend(pill_spans(key_label(keybinds.filter), "Filter", theme));
            spans.extend(pill_spans(key_label(keybinds.cycle_sort), "Sort", theme));
            spans.extend(pill_spans(key_label(keybinds.toggle_tree), "Tree", theme));
            spans.extend(pill_spans(key_label(keybinds.collapse), "Fold", theme));
            spans.extend(pill_spans(key_label(keybinds.toggle_detail), "Detail", theme));
            spans.extend(pill_spans(key_label(keybinds.help), "Help", theme));
            Line::from(spans)
        }
    };

    frame.render_widget(Paragraph::new(line).style(bg_style), area);
}

fn pill_spans<'a>(key: String, desc: &'a str, theme: &Theme) -> Vec<Span<'a>> {
    vec![
        Span::raw(" "),
        Span::styled(
            format!(" {key} "),
            Style::default()
                .fg(theme.pill_key_fg)
                .bg(theme.pill_key_bg)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!(" {desc}"),
            Style::default().fg(theme.pill_desc_fg).bg(theme.surface_bg),
        ),
    ]
}
