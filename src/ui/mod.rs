pub mod detail_panel;
pub mod header;
pub mod help;
pub mod process_table;
pub mod statusbar;
pub mod theme;

use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout};

use crate::app::App;
use crate::ui::process_table::TableHeader;
use crate::ui::theme::Theme;

pub fn draw(frame: &mut Frame, app: &App, theme: &Theme) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(7),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(frame.area());

    let snapshots = &app.snapshots;
    header::render(frame, chunks[0], snapshots, theme);

    let table_header = TableHeader {
        sort_key: app.options.sort_key,
        reversed: app.options.reversed,
        tree: app.options.tree,
        filter: app.filter_text.clone(),
        shown: snapshots.processes.len(),
        total: snapshots.process_count,
    };
    let content_area = chunks[1];
    match &snapshots.detail {
        Some(detail) if app.options.detailed_pid.is_some() => {
            let h_chunks = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Min(20), Constraint::Length(40)])
                .split(content_area);
            process_table::render(
                frame,
                h_chunks[0],
                &snapshots.processes,
                app.selected,
                &table_header,
                theme,
            );
            detail_panel::render(frame, h_chunks[1], detail, theme);
        }
        _ => process_table::render(
            frame,
            content_area,
            &snapshots.processes,
            app.selected,
            &table_header,
            theme,
        ),
    }

    statusbar::render(
        frame,
        chunks[2],
        app.input_mode,
        &app.filter_text,
        app.status_message.as_ref(),
        &app.keybinds,
        theme,
    );

    // Help overlay last, on top
    if app.show_help() {
        help::render(frame, frame.area(), &app.help_entries(), theme);
    }
}
