use std::sync::Arc;
use std::time::Instant;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::action::{Action, Direction};
use crate::config::{CollectOptions, KeybindsConfig, SharedConfig, parse_key};
use crate::system::engine::UserRequest;
use crate::system::process::ProcessRecord;
use crate::system::snapshot::Snapshots;

const PAGE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Filter,
    Help,
}

#[derive(Debug, Clone)]
pub struct ResolvedKeybinds {
    pub quit: KeyCode,
    pub filter: KeyCode,
    pub cycle_sort: KeyCode,
    pub reverse: KeyCode,
    pub toggle_tree: KeyCode,
    pub collapse: KeyCode,
    pub toggle_detail: KeyCode,
    pub reset_net: KeyCode,
    pub rescale_net: KeyCode,
    pub help: KeyCode,
}

impl ResolvedKeybinds {
    pub fn from_config(kb: &KeybindsConfig) -> Self {
        Self {
            quit: parse_key(&kb.quit).unwrap_or(KeyCode::Char('q')),
            filter: parse_key(&kb.filter).unwrap_or(KeyCode::Char('f')),
            cycle_sort: parse_key(&kb.cycle_sort).unwrap_or(KeyCode::Char('s')),
            reverse: parse_key(&kb.reverse).unwrap_or(KeyCode::Char('r')),
            toggle_tree: parse_key(&kb.toggle_tree).unwrap_or(KeyCode::Char('e')),
            collapse: parse_key(&kb.collapse).unwrap_or(KeyCode::Char(' ')),
            toggle_detail: parse_key(&kb.toggle_detail).unwrap_or(KeyCode::Enter),
            reset_net: parse_key(&kb.reset_net).unwrap_or(KeyCode::Char('z')),
            rescale_net: parse_key(&kb.rescale_net).unwrap_or(KeyCode::Char('y')),
            help: parse_key(&kb.help).unwrap_or(KeyCode::Char('?')),
        }
    }

    /// Returns (key_label, description) pairs for all configurable keybinds.
    pub fn help_entries(&self) -> Vec<(String, &'static str)> {
        let mut entries = vec![
            (key_label(self.quit), "Quit"),
            (key_label(self.filter), "Filter processes"),
            (key_label(self.cycle_sort), "Next sort column"),
            (key_label(self.reverse), "Reverse sort"),
            (key_label(self.toggle_tree), "Toggle tree view"),
            (key_label(self.collapse), "Collapse / expand"),
            (key_label(self.toggle_detail), "Toggle detail"),
            (key_label(self.reset_net), "Reset net totals"),
            (key_label(self.rescale_net), "Rescale net graph"),
            (key_label(self.help), "Toggle help"),
        ];
        entries.push(("\u{2191}\u{2193} PgUp PgDn".to_string(), "Move selection"));
        entries.push(("Ctrl+C".to_string(), "Quit (always)"));
        entries
    }
}

pub fn key_label(code: KeyCode) -> String {
    match code {
        KeyCode::Char(' ') => "Space".to_string(),
        KeyCode::Char(c) => c.to_string(),
        KeyCode::Enter => "Enter".to_string(),
        KeyCode::Esc => "Esc".to_string(),
        KeyCode::Tab => "Tab".to_string(),
        KeyCode::F(n) => format!("F{n}"),
        other => format!("{other:?}"),
    }
}

/// Foreground state. Holds the latest published snapshots and turns key
/// presses into config writes and collector requests.
pub struct App {
    pub running: bool,
    pub input_mode: InputMode,
    pub filter_text: String,
    pub selected: usize,
    pub snapshots: Arc<Snapshots>,
    /// Local view of the values written to the shared config.
    pub options: CollectOptions,
    pub status_message: Option<(String, Instant)>,
    pub keybinds: ResolvedKeybinds,
    config: SharedConfig,
    requests: Vec<UserRequest>,
    rebuild: bool,
}

impl App {
    pub fn new(keybinds: &KeybindsConfig, config: SharedConfig) -> Self {
        let options = config.current();
        App {
            running: true,
            input_mode: InputMode::Normal,
            filter_text: options.filter.clone(),
            selected: 0,
            snapshots: Arc::new(Snapshots::default()),
            options,
            status_message: None,
            keybinds: ResolvedKeybinds::from_config(keybinds),
            config,
            requests: Vec::new(),
            rebuild: false,
        }
    }

    pub fn set_snapshots(&mut self, snapshots: Arc<Snapshots>) {
        let selected_pid = self.selected_pid();
        self.snapshots = snapshots;
        // Follow the selected process when the view reorders.
        if let Some(pid) = selected_pid
            && let Some(pos) = self.snapshots.processes.iter().position(|p| p.pid == pid)
        {
            self.selected = pos;
        }
        self.clamp_selection();

        if let Some((_, created)) = &self.status_message
            && created.elapsed().as_secs() >= 3
        {
            self.status_message = None;
        }
    }

    pub fn selected_process(&self) -> Option<&ProcessRecord> {
        self.snapshots.processes.get(self.selected)
    }

    pub fn selected_pid(&self) -> Option<u32> {
        self.selected_process().map(|p| p.pid)
    }

    pub fn show_help(&self) -> bool {
        self.input_mode == InputMode::Help
    }

    pub fn help_entries(&self) -> Vec<(String, &'static str)> {
        self.keybinds.help_entries()
    }

    /// Requests for the collector queued since the last call.
    pub fn take_requests(&mut self) -> Vec<UserRequest> {
        std::mem::take(&mut self.requests)
    }

    /// Whether the process view must be rebuilt without sampling.
    pub fn take_rebuild(&mut self) -> bool {
        std::mem::replace(&mut self.rebuild, false)
    }

    pub fn on_resize(&mut self, width: u16) {
        let width = usize::from(width).max(1);
        if width != self.options.graph_width {
            self.write(move |o| o.graph_width = width);
        }
        self.rebuild = true;
    }

    pub fn map_key(&self, key: KeyEvent) -> Action {
        // Ctrl+C always quits (hardwired safety)
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return Action::Quit;
        }

        match self.input_mode {
            InputMode::Normal => self.map_key_normal(key),
            InputMode::Filter => self.map_key_filter(key),
            InputMode::Help => self.map_key_help(key),
        }
    }

    fn map_key_normal(&self, key: KeyEvent) -> Action {
        let code = key.code;
        let kb = &self.keybinds;

        // Movement keys are hardwired (not configurable)
        match code {
            KeyCode::Up => return Action::Navigate(Direction::Up),
            KeyCode::Down => return Action::Navigate(Direction::Down),
            KeyCode::PageUp => return Action::Navigate(Direction::PageUp),
            KeyCode::PageDown => return Action::Navigate(Direction::PageDown),
            KeyCode::Home => return Action::Navigate(Direction::Top),
            KeyCode::End => return Action::Navigate(Direction::Bottom),
            KeyCode::Esc if !self.filter_text.is_empty() => return Action::ClearFilter,
            _ => {}
        }

        if code == kb.quit {
            return Action::Quit;
        }
        if code == kb.filter {
            return Action::EnterFilterMode;
        }
        if code == kb.cycle_sort {
            return Action::CycleSort;
        }
        if code == kb.reverse {
            return Action::ReverseSort;
        }
        if code == kb.toggle_tree {
            return Action::ToggleTree;
        }
        if code == kb.collapse {
            return match self.selected_pid() {
                Some(pid) if self.options.tree => Action::ToggleCollapse(pid),
                _ => Action::None,
            };
        }
        if code == kb.toggle_detail {
            return Action::ToggleDetail;
        }
        if code == kb.reset_net {
            return Action::ResetNetTotals;
        }
        if code == kb.rescale_net {
            return Action::RescaleNet;
        }
        if code == kb.help {
            return Action::ToggleHelp;
        }

        Action::None
    }

    fn map_key_help(&self, key: KeyEvent) -> Action {
        let code = key.code;
        // In help mode, only the help key and Esc dismiss, everything else is ignored
        if code == self.keybinds.help || code == KeyCode::Esc {
            return Action::ToggleHelp;
        }
        Action::None
    }

    fn map_key_filter(&self, key: KeyEvent) -> Action {
        match key.code {
            KeyCode::Esc => Action::ClearFilter,
            KeyCode::Enter => Action::ExitFilterMode,
            KeyCode::Backspace => {
                let mut text = self.filter_text.clone();
                text.pop();
                Action::UpdateFilter(text)
            }
            KeyCode::Char(c) => {
                let mut text = self.filter_text.clone();
                text.push(c);
                Action::UpdateFilter(text)
            }
            _ => Action::None,
        }
    }

    pub fn dispatch(&mut self, action: Action) {
        match action {
            Action::Quit => self.running = false,
            Action::Navigate(dir) => self.navigate(dir),
            Action::EnterFilterMode => {
                self.input_mode = InputMode::Filter;
            }
            Action::ExitFilterMode => {
                self.input_mode = InputMode::Normal;
            }
            Action::ClearFilter => {
                self.input_mode = InputMode::Normal;
                self.set_filter(String::new());
            }
            Action::UpdateFilter(text) => self.set_filter(text),
            Action::CycleSort => {
                let key = self.options.sort_key.next();
                self.write(move |o| o.sort_key = key);
                self.set_status(format!("Sorting by {key}"));
            }
            Action::ReverseSort => {
                let reversed = !self.options.reversed;
                self.write(move |o| o.reversed = reversed);
            }
            Action::ToggleTree => {
                let tree = !self.options.tree;
                self.write(move |o| o.tree = tree);
            }
            Action::ToggleCollapse(pid) => {
                self.requests.push(UserRequest::ToggleCollapse(pid));
                self.rebuild = true;
            }
            Action::ToggleDetail => {
                let pid = match self.options.detailed_pid {
                    Some(_) => None,
                    None => self.selected_pid(),
                };
                self.write(move |o| o.detailed_pid = pid);
            }
            Action::ResetNetTotals => {
                self.requests.push(UserRequest::ResetNetTotals);
                self.rebuild = true;
            }
            Action::RescaleNet => {
                self.requests.push(UserRequest::Rescale);
                self.set_status("Network graph will rescale".to_string());
            }
            Action::ToggleHelp => {
                self.input_mode = if self.input_mode == InputMode::Help {
                    InputMode::Normal
                } else {
                    InputMode::Help
                };
            }
            Action::None => {}
        }
    }

    fn set_filter(&mut self, text: String) {
        self.filter_text = text.clone();
        self.selected = 0;
        self.write(move |o| o.filter = text.clone());
    }

    fn set_status(&mut self, message: String) {
        self.status_message = Some((message, Instant::now()));
    }

    /// Apply a change locally and queue it on the shared config. The
    /// collector sees it on the next pass it triggers.
    fn write(&mut self, change: impl Fn(&mut CollectOptions) + Send + 'static) {
        change(&mut self.options);
        self.config.update(move |o| change(o));
        self.rebuild = true;
    }

    fn navigate(&mut self, direction: Direction) {
        let len = self.snapshots.processes.len();
        if len == 0 {
            self.selected = 0;
            return;
        }
        self.selected = match direction {
            Direction::Up => self.selected.saturating_sub(1),
            Direction::Down => self.selected + 1,
            Direction::PageUp => self.selected.saturating_sub(PAGE),
            Direction::PageDown => self.selected + PAGE,
            Direction::Top => 0,
            Direction::Bottom => len - 1,
        };
        self.clamp_selection();
    }

    fn clamp_selection(&mut self) {
        let len = self.snapshots.processes.len();
        if self.selected >= len {
            self.selected = len.saturating_sub(1);
        }
    }
}
