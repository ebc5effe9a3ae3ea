use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crossterm::event::KeyCode;
use serde::Deserialize;
use tracing::warn;

use crate::system::net::NetOptions;
use crate::system::tree::{SortKey, TreeOptions};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub cpu: CpuConfig,
    pub mem: MemConfig,
    pub net: NetConfig,
    #[serde(rename = "proc")]
    pub process: ProcConfig,
    pub keybinds: KeybindsConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub update_ms: u64,
    /// Width in columns that graph histories are sized for.
    pub graph_width: usize,
    /// Space separated list of boxes: cpu mem net proc.
    pub shown_boxes: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            update_ms: 2000,
            graph_width: 80,
            shown_boxes: "cpu mem net proc".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CpuConfig {
    pub show_freq: bool,
    pub check_temp: bool,
    pub show_battery: bool,
}

impl Default for CpuConfig {
    fn default() -> Self {
        CpuConfig {
            show_freq: true,
            check_temp: true,
            show_battery: true,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MemConfig {
    pub show_disks: bool,
    /// Mount points to show, or `exclude=` followed by mount points to hide.
    pub disks_filter: String,
    pub use_fstab: bool,
    pub only_physical: bool,
}

impl Default for MemConfig {
    fn default() -> Self {
        MemConfig {
            show_disks: true,
            disks_filter: String::new(),
            use_fstab: true,
            only_physical: true,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct NetConfig {
    pub iface: String,
    pub auto_scale: bool,
    pub sync: bool,
    /// Fixed ceilings in MiB/s, used when `auto_scale` is off.
    pub download_mib: u64,
    pub upload_mib: u64,
}

impl Default for NetConfig {
    fn default() -> Self {
        NetConfig {
            iface: String::new(),
            auto_scale: true,
            sync: false,
            download_mib: 100,
            upload_mib: 100,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ProcConfig {
    pub sorting: String,
    pub reversed: bool,
    pub tree: bool,
    pub aggregate: bool,
    pub per_core: bool,
    pub filter_kernel: bool,
    pub show_detail: bool,
}

impl Default for ProcConfig {
    fn default() -> Self {
        ProcConfig {
            sorting: SortKey::default().as_str().to_string(),
            reversed: false,
            tree: false,
            aggregate: false,
            per_core: false,
            filter_kernel: false,
            show_detail: true,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct KeybindsConfig {
    pub quit: String,
    pub filter: String,
    pub cycle_sort: String,
    pub reverse: String,
    pub toggle_tree: String,
    pub collapse: String,
    pub toggle_detail: String,
    pub reset_net: String,
    pub rescale_net: String,
    pub help: String,
}

impl Default for KeybindsConfig {
    fn default() -> Self {
        KeybindsConfig {
            quit: "q".to_string(),
            filter: "f".to_string(),
            cycle_sort: "s".to_string(),
            reverse: "r".to_string(),
            toggle_tree: "e".to_string(),
            collapse: "Space".to_string(),
            toggle_detail: "Enter".to_string(),
            reset_net: "z".to_string(),
            rescale_net: "y".to_string(),
            help: "?".to_string(),
        }
    }
}

/// Parse a keybind name such as `q`, `Enter`, `Space` or `F5`.
pub fn parse_key(s: &str) -> Option<KeyCode> {
    let mut chars = s.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return Some(KeyCode::Char(c));
    }
    match s.to_ascii_lowercase().as_str() {
        "enter" | "return" => Some(KeyCode::Enter),
        "esc" | "escape" => Some(KeyCode::Esc),
        "space" => Some(KeyCode::Char(' ')),
        "tab" => Some(KeyCode::Tab),
        "backspace" => Some(KeyCode::Backspace),
        "delete" | "del" => Some(KeyCode::Delete),
        "home" => Some(KeyCode::Home),
        "end" => Some(KeyCode::End),
        "pageup" => Some(KeyCode::PageUp),
        "pagedown" => Some(KeyCode::PageDown),
        lower => lower
            .strip_prefix('f')
            .and_then(|n| n.parse::<u8>().ok())
            .filter(|n| (1..=12).contains(n))
            .map(KeyCode::F),
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("pulsetop").join("config.toml"))
}

pub fn load_config() -> Config {
    match config_path() {
        Some(path) if path.exists() => load_config_from_path(&path),
        _ => Config::default(),
    }
}

pub fn load_config_from_path(path: &Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(contents) => toml::from_str(&contents).unwrap_or_else(|err| {
            warn!(path = %path.display(), %err, "invalid config, using defaults");
            Config::default()
        }),
        Err(_) => Config::default(),
    }
}

/// Which metric domains a pass samples.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoxSelection {
    pub cpu: bool,
    pub mem: bool,
    pub net: bool,
    pub proc: bool,
}

impl Default for BoxSelection {
    fn default() -> Self {
        BoxSelection::ALL
    }
}

impl BoxSelection {
    pub const ALL: BoxSelection = BoxSelection {
        cpu: true,
        mem: true,
        net: true,
        proc: true,
    };

    pub const NONE: BoxSelection = BoxSelection {
        cpu: false,
        mem: false,
        net: false,
        proc: false,
    };

    /// Unknown names are ignored.
    pub fn parse(s: &str) -> Self {
        let mut boxes = BoxSelection::NONE;
        for name in s.split_whitespace() {
            match name {
                "cpu" => boxes.cpu = true,
                "mem" => boxes.mem = true,
                "net" => boxes.net = true,
                "proc" => boxes.proc = true,
                other => warn!(name = other, "unknown box name"),
            }
        }
        boxes
    }

    pub fn is_empty(&self) -> bool {
        *self == BoxSelection::NONE
    }
}

/// Runtime settings a collection pass reads.
#[derive(Clone, Debug, PartialEq)]
pub struct CollectOptions {
    pub graph_width: usize,
    pub update_ms: u64,
    pub boxes: BoxSelection,
    pub show_freq: bool,
    pub check_temp: bool,
    pub show_battery: bool,
    pub show_disks: bool,
    pub disks_filter: String,
    pub use_fstab: bool,
    pub only_physical: bool,
    pub net: NetOptions,
    pub sort_key: SortKey,
    pub reversed: bool,
    pub tree: bool,
    pub aggregate: bool,
    pub per_core: bool,
    pub filter_kernel: bool,
    pub filter: String,
    pub show_detail: bool,
    pub detailed_pid: Option<u32>,
}

impl Default for CollectOptions {
    fn default() -> Self {
        CollectOptions::from(&Config::default())
    }
}

impl From<&Config> for CollectOptions {
    fn from(config: &Config) -> Self {
        let sort_key = config.process.sorting.parse().unwrap_or_else(|err: String| {
            warn!(%err, "falling back to default sort key");
            SortKey::default()
        });
        CollectOptions {
            graph_width: config.general.graph_width,
            update_ms: config.general.update_ms.max(100),
            boxes: BoxSelection::parse(&config.general.shown_boxes),
            show_freq: config.cpu.show_freq,
            check_temp: config.cpu.check_temp,
            show_battery: config.cpu.show_battery,
            show_disks: config.mem.show_disks,
            disks_filter: config.mem.disks_filter.clone(),
            use_fstab: config.mem.use_fstab,
            only_physical: config.mem.only_physical,
            net: NetOptions {
                iface: config.net.iface.clone(),
                auto_scale: config.net.auto_scale,
                sync: config.net.sync,
                download_ceiling: config.net.download_mib << 20,
                upload_ceiling: config.net.upload_mib << 20,
            },
            sort_key,
            reversed: config.process.reversed,
            tree: config.process.tree,
            aggregate: config.process.aggregate,
            per_core: config.process.per_core,
            filter_kernel: config.process.filter_kernel,
            filter: String::new(),
            show_detail: config.process.show_detail,
            detailed_pid: None,
        }
    }
}

impl CollectOptions {
    pub fn tree_options(&self) -> TreeOptions {
        TreeOptions {
            sort_key: self.sort_key,
            reverse: self.reversed,
            filter: self.filter.clone(),
            tree_mode: self.tree,
            aggregate_children: self.aggregate,
        }
    }
}

type PendingWrite = Box<dyn FnOnce(&mut CollectOptions) + Send>;

struct ConfigState {
    options: CollectOptions,
    locked: bool,
    pending: Vec<PendingWrite>,
}

/// Config provider shared by the foreground and the collector.
///
/// While a pass holds the lock, writes queue up and are applied in order on
/// `unlock`, so a pass never observes a half-applied change.
#[derive(Clone)]
pub struct SharedConfig {
    state: Arc<Mutex<ConfigState>>,
}

impl fmt::Debug for SharedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("SharedConfig")
            .field("options", &state.options)
            .field("locked", &state.locked)
            .field("pending", &state.pending.len())
            .finish()
    }
}

impl Default for SharedConfig {
    fn default() -> Self {
        SharedConfig::new(CollectOptions::default())
    }
}

impl SharedConfig {
    pub fn new(options: CollectOptions) -> Self {
        SharedConfig {
            state: Arc::new(Mutex::new(ConfigState {
                options,
                locked: false,
                pending: Vec::new(),
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, ConfigState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current values, including writes already applied.
    pub fn current(&self) -> CollectOptions {
        self.state().options.clone()
    }

    /// Take the lock for a pass and return the values it will use.
    pub fn lock(&self) -> CollectOptions {
        let mut state = self.state();
        state.locked = true;
        state.options.clone()
    }

    /// Release the pass lock and apply deferred writes.
    pub fn unlock(&self) {
        let mut state = self.state();
        state.locked = false;
        let pending = std::mem::take(&mut state.pending);
        for write in pending {
            write(&mut state.options);
        }
    }

    pub fn is_locked(&self) -> bool {
        self.state().locked
    }

    /// Apply `f` now, or after the running pass when locked.
    pub fn update(&self, f: impl FnOnce(&mut CollectOptions) + Send + 'static) {
        let mut state = self.state();
        if state.locked {
            state.pending.push(Box::new(f));
        } else {
            f(&mut state.options);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = Config::default();
        assert_eq!(config.general.update_ms, 2000);
        assert!(config.cpu.check_temp);
        assert!(config.mem.use_fstab);
        assert!(config.net.auto_scale);
        assert_eq!(config.process.sorting, "cpu lazy");
        assert_eq!(config.keybinds.quit, "q");
    }

    #[test]
    fn parse_partial_toml() {
        let toml_str = r#"
[general]
update_ms = 500
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.update_ms, 500);
        assert_eq!(config.general.graph_width, 80);
        assert!(!config.process.tree);
    }

    #[test]
    fn parse_full_toml() {
        let toml_str = r#"
[general]
update_ms = 1000
shown_boxes = "cpu proc"

[mem]
disks_filter = "exclude=/boot"
only_physical = false

[net]
iface = "eth0"
auto_scale = false
download_mib = 10

[proc]
sorting = "memory"
tree = true
aggregate = true

[keybinds]
quit = "x"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        let opts = CollectOptions::from(&config);
        assert_eq!(opts.update_ms, 1000);
        assert_eq!(
            opts.boxes,
            BoxSelection {
                cpu: true,
                mem: false,
                net: false,
                proc: true
            }
        );
        assert_eq!(opts.disks_filter, "exclude=/boot");
        assert!(!opts.only_physical);
        assert_eq!(opts.net.iface, "eth0");
        assert!(!opts.net.auto_scale);
        assert_eq!(opts.net.download_ceiling, 10 << 20);
        assert_eq!(opts.sort_key, SortKey::Memory);
        assert!(opts.tree && opts.aggregate);
        assert_eq!(config.keybinds.quit, "x");
    }

    #[test]
    fn unknown_sort_key_falls_back() {
        let config: Config = toml::from_str("[proc]\nsorting = \"bogus\"\n").unwrap();
        assert_eq!(CollectOptions::from(&config).sort_key, SortKey::CpuLazy);
    }

    #[test]
    fn missing_file_returns_default() {
        let config = load_config_from_path(Path::new("/nonexistent/path/config.toml"));
        assert_eq!(config.general.update_ms, 2000);
    }

    #[test]
    fn keys() {
        assert_eq!(parse_key("q"), Some(KeyCode::Char('q')));
        assert_eq!(parse_key("Enter"), Some(KeyCode::Enter));
        assert_eq!(parse_key("space"), Some(KeyCode::Char(' ')));
        assert_eq!(parse_key("F5"), Some(KeyCode::F(5)));
        assert_eq!(parse_key("F13"), None);
        assert_eq!(parse_key("nonsense"), None);
    }

    #[test]
    fn writes_are_deferred_while_locked() {
        let shared = SharedConfig::default();
        let seen = shared.lock();
        shared.update(|o| o.filter = "bash".into());
        shared.update(|o| o.reversed = true);
        assert!(shared.is_locked());
        assert_eq!(shared.current(), seen);

        shared.unlock();
        let now = shared.current();
        assert_eq!(now.filter, "bash");
        assert!(now.reversed);
    }

    #[test]
    fn writes_apply_immediately_when_unlocked() {
        let shared = SharedConfig::default();
        shared.update(|o| o.tree = true);
        assert!(shared.current().tree);
    }
}
