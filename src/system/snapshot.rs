use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;

use serde::Serialize;

use super::counter::{Counter, NetStat};
use super::detail::DetailView;
use super::platform::{BatteryStatus, Capabilities};
use super::process::ProcessRecord;

/// Time buckets of a `/proc/stat` cpu line, in kernel order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CpuField {
    User,
    Nice,
    System,
    Idle,
    Iowait,
    Irq,
    Softirq,
    Steal,
    Guest,
    GuestNice,
}

impl CpuField {
    pub const ALL: [CpuField; 10] = [
        CpuField::User,
        CpuField::Nice,
        CpuField::System,
        CpuField::Idle,
        CpuField::Iowait,
        CpuField::Irq,
        CpuField::Softirq,
        CpuField::Steal,
        CpuField::Guest,
        CpuField::GuestNice,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct TemperatureSnapshot {
    pub package: VecDeque<u64>,
    pub cores: Vec<VecDeque<u64>>,
    pub critical: u64,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct CpuSnapshot {
    pub total: VecDeque<u64>,
    /// Only fields the kernel reports are present.
    pub fields: BTreeMap<CpuField, VecDeque<u64>>,
    pub cores: Vec<VecDeque<u64>>,
    pub load_avg: [f64; 3],
    pub temperature: Option<TemperatureSnapshot>,
    pub frequency: Option<String>,
    pub battery: Option<BatteryStatus>,
}

impl CpuSnapshot {
    pub fn latest_total(&self) -> u64 {
        self.total.back().copied().unwrap_or(0)
    }

    pub fn latest_core(&self, core: usize) -> Option<u64> {
        self.cores.get(core)?.back().copied()
    }

    pub fn core_count(&self) -> usize {
        self.cores.len()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MemField {
    Used,
    Available,
    Cached,
    Free,
    SwapUsed,
    SwapFree,
}

impl MemField {
    pub const ALL: [MemField; 6] = [
        MemField::Used,
        MemField::Available,
        MemField::Cached,
        MemField::Free,
        MemField::SwapUsed,
        MemField::SwapFree,
    ];
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct DiskInfo {
    pub device: PathBuf,
    pub name: String,
    pub fstype: String,
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub used_percent: u64,
    pub free_percent: u64,
    /// Bytes per second.
    pub io_read: VecDeque<u64>,
    pub io_write: VecDeque<u64>,
    /// Percent of the interval the device was busy.
    pub io_activity: VecDeque<u64>,
    #[serde(skip)]
    pub(crate) read_counter: Counter,
    #[serde(skip)]
    pub(crate) write_counter: Counter,
    #[serde(skip)]
    pub(crate) ticks_counter: Counter,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct MemSnapshot {
    pub total: u64,
    pub used: u64,
    pub available: u64,
    pub cached: u64,
    pub free: u64,
    pub swap_total: u64,
    pub swap_used: u64,
    pub swap_free: u64,
    pub percent: BTreeMap<MemField, VecDeque<u64>>,
    pub disks: BTreeMap<String, DiskInfo>,
    /// Mount points in display order, root first.
    pub disks_order: Vec<String>,
}

impl MemSnapshot {
    pub fn latest_percent(&self, field: MemField) -> u64 {
        self.percent
            .get(&field)
            .and_then(|h| h.back().copied())
            .unwrap_or(0)
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct NetDirection {
    pub stat: NetStat,
    /// Bytes per second, newest at the back.
    pub bandwidth: VecDeque<u64>,
    /// Current graph ceiling in bytes per second.
    pub graph_max: u64,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct NetSnapshot {
    pub interface: String,
    pub interfaces: Vec<String>,
    pub address: Option<String>,
    pub connected: bool,
    pub download: NetDirection,
    pub upload: NetDirection,
}

/// Everything published by one pass.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Snapshots {
    pub version: u64,
    pub capabilities: Capabilities,
    pub cpu: CpuSnapshot,
    pub mem: MemSnapshot,
    pub net: NetSnapshot,
    /// Ordered process view.
    pub processes: Vec<ProcessRecord>,
    /// Processes sampled, before filtering and collapsing.
    pub process_count: usize,
    pub detail: Option<DetailView>,
}
