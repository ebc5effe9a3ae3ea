//! OS boundary. Everything that touches `/proc`, `/sys`, syscalls or a
//! platform library lives below this module; the engine only sees the raw
//! sample types defined here.

use std::path::PathBuf;

use color_eyre::Result;
use serde::Serialize;

pub mod fs;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(not(target_os = "linux"))]
mod portable;

#[cfg(target_os = "linux")]
pub use linux::LinuxSampler;
#[cfg(not(target_os = "linux"))]
pub use portable::PortableSampler;

/// Optional signals a backend can provide.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub sensors: bool,
    pub core_temps: bool,
    pub battery: bool,
    pub cpu_freq: bool,
}

/// Which optional cpu signals the caller wants this pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CpuSignals {
    pub frequency: bool,
    pub temperature: bool,
    pub battery: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawTemperature {
    pub package: f64,
    /// One reading per core, in core order. May be shorter than the core list.
    pub cores: Vec<f64>,
    pub critical: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BatteryStatus {
    pub percent: u8,
    pub state: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawCpu {
    /// Aggregate tick fields in kernel order (user, nice, system, idle,
    /// iowait, irq, softirq, steal, guest, guest_nice).
    pub total: Vec<u64>,
    /// Per-core tick fields, indexed by core number. `None` for a core that
    /// did not report this sample (offline).
    pub cores: Vec<Option<Vec<u64>>>,
    pub load_avg: [f64; 3],
    pub frequency_mhz: Option<f64>,
    pub temperature: Option<RawTemperature>,
    pub battery: Option<BatteryStatus>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DiskIo {
    pub read_bytes: u64,
    pub write_bytes: u64,
    /// Milliseconds the device spent doing I/O.
    pub io_ticks_ms: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawDisk {
    pub mountpoint: String,
    pub device: PathBuf,
    pub fstype: String,
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub io: Option<DiskIo>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawMemory {
    pub total: u64,
    pub free: u64,
    /// `None` on kernels without `MemAvailable`.
    pub available: Option<u64>,
    pub cached: u64,
    pub swap_total: u64,
    pub swap_free: u64,
    pub disks: Vec<RawDisk>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawInterface {
    pub name: String,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub connected: bool,
    pub address: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawProcess {
    pub pid: u32,
    pub ppid: u32,
    pub name: String,
    pub command: String,
    pub user: String,
    pub state: char,
    pub nice: i64,
    pub threads: u64,
    /// utime + stime in clock ticks.
    pub cpu_ticks: u64,
    /// Process start time in clock ticks after boot.
    pub start_ticks: u64,
    pub memory: u64,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawProcessTable {
    pub processes: Vec<RawProcess>,
    /// Sum of all cpu ticks across the machine at sample time.
    pub cpu_total_ticks: u64,
    pub uptime_secs: f64,
    pub clk_tck: u64,
    pub total_memory: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProcessIo {
    pub read_bytes: u64,
    pub write_bytes: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProcessQuery {
    /// Skip kthreadd and its children.
    pub filter_kernel: bool,
}

/// Mount point selection for the disk list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DiskSelection {
    /// Mount points to include (or exclude, see `exclude`). Empty accepts all.
    pub mounts: Vec<String>,
    pub exclude: bool,
    pub use_fstab: bool,
    pub only_physical: bool,
}

impl DiskSelection {
    /// Parses a space separated mount list with an optional `exclude=` prefix.
    pub fn parse(filter: &str, use_fstab: bool, only_physical: bool) -> Self {
        let filter = filter.trim();
        let (exclude, rest) = match filter.strip_prefix("exclude=") {
            Some(rest) => (true, rest),
            None => (false, filter),
        };
        DiskSelection {
            mounts: rest.split_whitespace().map(str::to_string).collect(),
            exclude,
            use_fstab,
            only_physical,
        }
    }

    /// Whether `mountpoint` passes the include/exclude list.
    pub fn accepts(&self, mountpoint: &str) -> bool {
        if self.mounts.is_empty() {
            return true;
        }
        let listed = self.mounts.iter().any(|m| m == mountpoint);
        listed != self.exclude
    }
}

/// One implementation per operating system.
///
/// Mandatory reads return `Err`; optional signals come back as `None` and
/// clear the matching capability flag.
pub trait PlatformSampler: Send {
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> Capabilities;

    fn core_count(&self) -> usize;

    fn sample_cpu(&mut self, signals: CpuSignals) -> Result<RawCpu>;

    /// `disks` is `None` when the disk list is not shown.
    fn sample_memory(&mut self, disks: Option<&DiskSelection>) -> Result<RawMemory>;

    fn sample_network(&mut self) -> Result<Vec<RawInterface>>;

    fn sample_processes(&mut self, query: &ProcessQuery) -> Result<RawProcessTable>;

    fn sample_process_io(&mut self, pid: u32) -> Option<ProcessIo>;
}

/// Sampler for the platform the binary was built for.
#[cfg(target_os = "linux")]
pub fn default_sampler() -> Result<Box<dyn PlatformSampler>> {
    Ok(Box::new(LinuxSampler::new(fs::RealFs)?))
}

#[cfg(not(target_os = "linux"))]
pub fn default_sampler() -> Result<Box<dyn PlatformSampler>> {
    Ok(Box::new(PortableSampler::new()))
}
