//! sysinfo-backed sampler for targets without procfs.
//!
//! sysinfo reports cpu usage as percentages rather than tick counters, so
//! monotonic tick counters are synthesized at `SYNTHETIC_HZ` to feed the
//! same delta math as the procfs backend.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Instant;

use color_eyre::Result;
use color_eyre::eyre::eyre;
use sysinfo::{
    Components, Disks, Networks, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System,
    Users,
};
use tracing::debug;

use super::{
    Capabilities, CpuSignals, DiskSelection, PlatformSampler, ProcessIo, ProcessQuery, RawCpu,
    RawDisk, RawInterface, RawMemory, RawProcess, RawProcessTable, RawTemperature,
};

const SYNTHETIC_HZ: f64 = 100.0;
const KTHREADD_PID: u32 = 2;

pub struct PortableSampler {
    sys: System,
    disks: Disks,
    networks: Networks,
    components: Components,
    users: Users,
    caps: Capabilities,
    /// Accumulated (busy, idle) ticks per core.
    core_ticks: Vec<(f64, f64)>,
    last_cpu_sample: Option<Instant>,
}

impl Default for PortableSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl PortableSampler {
    pub fn new() -> Self {
        let mut sys = System::new();
        sys.refresh_memory();
        sys.refresh_cpu_all();
        sys.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::everything(),
        );
        let components = Components::new_with_refreshed_list();
        let has_temps = components.iter().any(|c| c.temperature().is_some());
        let caps = Capabilities {
            sensors: has_temps,
            core_temps: false,
            battery: false,
            cpu_freq: sys.cpus().first().is_some_and(|c| c.frequency() > 0),
        };
        let core_ticks = vec![(0.0, 0.0); sys.cpus().len().max(1)];
        PortableSampler {
            sys,
            disks: Disks::new_with_refreshed_list(),
            networks: Networks::new_with_refreshed_list(),
            components,
            users: Users::new_with_refreshed_list(),
            caps,
            core_ticks,
            last_cpu_sample: None,
        }
    }

    fn advance_ticks(&mut self) {
        let now = Instant::now();
        let elapsed = self
            .last_cpu_sample
            .map(|t| now.duration_since(t).as_secs_f64())
            .unwrap_or(0.0);
        self.last_cpu_sample = Some(now);
        let cpus = self.sys.cpus();
        if cpus.len() > self.core_ticks.len() {
            self.core_ticks.resize(cpus.len(), (0.0, 0.0));
        }
        for (ticks, cpu) in self.core_ticks.iter_mut().zip(cpus) {
            let budget = elapsed * SYNTHETIC_HZ;
            let busy = budget * f64::from(cpu.cpu_usage()).clamp(0.0, 100.0) / 100.0;
            ticks.0 += busy;
            ticks.1 += budget - busy;
        }
    }

    fn total_ticks(&self) -> Vec<u64> {
        let (busy, idle) = self
            .core_ticks
            .iter()
            .fold((0.0, 0.0), |acc, t| (acc.0 + t.0, acc.1 + t.1));
        as_fields(busy, idle)
    }
}

/// user, nice, system, idle.
fn as_fields(busy: f64, idle: f64) -> Vec<u64> {
    vec![busy.round() as u64, 0, 0, idle.round() as u64]
}

fn state_char(status: ProcessStatus) -> char {
    match status {
        ProcessStatus::Run => 'R',
        ProcessStatus::Sleep => 'S',
        ProcessStatus::Idle => 'I',
        ProcessStatus::Zombie => 'Z',
        ProcessStatus::Stop => 'T',
        ProcessStatus::Dead => 'X',
        ProcessStatus::Tracing => 't',
        ProcessStatus::UninterruptibleDiskSleep => 'D',
        _ => '?',
    }
}

impl PlatformSampler for PortableSampler {
    fn name(&self) -> &'static str {
        "sysinfo"
    }

    fn capabilities(&self) -> Capabilities {
        self.caps
    }

    fn core_count(&self) -> usize {
        self.core_ticks.len()
    }

    fn sample_cpu(&mut self, signals: CpuSignals) -> Result<RawCpu> {
        self.sys.refresh_cpu_all();
        if self.sys.cpus().is_empty() {
            return Err(eyre!("no cpus reported"));
        }
        self.advance_ticks();
        let load = System::load_average();

        let frequency_mhz = if signals.frequency && self.caps.cpu_freq {
            self.sys.cpus().first().map(|c| c.frequency() as f64)
        } else {
            None
        };
        let temperature = if signals.temperature && self.caps.sensors {
            self.components.refresh(true);
            let readings: Vec<f64> = self
                .components
                .iter()
                .filter_map(|c| c.temperature())
                .map(f64::from)
                .collect();
            let package = readings.iter().copied().fold(f64::NAN, f64::max);
            if package.is_nan() {
                debug!("no temperature readings, disabling sensors");
                self.caps.sensors = false;
                None
            } else {
                Some(RawTemperature {
                    package,
                    cores: Vec::new(),
                    critical: self
                        .components
                        .iter()
                        .find_map(|c| c.critical())
                        .map(f64::from),
                })
            }
        } else {
            None
        };

        Ok(RawCpu {
            total: self.total_ticks(),
            cores: self
                .core_ticks
                .iter()
                .map(|t| Some(as_fields(t.0, t.1)))
                .collect(),
            load_avg: [load.one, load.five, load.fifteen],
            frequency_mhz,
            temperature,
            battery: None,
        })
    }

    fn sample_memory(&mut self, disks: Option<&DiskSelection>) -> Result<RawMemory> {
        self.sys.refresh_memory();
        let mut memory = RawMemory {
            total: self.sys.total_memory(),
            free: self.sys.free_memory(),
            available: Some(self.sys.available_memory()),
            cached: 0,
            swap_total: self.sys.total_swap(),
            swap_free: self.sys.free_swap(),
            disks: Vec::new(),
        };
        if let Some(selection) = disks {
            self.disks.refresh(true);
            let mut seen = HashSet::new();
            for disk in self.disks.list() {
                let mountpoint = disk.mount_point().to_string_lossy().into_owned();
                if !selection.accepts(&mountpoint)
                    || (selection.only_physical && disk.is_removable())
                    || !seen.insert(mountpoint.clone())
                {
                    continue;
                }
                let total = disk.total_space();
                let free = disk.available_space();
                memory.disks.push(RawDisk {
                    mountpoint,
                    device: PathBuf::from(disk.name()),
                    fstype: disk.file_system().to_string_lossy().into_owned(),
                    total,
                    used: total.saturating_sub(free),
                    free,
                    io: None,
                });
            }
        }
        Ok(memory)
    }

    fn sample_network(&mut self) -> Result<Vec<RawInterface>> {
        self.networks.refresh(true);
        let mut interfaces: Vec<RawInterface> = self
            .networks
            .iter()
            .map(|(name, data)| {
                let address = data.ip_networks().iter().find(|n| n.addr.is_ipv4());
                RawInterface {
                    name: name.clone(),
                    rx_bytes: data.total_received(),
                    tx_bytes: data.total_transmitted(),
                    connected: address.is_some(),
                    address: address.map(|n| n.addr.to_string()),
                }
            })
            .collect();
        interfaces.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(interfaces)
    }

    fn sample_processes(&mut self, query: &ProcessQuery) -> Result<RawProcessTable> {
        self.sys.refresh_memory();
        self.sys.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::everything(),
        );
        let boot = System::boot_time();
        let mut processes = Vec::with_capacity(self.sys.processes().len());
        for (pid, process) in self.sys.processes() {
            let pid = pid.as_u32();
            let ppid = process.parent().map(|p| p.as_u32()).unwrap_or(0);
            if query.filter_kernel && (pid == KTHREADD_PID || ppid == KTHREADD_PID) {
                continue;
            }
            let name = process.name().to_string_lossy().into_owned();
            let command = process
                .cmd()
                .iter()
                .map(|s| s.to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join(" ");
            let user = process
                .user_id()
                .and_then(|uid| self.users.get_user_by_id(uid))
                .map(|u| u.name().to_string())
                .unwrap_or_default();
            processes.push(RawProcess {
                pid,
                ppid,
                command: if command.is_empty() { name.clone() } else { command },
                name,
                user,
                state: state_char(process.status()),
                nice: 0,
                threads: process.tasks().map(|t| t.len() as u64).unwrap_or(1),
                cpu_ticks: (process.accumulated_cpu_time() as f64 * SYNTHETIC_HZ / 1000.0) as u64,
                start_ticks: (process.start_time().saturating_sub(boot) as f64 * SYNTHETIC_HZ)
                    as u64,
                memory: process.memory(),
            });
        }
        if processes.is_empty() {
            return Err(eyre!("process enumeration returned nothing"));
        }
        let total: u64 = self.total_ticks().iter().sum();
        Ok(RawProcessTable {
            processes,
            cpu_total_ticks: total,
            uptime_secs: System::uptime() as f64,
            clk_tck: SYNTHETIC_HZ as u64,
            total_memory: self.sys.total_memory(),
        })
    }

    fn sample_process_io(&mut self, pid: u32) -> Option<ProcessIo> {
        let usage = self.sys.process(sysinfo::Pid::from_u32(pid))?.disk_usage();
        Some(ProcessIo {
            read_bytes: usage.total_read_bytes,
            write_bytes: usage.total_written_bytes,
        })
    }
}
