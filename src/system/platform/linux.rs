use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use color_eyre::Result;
use color_eyre::eyre::{WrapErr, eyre};
use tracing::{debug, warn};

use super::fs::FileSystem;
use super::{
    BatteryStatus, Capabilities, CpuSignals, DiskIo, DiskSelection, PlatformSampler, ProcessIo,
    ProcessQuery, RawCpu, RawDisk, RawInterface, RawMemory, RawProcess, RawProcessTable,
    RawTemperature,
};
use crate::system::counter::CpuTicks;

const SECTOR_BYTES: u64 = 512;
const KTHREADD_PID: u32 = 2;
/// Number of cpu samples between re-probes of missing optional signals.
const RECHECK_EVERY: u32 = 60;

const FREQ_PATHS: [&str; 2] = [
    "/sys/devices/system/cpu/cpufreq/policy0/scaling_cur_freq",
    "/sys/devices/system/cpu/cpu0/cpufreq/scaling_cur_freq",
];
const SENSOR_CHIPS: [&str; 5] = ["coretemp", "k10temp", "zenpower", "cpu_thermal", "soc_thermal"];

#[derive(Clone, Debug, Default)]
struct Sensors {
    package: Option<PathBuf>,
    cores: Vec<PathBuf>,
    critical: Option<f64>,
}

/// procfs/sysfs backend.
pub struct LinuxSampler<F: FileSystem> {
    fs: F,
    caps: Capabilities,
    core_count: usize,
    clk_tck: u64,
    page_size: u64,
    recheck_in: u32,
    sensors: Sensors,
    battery: Option<PathBuf>,
    users: HashMap<u32, String>,
    passwd_stamp: Option<SystemTime>,
    physical_fs: Option<HashSet<String>>,
    query_addresses: bool,
}

impl<F: FileSystem> LinuxSampler<F> {
    pub fn new(fs: F) -> Result<Self> {
        // SAFETY: sysconf has no preconditions.
        let clk_tck = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
        let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        let mut sampler = Self::with_clock(
            fs,
            if clk_tck > 0 { clk_tck as u64 } else { 100 },
            if page_size > 0 { page_size as u64 } else { 4096 },
        )?;
        sampler.query_addresses = true;
        Ok(sampler)
    }

    /// Construct with explicit clock tick rate and page size.
    pub fn with_clock(fs: F, clk_tck: u64, page_size: u64) -> Result<Self> {
        let stat = fs
            .read_to_string(Path::new("/proc/stat"))
            .wrap_err("cannot read /proc/stat")?;
        let (_, cores) = parse_proc_stat(&stat);
        let mut sampler = LinuxSampler {
            fs,
            caps: Capabilities::default(),
            core_count: cores.len().max(1),
            clk_tck: clk_tck.max(1),
            page_size,
            recheck_in: RECHECK_EVERY,
            sensors: Sensors::default(),
            battery: None,
            users: HashMap::new(),
            passwd_stamp: None,
            physical_fs: None,
            query_addresses: false,
        };
        sampler.probe_optional();
        debug!(cores = sampler.core_count, caps = ?sampler.caps, "linux sampler ready");
        Ok(sampler)
    }

    fn probe_optional(&mut self) {
        self.caps.cpu_freq = self.read_frequency().is_some();
        self.sensors = probe_sensors(&self.fs);
        self.caps.sensors = self.sensors.package.is_some();
        self.caps.core_temps = !self.sensors.cores.is_empty();
        self.battery = probe_battery(&self.fs);
        self.caps.battery = self.battery.is_some();
    }

    fn read(&self, path: &str) -> Result<String> {
        self.fs
            .read_to_string(Path::new(path))
            .wrap_err_with(|| format!("cannot read {path}"))
    }

    fn read_frequency(&self) -> Option<f64> {
        for path in FREQ_PATHS {
            if let Ok(text) = self.fs.read_to_string(Path::new(path))
                && let Ok(khz) = text.trim().parse::<f64>()
            {
                return Some(khz / 1000.0);
            }
        }
        let cpuinfo = self.fs.read_to_string(Path::new("/proc/cpuinfo")).ok()?;
        cpuinfo
            .lines()
            .filter(|l| l.starts_with("cpu MHz"))
            .find_map(|l| l.split(':').nth(1)?.trim().parse().ok())
    }

    fn read_temperature(&self) -> Option<RawTemperature> {
        let package = read_millidegrees(&self.fs, self.sensors.package.as_ref()?)?;
        let cores = self
            .sensors
            .cores
            .iter()
            .map(|p| read_millidegrees(&self.fs, p).unwrap_or(package))
            .collect();
        Some(RawTemperature {
            package,
            cores,
            critical: self.sensors.critical,
        })
    }

    fn read_battery(&self) -> Option<BatteryStatus> {
        let dir = self.battery.as_ref()?;
        let percent = self
            .fs
            .read_to_string(&dir.join("capacity"))
            .ok()?
            .trim()
            .parse::<u8>()
            .ok()?;
        let state = self
            .fs
            .read_to_string(&dir.join("status"))
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|_| "Unknown".to_string());
        Some(BatteryStatus {
            percent: percent.min(100),
            state,
        })
    }

    fn refresh_users(&mut self) {
        let path = Path::new("/etc/passwd");
        let stamp = self.fs.modified(path).ok();
        if stamp.is_some() && stamp == self.passwd_stamp {
            return;
        }
        match self.fs.read_to_string(path) {
            Ok(text) => {
                self.users = parse_passwd(&text);
                self.passwd_stamp = stamp;
            }
            Err(err) => debug!(%err, "passwd unavailable, showing numeric uids"),
        }
    }

    fn user_name(&self, uid: u32) -> String {
        self.users
            .get(&uid)
            .cloned()
            .unwrap_or_else(|| uid.to_string())
    }

    fn physical_filesystems(&mut self) -> &HashSet<String> {
        let fs = &self.fs;
        self.physical_fs.get_or_insert_with(|| {
            let text = fs
                .read_to_string(Path::new("/proc/filesystems"))
                .unwrap_or_default();
            parse_physical_filesystems(&text)
        })
    }

    fn fstab_mounts(&self) -> HashSet<String> {
        let text = self
            .fs
            .read_to_string(Path::new("/etc/fstab"))
            .unwrap_or_default();
        parse_fstab(&text)
    }

    fn disk_io(&self, device: &Path) -> Option<DiskIo> {
        let name = device.file_name()?.to_str()?;
        let candidates = [
            PathBuf::from(format!("/sys/block/{name}/stat")),
            PathBuf::from(format!("/sys/class/block/{name}/stat")),
        ];
        let text = candidates
            .iter()
            .find_map(|p| self.fs.read_to_string(p).ok())?;
        parse_block_stat(&text)
    }

    fn sample_disks(&mut self, selection: &DiskSelection) -> Vec<RawDisk> {
        let mounts = self
            .fs
            .read_to_string(Path::new("/etc/mtab"))
            .or_else(|_| self.fs.read_to_string(Path::new("/proc/self/mounts")))
            .unwrap_or_default();
        let fstab = if selection.use_fstab {
            Some(self.fstab_mounts())
        } else {
            None
        };
        let physical = if selection.only_physical {
            Some(self.physical_filesystems().clone())
        } else {
            None
        };

        let mut seen = HashSet::new();
        let mut disks = Vec::new();
        for entry in parse_mounts(&mounts) {
            if !selection.accepts(&entry.mountpoint) || !seen.insert(entry.mountpoint.clone()) {
                continue;
            }
            if let Some(fstab) = &fstab
                && !fstab.contains(&entry.mountpoint)
            {
                continue;
            }
            if let Some(physical) = &physical
                && !physical.contains(&entry.fstype)
            {
                continue;
            }
            let usage = match self.fs.statvfs(Path::new(&entry.mountpoint)) {
                Ok(usage) => usage,
                Err(err) => {
                    debug!(mount = %entry.mountpoint, %err, "statvfs failed, skipping mount");
                    continue;
                }
            };
            let device = PathBuf::from(&entry.device);
            disks.push(RawDisk {
                io: self.disk_io(&device),
                mountpoint: entry.mountpoint,
                device,
                fstype: entry.fstype,
                total: usage.total,
                used: usage.total.saturating_sub(usage.free),
                free: usage.available,
            });
        }
        disks
    }

    fn read_process(&self, pid: u32) -> Option<RawProcess> {
        let base = PathBuf::from(format!("/proc/{pid}"));
        // A pid that vanished between listing and reading is not an error.
        let stat = self.fs.read_to_string(&base.join("stat")).ok()?;
        let Some(parsed) = parse_pid_stat(&stat) else {
            warn!(pid, "malformed /proc/<pid>/stat, skipping");
            return None;
        };
        let uid = self
            .fs
            .read_to_string(&base.join("status"))
            .ok()
            .and_then(|s| parse_status_uid(&s));
        let command = self
            .fs
            .read_to_string(&base.join("cmdline"))
            .map(|c| parse_cmdline(&c))
            .unwrap_or_default();

        Some(RawProcess {
            pid,
            ppid: parsed.ppid,
            command: if command.is_empty() {
                parsed.name.clone()
            } else {
                command
            },
            name: parsed.name,
            user: uid.map(|u| self.user_name(u)).unwrap_or_default(),
            state: parsed.state,
            nice: parsed.nice,
            threads: parsed.threads,
            cpu_ticks: parsed.utime + parsed.stime,
            start_ticks: parsed.start_ticks,
            memory: parsed.rss_pages * self.page_size,
        })
    }
}

impl<F: FileSystem> PlatformSampler for LinuxSampler<F> {
    fn name(&self) -> &'static str {
        "linux"
    }

    fn capabilities(&self) -> Capabilities {
        self.caps
    }

    fn core_count(&self) -> usize {
        self.core_count
    }

    fn sample_cpu(&mut self, signals: CpuSignals) -> Result<RawCpu> {
        let stat = self.read("/proc/stat")?;
        let (total, cores) = parse_proc_stat(&stat);
        if total.is_empty() {
            return Err(eyre!("/proc/stat has no aggregate cpu line"));
        }
        if cores.len() > self.core_count {
            debug!(from = self.core_count, to = cores.len(), "new cores detected");
            self.core_count = cores.len();
        }
        let mut cores = cores;
        cores.resize(self.core_count, None);

        let load_avg = self
            .fs
            .read_to_string(Path::new("/proc/loadavg"))
            .map(|s| parse_loadavg(&s))
            .unwrap_or_default();

        self.recheck_in = self.recheck_in.saturating_sub(1);
        if self.recheck_in == 0 {
            self.recheck_in = RECHECK_EVERY;
            let wanted_missing = (signals.frequency && !self.caps.cpu_freq)
                || (signals.temperature && !self.caps.sensors)
                || (signals.battery && !self.caps.battery);
            if wanted_missing {
                self.probe_optional();
            }
        }

        let frequency_mhz = if signals.frequency && self.caps.cpu_freq {
            let freq = self.read_frequency();
            self.caps.cpu_freq = freq.is_some();
            freq
        } else {
            None
        };
        let temperature = if signals.temperature && self.caps.sensors {
            let temp = self.read_temperature();
            if temp.is_none() {
                debug!("temperature read failed, disabling sensors");
                self.caps.sensors = false;
                self.caps.core_temps = false;
            }
            temp
        } else {
            None
        };
        let battery = if signals.battery && self.caps.battery {
            let battery = self.read_battery();
            self.caps.battery = battery.is_some();
            battery
        } else {
            None
        };

        Ok(RawCpu {
            total,
            cores,
            load_avg,
            frequency_mhz,
            temperature,
            battery,
        })
    }

    fn sample_memory(&mut self, disks: Option<&DiskSelection>) -> Result<RawMemory> {
        let meminfo = self.read("/proc/meminfo")?;
        let mut memory = parse_meminfo(&meminfo)?;
        if let Some(selection) = disks {
            memory.disks = self.sample_disks(selection);
        }
        Ok(memory)
    }

    fn sample_network(&mut self) -> Result<Vec<RawInterface>> {
        let base = Path::new("/sys/class/net");
        let mut dirs = self
            .fs
            .read_dir(base)
            .wrap_err("cannot list /sys/class/net")?;
        dirs.sort();
        let addresses = if self.query_addresses {
            interface_addresses()
        } else {
            HashMap::new()
        };

        let mut interfaces = Vec::with_capacity(dirs.len());
        for dir in dirs {
            let Some(name) = dir.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
                continue;
            };
            let read_u64 = |file: &str| {
                self.fs
                    .read_to_string(&dir.join("statistics").join(file))
                    .ok()
                    .and_then(|s| s.trim().parse::<u64>().ok())
            };
            let (Some(rx_bytes), Some(tx_bytes)) = (read_u64("rx_bytes"), read_u64("tx_bytes"))
            else {
                warn!(iface = %name, "missing interface statistics, skipping");
                continue;
            };
            let operstate = self
                .fs
                .read_to_string(&dir.join("operstate"))
                .unwrap_or_default();
            let connected = matches!(operstate.trim(), "up" | "unknown");
            interfaces.push(RawInterface {
                address: addresses.get(&name).cloned(),
                name,
                rx_bytes,
                tx_bytes,
                connected,
            });
        }
        Ok(interfaces)
    }

    fn sample_processes(&mut self, query: &ProcessQuery) -> Result<RawProcessTable> {
        let (total, _) = parse_proc_stat(&self.read("/proc/stat")?);
        let uptime_secs = parse_uptime(&self.read("/proc/uptime")?)
            .ok_or_else(|| eyre!("malformed /proc/uptime"))?;
        let total_memory = parse_meminfo(&self.read("/proc/meminfo")?)?.total;
        self.refresh_users();

        let entries = self
            .fs
            .read_dir(Path::new("/proc"))
            .wrap_err("cannot list /proc")?;
        let mut processes = Vec::with_capacity(entries.len());
        for entry in entries {
            let Some(pid) = entry
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.parse::<u32>().ok())
            else {
                continue;
            };
            if let Some(process) = self.read_process(pid) {
                processes.push(process);
            }
        }
        if query.filter_kernel {
            processes.retain(|p| p.pid != KTHREADD_PID && p.ppid != KTHREADD_PID);
        }

        Ok(RawProcessTable {
            processes,
            cpu_total_ticks: CpuTicks::from_fields(&total).totals,
            uptime_secs,
            clk_tck: self.clk_tck,
            total_memory,
        })
    }

    fn sample_process_io(&mut self, pid: u32) -> Option<ProcessIo> {
        let text = self
            .fs
            .read_to_string(Path::new(&format!("/proc/{pid}/io")))
            .ok()?;
        let mut read_bytes = None;
        let mut write_bytes = None;
        for line in text.lines() {
            if let Some(val) = line.strip_prefix("read_bytes:") {
                read_bytes = val.trim().parse().ok();
            } else if let Some(val) = line.strip_prefix("write_bytes:") {
                write_bytes = val.trim().parse().ok();
            }
        }
        Some(ProcessIo {
            read_bytes: read_bytes?,
            write_bytes: write_bytes?,
        })
    }
}

fn read_millidegrees<F: FileSystem>(fs: &F, path: &Path) -> Option<f64> {
    let raw: f64 = fs.read_to_string(path).ok()?.trim().parse().ok()?;
    Some(raw / 1000.0)
}

fn probe_sensors<F: FileSystem>(fs: &F) -> Sensors {
    let mut chips = fs.read_dir(Path::new("/sys/class/hwmon")).unwrap_or_default();
    chips.sort();
    for chip in chips {
        let name = fs.read_to_string(&chip.join("name")).unwrap_or_default();
        if !SENSOR_CHIPS.contains(&name.trim()) {
            continue;
        }
        let mut sensors = Sensors::default();
        let mut cores: Vec<(usize, PathBuf)> = Vec::new();
        let mut inputs = fs.read_dir(&chip).unwrap_or_default();
        inputs.sort();
        for input in inputs {
            let Some(file) = input.file_name().and_then(|f| f.to_str()) else {
                continue;
            };
            let Some(prefix) = file.strip_suffix("_input").filter(|p| p.starts_with("temp"))
            else {
                continue;
            };
            let label = fs
                .read_to_string(&chip.join(format!("{prefix}_label")))
                .unwrap_or_default();
            let label = label.trim();
            if let Some(n) = label.strip_prefix("Core ").and_then(|n| n.parse().ok()) {
                cores.push((n, input.clone()));
            } else if sensors.package.is_none()
                || ["Package", "Tctl", "Tdie"].iter().any(|p| label.starts_with(p))
            {
                sensors.critical = read_millidegrees(fs, &chip.join(format!("{prefix}_crit")));
                sensors.package = Some(input.clone());
            }
        }
        cores.sort_by_key(|(n, _)| *n);
        sensors.cores = cores.into_iter().map(|(_, p)| p).collect();
        if sensors.package.is_none() {
            sensors.package = sensors.cores.first().cloned();
        }
        if sensors.package.is_some() {
            return sensors;
        }
    }

    let zone = PathBuf::from("/sys/class/thermal/thermal_zone0/temp");
    if fs.exists(&zone) {
        return Sensors {
            package: Some(zone),
            ..Sensors::default()
        };
    }
    Sensors::default()
}

fn probe_battery<F: FileSystem>(fs: &F) -> Option<PathBuf> {
    let mut supplies = fs
        .read_dir(Path::new("/sys/class/power_supply"))
        .unwrap_or_default();
    supplies.sort();
    supplies.into_iter().find(|dir| {
        fs.read_to_string(&dir.join("type"))
            .is_ok_and(|t| t.trim() == "Battery")
            && fs.exists(&dir.join("capacity"))
    })
}

/// IPv4 address per interface name.
fn interface_addresses() -> HashMap<String, String> {
    let mut out = HashMap::new();
    let mut head: *mut libc::ifaddrs = std::ptr::null_mut();
    // SAFETY: getifaddrs allocates a list that is released with freeifaddrs
    // below; nodes are only read while the list is alive.
    unsafe {
        if libc::getifaddrs(&mut head) != 0 {
            return out;
        }
        let mut cursor = head;
        while !cursor.is_null() {
            let ifa = &*cursor;
            if !ifa.ifa_addr.is_null()
                && i32::from((*ifa.ifa_addr).sa_family) == libc::AF_INET
                && !ifa.ifa_name.is_null()
            {
                let addr = &*(ifa.ifa_addr as *const libc::sockaddr_in);
                let ip = std::net::Ipv4Addr::from(u32::from_be(addr.sin_addr.s_addr));
                let name = std::ffi::CStr::from_ptr(ifa.ifa_name)
                    .to_string_lossy()
                    .into_owned();
                out.entry(name).or_insert_with(|| ip.to_string());
            }
            cursor = ifa.ifa_next;
        }
        libc::freeifaddrs(head);
    }
    out
}

/// Aggregate and per-core tick fields from `/proc/stat`.
pub(crate) fn parse_proc_stat(text: &str) -> (Vec<u64>, Vec<Option<Vec<u64>>>) {
    let mut total = Vec::new();
    let mut cores: Vec<Option<Vec<u64>>> = Vec::new();
    for line in text.lines() {
        let mut parts = line.split_whitespace();
        let Some(label) = parts.next() else { continue };
        let Some(suffix) = label.strip_prefix("cpu") else {
            continue;
        };
        let fields: Vec<u64> = match parts.map(str::parse).collect() {
            Ok(fields) => fields,
            Err(_) => {
                warn!(line, "malformed cpu line in /proc/stat");
                continue;
            }
        };
        if suffix.is_empty() {
            total = fields;
        } else if let Ok(index) = suffix.parse::<usize>() {
            if cores.len() <= index {
                cores.resize(index + 1, None);
            }
            cores[index] = Some(fields);
        }
    }
    (total, cores)
}

fn parse_loadavg(text: &str) -> [f64; 3] {
    let mut out = [0.0; 3];
    for (slot, value) in out.iter_mut().zip(text.split_whitespace()) {
        *slot = value.parse().unwrap_or(0.0);
    }
    out
}

fn parse_uptime(text: &str) -> Option<f64> {
    text.split_whitespace().next()?.parse().ok()
}

pub(crate) fn parse_meminfo(text: &str) -> Result<RawMemory> {
    let mut values: HashMap<&str, u64> = HashMap::new();
    for line in text.lines() {
        let Some((key, rest)) = line.split_once(':') else {
            continue;
        };
        match rest.split_whitespace().next().map(str::parse::<u64>) {
            Some(Ok(kib)) => {
                values.insert(key.trim(), kib * 1024);
            }
            _ => warn!(line, "malformed /proc/meminfo line"),
        }
    }
    let total = *values
        .get("MemTotal")
        .ok_or_else(|| eyre!("/proc/meminfo lacks MemTotal"))?;
    let get = |key: &str| values.get(key).copied().unwrap_or(0);
    Ok(RawMemory {
        total,
        free: get("MemFree"),
        available: values.get("MemAvailable").copied(),
        cached: get("Cached"),
        swap_total: get("SwapTotal"),
        swap_free: get("SwapFree"),
        disks: Vec::new(),
    })
}

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct PidStat {
    pub name: String,
    pub state: char,
    pub ppid: u32,
    pub utime: u64,
    pub stime: u64,
    pub nice: i64,
    pub threads: u64,
    pub start_ticks: u64,
    pub rss_pages: u64,
}

/// Parses `/proc/<pid>/stat`. The command name may itself contain spaces
/// and parentheses, so fields are counted from the last `)`.
pub(crate) fn parse_pid_stat(text: &str) -> Option<PidStat> {
    let open = text.find('(')?;
    let close = text.rfind(')')?;
    if close < open {
        return None;
    }
    let name = text[open + 1..close].to_string();
    let fields: Vec<&str> = text[close + 1..].split_whitespace().collect();
    if fields.len() < 22 {
        return None;
    }
    Some(PidStat {
        name,
        state: fields[0].chars().next()?,
        ppid: fields[1].parse().ok()?,
        utime: fields[11].parse().ok()?,
        stime: fields[12].parse().ok()?,
        nice: fields[16].parse().ok()?,
        threads: fields[17].parse().ok()?,
        start_ticks: fields[19].parse().ok()?,
        rss_pages: fields[21].parse::<i64>().ok()?.max(0) as u64,
    })
}

fn parse_status_uid(text: &str) -> Option<u32> {
    text.lines()
        .find_map(|l| l.strip_prefix("Uid:"))?
        .split_whitespace()
        .next()?
        .parse()
        .ok()
}

fn parse_cmdline(raw: &str) -> String {
    raw.split('\0')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn parse_passwd(text: &str) -> HashMap<u32, String> {
    text.lines()
        .filter(|l| !l.starts_with('#'))
        .filter_map(|line| {
            let mut parts = line.split(':');
            let name = parts.next()?;
            let uid = parts.nth(1)?.parse().ok()?;
            Some((uid, name.to_string()))
        })
        .collect()
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) struct MountEntry {
    pub device: String,
    pub mountpoint: String,
    pub fstype: String,
}

/// Mount tables escape whitespace as octal (`\040`).
fn decode_mount_path(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\'
            && let Some(digits) = bytes.get(i + 1..i + 4)
            && digits.iter().all(|d| (b'0'..=b'7').contains(d))
        {
            let code = digits.iter().fold(0u32, |acc, d| acc * 8 + u32::from(d - b'0'));
            out.push(code as u8);
            i += 4;
            continue;
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

pub(crate) fn parse_mounts(text: &str) -> Vec<MountEntry> {
    text.lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            Some(MountEntry {
                device: decode_mount_path(parts.next()?),
                mountpoint: decode_mount_path(parts.next()?),
                fstype: parts.next()?.to_string(),
            })
        })
        .collect()
}

fn parse_fstab(text: &str) -> HashSet<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter_map(|l| l.split_whitespace().nth(1))
        .filter(|mp| *mp != "none" && *mp != "swap")
        .map(decode_mount_path)
        .collect()
}

pub(crate) fn parse_physical_filesystems(text: &str) -> HashSet<String> {
    let mut out: HashSet<String> = text
        .lines()
        .filter(|l| !l.starts_with("nodev"))
        .map(str::trim)
        .filter(|fs| !fs.is_empty() && *fs != "squashfs" && *fs != "nullfs")
        .map(str::to_string)
        .collect();
    for extra in ["zfs", "wslfs", "drvfs"] {
        out.insert(extra.to_string());
    }
    out
}

/// `/sys/block/<dev>/stat`: sectors read at 2, sectors written at 6,
/// io_ticks at 9.
pub(crate) fn parse_block_stat(text: &str) -> Option<DiskIo> {
    let fields: Vec<u64> = text
        .split_whitespace()
        .map(str::parse)
        .collect::<std::result::Result<_, _>>()
        .ok()?;
    Some(DiskIo {
        read_bytes: fields.get(2)? * SECTOR_BYTES,
        write_bytes: fields.get(6)? * SECTOR_BYTES,
        io_ticks_ms: *fields.get(9)?,
    })
}
