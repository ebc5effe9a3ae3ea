use std::collections::{HashMap, HashSet};

use serde::Serialize;

use super::counter::{percent_of, process_cpu_percent};
use super::platform::{RawProcess, RawProcessTable};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ProcessState {
    Running,
    Sleeping,
    Waiting,
    Zombie,
    Stopped,
    Tracing,
    Dead,
    Wakekill,
    Paging,
    Parked,
    Idle,
    Unknown,
}

impl ProcessState {
    pub fn from_char(c: char) -> Self {
        match c {
            'R' => ProcessState::Running,
            'S' => ProcessState::Sleeping,
            'D' => ProcessState::Waiting,
            'Z' => ProcessState::Zombie,
            'T' => ProcessState::Stopped,
            't' => ProcessState::Tracing,
            'X' | 'x' => ProcessState::Dead,
            'K' => ProcessState::Wakekill,
            'W' => ProcessState::Paging,
            'P' => ProcessState::Parked,
            'I' => ProcessState::Idle,
            _ => ProcessState::Unknown,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ProcessState::Running => "Running",
            ProcessState::Sleeping => "Sleeping",
            ProcessState::Waiting => "Waiting",
            ProcessState::Zombie => "Zombie",
            ProcessState::Stopped => "Stopped",
            ProcessState::Tracing => "Tracing",
            ProcessState::Dead => "Dead",
            ProcessState::Wakekill => "Wakekill",
            ProcessState::Paging => "Paging",
            ProcessState::Parked => "Parked",
            ProcessState::Idle => "Idle",
            ProcessState::Unknown => "Unknown",
        }
    }

    /// Zombie or dead: excluded from aggregation.
    pub fn is_defunct(self) -> bool {
        matches!(self, ProcessState::Zombie | ProcessState::Dead)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ProcessRecord {
    pub pid: u32,
    pub ppid: u32,
    pub name: String,
    pub command: String,
    pub user: String,
    pub threads: u64,
    pub nice: i64,
    pub state: char,
    pub cpu_ticks: u64,
    pub last_cpu_ticks: u64,
    pub start_ticks: u64,
    /// Instantaneous cpu usage over the last interval.
    pub cpu_percent: f64,
    /// Average cpu usage over the process lifetime.
    pub cpu_cumulative: f64,
    pub memory: u64,
    pub mem_percent: u64,

    // Tree view only.
    pub depth: usize,
    pub tree_index: usize,
    pub collapsed: bool,
    pub filtered: bool,
    pub has_children: bool,
    pub is_last_sibling: bool,
}

impl ProcessRecord {
    pub fn new(pid: u32, ppid: u32, name: impl Into<String>) -> Self {
        let name = name.into();
        ProcessRecord {
            pid,
            ppid,
            command: name.clone(),
            name,
            state: 'S',
            threads: 1,
            ..Default::default()
        }
    }

    pub fn process_state(&self) -> ProcessState {
        ProcessState::from_char(self.state)
    }

    fn apply(&mut self, raw: RawProcess) {
        self.ppid = raw.ppid;
        self.name = raw.name;
        self.command = raw.command;
        self.user = raw.user;
        self.threads = raw.threads;
        self.nice = raw.nice;
        self.state = raw.state;
        self.last_cpu_ticks = self.cpu_ticks;
        self.cpu_ticks = raw.cpu_ticks;
        self.start_ticks = raw.start_ticks;
        self.memory = raw.memory;
    }
}

/// Inputs for per-process cpu math that come from configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CpuAccounting {
    /// Report usage relative to one core instead of the whole machine.
    pub per_core: bool,
    pub cores: usize,
}

/// Arena of process records with a pid index.
///
/// Records are refreshed in place across passes so user state such as
/// `collapsed` survives; slots of vanished pids are dropped.
#[derive(Clone, Debug, Default)]
pub struct ProcessTable {
    slots: Vec<ProcessRecord>,
    index: HashMap<u32, usize>,
    last_total_ticks: Option<u64>,
}

impl ProcessTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from ready-made records, e.g. for tests and benches.
    pub fn from_records(records: Vec<ProcessRecord>) -> Self {
        let mut table = ProcessTable {
            slots: records,
            ..Default::default()
        };
        table.reindex();
        table
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn records(&self) -> &[ProcessRecord] {
        &self.slots
    }

    pub fn records_mut(&mut self) -> &mut [ProcessRecord] {
        &mut self.slots
    }

    pub fn slot_of(&self, pid: u32) -> Option<usize> {
        self.index.get(&pid).copied()
    }

    pub fn get(&self, pid: u32) -> Option<&ProcessRecord> {
        self.slot_of(pid).map(|slot| &self.slots[slot])
    }

    pub fn get_mut(&mut self, pid: u32) -> Option<&mut ProcessRecord> {
        let slot = self.slot_of(pid)?;
        self.slots.get_mut(slot)
    }

    pub fn set_collapsed(&mut self, pid: u32, collapsed: bool) -> bool {
        match self.get_mut(pid) {
            Some(record) => {
                record.collapsed = collapsed;
                true
            }
            None => false,
        }
    }

    pub fn toggle_collapsed(&mut self, pid: u32) -> bool {
        match self.get_mut(pid) {
            Some(record) => {
                record.collapsed = !record.collapsed;
                true
            }
            None => false,
        }
    }

    /// Merge a fresh sample into the table and recompute cpu and memory
    /// figures.
    pub fn refresh(&mut self, raw: RawProcessTable, accounting: CpuAccounting) {
        let total_delta = self
            .last_total_ticks
            .map(|last| raw.cpu_total_ticks.saturating_sub(last))
            .unwrap_or(0);
        self.last_total_ticks = Some(raw.cpu_total_ticks);
        let multiplier = if accounting.per_core {
            accounting.cores.max(1) as u64
        } else {
            1
        };
        let cores = accounting.cores.max(1) as u64;
        let uptime_ticks = (raw.uptime_secs * raw.clk_tck as f64) as u64;

        let mut seen = HashSet::with_capacity(raw.processes.len());
        for sample in raw.processes {
            let pid = sample.pid;
            if !seen.insert(pid) {
                continue;
            }
            let slot = match self.index.get(&pid) {
                Some(&slot) => {
                    self.slots[slot].apply(sample);
                    slot
                }
                None => {
                    let mut record = ProcessRecord {
                        pid,
                        ..Default::default()
                    };
                    record.apply(sample);
                    record.last_cpu_ticks = record.cpu_ticks;
                    self.slots.push(record);
                    let slot = self.slots.len() - 1;
                    self.index.insert(pid, slot);
                    slot
                }
            };

            let record = &mut self.slots[slot];
            let proc_delta = record.cpu_ticks.saturating_sub(record.last_cpu_ticks);
            record.cpu_percent = if total_delta == 0 {
                0.0
            } else {
                process_cpu_percent(proc_delta, total_delta, multiplier, cores)
            };
            let lifetime = uptime_ticks.saturating_sub(record.start_ticks).max(1);
            record.cpu_cumulative =
                (record.cpu_ticks as f64 * 100.0 / lifetime as f64).clamp(0.0, 100.0 * cores as f64);
            record.mem_percent = percent_of(record.memory, raw.total_memory);
        }

        if seen.len() != self.slots.len() {
            self.slots.retain(|r| seen.contains(&r.pid));
            self.reindex();
        }
    }

    fn reindex(&mut self) {
        self.index.clear();
        for (slot, record) in self.slots.iter().enumerate() {
            self.index.insert(record.pid, slot);
        }
    }
}
