use std::collections::{HashMap, VecDeque};

use tracing::debug;

use super::counter::NetStat;
use super::history::{graph_capacity, mean_of_newest, push_bounded, trim};
use super::platform::RawInterface;
use super::snapshot::{NetDirection, NetSnapshot};

/// Lowest auto-scaled graph ceiling, 10 KiB/s.
pub const MIN_GRAPH_MAX: u64 = 10 << 10;
const SCALE_TRIGGER: u32 = 5;
const SCALE_WINDOW: usize = 5;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetOptions {
    /// Preferred interface; empty picks one automatically.
    pub iface: String,
    pub auto_scale: bool,
    /// Share one ceiling between download and upload.
    pub sync: bool,
    /// Fixed ceilings in bytes per second when not auto-scaling.
    pub download_ceiling: u64,
    pub upload_ceiling: u64,
}

impl Default for NetOptions {
    fn default() -> Self {
        NetOptions {
            iface: String::new(),
            auto_scale: true,
            sync: false,
            download_ceiling: 100 << 20,
            upload_ceiling: 100 << 20,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Dir {
    Download,
    Upload,
}

impl Dir {
    fn index(self) -> usize {
        self as usize
    }

    fn other(self) -> Dir {
        match self {
            Dir::Download => Dir::Upload,
            Dir::Upload => Dir::Download,
        }
    }
}

#[derive(Clone, Debug, Default)]
struct InterfaceState {
    stats: [NetStat; 2],
    bandwidth: [VecDeque<u64>; 2],
    connected: bool,
    address: Option<String>,
}

impl InterfaceState {
    fn total(&self) -> u64 {
        self.stats[0].total.saturating_add(self.stats[1].total)
    }
}

/// Hysteresis counts of samples above the ceiling and far below it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct ScaleCounts {
    above: u32,
    below: u32,
}

#[derive(Debug, Clone)]
pub struct NetReducer {
    interfaces: HashMap<String, InterfaceState>,
    order: Vec<String>,
    selected: String,
    graph_max: [u64; 2],
    counts: [ScaleCounts; 2],
    rescale: bool,
    capacity: usize,
    snapshot: NetSnapshot,
}

impl NetReducer {
    pub fn new(graph_width: usize) -> Self {
        NetReducer {
            interfaces: HashMap::new(),
            order: Vec::new(),
            selected: String::new(),
            graph_max: [MIN_GRAPH_MAX; 2],
            counts: [ScaleCounts::default(); 2],
            rescale: true,
            capacity: graph_capacity(graph_width),
            snapshot: NetSnapshot::default(),
        }
    }

    pub fn snapshot(&self) -> &NetSnapshot {
        &self.snapshot
    }

    pub fn set_graph_width(&mut self, graph_width: usize) {
        self.capacity = graph_capacity(graph_width);
        for state in self.interfaces.values_mut() {
            for bandwidth in state.bandwidth.iter_mut() {
                trim(bandwidth, self.capacity);
            }
        }
        self.publish();
    }

    pub fn request_rescale(&mut self) {
        self.rescale = true;
    }

    /// Toggle the total offset of the selected interface.
    pub fn toggle_reset_totals(&mut self) {
        if let Some(state) = self.interfaces.get_mut(&self.selected) {
            for stat in state.stats.iter_mut() {
                stat.toggle_reset();
            }
        }
        self.publish();
    }

    pub fn reduce(
        &mut self,
        raw: Vec<RawInterface>,
        elapsed_secs: f64,
        options: &NetOptions,
    ) -> &NetSnapshot {
        self.order = raw.iter().map(|r| r.name.clone()).collect();
        self.interfaces.retain(|name, _| raw.iter().any(|r| &r.name == name));

        for iface in raw {
            let state = self.interfaces.entry(iface.name.clone()).or_default();
            state.connected = iface.connected;
            state.address = iface.address;
            for (dir, value) in [(Dir::Download, iface.rx_bytes), (Dir::Upload, iface.tx_bytes)] {
                let i = dir.index();
                state.stats[i].update(value, elapsed_secs);
                push_bounded(&mut state.bandwidth[i], state.stats[i].speed, self.capacity);
            }
        }

        self.select_interface(options);
        if options.auto_scale {
            self.count_scale_samples(options.sync);
            self.autoscale(options.sync);
        } else {
            self.graph_max = [
                options.download_ceiling.max(1),
                options.upload_ceiling.max(1),
            ];
        }
        self.rescale = false;
        self.publish();
        &self.snapshot
    }

    fn select_interface(&mut self, options: &NetOptions) {
        if !self.selected.is_empty() && self.interfaces.contains_key(&self.selected) {
            if options.iface.is_empty() || options.iface == self.selected {
                return;
            }
            if !self.interfaces.contains_key(&options.iface) {
                return;
            }
        }

        let previous = std::mem::take(&mut self.selected);
        if !options.iface.is_empty() && self.interfaces.contains_key(&options.iface) {
            self.selected = options.iface.clone();
        } else {
            let mut by_total: Vec<&String> = self.order.iter().collect();
            by_total.sort_by_key(|name| {
                std::cmp::Reverse(self.interfaces.get(*name).map(|s| s.total()).unwrap_or(0))
            });
            self.selected = by_total
                .iter()
                .find(|name| self.interfaces.get(**name).is_some_and(|s| s.connected))
                .map(|name| (*name).clone())
                .or_else(|| self.order.first().cloned())
                .unwrap_or_default();
        }

        if self.selected != previous {
            debug!(from = %previous, to = %self.selected, "network interface selected");
            self.counts = [ScaleCounts::default(); 2];
            self.rescale = true;
        }
    }

    fn count_scale_samples(&mut self, sync: bool) {
        let Some(state) = self.interfaces.get(&self.selected) else {
            return;
        };
        for dir in [Dir::Download, Dir::Upload] {
            let i = dir.index();
            let speed = state.stats[i].speed;
            if sync && speed < state.stats[dir.other().index()].speed {
                continue;
            }
            let counts = &mut self.counts[i];
            if speed > self.graph_max[i] {
                counts.above += 1;
                counts.below = counts.below.saturating_sub(1);
            } else if self.graph_max[i] > MIN_GRAPH_MAX && speed < self.graph_max[i] / 10 {
                counts.below += 1;
                counts.above = counts.above.saturating_sub(1);
            }
        }
    }

    fn autoscale(&mut self, sync: bool) {
        let Some(state) = self.interfaces.get(&self.selected) else {
            return;
        };
        for dir in [Dir::Download, Dir::Upload] {
            let i = dir.index();
            let counts = self.counts[i];
            let multiplier = if self.rescale || counts.above >= SCALE_TRIGGER {
                1.3
            } else if counts.below >= SCALE_TRIGGER {
                3.0
            } else {
                continue;
            };
            let bandwidth = &state.bandwidth[i];
            let avg = if bandwidth.len() > SCALE_WINDOW {
                mean_of_newest(bandwidth, SCALE_WINDOW).unwrap_or(0)
            } else {
                state.stats[i].speed
            };
            self.graph_max[i] = ((avg as f64 * multiplier) as u64).max(MIN_GRAPH_MAX);
            self.counts[i] = ScaleCounts::default();
            debug!(?dir, graph_max = self.graph_max[i], "network graph rescaled");
            if sync {
                let other = dir.other().index();
                self.graph_max[other] = self.graph_max[i];
                self.counts[other] = ScaleCounts::default();
                break;
            }
        }
    }

    fn publish(&mut self) {
        let snap = &mut self.snapshot;
        snap.interfaces = self.order.clone();
        snap.interface = self.selected.clone();
        match self.interfaces.get(&self.selected) {
            Some(state) => {
                snap.connected = state.connected;
                snap.address = state.address.clone();
                snap.download = NetDirection {
                    stat: state.stats[0],
                    bandwidth: state.bandwidth[0].clone(),
                    graph_max: self.graph_max[0],
                };
                snap.upload = NetDirection {
                    stat: state.stats[1],
                    bandwidth: state.bandwidth[1].clone(),
                    graph_max: self.graph_max[1],
                };
            }
            None => {
                snap.connected = false;
                snap.address = None;
                snap.download = NetDirection::default();
                snap.upload = NetDirection::default();
            }
        }
    }
}
