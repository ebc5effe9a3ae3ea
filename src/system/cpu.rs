use std::collections::VecDeque;

use tracing::trace;

use super::counter::{CpuTicks, busy_percent, percent_of};
use super::history::{CORE_HISTORY, graph_capacity, push_bounded, trim};
use super::platform::{RawCpu, RawTemperature};
use super::snapshot::{CpuField, CpuSnapshot, TemperatureSnapshot};

const DEFAULT_CRITICAL_TEMP: f64 = 95.0;

/// Turns raw cpu tick samples into percentage histories.
#[derive(Debug, Clone)]
pub struct CpuReducer {
    snapshot: CpuSnapshot,
    prev_fields: Vec<u64>,
    prev_total: CpuTicks,
    prev_cores: Vec<CpuTicks>,
    capacity: usize,
}

impl CpuReducer {
    pub fn new(graph_width: usize) -> Self {
        CpuReducer {
            snapshot: CpuSnapshot::default(),
            prev_fields: Vec::new(),
            prev_total: CpuTicks::default(),
            prev_cores: Vec::new(),
            capacity: graph_capacity(graph_width),
        }
    }

    pub fn snapshot(&self) -> &CpuSnapshot {
        &self.snapshot
    }

    /// Resize histories; shrinking drops the oldest samples.
    pub fn set_graph_width(&mut self, graph_width: usize) {
        self.capacity = graph_capacity(graph_width);
        trim(&mut self.snapshot.total, self.capacity);
        for history in self.snapshot.fields.values_mut() {
            trim(history, self.capacity);
        }
        if let Some(temp) = self.snapshot.temperature.as_mut() {
            trim(&mut temp.package, self.capacity);
        }
    }

    pub fn reduce(&mut self, raw: RawCpu, core_count: usize) -> &CpuSnapshot {
        let cur = CpuTicks::from_fields(&raw.total);
        let total_delta = cur.totals.saturating_sub(self.prev_total.totals);
        let pct = busy_percent(self.prev_total, cur)
            .unwrap_or_else(|| latest(&self.snapshot.total));
        push_bounded(&mut self.snapshot.total, pct, self.capacity);

        self.prev_fields.resize(raw.total.len(), 0);
        for (field, (&now, prev)) in CpuField::ALL
            .iter()
            .zip(raw.total.iter().zip(self.prev_fields.iter_mut()))
        {
            let history = self.snapshot.fields.entry(*field).or_default();
            let pct = if total_delta == 0 {
                latest(history)
            } else {
                percent_of(now.saturating_sub(*prev), total_delta)
            };
            push_bounded(history, pct, self.capacity);
            *prev = now;
        }
        self.prev_total = cur;

        let cores = core_count.max(raw.cores.len());
        if self.snapshot.cores.len() < cores {
            self.snapshot.cores.resize_with(cores, VecDeque::new);
            self.prev_cores.resize(cores, CpuTicks::default());
        }
        for core in 0..self.snapshot.cores.len() {
            let pct = match raw.cores.get(core).and_then(Option::as_ref) {
                Some(fields) => {
                    let ticks = CpuTicks::from_fields(fields);
                    let pct = busy_percent(self.prev_cores[core], ticks)
                        .unwrap_or_else(|| latest(&self.snapshot.cores[core]));
                    self.prev_cores[core] = ticks;
                    pct
                }
                None => 0,
            };
            push_bounded(&mut self.snapshot.cores[core], pct, CORE_HISTORY);
        }

        self.snapshot.load_avg = raw.load_avg;
        self.snapshot.frequency = raw.frequency_mhz.map(format_frequency);
        self.snapshot.battery = raw.battery;
        match raw.temperature {
            Some(temp) => self.push_temperature(temp),
            None => self.snapshot.temperature = None,
        }

        trace!(total = self.snapshot.latest_total(), "cpu reduced");
        &self.snapshot
    }

    fn push_temperature(&mut self, raw: RawTemperature) {
        let capacity = self.capacity;
        let temp = self
            .snapshot
            .temperature
            .get_or_insert_with(TemperatureSnapshot::default);
        push_bounded(&mut temp.package, raw.package.round().max(0.0) as u64, capacity);
        if temp.cores.len() < raw.cores.len() {
            temp.cores.resize_with(raw.cores.len(), VecDeque::new);
        }
        for (history, value) in temp.cores.iter_mut().zip(raw.cores) {
            push_bounded(history, value.round().max(0.0) as u64, CORE_HISTORY);
        }
        temp.critical = raw.critical.unwrap_or(DEFAULT_CRITICAL_TEMP).round() as u64;
    }
}

/// Newest value of a history, 0 when it is still empty.
fn latest(history: &VecDeque<u64>) -> u64 {
    history.back().copied().unwrap_or(0)
}

fn format_frequency(mhz: f64) -> String {
    if mhz >= 1000.0 {
        format!("{:.1} GHz", mhz / 1000.0)
    } else {
        format!("{} MHz", mhz.round() as u64)
    }
}
