use std::collections::VecDeque;

use serde::Serialize;

use super::history::{graph_capacity, push_bounded, trim};
use super::platform::ProcessIo;
use super::process::{ProcessRecord, ProcessState, ProcessTable};
use crate::format::{format_bytes, sec_to_dhms};

/// Deep-dive record for the single process the user is inspecting.
#[derive(Clone, Debug, Default, Serialize)]
pub struct DetailView {
    pub pid: u32,
    pub entry: ProcessRecord,
    pub elapsed: String,
    pub parent: String,
    pub status: String,
    pub memory: String,
    pub io_read: String,
    pub io_write: String,
    pub cpu_percent: VecDeque<u64>,
    pub mem_bytes: VecDeque<u64>,
    /// Ceiling for the memory graph.
    pub first_mem: Option<u64>,
}

/// Inputs that come from the process sample rather than the table.
#[derive(Clone, Copy, Debug, Default)]
pub struct DetailClock {
    pub uptime_secs: f64,
    pub clk_tck: u64,
    pub total_memory: u64,
}

#[derive(Clone, Debug)]
pub struct DetailTracker {
    view: Option<DetailView>,
    capacity: usize,
}

impl DetailTracker {
    pub fn new(graph_width: usize) -> Self {
        DetailTracker {
            view: None,
            capacity: graph_capacity(graph_width),
        }
    }

    pub fn view(&self) -> Option<&DetailView> {
        self.view.as_ref()
    }

    pub fn set_graph_width(&mut self, graph_width: usize) {
        self.capacity = graph_capacity(graph_width);
        if let Some(view) = self.view.as_mut() {
            trim(&mut view.cpu_percent, self.capacity);
            trim(&mut view.mem_bytes, self.capacity);
        }
    }

    /// Track `pid`, resetting all history when it differs from the pid
    /// tracked so far. `None` clears the view.
    pub fn update(
        &mut self,
        pid: Option<u32>,
        table: &ProcessTable,
        io: Option<ProcessIo>,
        clock: DetailClock,
    ) -> Option<&DetailView> {
        let Some(pid) = pid else {
            self.view = None;
            return None;
        };
        if self.view.as_ref().is_none_or(|v| v.pid != pid) {
            self.view = Some(DetailView {
                pid,
                ..Default::default()
            });
        }
        let capacity = self.capacity;
        let view = self.view.as_mut()?;

        let Some(record) = table.get(pid) else {
            view.status = ProcessState::Dead.label().to_string();
            view.entry.state = 'X';
            return self.view.as_ref();
        };
        view.entry = record.clone();
        view.status = record.process_state().label().to_string();
        view.parent = table
            .get(record.ppid)
            .map(|p| p.name.clone())
            .unwrap_or_default();

        let start_secs = record.start_ticks / clock.clk_tck.max(1);
        view.elapsed = sec_to_dhms((clock.uptime_secs as u64).saturating_sub(start_secs));

        push_bounded(
            &mut view.cpu_percent,
            record.cpu_percent.round().max(0.0) as u64,
            capacity,
        );
        push_bounded(&mut view.mem_bytes, record.memory, capacity);
        view.memory = format_bytes(record.memory);

        let mem = record.memory;
        let rescale = match view.first_mem {
            None => true,
            Some(first) => first < mem / 2 || first > mem.saturating_mul(4),
        };
        if rescale {
            let ceiling = mem.saturating_mul(2);
            view.first_mem = Some(if clock.total_memory > 0 {
                ceiling.min(clock.total_memory)
            } else {
                ceiling
            });
        }

        if let Some(io) = io {
            view.io_read = format_bytes(io.read_bytes);
            view.io_write = format_bytes(io.write_bytes);
        }
        self.view.as_ref()
    }
}
