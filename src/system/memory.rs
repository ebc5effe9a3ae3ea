use std::collections::BTreeMap;
use std::path::Path;

use super::counter::{percent_of, rate};
use super::history::{graph_capacity, push_bounded, trim};
use super::platform::{DiskIo, RawDisk, RawMemory};
use super::snapshot::{DiskInfo, MemField, MemSnapshot};

#[derive(Debug, Clone)]
pub struct MemReducer {
    snapshot: MemSnapshot,
    capacity: usize,
}

impl MemReducer {
    pub fn new(graph_width: usize) -> Self {
        MemReducer {
            snapshot: MemSnapshot::default(),
            capacity: graph_capacity(graph_width),
        }
    }

    pub fn snapshot(&self) -> &MemSnapshot {
        &self.snapshot
    }

    /// Resize histories; shrinking drops the oldest samples.
    pub fn set_graph_width(&mut self, graph_width: usize) {
        self.capacity = graph_capacity(graph_width);
        for history in self.snapshot.percent.values_mut() {
            trim(history, self.capacity);
        }
        for disk in self.snapshot.disks.values_mut() {
            trim(&mut disk.io_read, self.capacity);
            trim(&mut disk.io_write, self.capacity);
            trim(&mut disk.io_activity, self.capacity);
        }
    }

    /// `elapsed_secs` is the wall time since the previous memory sample and
    /// drives disk rates.
    pub fn reduce(&mut self, raw: RawMemory, elapsed_secs: f64) -> &MemSnapshot {
        let snap = &mut self.snapshot;
        let available = raw.available.unwrap_or(raw.free + raw.cached);
        snap.total = raw.total;
        snap.available = available;
        snap.free = raw.free;
        snap.cached = raw.cached;
        snap.used = raw
            .total
            .saturating_sub(if available <= raw.total { available } else { raw.free });
        snap.swap_total = raw.swap_total;
        snap.swap_free = raw.swap_free.min(raw.swap_total);
        snap.swap_used = raw.swap_total - snap.swap_free;

        for field in MemField::ALL {
            let pct = match field {
                MemField::Used => percent_of(snap.used, snap.total),
                MemField::Available => percent_of(snap.available, snap.total),
                MemField::Cached => percent_of(snap.cached, snap.total),
                MemField::Free => percent_of(snap.free, snap.total),
                MemField::SwapUsed => percent_of(snap.swap_used, snap.swap_total),
                MemField::SwapFree => percent_of(snap.swap_free, snap.swap_total),
            };
            push_bounded(snap.percent.entry(field).or_default(), pct, self.capacity);
        }

        let mut previous = std::mem::take(&mut snap.disks);
        let mut disks = BTreeMap::new();
        let mut order: Vec<String> = Vec::with_capacity(raw.disks.len());
        for raw_disk in raw.disks {
            let mut info = previous.remove(&raw_disk.mountpoint).unwrap_or_default();
            let mountpoint = raw_disk.mountpoint.clone();
            update_disk(&mut info, raw_disk, elapsed_secs, self.capacity);
            if mountpoint == "/" {
                order.insert(0, mountpoint.clone());
            } else {
                order.push(mountpoint.clone());
            }
            disks.insert(mountpoint, info);
        }
        snap.disks = disks;
        snap.disks_order = order;
        &self.snapshot
    }
}

fn disk_name(mountpoint: &str, device: &Path) -> String {
    if mountpoint == "/" {
        return "root".to_string();
    }
    Path::new(mountpoint)
        .file_name()
        .or_else(|| device.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| mountpoint.to_string())
}

fn update_disk(info: &mut DiskInfo, raw: RawDisk, elapsed_secs: f64, capacity: usize) {
    info.name = disk_name(&raw.mountpoint, &raw.device);
    info.device = raw.device;
    info.fstype = raw.fstype;
    info.total = raw.total;
    info.used = raw.used;
    info.free = raw.free;
    info.used_percent = percent_of(raw.used, raw.total);
    info.free_percent = percent_of(raw.free, raw.total);

    let Some(DiskIo {
        read_bytes,
        write_bytes,
        io_ticks_ms,
    }) = raw.io
    else {
        return;
    };
    let last = |h: &std::collections::VecDeque<u64>| h.back().copied().unwrap_or(0);
    let read = rate(&mut info.read_counter, read_bytes, elapsed_secs, last(&info.io_read));
    let write = rate(&mut info.write_counter, write_bytes, elapsed_secs, last(&info.io_write));
    let busy_ms = info.ticks_counter.advance(io_ticks_ms);
    let activity = if elapsed_secs > 0.0 {
        (busy_ms as f64 / elapsed_secs / 10.0).round().clamp(0.0, 100.0) as u64
    } else {
        last(&info.io_activity)
    };
    push_bounded(&mut info.io_read, read, capacity);
    push_bounded(&mut info.io_write, write, capacity);
    push_bounded(&mut info.io_activity, activity, capacity);
}
