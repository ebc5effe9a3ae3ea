//! Conversion of raw, monotonically increasing kernel counters into
//! per-interval deltas and rates.
//!
//! Kernel counters can jump backwards (32-bit wrap on older drivers, driver
//! reload, interface re-creation). A backward jump is folded into an
//! accumulated `rollover` so totals keep growing and rates never go negative.

use serde::Serialize;

/// Tracks one raw counter across samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counter {
    pub last: u64,
    pub rollover: u64,
    primed: bool,
}

impl Counter {
    /// Feed a new raw reading and return the wrap-adjusted delta since the
    /// previous reading. The first reading only primes the counter.
    pub fn advance(&mut self, raw: u64) -> u64 {
        if !self.primed {
            self.primed = true;
            self.last = raw;
            return 0;
        }

        if raw < self.last {
            self.rollover = self.rollover.saturating_add(self.last);
            self.last = 0;
        }
        if self.rollover.checked_add(raw).is_none() {
            self.rollover = 0;
            self.last = 0;
        }

        let delta = raw - self.last;
        self.last = raw;
        delta
    }

    /// Sum of everything observed since the counter was first primed,
    /// including amounts lost to wraparound.
    pub fn total(&self) -> u64 {
        self.rollover.saturating_add(self.last)
    }

    pub fn is_primed(&self) -> bool {
        self.primed
    }
}

/// Normalize a delta to a per-second rate.
///
/// A non-positive interval cannot produce a rate, so `previous` is returned
/// unchanged.
pub fn per_second(delta: u64, elapsed_secs: f64, previous: u64) -> u64 {
    if elapsed_secs <= 0.0 || !elapsed_secs.is_finite() {
        return previous;
    }
    (delta as f64 / elapsed_secs).round() as u64
}

/// Advance `counter` with `raw` and return the rate over `elapsed_secs`.
pub fn rate(counter: &mut Counter, raw: u64, elapsed_secs: f64, previous: u64) -> u64 {
    let delta = counter.advance(raw);
    per_second(delta, elapsed_secs, previous)
}

/// Per-direction network statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NetStat {
    /// Bytes per second over the last interval.
    pub speed: u64,
    /// Highest speed observed.
    pub top: u64,
    /// Bytes since counter reset, minus `offset`.
    pub total: u64,
    /// Subtracted from the running total after a user reset.
    pub offset: u64,
    counter: Counter,
}

impl NetStat {
    pub fn update(&mut self, raw: u64, elapsed_secs: f64) {
        self.speed = rate(&mut self.counter, raw, elapsed_secs, self.speed);
        if self.speed > self.top {
            self.top = self.speed;
        }
        let running = self.counter.total();
        if self.offset > running {
            self.offset = 0;
        }
        self.total = running - self.offset;
    }

    /// Restart `total` at zero, or undo a previous reset.
    pub fn toggle_reset(&mut self) {
        if self.offset == 0 {
            self.offset = self.counter.total();
        } else {
            self.offset = 0;
        }
        self.total = self.counter.total() - self.offset;
    }

    pub fn last(&self) -> u64 {
        self.counter.last
    }

    pub fn rollover(&self) -> u64 {
        self.counter.rollover
    }
}

/// Number of leading `/proc/stat` cpu fields that are real time buckets.
/// Fields from index 8 on (guest, guest_nice and future additions) are
/// already included in user/nice.
const COUNTED_FIELDS: usize = 8;

/// Aggregated busy/idle tick counts derived from one cpu line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTicks {
    pub totals: u64,
    pub idles: u64,
}

impl CpuTicks {
    /// `fields` follow the kernel order: user, nice, system, idle, iowait,
    /// irq, softirq, steal, guest, guest_nice.
    pub fn from_fields(fields: &[u64]) -> Self {
        let sum: u64 = fields.iter().sum();
        let already_counted: u64 = fields.iter().skip(COUNTED_FIELDS).sum();
        let idle = fields.get(3).copied().unwrap_or(0);
        let iowait = fields.get(4).copied().unwrap_or(0);
        CpuTicks {
            totals: sum.saturating_sub(already_counted),
            idles: idle + iowait,
        }
    }
}

/// Busy percentage between two tick readings, rounded and clamped to 0..=100.
///
/// Returns `None` when no ticks elapsed; the caller keeps its previous value.
pub fn busy_percent(prev: CpuTicks, cur: CpuTicks) -> Option<u64> {
    if cur.totals <= prev.totals {
        return None;
    }
    let d_total = cur.totals - prev.totals;
    let d_idle = cur.idles.saturating_sub(prev.idles);
    let busy = d_total.saturating_sub(d_idle);
    Some(percent_of(busy, d_total))
}

/// `100 * part / whole`, rounded and clamped to 0..=100.
pub fn percent_of(part: u64, whole: u64) -> u64 {
    let whole = whole.max(1);
    let pct = (part as f64 * 100.0 / whole as f64).round();
    pct.clamp(0.0, 100.0) as u64
}

/// Process cpu usage from tick deltas.
///
/// `multiplier` is the core count when usage is shown per core and 1
/// otherwise. The result is rounded to one decimal and clamped to
/// `0..=100 * cores`.
pub fn process_cpu_percent(proc_delta: u64, total_delta: u64, multiplier: u64, cores: u64) -> f64 {
    let total_delta = total_delta.max(1);
    let raw = (multiplier as f64 * 1000.0 * proc_delta as f64 / total_delta as f64).round() / 10.0;
    raw.clamp(0.0, 100.0 * cores.max(1) as f64)
}
