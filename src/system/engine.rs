//! One collection pass: sample every selected domain, reduce the raw
//! counters and build the process view.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use tracing::{debug, warn};

use super::cpu::CpuReducer;
use super::detail::{DetailClock, DetailTracker};
use super::memory::MemReducer;
use super::net::NetReducer;
use super::platform::{CpuSignals, DiskSelection, PlatformSampler, ProcessQuery};
use super::process::{CpuAccounting, ProcessRecord, ProcessTable};
use super::snapshot::Snapshots;
use super::tree::ProcessTreeBuilder;
use crate::config::{BoxSelection, CollectOptions};

/// User actions that touch collector-owned state. Drained at the start of
/// each pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UserRequest {
    ToggleCollapse(u32),
    Collapse(u32),
    Expand(u32),
    ResetNetTotals,
    Rescale,
}

#[derive(Clone, Debug, Default)]
pub struct PassRequest {
    pub boxes: BoxSelection,
    /// Rebuild the process view from the current table without sampling.
    pub no_update: bool,
    pub force_redraw: bool,
    pub options: CollectOptions,
}

/// Tracks when a domain was last sampled.
#[derive(Clone, Copy, Debug, Default)]
struct SampleClock {
    last: Option<Instant>,
}

impl SampleClock {
    /// Seconds since the previous call, 0 on the first.
    fn lap(&mut self, now: Instant) -> f64 {
        let elapsed = self
            .last
            .map(|last| now.saturating_duration_since(last).as_secs_f64())
            .unwrap_or(0.0);
        self.last = Some(now);
        elapsed
    }
}

/// Owns the per-domain state between passes. Not shared: the collector
/// worker is its only user.
pub struct MetricEngine {
    sampler: Box<dyn PlatformSampler>,
    cpu: CpuReducer,
    mem: MemReducer,
    net: NetReducer,
    table: ProcessTable,
    tree: ProcessTreeBuilder,
    detail: DetailTracker,
    view: Vec<ProcessRecord>,
    mem_clock: SampleClock,
    net_clock: SampleClock,
    detail_clock: DetailClock,
    graph_width: usize,
    version: u64,
}

impl MetricEngine {
    pub fn new(sampler: Box<dyn PlatformSampler>, graph_width: usize) -> Self {
        debug!(backend = sampler.name(), cores = sampler.core_count(), "metric engine created");
        MetricEngine {
            sampler,
            cpu: CpuReducer::new(graph_width),
            mem: MemReducer::new(graph_width),
            net: NetReducer::new(graph_width),
            table: ProcessTable::new(),
            tree: ProcessTreeBuilder::default(),
            detail: DetailTracker::new(graph_width),
            view: Vec::new(),
            mem_clock: SampleClock::default(),
            net_clock: SampleClock::default(),
            detail_clock: DetailClock::default(),
            graph_width,
            version: 0,
        }
    }

    pub fn table(&self) -> &ProcessTable {
        &self.table
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn pass(
        &mut self,
        request: &PassRequest,
        user_requests: Vec<UserRequest>,
        stop: &AtomicBool,
    ) -> Result<Option<Snapshots>> {
        self.pass_at(request, user_requests, stop, Instant::now())
    }

    /// Run one pass as if it started at `now`. Returns `None` when `stop`
    /// was raised before the pass finished; nothing is published then.
    pub fn pass_at(
        &mut self,
        request: &PassRequest,
        user_requests: Vec<UserRequest>,
        stop: &AtomicBool,
        now: Instant,
    ) -> Result<Option<Snapshots>> {
        let _span = tracing::debug_span!("engine.pass", version = self.version + 1).entered();
        let options = &request.options;
        let boxes = request.boxes;

        for req in user_requests {
            self.apply_request(req);
        }
        if options.graph_width != self.graph_width {
            self.set_graph_width(options.graph_width);
        }
        self.tree.set_options(options.tree_options());

        if !request.no_update {
            if stopping(stop) {
                return Ok(None);
            }
            // Process cpu math depends on the tick totals, so cpu is always sampled.
            {
                let _cpu = tracing::debug_span!("engine.cpu").entered();
                let signals = CpuSignals {
                    frequency: options.show_freq,
                    temperature: options.check_temp,
                    battery: options.show_battery,
                };
                let raw = self.sampler.sample_cpu(signals).wrap_err("cpu sample failed")?;
                let cores = self.sampler.core_count();
                self.cpu.reduce(raw, cores);
            }

            if boxes.mem {
                if stopping(stop) {
                    return Ok(None);
                }
                let _mem = tracing::debug_span!("engine.mem").entered();
                let disks = options.show_disks.then(|| {
                    DiskSelection::parse(&options.disks_filter, options.use_fstab, options.only_physical)
                });
                let raw = self
                    .sampler
                    .sample_memory(disks.as_ref())
                    .wrap_err("memory sample failed")?;
                let elapsed = self.mem_clock.lap(now);
                self.mem.reduce(raw, elapsed);
            }

            if boxes.net {
                if stopping(stop) {
                    return Ok(None);
                }
                let _net = tracing::debug_span!("engine.net").entered();
                match self.sampler.sample_network() {
                    Ok(raw) => {
                        let elapsed = self.net_clock.lap(now);
                        self.net.reduce(raw, elapsed, &options.net);
                    }
                    Err(err) => warn!(error = %err, "network sample failed, keeping previous"),
                }
            }

            if boxes.proc {
                if stopping(stop) {
                    return Ok(None);
                }
                let _proc = tracing::debug_span!("engine.proc").entered();
                let query = ProcessQuery {
                    filter_kernel: options.filter_kernel,
                };
                let raw = self
                    .sampler
                    .sample_processes(&query)
                    .wrap_err("process sample failed")?;
                self.detail_clock = DetailClock {
                    uptime_secs: raw.uptime_secs,
                    clk_tck: raw.clk_tck,
                    total_memory: raw.total_memory,
                };
                let accounting = CpuAccounting {
                    per_core: options.per_core,
                    cores: self.sampler.core_count(),
                };
                self.table.refresh(raw, accounting);
            }
        }

        if stopping(stop) {
            return Ok(None);
        }
        if boxes.proc {
            self.view = self.tree.build(&mut self.table);
            let detailed = options.detailed_pid.filter(|_| options.show_detail);
            let io = match detailed {
                Some(pid) if !request.no_update => self.sampler.sample_process_io(pid),
                _ => None,
            };
            // Histories only advance on sampled passes.
            if !request.no_update || detailed.is_none() {
                self.detail.update(detailed, &self.table, io, self.detail_clock);
            }
        }

        self.version += 1;
        Ok(Some(self.snapshots()))
    }

    fn snapshots(&self) -> Snapshots {
        Snapshots {
            version: self.version,
            capabilities: self.sampler.capabilities(),
            cpu: self.cpu.snapshot().clone(),
            mem: self.mem.snapshot().clone(),
            net: self.net.snapshot().clone(),
            processes: self.view.clone(),
            process_count: self.table.len(),
            detail: self.detail.view().cloned(),
        }
    }

    fn apply_request(&mut self, request: UserRequest) {
        let known = match request {
            UserRequest::ToggleCollapse(pid) => self.table.toggle_collapsed(pid),
            UserRequest::Collapse(pid) => self.table.set_collapsed(pid, true),
            UserRequest::Expand(pid) => self.table.set_collapsed(pid, false),
            UserRequest::ResetNetTotals => {
                self.net.toggle_reset_totals();
                true
            }
            UserRequest::Rescale => {
                self.net.request_rescale();
                true
            }
        };
        if !known {
            debug!(?request, "request for unknown pid ignored");
        }
    }

    fn set_graph_width(&mut self, graph_width: usize) {
        self.graph_width = graph_width;
        self.cpu.set_graph_width(graph_width);
        self.mem.set_graph_width(graph_width);
        self.net.set_graph_width(graph_width);
        self.detail.set_graph_width(graph_width);
    }
}

fn stopping(stop: &AtomicBool) -> bool {
    stop.load(Ordering::Acquire)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use color_eyre::eyre::eyre;

    use super::*;
    use crate::system::platform::{
        Capabilities, ProcessIo, RawCpu, RawInterface, RawMemory, RawProcess, RawProcessTable,
    };

    /// Sampler that replays a script of cpu ticks and process lists.
    #[derive(Default)]
    struct Scripted {
        cpu: Vec<Vec<u64>>,
        procs: Vec<Vec<RawProcess>>,
        pass: usize,
        fail_net: bool,
        fail_proc: bool,
    }

    impl PlatformSampler for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities::default()
        }

        fn core_count(&self) -> usize {
            1
        }

        fn sample_cpu(&mut self, _signals: CpuSignals) -> Result<RawCpu> {
            let total = self.cpu.get(self.pass).cloned().unwrap_or_default();
            Ok(RawCpu {
                total,
                ..Default::default()
            })
        }

        fn sample_memory(&mut self, _disks: Option<&DiskSelection>) -> Result<RawMemory> {
            Ok(RawMemory {
                total: 1000,
                free: 500,
                available: Some(600),
                ..Default::default()
            })
        }

        fn sample_network(&mut self) -> Result<Vec<RawInterface>> {
            if self.fail_net {
                return Err(eyre!("no sysfs"));
            }
            Ok(vec![RawInterface {
                name: "eth0".into(),
                rx_bytes: 1000 * self.pass as u64,
                tx_bytes: 0,
                connected: true,
                address: None,
            }])
        }

        fn sample_processes(&mut self, _query: &ProcessQuery) -> Result<RawProcessTable> {
            if self.fail_proc {
                return Err(eyre!("cannot read /proc"));
            }
            let processes = self.procs.get(self.pass).cloned().unwrap_or_default();
            self.pass += 1;
            Ok(RawProcessTable {
                processes,
                cpu_total_ticks: 1000 * self.pass as u64,
                uptime_secs: 100.0,
                clk_tck: 100,
                total_memory: 1 << 20,
            })
        }

        fn sample_process_io(&mut self, _pid: u32) -> Option<ProcessIo> {
            None
        }
    }

    fn proc(pid: u32, ppid: u32) -> RawProcess {
        RawProcess {
            pid,
            ppid,
            name: format!("p{pid}"),
            command: format!("p{pid}"),
            user: "root".into(),
            state: 'S',
            threads: 1,
            memory: 100,
            ..Default::default()
        }
    }

    fn request() -> PassRequest {
        PassRequest {
            options: CollectOptions {
                tree: true,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn pass_publishes_every_domain() {
        let sampler = Scripted {
            cpu: vec![vec![100, 0, 50, 850], vec![200, 0, 70, 880]],
            procs: vec![vec![proc(1, 0), proc(2, 1)]; 2],
            ..Default::default()
        };
        let mut engine = MetricEngine::new(Box::new(sampler), 10);
        let stop = AtomicBool::new(false);
        let t0 = Instant::now();
        engine.pass_at(&request(), vec![], &stop, t0).unwrap();
        let snap = engine
            .pass_at(&request(), vec![], &stop, t0 + Duration::from_secs(1))
            .unwrap()
            .unwrap();
        assert_eq!(snap.version, 2);
        assert_eq!(snap.cpu.latest_total(), 80);
        assert_eq!(snap.mem.used, 400);
        assert_eq!(snap.net.interface, "eth0");
        assert_eq!(snap.net.download.stat.speed, 1000);
        let pids: Vec<u32> = snap.processes.iter().map(|p| p.pid).collect();
        assert_eq!(pids, vec![1, 2]);
        assert_eq!(snap.processes[1].depth, 1);
    }

    #[test]
    fn stop_flag_aborts_without_publishing() {
        let mut engine = MetricEngine::new(Box::new(Scripted::default()), 10);
        let stop = AtomicBool::new(true);
        assert!(engine.pass(&request(), vec![], &stop).unwrap().is_none());
        assert_eq!(engine.version(), 0);
    }

    #[test]
    fn process_failure_is_fatal_but_network_failure_is_not() {
        let sampler = Scripted {
            fail_net: true,
            ..Default::default()
        };
        let mut engine = MetricEngine::new(Box::new(sampler), 10);
        let stop = AtomicBool::new(false);
        assert!(engine.pass(&request(), vec![], &stop).unwrap().is_some());

        let sampler = Scripted {
            fail_proc: true,
            ..Default::default()
        };
        let mut engine = MetricEngine::new(Box::new(sampler), 10);
        let err = engine.pass(&request(), vec![], &stop).unwrap_err();
        assert!(format!("{err:#}").contains("process sample failed"));
        assert_eq!(engine.version(), 0);
    }

    #[test]
    fn collapse_requests_survive_refresh() {
        let sampler = Scripted {
            procs: vec![vec![proc(1, 0), proc(2, 1), proc(3, 2)]; 3],
            ..Default::default()
        };
        let mut engine = MetricEngine::new(Box::new(sampler), 10);
        let stop = AtomicBool::new(false);
        engine.pass(&request(), vec![], &stop).unwrap();
        let snap = engine
            .pass(&request(), vec![UserRequest::Collapse(2)], &stop)
            .unwrap()
            .unwrap();
        let pids: Vec<u32> = snap.processes.iter().map(|p| p.pid).collect();
        assert_eq!(pids, vec![1, 2]);
        assert!(engine.table().get(2).unwrap().collapsed);

        let snap = engine
            .pass(&request(), vec![UserRequest::ToggleCollapse(2)], &stop)
            .unwrap()
            .unwrap();
        assert_eq!(snap.processes.len(), 3);
    }

    #[test]
    fn no_update_rebuilds_view_only() {
        let sampler = Scripted {
            procs: vec![vec![proc(1, 0), proc(2, 1)]],
            ..Default::default()
        };
        let mut engine = MetricEngine::new(Box::new(sampler), 10);
        let stop = AtomicBool::new(false);
        engine.pass(&request(), vec![], &stop).unwrap();

        let mut flat = request();
        flat.no_update = true;
        flat.options.tree = false;
        flat.options.filter = "p2".into();
        let snap = engine.pass(&flat, vec![], &stop).unwrap().unwrap();
        assert_eq!(snap.process_count, 2);
        let shown: Vec<u32> = snap
            .processes
            .iter()
            .filter(|p| !p.filtered)
            .map(|p| p.pid)
            .collect();
        assert_eq!(shown, vec![2]);
    }
}
