//! Collection scheduler.
//!
//! A single worker thread owns the [`MetricEngine`] and runs at most one pass
//! at a time. The foreground triggers passes with [`Runner::run`], cancels
//! with [`Runner::stop`] and reads results through the [`SnapshotStore`].

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use color_eyre::Result;
use color_eyre::eyre::{WrapErr, eyre};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error};

use super::engine::{MetricEngine, PassRequest, UserRequest};
use super::platform::PlatformSampler;
use super::snapshot::Snapshots;
use super::store::{SnapshotReader, SnapshotStore};
use crate::config::{BoxSelection, SharedConfig};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassState {
    Idle,
    Triggered,
    Running,
    Publishing,
    /// The last pass observed the stop flag and published nothing.
    Stopped,
}

impl PassState {
    pub fn is_settled(self) -> bool {
        matches!(self, PassState::Idle | PassState::Stopped)
    }
}

/// Flags and queues shared by the foreground and the worker.
#[derive(Debug)]
pub struct EngineContext {
    pub stopping: AtomicBool,
    pub active: AtomicBool,
    pub redraw: AtomicBool,
    pub thread_exception: AtomicBool,
    error: Mutex<Option<String>>,
    pub config: SharedConfig,
    requests: Mutex<Vec<UserRequest>>,
    in_flight: AtomicUsize,
    max_concurrent: AtomicUsize,
}

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl EngineContext {
    pub fn new(config: SharedConfig) -> Self {
        EngineContext {
            stopping: AtomicBool::new(false),
            active: AtomicBool::new(false),
            redraw: AtomicBool::new(false),
            thread_exception: AtomicBool::new(false),
            error: Mutex::new(None),
            config,
            requests: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_concurrent: AtomicUsize::new(0),
        }
    }

    pub fn push_request(&self, request: UserRequest) {
        guard(&self.requests).push(request);
    }

    fn take_requests(&self) -> Vec<UserRequest> {
        std::mem::take(&mut *guard(&self.requests))
    }

    fn set_exception(&self, message: String) {
        error!(%message, "collector pass failed");
        *guard(&self.error) = Some(message);
        self.thread_exception.store(true, Ordering::Release);
    }

    /// Message of the pass that failed, if any.
    pub fn error(&self) -> Option<String> {
        guard(&self.error).clone()
    }

    /// Whether a pass asked for a redraw since the last call.
    pub fn take_redraw(&self) -> bool {
        self.redraw.swap(false, Ordering::AcqRel)
    }

    /// Highest number of passes observed running at the same time.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent.load(Ordering::Acquire)
    }

    fn enter_pass(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.max_concurrent.fetch_max(now, Ordering::AcqRel);
        self.active.store(true, Ordering::Release);
    }

    fn leave_pass(&self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
        self.active.store(false, Ordering::Release);
    }
}

pub struct Runner {
    ctx: Arc<EngineContext>,
    store: Arc<SnapshotStore>,
    state: Arc<watch::Sender<PassState>>,
    jobs: Option<mpsc::Sender<PassRequest>>,
    worker: Option<JoinHandle<()>>,
}

impl Runner {
    pub fn new(sampler: Box<dyn PlatformSampler>, config: SharedConfig) -> Result<Self> {
        let graph_width = config.current().graph_width;
        let engine = MetricEngine::new(sampler, graph_width);
        let ctx = Arc::new(EngineContext::new(config));
        let store = Arc::new(SnapshotStore::new());
        let (state, _) = watch::channel(PassState::Idle);
        let state = Arc::new(state);
        let (jobs, rx) = mpsc::channel(1);

        let worker = {
            let ctx = Arc::clone(&ctx);
            let store = Arc::clone(&store);
            let state = Arc::clone(&state);
            std::thread::Builder::new()
                .name("pulsetop-collector".into())
                .spawn(move || worker_loop(engine, ctx, store, state, rx))
                .wrap_err("failed to spawn collector thread")?
        };

        Ok(Runner {
            ctx,
            store,
            state,
            jobs: Some(jobs),
            worker: Some(worker),
        })
    }

    pub fn context(&self) -> Arc<EngineContext> {
        Arc::clone(&self.ctx)
    }

    pub fn reader(&self) -> SnapshotReader {
        self.store.reader()
    }

    pub fn state(&self) -> PassState {
        *self.state.borrow()
    }

    pub fn request(&self, request: UserRequest) {
        self.ctx.push_request(request);
    }

    /// Schedule one pass. Waits for the previous pass to settle first, and
    /// fails if an earlier pass raised an error.
    pub async fn run(&self, boxes: BoxSelection, no_update: bool, force_redraw: bool) -> Result<()> {
        self.check_exception()?;
        self.wait_settled().await?;
        self.check_exception()?;

        let jobs = self
            .jobs
            .as_ref()
            .ok_or_else(|| eyre!("collector is shut down"))?;
        let options = self.ctx.config.lock();
        self.state.send_replace(PassState::Triggered);
        let job = PassRequest {
            boxes,
            no_update,
            force_redraw,
            options,
        };
        if jobs.send(job).await.is_err() {
            self.ctx.config.unlock();
            self.state.send_replace(PassState::Stopped);
            return Err(eyre!("collector worker exited"));
        }
        Ok(())
    }

    /// Cancel the pass in flight, if any, and wait for it to exit.
    pub async fn stop(&self) -> Result<()> {
        self.ctx.stopping.store(true, Ordering::Release);
        let settled = self.wait_settled().await;
        self.ctx.stopping.store(false, Ordering::Release);
        settled
    }

    /// Wait for the current pass and return what is published afterwards.
    pub async fn get_output(&self) -> Result<Arc<Snapshots>> {
        self.wait_settled().await?;
        self.check_exception()?;
        Ok(self.store.reader().latest())
    }

    /// Stop the worker and join its thread.
    pub async fn shutdown(mut self) -> Result<()> {
        self.ctx.stopping.store(true, Ordering::Release);
        self.jobs = None;
        if let Some(worker) = self.worker.take() {
            tokio::task::spawn_blocking(move || worker.join())
                .await
                .wrap_err("failed to join collector thread")?
                .map_err(|payload| eyre!("collector thread panicked: {}", panic_message(&*payload)))?;
        }
        debug!("collector shut down");
        Ok(())
    }

    async fn wait_settled(&self) -> Result<()> {
        let mut rx = self.state.subscribe();
        rx.wait_for(|s| s.is_settled())
            .await
            .map(|_| ())
            .wrap_err("collector state channel closed")
    }

    fn check_exception(&self) -> Result<()> {
        if self.ctx.thread_exception.load(Ordering::Acquire) {
            let message = self.ctx.error().unwrap_or_else(|| "unknown error".into());
            return Err(eyre!("collector stopped: {message}"));
        }
        Ok(())
    }
}

impl Drop for Runner {
    fn drop(&mut self) {
        // The worker exits once the job channel closes.
        self.ctx.stopping.store(true, Ordering::Release);
        self.jobs = None;
    }
}

fn worker_loop(
    mut engine: MetricEngine,
    ctx: Arc<EngineContext>,
    store: Arc<SnapshotStore>,
    state: Arc<watch::Sender<PassState>>,
    mut jobs: mpsc::Receiver<PassRequest>,
) {
    debug!("collector worker started");
    while let Some(job) = jobs.blocking_recv() {
        state.send_replace(PassState::Running);
        ctx.enter_pass();

        let requests = ctx.take_requests();
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            engine.pass(&job, requests, &ctx.stopping)
        }));
        let settled = match outcome {
            Ok(Ok(Some(snapshots))) => {
                state.send_replace(PassState::Publishing);
                let version = store.publish(snapshots);
                if job.force_redraw {
                    ctx.redraw.store(true, Ordering::Release);
                }
                debug!(version, "pass published");
                PassState::Idle
            }
            Ok(Ok(None)) => {
                debug!("pass stopped before publishing");
                PassState::Stopped
            }
            Ok(Err(err)) => {
                ctx.set_exception(format!("{err:#}"));
                PassState::Idle
            }
            Err(payload) => {
                ctx.set_exception(format!("panic in collector: {}", panic_message(&*payload)));
                PassState::Idle
            }
        };

        ctx.leave_pass();
        ctx.config.unlock();
        state.send_replace(settled);
    }
    debug!("collector worker exiting");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use color_eyre::eyre::eyre;

    use super::*;
    use crate::system::platform::{
        Capabilities, CpuSignals, DiskSelection, ProcessIo, ProcessQuery, RawCpu, RawInterface,
        RawMemory, RawProcessTable,
    };

    struct Fixed {
        fail: bool,
        panic: bool,
    }

    impl PlatformSampler for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities::default()
        }

        fn core_count(&self) -> usize {
            1
        }

        fn sample_cpu(&mut self, _signals: CpuSignals) -> Result<RawCpu> {
            if self.panic {
                panic!("sensor exploded");
            }
            if self.fail {
                return Err(eyre!("cannot read /proc/stat"));
            }
            Ok(RawCpu {
                total: vec![1, 0, 1, 8],
                ..Default::default()
            })
        }

        fn sample_memory(&mut self, _disks: Option<&DiskSelection>) -> Result<RawMemory> {
            Ok(RawMemory::default())
        }

        fn sample_network(&mut self) -> Result<Vec<RawInterface>> {
            Ok(vec![])
        }

        fn sample_processes(&mut self, _query: &ProcessQuery) -> Result<RawProcessTable> {
            Ok(RawProcessTable::default())
        }

        fn sample_process_io(&mut self, _pid: u32) -> Option<ProcessIo> {
            None
        }
    }

    fn runner(fail: bool, panic: bool) -> Runner {
        Runner::new(Box::new(Fixed { fail, panic }), SharedConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn run_publishes_and_redraws() {
        let runner = runner(false, false);
        runner.run(BoxSelection::ALL, false, true).await.unwrap();
        let out = runner.get_output().await.unwrap();
        assert_eq!(out.version, 1);
        assert!(runner.context().take_redraw());
        assert!(!runner.context().take_redraw());
        assert_eq!(runner.state(), PassState::Idle);
        runner.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn error_is_surfaced_and_blocks_further_runs() {
        let runner = runner(true, false);
        runner.run(BoxSelection::ALL, false, false).await.unwrap();
        let err = runner.get_output().await.unwrap_err();
        assert!(err.to_string().contains("cannot read /proc/stat"));
        assert!(runner.run(BoxSelection::ALL, false, false).await.is_err());
        runner.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn panic_in_pass_keeps_worker_alive() {
        let runner = runner(false, true);
        runner.run(BoxSelection::ALL, false, false).await.unwrap();
        let err = runner.get_output().await.unwrap_err();
        assert!(err.to_string().contains("sensor exploded"));
        assert!(!runner.context().config.is_locked());
        runner.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn config_writes_wait_for_the_pass() {
        let runner = runner(false, false);
        runner.run(BoxSelection::ALL, false, false).await.unwrap();
        runner.context().config.update(|o| o.filter = "sshd".into());
        runner.get_output().await.unwrap();
        assert_eq!(runner.context().config.current().filter, "sshd");
        runner.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn stop_when_idle_returns() {
        let runner = runner(false, false);
        runner.stop().await.unwrap();
        assert!(!runner.context().stopping.load(Ordering::Acquire));
        runner.run(BoxSelection::ALL, false, false).await.unwrap();
        assert_eq!(runner.get_output().await.unwrap().version, 1);
        runner.shutdown().await.unwrap();
    }
}
