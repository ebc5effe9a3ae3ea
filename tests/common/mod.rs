#![allow(dead_code)]

use std::collections::VecDeque;
use std::time::Duration;

use color_eyre::Result;
use color_eyre::eyre::eyre;
use pulsetop::system::platform::{
    Capabilities, CpuSignals, DiskSelection, PlatformSampler, ProcessIo, ProcessQuery, RawCpu,
    RawInterface, RawMemory, RawProcess, RawProcessTable,
};

/// One scripted sample per domain. The last entry repeats once the
/// script runs out.
#[derive(Clone, Debug, Default)]
pub struct Frame {
    pub cpu: Vec<u64>,
    pub rx: u64,
    pub tx: u64,
    pub processes: Vec<RawProcess>,
    pub cpu_total_ticks: u64,
}

#[derive(Debug, Default)]
pub struct ScriptedSampler {
    frames: VecDeque<Frame>,
    current: Frame,
    pub delay: Option<Duration>,
    pub fail_processes: bool,
}

impl ScriptedSampler {
    pub fn new(frames: Vec<Frame>) -> Self {
        ScriptedSampler {
            frames: frames.into(),
            ..Default::default()
        }
    }

    fn advance(&mut self) {
        if let Some(next) = self.frames.pop_front() {
            self.current = next;
        }
    }
}

impl PlatformSampler for ScriptedSampler {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    fn core_count(&self) -> usize {
        1
    }

    // cpu is sampled first in every pass, so it moves the script along.
    fn sample_cpu(&mut self, _signals: CpuSignals) -> Result<RawCpu> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.advance();
        Ok(RawCpu {
            total: self.current.cpu.clone(),
            cores: vec![Some(self.current.cpu.clone())],
            ..Default::default()
        })
    }

    fn sample_memory(&mut self, _disks: Option<&DiskSelection>) -> Result<RawMemory> {
        Ok(RawMemory {
            total: 8 << 30,
            free: 2 << 30,
            available: Some(4 << 30),
            cached: 1 << 30,
            ..Default::default()
        })
    }

    fn sample_network(&mut self) -> Result<Vec<RawInterface>> {
        Ok(vec![RawInterface {
            name: "eth0".into(),
            rx_bytes: self.current.rx,
            tx_bytes: self.current.tx,
            connected: true,
            address: Some("10.0.0.2".into()),
        }])
    }

    fn sample_processes(&mut self, _query: &ProcessQuery) -> Result<RawProcessTable> {
        if self.fail_processes {
            return Err(eyre!("permission denied reading /proc"));
        }
        Ok(RawProcessTable {
            processes: self.current.processes.clone(),
            cpu_total_ticks: self.current.cpu_total_ticks,
            uptime_secs: 1000.0,
            clk_tck: 100,
            total_memory: 8 << 30,
        })
    }

    fn sample_process_io(&mut self, _pid: u32) -> Option<ProcessIo> {
        None
    }
}

pub fn raw_process(pid: u32, ppid: u32, memory: u64) -> RawProcess {
    RawProcess {
        pid,
        ppid,
        name: format!("proc{pid}"),
        command: format!("/usr/bin/proc{pid}"),
        user: "root".into(),
        state: 'S',
        threads: 1,
        memory,
        ..Default::default()
    }
}
