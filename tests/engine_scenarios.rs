mod common;

use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

use common::{Frame, ScriptedSampler, raw_process};
use pulsetop::config::CollectOptions;
use pulsetop::system::counter::Counter;
use pulsetop::system::engine::{MetricEngine, PassRequest, UserRequest};
use pulsetop::system::process::{ProcessRecord, ProcessTable};
use pulsetop::system::snapshot::MemField;
use pulsetop::system::tree::{ProcessTreeBuilder, SortKey, TreeOptions};

fn request(options: CollectOptions) -> PassRequest {
    PassRequest {
        options,
        ..Default::default()
    }
}

#[test]
fn cpu_total_percent_from_two_samples() {
    let frames = vec![
        Frame {
            cpu: vec![100, 0, 50, 850],
            ..Default::default()
        },
        Frame {
            cpu: vec![200, 0, 70, 880],
            ..Default::default()
        },
    ];
    let mut engine = MetricEngine::new(Box::new(ScriptedSampler::new(frames)), 40);
    let stop = AtomicBool::new(false);
    let req = request(CollectOptions::default());

    engine.pass(&req, vec![], &stop).unwrap();
    let snap = engine.pass(&req, vec![], &stop).unwrap().unwrap();
    // 150 ticks elapsed, 30 of them idle.
    assert_eq!(snap.cpu.latest_total(), 80);
    assert_eq!(snap.cpu.latest_core(0), Some(80));
}

#[test]
fn cpu_percent_with_small_busy_share() {
    let frames = vec![
        Frame {
            cpu: vec![100, 0, 50, 850],
            ..Default::default()
        },
        Frame {
            cpu: vec![150, 0, 70, 880],
            ..Default::default()
        },
    ];
    let mut engine = MetricEngine::new(Box::new(ScriptedSampler::new(frames)), 40);
    let stop = AtomicBool::new(false);
    let req = request(CollectOptions::default());

    engine.pass(&req, vec![], &stop).unwrap();
    let snap = engine.pass(&req, vec![], &stop).unwrap().unwrap();
    // 100 ticks elapsed, 30 of them idle.
    assert_eq!(snap.cpu.latest_total(), 70);
}

#[test]
fn idle_interval_keeps_previous_cpu_percentage() {
    let frame = |cpu: Vec<u64>| Frame {
        cpu,
        ..Default::default()
    };
    let frames = vec![
        frame(vec![100, 0, 50, 850]),
        frame(vec![110, 0, 50, 940]),
        frame(vec![110, 0, 50, 940]),
    ];
    let mut engine = MetricEngine::new(Box::new(ScriptedSampler::new(frames)), 40);
    let stop = AtomicBool::new(false);
    let req = request(CollectOptions::default());

    engine.pass(&req, vec![], &stop).unwrap();
    let second = engine.pass(&req, vec![], &stop).unwrap().unwrap();
    let third = engine.pass(&req, vec![], &stop).unwrap().unwrap();

    assert_eq!(second.cpu.latest_total(), 10);
    assert_eq!(third.cpu.latest_total(), 10);
    assert_eq!(third.cpu.latest_core(0), Some(10));
}

#[test]
fn narrowing_graph_width_trims_every_history() {
    let frames: Vec<Frame> = (1..=25u64)
        .map(|i| Frame {
            cpu: vec![i * 10, 0, 0, i * 10],
            rx: i * 1_000,
            tx: i * 100,
            ..Default::default()
        })
        .collect();
    let mut engine = MetricEngine::new(Box::new(ScriptedSampler::new(frames)), 40);
    let stop = AtomicBool::new(false);
    let wide = request(CollectOptions {
        graph_width: 40,
        ..Default::default()
    });
    let t0 = Instant::now();
    for i in 0..25u64 {
        engine
            .pass_at(&wide, vec![], &stop, t0 + Duration::from_secs(i))
            .unwrap();
    }

    let narrow = PassRequest {
        no_update: true,
        ..request(CollectOptions {
            graph_width: 5,
            ..Default::default()
        })
    };
    let snap = engine.pass(&narrow, vec![], &stop).unwrap().unwrap();

    assert_eq!(snap.cpu.total.len(), 10);
    assert_eq!(snap.mem.percent[&MemField::Used].len(), 10);
    assert_eq!(snap.net.download.bandwidth.len(), 10);
    assert_eq!(snap.net.upload.bandwidth.len(), 10);
}

#[test]
fn network_counter_wrap_reports_small_rate() {
    let frames = vec![
        Frame {
            cpu: vec![1, 0, 0, 1],
            rx: 4_294_967_290,
            ..Default::default()
        },
        Frame {
            cpu: vec![2, 0, 0, 2],
            rx: 40,
            ..Default::default()
        },
    ];
    let mut engine = MetricEngine::new(Box::new(ScriptedSampler::new(frames)), 40);
    let stop = AtomicBool::new(false);
    let req = request(CollectOptions::default());
    let t0 = Instant::now();

    let first = engine.pass_at(&req, vec![], &stop, t0).unwrap().unwrap();
    let before = first.net.download.stat.total;
    let snap = engine
        .pass_at(&req, vec![], &stop, t0 + Duration::from_secs(1))
        .unwrap()
        .unwrap();
    let download = &snap.net.download.stat;
    assert_eq!(download.speed, 40);
    assert!(download.total >= before);
    assert_eq!(download.rollover(), 4_294_967_290);
}

#[test]
fn counter_wrap_folds_into_rollover() {
    let mut counter = Counter::default();
    assert_eq!(counter.advance(4_294_967_290), 0);
    assert_eq!(counter.advance(40), 40);
    assert_eq!(counter.total(), 4_294_967_330);
}

#[test]
fn collapsed_subtree_folds_into_parent() {
    let processes = vec![
        raw_process(1, 0, 1000),
        raw_process(2, 1, 200),
        raw_process(3, 1, 300),
        raw_process(4, 3, 400),
    ];
    let frame = Frame {
        cpu: vec![1, 0, 0, 1],
        processes,
        cpu_total_ticks: 1000,
        ..Default::default()
    };
    let mut engine =
        MetricEngine::new(Box::new(ScriptedSampler::new(vec![frame.clone(), frame])), 40);
    let stop = AtomicBool::new(false);
    let req = request(CollectOptions {
        tree: true,
        aggregate: true,
        sort_key: SortKey::Pid,
        reversed: true,
        ..Default::default()
    });

    let first = engine.pass(&req, vec![], &stop).unwrap().unwrap();
    let pids: Vec<u32> = first.processes.iter().map(|p| p.pid).collect();
    assert_eq!(pids, vec![1, 2, 3, 4]);

    let snap = engine
        .pass(&req, vec![UserRequest::Collapse(3)], &stop)
        .unwrap()
        .unwrap();
    let pids: Vec<u32> = snap.processes.iter().map(|p| p.pid).collect();
    assert_eq!(pids, vec![1, 2, 3]);
    let three = &snap.processes[2];
    assert!(three.collapsed);
    assert_eq!(three.memory, 300 + 400);
    assert_eq!(snap.process_count, 4);
    // The table keeps the unaggregated figure.
    assert_eq!(engine.table().get(3).unwrap().memory, 300);
}

#[test]
fn lazy_cpu_sort_promotes_spike() {
    let cpu = [5.0, 5.0, 5.0, 5.0, 5.0, 5.0, 40.0, 2.0, 2.0];
    let records: Vec<ProcessRecord> = cpu
        .iter()
        .enumerate()
        .map(|(i, &pct)| {
            let mut r = ProcessRecord::new(i as u32 + 1, 0, format!("proc{i}"));
            // Lifetime usage keeps the listed order before promotion.
            r.cpu_cumulative = (cpu.len() - i) as f64;
            r.cpu_percent = pct;
            r
        })
        .collect();
    let mut table = ProcessTable::from_records(records);
    let builder = ProcessTreeBuilder::new(TreeOptions {
        sort_key: SortKey::CpuLazy,
        ..Default::default()
    });
    let rows = builder.build(&mut table);
    let spike = rows.iter().position(|r| r.pid == 7).unwrap();
    assert!(spike < 10);
    assert_eq!(spike, 0);
    assert_eq!(rows[1].pid, 1);
}

#[test]
fn rebuild_without_sampling_keeps_version_moving() {
    let frame = Frame {
        cpu: vec![1, 0, 0, 1],
        processes: vec![raw_process(1, 0, 10), raw_process(2, 1, 20)],
        cpu_total_ticks: 100,
        ..Default::default()
    };
    let mut engine = MetricEngine::new(Box::new(ScriptedSampler::new(vec![frame])), 40);
    let stop = AtomicBool::new(false);
    let mut req = request(CollectOptions::default());
    engine.pass(&req, vec![], &stop).unwrap();

    req.no_update = true;
    req.options.filter = "proc2".into();
    let snap = engine.pass(&req, vec![], &stop).unwrap().unwrap();
    assert_eq!(snap.version, 2);
    let pids: Vec<u32> = snap.processes.iter().map(|p| p.pid).collect();
    assert_eq!(pids, vec![2]);
}

#[test]
fn process_failure_is_fatal() {
    let mut sampler = ScriptedSampler::new(vec![Frame::default()]);
    sampler.fail_processes = true;
    let mut engine = MetricEngine::new(Box::new(sampler), 40);
    let stop = AtomicBool::new(false);
    let err = engine
        .pass(&request(CollectOptions::default()), vec![], &stop)
        .unwrap_err();
    assert!(format!("{err:#}").contains("process sample failed"));
}
