mod common;

use std::time::Duration;

use common::{Frame, ScriptedSampler, raw_process};
use pulsetop::config::{BoxSelection, CollectOptions, SharedConfig};
use pulsetop::system::collector::{PassState, Runner};
use pulsetop::system::engine::UserRequest;

fn frame(tick: u64) -> Frame {
    Frame {
        cpu: vec![tick * 10, 0, tick * 5, tick * 85],
        rx: tick * 1024,
        tx: tick * 512,
        processes: vec![raw_process(1, 0, 4096), raw_process(2, 1, 2048)],
        cpu_total_ticks: tick * 100,
    }
}

fn slow_runner(passes: u64, delay_ms: u64) -> Runner {
    let mut sampler = ScriptedSampler::new((1..=passes).map(frame).collect());
    sampler.delay = Some(Duration::from_millis(delay_ms));
    let config = SharedConfig::new(CollectOptions {
        tree: true,
        ..Default::default()
    });
    Runner::new(Box::new(sampler), config).unwrap()
}

#[tokio::test]
async fn rapid_triggers_never_overlap() {
    let runner = slow_runner(20, 5);
    for _ in 0..20 {
        runner.run(BoxSelection::ALL, false, false).await.unwrap();
    }
    let latest = runner.get_output().await.unwrap();

    assert_eq!(latest.version, 20);
    assert_eq!(runner.context().max_concurrent(), 1);
    assert!(runner.state().is_settled());
    runner.shutdown().await.unwrap();
}

#[tokio::test]
async fn concurrent_callers_are_serialized() {
    let runner = slow_runner(10, 2);
    tokio::join!(
        async {
            for _ in 0..5 {
                runner.run(BoxSelection::ALL, false, false).await.unwrap();
            }
        },
        async {
            for _ in 0..5 {
                runner.run(BoxSelection::ALL, true, false).await.unwrap();
            }
        }
    );
    let latest = runner.get_output().await.unwrap();

    assert_eq!(latest.version, 10);
    assert_eq!(runner.context().max_concurrent(), 1);
    runner.shutdown().await.unwrap();
}

#[tokio::test]
async fn reader_sees_each_published_pass() {
    let runner = slow_runner(3, 1);
    let mut reader = runner.reader();

    runner.run(BoxSelection::ALL, false, false).await.unwrap();
    let first = reader.changed().await.unwrap();
    assert_eq!(first.version, 1);

    runner.request(UserRequest::Collapse(1));
    runner.run(BoxSelection::ALL, false, false).await.unwrap();
    let second = reader.changed().await.unwrap();
    assert_eq!(second.version, 2);
    let pids: Vec<u32> = second.processes.iter().map(|p| p.pid).collect();
    assert_eq!(pids, vec![1]);

    runner.shutdown().await.unwrap();
}

#[tokio::test]
async fn stop_cancels_pass_in_flight() {
    let runner = slow_runner(2, 50);
    runner.run(BoxSelection::ALL, false, false).await.unwrap();
    runner.stop().await.unwrap();

    assert!(matches!(runner.state(), PassState::Idle | PassState::Stopped));
    // The engine keeps working after a cancelled pass.
    runner.run(BoxSelection::ALL, false, false).await.unwrap();
    let latest = runner.get_output().await.unwrap();
    assert!(latest.version >= 1);
    runner.shutdown().await.unwrap();
}
