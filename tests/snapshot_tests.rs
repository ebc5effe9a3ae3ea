use insta::assert_snapshot;
use pulsetop::system::process::{ProcessRecord, ProcessTable};
use pulsetop::system::tree::{ProcessTreeBuilder, SortKey, TreeOptions};
use pulsetop::ui::process_table::tree_prefix;

fn mock_process(pid: u32, ppid: u32, name: &str, memory_mib: u64) -> ProcessRecord {
    let mut record = ProcessRecord::new(pid, ppid, name);
    record.command = format!("{name} --daemon");
    record.user = "tester".to_string();
    record.memory = memory_mib << 20;
    record
}

fn mock_table() -> ProcessTable {
    ProcessTable::from_records(vec![
        mock_process(1, 0, "init", 120),
        mock_process(2, 1, "worker_a", 80),
        mock_process(3, 1, "worker_b", 64),
        mock_process(4, 2, "worker_child", 32),
        // orphan: parent pid 4040 does not exist
        mock_process(8, 4040, "orphan", 12),
        // independent root
        mock_process(10, 0, "service", 48),
    ])
}

fn options(aggregate: bool, filter: &str) -> TreeOptions {
    TreeOptions {
        sort_key: SortKey::Memory,
        reverse: false,
        filter: filter.to_string(),
        tree_mode: true,
        aggregate_children: aggregate,
    }
}

fn render(rows: &[ProcessRecord]) -> String {
    rows.iter()
        .map(|r| format!("{:<4}{}{} {}", r.pid, tree_prefix(r), r.name, r.memory >> 20))
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn tree_view_orders_by_memory() {
    let mut table = mock_table();
    let rows = ProcessTreeBuilder::new(options(false, "")).build(&mut table);

    assert_snapshot!(render(&rows), @r"
    1   [-]init 120
    2   ├─[-]worker_a 80
    4     └─worker_child 32
    3   └─worker_b 64
    10  service 48
    8   orphan 12
    ");
}

#[test]
fn collapsed_worker_carries_its_child() {
    let mut table = mock_table();
    table.set_collapsed(2, true);
    let rows = ProcessTreeBuilder::new(options(true, "")).build(&mut table);

    assert_snapshot!(render(&rows), @r"
    1   [-]init 120
    2   ├─[+]worker_a 112
    3   └─worker_b 64
    10  service 48
    8   orphan 12
    ");
}

#[test]
fn filter_lifts_matches_to_top_level() {
    let mut table = mock_table();
    let rows = ProcessTreeBuilder::new(options(false, "worker")).build(&mut table);

    assert_snapshot!(render(&rows), @r"
    2   [-]worker_a 80
    4   └─worker_child 32
    3   worker_b 64
    ");
}

#[test]
fn tree_builder_invariants_hold_with_orphans() {
    let mut table = mock_table();
    let rows = ProcessTreeBuilder::new(options(true, "")).build(&mut table);

    assert_eq!(rows.len(), table.len());
    for (i, row) in rows.iter().enumerate() {
        assert_eq!(row.tree_index, i);
        assert!(!row.filtered);
    }
    let orphan = rows.iter().find(|r| r.pid == 8).unwrap();
    assert_eq!(orphan.depth, 0);
}
