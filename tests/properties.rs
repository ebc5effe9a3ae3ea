use std::collections::{HashMap, HashSet};

use proptest::prelude::*;
use pulsetop::system::counter::{
    Counter, CpuTicks, busy_percent, per_second, percent_of, process_cpu_percent,
};
use pulsetop::system::filter::ProcessFilter;
use pulsetop::system::process::{ProcessRecord, ProcessTable};
use pulsetop::system::tree::{ProcessTreeBuilder, SortKey, TreeOptions};

/// Random forest: each record's parent is an earlier pid, zero, or a pid
/// that does not exist.
fn make_records(spec: &[(u8, u64, u16, bool)]) -> Vec<ProcessRecord> {
    spec.iter()
        .enumerate()
        .map(|(i, &(parent, memory, cpu_tenths, collapsed))| {
            let pid = i as u32 + 1;
            let ppid = match parent as u32 % (pid + 1) {
                0 => 0,
                p if p == pid => 10_000 + pid,
                p => p,
            };
            let mut r = ProcessRecord::new(pid, ppid, format!("proc{pid}"));
            r.memory = memory;
            r.cpu_percent = f64::from(cpu_tenths) / 10.0;
            r.cpu_cumulative = r.cpu_percent / 2.0;
            r.collapsed = collapsed;
            r
        })
        .collect()
}

fn records_strategy() -> impl Strategy<Value = Vec<ProcessRecord>> {
    prop::collection::vec(
        (any::<u8>(), 0u64..1 << 30, 0u16..1000, prop::bool::weighted(0.2)),
        1..80,
    )
    .prop_map(|spec| make_records(&spec))
}

fn tree_options(aggregate: bool, filter: &str) -> TreeOptions {
    TreeOptions {
        sort_key: SortKey::Memory,
        reverse: false,
        filter: filter.to_string(),
        tree_mode: true,
        aggregate_children: aggregate,
    }
}

proptest! {
    #[test]
    fn percentages_stay_in_range(
        prev in prop::collection::vec(0u64..1_000_000, 4..10),
        step in prop::collection::vec(0u64..1_000_000, 10),
    ) {
        let cur: Vec<u64> = prev.iter().zip(&step).map(|(p, s)| p + s).collect();
        let before = CpuTicks::from_fields(&prev);
        let after = CpuTicks::from_fields(&cur);
        match busy_percent(before, after) {
            Some(pct) => prop_assert!(pct <= 100),
            None => prop_assert_eq!(after.totals, before.totals),
        }
        // Counters going backwards never produce a value.
        if after.totals > before.totals {
            prop_assert_eq!(busy_percent(after, before), None);
        }
    }

    #[test]
    fn identical_samples_give_no_percentage(
        fields in prop::collection::vec(0u64..1_000_000, 4..10),
    ) {
        let ticks = CpuTicks::from_fields(&fields);
        prop_assert_eq!(busy_percent(ticks, ticks), None);
    }

    #[test]
    fn percent_of_is_clamped(part in any::<u64>(), whole in any::<u64>()) {
        prop_assert!(percent_of(part, whole) <= 100);
    }

    #[test]
    fn process_cpu_is_bounded_by_cores(
        proc_delta in 0u64..1_000_000,
        total_delta in 0u64..1_000_000,
        cores in 1u64..64,
        per_core in any::<bool>(),
    ) {
        let multiplier = if per_core { cores } else { 1 };
        let pct = process_cpu_percent(proc_delta, total_delta, multiplier, cores);
        prop_assert!(pct >= 0.0);
        prop_assert!(pct <= 100.0 * cores as f64);
    }

    #[test]
    fn counter_wrap_keeps_rate_and_total_sane(
        readings in prop::collection::vec(any::<u32>(), 1..50),
        elapsed in 0.0f64..10.0,
    ) {
        let mut counter = Counter::default();
        let mut previous_total = 0;
        for raw in readings {
            let delta = counter.advance(u64::from(raw));
            prop_assert!(delta <= u64::from(u32::MAX));
            if elapsed == 0.0 {
                prop_assert_eq!(per_second(delta, elapsed, 7), 7);
            }
            prop_assert!(counter.total() >= previous_total);
            previous_total = counter.total();
        }
    }

    #[test]
    fn tree_indices_are_unique_and_dense(records in records_strategy(), aggregate in any::<bool>()) {
        let count = records.len();
        let mut table = ProcessTable::from_records(records);
        let rows = ProcessTreeBuilder::new(tree_options(aggregate, "")).build(&mut table);

        let indices: Vec<usize> = rows.iter().map(|r| r.tree_index).collect();
        prop_assert_eq!(indices, (0..rows.len()).collect::<Vec<_>>());
        let pids: HashSet<u32> = rows.iter().map(|r| r.pid).collect();
        prop_assert_eq!(pids.len(), rows.len());
        // Every record not emitted is marked with the sentinel.
        for record in table.records() {
            if !pids.contains(&record.pid) {
                prop_assert_eq!(record.tree_index, count);
            }
        }
    }

    #[test]
    fn collapsed_parent_outweighs_each_child(records in records_strategy()) {
        let original: HashMap<u32, ProcessRecord> =
            records.iter().map(|r| (r.pid, r.clone())).collect();
        let mut table = ProcessTable::from_records(records);
        let rows = ProcessTreeBuilder::new(tree_options(true, "")).build(&mut table);

        for row in rows.iter().filter(|r| r.collapsed) {
            for child in original.values().filter(|c| c.ppid == row.pid && c.pid != row.pid) {
                prop_assert!(row.memory >= child.memory);
                prop_assert!(row.cpu_percent + 1e-9 >= child.cpu_percent);
            }
        }
    }

    #[test]
    fn filtering_is_idempotent(records in records_strategy(), needle in "[0-9]{1,2}") {
        let filter = ProcessFilter::new(&needle);
        let once: Vec<ProcessRecord> =
            records.iter().filter(|r| filter.matches(r)).cloned().collect();
        let twice: Vec<u32> = once.iter().filter(|r| filter.matches(r)).map(|r| r.pid).collect();
        let once: Vec<u32> = once.iter().map(|r| r.pid).collect();
        prop_assert_eq!(&once, &twice);

        let mut table = ProcessTable::from_records(records);
        let builder = ProcessTreeBuilder::new(TreeOptions {
            filter: needle.clone(),
            ..Default::default()
        });
        let first: HashSet<u32> = builder.build(&mut table).iter().map(|r| r.pid).collect();
        let second: HashSet<u32> = builder.build(&mut table).iter().map(|r| r.pid).collect();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn tree_filtering_is_stable_and_lifts_matches(
        records in records_strategy(),
        needle in "[0-9]{1,2}",
        aggregate in any::<bool>(),
    ) {
        let filter = ProcessFilter::new(&needle);
        let mut table = ProcessTable::from_records(records);
        let builder = ProcessTreeBuilder::new(tree_options(aggregate, &needle));
        let shape = |rows: &[ProcessRecord]| -> Vec<(u32, usize)> {
            rows.iter().map(|r| (r.pid, r.depth)).collect()
        };

        let first = builder.build(&mut table);
        let second = builder.build(&mut table);
        prop_assert_eq!(shape(&first), shape(&second));
        // Only matches start a subtree; everything nested is a descendant of one.
        for row in &first {
            prop_assert!(row.depth > 0 || filter.matches(row));
        }
    }
}
