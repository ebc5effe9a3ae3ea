//! Ordered process views: flat sorted lists and depth-annotated trees.
//!
//! The builder borrows the process table and only writes the tree fields
//! (`depth`, `tree_index`, `filtered`, `has_children`, `is_last_sibling`).
//! Aggregated figures for collapsed subtrees are carried on the returned
//! copies, never written back.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use super::filter::ProcessFilter;
use super::process::{ProcessRecord, ProcessTable};

/// Column used to order the process list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub enum SortKey {
    Pid,
    Name,
    Command,
    Threads,
    User,
    Memory,
    /// Instantaneous cpu usage.
    CpuDirect,
    /// Lifetime cpu usage, with recent spikes promoted to the top.
    #[default]
    CpuLazy,
}

impl SortKey {
    pub const ALL: [SortKey; 8] = [
        SortKey::Pid,
        SortKey::Name,
        SortKey::Command,
        SortKey::Threads,
        SortKey::User,
        SortKey::Memory,
        SortKey::CpuDirect,
        SortKey::CpuLazy,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::Pid => "pid",
            SortKey::Name => "name",
            SortKey::Command => "command",
            SortKey::Threads => "threads",
            SortKey::User => "user",
            SortKey::Memory => "memory",
            SortKey::CpuDirect => "cpu direct",
            SortKey::CpuLazy => "cpu lazy",
        }
    }

    pub fn next(self) -> SortKey {
        let pos = Self::ALL.iter().position(|k| *k == self).unwrap_or(0);
        Self::ALL[(pos + 1) % Self::ALL.len()]
    }

    pub fn prev(self) -> SortKey {
        let pos = Self::ALL.iter().position(|k| *k == self).unwrap_or(0);
        Self::ALL[(pos + Self::ALL.len() - 1) % Self::ALL.len()]
    }

    /// Keys that are re-applied among siblings in tree mode.
    fn is_numeric(self) -> bool {
        matches!(
            self,
            SortKey::Threads | SortKey::Memory | SortKey::CpuDirect | SortKey::CpuLazy
        )
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace(['_', '-'], " ");
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == wanted)
            .ok_or_else(|| format!("unknown sort key: {s}"))
    }
}

fn compare(a: &ProcessRecord, b: &ProcessRecord, key: SortKey) -> Ordering {
    match key {
        SortKey::Pid => a.pid.cmp(&b.pid),
        SortKey::Name => a.name.cmp(&b.name),
        SortKey::Command => a.command.cmp(&b.command),
        SortKey::Threads => a.threads.cmp(&b.threads),
        SortKey::User => a.user.cmp(&b.user),
        SortKey::Memory => a.memory.cmp(&b.memory),
        SortKey::CpuDirect => a.cpu_percent.total_cmp(&b.cpu_percent),
        SortKey::CpuLazy => a.cpu_cumulative.total_cmp(&b.cpu_cumulative),
    }
}

/// Descending unless `reverse`.
fn directed(ord: Ordering, reverse: bool) -> Ordering {
    if reverse { ord } else { ord.reverse() }
}

/// Moves entries with a cpu spike towards the front of a list sorted by
/// lifetime cpu, so the top of the list only changes on real spikes.
fn promote_cpu_spikes<T>(items: &mut [T], cpu: impl Fn(&T) -> f64) {
    let mut max = 10.0;
    let mut target = 30.0;
    let mut offset = 0;
    let mut rotations = 0;
    for i in 0..items.len() {
        let value = cpu(&items[i]);
        if i <= 5 && value > max {
            max = value;
        } else if i == 6 {
            target = if max > 30.0 { max } else { 10.0 };
        }
        if i == offset && value > 30.0 {
            offset += 1;
        } else if value > target {
            items[offset..=i].rotate_right(1);
            rotations += 1;
            if rotations > 10 {
                break;
            }
        }
    }
}

/// Stable sort of a flat record list.
pub fn sort_records(records: &mut [ProcessRecord], key: SortKey, reverse: bool, tree: bool) {
    records.sort_by(|a, b| directed(compare(a, b, key), reverse));
    if key == SortKey::CpuLazy && !reverse && !tree {
        promote_cpu_spikes(records, |r| r.cpu_percent);
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TreeOptions {
    pub sort_key: SortKey,
    pub reverse: bool,
    pub filter: String,
    pub tree_mode: bool,
    pub aggregate_children: bool,
}

#[derive(Clone, Copy, Debug, Default)]
struct Totals {
    cpu_percent: f64,
    cpu_cumulative: f64,
    memory: u64,
    threads: u64,
}

impl Totals {
    fn of(record: &ProcessRecord) -> Self {
        Totals {
            cpu_percent: record.cpu_percent,
            cpu_cumulative: record.cpu_cumulative,
            memory: record.memory,
            threads: record.threads,
        }
    }

    fn add(&mut self, other: Totals) {
        self.cpu_percent += other.cpu_percent;
        self.cpu_cumulative += other.cpu_cumulative;
        self.memory += other.memory;
        self.threads += other.threads;
    }

    fn compare(&self, other: &Totals, key: SortKey) -> Ordering {
        match key {
            SortKey::Threads => self.threads.cmp(&other.threads),
            SortKey::Memory => self.memory.cmp(&other.memory),
            SortKey::CpuDirect => self.cpu_percent.total_cmp(&other.cpu_percent),
            SortKey::CpuLazy => self.cpu_cumulative.total_cmp(&other.cpu_cumulative),
            _ => Ordering::Equal,
        }
    }
}

struct Node {
    slot: usize,
    children: Vec<Node>,
}

/// Per-build scratch state, indexed by table slot.
struct TreeGen<'a> {
    records: &'a [ProcessRecord],
    children: HashMap<u32, Vec<usize>>,
    filter: &'a ProcessFilter,
    aggregate: bool,
    visited: Vec<bool>,
    depth: Vec<usize>,
    filtered: Vec<bool>,
    totals: Vec<Totals>,
    tree_index: Vec<usize>,
    has_children: Vec<bool>,
}

impl TreeGen<'_> {
    fn visit(&mut self, slot: usize, depth: usize, collapsed_above: bool, found: bool) -> Node {
        let records = self.records;
        let record = &records[slot];
        self.visited[slot] = true;

        let mut depth = depth;
        let mut found = found;
        let mut filtering = false;
        if !found && !self.filter.is_empty() {
            if self.filter.matches(record) {
                found = true;
                depth = 0;
            } else {
                filtering = true;
            }
        }
        self.filtered[slot] = filtering;
        self.depth[slot] = depth;

        let collapsed_here = collapsed_above || record.collapsed;
        let folds = self.aggregate && collapsed_here && !filtering;
        let kids = self.children.get(&record.pid).cloned().unwrap_or_default();
        let mut nodes = Vec::with_capacity(kids.len());
        for child in kids {
            if self.visited[child] {
                continue;
            }
            let node = self.visit(child, depth + 1, collapsed_here, found);
            if folds && !records[child].process_state().is_defunct() {
                let child_totals = self.totals[child];
                self.totals[slot].add(child_totals);
            }
            nodes.push(node);
        }
        self.has_children[slot] = nodes.iter().any(|n| !self.filtered[n.slot]);
        Node {
            slot,
            children: nodes,
        }
    }

    fn assign(
        &mut self,
        nodes: &mut [Node],
        options: &TreeOptions,
        hidden: bool,
        next: &mut usize,
        order: &mut Vec<usize>,
    ) {
        if nodes.len() > 1 && options.sort_key.is_numeric() {
            let totals = &self.totals;
            nodes.sort_by(|a, b| {
                directed(
                    totals[a.slot].compare(&totals[b.slot], options.sort_key),
                    options.reverse,
                )
            });
        }
        let sentinel = self.records.len();
        for node in nodes.iter_mut() {
            let visible = !hidden && !self.filtered[node.slot];
            self.tree_index[node.slot] = if visible {
                order.push(node.slot);
                *next += 1;
                *next - 1
            } else {
                sentinel
            };
            let hide_children = hidden || self.records[node.slot].collapsed;
            self.assign(&mut node.children, options, hide_children, next, order);
        }
    }
}

/// Produces the ordered process view for one pass.
#[derive(Clone, Debug, Default)]
pub struct ProcessTreeBuilder {
    options: TreeOptions,
    filter: ProcessFilter,
}

impl ProcessTreeBuilder {
    pub fn new(options: TreeOptions) -> Self {
        let filter = ProcessFilter::new(&options.filter);
        ProcessTreeBuilder { options, filter }
    }

    pub fn options(&self) -> &TreeOptions {
        &self.options
    }

    /// Swap options, recompiling the filter only when its text changed.
    pub fn set_options(&mut self, options: TreeOptions) {
        if options.filter != self.options.filter {
            self.filter = ProcessFilter::new(&options.filter);
        }
        self.options = options;
    }

    pub fn build(&self, table: &mut ProcessTable) -> Vec<ProcessRecord> {
        let _span = tracing::debug_span!("tree.build", tree = self.options.tree_mode).entered();
        if self.options.tree_mode {
            self.build_tree(table)
        } else {
            self.build_flat(table)
        }
    }

    fn build_flat(&self, table: &mut ProcessTable) -> Vec<ProcessRecord> {
        let sentinel = table.len();
        let mut rows: Vec<ProcessRecord> = table
            .records()
            .iter()
            .map(|r| {
                let mut row = r.clone();
                row.filtered = !self.filter.matches(r);
                row.depth = 0;
                row.has_children = false;
                row.is_last_sibling = false;
                row
            })
            .collect();
        sort_records(&mut rows, self.options.sort_key, self.options.reverse, false);

        let mut next = 0;
        for row in rows.iter_mut() {
            row.tree_index = if row.filtered {
                sentinel
            } else {
                next += 1;
                next - 1
            };
            if let Some(record) = table.get_mut(row.pid) {
                record.filtered = row.filtered;
                record.depth = 0;
                record.tree_index = row.tree_index;
                record.has_children = false;
                record.is_last_sibling = false;
            }
        }
        rows.retain(|r| !r.filtered);
        rows
    }

    fn build_tree(&self, table: &mut ProcessTable) -> Vec<ProcessRecord> {
        let records = table.records();
        let count = records.len();
        let options = &self.options;

        let mut order: Vec<usize> = (0..count).collect();
        order.sort_by(|&a, &b| {
            directed(
                compare(&records[a], &records[b], options.sort_key),
                options.reverse,
            )
        });

        let pids: HashSet<u32> = records.iter().map(|r| r.pid).collect();
        let mut roots = Vec::new();
        let mut children: HashMap<u32, Vec<usize>> = HashMap::new();
        for &slot in &order {
            let record = &records[slot];
            if record.ppid == record.pid || !pids.contains(&record.ppid) {
                roots.push(slot);
            } else {
                children.entry(record.ppid).or_default().push(slot);
            }
        }

        let mut tree_gen = TreeGen {
            records,
            children,
            filter: &self.filter,
            aggregate: options.aggregate_children,
            visited: vec![false; count],
            depth: vec![0; count],
            filtered: vec![false; count],
            totals: records.iter().map(Totals::of).collect(),
            tree_index: vec![count; count],
            has_children: vec![false; count],
        };

        let mut nodes = Vec::with_capacity(roots.len());
        for slot in roots {
            nodes.push(tree_gen.visit(slot, 0, false, false));
        }
        // Members of a parent cycle are unreachable from any root.
        for &slot in &order {
            if !tree_gen.visited[slot] {
                nodes.push(tree_gen.visit(slot, 0, false, false));
            }
        }

        let mut emitted = Vec::with_capacity(count);
        let mut next = 0;
        tree_gen.assign(&mut nodes, options, false, &mut next, &mut emitted);

        let mut rows: Vec<ProcessRecord> = emitted
            .iter()
            .map(|&slot| {
                let mut row = records[slot].clone();
                let totals = tree_gen.totals[slot];
                row.cpu_percent = totals.cpu_percent;
                row.cpu_cumulative = totals.cpu_cumulative;
                row.memory = totals.memory;
                row.threads = totals.threads;
                row.depth = tree_gen.depth[slot];
                row.tree_index = tree_gen.tree_index[slot];
                row.filtered = false;
                row.has_children = tree_gen.has_children[slot];
                row
            })
            .collect();
        mark_last_siblings(&mut rows);

        let TreeGen {
            depth,
            filtered,
            tree_index,
            has_children,
            ..
        } = tree_gen;
        let last_sibling: HashMap<u32, bool> =
            rows.iter().map(|r| (r.pid, r.is_last_sibling)).collect();
        for (slot, record) in table.records_mut().iter_mut().enumerate() {
            record.depth = depth[slot];
            record.tree_index = tree_index[slot];
            record.filtered = filtered[slot];
            record.has_children = has_children[slot];
            record.is_last_sibling = last_sibling.get(&record.pid).copied().unwrap_or(false);
        }
        rows
    }
}

/// A row is the last of its siblings when no later row at the same depth
/// appears before the walk climbs above it.
fn mark_last_siblings(rows: &mut [ProcessRecord]) {
    let mut next_at_depth: Vec<bool> = Vec::new();
    for row in rows.iter_mut().rev() {
        let depth = row.depth;
        if next_at_depth.len() <= depth {
            next_at_depth.resize(depth + 1, false);
        }
        row.is_last_sibling = !next_at_depth[depth];
        next_at_depth[depth] = true;
        next_at_depth.truncate(depth + 1);
    }
}
