use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use ratatui::Terminal;
use ratatui::backend::TestBackend;
use ratatui::layout::Rect;
use std::hint::black_box;
use pulsetop::system::process::{ProcessRecord, ProcessTable};
use pulsetop::system::tree::{ProcessTreeBuilder, SortKey, TreeOptions};
use pulsetop::ui::process_table::{self, TableHeader};
use pulsetop::ui::theme::Theme;

fn make_records(n: usize) -> Vec<ProcessRecord> {
    (0..n)
        .map(|i| {
            let pid = i as u32 + 1;
            let ppid = if i == 0 { 0 } else { (i as u32 / 2) + 1 };
            let mut record = ProcessRecord::new(pid, ppid, format!("proc_{i}"));
            record.command = format!("proc_{i} --work");
            record.user = format!("u{}", i % 8);
            record.memory = ((n - i) as u64 + 1) * 1024;
            record.cpu_percent = (i % 100) as f64;
            record.cpu_cumulative = (i % 37) as f64;
            record.collapsed = i % 50 == 3;
            record
        })
        .collect()
}

fn options(sort_key: SortKey, tree_mode: bool, filter: &str) -> TreeOptions {
    TreeOptions {
        sort_key,
        reverse: false,
        filter: filter.to_string(),
        tree_mode,
        aggregate_children: true,
    }
}

fn bench_flat_sort(c: &mut Criterion) {
    let mut group = c.benchmark_group("flat_sort_500_1000_2000");

    for size in [500usize, 1000, 2000] {
        let table = ProcessTable::from_records(make_records(size));
        let builder = ProcessTreeBuilder::new(options(SortKey::CpuLazy, false, ""));
        group.bench_with_input(BenchmarkId::from_parameter(size), &table, |b, table| {
            b.iter(|| {
                let mut table = black_box(table.clone());
                black_box(builder.build(&mut table));
            })
        });
    }

    group.finish();
}

fn bench_tree_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree_build_500_1000_2000");

    for size in [500usize, 1000, 2000] {
        let table = ProcessTable::from_records(make_records(size));
        let builder = ProcessTreeBuilder::new(options(SortKey::Memory, true, ""));
        group.bench_with_input(BenchmarkId::from_parameter(size), &table, |b, table| {
            b.iter(|| {
                let mut table = black_box(table.clone());
                black_box(builder.build(&mut table));
            })
        });
    }

    group.finish();
}

fn bench_filtered_tree_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("filtered_tree_build_500_1000_2000");

    for size in [500usize, 1000, 2000] {
        let table = ProcessTable::from_records(make_records(size));
        let builder = ProcessTreeBuilder::new(options(SortKey::Pid, true, "!proc_1[0-9]"));
        group.bench_with_input(BenchmarkId::from_parameter(size), &table, |b, table| {
            b.iter(|| {
                let mut table = black_box(table.clone());
                black_box(builder.build(&mut table));
            })
        });
    }

    group.finish();
}

fn bench_process_table_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("process_table_render_500_1000_2000");
    let theme = Theme::dark();

    for size in [500usize, 1000, 2000] {
        let mut table = ProcessTable::from_records(make_records(size));
        let rows = ProcessTreeBuilder::new(options(SortKey::CpuLazy, true, "")).build(&mut table);
        let header = TableHeader {
            sort_key: SortKey::CpuLazy,
            reversed: false,
            tree: true,
            filter: String::new(),
            shown: rows.len(),
            total: size,
        };

        group.bench_with_input(BenchmarkId::from_parameter(size), &rows, |b, rows| {
            b.iter(|| {
                let backend = TestBackend::new(160, 50);
                let mut terminal = Terminal::new(backend).expect("bench terminal init failed");
                terminal
                    .draw(|frame| {
                        process_table::render(
                            frame,
                            Rect::new(0, 0, 160, 50),
                            black_box(rows),
                            0,
                            &header,
                            &theme,
                        );
                    })
                    .expect("bench draw failed");
                black_box(terminal.backend());
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_flat_sort,
    bench_tree_build,
    bench_filtered_tree_build,
    bench_process_table_render
);
criterion_main!(benches);
