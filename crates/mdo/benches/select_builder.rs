use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use mdo::builder::{self, Assemble, NO_COLUMNS, Select};

/// SELECT over `n` joined tables, each contributing one column and one
/// WHERE term.
fn build_joined_select(n: usize) -> Select {
    let mut select = builder::select().from_cols("t0", ["id", "name"]);
    for i in 1..n {
        select = select
            .join_left(
                format!("t{i}"),
                &format!("t{i}.parent_id = t{}.id", i - 1),
                [format!("col{i}")],
            )
            .and_where((format!("t{i}.flag = ?").as_str(), i as i64));
    }
    select.order_by("t0.id DESC").limit_page(3, 25)
}

fn bench_assemble(c: &mut Criterion) {
    let mut group = c.benchmark_group("select_builder/assemble");

    for n in [1, 5, 10, 50] {
        let select = build_joined_select(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &select, |b, select| {
            b.iter(|| black_box(select.assemble()));
        });
    }

    group.finish();
}

fn bench_build_and_assemble(c: &mut Criterion) {
    let mut group = c.benchmark_group("select_builder/build_and_assemble");

    for n in [1, 5, 10, 50] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| black_box(build_joined_select(n).assemble()));
        });
    }

    group.finish();
}

fn bench_correlation_suffixes(c: &mut Criterion) {
    let mut group = c.benchmark_group("select_builder/self_join");

    for n in [5, 20, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                let select = (0..n).fold(builder::select().from("nodes"), |s, _| {
                    s.join_inner("nodes", "1 = 1", NO_COLUMNS)
                });
                black_box(select.assemble())
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_assemble,
    bench_build_and_assemble,
    bench_correlation_suffixes
);
criterion_main!(benches);
