use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hit::{explode, parse, render_tree};

fn sample_input(sections: usize, fields_per_section: usize) -> String {
    let mut out = String::new();
    for s in 0..sections {
        out.push_str(&format!("[block_{s}]\n"));
        for f in 0..fields_per_section {
            out.push_str(&format!("  field_{f} = {f}\n"));
        }
        out.push_str("[]\n");
    }
    out
}

fn parse_benchmark(c: &mut Criterion) {
    let input = sample_input(200, 20);
    c.bench_function("parse", |b| {
        b.iter(|| {
            let parsed = parse("bench", black_box(&input)).unwrap();
            black_box(parsed);
        });
    });
}

fn render_benchmark(c: &mut Criterion) {
    let input = sample_input(200, 20);
    let parsed = parse("bench", &input).unwrap();
    c.bench_function("render", |b| {
        b.iter(|| {
            black_box(render_tree(&parsed.tree, "  ", 0));
        });
    });
}

fn explode_benchmark(c: &mut Criterion) {
    let mut nested = String::new();
    for s in 0..500 {
        nested.push_str(&format!("block_{s}/x/y/z = {s}\n"));
    }
    let parsed = parse("bench", &nested).unwrap();
    c.bench_function("explode", |b| {
        b.iter_batched(
            || parsed.tree.clone(),
            |mut tree| {
                explode(&mut tree);
                black_box(tree);
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, parse_benchmark, render_benchmark, explode_benchmark);
criterion_main!(benches);
