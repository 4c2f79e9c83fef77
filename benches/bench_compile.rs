#![allow(clippy::unwrap_used, reason = "benchmark")]

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};

const STORY: &str = r"\title(The Cellar)
\set(visits = 0)
\section(start) {
\h1 {The Landing}
You stand at the top of the stairs.

\if(visits > 0) {\bf {You have been here before.}} \else {It is your first time down.}
\nav(cellar, visits) {Descend}
}
\section(cellar, visits) {
\set(visits = visits + 1)
The cellar is dark.
\choices {
\choice(start, true, visits) {Go back up}
}
}";

fn compile_benchmark(c: &mut Criterion) {
    // Sanity-check the fixture before timing it.
    fabula::compile(STORY).unwrap();

    let mut group = c.benchmark_group("Story Compilation");
    group.sample_size(50);

    group.bench_function("fabula_compile", |b| {
        b.iter(|| black_box(fabula::compile(black_box(STORY)).unwrap()));
    });

    group.finish();
}

criterion_group!(benches, compile_benchmark);
criterion_main!(benches);
