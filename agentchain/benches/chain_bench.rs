//! Benchmarks for chain execution.

use agentchain::pipeline::PipelineChain;
use agentchain::record::{Record, RecordRef};
use agentchain::testing::{DuplicateProcessor, EchoProcessor};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn batch(size: usize) -> Vec<RecordRef> {
    (0..size)
        .map(|i| Record::new(format!("record-{i}")).into_ref())
        .collect()
}

fn chain(stages: usize) -> PipelineChain {
    let mut builder =
        PipelineChain::builder().processor(Box::new(DuplicateProcessor::new("duplicate")));
    for i in 0..stages {
        builder = builder.processor(Box::new(EchoProcessor::new(format!("echo-{i}"))));
    }
    builder.build().unwrap()
}

fn chain_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let mut group = c.benchmark_group("chain_process");

    for stages in [1, 4] {
        for size in [10, 100] {
            let mut chain = chain(stages);
            let records = batch(size);
            group.bench_with_input(
                BenchmarkId::new(format!("stages_{stages}"), size),
                &records,
                |b, records| {
                    b.iter(|| runtime.block_on(chain.process(black_box(records.clone()))));
                },
            );
        }
    }
    group.finish();
}

criterion_group!(benches, chain_benchmark);
criterion_main!(benches);
