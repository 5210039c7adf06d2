use criterion::{Criterion, black_box, criterion_group, criterion_main};
use ptrkit_shared::{SharedHandle, make_shared};

pub fn construction_benchmark(c: &mut Criterion) {
    c.bench_function("make_shared", |b| {
        b.iter(|| make_shared(black_box([0u64; 8])));
    });
    c.bench_function("from_box", |b| {
        b.iter(|| SharedHandle::from_box(Box::new(black_box([0u64; 8]))));
    });
}

pub fn sharing_benchmark(c: &mut Criterion) {
    c.bench_function("clone_and_drop", |b| {
        let handle = make_shared([0u64; 8]);
        b.iter(|| drop(black_box(handle.clone())));
    });
    c.bench_function("lock", |b| {
        let handle = make_shared([0u64; 8]);
        let weak = SharedHandle::downgrade(&handle);
        b.iter(|| drop(black_box(weak.lock())));
    });
}

criterion_group!(benches, construction_benchmark, sharing_benchmark);
criterion_main!(benches);
