use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use gsprop::pipeline::events::power_deltas;
use gsprop::{estimate, ClusteringConfig, GspClusterer, SimilarityGraphBuilder};

fn random_reference(len: usize, seed: u64) -> Vec<f64> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    (0..len).map(|_| rng.gen_range(0.0..200.0)).collect()
}

fn bench_harmonic_pipeline(c: &mut Criterion) {
    let small = random_reference(64, 42);
    let medium = random_reference(256, 7);

    let mut group = c.benchmark_group("harmonic_pipeline");

    group.bench_function("graph_256", |b| {
        b.iter(|| {
            let graph = SimilarityGraphBuilder::build(&medium, 20.0).expect("graph");
            black_box(graph);
        });
    });

    group.bench_function("estimate_64", |b| {
        b.iter(|| {
            let values = estimate(&small, 20.0, 1.0).expect("estimate");
            black_box(values);
        });
    });

    group.bench_function("estimate_256", |b| {
        b.iter(|| {
            let values = estimate(&medium, 20.0, 1.0).expect("estimate");
            black_box(values);
        });
    });

    let deltas = power_deltas(&random_reference(129, 3)).expect("deltas");
    let events: Vec<usize> = (0..deltas.len()).collect();
    let clusterer = GspClusterer::new(ClusteringConfig::default()).expect("clusterer");
    group.bench_function("cluster_once_128", |b| {
        b.iter(|| {
            let cluster = clusterer
                .cluster_once(&events, &deltas, 20.0)
                .expect("cluster");
            black_box(cluster);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_harmonic_pipeline);
criterion_main!(benches);
