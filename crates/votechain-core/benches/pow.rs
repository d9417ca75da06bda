use criterion::{criterion_group, criterion_main, Criterion};
use rand::{distributions::Alphanumeric, rngs::StdRng, Rng, SeedableRng};
use votechain_core::{Miner, SearchStrategy, GENESIS_PREV_HASH};

fn payloads() -> Vec<String> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..16)
        .map(|_| (&mut rng).sample_iter(&Alphanumeric).take(30).map(char::from).collect())
        .collect()
}

fn bench_pow(c: &mut Criterion) {
    let payloads = payloads();

    for (name, strategy) in [
        ("mine_block_difficulty_3_sequential", SearchStrategy::Sequential),
        ("mine_block_difficulty_3_parallel", SearchStrategy::Parallel),
    ] {
        let miner = Miner::new(3).with_strategy(strategy);
        c.bench_function(name, |b| {
            let mut i = 0;
            b.iter(|| {
                let data = payloads[i % payloads.len()].clone();
                i += 1;
                miner.mine(1, GENESIS_PREV_HASH, data, || false)
            });
        });
    }
}

criterion_group!(benches, bench_pow);
criterion_main!(benches);
