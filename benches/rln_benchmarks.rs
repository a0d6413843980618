use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pasta_curves::pallas;
use rln::{
    generate_membership_key, hash_bytes, hash_pair, BackendKind, Epoch, MembershipTree,
    Parameters, RlnEngine,
};

fn bench_halo2_proof(c: &mut Criterion) {
    let mut group = c.benchmark_group("halo2_proof");
    group.sample_size(10);

    for depth in [4usize, 10, 20] {
        let params = Parameters::generate(depth, BackendKind::Halo2)
            .unwrap()
            .to_bytes();
        let engine = RlnEngine::new(depth, &params).unwrap();
        let member = generate_membership_key().unwrap();
        let index = engine.insert_member(member.id_commitment).unwrap();
        let epoch = Epoch::from_u64(1);
        let proof = engine.generate_proof(b"bench", &member, index, epoch).unwrap();

        group.bench_with_input(BenchmarkId::new("generate", depth), &depth, |b, _| {
            b.iter(|| {
                black_box(
                    engine
                        .generate_proof(black_box(b"bench"), &member, index, epoch)
                        .unwrap(),
                )
            })
        });
        group.bench_with_input(BenchmarkId::new("verify", depth), &depth, |b, _| {
            b.iter(|| black_box(engine.verify(black_box(b"bench"), &proof)))
        });
    }

    group.finish();
}

fn bench_tree_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree_insert");

    for depth in [10usize, 20, 32] {
        let commitments: Vec<_> = (0..64)
            .map(|_| generate_membership_key().unwrap().id_commitment)
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            b.iter(|| {
                let mut tree = MembershipTree::new(depth).unwrap();
                for commitment in &commitments {
                    tree.insert(*commitment).unwrap();
                }
                black_box(tree.root())
            })
        });
    }

    group.finish();
}

fn bench_authentication_path(c: &mut Criterion) {
    let commitments: Vec<_> = (0..256)
        .map(|_| generate_membership_key().unwrap().id_commitment)
        .collect();
    let tree = MembershipTree::from_commitments(20, &commitments).unwrap();

    c.bench_function("authentication_path", |b| {
        b.iter(|| black_box(tree.authentication_path(black_box(128)).unwrap()))
    });
}

fn bench_hashes(c: &mut Criterion) {
    c.bench_function("hash_pair", |b| {
        b.iter(|| {
            black_box(hash_pair(
                black_box(pallas::Base::from(42)),
                black_box(pallas::Base::from(99)),
            ))
        })
    });

    let message = vec![0x5au8; 1024];
    c.bench_function("hash_bytes_1k", |b| {
        b.iter(|| black_box(hash_bytes(black_box(&message))))
    });
}

criterion_group!(
    benches,
    bench_halo2_proof,
    bench_tree_insert,
    bench_authentication_path,
    bench_hashes
);
criterion_main!(benches);
