use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use cursor_conformance::decode::{encode_u32_le, sum_u32_le_direct, sum_u32_le_widened, EncodedWords};
use rand::{rngs::StdRng, Rng, SeedableRng};

const N_VALUES: [usize; 3] = [1, 64, 4096];

fn random_words(n: usize) -> EncodedWords {
    let mut rng = StdRng::seed_from_u64(0x5EED_u64 + n as u64);
    let values: Vec<u32> = (0..n).map(|_| rng.gen()).collect();
    encode_u32_le(&values)
}

fn benchmark_load_uint(c: &mut Criterion) {
    let mut group = c.benchmark_group("load_uint");
    for n in N_VALUES {
        let encoded = random_words(n);
        group.throughput(Throughput::Bytes(encoded.bytes.len() as u64));

        group.bench_with_input(BenchmarkId::new("direct", n), &encoded, |b, encoded| {
            b.iter(|| {
                let sum = sum_u32_le_direct(black_box(&encoded.bytes));
                assert_eq!(sum, encoded.checksum);
                sum
            });
        });

        group.bench_with_input(BenchmarkId::new("widened", n), &encoded, |b, encoded| {
            b.iter(|| {
                let sum = sum_u32_le_widened(black_box(&encoded.bytes));
                assert_eq!(sum, encoded.checksum);
                sum
            });
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_load_uint);
criterion_main!(benches);
