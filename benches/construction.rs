use criterion::{criterion_group, criterion_main};
use criterion::{AxisScale, BatchSize, BenchmarkId, Criterion, PlotConfiguration};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use fmeis::alphabet::ascii_dna;
use fmeis::{Config, EisBuilder};

fn random_dna_bwt(len: usize) -> (Vec<u8>, u64) {
    let alphabet = ascii_dna().unwrap();
    let bases = [b'A', b'C', b'G', b'T'];
    let mut rng: StdRng = SeedableRng::from_seed([0; 32]);
    let mut symbols: Vec<u8> = (0..len)
        .map(|_| alphabet.map(bases[rng.random_range(0..4)]).unwrap())
        .collect();
    symbols.push(0); // terminator, stands in for an actual BWT's single zero row
    let n = symbols.len() as u64;
    (symbols, n)
}

pub fn bench(c: &mut Criterion) {
    let plot_config = PlotConfiguration::default().summary_scale(AxisScale::Logarithmic);
    let mut group = c.benchmark_group("construction");
    group.plot_config(plot_config);

    for n in [1_000usize, 10_000usize, 100_000usize, 1_000_000usize].iter() {
        group.bench_with_input(BenchmarkId::new("EisBuilder::build", n), n, |b, &n| {
            b.iter_batched(
                || {
                    let alphabet = ascii_dna().unwrap();
                    let config = Config::new().block_size(128).blocks_per_bucket(16);
                    let builder = EisBuilder::new(alphabet, config).unwrap();
                    let (symbols, declared_length) = random_dna_bwt(n);
                    (builder, symbols, declared_length)
                },
                |(builder, symbols, declared_length)| {
                    builder.build(symbols.into_iter(), declared_length).unwrap()
                },
                BatchSize::SmallInput,
            )
        });
    }
}

criterion_group!(benches, bench);
criterion_main!(benches);
