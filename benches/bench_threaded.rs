use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use genvarsel::{
    chromosome::Chromosome,
    evolution::{Control, Evaluator, EvolutionEngine},
    rng::RandomStream,
    strategy::{SequentialStrategy, ThreadedStrategy},
};

/// Least-squares style scoring: the cost grows with the square of the subset
/// size, which makes evaluation dominate mating as it does in practice.
#[derive(Clone)]
struct QuadraticEvaluator {
    weights: Vec<f64>,
    scratch: Vec<f64>,
}

impl QuadraticEvaluator {
    fn new(size: usize) -> Self {
        Self {
            weights: (0..size).map(|i| ((i * 7919) % 101) as f64 / 101.0 - 0.3).collect(),
            scratch: Vec::new(),
        }
    }
}

impl Evaluator for QuadraticEvaluator {
    fn evaluate(&mut self, chromosome: &Chromosome) -> f64 {
        let selected = chromosome.selected_indices();
        self.scratch.clear();
        for &i in &selected {
            for &j in &selected {
                self.scratch.push(self.weights[i] * self.weights[j]);
            }
        }
        self.scratch.iter().sum::<f64>().sqrt() - 0.05 * selected.len() as f64
    }
}

fn control(threads: usize) -> Control {
    Control::builder()
        .population_size(200)
        .chromosome_size(120)
        .min_variables(2)
        .max_variables(30)
        .mutation_probability(0.02)
        .num_generations(10)
        .num_threads(threads)
        .max_duplicate_elimination_tries(2)
        .build()
        .unwrap()
}

fn bench_chromosome_operators(c: &mut Criterion) {
    let mut group = c.benchmark_group("chromosome_operators");
    let ctrl = control(1);
    let mut rng = RandomStream::new(42);
    let a = Chromosome::random(&ctrl, &mut rng);
    let b = Chromosome::random(&ctrl, &mut rng);

    group.bench_function("crossover", |bench| {
        bench.iter(|| black_box(&a).crossover(black_box(&b), &mut rng))
    });

    group.bench_function("mutate", |bench| {
        let mut chromosome = a.clone();
        bench.iter(|| chromosome.mutate(black_box(&ctrl), &mut rng))
    });

    group.finish();
}

fn bench_strategies(c: &mut Criterion) {
    let mut group = c.benchmark_group("strategies");
    group.sample_size(10);

    group.bench_function("sequential", |bench| {
        bench.iter(|| {
            EvolutionEngine::new(control(1), QuadraticEvaluator::new(120))
                .map(|engine| engine.with_strategy(SequentialStrategy))
                .and_then(|mut engine| engine.run(black_box(7)))
        })
    });

    for threads in [2, 4, 8].iter() {
        group.bench_with_input(BenchmarkId::new("threaded", threads), threads, |bench, &threads| {
            bench.iter(|| {
                EvolutionEngine::new(control(threads), QuadraticEvaluator::new(120))
                    .map(|engine| engine.with_strategy(ThreadedStrategy))
                    .and_then(|mut engine| engine.run(black_box(7)))
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_chromosome_operators, bench_strategies);
criterion_main!(benches);
