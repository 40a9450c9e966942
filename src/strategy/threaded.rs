use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;

use tracing::{info, warn};

use super::{barrier::GenerationBarrier, mating::RangeMater, partition, MatingStrategy};
use crate::{
    chromosome::Chromosome,
    error::{GeneticError, Result},
    evolution::{
        control::{Control, Verbosity},
        evaluator::Evaluator,
        interrupt::InterruptFlag,
    },
    population::Population,
    rng::RandomStream,
};

type RangeResult = (usize, Result<Vec<Chromosome>>);

/// # ThreadedStrategy
///
/// Mates each generation on `num_threads` threads: a pool of
/// `num_threads - 1` workers spawned once per run plus the calling thread.
///
/// Every generation is split with [`partition`]; each worker fills its own
/// range with its own random stream and evaluator clone, while the calling
/// thread fills the last range. Worker streams are seeded from the master
/// stream when the pool is spawned, so a run is reproducible for a fixed seed
/// and thread count regardless of scheduling.
///
/// If a worker cannot be spawned, it and every later worker are left out and
/// their ranges are mated by the calling thread instead.
///
/// Only the calling thread polls the interrupt flag. Workers always finish
/// their range, so a worker range that can never fill (a bad solution
/// threshold of 0 with an evaluator under which no child matches its parents)
/// blocks the run at the generation barrier even after the flag is raised.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadedStrategy;

impl<E: Evaluator> MatingStrategy<E> for ThreadedStrategy {
    fn evolve(
        &self,
        population: &mut Population,
        evaluator: &mut E,
        rng: &mut RandomStream,
        interrupt: &InterruptFlag,
    ) -> Result<()> {
        let control = population.control().clone();
        let ranges = partition(control.population_size(), control.num_threads());
        let (own_range, worker_ranges) = ranges
            .split_last()
            .map(|(own, workers)| (own.clone(), workers))
            .ok_or_else(|| GeneticError::Threading("No range to mate".to_string()))?;

        let barrier = GenerationBarrier::new();
        let (sender, receiver) = mpsc::channel::<RangeResult>();

        thread::scope(|scope| {
            let mut own_start = own_range.start;
            let mut spawned = 0;

            for (idx, range) in worker_ranges.iter().enumerate() {
                let worker = Worker {
                    idx,
                    len: range.len(),
                    control: Arc::clone(&control),
                    evaluator: evaluator.clone(),
                    rng: RandomStream::new(rng.next32()),
                    sender: sender.clone(),
                };
                let barrier = &barrier;
                let spawn = thread::Builder::new()
                    .name(format!("genvarsel-worker-{}", idx))
                    .spawn_scoped(scope, move || worker.run(barrier));

                if let Err(e) = spawn {
                    warn!(
                        worker = idx,
                        error = %e,
                        "Could not spawn worker, the calling thread takes over its range"
                    );
                    own_start = range.start;
                    break;
                }
                spawned += 1;
            }
            drop(sender);

            barrier.set_participants(spawned + 1);
            if control.verbosity() >= Verbosity::On {
                info!(
                    workers = spawned,
                    own_range = ?(own_start..own_range.end),
                    "Worker pool ready"
                );
            }

            let own_range = own_start..own_range.end;
            let outcome = orchestrate(
                population,
                &control,
                evaluator,
                rng,
                interrupt,
                &barrier,
                &receiver,
                spawned,
                own_range,
            );
            barrier.kill();
            outcome
        })
    }
}

/// One pooled thread with everything it needs for its range.
struct Worker<E: Evaluator> {
    idx: usize,
    len: usize,
    control: Arc<Control>,
    evaluator: E,
    rng: RandomStream,
    sender: Sender<RangeResult>,
}

impl<E: Evaluator> Worker<E> {
    fn run(mut self, barrier: &GenerationBarrier) {
        let mut last_round = 0;
        while let Some(generation) = barrier.wait_start(&mut last_round) {
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                RangeMater::new(&self.control, &generation, &mut self.evaluator, &mut self.rng)
                    .mate(self.len)
            }))
            .unwrap_or_else(|_| {
                Err(GeneticError::Threading(format!(
                    "Worker {} panicked while mating its range",
                    self.idx
                )))
            });
            drop(generation);

            if self.sender.send((self.idx, result)).is_err() {
                warn!(worker = self.idx, "Orchestrator stopped listening for ranges");
            }
            barrier.arrive();
        }
    }
}

/// Runs every generation from the calling thread and collects the ranges.
#[allow(clippy::too_many_arguments)]
fn orchestrate<E: Evaluator>(
    population: &mut Population,
    control: &Control,
    evaluator: &mut E,
    rng: &mut RandomStream,
    interrupt: &InterruptFlag,
    barrier: &GenerationBarrier,
    receiver: &mpsc::Receiver<RangeResult>,
    workers: usize,
    own_range: Range<usize>,
) -> Result<()> {
    for _ in 0..control.num_generations() {
        if control.verbosity() >= Verbosity::On {
            info!(generation = population.generation_index() + 1, "Mating generation");
        }

        let current = Arc::clone(population.current());
        barrier.start(Arc::clone(&current));

        let own = panic::catch_unwind(AssertUnwindSafe(|| {
            RangeMater::new(control, &current, evaluator, rng)
                .with_interrupt(interrupt)
                .mate(own_range.len())
        }))
        .unwrap_or_else(|_| {
            Err(GeneticError::Threading(
                "Calling thread panicked while mating its range".to_string(),
            ))
        });
        barrier.arrive();

        let mut ranges: Vec<Option<Vec<Chromosome>>> = (0..workers).map(|_| None).collect();
        let mut failure = None;
        for _ in 0..workers {
            match receiver.recv() {
                Ok((idx, Ok(range))) => ranges[idx] = Some(range),
                Ok((_, Err(e))) => {
                    failure.get_or_insert(e);
                }
                Err(_) => {
                    failure.get_or_insert(GeneticError::Threading(
                        "A worker exited before delivering its range".to_string(),
                    ));
                    break;
                }
            }
        }

        // the rendezvous is complete, so an interrupt can unwind now
        let own = own?;
        if let Some(e) = failure {
            return Err(e);
        }

        let next: Vec<Chromosome> = ranges.into_iter().flatten().flatten().chain(own).collect();
        population.advance(next)?;
    }
    Ok(())
}
