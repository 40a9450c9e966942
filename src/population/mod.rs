//! # Population
//!
//! The `Population` owns the state that survives from one generation to the
//! next: the frozen current generation and the elite set. Mating strategies
//! read parents from [`Population::current`] and hand a freshly filled next
//! generation back through [`Population::advance`], which computes the new
//! selection weights, updates the elite and swaps the generations.

pub mod elite;
pub mod generation;

use std::collections::HashSet;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::chromosome::Chromosome;
use crate::error::{GeneticError, Result};
use crate::evolution::control::{Control, Verbosity};
use crate::evolution::evaluator::{evaluate_into, Evaluator};
use crate::evolution::interrupt::InterruptFlag;
use crate::rng::RandomStream;

pub use elite::EliteSet;
pub use generation::Generation;

/// Generation bookkeeping shared by all mating strategies.
#[derive(Debug)]
pub struct Population {
    control: Arc<Control>,
    current: Arc<Generation>,
    elite: EliteSet,
    generation: usize,
}

impl Population {
    /// Builds generation zero from `population_size` distinct random chromosomes.
    ///
    /// With more than one configured thread the chromosomes are evaluated on a
    /// rayon pool, each task holding its own evaluator clone. The interrupt
    /// flag is polled between draws.
    ///
    /// # Errors
    ///
    /// Returns `GeneticError::Interrupted` if the flag was raised,
    /// `GeneticError::Threading` if the evaluation pool could not be built and
    /// `GeneticError::FitnessCalculation` if a score was not finite.
    pub fn initialize<E: Evaluator>(
        control: Arc<Control>,
        evaluator: &mut E,
        rng: &mut RandomStream,
        interrupt: &InterruptFlag,
    ) -> Result<Self> {
        let size = control.population_size();
        if control.verbosity() >= Verbosity::On {
            info!(population_size = size, "Generating initial population");
        }

        let mut seen = HashSet::with_capacity(size);
        let mut chromosomes = Vec::with_capacity(size);
        while chromosomes.len() < size {
            let candidate = Chromosome::random(&control, rng);
            if seen.insert(candidate.clone()) {
                chromosomes.push(candidate);
            }
            if interrupt.is_raised() {
                return Err(GeneticError::Interrupted);
            }
        }

        evaluate_all(&control, &mut chromosomes, evaluator)?;

        let mut elite = EliteSet::new(control.elite_size());
        for chromosome in &chromosomes {
            elite.offer(chromosome);
        }

        let population = Self {
            current: Arc::new(Generation::new(chromosomes)?),
            control,
            elite,
            generation: 0,
        };
        population.log_generation();
        Ok(population)
    }

    pub fn control(&self) -> &Arc<Control> {
        &self.control
    }

    /// The frozen generation parents are drawn from.
    pub fn current(&self) -> &Arc<Generation> {
        &self.current
    }

    pub fn elite(&self) -> &EliteSet {
        &self.elite
    }

    /// Index of the current generation; generation zero is the random start.
    pub fn generation_index(&self) -> usize {
        self.generation
    }

    /// Makes a fully evaluated next generation the current one.
    ///
    /// Every chromosome is offered to the elite set before the swap.
    ///
    /// # Errors
    ///
    /// Returns `GeneticError::Evolution` if `next` has the wrong size or holds
    /// an unevaluated chromosome.
    pub fn advance(&mut self, next: Vec<Chromosome>) -> Result<()> {
        if next.len() != self.control.population_size() {
            return Err(GeneticError::Evolution(format!(
                "Next generation holds {} chromosomes instead of {}",
                next.len(),
                self.control.population_size()
            )));
        }

        let next = Generation::new(next)?;
        for chromosome in next.chromosomes() {
            self.elite.offer(chromosome);
        }
        self.current = Arc::new(next);
        self.generation += 1;
        self.log_generation();
        Ok(())
    }

    /// Reports whether `candidate` equals any of the already committed chromosomes.
    pub fn contains_duplicate<'a, I>(committed: I, candidate: &Chromosome) -> bool
    where
        I: IntoIterator<Item = &'a Chromosome>,
    {
        committed.into_iter().any(|c| c == candidate)
    }

    /// Splits the population into its final generation and elite set.
    pub fn into_parts(self) -> (Vec<Chromosome>, Vec<Chromosome>) {
        let generation = Arc::try_unwrap(self.current)
            .map(Generation::into_chromosomes)
            .unwrap_or_else(|shared| shared.chromosomes().to_vec());
        (generation, self.elite.into_vec())
    }

    fn log_generation(&self) {
        let verbosity = self.control.verbosity();
        if verbosity < Verbosity::Verbose {
            return;
        }

        let best = self.current.best().ok().and_then(Chromosome::fitness);
        info!(
            generation = self.generation,
            best_fitness = ?best,
            mean_fitness = self.current.mean_fitness(),
            min_fitness = self.current.min_fitness(),
            unique = self.current.count_unique(),
            "Generation summary"
        );

        if verbosity >= Verbosity::Debug {
            for (idx, chromosome) in self.current.chromosomes().iter().enumerate() {
                debug!(generation = self.generation, idx, %chromosome, "Member");
            }
        }
    }
}

fn evaluate_all<E: Evaluator>(
    control: &Control,
    chromosomes: &mut [Chromosome],
    evaluator: &mut E,
) -> Result<()> {
    let threads = control.num_threads();
    if threads <= 1 {
        return chromosomes
            .iter_mut()
            .try_for_each(|c| evaluate_into(evaluator, c).map(|_| ()));
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("genvarsel-eval-{}", i))
        .build()
        .map_err(|e| GeneticError::Threading(format!("Evaluation pool could not be built: {}", e)))?;

    let chunk = chromosomes.len().div_ceil(threads);
    let mut evaluators: Vec<E> = (0..threads).map(|_| evaluator.clone()).collect();
    pool.install(|| {
        chromosomes
            .par_chunks_mut(chunk)
            .zip(evaluators.par_iter_mut())
            .try_for_each(|(chunk, evaluator)| {
                chunk
                    .iter_mut()
                    .try_for_each(|c| evaluate_into(evaluator, c).map(|_| ()))
            })
    })
}
