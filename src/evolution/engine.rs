use std::sync::Arc;

use tracing::info;

use super::{
    control::{Control, Verbosity},
    evaluator::Evaluator,
    interrupt::InterruptFlag,
};
use crate::{
    chromosome::Chromosome,
    error::{GeneticError, OptionExt, Result},
    population::Population,
    rng::RandomStream,
    strategy::{MatingStrategy, SequentialStrategy, ThreadedStrategy},
};

/// What a completed run leaves behind.
#[derive(Debug, Clone, PartialEq)]
pub struct EvolutionResult {
    /// The final generation, in slot order.
    pub generation: Vec<Chromosome>,
    /// The best distinct chromosomes seen during the run, best first.
    pub elite: Vec<Chromosome>,
}

impl EvolutionResult {
    /// The fittest chromosome of the run.
    ///
    /// # Errors
    ///
    /// Returns `GeneticError::EmptyPopulation` if the run kept no chromosome at all.
    pub fn best(&self) -> Result<&Chromosome> {
        self.elite
            .first()
            .into_iter()
            .chain(self.generation.iter())
            .max_by(|a, b| a.rank_fitness().total_cmp(&b.rank_fitness()))
            .ok_or_else_genetic(|| GeneticError::EmptyPopulation)
    }

    /// Elite members as boolean masks over the variable universe.
    pub fn elite_masks(&self) -> Vec<Vec<bool>> {
        self.elite.iter().map(Chromosome::to_mask).collect()
    }

    /// Elite members as ascending lists of selected variable indices.
    pub fn elite_indices(&self) -> Vec<Vec<usize>> {
        self.elite.iter().map(Chromosome::selected_indices).collect()
    }

    pub fn generation_masks(&self) -> Vec<Vec<bool>> {
        self.generation.iter().map(Chromosome::to_mask).collect()
    }

    pub fn generation_indices(&self) -> Vec<Vec<usize>> {
        self.generation.iter().map(Chromosome::selected_indices).collect()
    }
}

/// Runs variable selection for one `Control` and one evaluator.
///
/// The mating strategy is chosen from `num_threads` when the engine is built:
/// one thread uses [`SequentialStrategy`], more use [`ThreadedStrategy`].
/// [`EvolutionEngine::with_strategy`] overrides the choice.
///
/// # Examples
///
/// ```
/// use genvarsel::chromosome::Chromosome;
/// use genvarsel::evolution::{Control, EvolutionEngine, Evaluator};
///
/// #[derive(Clone)]
/// struct PreferLowIndices;
///
/// impl Evaluator for PreferLowIndices {
///     fn evaluate(&mut self, chromosome: &Chromosome) -> f64 {
///         chromosome.selected_indices().iter().map(|&i| 1.0 / (1.0 + i as f64)).sum()
///     }
/// }
///
/// let control = Control::builder()
///     .population_size(20)
///     .chromosome_size(16)
///     .max_variables(4)
///     .num_generations(5)
///     .build()
///     .unwrap();
///
/// let mut engine = EvolutionEngine::new(control, PreferLowIndices).unwrap();
/// let result = engine.run(42).unwrap();
/// assert_eq!(result.generation.len(), 20);
/// assert!(result.best().unwrap().variable_count() <= 4);
/// ```
#[derive(Debug)]
pub struct EvolutionEngine<E: Evaluator> {
    control: Arc<Control>,
    evaluator: E,
    strategy: Box<dyn MatingStrategy<E>>,
    interrupt: InterruptFlag,
}

impl<E: Evaluator> EvolutionEngine<E> {
    /// Creates an engine after validating `control`.
    ///
    /// # Errors
    ///
    /// Returns `GeneticError::Configuration` if `control` is invalid.
    pub fn new(control: Control, evaluator: E) -> Result<Self> {
        control.validate()?;
        let strategy: Box<dyn MatingStrategy<E>> = if control.num_threads() > 1 {
            Box::new(ThreadedStrategy)
        } else {
            Box::new(SequentialStrategy)
        };

        Ok(Self {
            control: Arc::new(control),
            evaluator,
            strategy,
            interrupt: InterruptFlag::new(),
        })
    }

    /// Uses `interrupt` instead of the engine's own flag.
    pub fn with_interrupt(mut self, interrupt: InterruptFlag) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn with_strategy<S: MatingStrategy<E> + 'static>(mut self, strategy: S) -> Self {
        self.strategy = Box::new(strategy);
        self
    }

    pub fn control(&self) -> &Control {
        &self.control
    }

    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    /// A handle to the flag that cancels a running `run`; clones may be raised
    /// from any thread.
    pub fn interrupt_flag(&self) -> &InterruptFlag {
        &self.interrupt
    }

    /// Evolves a fresh random population for `num_generations` generations.
    ///
    /// Equal seeds give equal results for the same control and evaluator.
    ///
    /// # Errors
    ///
    /// Returns `GeneticError::Interrupted` if the interrupt flag was raised,
    /// in which case nothing of the run is kept. Evaluator and threading
    /// failures are passed through.
    pub fn run(&mut self, seed: u32) -> Result<EvolutionResult> {
        if self.control.verbosity() >= Verbosity::On {
            info!(
                seed,
                strategy = ?self.strategy,
                population_size = self.control.population_size(),
                generations = self.control.num_generations(),
                "Starting variable selection"
            );
        }

        let mut rng = RandomStream::new(seed);
        let mut population = Population::initialize(
            Arc::clone(&self.control),
            &mut self.evaluator,
            &mut rng,
            &self.interrupt,
        )?;
        self.strategy
            .evolve(&mut population, &mut self.evaluator, &mut rng, &self.interrupt)?;

        let (generation, elite) = population.into_parts();
        let result = EvolutionResult { generation, elite };
        if self.control.verbosity() >= Verbosity::On {
            let best = result.best().ok().and_then(Chromosome::fitness);
            info!(best_fitness = ?best, "Variable selection finished");
        }
        Ok(result)
    }
}
