use tracing::info;

use super::{mating::RangeMater, MatingStrategy};
use crate::{
    error::Result,
    evolution::{control::Verbosity, evaluator::Evaluator, interrupt::InterruptFlag},
    population::Population,
    rng::RandomStream,
};

/// # SequentialStrategy
///
/// Mates every generation as one range on the calling thread, with the master
/// random stream and the caller's evaluator. This is what a run with a single
/// thread uses.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialStrategy;

impl<E: Evaluator> MatingStrategy<E> for SequentialStrategy {
    fn evolve(
        &self,
        population: &mut Population,
        evaluator: &mut E,
        rng: &mut RandomStream,
        interrupt: &InterruptFlag,
    ) -> Result<()> {
        let control = population.control().clone();

        for _ in 0..control.num_generations() {
            if control.verbosity() >= Verbosity::On {
                info!(generation = population.generation_index() + 1, "Mating generation");
            }

            let current = population.current().clone();
            let next = RangeMater::new(&control, &current, evaluator, rng)
                .with_interrupt(interrupt)
                .mate(control.population_size())?;
            population.advance(next)?;
        }
        Ok(())
    }
}
