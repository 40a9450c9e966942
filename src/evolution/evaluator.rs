use crate::chromosome::Chromosome;
use crate::error::{GeneticError, Result};

/// Scores the variable subset encoded by a chromosome.
///
/// Every thread of a run works with its own clone, so implementations may keep
/// private scratch state behind `&mut self`. The score must only depend on the
/// selected variables: equal chromosomes get equal fitness. Higher is better.
pub trait Evaluator: Clone + Send {
    fn evaluate(&mut self, chromosome: &Chromosome) -> f64;
}

/// Evaluates `chromosome` and caches the result on it.
///
/// # Errors
///
/// Returns `GeneticError::FitnessCalculation` if the evaluator produced NaN or
/// an infinite value, which could not be ranked.
pub(crate) fn evaluate_into<E: Evaluator>(
    evaluator: &mut E,
    chromosome: &mut Chromosome,
) -> Result<f64> {
    let fitness = evaluator.evaluate(chromosome);
    if !fitness.is_finite() {
        return Err(GeneticError::FitnessCalculation(format!(
            "Non-finite fitness score {} for chromosome {}",
            fitness, chromosome
        )));
    }
    chromosome.set_fitness(fitness);
    Ok(fitness)
}
