use std::collections::HashSet;

use crate::chromosome::Chromosome;
use crate::error::{GeneticError, OptionExt, Result};
use crate::rng::RandomStream;

/// One complete, evaluated and frozen generation.
///
/// Once built, a generation is only read: mating threads share it through an
/// `Arc` and draw parents from it with fitness-proportional (roulette wheel)
/// selection.
///
/// Selection weights are the fitness values shifted by the generation's
/// minimum, so negative fitness values are valid. The least fit chromosome has
/// weight zero. If every chromosome has the same fitness, draws are uniform.
#[derive(Debug, Clone)]
pub struct Generation {
    chromosomes: Vec<Chromosome>,
    min_fitness: f64,
    /// Running sums of the shifted fitness values.
    cumulative: Vec<f64>,
}

impl Generation {
    /// Freezes a fully evaluated set of chromosomes into a generation.
    ///
    /// # Errors
    ///
    /// Returns `GeneticError::EmptyPopulation` for an empty set and
    /// `GeneticError::Evolution` if a chromosome was never evaluated.
    pub fn new(chromosomes: Vec<Chromosome>) -> Result<Self> {
        if chromosomes.is_empty() {
            return Err(GeneticError::EmptyPopulation);
        }

        let mut fitness = Vec::with_capacity(chromosomes.len());
        for (idx, chromosome) in chromosomes.iter().enumerate() {
            let value = chromosome.fitness().ok_or_else_genetic(|| {
                GeneticError::Evolution(format!("Chromosome {} entered a generation unevaluated", idx))
            })?;
            fitness.push(value);
        }

        let min_fitness = fitness.iter().copied().fold(f64::INFINITY, f64::min);
        let mut running = 0.0;
        let cumulative = fitness
            .iter()
            .map(|f| {
                running += f - min_fitness;
                running
            })
            .collect();

        Ok(Self {
            chromosomes,
            min_fitness,
            cumulative,
        })
    }

    pub fn chromosomes(&self) -> &[Chromosome] {
        &self.chromosomes
    }

    pub fn get(&self, idx: usize) -> Option<&Chromosome> {
        self.chromosomes.get(idx)
    }

    pub fn len(&self) -> usize {
        self.chromosomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chromosomes.is_empty()
    }

    pub fn into_chromosomes(self) -> Vec<Chromosome> {
        self.chromosomes
    }

    pub fn min_fitness(&self) -> f64 {
        self.min_fitness
    }

    /// Sum of the fitness values shifted by the minimum fitness.
    pub fn sum_fitness(&self) -> f64 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    pub fn mean_fitness(&self) -> f64 {
        self.min_fitness + self.sum_fitness() / self.len() as f64
    }

    pub fn best(&self) -> Result<&Chromosome> {
        self.chromosomes
            .iter()
            .max_by(|a, b| a.rank_fitness().total_cmp(&b.rank_fitness()))
            .ok_or_else_genetic(|| GeneticError::EmptyPopulation)
    }

    /// Number of bit-wise distinct chromosomes.
    pub fn count_unique(&self) -> usize {
        self.chromosomes.iter().collect::<HashSet<_>>().len()
    }

    /// Running sum of all weights before `idx`.
    fn start_of(&self, idx: usize) -> f64 {
        if idx == 0 {
            0.0
        } else {
            self.cumulative[idx - 1]
        }
    }

    fn weight(&self, idx: usize) -> f64 {
        self.cumulative[idx] - self.start_of(idx)
    }

    /// First index whose running sum exceeds `target`.
    fn index_for(&self, target: f64) -> usize {
        self.cumulative
            .partition_point(|&c| c <= target)
            .min(self.len() - 1)
    }

    /// Draws the index of a chromosome with probability proportional to its weight.
    pub fn draw(&self, rng: &mut RandomStream) -> usize {
        let sum = self.sum_fitness();
        if sum <= 0.0 {
            return rng.index_below(self.len());
        }
        self.index_for(rng.uniform(0.0, sum))
    }

    /// Draws an index different from `excluded`, proportionally to the weights.
    ///
    /// This is the distribution of redrawing until the result differs from
    /// `excluded`, without the unbounded loop. Falls back to a uniform draw
    /// over the other chromosomes if they all carry zero weight.
    pub fn draw_excluding(&self, excluded: usize, rng: &mut RandomStream) -> usize {
        let uniform_other = |rng: &mut RandomStream| {
            let idx = rng.index_below(self.len() - 1);
            if idx >= excluded {
                idx + 1
            } else {
                idx
            }
        };

        let excluded_weight = self.weight(excluded);
        let rest = self.sum_fitness() - excluded_weight;
        if rest <= 0.0 {
            return uniform_other(rng);
        }

        let start = self.start_of(excluded);
        let mut target = rng.uniform(0.0, rest);
        if target >= start {
            target += excluded_weight;
        }
        match self.index_for(target) {
            idx if idx == excluded => uniform_other(rng),
            idx => idx,
        }
    }

    /// Draws two distinct parents.
    pub fn draw_parents(&self, rng: &mut RandomStream) -> (usize, usize) {
        let first = self.draw(rng);
        (first, self.draw_excluding(first, rng))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generation(fitness: &[f64]) -> Generation {
        let chromosomes = fitness
            .iter()
            .enumerate()
            .map(|(i, &f)| {
                let mut c = Chromosome::from_indices(16, &[i]).unwrap();
                c.set_fitness(f);
                c
            })
            .collect();
        Generation::new(chromosomes).unwrap()
    }

    #[test]
    fn test_statistics() {
        let generation = generation(&[1.0, 3.0, -2.0, 6.0]);
        assert_eq!(generation.min_fitness(), -2.0);
        assert_eq!(generation.sum_fitness(), 3.0 + 5.0 + 0.0 + 8.0);
        assert!((generation.mean_fitness() - 2.0).abs() < 1e-12);
        assert_eq!(generation.best().unwrap().fitness(), Some(6.0));
        assert_eq!(generation.count_unique(), 4);
    }

    #[test]
    fn test_unevaluated_chromosome_is_rejected() {
        let chromosomes = vec![Chromosome::from_indices(4, &[0]).unwrap()];
        match Generation::new(chromosomes) {
            Err(GeneticError::Evolution(_)) => (),
            other => panic!("Expected Evolution error, got {:?}", other),
        }
        match Generation::new(Vec::new()) {
            Err(GeneticError::EmptyPopulation) => (),
            other => panic!("Expected EmptyPopulation error, got {:?}", other),
        }
    }

    #[test]
    fn test_draw_is_fitness_proportional() {
        // shifted weights: 0, 1, 3
        let generation = generation(&[-1.0, 0.0, 2.0]);
        let mut rng = RandomStream::new(42);
        let mut counts = [0usize; 3];
        let n = 40_000;
        for _ in 0..n {
            counts[generation.draw(&mut rng)] += 1;
        }
        assert_eq!(counts[0], 0);
        let share = counts[2] as f64 / n as f64;
        assert!((share - 0.75).abs() < 0.02, "share was {}", share);
    }

    #[test]
    fn test_equal_fitness_draws_uniformly() {
        let generation = generation(&[2.0, 2.0, 2.0, 2.0]);
        let mut rng = RandomStream::new(1);
        let mut counts = [0usize; 4];
        for _ in 0..8_000 {
            counts[generation.draw(&mut rng)] += 1;
        }
        assert!(counts.iter().all(|&c| c > 1_500));
    }

    #[test]
    fn test_draw_excluding_never_returns_excluded() {
        let generation = generation(&[0.0, 0.0, 5.0, 1.0]);
        let mut rng = RandomStream::new(3);
        for excluded in 0..4 {
            for _ in 0..2_000 {
                assert_ne!(generation.draw_excluding(excluded, &mut rng), excluded);
            }
        }
    }

    #[test]
    fn test_draw_excluding_with_single_weighted_chromosome() {
        // only index 1 carries weight; excluding it must still terminate
        let generation = generation(&[0.0, 4.0, 0.0]);
        let mut rng = RandomStream::new(3);
        let mut seen = [false; 3];
        for _ in 0..500 {
            seen[generation.draw_excluding(1, &mut rng)] = true;
        }
        assert!(seen[0] && seen[2] && !seen[1]);
    }

    #[test]
    fn test_draw_parents_are_distinct() {
        let generation = generation(&[1.0, 2.0]);
        let mut rng = RandomStream::new(10);
        for _ in 0..1_000 {
            let (a, b) = generation.draw_parents(&mut rng);
            assert_ne!(a, b);
        }
    }
}
