//! # Range mating
//!
//! Fills one contiguous range of the next generation with children bred from
//! the frozen current generation. Every strategy funnels through
//! [`RangeMater::mate`]; the threaded strategy runs one mater per thread, each
//! with its own random stream and evaluator clone.
//!
//! A range is filled couple by couple:
//!
//! 1. two distinct parents are drawn fitness-proportionally,
//! 2. they are crossed, the children repaired into the variable bounds,
//!    evaluated and ordered best first,
//! 3. while the best child is worse than the better parent, further crossovers
//!    of the same parents are proposed and kept only if they improve the couple,
//! 4. a couple whose best child fell too far below the better parent is dropped,
//! 5. both children are mutated, made unique within the range and committed,
//!    the first child from the low end and the second from the high end.

use tracing::debug;

use crate::chromosome::{Chromosome, ShuffledSet};
use crate::error::{GeneticError, Result};
use crate::evolution::control::{Control, Verbosity};
use crate::evolution::evaluator::{evaluate_into, Evaluator};
use crate::evolution::interrupt::InterruptFlag;
use crate::population::{Generation, Population};
use crate::rng::RandomStream;

/// Reports whether a couple whose best child scored `best_child` may be kept.
///
/// The tolerated loss is `threshold * |min_parent_fitness|` below the better
/// parent. With parents at 10.0 and 8.0 and a threshold of 0.5 the floor is 5.0.
pub fn couple_acceptable(best_child: f64, min_parent_fitness: f64, threshold: f64) -> bool {
    best_child >= min_parent_fitness - threshold * min_parent_fitness.abs()
}

/// Write target of one mater: first children grow from the low end, second
/// children from the high end, and the range is full when the two meet.
#[derive(Debug)]
pub(crate) struct RangeBuffer {
    len: usize,
    lower: Vec<Chromosome>,
    upper: Vec<Chromosome>,
}

impl RangeBuffer {
    pub(crate) fn new(len: usize) -> Self {
        Self {
            len,
            lower: Vec::with_capacity(len),
            upper: Vec::with_capacity(len / 2),
        }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.len - self.lower.len() - self.upper.len()
    }

    pub(crate) fn contains(&self, candidate: &Chromosome) -> bool {
        Population::contains_duplicate(self.lower.iter().chain(self.upper.iter()), candidate)
    }

    pub(crate) fn push_lower(&mut self, chromosome: Chromosome) {
        debug_assert!(self.remaining() > 0);
        self.lower.push(chromosome);
    }

    pub(crate) fn push_upper(&mut self, chromosome: Chromosome) {
        debug_assert!(self.remaining() > 0);
        self.upper.push(chromosome);
    }

    /// The committed chromosomes in slot order.
    pub(crate) fn into_range(self) -> Vec<Chromosome> {
        let mut range = self.lower;
        range.extend(self.upper.into_iter().rev());
        range
    }
}

/// An accepted couple, best child first.
struct Couple {
    mother: usize,
    father: usize,
    child1: Chromosome,
    child2: Chromosome,
}

/// Breeds chromosomes for one range of the next generation.
pub struct RangeMater<'a, E: Evaluator> {
    control: &'a Control,
    generation: &'a Generation,
    evaluator: &'a mut E,
    rng: &'a mut RandomStream,
    interrupt: Option<&'a InterruptFlag>,
    positions: ShuffledSet,
}

impl<'a, E: Evaluator> RangeMater<'a, E> {
    pub fn new(
        control: &'a Control,
        generation: &'a Generation,
        evaluator: &'a mut E,
        rng: &'a mut RandomStream,
    ) -> Self {
        Self {
            control,
            generation,
            evaluator,
            rng,
            interrupt: None,
            positions: ShuffledSet::new(control.chromosome_size()),
        }
    }

    /// Polls `interrupt` before every couple. Only the orchestrating thread
    /// installs one.
    pub fn with_interrupt(mut self, interrupt: &'a InterruptFlag) -> Self {
        self.interrupt = Some(interrupt);
        self
    }

    /// Fills a range of `len` slots with evaluated chromosomes that are
    /// pairwise distinct.
    ///
    /// # Errors
    ///
    /// Returns `GeneticError::Interrupted` when the interrupt flag is raised
    /// between couples, and propagates evaluator and crossover failures.
    pub fn mate(&mut self, len: usize) -> Result<Vec<Chromosome>> {
        let mut buffer = RangeBuffer::new(len);

        while buffer.remaining() > 0 {
            if self.interrupt.is_some_and(InterruptFlag::is_raised) {
                return Err(GeneticError::Interrupted);
            }

            let Some(couple) = self.mate_couple()? else {
                continue;
            };
            let Couple {
                mother,
                father,
                mut child1,
                mut child2,
            } = couple;

            child1.mutate_with(self.control, self.rng, &mut self.positions);
            child2.mutate_with(self.control, self.rng, &mut self.positions);

            let child1 = self.make_unique(child1, &buffer, mother, father)?;
            buffer.push_lower(child1);
            if buffer.remaining() > 0 {
                let child2 = self.make_unique(child2, &buffer, mother, father)?;
                buffer.push_upper(child2);
            }
        }

        Ok(buffer.into_range())
    }

    /// Runs steps one to four of a couple. `None` means the couple was dropped.
    fn mate_couple(&mut self) -> Result<Option<Couple>> {
        let generation = self.generation;
        let (mother_idx, father_idx) = generation.draw_parents(self.rng);
        let mother = &generation.chromosomes()[mother_idx];
        let father = &generation.chromosomes()[father_idx];
        let min_parent_fitness = mother.rank_fitness().max(father.rank_fitness());

        let (mut child1, mut child2) = self.cross(mother, father)?;

        let mut tries = 0;
        while child1.rank_fitness() < min_parent_fitness {
            tries += 1;
            if tries >= self.control.max_mating_tries() {
                break;
            }

            let (first, second) = mother.crossover(father, self.rng)?;
            for mut proposal in [first, second] {
                if proposal.variable_count() == 0 {
                    continue;
                }
                proposal.repair(self.control, self.rng);
                evaluate_into(self.evaluator, &mut proposal)?;

                if self.control.verbosity() >= Verbosity::Debug {
                    debug!(
                        try_number = tries,
                        proposal = proposal.rank_fitness(),
                        child1 = child1.rank_fitness(),
                        child2 = child2.rank_fitness(),
                        "Proposed crossover"
                    );
                }

                if proposal.is_fitter_than(&child2) {
                    if proposal.is_fitter_than(&child1) {
                        child2 = std::mem::replace(&mut child1, proposal);
                    } else {
                        child2 = proposal;
                    }
                }
            }
        }

        let best = child1.rank_fitness();
        if !couple_acceptable(best, min_parent_fitness, self.control.bad_solution_threshold()) {
            if self.control.verbosity() >= Verbosity::Debug {
                debug!(
                    mother = mother_idx,
                    father = father_idx,
                    best_child = best,
                    min_parent_fitness,
                    "Dropping couple"
                );
            }
            return Ok(None);
        }

        if self.control.verbosity() >= Verbosity::Debug {
            debug!(
                mother = mother_idx,
                father = father_idx,
                tries,
                best_child = best,
                min_parent_fitness,
                "Accepted couple"
            );
        }

        Ok(Some(Couple {
            mother: mother_idx,
            father: father_idx,
            child1,
            child2,
        }))
    }

    /// Crosses the parents into two repaired, evaluated children, best first.
    ///
    /// Neither child is ever empty: a lone empty child is replaced by a copy of
    /// its sibling and two empty children are crossed again.
    fn cross(&mut self, mother: &Chromosome, father: &Chromosome) -> Result<(Chromosome, Chromosome)> {
        let (mut child1, mut child2) = loop {
            let (child1, child2) = mother.crossover(father, self.rng)?;
            match (child1.variable_count() == 0, child2.variable_count() == 0) {
                (true, true) => continue,
                (true, false) => break (child2.clone(), child2),
                (false, true) => break (child1.clone(), child1),
                (false, false) => break (child1, child2),
            }
        };

        child1.repair(self.control, self.rng);
        child2.repair(self.control, self.rng);
        evaluate_into(self.evaluator, &mut child1)?;
        evaluate_into(self.evaluator, &mut child2)?;

        if child2.is_fitter_than(&child1) {
            std::mem::swap(&mut child1, &mut child2);
        }
        Ok((child1, child2))
    }

    /// Re-mates `child` from its parents until it differs from everything in
    /// `buffer`, then falls back to random reinitialization. Returns the child
    /// evaluated.
    fn make_unique(
        &mut self,
        mut child: Chromosome,
        buffer: &RangeBuffer,
        mother: usize,
        father: usize,
    ) -> Result<Chromosome> {
        let generation = self.generation;
        let mother = &generation.chromosomes()[mother];
        let father = &generation.chromosomes()[father];

        let mut tries = 0;
        while buffer.contains(&child) && tries < self.control.max_duplicate_elimination_tries() {
            tries += 1;
            let (first, second) = mother.crossover(father, self.rng)?;
            let Some(mut replacement) = [first, second]
                .into_iter()
                .find(|c| c.variable_count() > 0)
            else {
                continue;
            };
            replacement.repair(self.control, self.rng);
            replacement.mutate_with(self.control, self.rng, &mut self.positions);
            child = replacement;
        }

        let mut resets = 0usize;
        while buffer.contains(&child) {
            child.randomly_reset_with(self.control, self.rng, &mut self.positions);
            resets += 1;
        }

        if (tries > 0 || resets > 0) && self.control.verbosity() >= Verbosity::Debug {
            debug!(tries, resets, "Eliminated duplicate child");
        }

        if !child.is_evaluated() {
            evaluate_into(self.evaluator, &mut child)?;
        }
        Ok(child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct SumEvaluator;

    impl Evaluator for SumEvaluator {
        fn evaluate(&mut self, chromosome: &Chromosome) -> f64 {
            chromosome.selected_indices().iter().map(|&i| i as f64 + 1.0).sum()
        }
    }

    /// Every subset scores the same, so children never beat their parents.
    #[derive(Clone)]
    struct FlatEvaluator;

    impl Evaluator for FlatEvaluator {
        fn evaluate(&mut self, _chromosome: &Chromosome) -> f64 {
            1.0
        }
    }

    fn control(population: usize, size: usize, max: usize) -> Control {
        Control::builder()
            .population_size(population)
            .chromosome_size(size)
            .min_variables(1)
            .max_variables(max)
            .mutation_probability(0.2)
            .max_mating_tries(4)
            .max_duplicate_elimination_tries(2)
            .build()
            .unwrap()
    }

    fn generation<E: Evaluator>(control: &Control, evaluator: &mut E, rng: &mut RandomStream) -> Generation {
        let chromosomes = (0..control.population_size())
            .map(|_| {
                let mut c = Chromosome::random(control, rng);
                evaluate_into(evaluator, &mut c).unwrap();
                c
            })
            .collect();
        Generation::new(chromosomes).unwrap()
    }

    #[test]
    fn test_couple_acceptable() {
        // parents at 10.0 and 8.0 give a floor of 5.0
        assert!(couple_acceptable(7.0, 10.0, 0.5));
        assert!(couple_acceptable(5.0, 10.0, 0.5));
        assert!(!couple_acceptable(4.0, 10.0, 0.5));
        assert!(!couple_acceptable(9.9, 10.0, 0.0));
        // negative parents widen the band by the absolute value
        assert!(couple_acceptable(-14.0, -10.0, 0.5));
        assert!(!couple_acceptable(-16.0, -10.0, 0.5));
    }

    /// Scores the parent subsets from a table and every other subset alike.
    #[derive(Clone)]
    struct TableEvaluator {
        table: Vec<(Chromosome, f64)>,
        other: f64,
        evaluations: usize,
    }

    impl Evaluator for TableEvaluator {
        fn evaluate(&mut self, chromosome: &Chromosome) -> f64 {
            self.evaluations += 1;
            self.table
                .iter()
                .find(|(c, _)| c == chromosome)
                .map_or(self.other, |&(_, fitness)| fitness)
        }
    }

    /// Ignores the chromosome and scores each call relative to the previous one.
    #[derive(Clone)]
    struct DriftingEvaluator {
        calls: usize,
        base: f64,
        step: f64,
    }

    impl Evaluator for DriftingEvaluator {
        fn evaluate(&mut self, _chromosome: &Chromosome) -> f64 {
            self.calls += 1;
            self.base + self.step * self.calls as f64
        }
    }

    fn two_parents() -> (Generation, Vec<(Chromosome, f64)>) {
        let mut mother = Chromosome::from_indices(8, &[0, 1]).unwrap();
        let mut father = Chromosome::from_indices(8, &[2, 3]).unwrap();
        mother.set_fitness(10.0);
        father.set_fitness(8.0);
        let table = vec![(mother.clone(), 10.0), (father.clone(), 8.0)];
        (Generation::new(vec![mother, father]).unwrap(), table)
    }

    fn couple_control(tries: usize, threshold: f64) -> Control {
        Control::builder()
            .population_size(2)
            .chromosome_size(8)
            .min_variables(1)
            .max_variables(4)
            .mutation_probability(0.0)
            .max_mating_tries(tries)
            .bad_solution_threshold(threshold)
            .build()
            .unwrap()
    }

    #[test]
    fn test_children_within_threshold_are_kept() {
        // parents at 10.0 and 8.0 with threshold 0.5 tolerate children down to 5.0
        let control = couple_control(1, 0.5);
        let (generation, table) = two_parents();

        let mut saw_plain_child = false;
        for seed in 0..10 {
            let mut evaluator = TableEvaluator {
                table: table.clone(),
                other: 7.0,
                evaluations: 0,
            };
            let mut rng = RandomStream::new(seed);
            let range = RangeMater::new(&control, &generation, &mut evaluator, &mut rng)
                .mate(2)
                .unwrap();
            let fitness: Vec<f64> = range.iter().filter_map(Chromosome::fitness).collect();
            assert_eq!(fitness.len(), 2);
            assert!(fitness.iter().all(|f| [7.0, 8.0, 10.0].contains(f)));
            saw_plain_child |= fitness.contains(&7.0);
        }
        assert!(saw_plain_child);
    }

    #[test]
    fn test_children_below_threshold_are_discarded() {
        let control = couple_control(1, 0.5);
        let (generation, table) = two_parents();

        let mut evaluations = 0;
        for seed in 0..10 {
            let mut evaluator = TableEvaluator {
                table: table.clone(),
                other: 4.0,
                evaluations: 0,
            };
            let mut rng = RandomStream::new(seed);
            let range = RangeMater::new(&control, &generation, &mut evaluator, &mut rng)
                .mate(2)
                .unwrap();
            // only a crossover reproducing both parents clears the 5.0 floor
            let fitness: Vec<Option<f64>> = range.iter().map(Chromosome::fitness).collect();
            assert_eq!(fitness, vec![Some(10.0), Some(8.0)]);
            evaluations += evaluator.evaluations;
        }
        // dropped couples were bred and scored without taking a slot
        assert!(evaluations > 2 * 10);
    }

    #[test]
    fn test_better_proposals_replace_children() {
        // every score stays below the better parent, so all retries run
        let control = couple_control(4, 1.0);
        let (generation, _) = two_parents();
        let mut evaluator = DriftingEvaluator {
            calls: 0,
            base: 0.0,
            step: 1.0,
        };
        let mut rng = RandomStream::new(8);

        let range = RangeMater::new(&control, &generation, &mut evaluator, &mut rng)
            .mate(1)
            .unwrap();
        // two children plus at least one proposal for each of three retries
        assert!(evaluator.calls >= 5);
        assert_eq!(range[0].fitness(), Some(evaluator.calls as f64));
    }

    #[test]
    fn test_worse_proposals_never_replace_children() {
        let control = couple_control(4, 1.0);
        let (generation, _) = two_parents();
        let mut evaluator = DriftingEvaluator {
            calls: 0,
            base: 9.0,
            step: -1.0,
        };
        let mut rng = RandomStream::new(8);

        let range = RangeMater::new(&control, &generation, &mut evaluator, &mut rng)
            .mate(1)
            .unwrap();
        assert!(evaluator.calls >= 5);
        // the first child of the first crossover stays best
        assert_eq!(range[0].fitness(), Some(8.0));
    }

    #[test]
    fn test_range_buffer_fills_from_both_ends() {
        let c = |i: usize| Chromosome::from_indices(8, &[i]).unwrap();
        let mut buffer = RangeBuffer::new(5);
        buffer.push_lower(c(0));
        buffer.push_upper(c(4));
        buffer.push_lower(c(1));
        buffer.push_upper(c(3));
        assert_eq!(buffer.remaining(), 1);
        assert!(buffer.contains(&c(3)));
        assert!(!buffer.contains(&c(2)));
        buffer.push_lower(c(2));
        assert_eq!(buffer.remaining(), 0);

        let order: Vec<Vec<usize>> = buffer.into_range().iter().map(|c| c.selected_indices()).collect();
        assert_eq!(order, vec![vec![0], vec![1], vec![2], vec![3], vec![4]]);
    }

    #[test]
    fn test_mate_fills_range_with_unique_bounded_children() {
        let control = control(30, 16, 5);
        let mut rng = RandomStream::new(11);
        let mut evaluator = SumEvaluator;
        let generation = generation(&control, &mut evaluator, &mut rng);

        for len in [1, 2, 7, 30] {
            let range = RangeMater::new(&control, &generation, &mut evaluator, &mut rng)
                .mate(len)
                .unwrap();
            assert_eq!(range.len(), len);
            assert!(range.iter().all(Chromosome::is_evaluated));
            assert!(range.iter().all(|c| (1..=5).contains(&c.variable_count())));
            for (i, a) in range.iter().enumerate() {
                assert!(range[i + 1..].iter().all(|b| a != b));
            }
        }
    }

    #[test]
    fn test_mate_is_deterministic() {
        let control = control(20, 12, 4);
        let mut evaluator = SumEvaluator;
        let mut rng = RandomStream::new(5);
        let generation = generation(&control, &mut evaluator, &mut rng);

        let mut first_rng = RandomStream::new(99);
        let mut second_rng = RandomStream::new(99);
        let first = RangeMater::new(&control, &generation, &mut evaluator, &mut first_rng)
            .mate(20)
            .unwrap();
        let second = RangeMater::new(&control, &generation, &mut SumEvaluator, &mut second_rng)
            .mate(20)
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_duplicates_are_eliminated_in_a_crowded_universe() {
        // 6 variables with at most 2 selected leave 21 subsets for 20 slots
        let control = control(20, 6, 2);
        let mut rng = RandomStream::new(3);
        let mut evaluator = FlatEvaluator;
        let generation = generation(&control, &mut evaluator, &mut rng);

        let range = RangeMater::new(&control, &generation, &mut evaluator, &mut rng)
            .mate(20)
            .unwrap();
        let unique: std::collections::HashSet<_> = range.iter().collect();
        assert_eq!(unique.len(), 20);
    }

    #[test]
    fn test_interrupt_stops_mating() {
        let control = control(10, 10, 3);
        let mut rng = RandomStream::new(3);
        let mut evaluator = SumEvaluator;
        let generation = generation(&control, &mut evaluator, &mut rng);

        let interrupt = InterruptFlag::new();
        interrupt.raise();
        let result = RangeMater::new(&control, &generation, &mut evaluator, &mut rng)
            .with_interrupt(&interrupt)
            .mate(10);
        match result {
            Err(GeneticError::Interrupted) => (),
            other => panic!("Expected Interrupted, got {:?}", other),
        }
    }
}
