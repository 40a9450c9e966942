//! # MatingStrategy
//!
//! The `MatingStrategy` trait defines how the generations of a run are bred. A
//! strategy receives an initialized [`Population`] and advances it through
//! `num_generations` generations, filling each next generation through
//! [`RangeMater`] and handing it to [`Population::advance`].
//!
//! Two strategies exist: [`SequentialStrategy`] mates the whole generation on
//! the calling thread, and [`ThreadedStrategy`] splits it into contiguous
//! ranges mated by a persistent worker pool.
mod barrier;
pub mod mating;
pub mod sequential;
pub mod threaded;

use std::fmt::Debug;
use std::ops::Range;

use crate::{
    error::Result,
    evolution::{evaluator::Evaluator, interrupt::InterruptFlag},
    population::Population,
    rng::RandomStream,
};

/// # MatingStrategy
///
/// Drives a population through all generations of one run.
pub trait MatingStrategy<E: Evaluator>
where
    Self: Debug + Send + Sync,
{
    /// Breeds `num_generations` generations on top of `population`.
    ///
    /// ## Parameters
    ///
    /// - `population`: The initialized population; it holds the last completed
    ///   generation and the elite set when this returns.
    /// - `evaluator`: The caller's evaluator. Threads other than the caller work
    ///   with clones of it.
    /// - `rng`: The master random stream. Worker streams are seeded from it.
    /// - `interrupt`: Polled by the calling thread between couples.
    ///
    /// ## Errors
    ///
    /// This method can fail if:
    /// - The interrupt flag was raised (`GeneticError::Interrupted`)
    /// - The evaluator produced a non-finite fitness
    /// - A worker thread failed
    fn evolve(
        &self,
        population: &mut Population,
        evaluator: &mut E,
        rng: &mut RandomStream,
        interrupt: &InterruptFlag,
    ) -> Result<()>;
}

/// Splits `population_size` slots into `threads` contiguous ranges.
///
/// Every range gets `population_size / threads` slots and the first
/// `population_size % threads` ranges one more. The last range belongs to the
/// orchestrating thread.
pub fn partition(population_size: usize, threads: usize) -> Vec<Range<usize>> {
    let threads = threads.max(1);
    let per_thread = population_size / threads;
    let mut surplus = population_size % threads;

    let mut ranges = Vec::with_capacity(threads);
    let mut start = 0;
    for _ in 0..threads {
        let mut len = per_thread;
        if surplus > 0 {
            len += 1;
            surplus -= 1;
        }
        ranges.push(start..start + len);
        start += len;
    }
    ranges
}

pub use mating::{couple_acceptable, RangeMater};
pub use sequential::SequentialStrategy;
pub use threaded::ThreadedStrategy;

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_tiles(ranges: &[Range<usize>], total: usize) {
        let mut expected_start = 0;
        for range in ranges {
            assert_eq!(range.start, expected_start);
            expected_start = range.end;
        }
        assert_eq!(expected_start, total);
    }

    #[test]
    fn test_partition_even_split() {
        let ranges = partition(100, 4);
        assert_eq!(ranges, vec![0..25, 25..50, 50..75, 75..100]);
    }

    #[test]
    fn test_partition_uneven_split() {
        let ranges = partition(10, 4);
        let lengths: Vec<usize> = ranges.iter().map(|r| r.len()).collect();
        assert_eq!(lengths, vec![3, 3, 2, 2]);
        assert_tiles(&ranges, 10);
    }

    #[test]
    fn test_partition_more_threads_than_slots() {
        let ranges = partition(3, 5);
        assert_eq!(ranges.len(), 5);
        assert_tiles(&ranges, 3);
        assert!(ranges[3].is_empty() && ranges[4].is_empty());
    }

    #[test]
    fn test_partition_single_thread() {
        assert_eq!(partition(7, 1), vec![0..7]);
        assert_eq!(partition(7, 0), vec![0..7]);
    }
}
