//! # Chromosome
//!
//! A `Chromosome` encodes one candidate subset of the variable universe as a
//! fixed-length bit vector packed into 64-bit words, together with its cached
//! fitness.
//!
//! When the universe size is not a multiple of 64, the unused bits are the least
//! significant bits of the *first* word. They are always zero and never show up
//! in counts or iterations.
//!
//! Every chromosome handed out by the engine selects between
//! [`Control::lower_variable_bound`] and [`Control::max_variables`] variables.
//! Raw crossover children are the exception: they are repaired by the mating
//! protocol before they are accepted.
//!
//! ## Example
//!
//! ```rust
//! use genvarsel::chromosome::Chromosome;
//! use genvarsel::evolution::control::Control;
//! use genvarsel::rng::RandomStream;
//!
//! let control = Control::builder()
//!     .chromosome_size(10)
//!     .min_variables(1)
//!     .max_variables(5)
//!     .build()
//!     .unwrap();
//! let mut rng = RandomStream::new(42);
//!
//! let chromosome = Chromosome::random(&control, &mut rng);
//! assert!((1..=5).contains(&chromosome.variable_count()));
//! assert!(chromosome.fitness().is_none());
//! ```

pub mod shuffled_set;

use std::fmt;
use std::hash::{Hash, Hasher};

use rand::seq::SliceRandom;
use rand::RngCore;

use crate::error::{GeneticError, Result};
use crate::evolution::control::Control;
use crate::rng::RandomStream;

pub use shuffled_set::ShuffledSet;

const BITS_PER_WORD: usize = u64::BITS as usize;

/// A bit-encoded variable subset with its cached fitness.
#[derive(Debug, Clone)]
pub struct Chromosome {
    words: Vec<u64>,
    size: usize,
    unused_bits: usize,
    fitness: Option<f64>,
}

impl Chromosome {
    /// Creates a chromosome over `size` variables with nothing selected.
    pub fn empty(size: usize) -> Self {
        let num_words = size.div_ceil(BITS_PER_WORD).max(1);
        Self {
            words: vec![0; num_words],
            size,
            unused_bits: num_words * BITS_PER_WORD - size,
            fitness: None,
        }
    }

    /// Creates a chromosome over `size` variables selecting exactly `indices`.
    ///
    /// # Errors
    ///
    /// Returns `GeneticError::Configuration` if an index lies outside the universe.
    pub fn from_indices(size: usize, indices: &[usize]) -> Result<Self> {
        let mut chromosome = Self::empty(size);
        for &idx in indices {
            if idx >= size {
                return Err(GeneticError::Configuration(format!(
                    "Variable index {} is outside of a universe of {} variables",
                    idx, size
                )));
            }
            chromosome.set(idx, true);
        }
        Ok(chromosome)
    }

    /// Creates a randomly initialized chromosome.
    ///
    /// The number of selected variables is uniform over the allowed range and the
    /// positions are drawn without replacement.
    pub fn random(control: &Control, rng: &mut RandomStream) -> Self {
        let mut chromosome = Self::empty(control.chromosome_size());
        chromosome.randomly_reset(control, rng);
        chromosome
    }

    /// Reinitializes this chromosome randomly, discarding bits and fitness.
    pub fn randomly_reset(&mut self, control: &Control, rng: &mut RandomStream) {
        self.randomly_reset_with(control, rng, &mut ShuffledSet::new(self.size));
    }

    /// [`Chromosome::randomly_reset`] drawing from a caller-owned `positions`
    /// set, which is rewound instead of reallocated.
    pub fn randomly_reset_with(
        &mut self,
        control: &Control,
        rng: &mut RandomStream,
        positions: &mut ShuffledSet,
    ) {
        self.words.iter_mut().for_each(|w| *w = 0);
        self.fitness = None;

        let lo = control.lower_variable_bound();
        let hi = control.max_variables().min(self.size);
        let count = lo + rng.index_below(hi - lo + 1);

        self.rewind(positions);
        for _ in 0..count {
            if let Some(pos) = positions.draw(rng) {
                self.set(pos, true);
            }
        }
    }

    /// Number of variables in the universe.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of selected variables.
    pub fn variable_count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_selected(&self, idx: usize) -> bool {
        let (word, mask) = self.locate(idx);
        self.words[word] & mask != 0
    }

    /// The selected variable indices in ascending order.
    pub fn selected_indices(&self) -> Vec<usize> {
        let mut indices = Vec::with_capacity(self.variable_count());
        for (w_idx, &word) in self.words.iter().enumerate() {
            let mut rest = word;
            while rest != 0 {
                let bit = rest.trailing_zeros() as usize;
                indices.push(w_idx * BITS_PER_WORD + bit - self.unused_bits);
                rest &= rest - 1;
            }
        }
        indices
    }

    /// A boolean mask over the variable universe.
    pub fn to_mask(&self) -> Vec<bool> {
        (0..self.size).map(|idx| self.is_selected(idx)).collect()
    }

    /// The cached fitness, or `None` while the chromosome is unevaluated.
    pub fn fitness(&self) -> Option<f64> {
        self.fitness
    }

    pub fn is_evaluated(&self) -> bool {
        self.fitness.is_some()
    }

    pub(crate) fn set_fitness(&mut self, fitness: f64) {
        self.fitness = Some(fitness);
    }

    /// Fitness used for ranking; unevaluated chromosomes rank below everything.
    pub(crate) fn rank_fitness(&self) -> f64 {
        self.fitness.unwrap_or(f64::NEG_INFINITY)
    }

    /// True if this chromosome is evaluated and strictly fitter than `other`.
    pub fn is_fitter_than(&self, other: &Chromosome) -> bool {
        match (self.fitness, other.fitness) {
            (Some(mine), Some(theirs)) => mine > theirs,
            (Some(_), None) => true,
            _ => false,
        }
    }

    /// Flips a random number of bits while keeping the variable count within bounds.
    ///
    /// The number of flips follows a geometric distribution with parameter
    /// `mutation_probability`, truncated at the chromosome size. Candidate
    /// positions are drawn without replacement; a flip that would push the count
    /// out of bounds is skipped in favor of the next candidate, so at most `size`
    /// candidates are inspected.
    ///
    /// Returns `true` if any bit changed. A changed chromosome loses its fitness.
    pub fn mutate(&mut self, control: &Control, rng: &mut RandomStream) -> bool {
        self.mutate_with(control, rng, &mut ShuffledSet::new(self.size))
    }

    /// [`Chromosome::mutate`] drawing candidate positions from a caller-owned
    /// `positions` set.
    pub fn mutate_with(
        &mut self,
        control: &Control,
        rng: &mut RandomStream,
        positions: &mut ShuffledSet,
    ) -> bool {
        let p = control.mutation_probability();
        let mut flips = 0;
        while flips < self.size && rng.uniform(0.0, 1.0) < p {
            flips += 1;
        }
        if flips == 0 {
            return false;
        }

        let lo = control.lower_variable_bound();
        let hi = control.max_variables();
        let mut count = self.variable_count();
        self.rewind(positions);
        let mut applied = 0;

        while applied < flips {
            let Some(pos) = positions.draw(rng) else {
                break;
            };
            if self.is_selected(pos) {
                if count > lo {
                    self.set(pos, false);
                    count -= 1;
                    applied += 1;
                }
            } else if count < hi {
                self.set(pos, true);
                count += 1;
                applied += 1;
            }
        }

        if applied > 0 {
            self.fitness = None;
        }
        applied > 0
    }

    /// Uniform crossover with `other`, producing two unevaluated children.
    ///
    /// Every bit of the first child comes from a randomly chosen parent and the
    /// second child receives the bit of the other parent. The children are not
    /// guaranteed to respect the variable bounds.
    ///
    /// # Errors
    ///
    /// Returns `GeneticError::IncompatibleChromosomes` if the two parents span
    /// universes of different sizes.
    pub fn crossover(
        &self,
        other: &Chromosome,
        rng: &mut RandomStream,
    ) -> Result<(Chromosome, Chromosome)> {
        if self.size != other.size {
            return Err(GeneticError::IncompatibleChromosomes {
                expected: self.size,
                actual: other.size,
            });
        }

        let mut child1 = Self::empty(self.size);
        let mut child2 = Self::empty(self.size);
        for (i, (&mine, &theirs)) in self.words.iter().zip(other.words.iter()).enumerate() {
            let mask = rng.next_u64();
            child1.words[i] = (mine & mask) | (theirs & !mask);
            child2.words[i] = (mine & !mask) | (theirs & mask);
        }
        Ok((child1, child2))
    }

    /// Brings a non-empty chromosome back into the allowed variable range.
    ///
    /// Surplus variables are deselected and missing ones selected, both at random
    /// positions. Empty chromosomes are left alone. Returns `true` if any bit changed.
    pub fn repair(&mut self, control: &Control, rng: &mut RandomStream) -> bool {
        let count = self.variable_count();
        let lo = control.lower_variable_bound();
        let hi = control.max_variables();
        if count == 0 || (lo..=hi).contains(&count) {
            return false;
        }

        if count > hi {
            let selected = self.selected_indices();
            for &idx in selected.choose_multiple(rng, count - hi) {
                self.set(idx, false);
            }
        } else {
            let unselected: Vec<usize> = (0..self.size).filter(|&i| !self.is_selected(i)).collect();
            for &idx in unselected.choose_multiple(rng, lo - count) {
                self.set(idx, true);
            }
        }
        self.fitness = None;
        true
    }

    /// Starts a new pass of `positions`, resizing it if it spans another universe.
    fn rewind(&self, positions: &mut ShuffledSet) {
        if positions.len() == self.size {
            positions.reset();
        } else {
            *positions = ShuffledSet::new(self.size);
        }
    }

    fn locate(&self, idx: usize) -> (usize, u64) {
        let global = idx + self.unused_bits;
        (global / BITS_PER_WORD, 1u64 << (global % BITS_PER_WORD))
    }

    fn set(&mut self, idx: usize, value: bool) {
        let (word, mask) = self.locate(idx);
        if value {
            self.words[word] |= mask;
        } else {
            self.words[word] &= !mask;
        }
    }
}

/// Two chromosomes are equal iff they select exactly the same variables.
impl PartialEq for Chromosome {
    fn eq(&self, other: &Self) -> bool {
        self.size == other.size && self.words == other.words
    }
}

impl Eq for Chromosome {}

impl Hash for Chromosome {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.size.hash(state);
        self.words.hash(state);
    }
}

impl fmt::Display for Chromosome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for idx in 0..self.size {
            f.write_str(if self.is_selected(idx) { "1" } else { "0" })?;
        }
        match self.fitness {
            Some(fitness) => write!(f, " ({} variables, fitness {:.6})", self.variable_count(), fitness),
            None => write!(f, " ({} variables, unevaluated)", self.variable_count()),
        }
    }
}
