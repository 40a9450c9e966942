//! # Control
//!
//! The `Control` struct holds the read-only configuration of one evolution run:
//! population and chromosome sizes, the bounds on the number of selected
//! variables, mutation and retry parameters, the generation and thread counts.
//! It is validated once, wrapped in an `Arc` and shared by every thread.
//!
//! ## Example
//!
//! ```rust
//! use genvarsel::evolution::control::{Control, Verbosity};
//!
//! let control = Control::builder()
//!     .population_size(100)
//!     .chromosome_size(40)
//!     .min_variables(2)
//!     .max_variables(10)
//!     .num_generations(50)
//!     .num_threads(4)
//!     .verbosity(Verbosity::On)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(control.population_size(), 100);
//! assert_eq!(control.lower_variable_bound(), 2);
//! ```
//!
//! ## Verbosity
//!
//! - `Off`: Only warnings are emitted.
//! - `On`: One event per generation and a pool summary.
//! - `Verbose`: Fitness statistics for every generation.
//! - `Debug`: Details of every mating couple.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{GeneticError, Result};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    #[default]
    Off,
    On,
    Verbose,
    Debug,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Control {
    population_size: usize,
    chromosome_size: usize,
    min_variables: usize,
    max_variables: usize,
    mutation_probability: f64,
    num_generations: usize,
    num_threads: usize,
    max_mating_tries: usize,
    max_duplicate_elimination_tries: usize,
    bad_solution_threshold: f64,
    elite_size: usize,
    verbosity: Verbosity,
}

impl Control {
    /// Returns a builder for creating a `Control` instance.
    pub fn builder() -> ControlBuilder {
        ControlBuilder::default()
    }

    pub fn population_size(&self) -> usize {
        self.population_size
    }

    /// Size of the variable universe, i.e. the number of bits per chromosome.
    pub fn chromosome_size(&self) -> usize {
        self.chromosome_size
    }

    pub fn min_variables(&self) -> usize {
        self.min_variables
    }

    pub fn max_variables(&self) -> usize {
        self.max_variables
    }

    /// The smallest number of selected variables any chromosome may carry.
    ///
    /// An empty subset can never be evaluated, so this is never below one.
    pub fn lower_variable_bound(&self) -> usize {
        self.min_variables.max(1)
    }

    pub fn mutation_probability(&self) -> f64 {
        self.mutation_probability
    }

    pub fn num_generations(&self) -> usize {
        self.num_generations
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    pub fn max_mating_tries(&self) -> usize {
        self.max_mating_tries
    }

    pub fn max_duplicate_elimination_tries(&self) -> usize {
        self.max_duplicate_elimination_tries
    }

    /// Tolerated relative loss of the better child against the better parent.
    pub fn bad_solution_threshold(&self) -> f64 {
        self.bad_solution_threshold
    }

    pub fn elite_size(&self) -> usize {
        self.elite_size
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    /// Checks that the values can drive a run.
    ///
    /// # Errors
    ///
    /// Returns `GeneticError::Configuration` naming the first offending value.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(GeneticError::Configuration(msg));

        if self.population_size < 2 {
            return fail(format!(
                "Population size must be at least 2, got {}",
                self.population_size
            ));
        }
        if self.chromosome_size == 0 {
            return fail("Chromosome size cannot be zero".to_string());
        }
        if self.max_variables == 0 || self.max_variables > self.chromosome_size {
            return fail(format!(
                "Maximum number of variables must be in [1, {}], got {}",
                self.chromosome_size, self.max_variables
            ));
        }
        if self.min_variables > self.max_variables {
            return fail(format!(
                "Minimum number of variables ({}) exceeds the maximum ({})",
                self.min_variables, self.max_variables
            ));
        }
        if !(0.0..1.0).contains(&self.mutation_probability) {
            return fail(format!(
                "Mutation probability must be in [0, 1), got {}",
                self.mutation_probability
            ));
        }
        if !self.bad_solution_threshold.is_finite() || self.bad_solution_threshold < 0.0 {
            return fail(format!(
                "Bad solution threshold must be a non-negative number, got {}",
                self.bad_solution_threshold
            ));
        }
        if self.num_threads == 0 {
            return fail("Number of threads cannot be zero".to_string());
        }
        if self.max_mating_tries == 0 {
            return fail("Maximum number of mating tries cannot be zero".to_string());
        }

        let distinct = distinct_subsets(
            self.chromosome_size,
            self.lower_variable_bound(),
            self.max_variables,
        );
        if distinct < self.population_size as u128 {
            return fail(format!(
                "Only {} distinct variable subsets exist, cannot fill a population of {}",
                distinct, self.population_size
            ));
        }

        Ok(())
    }
}

impl Default for Control {
    fn default() -> Self {
        Self {
            population_size: 100,
            chromosome_size: 32,
            min_variables: 1,
            max_variables: 32,
            mutation_probability: 0.01,
            num_generations: 100,
            num_threads: 1,
            max_mating_tries: 5,
            max_duplicate_elimination_tries: 0,
            bad_solution_threshold: 1.0,
            elite_size: 10,
            verbosity: Verbosity::Off,
        }
    }
}

/// Number of subsets of `n` elements with between `lo` and `hi` members, saturating.
fn distinct_subsets(n: usize, lo: usize, hi: usize) -> u128 {
    let mut total: u128 = 0;
    // C(n, k) built incrementally; once it saturates the total already does.
    let mut binom: u128 = 1;
    for k in 0..=hi.min(n) {
        if k > 0 {
            binom = match binom.checked_mul((n - k + 1) as u128) {
                Some(v) => v / k as u128,
                None => return u128::MAX,
            };
        }
        if k >= lo {
            total = total.saturating_add(binom);
        }
    }
    total
}

/// Builder for `Control`.
///
/// Provides a fluent interface; unset fields keep their defaults.
#[derive(Debug, Clone, Default)]
pub struct ControlBuilder {
    population_size: Option<usize>,
    chromosome_size: Option<usize>,
    min_variables: Option<usize>,
    max_variables: Option<usize>,
    mutation_probability: Option<f64>,
    num_generations: Option<usize>,
    num_threads: Option<usize>,
    max_mating_tries: Option<usize>,
    max_duplicate_elimination_tries: Option<usize>,
    bad_solution_threshold: Option<f64>,
    elite_size: Option<usize>,
    verbosity: Option<Verbosity>,
}

impl ControlBuilder {
    pub fn population_size(mut self, value: usize) -> Self {
        self.population_size = Some(value);
        self
    }

    pub fn chromosome_size(mut self, value: usize) -> Self {
        self.chromosome_size = Some(value);
        self
    }

    pub fn min_variables(mut self, value: usize) -> Self {
        self.min_variables = Some(value);
        self
    }

    pub fn max_variables(mut self, value: usize) -> Self {
        self.max_variables = Some(value);
        self
    }

    pub fn mutation_probability(mut self, value: f64) -> Self {
        self.mutation_probability = Some(value);
        self
    }

    pub fn num_generations(mut self, value: usize) -> Self {
        self.num_generations = Some(value);
        self
    }

    pub fn num_threads(mut self, value: usize) -> Self {
        self.num_threads = Some(value);
        self
    }

    pub fn max_mating_tries(mut self, value: usize) -> Self {
        self.max_mating_tries = Some(value);
        self
    }

    pub fn max_duplicate_elimination_tries(mut self, value: usize) -> Self {
        self.max_duplicate_elimination_tries = Some(value);
        self
    }

    pub fn bad_solution_threshold(mut self, value: f64) -> Self {
        self.bad_solution_threshold = Some(value);
        self
    }

    pub fn elite_size(mut self, value: usize) -> Self {
        self.elite_size = Some(value);
        self
    }

    pub fn verbosity(mut self, value: Verbosity) -> Self {
        self.verbosity = Some(value);
        self
    }

    /// Builds and validates the `Control` instance.
    ///
    /// When only the chromosome size is given, the maximum number of variables
    /// follows it.
    pub fn build(self) -> Result<Control> {
        let defaults = Control::default();
        let chromosome_size = self.chromosome_size.unwrap_or(defaults.chromosome_size);
        let control = Control {
            population_size: self.population_size.unwrap_or(defaults.population_size),
            chromosome_size,
            min_variables: self.min_variables.unwrap_or(defaults.min_variables),
            max_variables: self.max_variables.unwrap_or(chromosome_size),
            mutation_probability: self
                .mutation_probability
                .unwrap_or(defaults.mutation_probability),
            num_generations: self.num_generations.unwrap_or(defaults.num_generations),
            num_threads: self.num_threads.unwrap_or(defaults.num_threads),
            max_mating_tries: self.max_mating_tries.unwrap_or(defaults.max_mating_tries),
            max_duplicate_elimination_tries: self
                .max_duplicate_elimination_tries
                .unwrap_or(defaults.max_duplicate_elimination_tries),
            bad_solution_threshold: self
                .bad_solution_threshold
                .unwrap_or(defaults.bad_solution_threshold),
            elite_size: self.elite_size.unwrap_or(defaults.elite_size),
            verbosity: self.verbosity.unwrap_or(defaults.verbosity),
        };
        control.validate()?;
        Ok(control)
    }
}
