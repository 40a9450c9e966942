//! # Error Types
//!
//! This module defines the error type shared by every part of the variable
//! selection engine. Configuration problems are reported before any generation
//! runs; everything else surfaces from the evolution loop itself.
//!
//! ## Examples
//!
//! Using the `Result` type:
//!
//! ```rust
//! use genvarsel::error::{GeneticError, Result};
//!
//! fn some_function() -> Result<()> {
//!     Ok(())
//! }
//!
//! match some_function() {
//!     Ok(_) => println!("Success!"),
//!     Err(e) => println!("Error: {}", e),
//! }
//! ```
//!
//! Using the `OptionExt` trait to convert `Option` to `Result`:
//!
//! ```rust
//! use genvarsel::error::{GeneticError, OptionExt};
//!
//! fn find_best(scores: &[i32]) -> genvarsel::error::Result<i32> {
//!     scores.iter().max().cloned().ok_or_else_genetic(|| GeneticError::EmptyPopulation)
//! }
//! ```

use thiserror::Error;

/// Represents errors that can occur while evolving variable subsets.
#[derive(Error, Debug)]
pub enum GeneticError {
    /// The run was configured with values that cannot work together.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Two chromosomes over different variable universes were mated.
    #[error("The two chromosomes are not compatible for mating: expected {expected} bits, got {actual}")]
    IncompatibleChromosomes { expected: usize, actual: usize },

    /// The evaluator produced a fitness that cannot be ranked.
    #[error("Fitness calculation error: {0}")]
    FitnessCalculation(String),

    /// The worker pool could not be set up or a worker failed mid-range.
    #[error("Threading error: {0}")]
    Threading(String),

    /// The run was cancelled through its interrupt flag.
    #[error("Evolution was interrupted")]
    Interrupted,

    /// Error that occurs when an empty population is encountered.
    #[error("Empty population error: Cannot operate on an empty population")]
    EmptyPopulation,

    /// Error that occurs when an evolution process fails.
    #[error("Evolution error: {0}")]
    Evolution(String),
}

/// A specialized Result type for variable selection operations.
pub type Result<T> = std::result::Result<T, GeneticError>;

/// Extension trait for Option to convert to Result with a custom error.
pub trait OptionExt<T> {
    /// Converts an Option to a Result using a closure to generate the error.
    fn ok_or_else_genetic<F>(self, err_fn: F) -> Result<T>
    where
        F: FnOnce() -> GeneticError;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_else_genetic<F>(self, err_fn: F) -> Result<T>
    where
        F: FnOnce() -> GeneticError,
    {
        self.ok_or_else(err_fn)
    }
}
