pub mod caching;
pub mod chromosome;
pub mod error;
pub mod evolution;
pub mod population;
pub mod rng;
pub mod strategy;

// Re-export commonly used types for convenience
pub use chromosome::Chromosome;
pub use error::{GeneticError, OptionExt, Result};
pub use evolution::{Control, Evaluator, EvolutionEngine, EvolutionResult, InterruptFlag, Verbosity};
pub use rng::RandomStream;
