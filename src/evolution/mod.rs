pub mod control;
pub mod engine;
pub mod evaluator;
pub mod interrupt;

pub use control::{Control, ControlBuilder, Verbosity};
pub use engine::{EvolutionEngine, EvolutionResult};
pub use evaluator::Evaluator;
pub use interrupt::InterruptFlag;
