//! # Caching Module
//!
//! Mating re-crosses the same parents many times and frequently produces a
//! subset that was already scored. `CachingEvaluator` memoizes fitness per
//! selected-variable set so the wrapped evaluator only sees each subset once.
//!
//! Every clone owns an independent cache. Worker threads each receive a clone
//! at pool spawn, so lookups never contend on a lock; the price is that a
//! subset may be scored once per thread.

use std::collections::HashMap;

use crate::chromosome::Chromosome;
use crate::evolution::Evaluator;

/// A wrapper around an evaluator that caches fitness evaluations.
///
/// Keys are the chromosome bit patterns, so chromosomes selecting the same
/// variables share an entry regardless of their own cached fitness.
#[derive(Debug, Clone)]
pub struct CachingEvaluator<E: Evaluator> {
    /// The wrapped evaluator
    evaluator: E,
    cache: HashMap<Chromosome, f64>,
    hits: usize,
}

impl<E: Evaluator> CachingEvaluator<E> {
    pub fn new(evaluator: E) -> Self {
        Self {
            evaluator,
            cache: HashMap::new(),
            hits: 0,
        }
    }

    /// Creates a caching evaluator with a pre-populated cache.
    pub fn with_cache(evaluator: E, cache: HashMap<Chromosome, f64>) -> Self {
        Self {
            evaluator,
            cache,
            hits: 0,
        }
    }

    /// Returns a reference to the wrapped evaluator.
    pub fn inner(&self) -> &E {
        &self.evaluator
    }

    /// Returns the number of cached fitness evaluations.
    pub fn cache_size(&self) -> usize {
        self.cache.len()
    }

    /// Number of evaluations answered from the cache.
    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
        self.hits = 0;
    }

    /// Returns a copy of the cache.
    pub fn get_cache(&self) -> HashMap<Chromosome, f64> {
        self.cache.clone()
    }
}

impl<E: Evaluator> Evaluator for CachingEvaluator<E> {
    fn evaluate(&mut self, chromosome: &Chromosome) -> f64 {
        if let Some(&fitness) = self.cache.get(chromosome) {
            self.hits += 1;
            return fitness;
        }

        let fitness = self.evaluator.evaluate(chromosome);
        self.cache.insert(chromosome.clone(), fitness);
        fitness
    }
}
