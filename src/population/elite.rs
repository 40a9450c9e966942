use crate::chromosome::Chromosome;

/// The best distinct chromosomes observed over a whole run.
///
/// Members are copies, never aliases into a generation buffer, and are kept in
/// descending order of fitness. A full set only admits a chromosome that is
/// strictly fitter than its worst member, which is then evicted.
///
/// # Examples
///
/// ```
/// use genvarsel::chromosome::Chromosome;
/// use genvarsel::population::EliteSet;
///
/// let mut elite = EliteSet::new(2);
/// assert!(elite.is_empty());
///
/// // unevaluated chromosomes are never admitted
/// assert!(!elite.offer(&Chromosome::from_indices(8, &[1]).unwrap()));
/// ```
#[derive(Debug, Clone)]
pub struct EliteSet {
    capacity: usize,
    members: Vec<Chromosome>,
}

impl EliteSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            members: Vec::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Members ordered from best to worst.
    pub fn members(&self) -> &[Chromosome] {
        &self.members
    }

    pub fn best(&self) -> Option<&Chromosome> {
        self.members.first()
    }

    pub fn worst(&self) -> Option<&Chromosome> {
        self.members.last()
    }

    /// Offers a copy of `candidate` to the set. Returns `true` if it was admitted.
    pub fn offer(&mut self, candidate: &Chromosome) -> bool {
        let Some(fitness) = candidate.fitness() else {
            return false;
        };
        if self.capacity == 0 {
            return false;
        }
        if self.members.len() == self.capacity
            && self.worst().is_some_and(|worst| !candidate.is_fitter_than(worst))
        {
            return false;
        }
        if self.members.contains(candidate) {
            return false;
        }

        let at = self
            .members
            .partition_point(|member| member.rank_fitness() >= fitness);
        self.members.insert(at, candidate.clone());
        self.members.truncate(self.capacity);
        true
    }

    pub fn into_vec(self) -> Vec<Chromosome> {
        self.members
    }
}
