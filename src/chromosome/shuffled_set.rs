use rand::Rng;

/// Draws distinct positions out of `0..size` without replacement.
///
/// Each draw performs one step of a Fisher–Yates shuffle on the held
/// permutation, so a position never comes up twice within one pass and no
/// rejection sampling is needed. A new pass is started with [`ShuffledSet::reset`];
/// the permutation itself is kept between passes, only the cursor rewinds.
#[derive(Debug, Clone)]
pub struct ShuffledSet {
    positions: Vec<usize>,
    drawn: usize,
}

impl ShuffledSet {
    pub fn new(size: usize) -> Self {
        Self {
            positions: (0..size).collect(),
            drawn: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Starts a new pass over all positions.
    pub fn reset(&mut self) {
        self.drawn = 0;
    }

    /// Positions still available in the current pass.
    pub fn remaining(&self) -> usize {
        self.positions.len() - self.drawn
    }

    /// Draws the next position of the current pass, or `None` once every position was drawn.
    pub fn draw<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<usize> {
        if self.drawn == self.positions.len() {
            return None;
        }
        let pick = rng.gen_range(self.drawn..self.positions.len());
        self.positions.swap(self.drawn, pick);
        self.drawn += 1;
        Some(self.positions[self.drawn - 1])
    }
}
