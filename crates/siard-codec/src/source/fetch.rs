//! Fetch-size degrade ladder.
//!
//! Three sizes are tried in order: the configured default, a reduced size and
//! a minimal size. Opening a cursor walks the whole ladder; advancing an open
//! cursor only walks the sizes below the one it currently uses.

/// Bounded sequence of fetch sizes, largest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchLadder {
    sizes: [usize; 3],
}

impl FetchLadder {
    pub fn new(default_size: usize, reduced_size: usize, minimal_size: usize) -> Self {
        Self {
            sizes: [default_size, reduced_size, minimal_size],
        }
    }

    /// Every size, in the order they are tried.
    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    pub fn default_size(&self) -> usize {
        self.sizes[0]
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Retry sizes for a cursor currently fetching `current` rows at a time.
    ///
    /// Only the reduced and minimal sizes are candidates. A current size of 0
    /// means the driver chose its own and counts as larger than any of them.
    pub fn below(&self, current: usize) -> impl Iterator<Item = usize> + '_ {
        self.sizes[1..]
            .iter()
            .copied()
            .filter(move |&size| current == 0 || size < current)
    }
}

impl Default for FetchLadder {
    fn default() -> Self {
        Self::new(1000, 10, 1)
    }
}
