use crate::{
    Digest,
    digest::{read_digests, write_digests},
    utils::{ByteReader, ByteWriter, Deserializable, DeserializationError, Serializable},
};

// ROOT HISTORY
// ================================================================================================

/// A fixed-capacity ring buffer of the most recent roots of a tree.
///
/// Keeping a short history lets proofs generated against a slightly stale root remain valid
/// after newer batches have been committed. Once full, every new root overwrites the oldest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RootHistory {
    /// Root slots; only the first `filled` slots (modulo wrap-around) hold real roots.
    roots: Vec<Digest>,
    /// Slot holding the newest root.
    current: usize,
    /// Number of slots written so far, saturating at the capacity.
    filled: usize,
}

impl RootHistory {
    /// Creates a history of the given capacity holding `initial` as its only root, at slot `0`.
    ///
    /// # Panics
    /// Panics if `capacity` is zero. Callers validate the capacity beforehand.
    pub fn new(capacity: usize, initial: Digest) -> Self {
        assert!(capacity > 0, "root history must hold at least one root");
        let mut roots = vec![Digest::default(); capacity];
        roots[0] = initial;
        Self { roots, current: 0, filled: 1 }
    }

    /// Returns the maximum number of roots kept.
    pub fn capacity(&self) -> usize {
        self.roots.len()
    }

    /// Returns the number of roots currently held.
    pub fn len(&self) -> usize {
        self.filled
    }

    /// Returns `true` if no root is held.
    ///
    /// A constructed or decoded history always holds at least the root it started from, so this
    /// is `false` in practice.
    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    /// Returns the slot holding the newest root.
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Returns the newest root.
    pub fn current(&self) -> Digest {
        self.roots[self.current]
    }

    /// Returns the root stored in `slot`, if that slot was ever written.
    pub fn get(&self, slot: usize) -> Option<Digest> {
        (slot < self.filled).then(|| self.roots[slot])
    }

    /// Writes `root` into the slot after the current one, overwriting the oldest root once the
    /// buffer is full, and returns the new current slot.
    pub fn push(&mut self, root: Digest) -> usize {
        self.current = (self.current + 1) % self.roots.len();
        self.roots[self.current] = root;
        self.filled = (self.filled + 1).min(self.roots.len());
        self.current
    }

    /// Returns `true` if `root` is one of the roots held.
    pub fn contains(&self, root: &Digest) -> bool {
        self.iter().any(|r| r == root)
    }

    /// Iterates over the held roots, newest first.
    pub fn iter(&self) -> impl Iterator<Item = &Digest> + '_ {
        let capacity = self.roots.len();
        (0..self.filled).map(move |age| &self.roots[(self.current + capacity - age) % capacity])
    }
}

impl Serializable for RootHistory {
    fn write_into<W: ByteWriter>(&self, target: &mut W) {
        write_digests(target, &self.roots);
        target.write_u32(self.current as u32);
        target.write_u32(self.filled as u32);
    }
}

impl Deserializable for RootHistory {
    fn read_from<R: ByteReader>(source: &mut R) -> Result<Self, DeserializationError> {
        let roots = read_digests(source)?;
        let current = source.read_u32()? as usize;
        let filled = source.read_u32()? as usize;
        if roots.is_empty() || current >= roots.len() || filled == 0 || filled > roots.len() {
            return Err(DeserializationError::InvalidValue(format!(
                "inconsistent root history: capacity {}, current {current}, filled {filled}",
                roots.len()
            )));
        }
        Ok(Self { roots, current, filled })
    }
}
