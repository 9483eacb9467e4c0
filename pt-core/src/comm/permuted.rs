use crate::comm::{Entangler, Wire};
use crate::error::PtError;

/// A logical vector distributed across processes, addressable by global
/// index through an [`Entangler`].
///
/// The global state is the concatenation of per-rank shards in rank
/// order. Both operations are collective and double as synchronization
/// barriers; both require the indices supplied across all processes to
/// form a permutation of the global index space.
pub struct PermutedDistributedArray<T: Wire> {
    local: Vec<T>,
}

impl<T: Wire> PermutedDistributedArray<T> {
    /// Build from this rank's shard. `init(i)` receives the local slot
    /// index; use the entangler to translate to global indices.
    pub fn new(entangler: &Entangler, init: impl FnMut(usize) -> T) -> Self {
        let local = (0..entangler.n_local()).map(init).collect();
        Self { local }
    }

    /// This rank's shard, in local slot order.
    pub fn local(&self) -> &[T] {
        &self.local
    }

    /// Fetch the current value at global index `indices[i]` for each
    /// local slot `i`.
    ///
    /// One request/reply round trip: requesters send their own global
    /// slot id to the owner of the requested index, owners reply with
    /// the value. Both legs ride `transmit`, so a non-permutation index
    /// set fails with `PermutationViolation`.
    pub fn permuted_get(
        &self,
        entangler: &Entangler,
        indices: &[usize],
    ) -> Result<Vec<T>, PtError> {
        let requesters: Vec<u64> = (0..entangler.n_local())
            .map(|i| entangler.global_index(i) as u64)
            .collect();
        // After this, local slot j holds the global id of whoever asked
        // for slot j's value.
        let asked_by = entangler.transmit(&requesters, indices)?;
        let reply_to: Vec<usize> = asked_by.into_iter().map(|g| g as usize).collect();
        entangler.transmit(&self.local, &reply_to)
    }

    /// Write `values[i]` to the position at global index `keys[i]` for
    /// each local slot `i`, replacing this rank's shard with whatever
    /// was addressed to it.
    pub fn permuted_set(
        &mut self,
        entangler: &Entangler,
        keys: &[usize],
        values: &[T],
    ) -> Result<(), PtError> {
        self.local = entangler.transmit(values, keys)?;
        Ok(())
    }
}
