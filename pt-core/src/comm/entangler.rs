use crate::comm::{Communicator, LoadBalance};
use crate::error::PtError;

/// Fixed-size record codec for payloads crossing process boundaries.
///
/// The swap subsystem only ever transmits two record shapes (a global
/// index, or a pair of doubles), so the codec is a closed little-endian
/// layout with no framing or version tag.
pub trait Wire: Copy {
    const SIZE: usize;
    fn write(&self, buf: &mut [u8]);
    fn read(buf: &[u8]) -> Self;
}

impl Wire for u64 {
    const SIZE: usize = 8;

    fn write(&self, buf: &mut [u8]) {
        buf.copy_from_slice(&self.to_le_bytes());
    }

    fn read(buf: &[u8]) -> Self {
        u64::from_le_bytes(buf.try_into().unwrap())
    }
}

impl Wire for f64 {
    const SIZE: usize = 8;

    fn write(&self, buf: &mut [u8]) {
        buf.copy_from_slice(&self.to_le_bytes());
    }

    fn read(buf: &[u8]) -> Self {
        f64::from_le_bytes(buf.try_into().unwrap())
    }
}

/// Peer-to-peer collective that permutes payloads across processes by
/// global slot index.
///
/// Each payload record travels with the local offset of its destination
/// slot, so receivers reassemble in O(local slots) without any global
/// coordination beyond the one `exchange` call.
pub struct Entangler {
    load: LoadBalance,
    comm: Communicator,
    /// Current round, carried only so collective errors can name it.
    round: usize,
}

impl Entangler {
    pub fn new(n_global: usize, comm: Communicator) -> Self {
        let load = LoadBalance::new(n_global, comm.size());
        Self {
            load,
            comm,
            round: 0,
        }
    }

    pub fn load(&self) -> &LoadBalance {
        &self.load
    }

    pub fn rank(&self) -> usize {
        self.comm.rank()
    }

    pub fn n_processes(&self) -> usize {
        self.comm.size()
    }

    /// Number of slots owned by this process.
    pub fn n_local(&self) -> usize {
        self.load.local_size(self.comm.rank())
    }

    /// Global index of local slot `i`.
    pub fn global_index(&self, i: usize) -> usize {
        self.load.global(self.comm.rank(), i)
    }

    /// Record the round number used in collective error reports.
    pub fn set_round(&mut self, round: usize) {
        self.round = round;
    }

    /// Gather one serialized blob per rank, in rank order.
    pub fn all_gather(&self, bytes: Vec<u8>) -> Result<Vec<Vec<u8>>, PtError> {
        self.comm.all_gather(bytes)
    }

    /// Route `values[i]` to the slot at global index `destinations[i]`.
    ///
    /// Returns, for each local slot, the payload some sender addressed to
    /// it. Requires the union of `destinations` across all processes to
    /// be a permutation of the global index space; a duplicate or missing
    /// delivery for an owned slot fails with `PermutationViolation`.
    /// Collective: every process must call this in the same order.
    pub fn transmit<T: Wire>(
        &self,
        values: &[T],
        destinations: &[usize],
    ) -> Result<Vec<T>, PtError> {
        let n_local = self.n_local();
        assert_eq!(values.len(), n_local, "one value per local slot");
        assert_eq!(destinations.len(), n_local, "one destination per local slot");

        let record = 4 + T::SIZE;
        let mut buckets: Vec<Vec<u8>> = vec![Vec::new(); self.comm.size()];
        let mut scratch = vec![0u8; T::SIZE];
        for (value, &dest) in values.iter().zip(destinations.iter()) {
            if dest >= self.load.n_global {
                return Err(PtError::PermutationViolation {
                    round: self.round,
                    detail: format!(
                        "destination {dest} outside global range 0..{}",
                        self.load.n_global
                    ),
                });
            }
            let bucket = &mut buckets[self.load.owner(dest)];
            bucket.extend_from_slice(&(self.load.offset(dest) as u32).to_le_bytes());
            value.write(&mut scratch);
            bucket.extend_from_slice(&scratch);
        }

        let received = self.comm.exchange(buckets)?;

        let mut out: Vec<Option<T>> = vec![None; n_local];
        for (from, bucket) in received.iter().enumerate() {
            if bucket.len() % record != 0 {
                return Err(PtError::comm(format!(
                    "rank {from} sent a torn buffer of {} bytes",
                    bucket.len()
                )));
            }
            for chunk in bucket.chunks_exact(record) {
                let slot = u32::from_le_bytes(chunk[..4].try_into().unwrap()) as usize;
                if slot >= n_local {
                    return Err(PtError::PermutationViolation {
                        round: self.round,
                        detail: format!("rank {from} addressed nonexistent local slot {slot}"),
                    });
                }
                if out[slot].is_some() {
                    return Err(PtError::PermutationViolation {
                        round: self.round,
                        detail: format!(
                            "global slot {} received two payloads",
                            self.global_index(slot)
                        ),
                    });
                }
                out[slot] = Some(T::read(&chunk[4..]));
            }
        }

        let mut result = Vec::with_capacity(n_local);
        for (slot, value) in out.into_iter().enumerate() {
            match value {
                Some(v) => result.push(v),
                None => {
                    return Err(PtError::PermutationViolation {
                        round: self.round,
                        detail: format!("global slot {} received nothing", self.global_index(slot)),
                    })
                }
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::LocalComm;
    use std::thread;

    #[test]
    fn solo_identity_and_reversal() {
        let ent = Entangler::new(4, Communicator::Solo);
        let values: Vec<u64> = vec![10, 11, 12, 13];

        let out = ent.transmit(&values, &[0, 1, 2, 3]).unwrap();
        assert_eq!(out, vec![10, 11, 12, 13]);

        let out = ent.transmit(&values, &[3, 2, 1, 0]).unwrap();
        assert_eq!(out, vec![13, 12, 11, 10]);
    }

    #[test]
    fn solo_duplicate_destination_fails() {
        let ent = Entangler::new(3, Communicator::Solo);
        let err = ent.transmit(&[1u64, 2, 3], &[0, 0, 2]).unwrap_err();
        assert!(matches!(err, PtError::PermutationViolation { .. }));
    }

    #[test]
    fn solo_out_of_range_destination_fails() {
        let ent = Entangler::new(3, Communicator::Solo);
        let err = ent.transmit(&[1u64, 2, 3], &[0, 1, 7]).unwrap_err();
        assert!(matches!(err, PtError::PermutationViolation { .. }));
    }

    // Cross-process cyclic shift over 2 ranks and 6 slots:
    //
    //   rank 0 owns slots 0..3, rank 1 owns slots 3..6
    //   destination of slot g is (g + 1) % 6
    //
    // so slot 2's payload crosses from rank 0 to rank 1, and slot 5's
    // wraps back to rank 0.
    #[test]
    fn threaded_cyclic_shift() {
        let comms = LocalComm::group(2);
        let handles: Vec<_> = comms
            .into_iter()
            .map(|comm| {
                thread::spawn(move || {
                    let ent = Entangler::new(6, comm);
                    let values: Vec<u64> =
                        (0..ent.n_local()).map(|i| ent.global_index(i) as u64).collect();
                    let dests: Vec<usize> =
                        (0..ent.n_local()).map(|i| (ent.global_index(i) + 1) % 6).collect();
                    (ent.rank(), ent.transmit(&values, &dests).unwrap())
                })
            })
            .collect();
        let mut results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        results.sort_by_key(|(rank, _)| *rank);
        // Slot g now holds the payload of slot (g - 1) % 6.
        assert_eq!(results[0].1, vec![5, 0, 1]);
        assert_eq!(results[1].1, vec![2, 3, 4]);
    }

    #[test]
    fn threaded_missing_slot_fails_on_owner() {
        // Both ranks send everything to rank 0's slots, so rank 0 sees a
        // duplicate and rank 1 sees a hole. Both must error.
        let comms = LocalComm::group(2);
        let handles: Vec<_> = comms
            .into_iter()
            .map(|comm| {
                thread::spawn(move || {
                    let ent = Entangler::new(4, comm);
                    let values = vec![0u64; ent.n_local()];
                    let dests: Vec<usize> = (0..ent.n_local()).collect();
                    ent.transmit(&values, &dests).unwrap_err()
                })
            })
            .collect();
        for h in handles {
            assert!(matches!(
                h.join().unwrap(),
                PtError::PermutationViolation { .. }
            ));
        }
    }

    #[test]
    fn f64_records_round_trip() {
        let ent = Entangler::new(2, Communicator::Solo);
        let out = ent.transmit(&[0.5f64, -3.25], &[1, 0]).unwrap();
        assert_eq!(out, vec![-3.25, 0.5]);
    }
}
