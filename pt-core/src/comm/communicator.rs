use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::PtError;

/// How long a rank waits for its peers inside a collective before the
/// round is declared lost.
const COLLECTIVE_TIMEOUT: Duration = Duration::from_secs(30);

/// Process-group handle injected into the entangler at construction.
///
/// The set of backends is closed: `Solo` for a single process and
/// `Local` for a thread-per-rank group sharing mailbox channels. Both
/// expose the same two collectives, `exchange` (one byte buffer per
/// peer, all-to-all) and `all_gather` (same bytes to every rank). All
/// ranks must call the collectives in the same order; each call is a
/// synchronization point.
#[derive(Debug)]
pub enum Communicator {
    Solo,
    Local(LocalComm),
}

impl Communicator {
    /// This process's rank, in `0..size()`.
    pub fn rank(&self) -> usize {
        match self {
            Communicator::Solo => 0,
            Communicator::Local(c) => c.rank,
        }
    }

    /// Number of processes in the group.
    pub fn size(&self) -> usize {
        match self {
            Communicator::Solo => 1,
            Communicator::Local(c) => c.size,
        }
    }

    /// All-to-all exchange: `outgoing[p]` is delivered to rank `p`, and
    /// the returned vector holds one buffer per sender, in rank order.
    /// The buffer addressed to this rank is moved, never copied.
    pub fn exchange(&self, mut outgoing: Vec<Vec<u8>>) -> Result<Vec<Vec<u8>>, PtError> {
        if outgoing.len() != self.size() {
            return Err(PtError::comm(format!(
                "exchange expects {} buffers, got {}",
                self.size(),
                outgoing.len()
            )));
        }
        match self {
            Communicator::Solo => Ok(outgoing),
            Communicator::Local(c) => {
                let own = std::mem::take(&mut outgoing[c.rank]);
                for (peer, bytes) in outgoing.into_iter().enumerate() {
                    if peer != c.rank {
                        c.send(peer, bytes)?;
                    }
                }
                let mut incoming: Vec<Option<Vec<u8>>> = (0..c.size).map(|_| None).collect();
                incoming[c.rank] = Some(own);
                c.collect(&mut incoming)?;
                Ok(incoming.into_iter().map(|b| b.unwrap()).collect())
            }
        }
    }

    /// Deliver the same bytes to every rank; returns one buffer per rank
    /// in rank order (this rank's own contribution included).
    pub fn all_gather(&self, bytes: Vec<u8>) -> Result<Vec<Vec<u8>>, PtError> {
        match self {
            Communicator::Solo => Ok(vec![bytes]),
            Communicator::Local(c) => {
                for peer in 0..c.size {
                    if peer != c.rank {
                        c.send(peer, bytes.clone())?;
                    }
                }
                let mut incoming: Vec<Option<Vec<u8>>> = (0..c.size).map(|_| None).collect();
                incoming[c.rank] = Some(bytes);
                c.collect(&mut incoming)?;
                Ok(incoming.into_iter().map(|b| b.unwrap()).collect())
            }
        }
    }
}

struct Packet {
    from: usize,
    bytes: Vec<u8>,
}

/// One rank of a thread-backed process group.
///
/// Each rank owns a mailbox receiver and a sender handle to every peer.
/// Channels are FIFO per sender and every collective moves exactly one
/// packet per (sender, receiver) pair, so consecutive collectives cannot
/// interleave even without sequence tags.
pub struct LocalComm {
    rank: usize,
    size: usize,
    peers: Vec<Sender<Packet>>,
    inbox: Mutex<Receiver<Packet>>,
}

impl std::fmt::Debug for LocalComm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalComm")
            .field("rank", &self.rank)
            .field("size", &self.size)
            .finish()
    }
}

impl LocalComm {
    /// Create a connected group of `size` communicators, one per rank.
    /// Each element is meant to move onto its own thread.
    pub fn group(size: usize) -> Vec<Communicator> {
        assert!(size > 0, "group size must be positive");
        let (senders, receivers): (Vec<_>, Vec<_>) = (0..size).map(|_| channel()).unzip();
        receivers
            .into_iter()
            .enumerate()
            .map(|(rank, rx)| {
                Communicator::Local(LocalComm {
                    rank,
                    size,
                    peers: senders.clone(),
                    inbox: Mutex::new(rx),
                })
            })
            .collect()
    }

    fn send(&self, peer: usize, bytes: Vec<u8>) -> Result<(), PtError> {
        self.peers[peer]
            .send(Packet {
                from: self.rank,
                bytes,
            })
            .map_err(|_| PtError::comm(format!("rank {peer} hung up")))
    }

    /// Receive until every empty slot in `incoming` is filled, matching
    /// packets to slots by sender rank.
    fn collect(&self, incoming: &mut [Option<Vec<u8>>]) -> Result<(), PtError> {
        let inbox = self
            .inbox
            .lock()
            .map_err(|_| PtError::comm("inbox mutex poisoned"))?;
        let mut missing = incoming.iter().filter(|b| b.is_none()).count();
        while missing > 0 {
            let packet = inbox
                .recv_timeout(COLLECTIVE_TIMEOUT)
                .map_err(|e| PtError::comm(format!("rank {} recv: {e}", self.rank)))?;
            if incoming[packet.from].is_some() {
                return Err(PtError::comm(format!(
                    "rank {} sent twice in one collective",
                    packet.from
                )));
            }
            incoming[packet.from] = Some(packet.bytes);
            missing -= 1;
        }
        Ok(())
    }
}
