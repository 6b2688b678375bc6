//! Points shared between mesh partitions, and the collective operations that keep them
//! consistent across topology edits.
//!
//! Each rank holds its own [`Mesh`](crate::topology::Mesh). A shared point is recorded on both
//! sides as an arrow to the `(rank, point)` pairs of its copies. When a topology edit renumbers
//! points or creates new ones, the ranks exchange enough information to rebuild the arrows
//! without any global numbering.
use crate::error::FaultError;
use parking_lot::{Condvar, Mutex};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

/// Blocking collective communication between the ranks of a partitioned mesh.
pub trait Communicator: Send + Sync {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    /// Sends `outgoing[r]` to rank `r` and returns the messages received from every rank,
    /// indexed by source rank.
    ///
    /// Every rank of the group must call this the same number of times.
    fn all_to_all(&self, outgoing: Vec<Vec<usize>>) -> Result<Vec<Vec<usize>>, FaultError>;
}

/// The communicator of a single, unpartitioned process.
#[derive(Debug, Copy, Clone, Default)]
pub struct SerialCommunicator;

impl Communicator for SerialCommunicator {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn all_to_all(&self, outgoing: Vec<Vec<usize>>) -> Result<Vec<Vec<usize>>, FaultError> {
        if outgoing.len() != 1 {
            return Err(FaultError::communication(format!(
                "expected 1 outgoing buffer, got {}",
                outgoing.len()
            )));
        }
        Ok(outgoing)
    }
}

#[derive(Debug, Default)]
struct ExchangeState {
    generation: u64,
    arrived: usize,
    /// `mailbox[destination][source]`
    mailbox: Vec<Vec<Vec<usize>>>,
    results: Vec<Option<Vec<Vec<usize>>>>,
}

#[derive(Debug)]
struct LocalGroup {
    size: usize,
    timeout: Duration,
    state: Mutex<ExchangeState>,
    all_arrived: Condvar,
}

/// One rank of a group of in-process ranks, each typically driven by its own thread.
#[derive(Debug, Clone)]
pub struct LocalCommunicator {
    rank: usize,
    group: Arc<LocalGroup>,
}

impl LocalCommunicator {
    /// Creates communicators for all ranks of a new group.
    pub fn group(size: usize) -> Vec<LocalCommunicator> {
        Self::group_with_timeout(size, Duration::from_secs(60))
    }

    /// Like [`group`](Self::group), with a limit on how long a rank waits for its peers before
    /// the exchange fails.
    pub fn group_with_timeout(size: usize, timeout: Duration) -> Vec<LocalCommunicator> {
        let state = ExchangeState {
            generation: 0,
            arrived: 0,
            mailbox: vec![vec![Vec::new(); size]; size],
            results: vec![None; size],
        };
        let group = Arc::new(LocalGroup {
            size,
            timeout,
            state: Mutex::new(state),
            all_arrived: Condvar::new(),
        });
        (0..size)
            .map(|rank| LocalCommunicator {
                rank,
                group: Arc::clone(&group),
            })
            .collect()
    }
}

impl Communicator for LocalCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.group.size
    }

    fn all_to_all(&self, outgoing: Vec<Vec<usize>>) -> Result<Vec<Vec<usize>>, FaultError> {
        let size = self.group.size;
        if outgoing.len() != size {
            return Err(FaultError::communication(format!(
                "expected {} outgoing buffers, got {}",
                size,
                outgoing.len()
            )));
        }

        let mut state = self.group.state.lock();
        let generation = state.generation;
        for (destination, message) in outgoing.into_iter().enumerate() {
            state.mailbox[destination][self.rank] = message;
        }
        state.arrived += 1;

        if state.arrived == size {
            let delivered = std::mem::replace(&mut state.mailbox, vec![vec![Vec::new(); size]; size]);
            state.results = delivered.into_iter().map(Some).collect();
            state.arrived = 0;
            state.generation += 1;
            self.group.all_arrived.notify_all();
        } else {
            while state.generation == generation {
                let wait = self
                    .group
                    .all_arrived
                    .wait_for(&mut state, self.group.timeout);
                if wait.timed_out() && state.generation == generation {
                    return Err(FaultError::communication(format!(
                        "rank {} timed out waiting for peers in all-to-all exchange",
                        self.rank
                    )));
                }
            }
        }

        state.results[self.rank]
            .take()
            .ok_or_else(|| FaultError::communication("exchange result was already consumed"))
    }
}

/// Sends `values` to every rank and returns the values of all ranks, indexed by rank.
pub fn all_gather(comm: &dyn Communicator, values: Vec<usize>) -> Result<Vec<Vec<usize>>, FaultError> {
    comm.all_to_all(vec![values; comm.size()])
}

/// A copy of a local point on another rank.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RemotePoint {
    pub rank: usize,
    pub point: usize,
}

/// Arrows from local points to their copies on other ranks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overlap {
    arrows: BTreeMap<usize, BTreeSet<RemotePoint>>,
}

impl Overlap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, local: usize, rank: usize, remote: usize) {
        self.arrows
            .entry(local)
            .or_default()
            .insert(RemotePoint { rank, point: remote });
    }

    pub fn is_empty(&self) -> bool {
        self.arrows.is_empty()
    }

    /// Number of shared local points.
    pub fn len(&self) -> usize {
        self.arrows.len()
    }

    pub fn is_shared(&self, local: usize) -> bool {
        self.arrows.contains_key(&local)
    }

    /// Copies of `local` on other ranks, ordered by rank.
    pub fn remotes(&self, local: usize) -> impl Iterator<Item = RemotePoint> + '_ {
        self.arrows.get(&local).into_iter().flatten().copied()
    }

    /// The copy of `local` on `rank`, if any.
    pub fn remote_on(&self, local: usize, rank: usize) -> Option<usize> {
        self.remotes(local)
            .find(|remote| remote.rank == rank)
            .map(|remote| remote.point)
    }

    /// Shared local points in increasing order.
    pub fn points(&self) -> impl Iterator<Item = usize> + '_ {
        self.arrows.keys().copied()
    }

    pub fn neighbor_ranks(&self) -> BTreeSet<usize> {
        self.arrows.values().flatten().map(|remote| remote.rank).collect()
    }

    /// Local points shared with `rank`, as `(local, remote)` pairs ordered by local point.
    pub fn shared_with(&self, rank: usize) -> Vec<(usize, usize)> {
        self.arrows
            .iter()
            .filter_map(|(&local, remotes)| {
                remotes
                    .iter()
                    .find(|remote| remote.rank == rank)
                    .map(|remote| (local, remote.point))
            })
            .collect()
    }

    /// The rank owning a point: the lowest rank holding a copy.
    pub fn owner(&self, local: usize, my_rank: usize) -> usize {
        self.remotes(local)
            .map(|remote| remote.rank)
            .fold(my_rank, usize::min)
    }

    pub fn is_owned(&self, local: usize, my_rank: usize) -> bool {
        self.owner(local, my_rank) == my_rank
    }
}

/// Rebuilds the overlap after the local points were renumbered by `renumber`.
///
/// Every rank sends the `(old, new)` pairs of the points it shares with each neighbor, so the
/// remote side of each arrow can be renumbered as well. Points mapped to `None` are dropped.
pub fn renumber_overlap(
    overlap: &Overlap,
    renumber: impl Fn(usize) -> Option<usize>,
    comm: &dyn Communicator,
) -> Result<Overlap, FaultError> {
    let mut outgoing = vec![Vec::new(); comm.size()];
    for (rank, buffer) in outgoing.iter_mut().enumerate() {
        for (local, _) in overlap.shared_with(rank) {
            if let Some(new_local) = renumber(local) {
                buffer.extend_from_slice(&[local, new_local]);
            }
        }
    }

    let incoming = comm.all_to_all(outgoing)?;
    let mut remote_renumbering = BTreeMap::new();
    for (rank, message) in incoming.iter().enumerate() {
        if message.len() % 2 != 0 {
            return Err(FaultError::communication(format!("malformed renumbering message from rank {}", rank)));
        }
        for pair in message.chunks_exact(2) {
            remote_renumbering.insert((rank, pair[0]), pair[1]);
        }
    }

    let mut renumbered = Overlap::new();
    for (&local, remotes) in &overlap.arrows {
        let Some(new_local) = renumber(local) else { continue };
        for remote in remotes {
            if let Some(&new_remote) = remote_renumbering.get(&(remote.rank, remote.point)) {
                renumbered.add(new_local, remote.rank, new_remote);
            }
        }
    }
    Ok(renumbered)
}

/// A key identifying a new point through the old points it was derived from.
///
/// `kind` separates independent key spaces, such as edge midpoints and duplicated vertices.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DerivedKey {
    pub kind: usize,
    /// Old point numbers, sorted.
    pub parents: Vec<usize>,
}

impl DerivedKey {
    pub fn new(kind: usize, mut parents: Vec<usize>) -> Self {
        parents.sort_unstable();
        Self { kind, parents }
    }
}

/// Links new points created independently on several ranks.
///
/// A new point is shared with rank `r` when all of its parents were shared with `r` in
/// `old_overlap` and `r` created a point with the same key. Keys are translated to the
/// receiving rank's numbering through the old overlap before being sent.
pub fn match_derived_points(
    overlap: &mut Overlap,
    old_overlap: &Overlap,
    derived: &BTreeMap<DerivedKey, usize>,
    comm: &dyn Communicator,
) -> Result<(), FaultError> {
    let mut outgoing = vec![Vec::new(); comm.size()];
    for (key, &new_point) in derived {
        let Some(first) = key.parents.first() else { continue };
        for remote in old_overlap.remotes(*first) {
            let remote_parents: Option<Vec<usize>> = key
                .parents
                .iter()
                .map(|&parent| old_overlap.remote_on(parent, remote.rank))
                .collect();
            if let Some(remote_parents) = remote_parents {
                let buffer = &mut outgoing[remote.rank];
                buffer.push(key.kind);
                buffer.push(remote_parents.len());
                buffer.extend_from_slice(&remote_parents);
                buffer.push(new_point);
            }
        }
    }

    let incoming = comm.all_to_all(outgoing)?;
    for (rank, message) in incoming.iter().enumerate() {
        let mut cursor = message.as_slice();
        while !cursor.is_empty() {
            let malformed = || FaultError::communication(format!("malformed derived-point message from rank {}", rank));
            let [kind, len, rest @ ..] = cursor else {
                return Err(malformed());
            };
            if rest.len() < len + 1 {
                return Err(malformed());
            }
            let key = DerivedKey::new(*kind, rest[..*len].to_vec());
            let remote_point = rest[*len];
            if let Some(&local) = derived.get(&key) {
                overlap.add(local, rank, remote_point);
            }
            cursor = &rest[len + 1..];
        }
    }
    Ok(())
}
