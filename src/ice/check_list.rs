//! Ordered list of [`CandidatePair`]s to run connectivity checks on.

use std::net::IpAddr;

use derive_more::{Display, From};

use super::candidate::Candidate;

/// ID of a [`CandidatePair`] unique within its [`CheckList`].
#[derive(Clone, Copy, Debug, Display, Eq, From, Hash, PartialEq)]
pub struct PairId(pub u64);

/// State of a [`CandidatePair`] in the [`CheckList`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PairState {
    /// Check is not performed yet.
    Waiting,

    /// Check is being performed now.
    InProgress,

    /// Check succeeded, so the pair is usable.
    Succeeded,

    /// All the check attempts failed.
    Failed,
}

/// Pair of a local and a remote [`Candidate`].
#[derive(Clone, Debug, PartialEq)]
pub struct CandidatePair {
    pub id: PairId,
    pub local: Candidate,
    pub remote: Candidate,

    /// [RFC 8445] priority of this pair.
    ///
    /// [RFC 8445]: https://tools.ietf.org/html/rfc8445#section-6.1.2.3
    pub priority: u64,
}

/// Calculates [RFC 8445] pair priority out of the controlling agent's
/// candidate priority `g` and the controlled agent's one `d`.
///
/// [RFC 8445]: https://tools.ietf.org/html/rfc8445#section-6.1.2.3
pub fn pair_priority(g: u32, d: u32) -> u64 {
    let min = u64::from(g.min(d));
    let max = u64::from(g.max(d));
    (min << 32).saturating_add(2 * max + u64::from(g > d))
}

fn priority_for(
    local: &Candidate,
    remote: &Candidate,
    controlling: bool,
) -> u64 {
    if controlling {
        pair_priority(local.priority, remote.priority)
    } else {
        pair_priority(remote.priority, local.priority)
    }
}

/// Indicates whether two [`Candidate`]s may ever reach each other.
fn compatible(local: &Candidate, remote: &Candidate) -> bool {
    if local.component != remote.component
        || local.transport != remote.transport
    {
        return false;
    }
    match (
        local.address.parse::<IpAddr>(),
        remote.address.parse::<IpAddr>(),
    ) {
        (Ok(l), Ok(r)) => l.is_ipv4() == r.is_ipv4(),
        _ => true,
    }
}

#[derive(Debug)]
struct Entry {
    pair: CandidatePair,
    state: PairState,
}

/// [`CandidatePair`]s ordered by descending priority.
#[derive(Debug, Default)]
pub struct CheckList {
    entries: Vec<Entry>,
    last_id: u64,
}

impl CheckList {
    /// Creates new empty [`CheckList`].
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pairs the provided [`Candidate`]s and adds the pair in
    /// [`PairState::Waiting`] state.
    ///
    /// Returns `None` if the [`Candidate`]s are incompatible or such pair
    /// already exists.
    pub fn add(
        &mut self,
        local: &Candidate,
        remote: &Candidate,
        controlling: bool,
    ) -> Option<PairId> {
        if !compatible(local, remote) {
            return None;
        }
        let exists = self.entries.iter().any(|e| {
            e.pair.local.transport_address() == local.transport_address()
                && e.pair.remote.transport_address()
                    == remote.transport_address()
        });
        if exists {
            return None;
        }

        self.last_id += 1;
        let pair = CandidatePair {
            id: PairId(self.last_id),
            local: local.clone(),
            remote: remote.clone(),
            priority: priority_for(local, remote, controlling),
        };
        let id = pair.id;
        let pos = self
            .entries
            .iter()
            .position(|e| e.pair.priority < pair.priority)
            .unwrap_or_else(|| self.entries.len());
        self.entries.insert(
            pos,
            Entry {
                pair,
                state: PairState::Waiting,
            },
        );
        Some(id)
    }

    /// Recalculates priorities after the ICE role change.
    pub fn set_controlling(&mut self, controlling: bool) {
        for e in &mut self.entries {
            e.pair.priority =
                priority_for(&e.pair.local, &e.pair.remote, controlling);
        }
        // Stable, so equal priorities keep their arrival order.
        self.entries.sort_by(|a, b| b.pair.priority.cmp(&a.pair.priority));
    }

    /// Takes the highest-priority [`PairState::Waiting`] pair, switching it
    /// into [`PairState::InProgress`].
    pub fn next_waiting(&mut self) -> Option<CandidatePair> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.state == PairState::Waiting)?;
        entry.state = PairState::InProgress;
        Some(entry.pair.clone())
    }

    /// Updates [`PairState`] of the pair with the provided [`PairId`].
    ///
    /// Returns `false` if there is no such pair.
    pub fn set_state(&mut self, id: PairId, state: PairState) -> bool {
        match self.entries.iter_mut().find(|e| e.pair.id == id) {
            Some(entry) => {
                entry.state = state;
                true
            }
            None => false,
        }
    }

    /// Returns [`PairState`] of the pair with the provided [`PairId`].
    pub fn state(&self, id: PairId) -> Option<PairState> {
        self.entries
            .iter()
            .find(|e| e.pair.id == id)
            .map(|e| e.state)
    }

    /// Returns the pair with the provided [`PairId`].
    pub fn get(&self, id: PairId) -> Option<&CandidatePair> {
        self.entries
            .iter()
            .find(|e| e.pair.id == id)
            .map(|e| &e.pair)
    }

    /// Indicates whether some pairs are still waiting for or running their
    /// checks.
    pub fn has_pending(&self) -> bool {
        self.entries.iter().any(|e| {
            matches!(e.state, PairState::Waiting | PairState::InProgress)
        })
    }

    /// Indicates whether every pair has failed (or no pairs exist at all).
    pub fn is_exhausted(&self) -> bool {
        self.entries.iter().all(|e| e.state == PairState::Failed)
    }

    /// Returns the count of pairs in this [`CheckList`].
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Indicates whether this [`CheckList`] has no pairs.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes all the pairs.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use crate::ice::MAX_PRIORITY;

    use super::*;

    fn candidate(priority: u32, addr: &str, port: u16) -> Candidate {
        format!("candidate:1 1 udp {} {} {} typ host", priority, addr, port)
            .parse()
            .unwrap()
    }

    #[test]
    fn pair_priority_formula() {
        assert_eq!(pair_priority(2000, 1000), (1 << 32) * 1000 + 2 * 2000 + 1);
        assert_eq!(pair_priority(1000, 2000), (1 << 32) * 1000 + 2 * 2000);
        assert_eq!(pair_priority(7, 7), (1 << 32) * 7 + 14);

        let max = u64::from(MAX_PRIORITY);
        assert_eq!(
            pair_priority(MAX_PRIORITY, MAX_PRIORITY),
            (1 << 32) * max + 2 * max,
        );
        assert_eq!(pair_priority(u32::MAX, u32::MAX), u64::MAX);
    }

    #[test]
    fn orders_pairs_by_priority() {
        let mut list = CheckList::new();
        let local = candidate(100, "10.0.0.1", 1000);

        let low = list
            .add(&local, &candidate(10, "10.0.0.2", 2000), true)
            .unwrap();
        let high = list
            .add(&local, &candidate(500, "10.0.0.3", 3000), true)
            .unwrap();
        let mid = list
            .add(&local, &candidate(50, "10.0.0.4", 4000), true)
            .unwrap();

        let order: Vec<_> =
            std::iter::from_fn(|| list.next_waiting().map(|p| p.id)).collect();
        assert_eq!(order, vec![high, mid, low]);
        assert_eq!(list.state(high), Some(PairState::InProgress));
    }

    #[test]
    fn skips_duplicates_and_incompatible_pairs() {
        let mut list = CheckList::new();
        let local = candidate(100, "10.0.0.1", 1000);
        let remote = candidate(100, "10.0.0.2", 2000);

        assert!(list.add(&local, &remote, true).is_some());
        assert!(list.add(&local, &remote, true).is_none());
        assert!(list
            .add(&local, &candidate(100, "2001:db8::2", 2000), true)
            .is_none());

        let mut rtcp = remote.clone();
        rtcp.component = 2;
        assert!(list.add(&local, &rtcp, true).is_none());
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn role_change_recalculates_priorities() {
        let mut list = CheckList::new();
        let local = candidate(2000, "10.0.0.1", 1000);
        let id = list
            .add(&local, &candidate(1000, "10.0.0.2", 2000), true)
            .unwrap();
        assert_eq!(list.get(id).unwrap().priority, pair_priority(2000, 1000));

        list.set_controlling(false);

        assert_eq!(list.get(id).unwrap().priority, pair_priority(1000, 2000));
    }

    #[test]
    fn exhaustion_tracking() {
        let mut list = CheckList::new();
        assert!(list.is_exhausted());
        assert!(!list.has_pending());

        let local = candidate(100, "10.0.0.1", 1000);
        let a = list
            .add(&local, &candidate(100, "10.0.0.2", 2000), true)
            .unwrap();
        let b = list
            .add(&local, &candidate(100, "10.0.0.3", 3000), true)
            .unwrap();
        assert!(list.has_pending());

        list.set_state(a, PairState::Failed);
        assert!(!list.is_exhausted());
        list.set_state(b, PairState::Failed);
        assert!(list.is_exhausted());
        assert!(!list.has_pending());
        assert!(!list.set_state(PairId(42), PairState::Failed));
    }
}
