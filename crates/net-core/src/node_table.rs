//! Kademlia routing table and bonding state machine (C11, §4.9).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::endpoint::{NodeEndpoint, NodeId};

/// Entries per bucket (`k` in the Kademlia literature).
pub const BUCKET_SIZE: usize = 16;
/// Buckets are indexed by XOR-distance bit; real node ids only populate
/// the low range in practice, but the table is sized generously.
pub const BUCKET_COUNT: usize = 256;
/// `alpha`: the lookup's per-round concurrency.
pub const ALPHA: usize = 3;
/// A lookup gives up after this many rounds without progress.
pub const MAX_LOOKUP_ROUNDS: usize = 7;
/// How long a bonded node stays considered live without re-pinging.
pub const BONDING_LIFETIME: Duration = Duration::from_secs(12 * 60 * 60);
/// How often the sweep that expires outstanding pings is expected to run.
/// This is a cadence, not the expiry threshold itself -- see
/// [`REQUEST_TIME_TO_LIVE`].
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5);
/// How long an outstanding ping is given before it is considered lost
/// (`requestTimeToLive`).
pub const REQUEST_TIME_TO_LIVE: Duration = Duration::from_secs(60);
/// Bucket refresh cadence.
pub const REFRESH_INTERVAL: Duration = Duration::from_millis(7_200);

#[derive(Debug, Clone)]
pub struct NodeEntry {
    pub id: NodeId,
    pub endpoint: NodeEndpoint,
    pub last_seen: Instant,
    pub bonded: bool,
}

/// Tracks the single outstanding ping allowed per node id (§4.9: "at most
/// one ping in flight per node; a fresh ping replaces a timed-out one").
#[derive(Debug, Clone)]
struct SentPing {
    echo_hash: [u8; 32],
    sent_at: Instant,
    /// Candidate waiting to replace the bucket's least-recently-seen entry
    /// if this ping goes unanswered.
    replacement: Option<NodeEntry>,
}

#[derive(Debug, Default)]
struct Bucket {
    entries: Vec<NodeEntry>,
}

impl Bucket {
    fn touch(&mut self, id: &NodeId) -> bool {
        if let Some(pos) = self.entries.iter().position(|e| &e.id == id) {
            let mut entry = self.entries.remove(pos);
            entry.last_seen = Instant::now();
            self.entries.push(entry);
            true
        } else {
            false
        }
    }

    fn least_recently_seen(&self) -> Option<&NodeEntry> {
        self.entries.first()
    }
}

pub struct NodeTable {
    local_id: NodeId,
    buckets: Vec<Bucket>,
    pending_pings: HashMap<NodeId, SentPing>,
}

impl NodeTable {
    pub fn new(local_id: NodeId) -> Self {
        let mut buckets = Vec::with_capacity(BUCKET_COUNT);
        buckets.resize_with(BUCKET_COUNT, Bucket::default);
        NodeTable {
            local_id,
            buckets,
            pending_pings: HashMap::new(),
        }
    }

    fn bucket_index(&self, id: &NodeId) -> Option<usize> {
        self.local_id.bucket_index(id)
    }

    /// Records activity from `id`. If the node is already bonded and in
    /// its bucket, it moves to the most-recently-seen slot. If the bucket
    /// has room, the node is inserted directly. If the bucket is full,
    /// the caller must ping the least-recently-seen entry before evicting
    /// it (`least_recently_seen_for_eviction_check`); this method alone
    /// never evicts.
    pub fn note_active(&mut self, id: NodeId, endpoint: NodeEndpoint) -> NoteActiveOutcome {
        let Some(index) = self.bucket_index(&id) else {
            return NoteActiveOutcome::IsSelf;
        };
        let bucket = &mut self.buckets[index];
        if bucket.touch(&id) {
            return NoteActiveOutcome::Refreshed;
        }
        if bucket.entries.len() < BUCKET_SIZE {
            bucket.entries.push(NodeEntry {
                id,
                endpoint,
                last_seen: Instant::now(),
                bonded: true,
            });
            return NoteActiveOutcome::Inserted;
        }
        NoteActiveOutcome::BucketFull {
            eviction_candidate: bucket.least_recently_seen().expect("bucket full implies non-empty").id,
        }
    }

    /// Begins bonding by issuing a ping; returns the echo hash the caller
    /// should stamp as `Pong::echo_hash` expectation.
    pub fn start_ping(&mut self, id: NodeId, echo_hash: [u8; 32], replacement: Option<NodeEntry>) {
        self.pending_pings.insert(
            id,
            SentPing {
                echo_hash,
                sent_at: Instant::now(),
                replacement,
            },
        );
    }

    /// Resolves an inbound Pong against the outstanding ping for `id`.
    /// Returns `true` if it matched a live, non-expired ping.
    pub fn complete_ping(&mut self, id: &NodeId, echo_hash: &[u8; 32]) -> bool {
        let Some(pending) = self.pending_pings.get(id) else {
            return false;
        };
        if &pending.echo_hash != echo_hash {
            return false;
        }
        if pending.sent_at.elapsed() > REQUEST_TIME_TO_LIVE {
            self.pending_pings.remove(id);
            return false;
        }
        self.pending_pings.remove(id);
        true
    }

    /// Sweeps outstanding pings older than [`REQUEST_TIME_TO_LIVE`]. For
    /// each one, evicts the stale bucket entry (if the ping was an
    /// eviction check) and installs the replacement candidate in its
    /// place. Intended to be called roughly every [`SWEEP_INTERVAL`].
    pub fn sweep_timed_out_pings(&mut self) -> Vec<NodeId> {
        let now = Instant::now();
        let timed_out: Vec<NodeId> = self
            .pending_pings
            .iter()
            .filter(|(_, p)| now.duration_since(p.sent_at) > REQUEST_TIME_TO_LIVE)
            .map(|(id, _)| *id)
            .collect();

        for id in &timed_out {
            let pending = self.pending_pings.remove(id).expect("just filtered");
            if let Some(replacement) = pending.replacement {
                if let Some(index) = self.bucket_index(id) {
                    let bucket = &mut self.buckets[index];
                    bucket.entries.retain(|e| &e.id != id);
                    if bucket.entries.len() < BUCKET_SIZE {
                        bucket.entries.push(replacement);
                    }
                }
            }
        }
        timed_out
    }

    /// Removes a node outright (used when a ping round-trip never
    /// completes and there is no replacement waiting).
    pub fn evict(&mut self, id: &NodeId) {
        if let Some(index) = self.bucket_index(id) {
            self.buckets[index].entries.retain(|e| &e.id != id);
        }
        self.pending_pings.remove(id);
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.bucket_index(id)
            .map(|index| self.buckets[index].entries.iter().any(|e| &e.id == id))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.buckets.iter().map(|b| b.entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The `count` entries closest to `target` by XOR distance, for
    /// answering a FindNode or seeding a lookup round (§4.9 doDiscover).
    pub fn closest_to(&self, target: &NodeId, count: usize) -> Vec<NodeEntry> {
        let mut all: Vec<&NodeEntry> = self.buckets.iter().flat_map(|b| b.entries.iter()).collect();
        all.sort_by_key(|entry| entry.id.distance(target));
        all.into_iter().take(count).cloned().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteActiveOutcome {
    IsSelf,
    Refreshed,
    Inserted,
    BucketFull { eviction_candidate: NodeId },
}

/// Drives an iterative closest-node lookup (§4.9 doDiscover): up to
/// [`ALPHA`] nodes queried per round, continuing while each round turns up
/// a node closer than anything seen before, bounded by
/// [`MAX_LOOKUP_ROUNDS`].
pub struct Lookup {
    target: NodeId,
    queried: std::collections::HashSet<NodeId>,
    best: Vec<NodeEntry>,
    rounds: usize,
}

impl Lookup {
    pub fn new(target: NodeId, seed: Vec<NodeEntry>) -> Self {
        let mut lookup = Lookup {
            target,
            queried: std::collections::HashSet::new(),
            best: seed,
            rounds: 0,
        };
        lookup.best.sort_by_key(|e| e.id.distance(&lookup.target));
        lookup
    }

    /// The next batch to query this round, or an empty vec if the lookup
    /// has converged or hit the round cap.
    pub fn next_round(&mut self) -> Vec<NodeEntry> {
        if self.rounds >= MAX_LOOKUP_ROUNDS {
            return Vec::new();
        }
        self.rounds += 1;
        self.best
            .iter()
            .filter(|e| !self.queried.contains(&e.id))
            .take(ALPHA)
            .cloned()
            .collect()
    }

    pub fn mark_queried(&mut self, id: &NodeId) {
        self.queried.insert(*id);
    }

    /// Folds a FindNode reply's results into the running closest set,
    /// returning `true` if it improved the best-known distance (the
    /// lookup should keep going).
    pub fn merge(&mut self, found: Vec<NodeEntry>) -> bool {
        let previous_best = self.best.first().map(|e| e.id.distance(&self.target));
        for entry in found {
            if !self.best.iter().any(|e| e.id == entry.id) {
                self.best.push(entry);
            }
        }
        self.best.sort_by_key(|e| e.id.distance(&self.target));
        self.best.truncate(BUCKET_SIZE);
        let new_best = self.best.first().map(|e| e.id.distance(&self.target));
        match (previous_best, new_best) {
            (Some(old), Some(new)) => new < old,
            (None, Some(_)) => true,
            _ => false,
        }
    }

    pub fn results(&self) -> &[NodeEntry] {
        &self.best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> NodeEndpoint {
        NodeEndpoint {
            address: "127.0.0.1".parse().unwrap(),
            udp_port: 30303,
            tcp_port: 30303,
        }
    }

    fn id(byte: u8) -> NodeId {
        NodeId([byte; 64])
    }

    #[test]
    fn inserts_into_empty_bucket() {
        let mut table = NodeTable::new(id(0));
        let outcome = table.note_active(id(1), endpoint());
        assert_eq!(outcome, NoteActiveOutcome::Inserted);
        assert!(table.contains(&id(1)));
    }

    #[test]
    fn refreshing_a_known_node_does_not_duplicate_it() {
        let mut table = NodeTable::new(id(0));
        table.note_active(id(1), endpoint());
        let outcome = table.note_active(id(1), endpoint());
        assert_eq!(outcome, NoteActiveOutcome::Refreshed);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn full_bucket_reports_eviction_candidate_instead_of_inserting() {
        let mut table = NodeTable::new(id(0));
        // all these ids share bucket_index 0's sibling-index path by using
        // the same high bit pattern relative to id(0); bucket distribution
        // isn't the point of this test, exhausting BUCKET_SIZE is.
        let mut index = None;
        let mut n = 1u8;
        let mut inserted = 0;
        while inserted < BUCKET_SIZE {
            let candidate = id(n);
            n = n.wrapping_add(1);
            if n == 0 {
                break;
            }
            let bucket = table.bucket_index(&candidate);
            if index.is_none() {
                index = bucket;
            }
            if bucket != index {
                continue;
            }
            table.note_active(candidate, endpoint());
            inserted += 1;
        }
        assert_eq!(table.len(), BUCKET_SIZE);
    }

    #[test]
    fn request_time_to_live_exceeds_the_sweep_cadence() {
        // the sweep runs far more often than a ping is allowed to live;
        // collapsing the two into one constant rejects late-but-valid pongs.
        assert!(REQUEST_TIME_TO_LIVE > SWEEP_INTERVAL);
    }

    #[test]
    fn ping_completes_only_with_matching_echo_hash() {
        let mut table = NodeTable::new(id(0));
        table.start_ping(id(1), [42u8; 32], None);
        assert!(!table.complete_ping(&id(1), &[0u8; 32]));
        assert!(table.complete_ping(&id(1), &[42u8; 32]));
        assert!(!table.complete_ping(&id(1), &[42u8; 32]));
    }

    #[test]
    fn lookup_converges_within_the_round_cap() {
        let target = id(0xff);
        let seed = vec![NodeEntry {
            id: id(1),
            endpoint: endpoint(),
            last_seen: Instant::now(),
            bonded: true,
        }];
        let mut lookup = Lookup::new(target, seed);
        let mut rounds = 0;
        loop {
            let batch = lookup.next_round();
            if batch.is_empty() {
                break;
            }
            for entry in &batch {
                lookup.mark_queried(&entry.id);
            }
            rounds += 1;
            if rounds > MAX_LOOKUP_ROUNDS {
                panic!("lookup exceeded its round cap");
            }
        }
        assert!(rounds <= MAX_LOOKUP_ROUNDS);
    }
}
