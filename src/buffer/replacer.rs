use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::storage::page::FrameId;

/// Default lookback constant k of the LRU-K replacer.
pub const DEFAULT_REPLACER_K: usize = 2;

/// Replacer tracks frame usage for replacement in case the buffer pool is full.
pub trait Replacer: Send + Sync {
    /// Record the event that the given frame id is accessed at the current
    /// timestamp. Create a new entry for access history if the frame id has
    /// not been seen before. Out of range frame ids are ignored.
    fn record_access(&self, frame_id: FrameId);

    /// Find the frame to evict by backward k-distance. Only frames that are
    /// marked as evictable are candidates for eviction.
    ///
    /// Successful eviction of a frame removes the frame's access history
    /// and decrements the size of the replacer.
    ///
    /// Return the frame id if a frame is evicted successfully, None if no
    /// frame can be evicted.
    fn evict(&self) -> Option<FrameId>;

    /// Toggle whether a frame is evictable or non-evictable. This also
    /// controls the replacer size, which is the number of evictable frames.
    /// A frame with no recorded access is ignored, setting it evictable does
    /// not create tracking state.
    fn set_evictable(&self, frame_id: FrameId, evictable: bool);

    /// Check if a frame is evictable. An untracked frame is not.
    fn is_evictable(&self, frame_id: FrameId) -> bool;

    /// Remove a frame from the replacer, along with its access history,
    /// no matter what its backward k-distance is. Callers must only remove
    /// evictable or untracked frames.
    fn remove(&self, frame_id: FrameId);

    /// Number of evictable frames.
    fn size(&self) -> usize;
}

/// Access recency of one tracked frame.
enum Phase {
    /// Fewer than k recorded accesses, timestamps oldest first. Backward
    /// k-distance is infinite.
    History(VecDeque<usize>),
    /// At least k recorded accesses; only the most recent timestamp is kept.
    Steady(usize),
}

struct LRUKNode {
    phase: Phase,
    is_evictable: bool,
}

/// LRUKReplacer implements the LRU-k replacement policy.
///
/// The LRU-k algorithm evicts the frame whose backward k-distance is the
/// maximum over all frames. A frame with fewer than k recorded accesses has
/// +inf backward k-distance; when such frames exist the victim is the one
/// among them with the earliest first access, classical LRU. Otherwise the
/// victim is the frame with the earliest last access.
pub struct LRUKReplacer {
    nodes: HashMap<FrameId, LRUKNode>,
    current_timestamp: usize,
    current_size: usize,
    replacer_size: usize,
    k: usize,
}

impl LRUKReplacer {
    pub fn new(k: usize, size: usize) -> Self {
        assert!(k > 0, "replacer k must be larger than zero");
        LRUKReplacer {
            nodes: HashMap::new(),
            current_timestamp: 0,
            current_size: 0,
            replacer_size: size,
            k,
        }
    }

    /// Every operation advances the logical clock; the new value is "now"
    /// for any timestamp recorded by the operation.
    fn tick(&mut self) -> usize {
        self.current_timestamp += 1;
        self.current_timestamp
    }

    fn record_access(&mut self, frame_id: FrameId) {
        let now = self.tick();
        if frame_id >= self.replacer_size {
            return;
        }
        let node = self.nodes.entry(frame_id).or_insert(LRUKNode {
            phase: Phase::History(VecDeque::new()),
            is_evictable: false,
        });
        match &mut node.phase {
            Phase::Steady(last) => *last = now,
            Phase::History(history) => {
                history.push_back(now);
                if history.len() >= self.k {
                    node.phase = Phase::Steady(now);
                }
            }
        }
    }

    fn evict(&mut self) -> Option<FrameId> {
        self.tick();

        // Frames still in the history phase have infinite backward
        // k-distance and are considered first, earliest first access wins.
        let mut victim: Option<(FrameId, usize)> = None;
        for (&frame_id, node) in &self.nodes {
            if !node.is_evictable {
                continue;
            }
            if let Phase::History(history) = &node.phase {
                if let Some(&first) = history.front() {
                    if victim.is_none_or(|(vf, vt)| first < vt || (first == vt && frame_id < vf)) {
                        victim = Some((frame_id, first));
                    }
                }
            }
        }

        // Otherwise the steady frame with the earliest last access loses.
        if victim.is_none() {
            for (&frame_id, node) in &self.nodes {
                if !node.is_evictable {
                    continue;
                }
                if let Phase::Steady(last) = node.phase {
                    if victim.is_none_or(|(vf, vt)| last < vt || (last == vt && frame_id < vf)) {
                        victim = Some((frame_id, last));
                    }
                }
            }
        }

        let (frame_id, _) = victim?;
        self.nodes.remove(&frame_id);
        self.current_size -= 1;
        Some(frame_id)
    }

    fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        self.tick();
        let Some(node) = self.nodes.get_mut(&frame_id) else {
            return;
        };
        if node.is_evictable == evictable {
            return;
        }
        node.is_evictable = evictable;
        if evictable {
            self.current_size += 1;
        } else {
            self.current_size -= 1;
        }
    }

    fn is_evictable(&self, frame_id: FrameId) -> bool {
        self.nodes.get(&frame_id).map_or(false, |node| node.is_evictable)
    }

    fn remove(&mut self, frame_id: FrameId) {
        self.tick();
        let Some(node) = self.nodes.remove(&frame_id) else {
            return;
        };
        debug_assert!(node.is_evictable, "removed a tracked non-evictable frame");
        if node.is_evictable {
            self.current_size -= 1;
        }
    }

    fn size(&self) -> usize {
        self.current_size
    }
}

/// SyncLRUKReplacer is the thread-safe front of the LRU-k policy, all the
/// heavy lifting happens in the LRUKReplacer.
pub struct SyncLRUKReplacer {
    inner: Mutex<LRUKReplacer>,
}

impl SyncLRUKReplacer {
    pub fn new(k: usize, size: usize) -> Self {
        SyncLRUKReplacer { inner: Mutex::new(LRUKReplacer::new(k, size)) }
    }
}

impl Replacer for SyncLRUKReplacer {
    fn record_access(&self, frame_id: FrameId) {
        let mut guard = self.inner.lock().unwrap();
        guard.record_access(frame_id)
    }

    fn evict(&self) -> Option<FrameId> {
        let mut guard = self.inner.lock().unwrap();
        guard.evict()
    }

    fn set_evictable(&self, frame_id: FrameId, evictable: bool) {
        let mut guard = self.inner.lock().unwrap();
        guard.set_evictable(frame_id, evictable)
    }

    fn is_evictable(&self, frame_id: FrameId) -> bool {
        let guard = self.inner.lock().unwrap();
        guard.is_evictable(frame_id)
    }

    fn remove(&self, frame_id: FrameId) {
        let mut guard = self.inner.lock().unwrap();
        guard.remove(frame_id)
    }

    fn size(&self) -> usize {
        let guard = self.inner.lock().unwrap();
        guard.size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_transition() {
        let mut replacer = LRUKReplacer::new(2, 4);

        // Scenario: one access leaves frame 1 in the history phase, the
        // second moves it to steady.
        replacer.record_access(1);
        assert!(matches!(replacer.nodes[&1].phase, Phase::History(_)));
        replacer.record_access(1);
        assert!(matches!(replacer.nodes[&1].phase, Phase::Steady(_)));

        // Scenario: with k = 1 a single access is already steady.
        let mut replacer = LRUKReplacer::new(1, 4);
        replacer.record_access(0);
        assert!(matches!(replacer.nodes[&0].phase, Phase::Steady(_)));
    }

    #[test]
    fn test_history_phase_evicted_first() {
        let mut replacer = LRUKReplacer::new(2, 4);

        // Scenario: access pattern A, B, C, A, B on frames {0, 1, 2}. C has
        // a single access and infinite k-distance, A and B are steady.
        replacer.record_access(0);
        replacer.record_access(1);
        replacer.record_access(2);
        replacer.record_access(0);
        replacer.record_access(1);
        for f in 0..3 {
            replacer.set_evictable(f, true);
        }
        assert_eq!(3, replacer.size());
        assert_eq!(Some(2), replacer.evict());

        // Scenario: among the steady frames, A finished its accesses before
        // B, so A goes next.
        assert_eq!(Some(0), replacer.evict());
        assert_eq!(Some(1), replacer.evict());
        assert_eq!(None, replacer.evict());
        assert_eq!(0, replacer.size());
    }

    #[test]
    fn test_untracked_and_out_of_range_frames() {
        let mut replacer = LRUKReplacer::new(2, 4);

        // set_evictable on an unknown frame does not create tracking state
        replacer.set_evictable(3, true);
        assert_eq!(0, replacer.size());
        assert_eq!(None, replacer.evict());
        assert!(!replacer.is_evictable(3));

        // out of range accesses are ignored
        replacer.record_access(9);
        replacer.set_evictable(9, true);
        assert_eq!(0, replacer.size());

        // remove of an untracked frame is a no-op
        replacer.remove(3);
        assert_eq!(0, replacer.size());
    }

    #[test]
    fn test_remove_drops_history() {
        let mut replacer = LRUKReplacer::new(2, 4);
        replacer.record_access(1);
        replacer.record_access(1);
        replacer.set_evictable(1, true);
        assert_eq!(1, replacer.size());

        replacer.remove(1);
        assert_eq!(0, replacer.size());
        assert!(!replacer.is_evictable(1));

        // the frame starts over in the history phase when re-recorded
        replacer.record_access(1);
        replacer.set_evictable(1, true);
        assert!(matches!(replacer.nodes[&1].phase, Phase::History(_)));
        assert_eq!(Some(1), replacer.evict());
    }

    #[test]
    fn test_lruk_replacer() {
        let mut replacer = LRUKReplacer::new(2, 7);

        // Scenario: add six frames to the replacer. Frames [1..5] are
        // evictable, frame 6 is not.
        replacer.record_access(1);
        replacer.record_access(2);
        replacer.record_access(3);
        replacer.record_access(4);
        replacer.record_access(5);
        replacer.record_access(6);
        replacer.set_evictable(1, true);
        replacer.set_evictable(2, true);
        replacer.set_evictable(3, true);
        replacer.set_evictable(4, true);
        replacer.set_evictable(5, true);
        replacer.set_evictable(6, false);
        assert_eq!(5, replacer.size());

        // Scenario: a second access moves frame 1 into the steady phase.
        // All the other frames keep infinite k-distance, so the eviction
        // order is [2, 3, 4, 5, 1].
        replacer.record_access(1);

        // Scenario: evict three frames. The infinite k-distance frames go
        // first, in LRU order.
        assert_eq!(Some(2), replacer.evict());
        assert_eq!(Some(3), replacer.evict());
        assert_eq!(Some(4), replacer.evict());
        assert_eq!(2, replacer.size());

        // Scenario: the replacer has frames [5, 1]. Insert new frames 3 and
        // 4 and update the history of 5 and 4. The order is now [3, 1, 5, 4].
        replacer.record_access(3);
        replacer.record_access(4);
        replacer.record_access(5);
        replacer.record_access(4);
        replacer.set_evictable(3, true);
        replacer.set_evictable(4, true);
        assert_eq!(4, replacer.size());

        // Scenario: 3 is the only frame left in the history phase.
        assert_eq!(Some(3), replacer.evict());
        assert_eq!(3, replacer.size());

        // Scenario: set 6 evictable. 6 has one access from the start and
        // infinite k-distance, it goes next.
        replacer.set_evictable(6, true);
        assert_eq!(4, replacer.size());
        assert_eq!(Some(6), replacer.evict());
        assert_eq!(3, replacer.size());

        // Scenario: pin frame 1, then of the steady frames [5, 4], 5 became
        // steady first.
        replacer.set_evictable(1, false);
        assert_eq!(2, replacer.size());
        assert_eq!(Some(5), replacer.evict());
        assert_eq!(1, replacer.size());

        // Scenario: update the access history of 1 and unpin it. The last
        // access of 4 is older, so 4 then 1.
        replacer.record_access(1);
        replacer.record_access(1);
        replacer.set_evictable(1, true);
        assert_eq!(2, replacer.size());
        assert_eq!(Some(4), replacer.evict());
        assert_eq!(1, replacer.size());
        assert_eq!(Some(1), replacer.evict());
        assert_eq!(0, replacer.size());

        // Scenario: nothing evictable is left, these do not modify size.
        assert_eq!(None, replacer.evict());
        assert_eq!(0, replacer.size());
        replacer.remove(1);
        assert_eq!(0, replacer.size());
    }
}
