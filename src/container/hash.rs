use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash, Hasher};
use std::sync::Mutex;

/// Default entry capacity of a bucket.
pub const DEFAULT_BUCKET_SIZE: usize = 4;

/// A bucket holds up to bucket_size entries and discriminates the low
/// `depth` bits of the key hash.
struct Bucket<K, V> {
    depth: u32,
    entries: Vec<(K, V)>,
}

impl<K: Eq, V> Bucket<K, V> {
    fn new(depth: u32, bucket_size: usize) -> Self {
        Bucket { depth, entries: Vec::with_capacity(bucket_size) }
    }

    fn find(&self, key: &K) -> Option<&V> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    fn remove(&mut self, key: &K) -> bool {
        match self.entries.iter().position(|(k, _)| k == key) {
            Some(i) => {
                self.entries.remove(i);
                true
            }
            None => false,
        }
    }
}

/// Directory state of the table. Buckets are arena-allocated in `buckets`
/// and the directory holds arena indices, so several directory slots can
/// alias one bucket and aliasing is plain index equality.
struct Directory<K, V, S> {
    global_depth: u32,
    bucket_size: usize,
    num_buckets: usize,
    buckets: Vec<Bucket<K, V>>,
    dir: Vec<usize>,
    hash_builder: S,
}

impl<K: Hash + Eq, V, S: BuildHasher> Directory<K, V, S> {
    fn new(bucket_size: usize, hash_builder: S) -> Self {
        assert!(bucket_size > 0, "bucket size must be larger than zero");
        Directory {
            global_depth: 0,
            bucket_size,
            num_buckets: 1,
            buckets: vec![Bucket::new(0, bucket_size)],
            dir: vec![0],
            hash_builder,
        }
    }

    fn hash(&self, key: &K) -> u64 {
        let mut hasher = self.hash_builder.build_hasher();
        key.hash(&mut hasher);
        hasher.finish()
    }

    /// Directory slot of the key, the low global_depth bits of its hash.
    fn index_of(&self, key: &K) -> usize {
        let mask = (1u64 << self.global_depth) - 1;
        (self.hash(key) & mask) as usize
    }

    fn find(&self, key: &K) -> Option<&V> {
        self.buckets[self.dir[self.index_of(key)]].find(key)
    }

    fn remove(&mut self, key: &K) -> bool {
        let bucket = self.dir[self.index_of(key)];
        self.buckets[bucket].remove(key)
    }

    fn insert(&mut self, key: K, value: V) {
        let bucket = self.dir[self.index_of(&key)];
        if let Some(slot) = self.buckets[bucket].entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
            return;
        }

        while self.buckets[self.dir[self.index_of(&key)]].entries.len() >= self.bucket_size {
            self.split(self.dir[self.index_of(&key)]);
        }

        let bucket = self.dir[self.index_of(&key)];
        self.buckets[bucket].entries.push((key, value));
    }

    /// Split one full bucket. The directory doubles first when the bucket
    /// already discriminates every directory bit; unrelated buckets keep
    /// their identity and their depth.
    fn split(&mut self, bucket: usize) {
        if self.buckets[bucket].depth == self.global_depth {
            // Double the directory; slot i + old_len aliases slot i until
            // some later split repoints it.
            self.dir.extend_from_within(..);
            self.global_depth += 1;
        }

        // Entries move to the sibling iff the first undiscriminated hash
        // bit is set; the old arena slot keeps the zero half.
        let local_depth = self.buckets[bucket].depth;
        let split_bit = 1u64 << local_depth;
        let entries = std::mem::take(&mut self.buckets[bucket].entries);
        self.buckets[bucket].depth = local_depth + 1;
        let sibling = self.buckets.len();
        self.buckets.push(Bucket::new(local_depth + 1, self.bucket_size));
        for (k, v) in entries {
            let target = if self.hash(&k) & split_bit != 0 { sibling } else { bucket };
            self.buckets[target].entries.push((k, v));
        }
        self.num_buckets += 1;

        for i in 0..self.dir.len() {
            if self.dir[i] == bucket && (i as u64) & split_bit != 0 {
                self.dir[i] = sibling;
            }
        }
    }
}

/// An in-memory extendible hash table.
///
/// The table grows by splitting exactly the overflowing bucket, doubling
/// the directory of bucket references only when that bucket's local depth
/// has caught up with the global depth. Insert has upsert semantics and
/// buckets are never merged.
///
/// The internal latch makes the individual operations atomic; callers that
/// need multi-operation atomicity (the buffer pool does) serialize on their
/// own latch above this one.
pub struct ExtendibleHashTable<K, V, S = RandomState> {
    inner: Mutex<Directory<K, V, S>>,
}

impl<K: Hash + Eq, V: Clone> ExtendibleHashTable<K, V> {
    pub fn new(bucket_size: usize) -> Self {
        Self::with_hasher(bucket_size, RandomState::new())
    }
}

impl<K: Hash + Eq, V: Clone, S: BuildHasher> ExtendibleHashTable<K, V, S> {
    /// Build a table with a caller-chosen hasher. The hash function decides
    /// which directory bits a key lands on, so deterministic tests inject a
    /// deterministic hasher here.
    pub fn with_hasher(bucket_size: usize, hash_builder: S) -> Self {
        ExtendibleHashTable { inner: Mutex::new(Directory::new(bucket_size, hash_builder)) }
    }

    /// Look up the value of the key, walking the single bucket its hash
    /// points at.
    pub fn find(&self, key: &K) -> Option<V> {
        let inner = self.inner.lock().unwrap();
        inner.find(key).cloned()
    }

    /// Insert the key/value pair, overwriting the value if the key is
    /// already present.
    pub fn insert(&self, key: K, value: V) {
        let mut inner = self.inner.lock().unwrap();
        inner.insert(key, value)
    }

    /// Remove the key, reporting whether it was present.
    pub fn remove(&self, key: &K) -> bool {
        let mut inner = self.inner.lock().unwrap();
        inner.remove(key)
    }

    /// Number of hash bits used to index the directory.
    pub fn global_depth(&self) -> u32 {
        let inner = self.inner.lock().unwrap();
        inner.global_depth
    }

    /// Number of hash bits the bucket behind the given directory slot
    /// discriminates.
    pub fn local_depth(&self, dir_index: usize) -> u32 {
        let inner = self.inner.lock().unwrap();
        inner.buckets[inner.dir[dir_index]].depth
    }

    /// Number of distinct buckets.
    pub fn num_buckets(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.num_buckets
    }

    #[cfg(test)]
    fn bucket_of(&self, dir_index: usize) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.dir[dir_index]
    }
}
