//! Typed kernel dispatch cache
//!
//! Maps a runtime tuple of type descriptors to a previously resolved kernel
//! (a cloneable callable specialized for those types). The first call for a
//! tuple pays the resolver's cost; every later call is a hash-chain lookup
//! with no lock taken.
//!
//! # Concurrency
//!
//! Readers atomically load the bucket-array reference and walk a chain of
//! immutable entries; writers serialize on one mutex and publish with release
//! stores (a new chain head on insert, a fresh array on resize), paired with
//! the readers' acquire loads. Two threads missing on the same tuple may both
//! run the resolver; the first insert wins and the loser's callable is
//! discarded, so resolvers must be idempotent. Retired arrays and evicted
//! chains stay allocated until the cache is dropped; a reader that loaded a
//! reference before a resize therefore never observes freed memory.
//!
//! # Sizing
//!
//! Capacity is always a power of two between [`INITIAL_CAPACITY`] and
//! [`MAXIMUM_CAPACITY`]. When the cache fills, the time since the previous
//! fill decides the reaction: rapid growth doubles the array, very slow
//! growth halves it (never below [`DEFAULT_CAPACITY`]), anything in between
//! holds the size and starts round-robin flushing of two slots per insert.
//! Resizes install a fresh empty array — the cache is a regenerable
//! accelerator, not authoritative state, so discarding entries is deliberate.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use log::debug;

use crate::core::{Result, VectorError};

/// Smallest working capacity; fresh caches start here.
pub const INITIAL_CAPACITY: usize = 16;
/// Steady-state floor for shrinking and the threshold for unconditional growth.
pub const DEFAULT_CAPACITY: usize = 128;
/// Hard ceiling on the bucket array.
pub const MAXIMUM_CAPACITY: usize = 1024;

// Seed for the tuple hash mix; the exact constant is unimportant.
const HASH_SEED: u64 = 0x9e37_79b9_7f4a_7c15;

struct Entry<K, V> {
    key: Box<[K]>,
    value: V,
    next: *mut Entry<K, V>,
}

struct Table<K, V> {
    buckets: Box<[AtomicPtr<Entry<K, V>>]>,
}

impl<K, V> Table<K, V> {
    fn new(capacity: usize) -> Self {
        debug_assert!(capacity.is_power_of_two());
        let buckets = (0..capacity)
            .map(|_| AtomicPtr::new(ptr::null_mut()))
            .collect();
        Self { buckets }
    }

    fn capacity(&self) -> usize {
        self.buckets.len()
    }

    fn bucket(&self, hash: u64) -> &AtomicPtr<Entry<K, V>> {
        &self.buckets[(hash as usize) & (self.buckets.len() - 1)]
    }
}

struct WriterState<K, V> {
    /// Inserts since the last fill event or table swap; doubles as the
    /// round-robin flush position.
    entries: usize,
    flush_enabled: bool,
    last_overflow: Instant,
    retired_tables: Vec<*mut Table<K, V>>,
    retired_chains: Vec<*mut Entry<K, V>>,
}

type Resolver<K, V> = Box<dyn Fn(&[K]) -> Result<V> + Send + Sync>;

/// Concurrent type-tuple → callable cache with adaptive sizing.
pub struct DispatchCache<K, V> {
    arity: usize,
    table: AtomicPtr<Table<K, V>>,
    writer: Mutex<WriterState<K, V>>,
    resolver: Resolver<K, V>,
    hits: AtomicU64,
    misses: AtomicU64,
}

// Raw pointers make the derived impls unavailable; the entries they reach are
// only shared immutably and freed with exclusive access in Drop.
unsafe impl<K: Send + Sync, V: Send + Sync> Send for DispatchCache<K, V> {}
unsafe impl<K: Send + Sync, V: Send + Sync> Sync for DispatchCache<K, V> {}

impl<K, V> DispatchCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a cache for tuples of the given arity.
    ///
    /// The resolver runs on each miss; it must be idempotent, since racing
    /// misses on one tuple may invoke it more than once.
    pub fn new<R>(arity: usize, resolver: R) -> Self
    where
        R: Fn(&[K]) -> Result<V> + Send + Sync + 'static,
    {
        Self::with_capacity(arity, INITIAL_CAPACITY, resolver)
    }

    /// [`DispatchCache::new`] with an explicit starting capacity, rounded up
    /// to a power of two and capped at [`MAXIMUM_CAPACITY`].
    pub fn with_capacity<R>(arity: usize, capacity: usize, resolver: R) -> Self
    where
        R: Fn(&[K]) -> Result<V> + Send + Sync + 'static,
    {
        let capacity = capacity.next_power_of_two().min(MAXIMUM_CAPACITY);
        Self {
            arity,
            table: AtomicPtr::new(Box::into_raw(Box::new(Table::new(capacity)))),
            writer: Mutex::new(WriterState {
                entries: 0,
                flush_enabled: false,
                last_overflow: Instant::now(),
                retired_tables: Vec::new(),
                retired_chains: Vec::new(),
            }),
            resolver: Box::new(resolver),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Tuple arity this cache was constructed for
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Current bucket-array capacity
    pub fn capacity(&self) -> usize {
        self.current().capacity()
    }

    /// Return the callable for `key`, resolving it on first touch.
    pub fn lookup_or_build(&self, key: &[K]) -> Result<V> {
        if key.len() != self.arity {
            return Err(VectorError::ArityMismatch {
                expected: self.arity,
                actual: key.len(),
            });
        }
        let hash = Self::mix_hash(key);
        if let Some(value) = self.find(key, hash) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(value);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        // Resolve outside the lock; a slow resolver must not block readers or
        // other writers. Racing misses are settled by the re-check below.
        let value = (self.resolver)(key)?;
        let mut writer = match self.writer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(existing) = self.find(key, hash) {
            // Lost the race: keep the published entry, discard ours.
            return Ok(existing);
        }
        self.insert(&mut writer, key, hash, value.clone());
        Ok(value)
    }

    /// Cache statistics snapshot
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            capacity: self.capacity(),
        }
    }

    /// Fraction of lookups served without resolving
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let total = hits + self.misses.load(Ordering::Relaxed);
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    fn current(&self) -> &Table<K, V> {
        // Acquire pairs with the release publication of fresh tables.
        unsafe { &*self.table.load(Ordering::Acquire) }
    }

    /// Mix the element hashes so every tuple position contributes.
    fn mix_hash(key: &[K]) -> u64 {
        let mut h = HASH_SEED;
        for k in key {
            let mut hasher = DefaultHasher::new();
            k.hash(&mut hasher);
            h = (h >> 4) ^ hasher.finish();
        }
        h
    }

    /// Lock-free chain walk on the current table.
    fn find(&self, key: &[K], hash: u64) -> Option<V> {
        let table = self.current();
        let mut cur = table.bucket(hash).load(Ordering::Acquire);
        while !cur.is_null() {
            let entry = unsafe { &*cur };
            if Self::keys_match(&entry.key, key) {
                return Some(entry.value.clone());
            }
            cur = entry.next;
        }
        None
    }

    /// Element-wise tuple comparison; stops at the first differing position.
    fn keys_match(stored: &[K], probe: &[K]) -> bool {
        stored.len() == probe.len() && stored.iter().zip(probe).all(|(a, b)| a == b)
    }

    fn insert(&self, w: &mut WriterState<K, V>, key: &[K], hash: u64, value: V) {
        let mut table = self.current();
        if table.capacity() < INITIAL_CAPACITY {
            table = self.grow_to_initial(w, table);
        }
        w.entries += 1;
        if 2 * w.entries >= table.capacity() {
            table = self.handle_overflow(w, table);
        } else if w.flush_enabled {
            self.flush_two(w, table);
        }
        let bucket = table.bucket(hash);
        let head = bucket.load(Ordering::Acquire);
        let entry = Box::into_raw(Box::new(Entry {
            key: key.to_vec().into_boxed_slice(),
            value,
            next: head,
        }));
        // Release makes the fully built entry visible before the new head.
        bucket.store(entry, Ordering::Release);
    }

    /// React to a full table: double under rapid growth, halve under slow
    /// growth, otherwise hold and start round-robin flushing.
    fn handle_overflow<'a>(
        &'a self,
        w: &mut WriterState<K, V>,
        table: &'a Table<K, V>,
    ) -> &'a Table<K, V> {
        let cap = table.capacity();
        let elapsed = w.last_overflow.elapsed();
        let fast = Duration::from_millis((cap / 128) as u64);
        let slow = Duration::from_millis((cap * 16) as u64);
        let next_cap = if cap < DEFAULT_CAPACITY {
            // Below the steady-state floor, grow regardless of timing.
            Some(cap * 2)
        } else if elapsed < fast {
            if cap < MAXIMUM_CAPACITY {
                Some(cap * 2)
            } else {
                None
            }
        } else if elapsed > slow && cap > DEFAULT_CAPACITY {
            Some(cap / 2)
        } else {
            None
        };
        w.entries = 0;
        w.last_overflow = Instant::now();
        match next_cap {
            Some(new_cap) => {
                debug!("dispatch cache resize {} -> {} slots", cap, new_cap);
                w.flush_enabled = false;
                self.swap_fresh(w, new_cap)
            }
            None => {
                debug!("dispatch cache holding {} slots, round-robin flush on", cap);
                w.flush_enabled = true;
                table
            }
        }
    }

    /// Publish a fresh empty table; the old one is retired, not freed, so
    /// in-flight readers stay valid.
    fn swap_fresh<'a>(&'a self, w: &mut WriterState<K, V>, new_cap: usize) -> &'a Table<K, V> {
        let fresh = Box::into_raw(Box::new(Table::new(new_cap)));
        let old = self.table.swap(fresh, Ordering::AcqRel);
        w.retired_tables.push(old);
        unsafe { &*fresh }
    }

    /// Below-INITIAL growth keeps the entries: they are re-inserted into the
    /// fresh table as clones, leaving the published chains of the old table
    /// untouched for concurrent readers.
    fn grow_to_initial<'a>(
        &'a self,
        w: &mut WriterState<K, V>,
        table: &Table<K, V>,
    ) -> &'a Table<K, V> {
        debug!(
            "dispatch cache grow {} -> {} slots (carrying entries)",
            table.capacity(),
            INITIAL_CAPACITY
        );
        let fresh = Table::new(INITIAL_CAPACITY);
        for bucket in table.buckets.iter() {
            let mut cur = bucket.load(Ordering::Acquire);
            while !cur.is_null() {
                let entry = unsafe { &*cur };
                let slot = fresh.bucket(Self::mix_hash(&entry.key));
                // The fresh table is private until the swap publishes it.
                let cloned = Box::into_raw(Box::new(Entry {
                    key: entry.key.clone(),
                    value: entry.value.clone(),
                    next: slot.load(Ordering::Relaxed),
                }));
                slot.store(cloned, Ordering::Relaxed);
                cur = entry.next;
            }
        }
        let fresh = Box::into_raw(Box::new(fresh));
        let old = self.table.swap(fresh, Ordering::AcqRel);
        w.retired_tables.push(old);
        unsafe { &*fresh }
    }

    /// Null out two slots at the round-robin position, slowly evicting stale
    /// chains while there is spare room.
    fn flush_two(&self, w: &mut WriterState<K, V>, table: &Table<K, V>) {
        let mask = table.capacity() - 1;
        let base = 2 * w.entries;
        for pos in [base & mask, (base + 1) & mask] {
            let head = table.buckets[pos].swap(ptr::null_mut(), Ordering::AcqRel);
            if !head.is_null() {
                w.retired_chains.push(head);
            }
        }
    }
}

impl<K, V> Drop for DispatchCache<K, V> {
    fn drop(&mut self) {
        // Exclusive access: no reader can hold a chain reference any more.
        let writer = match self.writer.get_mut() {
            Ok(w) => w,
            Err(poisoned) => poisoned.into_inner(),
        };
        for &head in &writer.retired_chains {
            unsafe { free_chain(head) };
        }
        for &table in &writer.retired_tables {
            unsafe { free_table(table) };
        }
        let current = *self.table.get_mut();
        unsafe { free_table(current) };
    }
}

unsafe fn free_chain<K, V>(mut cur: *mut Entry<K, V>) {
    while !cur.is_null() {
        let entry = Box::from_raw(cur);
        cur = entry.next;
    }
}

unsafe fn free_table<K, V>(table: *mut Table<K, V>) {
    let table = Box::from_raw(table);
    for bucket in table.buckets.iter() {
        free_chain(bucket.load(Ordering::Relaxed));
    }
}

/// Cache statistics
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub capacity: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::TypeId;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    type Kernel = Arc<dyn Fn(f64) -> f64 + Send + Sync>;

    fn string_resolver() -> impl Fn(&[u32]) -> Result<String> + Send + Sync + 'static {
        |key: &[u32]| {
            let parts: Vec<String> = key.iter().map(|k| k.to_string()).collect();
            Ok(format!("<{}>", parts.join(",")))
        }
    }

    #[test]
    fn test_first_lookup_resolves_then_caches() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let cache: DispatchCache<u32, String> = DispatchCache::new(2, move |key| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(format!("{}+{}", key[0], key[1]))
        });

        assert_eq!(cache.lookup_or_build(&[1, 2]).unwrap(), "1+2");
        assert_eq!(cache.lookup_or_build(&[1, 2]).unwrap(), "1+2");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(cache.hit_rate(), 0.5);
    }

    #[test]
    fn test_arity_mismatch() {
        let cache: DispatchCache<u32, String> = DispatchCache::new(2, string_resolver());
        let err = cache.lookup_or_build(&[1]).unwrap_err();
        assert!(matches!(err, VectorError::ArityMismatch { expected: 2, actual: 1 }));
        // a failed precondition installs nothing
        assert_eq!(cache.stats().misses, 0);
    }

    #[test]
    fn test_callable_identity_is_shared() {
        let cache: DispatchCache<TypeId, Kernel> = DispatchCache::new(2, |_key| {
            Ok(Arc::new(|x: f64| x * 2.0) as Kernel)
        });
        let key = [TypeId::of::<f32>(), TypeId::of::<f64>()];
        let first = cache.lookup_or_build(&key).unwrap();
        let second = cache.lookup_or_build(&key).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first(21.0), 42.0);
    }

    #[test]
    fn test_distinct_tuples_resolve_distinctly() {
        let cache: DispatchCache<u32, String> = DispatchCache::new(3, string_resolver());
        // shared prefixes force the comparison past the first elements
        assert_eq!(cache.lookup_or_build(&[7, 8, 9]).unwrap(), "<7,8,9>");
        assert_eq!(cache.lookup_or_build(&[7, 8, 1]).unwrap(), "<7,8,1>");
        assert_eq!(cache.lookup_or_build(&[7, 1, 9]).unwrap(), "<7,1,9>");
        assert_eq!(cache.stats().misses, 3);
    }

    #[test]
    fn test_tuple_order_matters() {
        let cache: DispatchCache<u32, String> = DispatchCache::new(2, string_resolver());
        assert_eq!(cache.lookup_or_build(&[1, 2]).unwrap(), "<1,2>");
        assert_eq!(cache.lookup_or_build(&[2, 1]).unwrap(), "<2,1>");
        assert_eq!(cache.stats().misses, 2);
    }

    #[test]
    fn test_resolver_failure_installs_nothing_and_retries() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let cache: DispatchCache<u32, String> = DispatchCache::new(1, move |key| {
            if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(VectorError::Resolver("transient".into()))
            } else {
                Ok(format!("k{}", key[0]))
            }
        });
        assert!(matches!(
            cache.lookup_or_build(&[5]).unwrap_err(),
            VectorError::Resolver(_)
        ));
        // nothing was installed, so the next miss retries the resolver
        assert_eq!(cache.lookup_or_build(&[5]).unwrap(), "k5");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_below_initial_capacity_grows_to_initial() {
        let cache: DispatchCache<u32, String> = DispatchCache::with_capacity(1, 2, string_resolver());
        assert_eq!(cache.capacity(), 2);
        cache.lookup_or_build(&[1]).unwrap();
        assert_eq!(cache.capacity(), INITIAL_CAPACITY);
        // the pre-growth entry is still served from cache
        cache.lookup_or_build(&[1]).unwrap();
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
    }

    #[test]
    fn test_rapid_fill_grows_capacity() {
        let cache: DispatchCache<u32, String> = DispatchCache::new(1, string_resolver());
        assert_eq!(cache.capacity(), INITIAL_CAPACITY);
        for k in 0..40 {
            cache.lookup_or_build(&[k]).unwrap();
        }
        // 40 rapid inserts overflow 16 and 32 slot tables
        assert!(cache.capacity() >= 64, "capacity was {}", cache.capacity());
    }

    #[test]
    fn test_capacity_never_exceeds_maximum() {
        let cache: DispatchCache<u32, String> =
            DispatchCache::with_capacity(1, MAXIMUM_CAPACITY, string_resolver());
        for k in 0..4 * MAXIMUM_CAPACITY as u32 {
            cache.lookup_or_build(&[k]).unwrap();
        }
        assert_eq!(cache.capacity(), MAXIMUM_CAPACITY);
    }

    #[test]
    fn test_entries_survive_while_spare_room_remains() {
        let cache: DispatchCache<u32, String> = DispatchCache::new(1, string_resolver());
        for k in 0..7 {
            cache.lookup_or_build(&[k]).unwrap();
        }
        // 7 entries in a 16-slot table: no overflow handling has run
        for k in 0..7 {
            assert_eq!(cache.lookup_or_build(&[k]).unwrap(), format!("<{}>", k));
        }
        assert_eq!(cache.stats().misses, 7);
        assert_eq!(cache.stats().hits, 7);
    }

    #[test]
    fn test_concurrent_misses_converge_on_one_callable() {
        let cache: Arc<DispatchCache<u32, Kernel>> = Arc::new(DispatchCache::new(2, |key| {
            let offset = key[0] as f64;
            Ok(Arc::new(move |x: f64| x + offset) as Kernel)
        }));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            handles.push(std::thread::spawn(move || {
                cache.lookup_or_build(&[3, 4]).unwrap()
            }));
        }
        let kernels: Vec<Kernel> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        // every thread observes the single winning entry's behavior
        for k in &kernels {
            assert_eq!(k(1.0), 4.0);
        }
        // and later lookups share identity with the installed winner
        let winner = cache.lookup_or_build(&[3, 4]).unwrap();
        assert!(kernels.iter().any(|k| Arc::ptr_eq(k, &winner)));
    }

    #[test]
    fn test_concurrent_mixed_keys() {
        let cache: Arc<DispatchCache<u32, String>> = Arc::new(DispatchCache::new(1, string_resolver()));
        let mut handles = Vec::new();
        for t in 0..8u32 {
            let cache = cache.clone();
            handles.push(std::thread::spawn(move || {
                for k in 0..32u32 {
                    let key = (t + k) % 16;
                    assert_eq!(cache.lookup_or_build(&[key]).unwrap(), format!("<{}>", key));
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
    }
}
