//! DataWindow: indexed access over a keyed sequence, backed by a
//! page-windowed cache and a single-flight background fetcher.
//!
//! The full key sequence is known up front; values are materialized page
//! by page. A miss schedules a background fetch of the whole page around
//! the missed index, while pages far from the last fetch are purged by
//! the cache. At most one fetch is in flight per window at any time.

use std::hash::Hash;
use std::sync::mpsc::{self, SyncSender};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace, warn};
use windowcache::WindowCache;

use crate::error::{BoxError, Error};

/// Default number of indices per page
pub const DEFAULT_WINDOW_SIZE: usize = 20;

/// Page-distance retention threshold used by the window's cache
const PAGES_TO_RETAIN: u64 = 3;

/// Batch fetch collaborator: turns a slice of keys into values, in the
/// same order and count as the input
pub type Fetcher<K, V> = Box<dyn Fn(&[K]) -> Result<Vec<V>, BoxError> + Send + Sync>;

/// Error collaborator: receives every fetch failure, from the worker
/// thread; must not block
pub type ErrorHandler = Box<dyn Fn(Error) + Send + Sync>;

/// Optional notification collaborator: fired after a page commits
pub type ReadyHandler = Box<dyn Fn() + Send + Sync>;

/// Single-flight state: whether a fetch is running and for which page
struct Flight {
    in_flight: bool,
    page: u64,
}

struct Shared<K, V> {
    keys: Vec<K>,
    window_size: usize,
    cache: WindowCache<K, V>,
    flight: Mutex<Flight>,
    done: Condvar,
    fetcher: Fetcher<K, V>,
    on_error: ErrorHandler,
    on_ready: Mutex<Option<ReadyHandler>>,
}

/// Paged window over an ordered key sequence
///
/// Owns one background worker thread that executes fetches serially.
/// Dropping the window closes the job channel and joins the worker; an
/// in-flight fetch runs to completion first (no cancellation).
pub struct DataWindow<K, V> {
    shared: Arc<Shared<K, V>>,
    jobs: Option<SyncSender<u64>>,
    worker: Option<JoinHandle<()>>,
}

impl<K, V> DataWindow<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a window over `keys`, paged into `window_size`-sized
    /// batches, materialized through `fetcher`
    ///
    /// Fetch failures are reported to `on_error` from the worker thread.
    ///
    /// # Panics
    /// Panics if `window_size` is 0.
    pub fn new(
        keys: Vec<K>,
        window_size: usize,
        fetcher: Fetcher<K, V>,
        on_error: ErrorHandler,
    ) -> Self {
        assert!(window_size > 0, "Window size must be greater than 0");

        let shared = Arc::new(Shared {
            keys,
            window_size,
            cache: WindowCache::new(PAGES_TO_RETAIN),
            flight: Mutex::new(Flight {
                in_flight: false,
                page: 0,
            }),
            done: Condvar::new(),
            fetcher,
            on_error,
            on_ready: Mutex::new(None),
        });

        // The channel never holds more than one job: sends happen only
        // after winning the single-flight flag, which clears only once
        // the previous job has fully finished.
        let (jobs, queue) = mpsc::sync_channel::<u64>(1);
        let worker_shared = Arc::clone(&shared);
        let worker = std::thread::spawn(move || {
            while let Ok(page) = queue.recv() {
                worker_shared.run_fetch(page);
            }
        });

        Self {
            shared,
            jobs: Some(jobs),
            worker: Some(worker),
        }
    }

    /// Attach a handler fired from the worker thread after each
    /// successful page commit
    ///
    /// Absent by default; consumers that poll on render instead of
    /// reacting to notifications never need it.
    pub fn with_on_ready(self, on_ready: impl Fn() + Send + Sync + 'static) -> Self {
        *self.shared.on_ready.lock() = Some(Box::new(on_ready));
        self
    }

    /// Non-blocking read of the element at `index`
    ///
    /// On a miss, schedules a prefetch of the containing page as a side
    /// effect and returns `None` immediately.
    ///
    /// # Panics
    /// Panics if `index` is out of range for the key sequence.
    pub fn read(&self, index: usize) -> Option<V> {
        let value = self.shared.cache.get(&self.shared.keys[index]);
        if value.is_none() {
            self.prefetch(index);
        }
        value
    }

    /// Read the element at `index`, waiting for it when its page is the
    /// one currently being fetched
    ///
    /// Same lookup and prefetch trigger as [`read`](Self::read). If the
    /// element is missing and `index` falls in the in-flight page, the
    /// caller parks until that fetch completes (success or failure), then
    /// re-reads the cache. If a different page is in flight, or none,
    /// returns immediately. There is no timeout: a fetcher that never
    /// returns leaves waiters parked for good.
    ///
    /// # Panics
    /// Panics if `index` is out of range for the key sequence.
    pub fn read_blocking(&self, index: usize) -> Option<V> {
        let key = &self.shared.keys[index];
        if let Some(value) = self.shared.cache.get(key) {
            return Some(value);
        }
        self.prefetch(index);

        let page = self.page_of(index);
        let mut flight = self.shared.flight.lock();
        while flight.in_flight && flight.page == page {
            self.shared.done.wait(&mut flight);
        }
        drop(flight);

        self.shared.cache.get(key)
    }

    /// Read the element at `index` without scheduling anything
    ///
    /// # Panics
    /// Panics if `index` is out of range for the key sequence.
    pub fn peek(&self, index: usize) -> Option<V> {
        self.shared.cache.get(&self.shared.keys[index])
    }

    /// Write directly through to the cache
    ///
    /// `Some` seeds or overwrites the entry for `keys[index]`, tagged
    /// with that index's page; `None` invalidates it. Used internally to
    /// commit fetch results and publicly to pre-seed or invalidate.
    ///
    /// # Panics
    /// Panics if `index` is out of range for the key sequence.
    pub fn write(&self, index: usize, value: Option<V>) {
        let key = &self.shared.keys[index];
        match value {
            Some(v) => self.shared.cache.put(key.clone(), v, self.page_of(index)),
            None => {
                self.shared.cache.remove(key);
            }
        }
    }

    /// Schedule a background fetch of the page containing `index`
    ///
    /// No-op when `index` is out of range, a fetch is already in flight,
    /// or the element is already cached.
    pub fn prefetch(&self, index: usize) {
        if index >= self.shared.keys.len() {
            return;
        }

        let page = self.page_of(index);
        {
            let mut flight = self.shared.flight.lock();
            if flight.in_flight {
                debug!(index, page, "prefetch suppressed: fetch in flight");
                return;
            }
            if self.shared.cache.get(&self.shared.keys[index]).is_some() {
                return;
            }
            flight.in_flight = true;
            flight.page = page;
        }
        debug!(index, page, "prefetch scheduled");

        if let Some(jobs) = &self.jobs {
            if jobs.send(page).is_ok() {
                return;
            }
        }
        // The worker only disappears during teardown
        self.shared.flight.lock().in_flight = false;
    }

    /// Number of indices in the window
    pub fn len(&self) -> usize {
        self.shared.keys.len()
    }

    /// Check if the key sequence is empty
    pub fn is_empty(&self) -> bool {
        self.shared.keys.is_empty()
    }

    /// Number of indices per page
    pub fn window_size(&self) -> usize {
        self.shared.window_size
    }

    /// The ordered key sequence backing the window
    pub fn keys(&self) -> &[K] {
        &self.shared.keys
    }

    /// Cache statistics for this window
    pub fn stats(&self) -> &windowcache::CacheStats {
        self.shared.cache.stats()
    }

    fn page_of(&self, index: usize) -> u64 {
        (index / self.shared.window_size) as u64
    }
}

impl<K, V> Shared<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn run_fetch(&self, page: u64) {
        let start = page as usize * self.window_size;
        let end = (start + self.window_size).min(self.keys.len());
        let batch = &self.keys[start..end];
        trace!(page, start, end, "fetching page");

        match (self.fetcher)(batch) {
            Ok(values) if values.len() == batch.len() => {
                // Commit in submission order so result positions line up
                // with index order
                for (offset, value) in values.into_iter().enumerate() {
                    self.cache
                        .put(self.keys[start + offset].clone(), value, page);
                }
                trace!(page, "page committed");

                if let Some(on_ready) = &*self.on_ready.lock() {
                    on_ready();
                }
            }
            Ok(values) => {
                warn!(
                    page,
                    requested = batch.len(),
                    returned = values.len(),
                    "fetch result shape mismatch, page dropped"
                );
                (self.on_error)(Error::ShapeMismatch {
                    requested: batch.len(),
                    returned: values.len(),
                });
            }
            Err(err) => {
                warn!(page, error = %err, "fetch failed");
                (self.on_error)(Error::Fetch(err));
            }
        }

        // Clearing the flag and waking waiters is the final step, for
        // success and failure alike
        let mut flight = self.flight.lock();
        flight.in_flight = false;
        drop(flight);
        self.done.notify_all();
    }
}

impl<K, V> Drop for DataWindow<K, V> {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop; an in-flight fetch
        // finishes first
        self.jobs.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
