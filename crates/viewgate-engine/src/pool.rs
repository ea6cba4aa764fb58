//! Engine connection pool.
//!
//! Manages a bounded set of reusable RPC handles. The fast path is
//! lock-free: idle handles live in a concurrent queue, and a narrow mutex
//! serializes only the create-new-handle decision. When the pool is
//! exhausted and one brief retry finds nothing, an un-pooled overflow handle
//! is issued instead of failing the request; overflow handles are dropped on
//! release rather than re-enqueued.

use crossbeam_queue::SegQueue;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use viewgate_commons::Result;
use viewgate_configs::PoolSettings;

use crate::transport::{EngineConnection, EngineConnector};

/// Pool occupancy counters for health introspection.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PoolStats {
    pub available: usize,
    pub total: usize,
}

struct HandleEntry {
    id: u64,
    conn: Box<dyn EngineConnection>,
}

struct PoolInner {
    connector: Arc<dyn EngineConnector>,
    idle: SegQueue<HandleEntry>,
    /// Pooled handles only: id -> last-used time.
    live: DashMap<u64, Instant>,
    /// Guards only the decision to create a new pooled handle.
    create_lock: Mutex<()>,
    next_id: AtomicU64,
    max_size: usize,
    min_size: usize,
    idle_timeout: Duration,
    retry_wait: Duration,
}

pub struct EnginePool {
    inner: Arc<PoolInner>,
}

impl EnginePool {
    pub fn new(connector: Arc<dyn EngineConnector>, settings: &PoolSettings) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                connector,
                idle: SegQueue::new(),
                live: DashMap::new(),
                create_lock: Mutex::new(()),
                next_id: AtomicU64::new(1),
                max_size: settings.max_size,
                min_size: settings.min_size,
                idle_timeout: Duration::from_secs(settings.idle_timeout_seconds),
                retry_wait: Duration::from_millis(settings.retry_wait_millis),
            }),
        }
    }

    /// Borrow a handle. Never blocks indefinitely: idle pop, then create up
    /// to the maximum, then one brief retry, then an overflow handle.
    pub async fn acquire(&self) -> Result<PooledHandle> {
        if let Some(entry) = self.inner.idle.pop() {
            return Ok(self.wrap(entry, true));
        }

        {
            let _guard = self.inner.create_lock.lock();
            if self.inner.live.len() < self.inner.max_size {
                let entry = self.create_entry()?;
                return Ok(self.wrap(entry, true));
            }
        }

        tokio::time::sleep(self.inner.retry_wait).await;
        if let Some(entry) = self.inner.idle.pop() {
            return Ok(self.wrap(entry, true));
        }

        log::warn!(
            "engine pool exhausted ({} handles); issuing overflow handle",
            self.inner.max_size
        );
        let conn = self.inner.connector.connect()?;
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        Ok(self.wrap(HandleEntry { id, conn }, false))
    }

    /// Retire pooled handles idle beyond the timeout, never shrinking the
    /// pool below its minimum size.
    pub fn sweep_idle(&self) {
        let mut keep: Vec<HandleEntry> = Vec::new();
        let mut retired = 0usize;

        while let Some(entry) = self.inner.idle.pop() {
            let last_used = self.inner.live.get(&entry.id).map(|e| *e.value());
            let stale = last_used
                .map(|t| t.elapsed() >= self.inner.idle_timeout)
                .unwrap_or(true);
            if stale && self.inner.live.len() > self.inner.min_size {
                self.inner.live.remove(&entry.id);
                retired += 1;
                // dropping the entry tears down the handle
            } else {
                keep.push(entry);
            }
        }
        for entry in keep {
            self.inner.idle.push(entry);
        }

        if retired > 0 {
            log::debug!("retired {} idle engine handle(s)", retired);
        }
    }

    pub fn occupancy(&self) -> PoolStats {
        PoolStats {
            available: self.inner.idle.len(),
            total: self.inner.live.len(),
        }
    }

    fn create_entry(&self) -> Result<HandleEntry> {
        let conn = self.inner.connector.connect()?;
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.live.insert(id, Instant::now());
        log::debug!("created engine handle #{}", id);
        Ok(HandleEntry { id, conn })
    }

    fn wrap(&self, entry: HandleEntry, pooled: bool) -> PooledHandle {
        PooledHandle {
            entry: Some(entry),
            pooled,
            inner: self.inner.clone(),
        }
    }
}

/// A borrowed handle. Returning it to the pool happens on drop, so every
/// exit path of an execution (success, error, cancellation) releases it.
pub struct PooledHandle {
    entry: Option<HandleEntry>,
    pooled: bool,
    inner: Arc<PoolInner>,
}

impl PooledHandle {
    pub fn connection(&mut self) -> &mut dyn EngineConnection {
        self.entry
            .as_mut()
            .expect("pooled handle used after release")
            .conn
            .as_mut()
    }

    pub fn id(&self) -> u64 {
        self.entry
            .as_ref()
            .expect("pooled handle used after release")
            .id
    }

    pub fn is_pooled(&self) -> bool {
        self.pooled
    }
}

impl Drop for PooledHandle {
    fn drop(&mut self) {
        if let Some(entry) = self.entry.take() {
            if self.pooled {
                self.inner.live.insert(entry.id, Instant::now());
                self.inner.idle.push(entry);
            }
            // overflow handles are simply dropped; protocol-level channel
            // teardown is the client library's concern
        }
    }
}
