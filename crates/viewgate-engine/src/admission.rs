//! Query admission control.
//!
//! Bounds the number of concurrently executing queries with a counting
//! semaphore and tracks in-flight work for observability. Tokens release
//! exactly once; a periodic sweep recovers permits from entries that were
//! never properly released, and a token whose entry was swept forgets its
//! own permit on drop so capacity is never restored twice.

use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use viewgate_commons::{GatewayError, Result};
use viewgate_configs::AdmissionSettings;

/// Admission occupancy counters for health introspection.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AdmissionStats {
    pub active: usize,
    pub available_slots: usize,
}

struct SlotEntry {
    query_id: String,
    acquired_at: Instant,
}

struct AdmissionInner {
    enabled: bool,
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
    acquire_delay: Duration,
    stale_after: Duration,
    active: DashMap<u64, SlotEntry>,
    next_id: AtomicU64,
}

pub struct AdmissionController {
    inner: Arc<AdmissionInner>,
}

impl AdmissionController {
    pub fn new(settings: &AdmissionSettings) -> Self {
        Self {
            inner: Arc::new(AdmissionInner {
                enabled: settings.enabled,
                semaphore: Arc::new(Semaphore::new(settings.max_concurrent)),
                max_concurrent: settings.max_concurrent,
                acquire_delay: Duration::from_millis(settings.acquire_delay_millis),
                stale_after: Duration::from_secs(settings.stale_after_seconds),
                active: DashMap::new(),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Wait for a free slot until the deadline. When throttling is disabled
    /// the returned token is a no-op.
    pub async fn acquire_slot(&self, query_id: &str, deadline: Instant) -> Result<AdmissionSlot> {
        if !self.inner.enabled {
            return Ok(AdmissionSlot::noop());
        }

        let wait = deadline.saturating_duration_since(Instant::now());
        let permit = tokio::time::timeout(wait, self.inner.semaphore.clone().acquire_owned())
            .await
            .map_err(|_| {
                GatewayError::admission_timeout(format!(
                    "no free query slot for '{}' within the deadline",
                    query_id
                ))
            })?
            .map_err(|_| GatewayError::internal("admission semaphore closed"))?;

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.active.insert(
            id,
            SlotEntry {
                query_id: query_id.to_string(),
                acquired_at: Instant::now(),
            },
        );

        if !self.inner.acquire_delay.is_zero() {
            tokio::time::sleep(self.inner.acquire_delay).await;
        }

        Ok(AdmissionSlot {
            id,
            permit: Some(permit),
            inner: Some(self.inner.clone()),
        })
    }

    /// Remove tracked entries older than the staleness threshold and
    /// force-release their permits. A safety valve against abandoned work,
    /// not a correctness guarantee. Returns the number of slots recovered.
    pub fn sweep_stale(&self) -> usize {
        if !self.inner.enabled {
            return 0;
        }

        let stale: Vec<u64> = self
            .inner
            .active
            .iter()
            .filter(|entry| entry.value().acquired_at.elapsed() >= self.inner.stale_after)
            .map(|entry| *entry.key())
            .collect();

        let mut recovered = 0usize;
        for id in stale {
            if let Some((_, entry)) = self.inner.active.remove(&id) {
                self.inner.semaphore.add_permits(1);
                recovered += 1;
                log::warn!(
                    "recovered admission slot held {:?} by query '{}'",
                    entry.acquired_at.elapsed(),
                    entry.query_id
                );
            }
        }
        recovered
    }

    pub fn occupancy(&self) -> AdmissionStats {
        AdmissionStats {
            active: self.inner.active.len(),
            available_slots: if self.inner.enabled {
                self.inner.semaphore.available_permits()
            } else {
                self.inner.max_concurrent
            },
        }
    }
}

/// A held admission slot. Dropping the token releases it, so every exit path
/// of an execution gives the permit back; explicit [`release`](Self::release)
/// consumes the token and cannot run twice.
pub struct AdmissionSlot {
    id: u64,
    permit: Option<OwnedSemaphorePermit>,
    inner: Option<Arc<AdmissionInner>>,
}

impl std::fmt::Debug for AdmissionSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionSlot")
            .field("id", &self.id)
            .field("held", &self.permit.is_some())
            .finish()
    }
}

impl AdmissionSlot {
    fn noop() -> Self {
        Self {
            id: 0,
            permit: None,
            inner: None,
        }
    }

    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        let Some(inner) = self.inner.take() else {
            self.permit = None;
            return;
        };
        let Some(permit) = self.permit.take() else {
            return;
        };
        if inner.active.remove(&self.id).is_some() {
            drop(permit);
        } else {
            // the stale sweep already force-released this slot's permit;
            // forgetting ours keeps capacity exact
            permit.forget();
        }
    }
}

impl Drop for AdmissionSlot {
    fn drop(&mut self) {
        self.release_inner();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(max: usize) -> AdmissionSettings {
        AdmissionSettings {
            enabled: true,
            max_concurrent: max,
            acquire_delay_millis: 0,
            stale_after_seconds: 1800,
        }
    }

    fn soon() -> Instant {
        Instant::now() + Duration::from_millis(50)
    }

    #[tokio::test]
    async fn test_excess_acquisitions_time_out() {
        let controller = AdmissionController::new(&settings(2));
        let _a = controller.acquire_slot("q1", soon()).await.unwrap();
        let _b = controller.acquire_slot("q2", soon()).await.unwrap();

        let err = controller.acquire_slot("q3", soon()).await.unwrap_err();
        assert!(matches!(err, GatewayError::AdmissionTimeout(_)));
    }

    #[tokio::test]
    async fn test_release_frees_exactly_one_permit() {
        let controller = AdmissionController::new(&settings(1));
        let slot = controller.acquire_slot("q1", soon()).await.unwrap();
        assert_eq!(controller.occupancy().available_slots, 0);

        slot.release();
        assert_eq!(controller.occupancy().available_slots, 1);
        assert_eq!(controller.occupancy().active, 0);

        // the slot is free again
        let _again = controller.acquire_slot("q2", soon()).await.unwrap();
    }

    #[tokio::test]
    async fn test_waiter_unblocked_by_release() {
        let controller = Arc::new(AdmissionController::new(&settings(1)));
        let slot = controller.acquire_slot("q1", soon()).await.unwrap();

        let waiter = {
            let controller = controller.clone();
            tokio::spawn(async move {
                controller
                    .acquire_slot("q2", Instant::now() + Duration::from_secs(5))
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        slot.release();

        let acquired = waiter.await.unwrap();
        assert!(acquired.is_ok());
    }

    #[tokio::test]
    async fn test_drop_releases_like_explicit_release() {
        let controller = AdmissionController::new(&settings(1));
        {
            let _slot = controller.acquire_slot("q1", soon()).await.unwrap();
            assert_eq!(controller.occupancy().available_slots, 0);
        }
        assert_eq!(controller.occupancy().available_slots, 1);
    }

    #[tokio::test]
    async fn test_sweep_recovers_capacity_without_double_free() {
        let controller = AdmissionController::new(&AdmissionSettings {
            enabled: true,
            max_concurrent: 2,
            acquire_delay_millis: 0,
            stale_after_seconds: 0, // everything is immediately stale
        });

        let slot = controller.acquire_slot("stuck", soon()).await.unwrap();
        assert_eq!(controller.occupancy().available_slots, 1);

        assert_eq!(controller.sweep_stale(), 1);
        assert_eq!(controller.occupancy().available_slots, 2);
        assert_eq!(controller.occupancy().active, 0);

        // the late release must not push capacity past the maximum
        slot.release();
        assert_eq!(controller.occupancy().available_slots, 2);
    }

    #[tokio::test]
    async fn test_disabled_throttle_is_noop() {
        let controller = AdmissionController::new(&AdmissionSettings {
            enabled: false,
            max_concurrent: 1,
            acquire_delay_millis: 0,
            stale_after_seconds: 1800,
        });

        // far more acquisitions than the limit, none block
        let mut slots = Vec::new();
        for i in 0..10 {
            slots.push(
                controller
                    .acquire_slot(&format!("q{}", i), soon())
                    .await
                    .unwrap(),
            );
        }
        assert_eq!(controller.occupancy().active, 0);
        assert_eq!(controller.sweep_stale(), 0);
    }

    #[tokio::test]
    async fn test_occupancy_tracks_active_queries() {
        let controller = AdmissionController::new(&settings(4));
        let _a = controller.acquire_slot("q1", soon()).await.unwrap();
        let _b = controller.acquire_slot("q2", soon()).await.unwrap();

        let stats = controller.occupancy();
        assert_eq!(stats.active, 2);
        assert_eq!(stats.available_slots, 2);
    }
}
