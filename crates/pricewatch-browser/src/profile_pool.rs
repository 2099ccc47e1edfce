//! Bounded pool of reusable browser sessions.
//!
//! Each resident profile owns one session and the port it listens on. A
//! profile is leased exclusively: a second request for a busy profile waits
//! for the first lease to drop instead of sharing the session. The pool lock
//! only guards bookkeeping and is never held across session I/O.
//!
//! Eviction is FIFO by creation order. An evicted session is closed (and its
//! port released) once its current lease, if any, is dropped.

use crate::error::{BrowserError, Result};
use crate::extractor::Extractor;
use crate::ports::PortAllocator;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::{OwnedMappedMutexGuard, OwnedMutexGuard};

/// A resident worker session.
#[derive(Debug)]
pub struct Profile<S> {
    /// Caller-chosen profile identifier
    pub profile_id: usize,
    /// Live session handle
    pub session: S,
    /// Port the session is bound to
    pub port: u16,
    /// Whether one-time setup has completed on this session
    pub setup_done: bool,
    /// When the session was opened
    pub created_at: Instant,
}

/// Exclusive access to a resident profile. Dropping it frees the profile.
pub type ProfileLease<S> = OwnedMappedMutexGuard<Option<Profile<S>>, Profile<S>>;

type Slot<S> = Arc<tokio::sync::Mutex<Option<Profile<S>>>>;

struct Resident<S> {
    seq: u64,
    slot: Slot<S>,
}

struct PoolState<S> {
    residents: HashMap<usize, Resident<S>>,
    next_seq: u64,
}

impl<S> PoolState<S> {
    fn evict_oldest(&mut self) -> Option<(usize, Slot<S>)> {
        let oldest = self
            .residents
            .iter()
            .min_by_key(|(_, resident)| resident.seq)
            .map(|(id, _)| *id)?;
        self.residents
            .remove(&oldest)
            .map(|resident| (oldest, resident.slot))
    }
}

/// Bounded set of reusable sessions keyed by profile ID.
pub struct ProfilePool<E: Extractor> {
    extractor: Arc<E>,
    ports: Arc<PortAllocator>,
    capacity: usize,
    state: Mutex<PoolState<E::Session>>,
}

impl<E: Extractor> ProfilePool<E> {
    /// Create an empty pool holding at most `capacity` residents.
    ///
    /// The capacity is clamped to the size of the port range so every
    /// resident can own a distinct port.
    pub fn new(extractor: Arc<E>, ports: Arc<PortAllocator>, capacity: usize) -> Self {
        let available = ports.capacity().max(1);
        if capacity > available {
            tracing::warn!(
                "Pool capacity {} exceeds the {} available ports; using {}",
                capacity,
                available,
                available
            );
        }
        let capacity = capacity.clamp(1, available);
        Self {
            extractor,
            ports,
            capacity,
            state: Mutex::new(PoolState {
                residents: HashMap::new(),
                next_seq: 0,
            }),
        }
    }

    /// The extractor sessions are opened with.
    pub fn extractor(&self) -> &Arc<E> {
        &self.extractor
    }

    /// The port allocator backing this pool.
    pub fn ports(&self) -> &PortAllocator {
        &self.ports
    }

    /// Maximum number of residents.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of resident profiles.
    pub fn resident_count(&self) -> usize {
        self.lock_state().residents.len()
    }

    /// Ports currently held by live or closing sessions.
    pub fn ports_in_use(&self) -> usize {
        self.ports.in_use()
    }

    /// Resident profile IDs, sorted.
    pub fn resident_ids(&self) -> Vec<usize> {
        let mut ids: Vec<usize> = self.lock_state().residents.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Lease the session for `profile_id`, creating it if it is not resident.
    ///
    /// At capacity the oldest resident is evicted and closed before the new
    /// session is opened on a freshly allocated port.
    ///
    /// # Errors
    /// Returns the extractor's error if a new session cannot be opened.
    pub async fn get_or_create(&self, profile_id: usize) -> Result<ProfileLease<E::Session>> {
        loop {
            let (slot, pending, evicted) = {
                let mut state = self.lock_state();
                if let Some(resident) = state.residents.get(&profile_id) {
                    (Arc::clone(&resident.slot), None, None)
                } else {
                    let evicted = if state.residents.len() >= self.capacity {
                        state.evict_oldest()
                    } else {
                        None
                    };
                    let slot: Slot<E::Session> = Arc::new(tokio::sync::Mutex::new(None));
                    let guard = Arc::clone(&slot).try_lock_owned().map_err(|e| {
                        BrowserError::PoolError(format!("new profile slot already locked: {e}"))
                    })?;
                    let seq = state.next_seq;
                    state.next_seq += 1;
                    state.residents.insert(
                        profile_id,
                        Resident {
                            seq,
                            slot: Arc::clone(&slot),
                        },
                    );
                    (slot, Some(guard), evicted)
                }
            };

            if let Some(guard) = pending {
                if let Some((evicted_id, evicted_slot)) = evicted {
                    tracing::debug!("Pool full, evicting oldest profile {}", evicted_id);
                    self.close_slot(evicted_id, evicted_slot).await;
                }
                return self.open_into(profile_id, &slot, guard).await;
            }

            // An empty slot was evicted or failed to open; look again.
            let guard = slot.lock_owned().await;
            if let Ok(lease) = OwnedMutexGuard::try_map(guard, Option::as_mut) {
                tracing::debug!(
                    "Reusing profile {} (port {}, setup done: {})",
                    profile_id,
                    lease.port,
                    lease.setup_done
                );
                return Ok(lease);
            }
        }
    }

    async fn open_into(
        &self,
        profile_id: usize,
        slot: &Slot<E::Session>,
        mut guard: OwnedMutexGuard<Option<Profile<E::Session>>>,
    ) -> Result<ProfileLease<E::Session>> {
        let port = self.ports.acquire();
        match self.extractor.open_session(port).await {
            Ok(session) => {
                *guard = Some(Profile {
                    profile_id,
                    session,
                    port,
                    setup_done: false,
                    created_at: Instant::now(),
                });
                tracing::info!("Created profile {} on port {}", profile_id, port);
                OwnedMutexGuard::try_map(guard, Option::as_mut).map_err(|_| {
                    BrowserError::PoolError(format!("profile {profile_id} vanished after open"))
                })
            }
            Err(e) => {
                self.ports.release(port);
                {
                    let mut state = self.lock_state();
                    let same_slot = state
                        .residents
                        .get(&profile_id)
                        .is_some_and(|resident| Arc::ptr_eq(&resident.slot, slot));
                    if same_slot {
                        state.residents.remove(&profile_id);
                    }
                }
                drop(guard);
                tracing::warn!("Failed to open profile {} on port {}: {}", profile_id, port, e);
                Err(e)
            }
        }
    }

    /// Close and forget one profile. Returns `false` if it was not resident.
    pub async fn release(&self, profile_id: usize) -> bool {
        let removed = self.lock_state().residents.remove(&profile_id);
        match removed {
            Some(resident) => {
                self.close_slot(profile_id, resident.slot).await;
                true
            }
            None => false,
        }
    }

    /// Close every resident and release every port. Returns the number of
    /// sessions closed.
    pub async fn cleanup_all(&self) -> usize {
        let drained: Vec<(usize, Slot<E::Session>)> = self
            .lock_state()
            .residents
            .drain()
            .map(|(id, resident)| (id, resident.slot))
            .collect();

        if drained.is_empty() {
            return 0;
        }

        let closed = futures::future::join_all(
            drained
                .into_iter()
                .map(|(id, slot)| self.close_slot(id, slot)),
        )
        .await
        .into_iter()
        .filter(|closed| *closed)
        .count();

        tracing::info!("Profile pool cleaned up ({} sessions closed)", closed);
        closed
    }

    /// Wait for any lease on `slot`, then close its session and free its port.
    async fn close_slot(&self, profile_id: usize, slot: Slot<E::Session>) -> bool {
        let Some(profile) = slot.lock_owned().await.take() else {
            return false;
        };
        if let Err(e) = self.extractor.close_session(profile.session).await {
            tracing::warn!("Error closing profile {}: {}", profile_id, e);
        }
        self.ports.release(profile.port);
        tracing::debug!("Closed profile {} (port {})", profile_id, profile.port);
        true
    }

    fn lock_state(&self) -> MutexGuard<'_, PoolState<E::Session>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<E: Extractor> Drop for ProfilePool<E> {
    fn drop(&mut self) {
        let remaining = self.lock_state().residents.len();
        if remaining > 0 {
            tracing::warn!(
                "Profile pool dropped with {} resident sessions; call cleanup_all first",
                remaining
            );
        }
    }
}
