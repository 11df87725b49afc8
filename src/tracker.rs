//! Tick-driven PID → container id cache with generational decay.
//!
//! Resolving a PID's container identity costs filesystem reads plus pattern
//! extraction, far too much to pay per sampled event. [`PidTracker`] pays it
//! once per process instead: each tick the probe layer submits the set of
//! PIDs it currently considers active, newly-seen PIDs are resolved through
//! [`CgroupMetadataReader::read_container_ids`] and everything else is a
//! map lookup. A PID missing from a few consecutive ticks is ambiguous
//! (sampling gap or true exit), so entries decay over a short grace window
//! instead of being dropped immediately; that bounds memory to the live PID
//! count times a small constant without a separate sweep pass.

use std::collections::{HashMap, HashSet};

use crate::container::ContainerId;
use crate::metadata::CgroupMetadataReader;

/// Counter value given to every PID observed in the current tick.
const GENERATION_YOUNG: u32 = 3;
/// Counter value at which an unobserved PID's entry is removed.
const GENERATION_EXPIRED: u32 = 0;

/// Maps kernel PIDs to the container they run in, refreshed tick by tick.
///
/// Single-writer: one driver calls [`set_current_pids`] at a time, and
/// concurrent lookups while a tick is in flight need external
/// synchronization.
///
/// [`set_current_pids`]: PidTracker::set_current_pids
pub struct PidTracker {
    reader: CgroupMetadataReader,
    generations: HashMap<u32, u32>,
    container_ids: HashMap<u32, ContainerId>,
}

impl PidTracker {
    pub fn new(reader: CgroupMetadataReader) -> Self {
        Self {
            reader,
            generations: HashMap::new(),
            container_ids: HashMap::new(),
        }
    }

    /// Submits the PIDs considered active this tick and advances the cache.
    ///
    /// Every observed PID is marked young; the first observation of a PID
    /// triggers exactly one reverse lookup, and a lookup that fails or
    /// yields nothing simply leaves the mapping unset until a later tick
    /// (cgroup membership may not be written yet). Tracked PIDs absent from
    /// `observed` age by one; once expired, the entry and its cached id are
    /// removed together.
    ///
    /// Per-PID resolution trouble never fails the tick.
    pub fn set_current_pids(&mut self, observed: &HashSet<u32>) {
        let mut next = HashMap::with_capacity(observed.len() + self.generations.len());

        for &pid in observed {
            next.insert(pid, GENERATION_YOUNG);
            if self.container_ids.contains_key(&pid) {
                continue;
            }
            match self.reader.read_container_ids(pid) {
                Ok(container_ids) => {
                    if let Some(container_id) = container_ids.into_iter().next() {
                        self.container_ids.insert(pid, container_id);
                    }
                }
                Err(err) if err.is_not_found() => {
                    log::debug!("no cgroup record for pid {pid}, likely exited: {err}");
                }
                Err(err) => {
                    log::warn!("container id lookup failed for pid {pid}: {err}");
                }
            }
        }

        for (&pid, &generation) in &self.generations {
            if next.contains_key(&pid) {
                continue;
            }
            let generation = generation.saturating_sub(1);
            if generation <= GENERATION_EXPIRED {
                self.container_ids.remove(&pid);
            } else {
                next.insert(pid, generation);
            }
        }

        self.generations = next;
    }

    /// Returns the cached container id for `pid`, if any.
    ///
    /// Pure map lookup; never reads the filesystem. All resolution happens
    /// inside [`set_current_pids`](PidTracker::set_current_pids).
    pub fn find_cid_by_pid(&self, pid: u32) -> Option<&ContainerId> {
        self.container_ids.get(&pid)
    }

    /// Drops all tracked state. Intended for tests and for drivers that
    /// need a clean slate without reconstructing the reader.
    pub fn reset(&mut self) {
        self.generations.clear();
        self.container_ids.clear();
    }

    pub fn reader(&self) -> &CgroupMetadataReader {
        &self.reader
    }
}
