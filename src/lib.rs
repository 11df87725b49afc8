//! Podident: container/pod identity resolution for kernel-observed PIDs.
//!
//! Every event sampled by a tracing agent carries a PID; downstream
//! aggregation, filtering and display need a stable container identity
//! instead. This library resolves PID → container id through the host's
//! cgroup filesystem and caches the result under a small generational
//! decay, so resolution cost is paid once per process rather than once per
//! event.
//!
//! # Key components
//!
//! - [`cgroup::CgroupPathResolver`] / [`cgroup::LegacyPathResolver`] —
//!   build pod `cgroup.procs` paths across the layout conventions found in
//!   the wild.
//! - [`metadata::CgroupMetadataReader`] — resolver facade plus pod process
//!   listings and the PID → container id reverse lookup.
//! - [`tracker::PidTracker`] — tick-driven generational PID → container id
//!   cache; the probe layer submits active-PID sets, the tagging layer does
//!   point lookups.
//!
//! # Platform requirements
//!
//! - Linux with the cgroup filesystem mounted.
//! - Read access to the cgroup tree and the process-information root.

pub mod cgroup;
pub mod container;
pub mod environment;
pub mod error;
pub mod fsutil;
pub mod metadata;
pub mod mountinfo;
pub mod sysconfig;
pub mod tracker;

use std::collections::HashSet;

/// Resolves the given PIDs once and prints the result, one line per PID.
///
/// Driver for the `podident` binary: builds the system configuration from
/// the environment, constructs the metadata reader, reports the detected
/// layout and runs a single tracker tick over `pids`.
pub fn run(pids: Vec<u32>) {
    let cfg = sysconfig::SystemConfig::from_env();
    log::debug!(
        "sysfs root: {}, proc root: {}",
        cfg.sysfs_path().display(),
        cfg.proc_path().display()
    );

    let reader = metadata::CgroupMetadataReader::new(&cfg);
    println!("{}", reader.describe());

    let mut tracker = tracker::PidTracker::new(reader);
    let observed: HashSet<u32> = pids.iter().copied().collect();
    tracker.set_current_pids(&observed);

    for pid in pids {
        match tracker.find_cid_by_pid(pid) {
            Some(container_id) => println!("{pid}\t{container_id}"),
            None => println!("{pid}\t<unknown>"),
        }
    }
}
