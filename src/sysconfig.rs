//! Filesystem roots for cgroup and process information, resolved once at
//! startup and immutable afterwards.

use std::path::{Path, PathBuf};

use crate::environment::{self, RuntimeEnvironment};
use crate::error::ResultOkLogExt;
use crate::mountinfo;

/// The two roots everything in this crate reads beneath: the directory
/// containing the `cgroup/` hierarchy and the process-information root.
#[derive(Debug, Clone)]
pub struct SystemConfig {
    sysfs_path: PathBuf,
    proc_path: PathBuf,
}

impl SystemConfig {
    /// Builds a config with explicit roots. Used by tests and embedders
    /// that manage mounts themselves.
    pub fn new(sysfs_path: impl Into<PathBuf>, proc_path: impl Into<PathBuf>) -> Self {
        Self {
            sysfs_path: sysfs_path.into(),
            proc_path: proc_path.into(),
        }
    }

    /// Resolves the roots from the environment.
    ///
    /// `ROOTFS_MOUNT_PATH` (default `/rootfs`) names the host root mount
    /// used when the process is detected to run inside a container; on a
    /// plain host `/` is used instead. `SYSFS_MOUNT_PATH` and
    /// `PROC_MOUNT_PATH` override the individual roots directly.
    pub fn from_env() -> Self {
        let rootfs = std::env::var_os("ROOTFS_MOUNT_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/rootfs"));
        let rootfs = match environment::detect_runtime_environment(&rootfs) {
            RuntimeEnvironment::Container => rootfs,
            RuntimeEnvironment::Host => PathBuf::from("/"),
        };
        log::debug!("effective rootfs: {}", rootfs.display());

        let sysfs_path = std::env::var_os("SYSFS_MOUNT_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| detect_sysfs_root(&rootfs));
        let proc_path = std::env::var_os("PROC_MOUNT_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| rootfs.join("proc"));

        Self::new(sysfs_path, proc_path)
    }

    pub fn sysfs_path(&self) -> &Path {
        &self.sysfs_path
    }

    pub fn proc_path(&self) -> &Path {
        &self.proc_path
    }
}

/// Derives the directory containing `cgroup/` from init's mount table,
/// falling back to `<rootfs>/sys/fs` when the table is unreadable.
fn detect_sysfs_root(rootfs: &Path) -> PathBuf {
    let detected = mountinfo::detect_cgroup_root(rootfs.join("proc/1/mountinfo"))
        .ok_warn()
        .and_then(|cgroup_dir| cgroup_dir.parent().map(Path::to_path_buf));

    match detected {
        // mountinfo reports paths as init sees them; rebase onto the rootfs mount
        Some(parent) => rootfs.join(parent.strip_prefix("/").unwrap_or(&parent)),
        None => rootfs.join("sys/fs"),
    }
}
