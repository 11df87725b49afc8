//! Container metadata lookups over the cgroup filesystem.
//!
//! [`CgroupMetadataReader`] is the facade the rest of the crate talks to:
//! it owns whichever path resolver matched the host at startup and exposes
//! the reads everything else is built on: pod path construction, pod
//! process listings, and the reverse lookup from a PID to the container ids
//! named by its cgroup membership record.

use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::cgroup::{CgroupPathResolver, ContainerRuntime, LegacyPathResolver, QosClass};
use crate::container::{self, ContainerId};
use crate::fsutil;
use crate::sysconfig::SystemConfig;

mod error;

pub use error::{Error, Result};

/// The path-resolution strategy selected at construction time.
///
/// At most one strategy is ever live: the current resolver is tried first
/// and the legacy one only when that failed. `Unavailable` means the host's
/// layout was not recognized at all and resolution is permanently disabled.
enum Resolver {
    Current(CgroupPathResolver),
    Legacy(LegacyPathResolver),
    Unavailable,
}

/// Reads container/pod metadata from the cgroup and proc filesystems.
///
/// Long-lived; constructed once per process and immutable afterwards.
pub struct CgroupMetadataReader {
    resolver: Resolver,
    proc_path: PathBuf,
}

impl CgroupMetadataReader {
    /// Detects the host's cgroup layout and keeps the first strategy that
    /// matches.
    ///
    /// Never fails: when neither strategy matches, the failure is logged
    /// once and every subsequent resolution call returns
    /// [`Error::ResolverUnavailable`]. The condition is not retried, an
    /// unrecognized layout does not fix itself.
    pub fn new(cfg: &SystemConfig) -> Self {
        let resolver = match CgroupPathResolver::create(cfg.sysfs_path()) {
            Ok(resolver) => {
                log::info!("using cgroup path resolver: {resolver}");
                Resolver::Current(resolver)
            }
            Err(err) => {
                log::error!("failed to create cgroup path resolver, falling back to legacy layouts: {err}");
                match LegacyPathResolver::create(cfg.sysfs_path()) {
                    Ok(resolver) => {
                        log::info!("using legacy cgroup path resolver: {resolver}");
                        Resolver::Legacy(resolver)
                    }
                    Err(err) => {
                        log::error!("failed to create legacy cgroup path resolver, container resolution is disabled: {err}");
                        Resolver::Unavailable
                    }
                }
            }
        };

        Self {
            resolver,
            proc_path: cfg.proc_path().to_path_buf(),
        }
    }

    /// Builds the path to the process-listing file of one container within
    /// one pod. `runtime` is forwarded only to the legacy resolver, current
    /// layouts carry the runtime naming in their discovered template.
    pub fn pod_path(
        &self,
        qos_class: QosClass,
        pod_id: &str,
        container_id: &str,
        runtime: ContainerRuntime,
    ) -> Result<PathBuf> {
        match &self.resolver {
            Resolver::Current(resolver) => Ok(resolver.pod_path(qos_class, pod_id, container_id)),
            Resolver::Legacy(resolver) => {
                Ok(resolver.pod_path(qos_class, pod_id, container_id, runtime))
            }
            Resolver::Unavailable => Err(Error::ResolverUnavailable),
        }
    }

    /// Reads the live PIDs of one container within one pod into `pid_set`,
    /// merging across calls so a pod's containers can be accumulated.
    ///
    /// Blank lines are skipped; lines that fail decimal parsing are logged
    /// and skipped, one malformed line never aborts the read.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] when the listing file is gone (the pod or
    /// container may have terminated between enumeration and read).
    pub fn read_pids(
        &self,
        qos_class: QosClass,
        pod_id: &str,
        container_id: &str,
        runtime: ContainerRuntime,
        pid_set: &mut HashSet<u32>,
    ) -> Result<()> {
        let path = self.pod_path(qos_class, pod_id, container_id, runtime)?;
        let reader = open_reader(&path)?;

        for line in reader.lines() {
            let line = line.map_err(|source| Error::ReadLine {
                path: path.clone(),
                source,
            })?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match line.parse::<u32>() {
                Ok(pid) => {
                    pid_set.insert(pid);
                }
                Err(_) => {
                    log::warn!("skipping malformed pid line in `{}`: `{line}`", path.display());
                }
            }
        }

        Ok(())
    }

    /// Returns the container ids referenced by a PID's cgroup membership
    /// record, in file order.
    ///
    /// Only lines naming the `pids` controller are considered; each yields
    /// every isolated 64-hex token it carries (duplicates preserved, no
    /// dedup at this layer). A `pids` line without any token is logged and
    /// contributes nothing.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] when the record is gone (the process may have
    /// exited).
    pub fn read_container_ids(&self, pid: u32) -> Result<Vec<ContainerId>> {
        let path = self.proc_path.join(pid.to_string());
        let reader = open_reader(&path)?;

        let mut container_ids = Vec::new();
        for line in reader.lines() {
            let line = line.map_err(|source| Error::ReadLine {
                path: path.clone(),
                source,
            })?;
            let line = line.trim();
            if line.is_empty() || !line.contains("pids") {
                continue;
            }
            let ids = container::extract_ids(line);
            if ids.is_empty() {
                log::warn!("no container id in cgroup line for pid {pid}: `{line}`");
            }
            container_ids.extend(ids);
        }

        Ok(container_ids)
    }

    /// Human-readable summary of the detected layout, for diagnostics only.
    pub fn describe(&self) -> String {
        match &self.resolver {
            Resolver::Current(resolver) => format!("cgroup path resolver: {resolver}"),
            Resolver::Legacy(resolver) => format!("legacy cgroup path resolver: {resolver}"),
            Resolver::Unavailable => "no usable cgroup path resolver".to_owned(),
        }
    }
}

/// Opens `path` for buffered reading, mapping a missing file to
/// [`Error::NotFound`] so callers can tell "gone" from "broken".
fn open_reader(path: &Path) -> Result<BufReader<File>> {
    fsutil::open_file_reader(path).map_err(|err| {
        if err.source.kind() == io::ErrorKind::NotFound {
            Error::NotFound { path: err.path }
        } else {
            Error::FileOpen(err)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const POD_UUID: &str = "8dbc5577-d0e2-4706-8787-57d52c03ddf2";
    const CID: &str = "14011c7d92a9e513dfd69211da0413dbf319a5e45a02b354ba6e98e10272542d";

    fn reader_for(root: &Path) -> CgroupMetadataReader {
        let cfg = SystemConfig::new(root.join("sys/fs"), root.join("proc"));
        CgroupMetadataReader::new(&cfg)
    }

    #[test]
    fn test_unavailable_when_no_layout_matches() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("sys/fs")).unwrap();

        let reader = reader_for(root.path());
        let err = reader
            .pod_path(QosClass::Burstable, POD_UUID, CID, ContainerRuntime::Docker)
            .unwrap_err();
        assert!(matches!(err, Error::ResolverUnavailable));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_falls_back_to_legacy_resolver() {
        let root = tempfile::tempdir().unwrap();
        // a kubepods.slice with no pod inside: nothing for the current
        // resolver to learn from, but a valid legacy layout
        std::fs::create_dir_all(
            root.path()
                .join("sys/fs/cgroup/cpu,cpuacct/kubepods.slice"),
        )
        .unwrap();

        let reader = reader_for(root.path());
        let path = reader
            .pod_path(QosClass::BestEffort, POD_UUID, CID, ContainerRuntime::Crio)
            .unwrap();
        assert_eq!(
            path,
            root.path().join(format!(
                "sys/fs/cgroup/cpu,cpuacct/kubepods.slice/kubepods-besteffort.slice/kubepods-besteffort-pod8dbc5577_d0e2_4706_8787_57d52c03ddf2.slice/crio-{CID}.scope/cgroup.procs"
            ))
        );
    }

    #[test]
    fn test_read_pids_skips_malformed_lines() {
        let root = tempfile::tempdir().unwrap();
        let pod_dir = root.path().join(format!(
            "sys/fs/cgroup/cpu,cpuacct/kubepods/besteffort/pod{POD_UUID}/{CID}"
        ));
        std::fs::create_dir_all(&pod_dir).unwrap();
        std::fs::write(pod_dir.join("cgroup.procs"), "123\n\nnot-a-pid\n456\n").unwrap();

        let reader = reader_for(root.path());
        let mut pids = HashSet::new();
        reader
            .read_pids(
                QosClass::BestEffort,
                POD_UUID,
                CID,
                ContainerRuntime::Docker,
                &mut pids,
            )
            .unwrap();
        assert_eq!(pids, HashSet::from([123, 456]));
    }

    #[test]
    fn test_read_pids_missing_file_is_not_found() {
        let root = tempfile::tempdir().unwrap();
        let pod_dir = root.path().join(format!(
            "sys/fs/cgroup/cpu,cpuacct/kubepods/besteffort/pod{POD_UUID}/{CID}"
        ));
        std::fs::create_dir_all(&pod_dir).unwrap();
        std::fs::write(pod_dir.join("cgroup.procs"), "1\n").unwrap();

        let reader = reader_for(root.path());
        let mut pids = HashSet::new();
        let err = reader
            .read_pids(
                QosClass::BestEffort,
                POD_UUID,
                "0000000000000000000000000000000000000000000000000000000000000000",
                ContainerRuntime::Docker,
                &mut pids,
            )
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_read_container_ids_extracts_pids_lines_only() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("sys/fs")).unwrap();
        let proc_dir = root.path().join("proc");
        std::fs::create_dir_all(&proc_dir).unwrap();
        std::fs::write(
            proc_dir.join("100"),
            format!(
                "11:cpu,cpuacct:/kubepods/besteffort/pod{POD_UUID}/{CID}\n\
                 7:pids:/kubepods/besteffort/pod{POD_UUID}/{CID}\n\
                 3:memory:/user.slice\n"
            ),
        )
        .unwrap();

        let reader = reader_for(root.path());
        let ids = reader.read_container_ids(100).unwrap();
        assert_eq!(ids.len(), 1);
        assert_eq!(ids[0].as_str(), CID);
    }

    #[test]
    fn test_read_container_ids_tokenless_pids_line_is_empty() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("sys/fs")).unwrap();
        let proc_dir = root.path().join("proc");
        std::fs::create_dir_all(&proc_dir).unwrap();
        std::fs::write(proc_dir.join("200"), "7:pids:/user.slice/session-4.scope\n").unwrap();

        let reader = reader_for(root.path());
        let ids = reader.read_container_ids(200).unwrap();
        assert!(ids.is_empty());
    }

    #[test]
    fn test_read_container_ids_missing_record_is_not_found() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("sys/fs")).unwrap();
        std::fs::create_dir_all(root.path().join("proc")).unwrap();

        let reader = reader_for(root.path());
        let err = reader.read_container_ids(4242).unwrap_err();
        assert!(err.is_not_found());
    }
}
