use std::fmt;
use std::path::{Path, PathBuf};

use super::{ContainerRuntime, Error, QosClass, Result};

/// Naming convention used by older kubernetes cgroup trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NamingScheme {
    /// `kubepods/burstable/pod<uuid>/<container>/cgroup.procs`
    Cgroupfs,
    /// `kubepods.slice/kubepods-burstable.slice/kubepods-burstable-pod<uuid>.slice/<runtime>-<container>.scope/cgroup.procs`
    Systemd,
}

/// Resolves pod cgroup paths on hosts using pre-unified kubernetes layouts.
///
/// Unlike [`CgroupPathResolver`](super::CgroupPathResolver) the layout is
/// fixed by convention rather than discovered, so systemd scope names need
/// the container runtime spelled out by the caller.
#[derive(Debug)]
pub struct LegacyPathResolver {
    kubepods_base: PathBuf,
    scheme: NamingScheme,
}

impl LegacyPathResolver {
    /// Probes the known legacy layouts under `sysfs_root`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LayoutNotFound`] when no kubepods hierarchy exists
    /// under any of the cgroup v1 controller mounts. An expected outcome on
    /// current hosts, not a fault.
    pub fn create(sysfs_root: &Path) -> Result<Self> {
        const BASE_DIRS: [&str; 3] = ["cgroup/cpu,cpuacct", "cgroup/cpu", "cgroup/pids"];

        for base_dir in BASE_DIRS {
            let kubepods = sysfs_root.join(base_dir).join("kubepods");
            if kubepods.is_dir() {
                return Ok(Self {
                    kubepods_base: kubepods,
                    scheme: NamingScheme::Cgroupfs,
                });
            }

            let kubepods_slice = sysfs_root.join(base_dir).join("kubepods.slice");
            if kubepods_slice.is_dir() {
                return Ok(Self {
                    kubepods_base: kubepods_slice,
                    scheme: NamingScheme::Systemd,
                });
            }
        }

        Err(Error::LayoutNotFound {
            root: sysfs_root.to_path_buf(),
        })
    }

    /// Builds the path to the `cgroup.procs` file of one container within
    /// one pod. Pure path construction; `runtime` only matters for systemd
    /// naming.
    pub fn pod_path(
        &self,
        qos_class: QosClass,
        pod_id: &str,
        container_id: &str,
        runtime: ContainerRuntime,
    ) -> PathBuf {
        let mut path = self.kubepods_base.clone();
        match self.scheme {
            NamingScheme::Cgroupfs => {
                if let Some(tier) = qos_class.tier_name() {
                    path.push(tier);
                }
                path.push(format!("pod{pod_id}"));
                path.push(container_id);
            }
            NamingScheme::Systemd => {
                // systemd slice names use underscores inside pod uuids
                let pod_id = pod_id.replace('-', "_");
                match qos_class.tier_name() {
                    Some(tier) => {
                        path.push(format!("kubepods-{tier}.slice"));
                        path.push(format!("kubepods-{tier}-pod{pod_id}.slice"));
                    }
                    None => path.push(format!("kubepods-pod{pod_id}.slice")),
                }
                path.push(format!("{}-{container_id}.scope", runtime.scope_prefix()));
            }
        }
        path.push("cgroup.procs");
        path
    }
}

impl fmt::Display for LegacyPathResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "kubepods_base=`{}`, naming={:?}",
            self.kubepods_base.display(),
            self.scheme
        )
    }
}
