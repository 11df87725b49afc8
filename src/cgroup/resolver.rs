use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use super::{Error, QosClass, Result};

/// Marker substituted for the pod UUID in a discovered path template.
const POD_MARKER: &str = "{pod}";
/// Marker substituted for the container id.
const CONTAINER_MARKER: &str = "{container}";
/// Marker substituted for the QoS tier name.
const QOS_MARKER: &str = "{qos}";

/// How deep below the cgroup base the discovery scan descends.
const MAX_SCAN_DEPTH: usize = 5;

/// Matches `pod` followed by a UUID whose groups are joined by `-` or `_`.
/// The first capture group carries the separator actually in use.
static POD_UUID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"pod[0-9a-f]{8}([-_])[0-9a-f]{4}[-_][0-9a-f]{4}[-_][0-9a-f]{4}[-_][0-9a-f]{12}")
        .expect("pod uuid pattern must compile")
});

/// Matches a 64-hex container id embedded in a path component.
static CONTAINER_HEX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[0-9a-f]{64}").expect("container id pattern must compile"));

/// How the QoS tier appears in a discovered layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QosEncoding {
    /// The tier is its own directory: `kubepods/besteffort/pod<uuid>/...`.
    Directory,
    /// The tier is embedded in systemd slice names:
    /// `kubepods-besteffort.slice/kubepods-besteffort-pod<uuid>.slice/...`.
    Slice,
    /// The discovered example was a guaranteed pod, so the template carries
    /// no tier component and one is inserted on demand.
    Absent,
}

/// Resolves pod cgroup paths on hosts using current kubernetes layouts.
///
/// The layout is learned from one live pod cgroup found at construction
/// time: the pod UUID, container id and QoS tier in that path are replaced
/// by placeholders and every other component, including the container
/// runtime's scope naming (`docker-*.scope`, `cri-containerd-*.scope`, bare
/// ids), is kept verbatim. Resolution therefore never needs to be told
/// which engine runs the host.
#[derive(Debug)]
pub struct CgroupPathResolver {
    template: String,
    pod_separator: char,
    qos: QosEncoding,
}

impl CgroupPathResolver {
    /// Detects the cgroup layout under `sysfs_root`.
    ///
    /// # Errors
    ///
    /// - [`Error::LayoutNotFound`] if no cgroup base directory holds a
    ///   kubepods hierarchy.
    /// - [`Error::PodEntryNotFound`] if the hierarchy exists but holds no
    ///   pod cgroup to derive the layout from (e.g. an idle node).
    pub fn create(sysfs_root: &Path) -> Result<Self> {
        let base = kubepods_base_path(sysfs_root)?;
        let example = find_example_pod_path(&base)?;
        match example.to_str() {
            Some(example) => Self::from_example_path(example),
            None => Err(Error::NonUtf8Path { path: example }),
        }
    }

    /// Derives the path template from one concrete pod cgroup path.
    fn from_example_path(example: &str) -> Result<Self> {
        let caps = POD_UUID_RE
            .captures(example)
            .ok_or_else(|| Error::PodEntryNotFound {
                path: PathBuf::from(example),
            })?;
        let pod_separator = if &caps[1] == "_" { '_' } else { '-' };

        let pod_replacement = format!("pod{POD_MARKER}");
        let template = POD_UUID_RE
            .replace(example, pod_replacement.as_str())
            .into_owned();
        let template = CONTAINER_HEX_RE
            .replace(&template, CONTAINER_MARKER)
            .into_owned();

        let qos = if template.contains("/besteffort/") || template.contains("/burstable/") {
            QosEncoding::Directory
        } else if template.contains("-besteffort") || template.contains("-burstable") {
            QosEncoding::Slice
        } else {
            QosEncoding::Absent
        };
        let template = template
            .replace("besteffort", QOS_MARKER)
            .replace("burstable", QOS_MARKER);

        Ok(Self {
            template,
            pod_separator,
            qos,
        })
    }

    /// Builds the path to the `cgroup.procs` file of one container within
    /// one pod. Pure string substitution, the filesystem is not touched;
    /// existence is the caller's concern.
    pub fn pod_path(&self, qos_class: QosClass, pod_id: &str, container_id: &str) -> PathBuf {
        let path = match (qos_class.tier_name(), self.qos) {
            (None, QosEncoding::Directory) => self.template.replace(&format!("/{QOS_MARKER}"), ""),
            (None, QosEncoding::Slice) => self.template.replace(&format!("-{QOS_MARKER}"), ""),
            (None, QosEncoding::Absent) => self.template.clone(),
            (Some(tier), QosEncoding::Directory | QosEncoding::Slice) => {
                self.template.replace(QOS_MARKER, tier)
            }
            (Some(tier), QosEncoding::Absent) => insert_tier(&self.template, tier),
        };

        let pod_id = if self.pod_separator == '_' {
            pod_id.replace('-', "_")
        } else {
            pod_id.to_owned()
        };

        PathBuf::from(
            path.replace(POD_MARKER, &pod_id)
                .replace(CONTAINER_MARKER, container_id),
        )
    }
}

impl fmt::Display for CgroupPathResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "template=`{}`, pod_separator=`{}`, qos_encoding={:?}",
            self.template, self.pod_separator, self.qos
        )
    }
}

/// Rewrites a guaranteed-pod template into one for the given tier.
fn insert_tier(template: &str, tier: &str) -> String {
    if template.contains("kubepods-pod") {
        // systemd naming nests a tier slice between kubepods.slice and the pod slice
        template.replace(
            "kubepods-pod",
            &format!("kubepods-{tier}.slice/kubepods-{tier}-pod"),
        )
    } else {
        template.replace("kubepods/pod", &format!("kubepods/{tier}/pod"))
    }
}

/// Returns the first cgroup base directory under `sysfs_root` that holds a
/// kubepods hierarchy. The v1 controller mounts are probed before the v2
/// unified directory.
fn kubepods_base_path(sysfs_root: &Path) -> Result<PathBuf> {
    const CANDIDATES: [&str; 4] = ["cgroup/cpu,cpuacct", "cgroup/cpu", "cgroup/pids", "cgroup"];

    for candidate in CANDIDATES {
        let base = sysfs_root.join(candidate);
        if has_kubepods_entry(&base) {
            return Ok(base);
        }
    }

    Err(Error::LayoutNotFound {
        root: sysfs_root.to_path_buf(),
    })
}

fn has_kubepods_entry(base: &Path) -> bool {
    let Ok(entries) = std::fs::read_dir(base) else {
        return false;
    };
    entries
        .filter_map(|entry| entry.ok())
        .any(|entry| entry.file_name().to_string_lossy().starts_with("kubepods"))
}

/// Scans below `base` for a live pod cgroup to derive the layout from,
/// returning the path of its `cgroup.procs` file.
///
/// Tiered (besteffort/burstable) pods are preferred so the template keeps a
/// QoS component; a guaranteed pod is used only when nothing else exists.
/// Directories vanishing mid-scan are skipped, the cgroup tree mutates
/// underneath us.
fn find_example_pod_path(base: &Path) -> Result<PathBuf> {
    let mut fallback = None;
    let mut stack = VecDeque::new();
    stack.push_back((base.to_path_buf(), 0usize));

    while let Some((dir, depth)) = stack.pop_back() {
        if depth > MAX_SCAN_DEPTH {
            continue;
        }
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.filter_map(|entry| entry.ok()) {
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if !file_type.is_dir() {
                continue;
            }

            let path = entry.path();
            let name = entry.file_name();
            if CONTAINER_HEX_RE.is_match(&name.to_string_lossy())
                && POD_UUID_RE.is_match(&path.to_string_lossy())
                && path.join("cgroup.procs").is_file()
            {
                let procs = path.join("cgroup.procs");
                let in_tier = {
                    let s = path.to_string_lossy();
                    s.contains("besteffort") || s.contains("burstable")
                };
                if in_tier {
                    return Ok(procs);
                }
                fallback.get_or_insert(procs);
                continue;
            }

            stack.push_back((path, depth + 1));
        }
    }

    fallback.ok_or_else(|| Error::PodEntryNotFound {
        path: base.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const POD_UUID: &str = "8dbc5577-d0e2-4706-8787-57d52c03ddf2";
    const POD_UUID_UNDERSCORED: &str = "8dbc5577_d0e2_4706_8787_57d52c03ddf2";
    const CID: &str = "14011c7d92a9e513dfd69211da0413dbf319a5e45a02b354ba6e98e10272542d";
    const OTHER_CID: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

    fn make_procs_file(dir: &Path) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join("cgroup.procs"), "1\n").unwrap();
    }

    #[test]
    fn test_create_fails_without_kubepods() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("cgroup/cpu,cpuacct/system.slice")).unwrap();

        let err = CgroupPathResolver::create(root.path()).unwrap_err();
        assert!(matches!(err, Error::LayoutNotFound { .. }));
    }

    #[test]
    fn test_create_fails_on_idle_node() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("cgroup/cpu,cpuacct/kubepods/besteffort"))
            .unwrap();

        let err = CgroupPathResolver::create(root.path()).unwrap_err();
        assert!(matches!(err, Error::PodEntryNotFound { .. }));
    }

    #[test]
    fn test_cgroupfs_v1_layout() {
        let root = tempfile::tempdir().unwrap();
        let pod_dir = root.path().join(format!(
            "cgroup/cpu,cpuacct/kubepods/besteffort/pod{POD_UUID}/{CID}"
        ));
        make_procs_file(&pod_dir);

        let resolver = CgroupPathResolver::create(root.path()).unwrap();

        let path = resolver.pod_path(QosClass::BestEffort, POD_UUID, OTHER_CID);
        assert_eq!(
            path,
            root.path().join(format!(
                "cgroup/cpu,cpuacct/kubepods/besteffort/pod{POD_UUID}/{OTHER_CID}/cgroup.procs"
            ))
        );

        let path = resolver.pod_path(QosClass::Burstable, POD_UUID, OTHER_CID);
        assert_eq!(
            path,
            root.path().join(format!(
                "cgroup/cpu,cpuacct/kubepods/burstable/pod{POD_UUID}/{OTHER_CID}/cgroup.procs"
            ))
        );

        let path = resolver.pod_path(QosClass::Guaranteed, POD_UUID, OTHER_CID);
        assert_eq!(
            path,
            root.path().join(format!(
                "cgroup/cpu,cpuacct/kubepods/pod{POD_UUID}/{OTHER_CID}/cgroup.procs"
            ))
        );
    }

    #[test]
    fn test_systemd_v2_layout() {
        let root = tempfile::tempdir().unwrap();
        let pod_dir = root.path().join(format!(
            "cgroup/kubepods.slice/kubepods-burstable.slice/kubepods-burstable-pod{POD_UUID_UNDERSCORED}.slice/cri-containerd-{CID}.scope"
        ));
        make_procs_file(&pod_dir);

        let resolver = CgroupPathResolver::create(root.path()).unwrap();

        // pod ids offered with dashes are converted to the layout's underscores
        let path = resolver.pod_path(QosClass::Burstable, POD_UUID, OTHER_CID);
        assert_eq!(
            path,
            root.path().join(format!(
                "cgroup/kubepods.slice/kubepods-burstable.slice/kubepods-burstable-pod{POD_UUID_UNDERSCORED}.slice/cri-containerd-{OTHER_CID}.scope/cgroup.procs"
            ))
        );

        let path = resolver.pod_path(QosClass::Guaranteed, POD_UUID, OTHER_CID);
        assert_eq!(
            path,
            root.path().join(format!(
                "cgroup/kubepods.slice/kubepods-pod{POD_UUID_UNDERSCORED}.slice/cri-containerd-{OTHER_CID}.scope/cgroup.procs"
            ))
        );
    }

    #[test]
    fn test_guaranteed_only_cgroupfs_layout() {
        let root = tempfile::tempdir().unwrap();
        let pod_dir = root
            .path()
            .join(format!("cgroup/cpu/kubepods/pod{POD_UUID}/{CID}"));
        make_procs_file(&pod_dir);

        let resolver = CgroupPathResolver::create(root.path()).unwrap();

        let path = resolver.pod_path(QosClass::BestEffort, POD_UUID, OTHER_CID);
        assert_eq!(
            path,
            root.path().join(format!(
                "cgroup/cpu/kubepods/besteffort/pod{POD_UUID}/{OTHER_CID}/cgroup.procs"
            ))
        );
    }

    #[test]
    fn test_guaranteed_only_systemd_layout() {
        let root = tempfile::tempdir().unwrap();
        let pod_dir = root.path().join(format!(
            "cgroup/kubepods.slice/kubepods-pod{POD_UUID_UNDERSCORED}.slice/docker-{CID}.scope"
        ));
        make_procs_file(&pod_dir);

        let resolver = CgroupPathResolver::create(root.path()).unwrap();

        let path = resolver.pod_path(QosClass::BestEffort, POD_UUID, OTHER_CID);
        assert_eq!(
            path,
            root.path().join(format!(
                "cgroup/kubepods.slice/kubepods-besteffort.slice/kubepods-besteffort-pod{POD_UUID_UNDERSCORED}.slice/docker-{OTHER_CID}.scope/cgroup.procs"
            ))
        );
    }

    #[test]
    fn test_tiered_example_preferred_over_guaranteed() {
        let root = tempfile::tempdir().unwrap();
        make_procs_file(
            &root
                .path()
                .join(format!("cgroup/cpu/kubepods/pod{POD_UUID}/{CID}")),
        );
        make_procs_file(&root.path().join(format!(
            "cgroup/cpu/kubepods/burstable/pod{POD_UUID}/{OTHER_CID}"
        )));

        let resolver = CgroupPathResolver::create(root.path()).unwrap();
        assert_eq!(resolver.qos, QosEncoding::Directory);
    }
}
