//! Minimal `mountinfo(5)` parsing for locating the cgroup filesystem.
//!
//! Only the two fields this crate consumes are parsed out of each line, the
//! mount point and the filesystem type. See
//! [`proc_pid_mountinfo(5)`](https://man7.org/linux/man-pages/man5/proc_pid_mountinfo.5.html)
//! for the full format.

use std::io::BufRead;
use std::path::{Path, PathBuf};

use crate::fsutil;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    FileOpen(#[from] fsutil::FileOpenError),

    #[error("failed to read line from `{path}`: {source}")]
    ReadLine {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed mountinfo line: `{0}`")]
    MalformedLine(String),

    #[error("no cgroup mount found in `{path}`")]
    MissingCgroupMount { path: PathBuf },
}

pub type Result<T> = std::result::Result<T, Error>;

/// The mountinfo fields this crate consumes.
#[derive(Debug, PartialEq, Eq)]
struct MountEntry<'a> {
    mount_point: &'a str,
    fs_type: &'a str,
}

/// Parses one mountinfo line.
///
/// Format: `id parent major:minor root mount_point opts [optional...] - fs_type source super_opts`;
/// the ` - ` separator splits the variable-length optional fields from the
/// filesystem type.
fn parse_line(line: &str) -> Result<MountEntry<'_>> {
    let (pre, post) = line
        .split_once(" - ")
        .ok_or_else(|| Error::MalformedLine(line.to_owned()))?;

    let mount_point = pre
        .split_whitespace()
        .nth(4)
        .ok_or_else(|| Error::MalformedLine(line.to_owned()))?;
    let fs_type = post
        .split_whitespace()
        .next()
        .ok_or_else(|| Error::MalformedLine(line.to_owned()))?;

    Ok(MountEntry {
        mount_point,
        fs_type,
    })
}

/// Locates the cgroup directory by scanning a `mountinfo` file.
///
/// A `cgroup2` mount names the cgroup directory itself. On v1-only hosts
/// the per-controller `cgroup` mounts sit one level below it
/// (`/sys/fs/cgroup/cpu,cpuacct`, ...), so the first `cgroup` entry's
/// parent is returned instead.
///
/// # Errors
///
/// - [`Error::FileOpen`] / [`Error::ReadLine`] on I/O failure.
/// - [`Error::MalformedLine`] if a line does not follow the format.
/// - [`Error::MissingCgroupMount`] when no cgroup mount is listed.
pub fn detect_cgroup_root(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let reader = fsutil::open_file_reader(path)?;
    detect_cgroup_root_from_reader(reader, path)
}

fn detect_cgroup_root_from_reader<R: BufRead>(reader: R, origin: &Path) -> Result<PathBuf> {
    for line in reader.lines() {
        let line = line.map_err(|source| Error::ReadLine {
            path: origin.to_path_buf(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let entry = parse_line(&line)?;
        match entry.fs_type {
            "cgroup2" => {
                log::debug!("found cgroup2 mount point: {}", entry.mount_point);
                return Ok(PathBuf::from(entry.mount_point));
            }
            "cgroup" => {
                if let Some(parent) = Path::new(entry.mount_point).parent() {
                    log::debug!(
                        "found cgroup v1 controller mount `{}`, using its parent",
                        entry.mount_point
                    );
                    return Ok(parent.to_path_buf());
                }
            }
            _ => {}
        }
    }

    Err(Error::MissingCgroupMount {
        path: origin.to_path_buf(),
    })
}
