//! Heuristics for telling whether the agent runs on the host or inside a
//! container, which decides where the host's filesystem roots are mounted.

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Where the process is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeEnvironment {
    /// Directly on the host.
    Host,
    /// Inside a containerized environment (Docker, Kubernetes, Podman, ...).
    Container,
}

/// Detects whether the current process runs inside a container.
///
/// Three heuristics are tried in order: PID-namespace comparison against
/// init under `rootfs`, container-runtime markers in `/proc/self/cgroup`,
/// and well-known indicator files. Individual check failures are logged as
/// warnings and never abort detection; an inconclusive result is reported
/// as [`RuntimeEnvironment::Host`].
pub fn detect_runtime_environment(rootfs: impl AsRef<Path>) -> RuntimeEnvironment {
    let rootfs = rootfs.as_ref();

    match is_pid_namespace_isolated(rootfs) {
        Ok(true) => return RuntimeEnvironment::Container,
        Ok(false) => {}
        Err(err) => log::warn!("pid namespace check failed during runtime detection: {err}"),
    }

    match matches_container_cgroup() {
        Ok(true) => return RuntimeEnvironment::Container,
        Ok(false) => {}
        Err(err) => log::warn!("cgroup check failed during runtime detection: {err}"),
    }

    if has_container_indicators() {
        return RuntimeEnvironment::Container;
    }

    RuntimeEnvironment::Host
}

/// Returns true if init's PID namespace under `rootfs` differs from ours.
fn is_pid_namespace_isolated(rootfs: &Path) -> std::io::Result<bool> {
    let self_ns = fs::read_link("/proc/self/ns/pid")?;
    let root_ns = fs::read_link(rootfs.join("proc/1/ns/pid"))?;
    Ok(self_ns != root_ns)
}

/// Returns true if `/proc/self/cgroup` carries container-runtime markers or
/// long hex path components typical of container cgroups.
fn matches_container_cgroup() -> std::io::Result<bool> {
    const MARKERS: [&str; 4] = ["docker", "kubepods", "containerd", "libpod"];

    let reader = BufReader::new(File::open("/proc/self/cgroup")?);
    for line in reader.lines() {
        let line = line?;
        if MARKERS.iter().any(|marker| line.contains(marker)) {
            return Ok(true);
        }
        if line
            .split('/')
            .any(|part| part.len() >= 32 && is_hex_string(part))
        {
            return Ok(true);
        }
    }

    Ok(false)
}

/// Returns true if well-known container marker files or variables exist.
fn has_container_indicators() -> bool {
    fs::metadata("/.dockerenv").is_ok()
        || fs::metadata("/run/.containerenv").is_ok()
        || std::env::var_os("container").is_some()
}

fn is_hex_string(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit())
}
