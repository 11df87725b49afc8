use std::path::PathBuf;

use crate::fsutil;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Neither path-resolution strategy matched the host's cgroup layout;
    /// every resolution call fails until the process is reconfigured.
    #[error("no usable cgroup path resolver")]
    ResolverUnavailable,

    /// The pod, container or process is already gone. Recoverable, callers
    /// should treat it as "no data this tick".
    #[error("file `{path}` not found")]
    NotFound { path: PathBuf },

    #[error(transparent)]
    FileOpen(#[from] fsutil::FileOpenError),

    #[error("failed to read line from `{path}`: {source}")]
    ReadLine {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// True when the failure only means the target has disappeared, as
    /// opposed to a broken configuration or I/O fault.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
