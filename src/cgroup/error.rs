use std::path::PathBuf;

/// Errors that may occur while detecting a host's cgroup layout.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no kubernetes cgroup hierarchy found under `{root}`")]
    LayoutNotFound { root: PathBuf },

    #[error("no pod cgroup found under `{path}` to derive the layout from")]
    PodEntryNotFound { path: PathBuf },

    #[error("cgroup path `{path}` is not valid UTF-8")]
    NonUtf8Path { path: PathBuf },
}

pub type Result<T> = std::result::Result<T, Error>;
