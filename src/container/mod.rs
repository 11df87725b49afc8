use std::borrow::Borrow;
use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;

mod error;

pub use error::{Error, Result};

/// The exact length of a canonical container id.
const CONTAINER_ID_LEN: usize = 64;

/// Matches maximal runs of lowercase hex characters.
///
/// A container id counts only when it is an isolated 64-character token, so
/// [`extract_ids`] keeps the runs of exactly [`CONTAINER_ID_LEN`] characters
/// and discards longer ones. Expressing the boundary this way avoids the
/// look-around assertions `regex` does not support.
static CONTAINER_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[0-9a-f]{64,}").expect("container id pattern must compile"));

/// A validated container identifier: 64 lowercase hexadecimal characters, as
/// assigned by the container runtime.
///
/// # Examples
///
/// ```
/// # use podident::container::ContainerId;
/// let raw_id = "abc123abc123abc123abc123abc123abc123abc123abc123abc123abc123abcd";
/// let container_id = ContainerId::new(raw_id).unwrap();
/// assert_eq!(container_id.as_ref(), raw_id);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerId(Arc<str>);

impl ContainerId {
    /// Creates a new `ContainerId` from the given raw id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidContainerId`] unless the input is exactly
    /// [`CONTAINER_ID_LEN`] lowercase hex characters.
    pub fn new(src: impl AsRef<str>) -> Result<Self> {
        let src = src.as_ref();
        if src.len() != CONTAINER_ID_LEN || !is_lowercase_hex(src) {
            return Err(Error::InvalidContainerId(src.to_owned()));
        }

        Ok(Self(src.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ContainerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ContainerId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extracts every isolated 64-hex container id token from `line`, in order.
///
/// Tokens embedded mid-path and tokens at end-of-line both match; runs of
/// more than 64 hex characters match nothing. Duplicates are preserved, the
/// caller decides whether to dedup.
pub fn extract_ids(line: &str) -> Vec<ContainerId> {
    CONTAINER_ID_RE
        .find_iter(line)
        .filter(|m| m.len() == CONTAINER_ID_LEN)
        .map(|m| ContainerId(m.as_str().into()))
        .collect()
}

fn is_lowercase_hex(src: &str) -> bool {
    src.bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'a'..=b'f'))
}
