//! Exact full-line membership search.
//!
//! Every algorithm answers the same question: is `needle` equal to one of
//! the lines? `binary`, `jump` and `exponential` require sorted input;
//! [`crate::Corpus`] keeps its lines sorted and deduplicated so any
//! [`Algorithm`] can be used against it.

use std::borrow::Borrow;
use std::collections::HashSet;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Search algorithm used to answer queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Linear,
    Binary,
    #[default]
    Jump,
    Exponential,
    Set,
}

impl Algorithm {
    pub const ALL: [Self; 5] = [
        Self::Linear,
        Self::Binary,
        Self::Jump,
        Self::Exponential,
        Self::Set,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Binary => "binary",
            Self::Jump => "jump",
            Self::Exponential => "exponential",
            Self::Set => "set",
        }
    }

    /// Whether this algorithm relies on the input being sorted.
    pub const fn requires_sorted(self) -> bool {
        matches!(self, Self::Binary | Self::Jump | Self::Exponential)
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!(
                    "unknown search algorithm: {s} (expected one of: linear, binary, jump, exponential, set)"
                )
            })
    }
}

/// Scan every line in order.
pub fn linear_search<S: AsRef<str>>(needle: &str, lines: &[S]) -> bool {
    lines.iter().any(|line| line.as_ref() == needle)
}

/// Bisect a sorted slice.
pub fn binary_search<S: AsRef<str>>(needle: &str, sorted: &[S]) -> bool {
    sorted
        .binary_search_by(|line| line.as_ref().cmp(needle))
        .is_ok()
}

/// Jump ahead in blocks of `⌊√n⌋`, then scan the block that may hold the
/// needle.
pub fn jump_search<S: AsRef<str>>(needle: &str, sorted: &[S]) -> bool {
    let n = sorted.len();
    if n == 0 {
        return false;
    }
    let step = n.isqrt().max(1);

    let mut prev = 0;
    let mut curr = 0;
    while curr < n && sorted[curr].as_ref() <= needle {
        prev = curr;
        curr += step;
    }

    sorted[prev..curr.min(n)]
        .iter()
        .any(|line| line.as_ref() == needle)
}

/// Double the probe index until it passes the needle, then bisect the last
/// range.
pub fn exponential_search<S: AsRef<str>>(needle: &str, sorted: &[S]) -> bool {
    let n = sorted.len();
    if n == 0 {
        return false;
    }
    if sorted[0].as_ref() == needle {
        return true;
    }

    let mut bound = 1;
    while bound < n && sorted[bound].as_ref() <= needle {
        bound *= 2;
    }

    binary_search(needle, &sorted[bound / 2..bound.min(n)])
}

/// Hash set lookup.
pub fn set_search<T, H>(needle: &str, set: &HashSet<T, H>) -> bool
where
    T: Borrow<str> + Hash + Eq,
    H: BuildHasher,
{
    set.contains(needle)
}
