use std::collections::HashSet;

use exec_canary_common::MAX_PATHNAME_LEN;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WatchListError {
    #[error("pathname too long: {path} ({len} chars)")]
    PathTooLong { path: String, len: usize },
    #[error("no pathnames to watch")]
    Empty,
}

/// Pathnames whose execution fires the canary.
///
/// Matching is exact string equality against what the kernel reports as the
/// first `execve` argument; no globbing or normalisation is applied.
#[derive(Debug, Clone)]
pub struct WatchList {
    paths: HashSet<String>,
}

impl WatchList {
    pub fn new<I, S>(paths: I) -> Result<Self, WatchListError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = HashSet::new();
        for path in paths {
            let path = path.into();
            if path.is_empty() {
                continue;
            }
            // such an entry could never match a decoded record
            if path.len() > MAX_PATHNAME_LEN {
                let len = path.len();
                return Err(WatchListError::PathTooLong { path, len });
            }
            set.insert(path);
        }
        if set.is_empty() {
            return Err(WatchListError::Empty);
        }
        Ok(Self { paths: set })
    }

    pub fn parse_csv(csv: &str) -> Result<Self, WatchListError> {
        Self::new(csv.split(','))
    }

    pub fn contains(&self, pathname: &str) -> bool {
        self.paths.contains(pathname)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }
}
