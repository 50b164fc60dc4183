//! Dependency sets and the environment-sharing compatibility rule

use crate::classpath::coordinate::parse_coordinate;
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

/// Kind of a classpath entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A versioned library archive (jar/zip)
    Archive,
    /// A directory of locally compiled output
    ClassesDir,
}

/// Classify a classpath entry by its path alone.
///
/// Entries may not exist on disk when a build call is planned, so
/// classification never touches the filesystem.
pub fn entry_kind(path: &Path) -> EntryKind {
    match path.extension().and_then(|e| e.to_str()) {
        Some("jar") | Some("zip") => EntryKind::Archive,
        _ => EntryKind::ClassesDir,
    }
}

/// An unordered set of classpath entries for one build call.
///
/// Comparison is structural (set equality, difference, intersection) with
/// no ordering semantics. Archive-only subsets of these key the environment
/// cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct DependencySet {
    entries: BTreeSet<PathBuf>,
}

impl DependencySet {
    /// Build a set from any iterable of paths
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            entries: paths.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains(path)
    }

    /// Iterate entries in path order
    pub fn iter(&self) -> impl Iterator<Item = &PathBuf> {
        self.entries.iter()
    }

    /// The archive entries as their own set
    pub fn archives(&self) -> DependencySet {
        Self {
            entries: self
                .entries
                .iter()
                .filter(|p| entry_kind(p) == EntryKind::Archive)
                .cloned()
                .collect(),
        }
    }

    /// The classes-directory entries, in path order
    pub fn class_dirs(&self) -> Vec<&Path> {
        self.entries
            .iter()
            .filter(|p| entry_kind(p) == EntryKind::ClassesDir)
            .map(PathBuf::as_path)
            .collect()
    }

    /// Entries present here but not in `other`
    pub fn difference(&self, other: &DependencySet) -> Vec<&Path> {
        self.entries
            .iter()
            .filter(|p| !other.entries.contains(*p))
            .map(PathBuf::as_path)
            .collect()
    }

    /// Number of entries shared with `other`
    pub fn intersection_len(&self, other: &DependencySet) -> usize {
        self.entries
            .iter()
            .filter(|p| other.entries.contains(*p))
            .count()
    }

    /// Map of `group/artifact` to version for every entry that parses as a
    /// repository-layout coordinate. Entries without coordinates are ignored
    /// for compatibility purposes.
    pub fn coordinates(&self) -> HashMap<String, String> {
        self.entries
            .iter()
            .filter_map(|p| parse_coordinate(p))
            .map(|c| (c.id, c.version))
            .collect()
    }

    /// Content fingerprint: first 12 hex chars of the SHA-256 over the
    /// sorted entry paths. For logs and event records only; cache keys
    /// compare the sets themselves.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for entry in &self.entries {
            hasher.update(entry.as_os_str().as_encoded_bytes());
            hasher.update([0u8]);
        }
        let digest = hasher.finalize();
        hex::encode(&digest[..6])
    }
}

impl<P: Into<PathBuf>> FromIterator<P> for DependencySet {
    fn from_iter<I: IntoIterator<Item = P>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// Decide whether two dependency sets may share an execution environment.
///
/// Compatible iff every `group/artifact` present in both coordinate maps
/// carries the same version. Keys present in only one set never conflict:
/// an environment's dependency set may grow over time, as long as no
/// already-resolved library is silently upgraded underneath loaded code.
pub fn compatible(a: &DependencySet, b: &DependencySet) -> bool {
    let coords_a = a.coordinates();
    if coords_a.is_empty() {
        return true;
    }
    let coords_b = b.coordinates();

    coords_a.iter().all(|(id, version)| {
        coords_b
            .get(id)
            .map(|other| other == version)
            .unwrap_or(true)
    })
}
