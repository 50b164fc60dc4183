//! Library coordinates parsed from repository-layout paths
//!
//! Archives fetched from a dependency repository land on disk as
//! `<root>/<group…>/<artifact>/<version>/<artifact>-<version>.<ext>`.
//! That layout carries enough identity to detect version conflicts without
//! opening the archive, so kiln derives coordinates purely from the path.

use std::path::Path;

/// A library identity parsed from an archive path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Coordinate {
    /// `group/artifact`, e.g. `org.clojure/data.json`
    pub id: String,

    /// Version string, e.g. `2.5.0`
    pub version: String,
}

/// Parse a coordinate from a repository-layout archive path.
///
/// The first component is the repository root and is not part of the
/// coordinate. The artifact and version must each appear twice (as
/// directory names and again in the file name) or the path is not a
/// repository layout and `None` is returned. Unrecognized layouts are
/// expected (project-local jars, classes directories) and are silently
/// skipped, never an error.
pub fn parse_coordinate(path: &Path) -> Option<Coordinate> {
    let comps: Vec<&str> = path
        .iter()
        .filter_map(|c| c.to_str())
        .filter(|c| *c != "/" && *c != "\\")
        .collect();

    // root + at least one group segment + artifact + version + file
    if comps.len() < 5 {
        return None;
    }

    let file = comps[comps.len() - 1];
    let version = comps[comps.len() - 2];
    let artifact = comps[comps.len() - 3];
    let group = &comps[1..comps.len() - 3];

    let (stem, ext) = file.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }

    // The file name must repeat both directory segments exactly.
    let expected = format!("{}-{}", artifact, version);
    if stem != expected {
        return None;
    }

    Some(Coordinate {
        id: format!("{}/{}", group.join("/"), artifact),
        version: version.to_string(),
    })
}
