//! Workspace path sandbox.
//!
//! Artifact paths live under exactly one of two roots: `raw/` for immutable
//! uploads and `out/` for generated output. Paths are POSIX-style, relative,
//! and may not contain `..` segments. Empty and `.` segments are ignored, so
//! `out//a/./b` is read as `out/a/b`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Error;

const PARENT_DIR: &str = "..";

/// A sandbox root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    /// Read-only input (`raw/`).
    Raw,
    /// Generated output (`out/`).
    Out,
}

impl Zone {
    /// First path segment of the zone.
    pub fn root(self) -> &'static str {
        match self {
            Zone::Raw => "raw",
            Zone::Out => "out",
        }
    }

    /// Zone a path is confined to, if any.
    pub fn of(path: &str) -> Option<Zone> {
        [Zone::Raw, Zone::Out]
            .into_iter()
            .find(|zone| validate(path, *zone))
    }

    /// Join `name` under this zone with POSIX semantics.
    ///
    /// An absolute `name` replaces the root entirely (and then fails
    /// [`validate`]).
    pub fn join(self, name: &str) -> String {
        if name.starts_with('/') {
            return name.to_string();
        }
        format!("{}/{}", self.root(), name)
    }

    /// Normalize `name` and place it in this zone.
    ///
    /// `./deck.pptx`, `deck.pptx` and `.//deck.pptx` all confine to the same
    /// path and name. Names with no segments are [`Error::InvalidInput`];
    /// names that escape the zone are [`Error::InvalidPath`].
    pub fn confine(self, name: &str) -> Result<Confined, Error> {
        let Some(normalized) = normalize_name(name) else {
            return Err(Error::InvalidInput(format!(
                "file name '{name}' has no path segments"
            )));
        };
        let path = if name.starts_with('/') {
            self.join(name)
        } else {
            self.join(&normalized)
        };
        if !validate(&path, self) {
            return Err(Error::InvalidPath { path, zone: self });
        }
        Ok(Confined {
            path,
            name: normalized,
        })
    }
}

/// A file name accepted into a zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confined {
    /// Sandboxed path, `<zone>/<name>`.
    pub path: String,
    /// Normalized name relative to the zone root; used as the version group.
    pub name: String,
}

/// Collapse empty and `.` segments. `None` when nothing remains.
pub fn normalize_name(name: &str) -> Option<String> {
    let parts: Vec<&str> = segments(name.trim()).collect();
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.root())
    }
}

/// True iff `path` is relative, rooted at `zone`, and never climbs to a parent.
pub fn validate(path: &str, zone: Zone) -> bool {
    if path.starts_with('/') {
        return false;
    }
    let mut parts = segments(path);
    if parts.next() != Some(zone.root()) {
        return false;
    }
    parts.all(|part| part != PARENT_DIR)
}

/// Output paths must sit under `out/`.
pub fn validate_output_path(path: &str) -> bool {
    validate(path, Zone::Out)
}

/// Raw reads must sit under `raw/`.
pub fn validate_raw_read_path(path: &str) -> bool {
    validate(path, Zone::Raw)
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/')
        .filter(|part| !part.is_empty() && *part != ".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_paths_must_live_under_out() {
        assert!(validate_output_path("out/a/b.pptx"));
        assert!(validate_output_path("out/generated/report.pdf"));
        assert!(!validate_output_path("raw/a.pptx"));
        assert!(!validate_output_path("outside/a.pptx"));
    }

    #[test]
    fn raw_paths_must_live_under_raw() {
        assert!(validate_raw_read_path("raw/in.pdf"));
        assert!(validate_raw_read_path("raw/input/source.pdf"));
        assert!(!validate_raw_read_path("out/in.pdf"));
    }

    /// Any `..` segment is rejected, wherever it appears.
    #[test]
    fn parent_segments_are_rejected() {
        assert!(!validate_output_path("out/../x"));
        assert!(!validate_output_path("../out/escape.pdf"));
        assert!(!validate_output_path("out/a/../../etc/passwd"));
        assert!(!validate_raw_read_path("raw/.."));
    }

    #[test]
    fn absolute_and_rootless_paths_are_rejected() {
        assert!(!validate_output_path("/out/a.pptx"));
        assert!(!validate_output_path(""));
        assert!(!validate_output_path("."));
        assert!(!validate_raw_read_path("/"));
    }

    /// Empty and `.` segments collapse the way POSIX paths do.
    #[test]
    fn redundant_segments_are_ignored() {
        assert!(validate_output_path("./out/a.pptx"));
        assert!(validate_output_path("out//a/./b.pptx"));
        assert!(!validate_output_path("./raw/a.pptx"));
    }

    #[test]
    fn names_normalize_before_confinement() {
        assert_eq!(normalize_name("./deck.pptx").as_deref(), Some("deck.pptx"));
        assert_eq!(normalize_name("a//./b.pdf").as_deref(), Some("a/b.pdf"));
        assert_eq!(normalize_name("./"), None);
        assert_eq!(normalize_name("  "), None);

        let confined = Zone::Out.confine(".//deck.pptx").expect("confine");
        assert_eq!(confined.path, "out/deck.pptx");
        assert_eq!(confined.name, "deck.pptx");
        assert_eq!(Zone::Out.confine("deck.pptx").expect("plain"), confined);
    }

    #[test]
    fn confine_rejects_empty_and_escaping_names() {
        for empty in [".", "./", "", "//"] {
            assert!(
                matches!(Zone::Out.confine(empty), Err(Error::InvalidInput(_))),
                "{empty:?}"
            );
        }
        for escaping in ["../x.pptx", "a/../../b", "/etc/passwd"] {
            assert!(
                matches!(
                    Zone::Raw.confine(escaping),
                    Err(Error::InvalidPath { zone: Zone::Raw, .. })
                ),
                "{escaping}"
            );
        }
    }

    #[test]
    fn zone_join_and_lookup() {
        assert_eq!(Zone::Out.join("proposal.pptx"), "out/proposal.pptx");
        assert_eq!(Zone::Raw.join("deck/v1.pdf"), "raw/deck/v1.pdf");
        assert_eq!(Zone::Out.join("/etc/passwd"), "/etc/passwd");
        assert_eq!(Zone::of("raw/a.pdf"), Some(Zone::Raw));
        assert_eq!(Zone::of("out/a.pdf"), Some(Zone::Out));
        assert_eq!(Zone::of("tmp/a.pdf"), None);
    }
}
