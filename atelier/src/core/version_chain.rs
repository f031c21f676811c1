//! Artifact version chains.
//!
//! Artifacts sharing a `(workspace, version_group)` pair form a history ordered
//! by `version_number`. Everything here works on a sibling set handed in by the
//! caller; nothing touches the store.

use serde::Serialize;

use crate::core::types::Artifact;
use crate::error::Error;

/// An artifact with its immediate neighbours in its version group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainView {
    pub artifact: Artifact,
    pub previous: Option<Artifact>,
    pub next: Option<Artifact>,
}

/// Resolve the previous/next neighbours of `artifact` among `siblings`.
///
/// `siblings` may or may not include `artifact` itself. Records from other
/// workspaces or groups are ignored. A version number shared by two distinct
/// artifacts is reported as [`Error::DataIntegrity`].
pub fn resolve(artifact: &Artifact, siblings: &[Artifact]) -> Result<ChainView, Error> {
    let ordered = ordered_group(artifact, siblings)?;
    let target = artifact.version_number;
    let previous = ordered
        .iter()
        .rev()
        .find(|sibling| sibling.version_number < target)
        .copied()
        .cloned();
    let next = ordered
        .iter()
        .find(|sibling| sibling.version_number > target)
        .copied()
        .cloned();
    Ok(ChainView {
        artifact: artifact.clone(),
        previous,
        next,
    })
}

/// Full history of the artifact's group, oldest first.
pub fn history(artifact: &Artifact, siblings: &[Artifact]) -> Result<Vec<Artifact>, Error> {
    let ordered = ordered_group(artifact, siblings)?;
    let mut out: Vec<Artifact> = ordered.into_iter().cloned().collect();
    let at = out.partition_point(|a| a.version_number < artifact.version_number);
    out.insert(at, artifact.clone());
    Ok(out)
}

/// Version number the next member of a group receives: highest + 1, or 1.
pub fn next_version_number<'a>(
    group: impl IntoIterator<Item = &'a Artifact>,
) -> Result<u32, Error> {
    let mut members: Vec<&Artifact> = group.into_iter().collect();
    members.sort_by_key(|a| a.version_number);
    if let Some(pair) = members
        .windows(2)
        .find(|pair| pair[0].version_number == pair[1].version_number)
    {
        return Err(duplicate_version(
            &pair[0].version_group,
            pair[0].version_number,
        ));
    }
    match members.last() {
        None => Ok(1),
        Some(highest) => highest.version_number.checked_add(1).ok_or_else(|| {
            Error::DataIntegrity(format!(
                "version counter of '{}' exhausted",
                highest.version_group
            ))
        }),
    }
}

/// Same-group siblings excluding `artifact`, sorted by version number.
fn ordered_group<'a>(
    artifact: &Artifact,
    siblings: &'a [Artifact],
) -> Result<Vec<&'a Artifact>, Error> {
    let mut ordered: Vec<&Artifact> = siblings
        .iter()
        .filter(|s| {
            s.id != artifact.id
                && s.workspace_id == artifact.workspace_id
                && s.version_group == artifact.version_group
        })
        .collect();
    ordered.sort_by_key(|s| s.version_number);

    if ordered
        .iter()
        .any(|s| s.version_number == artifact.version_number)
    {
        return Err(duplicate_version(
            &artifact.version_group,
            artifact.version_number,
        ));
    }
    if let Some(pair) = ordered
        .windows(2)
        .find(|pair| pair[0].version_number == pair[1].version_number)
    {
        return Err(duplicate_version(
            &artifact.version_group,
            pair[0].version_number,
        ));
    }
    Ok(ordered)
}

fn duplicate_version(group: &str, version: u32) -> Error {
    Error::DataIntegrity(format!(
        "version group '{group}' has more than one artifact at version {version}"
    ))
}
