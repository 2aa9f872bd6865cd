//! Caller-supplied collection names checked against the live collection list

use crate::error::{RebalanceError, Result};
use std::collections::HashSet;

/// Resolve the collections an operation should touch
///
/// `None` selects every existing collection in the server's order. A
/// filter must name only existing collections; all unknown names are
/// reported together so nothing is planned against a partly valid list.
pub fn validate_collections(requested: Option<&[String]>, existing: &[String]) -> Result<Vec<String>> {
    let Some(requested) = requested else {
        return Ok(existing.to_vec());
    };

    let known: HashSet<&str> = existing.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();
    let mut selected = Vec::with_capacity(requested.len());
    let mut unknown = Vec::new();

    for name in requested {
        if !seen.insert(name.as_str()) {
            continue;
        }
        if known.contains(name.as_str()) {
            selected.push(name.clone());
        } else {
            unknown.push(name.clone());
        }
    }

    if !unknown.is_empty() {
        return Err(RebalanceError::UnknownCollections(unknown));
    }
    Ok(selected)
}
