//! Style formatter configuration: on-disk config merged with caller overrides.
//!
//! The merge is a flat, single-level overwrite. Override keys always win,
//! keys present on one side only pass through, nothing is merged recursively.

pub(crate) mod loader;

pub use loader::{SEARCH_FILE_NAMES, find_config_file, load_config};

use crate::engine::Options;
use crate::error::resolve::ResolveError;

use std::path::Path;

use log::debug;

/// Resolve the effective style config.
///
/// Without a path the overrides come back unchanged (`{}` when absent too).
/// With a path, a failed lookup is an error rather than a silent fallback to
/// the overrides alone.
pub async fn resolve(
    path: Option<&Path>,
    overrides: Option<Options>,
) -> Result<Options, ResolveError> {
    let Some(path) = path else {
        debug!("No style config path given, using overrides only");
        return Ok(overrides.unwrap_or_default());
    };

    let resolved = load_config(path).await?;
    if resolved.is_none() {
        debug!("No style config found from {}", path.display());
    }

    Ok(merge(resolved, overrides))
}

pub fn merge(resolved: Option<Options>, overrides: Option<Options>) -> Options {
    let mut merged = resolved.unwrap_or_default();
    if let Some(overrides) = overrides {
        merged.extend(overrides);
    }
    merged
}
