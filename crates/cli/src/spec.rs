use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use argtree::CommandSchema;

/// Read a JSON command-line spec. A spec without a `name` is named after
/// its file.
pub fn load(path: &Path) -> Result<CommandSchema> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read spec: {}", path.display()))?;
    let mut schema: CommandSchema = serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse spec JSON: {}", path.display()))?;

    if schema.name.is_empty()
        && let Some(stem) = path.file_stem()
    {
        schema.name = stem.to_string_lossy().into_owned();
    }

    tracing::debug!(path = %path.display(), name = %schema.name, "loaded spec");
    Ok(schema)
}
