//! Input reference list loading

use crate::error::{FlowError, Result};
use crate::job::ContentReference;
use std::path::Path;
use tracing::debug;

/// Read one content reference per line, optionally keeping only the first
/// `max_jobs` entries.
pub async fn load_references(
    path: &Path,
    max_jobs: Option<usize>,
) -> Result<Vec<ContentReference>> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        FlowError::Input(format!("cannot read {}: {}", path.display(), e))
    })?;

    let mut references = parse_references(&content)?;
    debug!(
        "Read {} content references from {}",
        references.len(),
        path.display()
    );

    if let Some(max) = max_jobs {
        references.truncate(max);
    }

    if references.is_empty() {
        return Err(FlowError::Input(format!(
            "no content references to process in {}",
            path.display()
        )));
    }

    Ok(references)
}

/// Parse newline-delimited references. Surrounding whitespace is trimmed and
/// blank lines are skipped.
pub fn parse_references(content: &str) -> Result<Vec<ContentReference>> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(ContentReference::new)
        .collect()
}
