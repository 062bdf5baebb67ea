//! Region extraction.
//!
//! A region is the text between a line containing `Infer: <tag>` and a line
//! containing `EndInfer: <tag>`. Markers are matched by substring, so they
//! can live in any comment syntax. The marker lines themselves are not part
//! of the region.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::config::{Configuration, FileSpec, InferenceSpec};
use crate::error::{InferError, Result};

/// Prefix of the line that opens a region.
pub const START_MARKER: &str = "Infer: ";

/// Prefix of the line that closes a region.
pub const END_MARKER: &str = "EndInfer: ";

/// How a region scan ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionStatus {
    /// Start and end markers were both found.
    Closed,
    /// The start marker was found but the end marker never was; the region
    /// runs to end of file.
    Unterminated,
    /// No start marker was found; the region is empty.
    Missing,
}

/// Text captured for one tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub code: String,
    pub status: RegionStatus,
}

/// Scan `source` for the first region named `tag`.
///
/// Lines inside the region are copied verbatim, line endings included.
pub fn extract_region(source: &str, tag: &str) -> Region {
    let start = format!("{START_MARKER}{tag}");
    let end = format!("{END_MARKER}{tag}");

    let mut code = String::new();
    let mut inside = false;

    for line in source.split_inclusive('\n') {
        // The end marker contains the start marker, so it must be tested first.
        if line.contains(&end) {
            if inside {
                return Region {
                    code,
                    status: RegionStatus::Closed,
                };
            }
            continue;
        }
        if line.contains(&start) {
            inside = true;
            continue;
        }
        if inside {
            code.push_str(line);
        }
    }

    Region {
        code,
        status: if inside {
            RegionStatus::Unterminated
        } else {
            RegionStatus::Missing
        },
    }
}

/// Configuration with region text attached to each tag.
///
/// Built once from a [`Configuration`] and shared read-only with the
/// concurrent phase.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfiguration {
    pub files: Vec<ResolvedFile>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFile {
    /// Path as declared in the Inferfile.
    pub path: String,
    pub tags: Vec<ResolvedTag>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTag {
    pub name: String,
    /// Extracted region. Empty when the start marker is missing.
    pub code: Arc<str>,
    pub status: RegionStatus,
    pub inferences: Vec<InferenceSpec>,
}

impl ResolvedConfiguration {
    pub fn inference_count(&self) -> usize {
        self.files
            .iter()
            .flat_map(|f| &f.tags)
            .map(|t| t.inferences.len())
            .sum()
    }
}

/// Read `file` once and extract every declared tag, in declaration order.
#[instrument(skip_all, fields(path = %file.path))]
pub fn extract_file(file: &FileSpec) -> Result<ResolvedFile> {
    let source = std::fs::read_to_string(&file.resolved_path).map_err(|source| InferError::Io {
        path: file.resolved_path.clone(),
        source,
    })?;

    let tags = file
        .tags
        .iter()
        .map(|tag| {
            let region = extract_region(&source, &tag.name);
            match region.status {
                RegionStatus::Closed => {
                    debug!(tag = %tag.name, bytes = region.code.len(), "region extracted")
                }
                RegionStatus::Unterminated => warn!(
                    tag = %tag.name,
                    "no `{END_MARKER}{}` marker in {}; region runs to end of file",
                    tag.name,
                    file.path
                ),
                RegionStatus::Missing => warn!(
                    tag = %tag.name,
                    "no `{START_MARKER}{}` marker in {}; region is empty",
                    tag.name,
                    file.path
                ),
            }
            ResolvedTag {
                name: tag.name.clone(),
                code: Arc::from(region.code),
                status: region.status,
                inferences: tag.inferences.clone(),
            }
        })
        .collect();

    Ok(ResolvedFile {
        path: file.path.clone(),
        tags,
    })
}

/// Extract regions for every file in `config`.
///
/// An unreadable file aborts the whole resolution.
pub fn resolve(config: &Configuration) -> Result<ResolvedConfiguration> {
    let files = config
        .files
        .iter()
        .map(extract_file)
        .collect::<Result<Vec<_>>>()?;
    Ok(ResolvedConfiguration { files })
}
