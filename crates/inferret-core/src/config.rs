//! Inferfile model and loader.
//!
//! An Inferfile is a TOML document listing files, the tagged regions inside
//! each file, and the inferences to run against each region:
//!
//! ```toml
//! [[file]]
//! path = "src/auth.rs"
//!
//!   [[file.tag]]
//!   name = "auth"
//!
//!     [[file.tag.infer]]
//!     assert = "the function validates input"
//!     model = "gpt-4o"
//!     count = 3
//!     threshold = 0.67
//! ```
//!
//! Loading validates structure and checks that every referenced file exists.
//! File contents are not read here; see [`crate::extract`].

use std::collections::HashSet;
use std::ops::Range;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use toml::Spanned;
use tracing::{debug, instrument};

use crate::error::{InferError, Result};

/// Samples taken per inference when `count` is absent.
pub const DEFAULT_COUNT: u32 = 1;

/// Required success rate when `threshold` is absent: every sample must agree.
pub const DEFAULT_THRESHOLD: f64 = 1.0;

/// `max_tokens` when absent. Zero leaves the limit to the oracle.
pub const DEFAULT_MAX_TOKENS: u32 = 0;

/// Sampling temperature when absent.
pub const DEFAULT_TEMPERATURE: f64 = 0.0;

/// A loaded Inferfile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Configuration {
    /// Path of the Inferfile this configuration was loaded from.
    pub document: PathBuf,
    /// Files in declaration order. May be empty.
    pub files: Vec<FileSpec>,
}

/// One `[[file]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileSpec {
    /// Path exactly as written in the Inferfile.
    pub path: String,
    /// `path` resolved against the Inferfile's directory.
    pub resolved_path: PathBuf,
    /// Inferfile line that declared this file.
    pub line: usize,
    pub tags: Vec<TagSpec>,
}

/// One `[[file.tag]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagSpec {
    /// Region name, unique within its file.
    pub name: String,
    pub line: usize,
    pub inferences: Vec<InferenceSpec>,
}

/// One `[[file.tag.infer]]` entry: a natural-language claim and how to sample it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferenceSpec {
    /// Name of the owning tag, carried for prompts and reporting.
    pub tag: String,
    pub assertion: String,
    pub model: String,
    /// Number of oracle samples, at least 1.
    pub count: u32,
    /// Minimum success rate to pass, in `[0.0, 1.0]`. Inclusive.
    pub threshold: f64,
    pub max_tokens: u32,
    pub temperature: f64,
    /// Inferfile line of the `assert` key.
    pub line: usize,
}

impl Configuration {
    /// Parse an Inferfile document without touching the filesystem.
    ///
    /// `document` is used for diagnostics and as the base directory for
    /// relative file paths.
    pub fn parse(source: &str, document: &Path) -> Result<Self> {
        let raw: RawDocument = toml::from_str(source).map_err(|e| InferError::Parse {
            document: document.to_path_buf(),
            line: e.span().map(|s| line_at(source, s.start)).unwrap_or(1),
            message: e.message().trim().to_string(),
        })?;

        let cx = Decoder { source, document };
        let files = raw
            .file
            .into_iter()
            .map(|file| cx.file(file))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            document: document.to_path_buf(),
            files,
        })
    }

    /// Total number of inferences across all files and tags.
    pub fn inference_count(&self) -> usize {
        self.files
            .iter()
            .flat_map(|f| &f.tags)
            .map(|t| t.inferences.len())
            .sum()
    }

    /// Fail with [`InferError::Reference`] on the first file that does not exist.
    pub fn verify_files(&self) -> Result<()> {
        for file in &self.files {
            if !file.resolved_path.is_file() {
                return Err(InferError::Reference {
                    path: file.path.clone(),
                    document: self.document.clone(),
                    line: file.line,
                });
            }
        }
        Ok(())
    }
}

/// Read, parse and validate the Inferfile at `document`.
///
/// Fails with [`InferError::Parse`] for malformed documents and
/// [`InferError::Reference`] for files that do not exist. Only existence is
/// checked; file contents are not read.
#[instrument(skip_all, fields(document = %document.display()))]
pub fn load(document: &Path) -> Result<Configuration> {
    let source = std::fs::read_to_string(document).map_err(|source| InferError::Io {
        path: document.to_path_buf(),
        source,
    })?;

    let config = Configuration::parse(&source, document)?;
    config.verify_files()?;

    debug!(
        files = config.files.len(),
        inferences = config.inference_count(),
        "Inferfile loaded"
    );
    Ok(config)
}

// ---------------------------------------------------------------------------
// Raw document
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDocument {
    #[serde(default)]
    file: Vec<RawFile>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFile {
    path: Spanned<String>,
    #[serde(default)]
    tag: Vec<RawTag>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTag {
    name: Spanned<String>,
    #[serde(default)]
    infer: Vec<RawInfer>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawInfer {
    assert: Spanned<String>,
    model: Spanned<String>,
    count: Option<Spanned<i64>>,
    threshold: Option<Spanned<f64>>,
    max_tokens: Option<Spanned<i64>>,
    temperature: Option<Spanned<f64>>,
}

struct Decoder<'a> {
    source: &'a str,
    document: &'a Path,
}

impl Decoder<'_> {
    fn error(&self, span: Range<usize>, message: impl Into<String>) -> InferError {
        InferError::Parse {
            document: self.document.to_path_buf(),
            line: line_at(self.source, span.start),
            message: message.into(),
        }
    }

    fn file(&self, raw: RawFile) -> Result<FileSpec> {
        let line = line_at(self.source, raw.path.span().start);
        let path = raw.path.into_inner();
        if path.trim().is_empty() {
            return Err(InferError::Parse {
                document: self.document.to_path_buf(),
                line,
                message: "file path must not be empty".to_string(),
            });
        }

        let mut seen = HashSet::new();
        let mut tags = Vec::with_capacity(raw.tag.len());
        for tag in raw.tag {
            if !seen.insert(tag.name.get_ref().clone()) {
                return Err(self.error(
                    tag.name.span(),
                    format!("duplicate tag {:?} in file {path}", tag.name.get_ref()),
                ));
            }
            tags.push(self.tag(tag)?);
        }

        Ok(FileSpec {
            resolved_path: resolve_path(self.document, &path),
            path,
            line,
            tags,
        })
    }

    fn tag(&self, raw: RawTag) -> Result<TagSpec> {
        let span = raw.name.span();
        let name = raw.name.into_inner();
        if name.trim().is_empty() {
            return Err(self.error(span, "tag name must not be empty"));
        }

        let inferences = raw
            .infer
            .into_iter()
            .map(|infer| self.infer(&name, infer))
            .collect::<Result<Vec<_>>>()?;

        Ok(TagSpec {
            name,
            line: line_at(self.source, span.start),
            inferences,
        })
    }

    fn infer(&self, tag: &str, raw: RawInfer) -> Result<InferenceSpec> {
        let line = line_at(self.source, raw.assert.span().start);

        if raw.assert.get_ref().trim().is_empty() {
            return Err(self.error(raw.assert.span(), "assert must not be empty"));
        }
        if raw.model.get_ref().trim().is_empty() {
            return Err(self.error(raw.model.span(), "model must not be empty"));
        }

        let count = match raw.count {
            None => DEFAULT_COUNT,
            Some(c) => match u32::try_from(*c.get_ref()) {
                Ok(n) if n >= 1 => n,
                _ => {
                    return Err(self.error(
                        c.span(),
                        format!("count must be between 1 and {}, got {}", u32::MAX, c.get_ref()),
                    ))
                }
            },
        };

        let threshold = match raw.threshold {
            None => DEFAULT_THRESHOLD,
            Some(t) => {
                let value = *t.get_ref();
                if !(0.0..=1.0).contains(&value) {
                    return Err(self.error(
                        t.span(),
                        format!("threshold must be within [0.0, 1.0], got {value}"),
                    ));
                }
                value
            }
        };

        let max_tokens = match raw.max_tokens {
            None => DEFAULT_MAX_TOKENS,
            Some(m) => u32::try_from(*m.get_ref()).map_err(|_| {
                self.error(
                    m.span(),
                    format!("max_tokens must be a non-negative integer, got {}", m.get_ref()),
                )
            })?,
        };

        let temperature = match raw.temperature {
            None => DEFAULT_TEMPERATURE,
            Some(t) => {
                let value = *t.get_ref();
                if !value.is_finite() || value < 0.0 {
                    return Err(self.error(
                        t.span(),
                        format!("temperature must be a non-negative number, got {value}"),
                    ));
                }
                value
            }
        };

        Ok(InferenceSpec {
            tag: tag.to_string(),
            assertion: raw.assert.into_inner(),
            model: raw.model.into_inner(),
            count,
            threshold,
            max_tokens,
            temperature,
            line,
        })
    }
}

/// 1-based line number of a byte offset.
fn line_at(source: &str, offset: usize) -> usize {
    let end = offset.min(source.len());
    source.as_bytes()[..end].iter().filter(|b| **b == b'\n').count() + 1
}

fn resolve_path(document: &Path, declared: &str) -> PathBuf {
    let declared = Path::new(declared);
    if declared.is_absolute() {
        return declared.to_path_buf();
    }
    match document.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join(declared),
        _ => declared.to_path_buf(),
    }
}
