//! Schema fragment aggregation.
//!
//! Reads every resolved fragment and concatenates them, in path order, into
//! one [`MergedSchemaDocument`]. The merge is textual only: conflicting
//! declarations are left for the parser and generator to reject.

use crate::error::{ReadError, WeaveResult};
use crate::pattern::{PatternSet, ResolvedFileSet, ResolvedPatterns};
use std::path::{Path, PathBuf};

/// Export name of the merged text in the schema module.
pub const SCHEMA_EXPORT: &str = "schema";

/// The concatenated text of every fragment, plus where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedSchemaDocument {
    text: String,
    sources: Vec<PathBuf>,
}

impl MergedSchemaDocument {
    /// Merged schema text.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Fragments that contributed, in merge order.
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    /// True when no fragment matched.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

/// Aggregator bound to one set of anchored patterns.
#[derive(Debug, Clone)]
pub struct SchemaAggregator {
    patterns: ResolvedPatterns,
}

impl SchemaAggregator {
    /// Create an aggregator for `patterns` anchored at `root`.
    pub fn new(patterns: &PatternSet, root: &Path) -> WeaveResult<Self> {
        Ok(Self {
            patterns: patterns.absolutize(root)?,
        })
    }

    /// Patterns this aggregator resolves.
    pub fn patterns(&self) -> &ResolvedPatterns {
        &self.patterns
    }

    /// Resolve the patterns and merge every matched fragment.
    #[tracing::instrument(skip(self))]
    pub async fn aggregate(&self) -> WeaveResult<MergedSchemaDocument> {
        let files = self.patterns.expand();
        if files.is_empty() {
            tracing::warn!("schema patterns matched no files");
        }
        Ok(merge_files(&files).await?)
    }
}

/// Resolve `patterns` against `root` and merge the matched fragments.
pub async fn aggregate(patterns: &PatternSet, root: &Path) -> WeaveResult<MergedSchemaDocument> {
    SchemaAggregator::new(patterns, root)?.aggregate().await
}

/// Read and concatenate `files`, newline separated.
///
/// Any unreadable file fails the whole merge.
pub async fn merge_files(files: &ResolvedFileSet) -> Result<MergedSchemaDocument, ReadError> {
    let mut fragments = Vec::with_capacity(files.len());

    for path in files.iter() {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ReadError::new(path, e))?;
        tracing::trace!(path = %path.display(), bytes = content.len(), "read schema fragment");
        fragments.push(content);
    }

    Ok(MergedSchemaDocument {
        text: fragments.join("\n"),
        sources: files.paths().to_vec(),
    })
}

/// Render the merged document as an ES module exporting the text.
pub fn wrap_schema_module(document: &MergedSchemaDocument) -> String {
    // serde_json string escaping is a valid JS string literal.
    let literal = serde_json::Value::String(document.as_str().to_string()).to_string();

    let mut output = String::new();
    output.push_str("// Auto-generated by gql-weave\n");
    output.push_str("// Do not edit manually\n\n");
    output.push_str(&format!("export const {} = {};\n", SCHEMA_EXPORT, literal));
    output.push_str(&format!("export default {};\n", SCHEMA_EXPORT));
    output
}
