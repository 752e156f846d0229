//! One regeneration round.
//!
//! Aggregates the schema once and derives all three artifacts from that
//! single snapshot, so a round never mixes two filesystem states.

use crate::aggregator::{wrap_schema_module, MergedSchemaDocument, SchemaAggregator};
use crate::artifact::ArtifactSet;
use crate::config::Config;
use crate::error::WeaveResult;
use crate::generator::TypeDefGenerator;
use crate::parser::SchemaParser;
use crate::pattern::ResolvedPatterns;

/// Aggregation plus code generation for a fixed configuration.
#[derive(Debug, Clone)]
pub struct Pipeline {
    aggregator: SchemaAggregator,
    parser: SchemaParser,
    generator: TypeDefGenerator,
}

impl Pipeline {
    /// Build the pipeline. Fails only on startup errors (bad pattern set).
    pub fn new(config: &Config) -> WeaveResult<Self> {
        let patterns = config.pattern_set()?;
        Ok(Self {
            aggregator: SchemaAggregator::new(&patterns, &config.root)?,
            parser: SchemaParser::new(),
            generator: TypeDefGenerator::new(config.codegen.clone()),
        })
    }

    /// Anchored patterns, used to decide whether a change is relevant.
    pub fn patterns(&self) -> &ResolvedPatterns {
        self.aggregator.patterns()
    }

    /// Re-read every fragment and derive fresh artifacts.
    #[tracing::instrument(skip(self))]
    pub async fn regenerate(&self) -> WeaveResult<ArtifactSet> {
        let document = self.aggregator.aggregate().await?;
        tracing::debug!(fragments = document.sources().len(), "schema aggregated");
        self.derive(&document)
    }

    /// Derive artifacts from an already merged document.
    pub fn derive(&self, document: &MergedSchemaDocument) -> WeaveResult<ArtifactSet> {
        let schema = self.parser.parse(document)?;
        let schema_types = self.generator.schema_types(&schema)?;
        let resolver_types = self.generator.resolver_types(&schema)?;

        Ok(ArtifactSet::new(
            wrap_schema_module(document),
            schema_types,
            resolver_types,
        ))
    }
}
