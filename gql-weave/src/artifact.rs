//! Generated artifacts and the identifiers hosts register them under.

use std::fmt;

/// Identifier an artifact is registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArtifactId {
    /// Merged schema text as a loadable module.
    SchemaModule,
    /// Type declarations for every schema type.
    SchemaTypes,
    /// Resolver signature declarations.
    ResolverTypes,
}

impl ArtifactId {
    /// Every identifier, in publication order.
    pub const ALL: [ArtifactId; 3] = [
        ArtifactId::SchemaModule,
        ArtifactId::SchemaTypes,
        ArtifactId::ResolverTypes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactId::SchemaModule => "#schema-module",
            ArtifactId::SchemaTypes => "#schema-types",
            ArtifactId::ResolverTypes => "#resolver-types",
        }
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable generated output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedArtifact {
    pub id: ArtifactId,
    pub content: String,
}

impl GeneratedArtifact {
    pub fn new(id: ArtifactId, content: impl Into<String>) -> Self {
        Self {
            id,
            content: content.into(),
        }
    }
}

/// Template refresh filter: selects the two type-definition templates.
///
/// The schema module is served as a virtual module and reloads with the
/// host, so it never needs a template rewrite.
pub fn template_filter(artifact: &GeneratedArtifact) -> bool {
    matches!(
        artifact.id,
        ArtifactId::SchemaTypes | ArtifactId::ResolverTypes
    )
}

/// The three artifacts produced by one regeneration round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSet {
    schema_module: GeneratedArtifact,
    schema_types: GeneratedArtifact,
    resolver_types: GeneratedArtifact,
}

impl ArtifactSet {
    pub fn new(schema_module: String, schema_types: String, resolver_types: String) -> Self {
        Self {
            schema_module: GeneratedArtifact::new(ArtifactId::SchemaModule, schema_module),
            schema_types: GeneratedArtifact::new(ArtifactId::SchemaTypes, schema_types),
            resolver_types: GeneratedArtifact::new(ArtifactId::ResolverTypes, resolver_types),
        }
    }

    pub fn get(&self, id: ArtifactId) -> &GeneratedArtifact {
        match id {
            ArtifactId::SchemaModule => &self.schema_module,
            ArtifactId::SchemaTypes => &self.schema_types,
            ArtifactId::ResolverTypes => &self.resolver_types,
        }
    }

    /// Artifacts in publication order.
    pub fn iter(&self) -> impl Iterator<Item = &GeneratedArtifact> {
        ArtifactId::ALL.into_iter().map(move |id| self.get(id))
    }

    /// Identifiers whose content differs from `previous`.
    pub fn diff(&self, previous: &ArtifactSet) -> Vec<ArtifactId> {
        ArtifactId::ALL
            .into_iter()
            .filter(|id| self.get(*id).content != previous.get(*id).content)
            .collect()
    }
}

/// Holds the last successfully published artifact set.
///
/// Only successful rounds replace it, so a failed round leaves whatever
/// was published before untouched.
#[derive(Debug, Default)]
pub struct ArtifactStore {
    current: Option<ArtifactSet>,
    generation: u64,
}

impl ArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the published set, returning the identifiers that changed.
    pub fn publish(&mut self, artifacts: ArtifactSet) -> Vec<ArtifactId> {
        let changed = match &self.current {
            Some(previous) => artifacts.diff(previous),
            None => ArtifactId::ALL.to_vec(),
        };
        self.current = Some(artifacts);
        self.generation += 1;
        changed
    }

    pub fn current(&self) -> Option<&ArtifactSet> {
        self.current.as_ref()
    }

    /// Number of successful publications so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}
