//! # gql-weave
//!
//! Merge GraphQL schema fragments scattered across a project into one
//! schema, and keep TypeScript type definitions for that schema and its
//! resolvers in sync while files change.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and TOML parsing
//! - [`pattern`] - Glob resolution and change matching
//! - [`aggregator`] - Fragment discovery and textual merge
//! - [`parser`] - Schema parsing into an owned type model
//! - [`generator`] - Schema and resolver type generation
//! - [`artifact`] - Artifact identifiers and the published artifact store
//! - [`pipeline`] - One full regeneration round
//! - [`dispatcher`] - Change coalescing state machine
//! - [`host`] - Host lifecycle hooks and the file-backed host
//! - [`watcher`] - File system watching for development mode
//! - [`writer`] - File output and dry-run support
//! - [`error`] - Error types and handling

pub mod aggregator;
pub mod artifact;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod generator;
pub mod host;
pub mod parser;
pub mod pattern;
pub mod pipeline;
pub mod watcher;
pub mod writer;

// Re-export main types for convenience
pub use aggregator::{MergedSchemaDocument, SchemaAggregator};
pub use artifact::{ArtifactId, ArtifactSet, ArtifactStore, GeneratedArtifact};
pub use config::{Config, ConfigManager};
pub use dispatcher::{ChangeDispatcher, ChangeEvent};
pub use error::{WeaveError, WeaveResult};
pub use generator::TypeDefGenerator;
pub use host::{FsHost, Host};
pub use parser::{SchemaIR, SchemaParser};
pub use pattern::{PatternSet, ResolvedFileSet, ResolvedPatterns};
pub use pipeline::Pipeline;
pub use watcher::{FileWatcher, WatchSession};
pub use writer::ArtifactWriter;
