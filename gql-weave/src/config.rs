//! Configuration management.
//!
//! This module handles loading configuration from `gql-weave.toml` files
//! and merging with command-line arguments.

use crate::error::{ConfigError, PatternError, WeaveResult};
use crate::pattern::PatternSet;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default configuration filename.
pub const CONFIG_FILENAME: &str = "gql-weave.toml";

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Schema fragment patterns, a single glob or a list of globs.
    pub schema: SchemaPatterns,

    /// Root that relative patterns are resolved against.
    pub root: PathBuf,

    /// Address of the schema inspection view. Not used by the pipeline.
    pub url: Option<String>,

    /// Codegen options.
    pub codegen: CodegenConfig,

    /// Output configuration.
    pub output: OutputConfig,

    /// Watch mode configuration.
    pub watch: WatchConfig,
}

/// Raw `schema` value: one glob string or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SchemaPatterns {
    One(String),
    Many(Vec<String>),
}

/// Options recognized by the type generator.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CodegenConfig {
    /// Let resolver argument types accept arbitrary extra keys.
    #[serde(alias = "use_index_signature")]
    pub use_index_signature: bool,

    /// Target type expressions for custom scalars.
    pub scalars: BTreeMap<String, String>,

    /// Target type expression for the resolver context parameter.
    #[serde(alias = "context_type")]
    pub context_type: String,

    /// Unrecognized keys, kept verbatim.
    #[serde(flatten)]
    pub passthrough: BTreeMap<String, toml::Value>,
}

/// Output configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory the artifact files are written to.
    pub dir: PathBuf,

    /// File name for `#schema-module`.
    pub schema_module: String,

    /// File name for `#schema-types`.
    pub schema_types: String,

    /// File name for `#resolver-types`.
    pub resolver_types: String,
}

/// Watch mode configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Debounce window for filesystem events, in milliseconds.
    pub debounce_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema: SchemaPatterns::Many(vec!["server/**/*.graphql".to_string()]),
            root: PathBuf::from("."),
            url: None,
            codegen: CodegenConfig::default(),
            output: OutputConfig::default(),
            watch: WatchConfig::default(),
        }
    }
}

impl Default for CodegenConfig {
    fn default() -> Self {
        Self {
            use_index_signature: true,
            scalars: BTreeMap::new(),
            context_type: "any".to_string(),
            passthrough: BTreeMap::new(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".gql-weave"),
            schema_module: "schema.mjs".to_string(),
            schema_types: "schema-types.d.ts".to_string(),
            resolver_types: "resolver-types.d.ts".to_string(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: 100 }
    }
}

impl SchemaPatterns {
    /// Normalize to an ordered list.
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            SchemaPatterns::One(pattern) => vec![pattern.clone()],
            SchemaPatterns::Many(patterns) => patterns.clone(),
        }
    }
}

impl Config {
    /// Build the validated pattern set. Fails on an empty set or bad glob syntax.
    pub fn pattern_set(&self) -> Result<PatternSet, PatternError> {
        PatternSet::new(self.schema.to_vec())
    }

    /// Output path for the artifact registered under `id`.
    pub fn artifact_path(&self, id: crate::artifact::ArtifactId) -> PathBuf {
        use crate::artifact::ArtifactId;

        let file = match id {
            ArtifactId::SchemaModule => &self.output.schema_module,
            ArtifactId::SchemaTypes => &self.output.schema_types,
            ArtifactId::ResolverTypes => &self.output.resolver_types,
        };
        self.root.join(&self.output.dir).join(file)
    }
}

/// Configuration manager for loading and merging configs.
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration from a file path.
    ///
    /// If the path is None, attempts to load from the default location.
    /// If no config file exists, returns default configuration.
    pub fn load(path: Option<&Path>) -> WeaveResult<Config> {
        let config_path = path
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILENAME));

        if !config_path.exists() {
            tracing::debug!(path = %config_path.display(), "no config file, using defaults");
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&config_path).map_err(|e| ConfigError::Io {
            path: config_path.clone(),
            source: e,
        })?;

        Self::parse(&content, &config_path)
    }

    /// Parse configuration text. `origin` is only used in error messages.
    pub fn parse(content: &str, origin: &Path) -> WeaveResult<Config> {
        let config: Config = toml::from_str(content)
            .map_err(|e| ConfigError::invalid_toml(origin.to_path_buf(), e.to_string()))?;

        if config.watch.debounce_ms == 0 {
            return Err(ConfigError::invalid_value("watch.debounce_ms", "must be positive").into());
        }

        for key in config.codegen.passthrough.keys() {
            tracing::debug!(key = %key, "passing through unrecognized codegen option");
        }

        Ok(config)
    }

    /// Merge CLI arguments into configuration.
    ///
    /// CLI arguments take precedence over config file values.
    pub fn merge_cli_args(mut config: Config, args: &CliArgs) -> Config {
        if let Some(ref root) = args.root {
            config.root = root.clone();
        }

        if !args.schema.is_empty() {
            config.schema = SchemaPatterns::Many(args.schema.clone());
        }

        if let Some(ref output) = args.output {
            config.output.dir = output.clone();
        }

        if let Some(use_index_signature) = args.use_index_signature {
            config.codegen.use_index_signature = use_index_signature;
        }

        if let Some(debounce_ms) = args.debounce_ms {
            config.watch.debounce_ms = debounce_ms;
        }

        config
    }

    /// Generate default configuration file content with comments.
    pub fn default_config_content() -> &'static str {
        r#"# gql-weave configuration file

# Schema fragments: a glob or a list of globs, relative to `root`
# unless absolute.
schema = ["server/**/*.graphql"]

# Project root for relative patterns and the output directory
root = "."

# Address of the schema inspection view (optional, passed through)
# url = "/_graphql"

[codegen]
# Let resolver argument types accept arbitrary extra keys
useIndexSignature = true

# Context parameter type of every resolver
contextType = "any"

# Target types for custom scalars (unmapped scalars become `unknown`)
[codegen.scalars]
# DateTime = "string"

[output]
# Directory for generated artifacts, relative to `root`
dir = ".gql-weave"
schema_module = "schema.mjs"
schema_types = "schema-types.d.ts"
resolver_types = "resolver-types.d.ts"

[watch]
# Debounce window for filesystem events
debounce_ms = 100
"#
    }
}

/// CLI arguments that can override configuration.
#[derive(Debug, Default)]
pub struct CliArgs {
    /// Root override.
    pub root: Option<PathBuf>,

    /// Schema pattern override; empty keeps the configured patterns.
    pub schema: Vec<String>,

    /// Output directory override.
    pub output: Option<PathBuf>,

    /// Index signature override.
    pub use_index_signature: Option<bool>,

    /// Debounce override.
    pub debounce_ms: Option<u64>,
}
