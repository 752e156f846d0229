//! Host integration.
//!
//! The host is whatever embeds the pipeline: it registers the artifacts
//! under their identifiers, rewrites type templates, and reloads its
//! schema-serving state. Changes flow the other way through
//! [`ChangeDispatcher::on_schema_changed`](crate::dispatcher::ChangeDispatcher::on_schema_changed).

use crate::artifact::{ArtifactId, ArtifactSet, GeneratedArtifact};
use crate::config::Config;
use crate::dispatcher::{ChangeEvent, Dispatch};
use crate::error::WeaveResult;
use crate::writer::{ArtifactWriter, WriteResult};
use std::path::PathBuf;

/// Selects which artifacts a template refresh rewrites.
pub type TemplateFilter = fn(&GeneratedArtifact) -> bool;

/// Lifecycle hooks the pipeline drives.
pub trait Host {
    /// First successful build: register every artifact.
    fn on_ready(&mut self, artifacts: &ArtifactSet) -> WeaveResult<()>;

    /// A filesystem change reached the dispatcher, which decided `dispatch`.
    fn on_file_changed(&mut self, _event: &ChangeEvent, _dispatch: Dispatch) {}

    /// Rewrite the templates `filter` selects.
    fn refresh_templates(
        &mut self,
        artifacts: &ArtifactSet,
        filter: TemplateFilter,
    ) -> WeaveResult<()>;

    /// Swap served state just before the reload signal.
    fn on_before_reload(&mut self, _artifacts: &ArtifactSet) -> WeaveResult<()> {
        Ok(())
    }

    /// Tell the consumer to reinitialize with the new artifacts.
    fn notify_reload(&mut self);
}

/// Host that publishes artifacts as files under the configured output dir.
///
/// Refreshed templates are held back until `on_before_reload`, which writes
/// them together with the schema module as one batch.
#[derive(Debug)]
pub struct FsHost {
    config: Config,
    writer: ArtifactWriter,
    pending: Vec<GeneratedArtifact>,
    results: Vec<WriteResult>,
    reloads: u64,
}

impl FsHost {
    pub fn new(config: Config, writer: ArtifactWriter) -> Self {
        Self {
            config,
            writer,
            pending: Vec::new(),
            results: Vec::new(),
            reloads: 0,
        }
    }

    /// Destination of an artifact.
    pub fn path_for(&self, id: ArtifactId) -> PathBuf {
        self.config.artifact_path(id)
    }

    /// Results of every write since the last call.
    pub fn take_results(&mut self) -> Vec<WriteResult> {
        std::mem::take(&mut self.results)
    }

    /// Reload signals emitted so far.
    pub fn reloads(&self) -> u64 {
        self.reloads
    }

    fn write_all<'a>(
        &mut self,
        artifacts: impl IntoIterator<Item = &'a GeneratedArtifact>,
    ) -> WeaveResult<()> {
        let files: Vec<(PathBuf, &str)> = artifacts
            .into_iter()
            .map(|a| (self.path_for(a.id), a.content.as_str()))
            .collect();
        let results = self
            .writer
            .write_all(files.iter().map(|(path, content)| (path.as_path(), *content)))?;
        self.results.extend(results);
        Ok(())
    }
}

impl Host for FsHost {
    fn on_ready(&mut self, artifacts: &ArtifactSet) -> WeaveResult<()> {
        self.write_all(artifacts.iter())?;
        tracing::info!(dir = %self.config.output.dir.display(), "artifacts ready");
        Ok(())
    }

    fn refresh_templates(
        &mut self,
        artifacts: &ArtifactSet,
        filter: TemplateFilter,
    ) -> WeaveResult<()> {
        self.pending = artifacts.iter().filter(|a| filter(a)).cloned().collect();
        Ok(())
    }

    fn on_file_changed(&mut self, event: &ChangeEvent, dispatch: Dispatch) {
        if dispatch == Dispatch::Start {
            tracing::info!(path = %event.path.display(), "schema changed");
        }
    }

    fn on_before_reload(&mut self, artifacts: &ArtifactSet) -> WeaveResult<()> {
        let mut batch = std::mem::take(&mut self.pending);
        batch.push(artifacts.get(ArtifactId::SchemaModule).clone());
        self.write_all(&batch)
    }

    fn notify_reload(&mut self) {
        self.reloads += 1;
        tracing::info!(reloads = self.reloads, "schema reloaded");
    }
}
