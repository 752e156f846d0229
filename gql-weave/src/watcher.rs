//! File watching for development mode.
//!
//! [`FileWatcher`] turns debounced filesystem notifications into
//! [`ChangeEvent`]s on a tokio channel. [`WatchSession`] consumes that
//! channel, feeds the [`ChangeDispatcher`], runs regeneration rounds and
//! drives the [`Host`].

use crate::artifact::{template_filter, ArtifactSet, ArtifactStore};
use crate::dispatcher::{ChangeDispatcher, ChangeEvent, Completion, Dispatch, DispatchStats};
use crate::error::{WatchError, WeaveError, WeaveResult};
use crate::host::Host;
use crate::pattern::{collapse_nested, ResolvedPatterns};
use crate::pipeline::Pipeline;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, Debouncer};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

/// Keeps the OS watcher alive; dropping it stops watching.
pub struct WatcherHandle {
    _debouncer: Debouncer<RecommendedWatcher>,
}

/// Filesystem watcher over one or more directory trees.
#[derive(Debug, Clone)]
pub struct FileWatcher {
    roots: Vec<PathBuf>,
    debounce_ms: u64,
}

impl FileWatcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            roots: vec![root.into()],
            debounce_ms: 100,
        }
    }

    /// Watch the base directory of every schema pattern, including patterns
    /// that point outside the project root.
    pub fn for_patterns(patterns: &ResolvedPatterns) -> Self {
        Self {
            roots: patterns.watch_roots().to_vec(),
            debounce_ms: 100,
        }
    }

    /// Set the debounce duration in milliseconds.
    pub fn with_debounce(mut self, ms: u64) -> Self {
        self.debounce_ms = ms;
        self
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Start watching. Every debounced path becomes one [`ChangeEvent`];
    /// relevance is the dispatcher's call, not the watcher's.
    pub fn watch(&self) -> WeaveResult<(WatcherHandle, mpsc::Receiver<ChangeEvent>)> {
        let (std_tx, std_rx) = std::sync::mpsc::channel::<DebounceEventResult>();

        let mut debouncer = new_debouncer(Duration::from_millis(self.debounce_ms), move |res| {
            let _ = std_tx.send(res);
        })
        .map_err(|e| WatchError::Init(e.to_string()))?;

        // Notifications carry the watched path as prefix and patterns are
        // anchored at canonical paths, so watch canonical directories. A
        // directory that does not exist yet is covered by its nearest ancestor.
        let roots = self
            .roots
            .iter()
            .map(|root| {
                existing_ancestor(root)
                    .ok_or_else(|| WatchError::Init(format!("{}: no existing ancestor", root.display())))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let roots = collapse_nested(roots);

        for root in &roots {
            debouncer
                .watcher()
                .watch(root, RecursiveMode::Recursive)
                .map_err(|e| WatchError::Init(format!("{}: {}", root.display(), e)))?;
        }

        let (tx, rx) = mpsc::channel::<ChangeEvent>(256);

        // Bridge the debouncer's std channel onto the tokio channel.
        std::thread::spawn(move || {
            while let Ok(result) = std_rx.recv() {
                match result {
                    Ok(events) => {
                        for event in events {
                            if tx.blocking_send(ChangeEvent::new(event.path)).is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %WatchError::Notify(e.to_string()), "watch error");
                    }
                }
            }
        });

        tracing::info!(roots = ?roots, debounce_ms = self.debounce_ms, "watching");
        Ok((
            WatcherHandle {
                _debouncer: debouncer,
            },
            rx,
        ))
    }
}

fn existing_ancestor(path: &Path) -> Option<PathBuf> {
    path.ancestors().find_map(|dir| dir.canonicalize().ok())
}

/// Outcome of one regeneration round.
#[derive(Debug)]
pub enum RoundOutcome {
    /// Artifacts published and reload signalled.
    Reloaded,
    /// Artifacts published for the first time.
    Ready,
    /// Round failed; previous artifacts kept, no reload.
    Failed(WeaveError),
}

/// Watch-mode driver: dispatcher, pipeline, published artifacts and host.
pub struct WatchSession<H: Host> {
    pipeline: Pipeline,
    dispatcher: ChangeDispatcher,
    store: ArtifactStore,
    host: H,
}

impl<H: Host> WatchSession<H> {
    pub fn new(pipeline: Pipeline, host: H) -> Self {
        let dispatcher = ChangeDispatcher::new(pipeline.patterns().clone());
        Self {
            pipeline,
            dispatcher,
            store: ArtifactStore::new(),
            host,
        }
    }

    pub fn dispatcher(&self) -> &ChangeDispatcher {
        &self.dispatcher
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }

    /// Run the initial build as a round of its own.
    ///
    /// `events` should already be fed by an armed watcher: changes that land
    /// while the build reads fragments are dispatched like any other and
    /// schedule a follow-up round. Returns the outcome of the last round run.
    pub async fn start(&mut self, events: &mut mpsc::Receiver<ChangeEvent>) -> RoundOutcome {
        self.dispatcher.begin();
        loop {
            let outcome = self.run_round(events).await;
            if self.dispatcher.complete() == Completion::Idle {
                return outcome;
            }
        }
    }

    /// Consume change events until the channel closes.
    pub async fn run(&mut self, mut events: mpsc::Receiver<ChangeEvent>) -> DispatchStats {
        while let Some(event) = events.recv().await {
            let dispatch = self.dispatcher.on_schema_changed(&event);
            self.host.on_file_changed(&event, dispatch);
            if dispatch != Dispatch::Start {
                continue;
            }

            loop {
                self.run_round(&mut events).await;
                if self.dispatcher.complete() == Completion::Idle {
                    break;
                }
            }
        }

        self.dispatcher.stats()
    }

    /// Regenerate once, feeding events that arrive meanwhile to the dispatcher.
    async fn run_round(&mut self, events: &mut mpsc::Receiver<ChangeEvent>) -> RoundOutcome {
        let result = {
            let round = self.pipeline.regenerate();
            tokio::pin!(round);

            loop {
                // Queued changes are dispatched before the round is polled.
                tokio::select! {
                    biased;
                    Some(event) = events.recv() => {
                        let dispatch = self.dispatcher.on_schema_changed(&event);
                        self.host.on_file_changed(&event, dispatch);
                    }
                    result = &mut round => break result,
                }
            }
        };

        let outcome = match result {
            Ok(artifacts) => self.publish(artifacts),
            Err(e) => RoundOutcome::Failed(e),
        };

        if let RoundOutcome::Failed(ref e) = outcome {
            tracing::error!(kind = e.kind(), error = %e, "regeneration failed, keeping previous artifacts");
        }
        outcome
    }

    fn publish(&mut self, artifacts: ArtifactSet) -> RoundOutcome {
        if self.store.current().is_none() {
            if let Err(e) = self.host.on_ready(&artifacts) {
                return RoundOutcome::Failed(e);
            }
            self.store.publish(artifacts);
            return RoundOutcome::Ready;
        }

        let hooks = self
            .host
            .refresh_templates(&artifacts, template_filter)
            .and_then(|()| self.host.on_before_reload(&artifacts));
        if let Err(e) = hooks {
            return RoundOutcome::Failed(e);
        }

        let changed = self.store.publish(artifacts);
        tracing::info!(changed = ?changed, generation = self.store.generation(), "artifacts regenerated");
        self.host.notify_reload();
        RoundOutcome::Reloaded
    }
}
