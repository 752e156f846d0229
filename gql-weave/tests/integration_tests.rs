//! Integration tests for gql-weave.
//!
//! These tests run the full pipeline against fixture projects: pattern
//! resolution, aggregation, type generation, and watch sessions driven
//! through an in-memory event channel.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

use gql_weave::{
    aggregator::{aggregate, wrap_schema_module},
    artifact::{ArtifactId, ArtifactSet},
    config::{Config, ConfigManager, SchemaPatterns},
    dispatcher::{ChangeEvent, Dispatch, DispatcherState},
    error::{CodegenError, PatternError, WeaveError, WeaveResult},
    generator::{generate_resolver_types, generate_types},
    host::{FsHost, Host, TemplateFilter},
    pattern::{resolve, PatternSet},
    pipeline::Pipeline,
    watcher::{FileWatcher, RoundOutcome, WatchSession},
    writer::ArtifactWriter,
};

/// Get the path to test fixtures.
fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn blog_fixture() -> PathBuf {
    fixtures_path().join("blog")
}

/// Create a temporary directory with test files.
fn create_temp_project(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (name, content) in files {
        write_file(dir.path(), name, content);
    }
    dir
}

/// Copy a fixture project into a fresh temporary directory.
fn copy_fixture(name: &str) -> TempDir {
    fn copy_dir(from: &Path, to: &Path) {
        fs::create_dir_all(to).unwrap();
        for entry in fs::read_dir(from).unwrap() {
            let entry = entry.unwrap();
            let target = to.join(entry.file_name());
            if entry.file_type().unwrap().is_dir() {
                copy_dir(&entry.path(), &target);
            } else {
                fs::copy(entry.path(), target).unwrap();
            }
        }
    }

    let dir = TempDir::new().unwrap();
    copy_dir(&fixtures_path().join(name), dir.path());
    dir
}

fn write_file(root: &Path, name: &str, content: &str) {
    let path = root.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn config_for(root: &Path) -> Config {
    Config {
        root: root.canonicalize().unwrap(),
        ..Default::default()
    }
}

fn change(root: &Path, name: &str) -> ChangeEvent {
    ChangeEvent::new(root.canonicalize().unwrap().join(name))
}

/// Run the initial build with no changes arriving meanwhile.
async fn start<H: Host>(session: &mut WatchSession<H>) -> RoundOutcome {
    let (_tx, mut rx) = mpsc::channel(1);
    session.start(&mut rx).await
}

// =============================================================================
// Host that records every call
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum HostCall {
    Ready,
    Refresh(Vec<ArtifactId>),
    BeforeReload,
    Reload,
}

#[derive(Debug, Default)]
struct RecordingHost {
    calls: Vec<HostCall>,
    served: Option<ArtifactSet>,
    changes: Vec<(PathBuf, Dispatch)>,
}

impl RecordingHost {
    fn reloads(&self) -> usize {
        self.calls.iter().filter(|c| **c == HostCall::Reload).count()
    }

    fn served_types(&self) -> &str {
        &self
            .served
            .as_ref()
            .unwrap()
            .get(ArtifactId::SchemaTypes)
            .content
    }
}

impl Host for RecordingHost {
    fn on_file_changed(&mut self, event: &ChangeEvent, dispatch: Dispatch) {
        self.changes.push((event.path.clone(), dispatch));
    }

    fn on_ready(&mut self, artifacts: &ArtifactSet) -> WeaveResult<()> {
        self.calls.push(HostCall::Ready);
        self.served = Some(artifacts.clone());
        Ok(())
    }

    fn refresh_templates(
        &mut self,
        artifacts: &ArtifactSet,
        filter: TemplateFilter,
    ) -> WeaveResult<()> {
        let ids = artifacts.iter().filter(|a| filter(a)).map(|a| a.id).collect();
        self.calls.push(HostCall::Refresh(ids));
        Ok(())
    }

    fn on_before_reload(&mut self, artifacts: &ArtifactSet) -> WeaveResult<()> {
        self.calls.push(HostCall::BeforeReload);
        self.served = Some(artifacts.clone());
        Ok(())
    }

    fn notify_reload(&mut self) {
        self.calls.push(HostCall::Reload);
    }
}

// =============================================================================
// Pattern and Aggregation Tests
// =============================================================================

#[test]
fn test_resolve_finds_fixture_fragments() {
    let patterns = PatternSet::single("server/**/*.graphql").unwrap();
    let files = resolve(&patterns, &blog_fixture()).unwrap();

    let names: Vec<_> = files
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
        .collect();

    assert_eq!(names, vec!["base.graphql", "post.graphql", "user.graphql"]);
    assert!(files.iter().all(|p| p.is_absolute()));
}

#[test]
fn test_resolve_overlapping_patterns_deduplicates() {
    let patterns = PatternSet::new([
        "server/**/*.graphql",
        "server/schema/*.graphql",
        "server/schema/user.graphql",
    ])
    .unwrap();

    let files = resolve(&patterns, &blog_fixture()).unwrap();
    assert_eq!(files.len(), 3);
}

#[test]
fn test_invalid_pattern_is_rejected_before_resolution() {
    let err = PatternSet::single("server/[.graphql").unwrap_err();
    assert!(matches!(err, PatternError::InvalidPattern { .. }));

    let config = Config {
        schema: gql_weave::config::SchemaPatterns::Many(vec![]),
        ..Default::default()
    };
    let err = Pipeline::new(&config).unwrap_err();
    assert!(err.is_startup());
    assert!(matches!(err, WeaveError::Pattern(PatternError::Empty)));
}

#[tokio::test]
async fn test_aggregate_merges_fragments_in_path_order() {
    let patterns = PatternSet::single("server/**/*.graphql").unwrap();
    let document = aggregate(&patterns, &blog_fixture()).await.unwrap();

    assert_eq!(document.sources().len(), 3);
    let text = document.as_str();
    let query = text.find("type Query").unwrap();
    let post = text.find("type Post").unwrap();
    let user = text.find("type User").unwrap();
    assert!(query < post && post < user);
    assert!(!text.contains("Not part of the schema"));
}

#[tokio::test]
async fn test_aggregate_keeps_conflicting_declarations() {
    let dir = create_temp_project(&[
        ("server/a.graphql", "type Query { x: Int }"),
        ("server/b.graphql", "type Query { y: String }"),
    ]);

    let patterns = PatternSet::single("server/*.graphql").unwrap();
    let document = aggregate(&patterns, dir.path()).await.unwrap();

    assert_eq!(document.as_str(), "type Query { x: Int }\ntype Query { y: String }");

    // The textual merge succeeds; the conflict surfaces during codegen.
    let pipeline = Pipeline::new(&config_for(dir.path())).unwrap();
    let err = pipeline.derive(&document).unwrap_err();
    assert!(matches!(
        err,
        WeaveError::Codegen(CodegenError::DuplicateType { ref name }) if name == "Query"
    ));
}

#[tokio::test]
async fn test_aggregate_without_matches_is_empty() {
    let dir = create_temp_project(&[("src/index.ts", "export {};")]);

    let patterns = PatternSet::single("server/**/*.graphql").unwrap();
    let document = aggregate(&patterns, dir.path()).await.unwrap();

    assert!(document.is_empty());
    assert_eq!(document.as_str(), "");
}

#[tokio::test]
async fn test_schema_module_round_trips_merged_text() {
    let patterns = PatternSet::single("server/**/*.graphql").unwrap();
    let document = aggregate(&patterns, &blog_fixture()).await.unwrap();

    let module = wrap_schema_module(&document);
    let literal = module
        .lines()
        .find_map(|l| l.strip_prefix("export const schema = "))
        .and_then(|l| l.strip_suffix(';'))
        .unwrap();

    let decoded: String = serde_json::from_str(literal).unwrap();
    assert_eq!(decoded, document.as_str());
    assert!(module.contains("export default schema;"));
}

// =============================================================================
// Generation Tests
// =============================================================================

#[tokio::test]
async fn test_generate_types_for_fixture() {
    let patterns = PatternSet::single("server/**/*.graphql").unwrap();
    let artifact = generate_types(&patterns, &Default::default(), &blog_fixture())
        .await
        .unwrap();

    assert_eq!(artifact.id, ArtifactId::SchemaTypes);
    let types = &artifact.content;
    assert!(types.contains("/** A registered account. */\nexport type User = {"));
    assert!(types.contains("  __typename?: 'User';"));
    assert!(types.contains("  posts: Array<Post>;"));
    assert!(types.contains("  body?: Maybe<Scalars['String']>;"));
    assert!(types.contains("export type Role = 'ADMIN' | 'READER';"));
    assert!(types.contains("export type SearchResult = User | Post;"));
    assert!(types.contains("  DateTime: unknown;"));
    assert!(types.contains("  draft?: InputMaybe<Scalars['Boolean']>;"));
    assert!(types.contains("  title: Scalars['String'];"));
}

#[tokio::test]
async fn test_generate_resolver_types_for_fixture() {
    let patterns = PatternSet::single("server/**/*.graphql").unwrap();
    let artifact = generate_resolver_types(&patterns, &Default::default(), &blog_fixture())
        .await
        .unwrap();

    assert_eq!(artifact.id, ArtifactId::ResolverTypes);
    let resolvers = &artifact.content;
    assert!(resolvers.contains("import type { GraphQLResolveInfo } from 'graphql';"));
    assert!(resolvers.contains("from '#schema-types';"));
    assert!(resolvers.contains("export type QueryResolvers<TContext = any, TParent = {}> = {"));
    assert!(resolvers.contains("  me?: ResolverFn<Maybe<User>, TParent, TContext, NoArgs>;"));
    assert!(resolvers.contains("  user?: ResolverFn<Maybe<User>, TParent, TContext, QueryUserArgs>;"));
    assert!(resolvers.contains("export type QueryUserArgs = {\n  id: Scalars['ID'];\n  [key: string]: unknown;\n};"));
    assert!(resolvers.contains("export type UserPostsArgs = {\n  first?: InputMaybe<Scalars['Int']>;"));
    assert!(resolvers.contains("export type UserResolvers<TContext = any, TParent = User> = {"));
    assert!(resolvers.contains("  Mutation?: MutationResolvers<TContext>;"));
}

#[tokio::test]
async fn test_fixture_config_drives_generation() {
    let config = ConfigManager::load(Some(blog_fixture().join("gql-weave.toml").as_path())).unwrap();
    let config = Config {
        root: blog_fixture(),
        ..config
    };

    assert_eq!(config.url.as_deref(), Some("/_graphql"));
    assert!(config.codegen.passthrough.contains_key("avoidOptionals"));
    assert!(config
        .artifact_path(ArtifactId::SchemaTypes)
        .ends_with("generated/schema-types.d.ts"));

    let artifacts = Pipeline::new(&config).unwrap().regenerate().await.unwrap();

    let types = &artifacts.get(ArtifactId::SchemaTypes).content;
    assert!(types.contains("  DateTime: string;"));

    let resolvers = &artifacts.get(ArtifactId::ResolverTypes).content;
    assert!(resolvers.contains("export type Resolvers<TContext = BlogContext> = {"));
}

#[tokio::test]
async fn test_regeneration_is_deterministic() {
    let pipeline = Pipeline::new(&config_for(&blog_fixture())).unwrap();

    let first = pipeline.regenerate().await.unwrap();
    let second = pipeline.regenerate().await.unwrap();

    assert_eq!(first, second);
    assert!(second.diff(&first).is_empty());
}

#[tokio::test]
async fn test_parse_failure_is_reported_with_position() {
    let root = fixtures_path().join("broken");
    let pipeline = Pipeline::new(&config_for(&root)).unwrap();

    let err = pipeline.regenerate().await.unwrap_err();
    assert_eq!(err.kind(), "schema_parse");
    assert!(!err.is_startup());
}

#[tokio::test]
async fn test_orphan_extension_fails_codegen() {
    let dir = create_temp_project(&[(
        "server/query.graphql",
        "type Query { ok: Boolean }\nextend type Missing { x: Int }",
    )]);

    let err = Pipeline::new(&config_for(dir.path()))
        .unwrap()
        .regenerate()
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        WeaveError::Codegen(CodegenError::OrphanExtension { ref name }) if name == "Missing"
    ));
}

// =============================================================================
// Watch Session Tests
// =============================================================================

#[tokio::test]
async fn test_session_initial_build_calls_on_ready() {
    let dir = copy_fixture("blog");
    let pipeline = Pipeline::new(&config_for(dir.path())).unwrap();
    let mut session = WatchSession::new(pipeline, RecordingHost::default());

    let outcome = start(&mut session).await;

    assert!(matches!(outcome, RoundOutcome::Ready));
    assert_eq!(session.host().calls, vec![HostCall::Ready]);
    assert_eq!(session.store().generation(), 1);
    assert_eq!(session.dispatcher().state(), DispatcherState::Idle);
}

#[tokio::test]
async fn test_schema_edit_refreshes_templates_then_reloads() {
    let dir = copy_fixture("blog");
    let pipeline = Pipeline::new(&config_for(dir.path())).unwrap();
    let mut session = WatchSession::new(pipeline, RecordingHost::default());
    start(&mut session).await;

    write_file(
        dir.path(),
        "server/schema/tag.graphql",
        "type Tag { label: String! }",
    );

    let (tx, rx) = mpsc::channel(16);
    tx.send(change(dir.path(), "server/schema/tag.graphql"))
        .await
        .unwrap();
    drop(tx);

    let stats = session.run(rx).await;

    assert_eq!(stats.rounds, 2);
    assert_eq!(
        session.host().calls,
        vec![
            HostCall::Ready,
            HostCall::Refresh(vec![ArtifactId::SchemaTypes, ArtifactId::ResolverTypes]),
            HostCall::BeforeReload,
            HostCall::Reload,
        ]
    );
    assert!(session.host().served_types().contains("export type Tag = {"));
    assert_eq!(session.store().generation(), 2);
}

#[tokio::test]
async fn test_failed_round_keeps_previous_artifacts() {
    let dir = copy_fixture("blog");
    let pipeline = Pipeline::new(&config_for(dir.path())).unwrap();
    let mut session = WatchSession::new(pipeline, RecordingHost::default());
    start(&mut session).await;
    let before = session.store().current().cloned().unwrap();

    write_file(dir.path(), "server/schema/broken.graphql", "type Broken {");

    let (tx, rx) = mpsc::channel(16);
    tx.send(change(dir.path(), "server/schema/broken.graphql"))
        .await
        .unwrap();
    drop(tx);

    let stats = session.run(rx).await;

    assert_eq!(stats.rounds, 2);
    assert_eq!(session.host().reloads(), 0);
    assert_eq!(session.host().calls, vec![HostCall::Ready]);
    assert_eq!(session.store().current(), Some(&before));
    assert_eq!(session.store().generation(), 1);
    assert_eq!(session.dispatcher().state(), DispatcherState::Idle);
}

#[tokio::test]
async fn test_session_recovers_after_fix() {
    let dir = copy_fixture("blog");
    let pipeline = Pipeline::new(&config_for(dir.path())).unwrap();
    let mut session = WatchSession::new(pipeline, RecordingHost::default());
    start(&mut session).await;

    write_file(dir.path(), "server/schema/broken.graphql", "type Broken {");
    let (tx, rx) = mpsc::channel(4);
    tx.send(change(dir.path(), "server/schema/broken.graphql"))
        .await
        .unwrap();
    drop(tx);
    session.run(rx).await;
    assert_eq!(session.host().reloads(), 0);

    write_file(
        dir.path(),
        "server/schema/broken.graphql",
        "type Broken { fixed: Boolean }",
    );
    let (tx, rx) = mpsc::channel(4);
    tx.send(change(dir.path(), "server/schema/broken.graphql"))
        .await
        .unwrap();
    drop(tx);
    session.run(rx).await;

    assert_eq!(session.host().reloads(), 1);
    assert!(session.host().served_types().contains("export type Broken = {"));
}

#[tokio::test]
async fn test_irrelevant_changes_do_not_regenerate() {
    let dir = copy_fixture("blog");
    let pipeline = Pipeline::new(&config_for(dir.path())).unwrap();
    let mut session = WatchSession::new(pipeline, RecordingHost::default());
    start(&mut session).await;

    let (tx, rx) = mpsc::channel(16);
    tx.send(change(dir.path(), "server/README.md")).await.unwrap();
    tx.send(change(dir.path(), "gql-weave.toml")).await.unwrap();
    drop(tx);

    let stats = session.run(rx).await;

    assert_eq!(stats.rounds, 1);
    assert_eq!(stats.ignored, 2);
    assert_eq!(session.host().calls, vec![HostCall::Ready]);
    assert!(session
        .host()
        .changes
        .iter()
        .all(|(_, dispatch)| *dispatch == Dispatch::Ignored));
    assert_eq!(session.host().changes.len(), 2);
}

#[tokio::test]
async fn test_deleted_fragment_triggers_regeneration() {
    let dir = copy_fixture("blog");
    write_file(dir.path(), "server/extra.graphql", "type Extra { n: Int }");

    let pipeline = Pipeline::new(&config_for(dir.path())).unwrap();
    let mut session = WatchSession::new(pipeline, RecordingHost::default());
    start(&mut session).await;
    assert!(session.host().served_types().contains("export type Extra"));

    fs::remove_file(dir.path().join("server/extra.graphql")).unwrap();

    let (tx, rx) = mpsc::channel(16);
    tx.send(change(dir.path(), "server/extra.graphql")).await.unwrap();
    drop(tx);
    session.run(rx).await;

    assert_eq!(session.host().reloads(), 1);
    assert!(!session.host().served_types().contains("export type Extra"));
}

#[tokio::test]
async fn test_burst_of_changes_coalesces() {
    let dir = copy_fixture("blog");
    let pipeline = Pipeline::new(&config_for(dir.path())).unwrap();
    let mut session = WatchSession::new(pipeline, RecordingHost::default());
    start(&mut session).await;

    // All twenty changes are queued before the session runs: the first
    // starts a round and the other nineteen land while it is in flight.
    let (tx, rx) = mpsc::channel(64);
    for i in 0..20 {
        write_file(
            dir.path(),
            "server/schema/counter.graphql",
            &format!("type Counter{} {{ n: Int }}", i),
        );
        tx.send(change(dir.path(), "server/schema/counter.graphql"))
            .await
            .unwrap();
    }
    drop(tx);

    let stats = session.run(rx).await;

    // Initial build, the round the burst started, and exactly one follow-up.
    assert_eq!(stats.rounds, 3);
    assert_eq!(stats.coalesced, 19);
    assert_eq!(session.host().reloads(), 2);

    let dispatches: Vec<Dispatch> = session.host().changes.iter().map(|(_, d)| *d).collect();
    assert_eq!(dispatches.len(), 20);
    assert_eq!(dispatches[0], Dispatch::Start);
    assert!(dispatches[1..].iter().all(|d| *d == Dispatch::Coalesced));

    assert!(session.host().served_types().contains("export type Counter19 = {"));
    assert_eq!(session.dispatcher().state(), DispatcherState::Idle);
}

#[tokio::test]
async fn test_change_during_initial_build_schedules_rerun() {
    let dir = copy_fixture("blog");
    let pipeline = Pipeline::new(&config_for(dir.path())).unwrap();
    let mut session = WatchSession::new(pipeline, RecordingHost::default());

    // The watcher is armed before the initial build, so an edit made while
    // the build runs is already waiting on the channel.
    let (tx, mut rx) = mpsc::channel(4);
    write_file(
        dir.path(),
        "server/schema/tag.graphql",
        "type Tag { label: String! }",
    );
    tx.send(change(dir.path(), "server/schema/tag.graphql"))
        .await
        .unwrap();

    let outcome = session.start(&mut rx).await;

    assert!(matches!(outcome, RoundOutcome::Reloaded));
    let stats = session.dispatcher().stats();
    assert_eq!(stats.rounds, 2);
    assert_eq!(stats.coalesced, 1);
    assert_eq!(
        session.host().calls,
        vec![
            HostCall::Ready,
            HostCall::Refresh(vec![ArtifactId::SchemaTypes, ArtifactId::ResolverTypes]),
            HostCall::BeforeReload,
            HostCall::Reload,
        ]
    );
    assert!(session.host().served_types().contains("export type Tag = {"));
    assert_eq!(session.dispatcher().state(), DispatcherState::Idle);
}

#[tokio::test]
async fn test_initial_failure_defers_on_ready() {
    let dir = copy_fixture("broken");
    let pipeline = Pipeline::new(&config_for(dir.path())).unwrap();
    let mut session = WatchSession::new(pipeline, RecordingHost::default());

    let outcome = start(&mut session).await;
    assert!(matches!(outcome, RoundOutcome::Failed(ref e) if e.kind() == "schema_parse"));
    assert!(session.host().calls.is_empty());

    write_file(dir.path(), "server/query.graphql", "type Query { ok: Boolean }");
    let (tx, rx) = mpsc::channel(4);
    tx.send(change(dir.path(), "server/query.graphql")).await.unwrap();
    drop(tx);
    session.run(rx).await;

    assert_eq!(session.host().calls, vec![HostCall::Ready]);
    assert_eq!(session.store().generation(), 1);
}

#[tokio::test]
async fn test_fs_host_session_writes_artifacts() {
    let dir = copy_fixture("blog");
    let config = config_for(dir.path());
    let pipeline = Pipeline::new(&config).unwrap();
    let host = FsHost::new(config.clone(), ArtifactWriter::new(false));
    let mut session = WatchSession::new(pipeline, host);

    start(&mut session).await;
    let types_path = config.artifact_path(ArtifactId::SchemaTypes);
    let module_path = config.artifact_path(ArtifactId::SchemaModule);
    assert!(fs::read_to_string(&types_path).unwrap().contains("export type User = {"));
    assert!(fs::read_to_string(&module_path)
        .unwrap()
        .contains("export const schema = "));

    write_file(
        dir.path(),
        "server/schema/tag.graphql",
        "type Tag { label: String! }",
    );
    let (tx, rx) = mpsc::channel(4);
    tx.send(change(dir.path(), "server/schema/tag.graphql"))
        .await
        .unwrap();
    drop(tx);
    session.run(rx).await;

    let host = session.into_host();
    assert_eq!(host.reloads(), 1);
    assert!(fs::read_to_string(&types_path).unwrap().contains("export type Tag = {"));
    assert!(fs::read_to_string(&module_path).unwrap().contains("type Tag"));
}

#[tokio::test]
async fn test_watcher_reports_fragments_outside_root() {
    let project = TempDir::new().unwrap();
    let shared = TempDir::new().unwrap();
    write_file(shared.path(), "a.graphql", "type A { x: Int }");

    let config = Config {
        schema: SchemaPatterns::Many(vec![format!("{}/*.graphql", shared.path().display())]),
        ..config_for(project.path())
    };
    let pipeline = Pipeline::new(&config).unwrap();
    let watcher = FileWatcher::for_patterns(pipeline.patterns()).with_debounce(50);
    let (_handle, mut rx) = watcher.watch().unwrap();

    write_file(shared.path(), "a.graphql", "type A { y: Int }");

    let seen = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(event) = rx.recv().await {
            if pipeline.patterns().matches(&event.path) {
                return true;
            }
        }
        false
    })
    .await;
    assert_eq!(seen.ok(), Some(true));
}
