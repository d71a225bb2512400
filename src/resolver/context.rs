use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::{LauncherConfig, DOWNLOADERS_RANGE, RESOLVERS_RANGE};
use crate::maven::coordinates::Artifact;
use crate::maven::manifest::ManifestReader;
use crate::repo::connector::RepositoryConnector;
use crate::util::pool::WorkerPool;

/// Shared state of one resolution request: the worker pools every resolver submits to, the
///  artifacts discovered so far and the start time. Never reused across requests.
pub struct ResolutionContext {
    config: Arc<LauncherConfig>,
    connector: Arc<RepositoryConnector>,
    manifest_reader: Arc<dyn ManifestReader>,
    resolvers: WorkerPool,
    downloaders: WorkerPool,
    artifacts: Mutex<Vec<Arc<Artifact>>>,
    root: OnceLock<Arc<Artifact>>,
    started: Instant,
}
impl ResolutionContext {
    pub fn new(
        config: Arc<LauncherConfig>,
        connector: Arc<RepositoryConnector>,
        manifest_reader: Arc<dyn ManifestReader>,
    ) -> Arc<ResolutionContext> {
        let resolvers = config.resolvers.clamp(RESOLVERS_RANGE.0, RESOLVERS_RANGE.1);
        let downloaders = config.downloaders.clamp(DOWNLOADERS_RANGE.0, DOWNLOADERS_RANGE.1);
        debug!("resolving with {} resolvers and {} downloaders", resolvers, downloaders);
        Arc::new(ResolutionContext {
            resolvers: WorkerPool::new("resolvers", resolvers),
            downloaders: WorkerPool::new("downloaders", downloaders),
            config,
            connector,
            manifest_reader,
            artifacts: Mutex::new(Vec::new()),
            root: OnceLock::new(),
            started: Instant::now(),
        })
    }

    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }

    pub fn connector(&self) -> &RepositoryConnector {
        &self.connector
    }

    pub fn manifest_reader(&self) -> Arc<dyn ManifestReader> {
        self.manifest_reader.clone()
    }

    /// metadata resolution pool
    pub fn resolvers(&self) -> &WorkerPool {
        &self.resolvers
    }

    pub fn downloaders(&self) -> &WorkerPool {
        &self.downloaders
    }

    /// Adds an artifact to the set of discovered artifacts; the first one registered is the root
    pub fn register(&self, artifact: Arc<Artifact>) {
        let _ = self.root.set(artifact.clone());
        self.lock_artifacts().push(artifact);
    }

    pub fn root(&self) -> Option<&Arc<Artifact>> {
        self.root.get()
    }

    /// every artifact instance discovered so far, in discovery order
    pub fn artifacts(&self) -> Vec<Arc<Artifact>> {
        self.lock_artifacts().clone()
    }

    pub fn started(&self) -> Instant {
        self.started
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Shuts down both pools; work that was not started yet fails with `PoolClosed`
    pub fn close(&self) {
        self.resolvers.shutdown();
        self.downloaders.shutdown();
    }

    fn lock_artifacts(&self) -> MutexGuard<'_, Vec<Arc<Artifact>>> {
        self.artifacts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
