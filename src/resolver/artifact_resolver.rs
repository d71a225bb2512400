use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use tokio::task::JoinError;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::maven::coordinates::{Artifact, Status};
use crate::maven::manifest::Manifest;
use crate::resolver::context::ResolutionContext;
use crate::util::memo::{Memo, MemoFuture};

/// What an artifact's manifest declares
pub struct Dependencies {
    pub main_class: Option<String>,
    pub resolvers: Vec<Arc<Resolver>>,
}

/// Drives one artifact through resolve, download and dependency discovery. Every stage runs at
///  most once per instance; concurrent and later callers share the same in-flight or completed
///  result.
pub struct Resolver {
    context: Arc<ResolutionContext>,
    artifact: Arc<Artifact>,
    resolve_op: Memo<()>,
    download_op: Memo<()>,
    dependencies_op: Memo<Arc<Dependencies>>,
}
impl Resolver {
    pub fn new(context: Arc<ResolutionContext>, artifact: Arc<Artifact>) -> Arc<Resolver> {
        context.register(artifact.clone());
        Arc::new(Resolver {
            context,
            artifact,
            resolve_op: Memo::new(),
            download_op: Memo::new(),
            dependencies_op: Memo::new(),
        })
    }

    pub fn artifact(&self) -> &Arc<Artifact> {
        &self.artifact
    }

    /// Determines whether the artifact exists (and for a snapshot, which build is current) on the
    ///  metadata pool
    pub fn resolve(self: &Arc<Self>) -> MemoFuture<()> {
        self.resolve_op.get_or_start(|| {
            if self.artifact.maven_ref().is_some() {
                self.artifact.set_status(Status::Resolving);
            }
            tokio::spawn(self.clone().do_resolve())
        })
    }

    async fn do_resolve(self: Arc<Self>) -> Result<()> {
        let this = self.clone();
        let handle = self.context.resolvers().submit(async move {
            this.context.connector().resolve(&this.artifact).await
        });
        self.settle(handle.await, Status::NotFound)
    }

    /// Materializes the artifact in the local cache on the download pool, after it was resolved.
    ///  Completion of the returned future implies completion of both stages.
    pub fn download(self: &Arc<Self>) -> MemoFuture<()> {
        self.download_op.get_or_start(|| {
            let resolved = self.resolve();
            tokio::spawn(self.clone().do_download(resolved))
        })
    }

    async fn do_download(self: Arc<Self>, resolved: MemoFuture<()>) -> Result<()> {
        resolved.await?;

        let this = self.clone();
        let handle = self.context.downloaders().submit(async move {
            this.context.connector().download(&this.artifact).await
        });
        self.settle(handle.await, Status::NotFound)
    }

    /// Failures the connector did not get to record (a panicking or cancelled job, a closed pool)
    ///  are recorded here, so the artifact always ends in a terminal status with its cause.
    fn settle(&self, joined: std::result::Result<Result<()>, JoinError>, status: Status) -> Result<()> {
        let result = match joined {
            Ok(result) => result,
            Err(e) => Err(Error::Task(e.to_string())),
        };
        match result {
            Err(e) if self.artifact.error().is_none() => {
                warn!("{} failed: {}", self.artifact, e);
                Err(Error::Shared(self.artifact.fail(status, e)))
            }
            result => result,
        }
    }

    /// Reads the downloaded artifact's manifest for its main class and declared dependencies,
    ///  creating a resolver per dependency and starting its resolution right away.
    ///
    /// NB: this is a single level - dependencies of dependencies are not expanded
    pub fn dependencies(self: &Arc<Self>) -> MemoFuture<Arc<Dependencies>> {
        self.dependencies_op.get_or_start(|| {
            let downloaded = self.download();
            tokio::spawn(self.clone().do_dependencies(downloaded))
        })
    }

    async fn do_dependencies(self: Arc<Self>, downloaded: MemoFuture<()>) -> Result<Arc<Dependencies>> {
        downloaded.await?;

        let manifest = self.read_manifest().await?;
        let main_class = self.artifact.main_class()
            .or_else(|| manifest.as_ref().and_then(|m| m.main_class()))
            .map(|s| s.to_string());

        let declared: Vec<String> = match &manifest {
            _ if self.context.config().delegate => vec![],
            Some(m) => m.dependencies().iter().map(|s| s.to_string()).collect(),
            None => vec![],
        };
        debug!("{} declares {} dependencies", self.artifact, declared.len());

        let mut resolvers = Vec::with_capacity(declared.len());
        for coordinate in declared {
            match Artifact::parse(&coordinate) {
                Ok(artifact) => {
                    let resolver = Resolver::new(self.context.clone(), Arc::new(artifact));
                    // overlap the siblings' network latency; the download starts later
                    let _ = resolver.resolve();
                    resolvers.push(resolver);
                }
                Err(e) => warn!("ignoring dependency declared by {}: {}", self.artifact, e),
            }
        }

        Ok(Arc::new(Dependencies {
            main_class,
            resolvers,
        }))
    }

    /// This artifact and its direct dependencies, ordered by coordinate and free of duplicates,
    ///  with the download of each one started.
    ///
    /// NB: Duplicates are removed from the returned set only. The same coordinate declared by
    ///  two different artifacts is still handled by two resolvers.
    pub async fn resolve_all(self: &Arc<Self>) -> Vec<Arc<Resolver>> {
        let mut result = BTreeMap::new();
        result.insert(self.artifact.as_string(), self.clone());

        match self.dependencies().await {
            Ok(dependencies) => {
                for resolver in &dependencies.resolvers {
                    result.entry(resolver.artifact.as_string())
                        .or_insert_with(|| resolver.clone());
                }
            }
            // NB: the failure is recorded on the artifact, it is reported with the other results
            Err(e) => debug!("no dependencies for {}: {}", self.artifact, e),
        }

        for resolver in result.values() {
            let _ = resolver.download();
        }
        result.into_values().collect()
    }

    /// Entry point: explicitly requested, or from the manifest
    pub async fn main_class(self: &Arc<Self>) -> Option<String> {
        match self.artifact.main_class() {
            Some(explicit) => Some(explicit.to_string()),
            None => self.dependencies().await
                .ok()
                .and_then(|d| d.main_class.clone()),
        }
    }

    async fn read_manifest(&self) -> Result<Option<Manifest>> {
        let state = self.artifact.state();
        let file = match state.file {
            Some(file) => file,
            None => return Err(Error::Unresolved {
                artifact: self.artifact.to_string(),
                status: state.status,
            }),
        };

        let reader = self.context.manifest_reader();
        let result = match tokio::task::spawn_blocking(move || reader.read(&file)).await {
            Ok(result) => result,
            Err(e) => Err(Error::Task(e.to_string())),
        };

        match result {
            Ok(manifest) => Ok(manifest),
            Err(e) => Err(Error::Shared(self.artifact.fail(Status::Invalid, e))),
        }
    }
}

impl Debug for Resolver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("artifact", &self.artifact.to_string())
            .field("status", &self.artifact.status())
            .finish()
    }
}
