use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, error};

use crate::config::LauncherConfig;
use crate::error::{Error, Result};
use crate::maven::coordinates::Artifact;
use crate::maven::manifest::{JarManifestReader, ManifestReader};
use crate::repo::connector::RepositoryConnector;
use crate::resolver::artifact_resolver::Resolver;
use crate::resolver::context::ResolutionContext;
use crate::resolver::progress::{self, Progress};
use crate::resolver::report::{log_artifact, ResolvedArtifact, Summary};
use crate::vault::Vault;

/// Result of a successful resolution: everything needed to assemble a classpath
#[derive(Debug)]
pub struct ResolutionOutcome {
    /// root first, then its dependencies ordered by coordinate
    pub artifacts: Vec<ResolvedArtifact>,
    pub main_class: Option<String>,
    pub summary: Summary,
}
impl ResolutionOutcome {
    /// The class to start and its arguments: the main class if there is one, the first application
    ///  argument otherwise
    pub fn entry_point(&self, app_args: &[String]) -> Option<(String, Vec<String>)> {
        match &self.main_class {
            Some(main_class) => Some((main_class.clone(), app_args.to_vec())),
            None => app_args.split_first()
                .map(|(first, rest)| (first.clone(), rest.to_vec())),
        }
    }

    /// files of all artifacts that are available locally, root first
    pub fn classpath(&self) -> Vec<PathBuf> {
        self.artifacts.iter()
            .filter_map(|a| a.file.clone())
            .collect()
    }
}

/// Entry point for resolving a root artifact with its declared dependencies
pub struct ResolutionDriver {
    config: Arc<LauncherConfig>,
    connector: Arc<RepositoryConnector>,
    manifest_reader: Arc<dyn ManifestReader>,
    progress_interval: Duration,
}
impl ResolutionDriver {
    /// The configuration is used in its effective form, see [`LauncherConfig::effective`]
    pub fn new(config: Arc<LauncherConfig>, vault: Arc<dyn Vault>) -> Result<ResolutionDriver> {
        let config = Arc::new(config.as_ref().clone().effective());
        let connector = RepositoryConnector::new(config.clone(), vault)?;
        Ok(Self::with_collaborators(config, Arc::new(connector), Arc::new(JarManifestReader)))
    }

    pub fn with_collaborators(
        config: Arc<LauncherConfig>,
        connector: Arc<RepositoryConnector>,
        manifest_reader: Arc<dyn ManifestReader>,
    ) -> ResolutionDriver {
        ResolutionDriver {
            config: Arc::new(config.as_ref().clone().effective()),
            connector,
            manifest_reader,
            progress_interval: progress::DEFAULT_INTERVAL,
        }
    }

    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }

    pub fn connector(&self) -> &RepositoryConnector {
        &self.connector
    }

    /// Resolves and downloads the root artifact and its declared dependencies, waiting for all of
    ///  them to complete.
    ///
    /// Fails with `ResolutionFailed` if the application is going to be executed, fail-on-error is
    ///  set, and at least one artifact is missing or invalid. Otherwise the outcome includes failed
    ///  artifacts too.
    pub async fn resolve(&self, coordinate: &str) -> Result<ResolutionOutcome> {
        let root = Arc::new(Artifact::parse(coordinate)?);

        let context = ResolutionContext::new(self.config.clone(), self.connector.clone(), self.manifest_reader.clone());
        let progress = Progress::start(context.clone(), self.progress_interval);

        let root = Resolver::new(context.clone(), root);
        let resolvers = root.resolve_all().await;

        let downloads = join_all(resolvers.iter().map(|r| r.download())).await;
        for (resolver, result) in resolvers.iter().zip(downloads) {
            if let Err(e) = result {
                debug!("{} failed: {}", resolver.artifact(), e);
            }
        }
        let main_class = root.main_class().await;

        progress.stop().await;
        context.close();

        let artifacts: Vec<Arc<Artifact>> = resolvers.iter()
            .map(|r| r.artifact().clone())
            .collect();
        let summary = Summary::collect(&artifacts, context.elapsed());

        for artifact in &artifacts {
            log_artifact(artifact, self.config.debug);
        }
        if !self.config.quiet {
            summary.log();
        }

        if self.config.execute && self.config.fail_on_error && summary.is_failure() {
            error!("cannot execute {}: {} errors, {} warnings", root.artifact(), summary.errors, summary.warnings);
            return Err(Error::ResolutionFailed {
                errors: summary.errors,
                warnings: summary.warnings,
            });
        }

        // the root goes first on the classpath
        let mut ordered: Vec<ResolvedArtifact> = Vec::with_capacity(artifacts.len());
        let root_artifact = root.artifact();
        ordered.push(ResolvedArtifact::of(root_artifact));
        ordered.extend(artifacts.iter()
            .filter(|a| !Arc::ptr_eq(a, root_artifact))
            .map(|a| ResolvedArtifact::of(a)));

        Ok(ResolutionOutcome {
            artifacts: ordered,
            main_class,
            summary,
        })
    }
}
